//! Progress reporting for a delivery session.
//!
//! Output here is for humans. It is not part of the wire protocol and
//! write failures on it are ignored.

use crate::delivery::pacing::Marker;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

pub trait Progress: Send {
    /// Server replied to LOGIN.
    fn banner(&mut self, _banner: &[u8]) {}

    /// A DATA command went out. `total` is the raw byte count so far.
    fn chunk(&mut self, _marker: Marker, _total: u64) {}

    /// PUSH F went out.
    fn finish(&mut self, _total: u64) {}
}

/// Reports nothing.
#[derive(Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Dot-per-chunk console output, one ` batch:hextotal` line per batch.
pub struct ConsoleProgress<W: Write + Send> {
    out: W,
}

impl ConsoleProgress<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Progress for ConsoleProgress<W> {
    fn banner(&mut self, banner: &[u8]) {
        let _ = writeln!(self.out, "Server: {}", banner.escape_ascii());
    }

    fn chunk(&mut self, marker: Marker, total: u64) {
        let _ = match marker {
            Marker::Tick => write!(self.out, "."),
            Marker::Batch { index } => writeln!(self.out, " {}:{:x}", index, total),
        };
        let _ = self.out.flush();
    }

    fn finish(&mut self, total: u64) {
        let _ = writeln!(self.out, "\nDone, total: {}", total);
        let _ = self.out.flush();
    }
}

/// indicatif bar sized to the firmware image.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(total_bytes: u64) -> Self {
        let bar = ProgressBar::new(total_bytes);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl Progress for BarProgress {
    fn banner(&mut self, banner: &[u8]) {
        self.bar
            .println(format!("Server: {}", banner.escape_ascii()));
    }

    fn chunk(&mut self, marker: Marker, total: u64) {
        self.bar.set_position(total);
        if let Marker::Batch { index } = marker {
            self.bar.set_message(format!("batch {}", index));
        }
    }

    fn finish(&mut self, total: u64) {
        self.bar.set_position(total);
        self.bar.finish_with_message("done");
    }
}
