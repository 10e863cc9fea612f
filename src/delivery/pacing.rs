//! Pacing between commands.
//!
//! The receiving device has no flow control of its own; it relies on the
//! sender spacing out DATA commands. Every `batch_size`th chunk gets the
//! longer `batch_interval` so the device can flush its buffer.

use std::time::Duration;

pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_millis(150);
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(700);
pub const DEFAULT_FINISH_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_BATCH_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Pause after PUSH S, before the first DATA command
    pub start_delay: Duration,
    /// Pause after an ordinary DATA command
    pub chunk_interval: Duration,
    /// Pause after the last DATA command of each batch
    pub batch_interval: Duration,
    /// Chunks per batch. Zero disables batch boundaries.
    pub batch_size: u32,
    /// Pause after the last DATA command, before PUSH F
    pub finish_delay: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            start_delay: DEFAULT_START_DELAY,
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            batch_interval: DEFAULT_BATCH_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            finish_delay: DEFAULT_FINISH_DELAY,
        }
    }
}

/// What follows a DATA command: how long to wait and what to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pause {
    pub delay: Duration,
    pub marker: Marker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Minimal per-chunk marker
    Tick,
    /// End of batch `index` (0-based)
    Batch { index: u64 },
}

impl PacingPolicy {
    /// No sleeps at all. Batch markers are still produced.
    pub fn none() -> Self {
        Self {
            start_delay: Duration::ZERO,
            chunk_interval: Duration::ZERO,
            batch_interval: Duration::ZERO,
            batch_size: DEFAULT_BATCH_SIZE,
            finish_delay: Duration::ZERO,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.start_delay.is_zero()
            && self.chunk_interval.is_zero()
            && self.batch_interval.is_zero()
            && self.finish_delay.is_zero()
    }

    /// Pause after DATA command number `tick` (0-based).
    pub fn after_chunk(&self, tick: u64) -> Pause {
        let batch = u64::from(self.batch_size);
        if batch > 0 && tick % batch == batch - 1 {
            Pause {
                delay: self.batch_interval,
                marker: Marker::Batch { index: tick / batch },
            }
        } else {
            Pause {
                delay: self.chunk_interval,
                marker: Marker::Tick,
            }
        }
    }
}
