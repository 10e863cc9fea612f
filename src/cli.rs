use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressMode {
    /// One dot per chunk, a status line every batch
    Dots,
    /// Progress bar
    Bar,
    /// No progress output
    None,
}

#[derive(Parser, Debug)]
#[command(name = "fota")]
#[command(about = "Deliver a firmware image to ESP8266 devices through an easyq server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Input file to download to the device
    pub filename: PathBuf,

    /// Queue name
    #[arg(env = "FOTA_QUEUE")]
    pub queue: String,

    /// easyq server address
    #[arg(value_name = "{HOST:}PORT", env = "FOTA_ADDRESS")]
    pub address: String,

    /// Raw bytes per DATA command (1-65535) [default: 512]
    #[arg(short = 'c', long, env = "FOTA_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Config file (default: <config dir>/fota/config.toml if present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Give up connecting after this many seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Send without any pauses between commands
    #[arg(long)]
    pub no_pacing: bool,

    /// Pause after PUSH S
    #[arg(long, value_name = "MS")]
    pub start_delay_ms: Option<u64>,

    /// Pause after each DATA command
    #[arg(long, value_name = "MS")]
    pub chunk_interval_ms: Option<u64>,

    /// Pause after the last DATA command of a batch
    #[arg(long, value_name = "MS")]
    pub batch_interval_ms: Option<u64>,

    /// Chunks per batch (0 disables batch pauses)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<u32>,

    /// Pause before PUSH F
    #[arg(long, value_name = "MS")]
    pub finish_delay_ms: Option<u64>,

    /// Progress display
    #[arg(long, value_enum, default_value_t = ProgressMode::Dots)]
    pub progress: ProgressMode,

    /// Print a JSON summary instead of text
    #[arg(long)]
    pub json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// No progress or summary on stdout
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn progress_mode(&self) -> ProgressMode {
        if self.quiet || self.json {
            ProgressMode::None
        } else {
            self.progress
        }
    }
}
