//! Configuration: TOML file merged under command-line flags.
//!
//! Precedence is flags (or their env vars) > file > built-in defaults.
//! Everything is validated here, before any connection is opened.

use crate::cli::Cli;
use crate::delivery::{ChunkSize, PacingPolicy, QueueName, SessionOptions, BANNER_LEN};
use crate::error::{FotaError, Result};
use crate::transport::Address;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Optional settings file
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub chunk_size: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
    pub pacing: PacingConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    /// `false` turns every pause off
    pub enabled: Option<bool>,
    pub start_delay_ms: Option<u64>,
    pub chunk_interval_ms: Option<u64>,
    pub batch_interval_ms: Option<u64>,
    pub batch_size: Option<u32>,
    pub finish_delay_ms: Option<u64>,
}

impl PacingConfig {
    /// Overlay the values that are set onto `base`.
    pub fn apply(&self, base: PacingPolicy) -> PacingPolicy {
        let mut policy = if self.enabled == Some(false) {
            PacingPolicy::none()
        } else {
            base
        };
        if let Some(ms) = self.start_delay_ms {
            policy.start_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.chunk_interval_ms {
            policy.chunk_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.batch_interval_ms {
            policy.batch_interval = Duration::from_millis(ms);
        }
        if let Some(n) = self.batch_size {
            policy.batch_size = n;
        }
        if let Some(ms) = self.finish_delay_ms {
            policy.finish_delay = Duration::from_millis(ms);
        }
        policy
    }
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| FotaError::config(format!("invalid config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            FotaError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// `<config dir>/fota/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fota").join("config.toml"))
    }

    /// An explicit path must exist. The default path is used only if present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Fully resolved, validated settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: PathBuf,
    pub queue: QueueName,
    pub address: Address,
    pub connect_timeout: Option<Duration>,
    pub session: SessionOptions,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: &FileConfig) -> Result<Self> {
        let queue = QueueName::new(cli.queue.as_str())?;
        let address = Address::parse(&cli.address)?;

        let chunk_size = match cli.chunk_size.or(file.chunk_size) {
            Some(size) => ChunkSize::new(size)?,
            None => ChunkSize::default(),
        };

        let mut pacing = file.pacing.apply(PacingPolicy::default());
        let flags = PacingConfig {
            enabled: cli.no_pacing.then_some(false),
            start_delay_ms: cli.start_delay_ms,
            chunk_interval_ms: cli.chunk_interval_ms,
            batch_interval_ms: cli.batch_interval_ms,
            batch_size: cli.batch_size,
            finish_delay_ms: cli.finish_delay_ms,
        };
        pacing = flags.apply(pacing);

        let connect_timeout = cli
            .connect_timeout
            .or(file.connect_timeout_secs)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            source: cli.filename.clone(),
            queue,
            address,
            connect_timeout,
            session: SessionOptions {
                chunk_size,
                pacing,
                banner_len: BANNER_LEN,
            },
        })
    }
}
