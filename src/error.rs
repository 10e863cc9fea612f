//! Error types for firmware delivery.
//!
//! Every failure is fatal to the session. Nothing is retried.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FotaError>;

#[derive(Error, Debug)]
pub enum FotaError {
    /// Invalid chunk size, malformed address, bad queue name, unreadable config file
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read firmware source: {0}")]
    SourceRead(#[source] io::Error),

    #[error("Transport error: {context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Protocol error: expected {expected}-byte session banner, received {received}")]
    Protocol { expected: usize, received: usize },

    #[error("Session cancelled")]
    Cancelled,
}

impl FotaError {
    pub fn config(msg: impl Into<String>) -> Self {
        FotaError::Config(msg.into())
    }

    pub fn transport(context: &'static str, source: io::Error) -> Self {
        FotaError::Transport { context, source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FotaError::Cancelled)
    }
}

/// A failed session together with how far it got.
///
/// There is no resume; `bytes_sent` is diagnostic only.
#[derive(Error, Debug)]
#[error("{error} (after {bytes_sent} bytes sent)")]
pub struct SessionError {
    #[source]
    pub error: FotaError,
    pub bytes_sent: u64,
}

impl SessionError {
    pub fn new(error: FotaError, bytes_sent: u64) -> Self {
        Self { error, bytes_sent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_reports_progress() {
        let err = SessionError::new(
            FotaError::Protocol {
                expected: 20,
                received: 3,
            },
            0,
        );
        let msg = err.to_string();
        assert!(msg.contains("20-byte session banner"));
        assert!(msg.contains("after 0 bytes"));
    }

    #[test]
    fn test_transport_error_keeps_source() {
        let err = FotaError::transport(
            "sending PUSH D",
            io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
        );
        assert!(err.to_string().contains("sending PUSH D"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_cancelled());
    }
}
