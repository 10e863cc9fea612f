//! fota - push firmware images to devices through an easyq queue server.

pub mod cli;
pub mod config;
pub mod delivery;
pub mod error;
pub mod transport;

pub use error::{FotaError, Result, SessionError};
