//! Transport to the queue server.

pub mod tcp;

pub use tcp::{connect, Address};
