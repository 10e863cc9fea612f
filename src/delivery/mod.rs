//! Firmware delivery over an easyq queue.
//!
//! A session is a fixed command sequence on one connection:
//!
//! ```text
//! LOGIN fota;            -> server replies with a 20-byte banner
//! PUSH S INTO <queue>;   start
//! PUSH D<chunk> INTO ..; one per chunk, paced
//! PUSH F INTO <queue>;   finish
//! ```
//!
//! Each chunk is `base64(len:u16le | raw)` with MIME line wrapping.

pub mod command;
pub mod encoder;
pub mod pacing;
pub mod progress;
pub mod session;

pub use command::{Command, Opcode, QueueName, LOGIN_COMMAND};
pub use encoder::{encode_chunk, ChunkSize, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
pub use pacing::{Marker, PacingPolicy, Pause};
pub use progress::{BarProgress, ConsoleProgress, NoProgress, Progress};
pub use session::{run_session, SessionOptions, SessionReport, BANNER_LEN};
