//! easyq command lines.
//!
//! Grammar:
//! ```text
//! LOGIN fota;\n
//! PUSH <payload> INTO <queue>;\n
//! ```
//! where payload is `S`, `D<encoded chunk>` or `F`.

use crate::error::{FotaError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;

/// Fixed login command. The session name is not configurable.
pub const LOGIN_COMMAND: &[u8] = b"LOGIN fota;\n";

/// Longest queue name accepted
pub const MAX_QUEUE_NAME_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Start = b'S',
    Data = b'D',
    Finish = b'F',
}

/// Target queue, validated so it can be embedded unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(FotaError::config("queue name must not be empty"));
        }
        if name.len() > MAX_QUEUE_NAME_LEN {
            return Err(FotaError::config(format!(
                "queue name is {} bytes, maximum is {}",
                name.len(),
                MAX_QUEUE_NAME_LEN
            )));
        }
        if let Some(bad) = name.chars().find(|c| !is_queue_char(*c)) {
            return Err(FotaError::config(format!(
                "queue name {:?} contains invalid character {:?}",
                name, bad
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_queue_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

impl FromStr for QueueName {
    type Err = FotaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One command sent to the queue server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    Start,
    /// Carries an already-encoded chunk (see `encoder::encode_chunk`)
    Data(Bytes),
    Finish,
}

impl Command {
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Command::Login => None,
            Command::Start => Some(Opcode::Start),
            Command::Data(_) => Some(Opcode::Data),
            Command::Finish => Some(Opcode::Finish),
        }
    }

    /// Short label for logs and error context.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login => "LOGIN",
            Command::Start => "PUSH S",
            Command::Data(_) => "PUSH D",
            Command::Finish => "PUSH F",
        }
    }

    pub fn encode(&self, queue: &QueueName) -> Bytes {
        let Some(opcode) = self.opcode() else {
            return Bytes::from_static(LOGIN_COMMAND);
        };
        let payload: &[u8] = match self {
            Command::Data(encoded) => encoded,
            _ => &[],
        };
        push_line(opcode, payload, queue)
    }
}

/// Build `PUSH <opcode><payload> INTO <queue>;\n`.
pub fn push_line(opcode: Opcode, payload: &[u8], queue: &QueueName) -> Bytes {
    let queue = queue.as_str().as_bytes();
    let mut buf = BytesMut::with_capacity(5 + 1 + payload.len() + 6 + queue.len() + 2);
    buf.put_slice(b"PUSH ");
    buf.put_u8(opcode as u8);
    buf.put_slice(payload);
    buf.put_slice(b" INTO ");
    buf.put_slice(queue);
    buf.put_slice(b";\n");
    buf.freeze()
}
