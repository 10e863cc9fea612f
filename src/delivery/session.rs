//! Delivery session: LOGIN, PUSH S, PUSH D per chunk, PUSH F.
//!
//! Commands go out strictly in order on one connection. Apart from the
//! LOGIN banner nothing is read back from the server, so delivery is not
//! confirmed. Any failure aborts the session without sending PUSH F.

use crate::error::{FotaError, Result, SessionError};
use crate::delivery::command::{Command, QueueName};
use crate::delivery::encoder::{encode_chunk, ChunkSize};
use crate::delivery::pacing::PacingPolicy;
use crate::delivery::progress::Progress;
use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Bytes the server sends back after LOGIN
pub const BANNER_LEN: usize = 20;

/// Tunables for one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub chunk_size: ChunkSize,
    pub pacing: PacingPolicy,
    pub banner_len: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::default(),
            pacing: PacingPolicy::default(),
            banner_len: BANNER_LEN,
        }
    }
}

/// Outcome of a completed session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub bytes_sent: u64,
    pub chunks_sent: u64,
    pub banner: Bytes,
    pub elapsed: Duration,
}

/// Give up on a graceful shutdown after this long
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection state for one delivery. Owns the connection.
///
/// Only `run_session` drives it, which keeps the command order fixed:
/// LOGIN, START, DATA*, FINISH.
pub(crate) struct Session<C> {
    queue: QueueName,
    conn: C,
    cancel: CancellationToken,
    bytes_sent: u64,
    chunk_index: u64,
}

impl<C> Session<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(queue: QueueName, conn: C, cancel: CancellationToken) -> Self {
        Self {
            queue,
            conn,
            cancel,
            bytes_sent: 0,
            chunk_index: 0,
        }
    }

    pub(crate) fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// Raw (pre-encoding) bytes sent in DATA commands so far
    pub(crate) fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// DATA commands sent so far
    pub(crate) fn chunk_index(&self) -> u64 {
        self.chunk_index
    }

    /// Write one command. A write blocked on a full peer window is
    /// abandoned as soon as the session is cancelled.
    async fn send(&mut self, cmd: &Command) -> Result<()> {
        let line = cmd.encode(&self.queue);
        tokio::select! {
            written = write_line(&mut self.conn, &line) => {
                written.map_err(|e| FotaError::transport(cmd.name(), e))?
            }
            _ = self.cancel.cancelled() => return Err(FotaError::Cancelled),
        }
        tracing::trace!(command = cmd.name(), len = line.len(), "sent");
        Ok(())
    }

    /// Send LOGIN and read the fixed-length banner.
    pub(crate) async fn login(&mut self, banner_len: usize) -> Result<Bytes> {
        self.send(&Command::Login).await?;

        tokio::select! {
            banner = read_banner(&mut self.conn, banner_len) => banner,
            _ = self.cancel.cancelled() => Err(FotaError::Cancelled),
        }
    }

    pub(crate) async fn start(&mut self) -> Result<()> {
        self.send(&Command::Start).await
    }

    /// Encode and send one non-empty chunk. Returns its 0-based index.
    pub(crate) async fn push_chunk(&mut self, raw: &[u8]) -> Result<u64> {
        debug_assert!(!raw.is_empty(), "end of input never becomes a DATA command");
        let encoded = encode_chunk(raw)?;
        self.send(&Command::Data(encoded)).await?;

        let tick = self.chunk_index;
        self.chunk_index += 1;
        self.bytes_sent += raw.len() as u64;
        Ok(tick)
    }

    pub(crate) async fn finish(&mut self) -> Result<()> {
        self.send(&Command::Finish).await
    }

    /// Shut the connection down. Errors are ignored; the peer may
    /// already be gone.
    pub(crate) async fn close(mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.conn.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "shutdown after session failed"),
            Err(_) => tracing::debug!("shutdown timed out, dropping connection"),
        }
    }
}

/// Deliver `source` to `queue` over `conn`.
///
/// Both `source` and `conn` are consumed and released on every exit
/// path. On failure the error carries the raw byte count already sent.
pub async fn run_session<S, C>(
    source: S,
    queue: QueueName,
    conn: C,
    options: &SessionOptions,
    progress: &mut dyn Progress,
    cancel: &CancellationToken,
) -> std::result::Result<SessionReport, SessionError>
where
    S: AsyncRead + Unpin,
    C: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let mut session = Session::new(queue, conn, cancel.clone());
    tracing::info!(
        queue = %session.queue(),
        chunk_size = %options.chunk_size,
        paced = !options.pacing.is_disabled(),
        "starting firmware push"
    );

    let outcome = drive(&mut session, source, options, progress, cancel).await;

    let bytes_sent = session.bytes_sent();
    let chunks_sent = session.chunk_index();
    session.close().await;

    match outcome {
        Ok(banner) => {
            let report = SessionReport {
                bytes_sent,
                chunks_sent,
                banner,
                elapsed: started.elapsed(),
            };
            tracing::info!(
                bytes = report.bytes_sent,
                chunks = report.chunks_sent,
                elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                "firmware push finished"
            );
            Ok(report)
        }
        Err(error) => {
            tracing::warn!(%error, bytes_sent, chunks_sent, "firmware push aborted");
            Err(SessionError::new(error, bytes_sent))
        }
    }
}

async fn drive<S, C>(
    session: &mut Session<C>,
    mut source: S,
    options: &SessionOptions,
    progress: &mut dyn Progress,
    cancel: &CancellationToken,
) -> Result<Bytes>
where
    S: AsyncRead + Unpin,
    C: AsyncRead + AsyncWrite + Unpin,
{
    check_cancelled(cancel)?;

    let banner = session.login(options.banner_len).await?;
    tracing::debug!(banner = %banner.escape_ascii(), "logged in");
    progress.banner(&banner);

    session.start().await?;
    pause(options.pacing.start_delay, cancel).await?;

    let chunk_size = options.chunk_size.get();
    let mut buf = vec![0u8; chunk_size];
    loop {
        check_cancelled(cancel)?;

        let n = read_chunk(&mut source, &mut buf).await?;
        if n == 0 {
            break;
        }

        let tick = session.push_chunk(&buf[..n]).await?;
        tracing::debug!(chunk = tick, len = n, total = session.bytes_sent(), "pushed chunk");

        let next = options.pacing.after_chunk(tick);
        progress.chunk(next.marker, session.bytes_sent());
        pause(next.delay, cancel).await?;

        // A short read means the source is exhausted.
        if n < chunk_size {
            break;
        }
    }

    pause(options.pacing.finish_delay, cancel).await?;
    session.finish().await?;
    progress.finish(session.bytes_sent());

    Ok(banner)
}

async fn write_line<W: AsyncWrite + Unpin>(conn: &mut W, line: &[u8]) -> std::io::Result<()> {
    conn.write_all(line).await?;
    conn.flush().await
}

async fn read_banner<R: AsyncRead + Unpin>(conn: &mut R, banner_len: usize) -> Result<Bytes> {
    let mut banner = vec![0u8; banner_len];
    let mut received = 0;
    while received < banner_len {
        let n = conn
            .read(&mut banner[received..])
            .await
            .map_err(|e| FotaError::transport("reading session banner", e))?;
        if n == 0 {
            return Err(FotaError::Protocol {
                expected: banner_len,
                received,
            });
        }
        received += n;
    }
    Ok(Bytes::from(banner))
}

/// Fill `buf` from `source`, stopping early only at end of input.
async fn read_chunk<S: AsyncRead + Unpin>(source: &mut S, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source
            .read(&mut buf[filled..])
            .await
            .map_err(FotaError::SourceRead)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(FotaError::Cancelled)
    } else {
        Ok(())
    }
}

async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return check_cancelled(cancel);
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(FotaError::Cancelled),
    }
}
