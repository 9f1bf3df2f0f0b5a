//! Concurrent connection I/O over any async byte stream.
//!
//! A [`Connection`] splits its stream into two background pumps: a writer
//! that serializes queued outbound lines (applying the optional
//! [`FloodPolicy`] delay before each physical write) and a reader that
//! frames the inbound byte stream into complete CR-LF-terminated lines.
//! Callers interact only through channels, so any number of tasks may
//! write concurrently while one consumer drains inbound messages.

mod flood;

pub use flood::FloodPolicy;
use flood::FloodState;

use std::io;
use std::time::Instant;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::ConnError;

const WRITE_QUEUE: usize = 64;
const READ_QUEUE: usize = 64;
const READ_CHUNK: usize = 4096;

/// One queued outbound line with its completion signal.
struct WriteRequest {
    buf: Vec<u8>,
    done: oneshot::Sender<io::Result<()>>,
}

/// A connection over any async byte stream, pumped by two background
/// tasks once [`spawn_workers`](Connection::spawn_workers) runs.
pub struct Connection<S> {
    name: String,
    read_half: Option<ReadHalf<S>>,
    write_half: Option<WriteHalf<S>>,
    flood: Option<FloodPolicy>,
    write_tx: Option<mpsc::Sender<WriteRequest>>,
    read_rx: Option<mpsc::Receiver<Vec<u8>>>,
    shutdown: watch::Sender<bool>,
    writer_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
    leftover: Vec<u8>,
    closed: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a stream. `name` tags this connection's log output.
    pub fn new(stream: S, name: impl Into<String>) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let (shutdown, _) = watch::channel(false);
        Self {
            name: name.into(),
            read_half: Some(read_half),
            write_half: Some(write_half),
            flood: None,
            write_tx: None,
            read_rx: None,
            shutdown,
            writer_task: None,
            reader_task: None,
            leftover: Vec::new(),
            closed: false,
        }
    }

    /// Throttle the write path with `policy`.
    pub fn with_flood(mut self, policy: FloodPolicy) -> Self {
        self.flood = Some(policy);
        self
    }

    /// The log tag given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the requested pumps. Each half is consumed the first time
    /// its pump is requested; repeat calls are no-ops.
    pub fn spawn_workers(&mut self, writer: bool, reader: bool) {
        if self.closed {
            return;
        }
        if writer {
            if let Some(half) = self.write_half.take() {
                let (tx, rx) = mpsc::channel(WRITE_QUEUE);
                self.write_tx = Some(tx);
                let flood = self.flood.map(FloodState::new);
                self.writer_task = Some(tokio::spawn(write_pump(
                    half,
                    rx,
                    self.shutdown.subscribe(),
                    flood,
                    self.name.clone(),
                )));
            }
        }
        if reader {
            if let Some(half) = self.read_half.take() {
                let (tx, rx) = mpsc::channel(READ_QUEUE);
                self.read_rx = Some(rx);
                self.reader_task = Some(tokio::spawn(read_pump(
                    half,
                    tx,
                    self.shutdown.subscribe(),
                    self.name.clone(),
                )));
            }
        }
    }

    /// Queue `buf` for writing and wait for the physical write to finish.
    ///
    /// The buffer may hold several lines; each is queued separately and a
    /// CR-LF terminator is appended where missing. Queued lines from a
    /// single call stay contiguous, and lines from concurrent callers are
    /// written in queue order.
    pub async fn write(&self, buf: &[u8]) -> Result<(), ConnError> {
        let tx = self.write_tx.as_ref().ok_or(ConnError::Closed)?;
        for line in split_lines(buf) {
            let (done, done_rx) = oneshot::channel();
            tx.send(WriteRequest { buf: line, done })
                .await
                .map_err(|_| ConnError::Closed)?;
            done_rx.await.map_err(|_| ConnError::Closed)??;
        }
        Ok(())
    }

    /// The next complete inbound line, without its terminator. `None`
    /// once the peer closes or the reader pump stops.
    pub async fn read_message(&mut self) -> Option<Vec<u8>> {
        self.read_rx.as_mut()?.recv().await
    }

    /// Direct access to the inbound line channel, for callers that want
    /// to `select!` over it themselves.
    pub fn reader(&mut self) -> Option<&mut mpsc::Receiver<Vec<u8>>> {
        self.read_rx.as_mut()
    }

    /// Byte-stream view of the framed inbound lines: fills `out` from the
    /// current line, carrying any remainder into the next call. `Ok(0)`
    /// means end of stream.
    pub async fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.leftover.is_empty() {
            match self.read_message().await {
                Some(line) => self.leftover = line,
                None => return Ok(0),
            }
        }
        let n = out.len().min(self.leftover.len());
        out[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.drain(..n);
        Ok(n)
    }

    /// Stop both pumps and wait for them to exit. Idempotent; pending
    /// writes fail with [`ConnError::Closed`].
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.shutdown.send(true);
        self.write_tx = None;
        self.read_rx = None;
        if let Some(task) = self.writer_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.reader_task.take() {
            let _ = task.await;
        }
        debug!(name = %self.name, "connection closed");
    }

    /// Whether [`close`](Connection::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Split an outbound buffer into CR-LF-terminated lines, appending the
/// terminator where missing and dropping empty lines.
fn split_lines(buf: &[u8]) -> Vec<Vec<u8>> {
    buf.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut out = Vec::with_capacity(line.len() + 2);
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
            out
        })
        .collect()
}

/// Scan `buf` for complete CR-LF-terminated chunks, invoking `chunk` for
/// each (terminator included). Returns the offset where the unterminated
/// remainder starts and whether such a remainder exists. The callback
/// returns `true` to abort the scan early.
pub(crate) fn split_chunks(buf: &[u8], mut chunk: impl FnMut(&[u8]) -> bool) -> (usize, bool) {
    let mut start = 0;
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            let abort = chunk(&buf[start..i + 2]);
            start = i + 2;
            i = start;
            if abort {
                break;
            }
        } else {
            i += 1;
        }
    }
    (start, start < buf.len())
}

async fn write_pump<S: AsyncWrite + Send>(
    mut half: WriteHalf<S>,
    mut rx: mpsc::Receiver<WriteRequest>,
    mut shutdown: watch::Receiver<bool>,
    mut flood: Option<FloodState>,
    name: String,
) {
    loop {
        let req = tokio::select! {
            _ = shutdown.changed() => break,
            req = rx.recv() => match req {
                Some(req) => req,
                None => break,
            },
        };
        if let Some(state) = flood.as_ref() {
            let wait = state.delay(Instant::now());
            if !wait.is_zero() {
                trace!(name = %name, ?wait, "flood throttle");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
        let res = half.write_all(&req.buf).await;
        if let Some(state) = flood.as_mut() {
            state.record(Instant::now());
        }
        let failed = res.is_err();
        if let Err(err) = &res {
            warn!(name = %name, %err, "write failed");
        }
        let _ = req.done.send(res);
        if failed {
            break;
        }
    }
    let _ = half.shutdown().await;
    trace!(name = %name, "writer stopped");
}

async fn read_pump<S: AsyncRead + Send>(
    mut half: ReadHalf<S>,
    tx: mpsc::Sender<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
    name: String,
) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    'outer: loop {
        let n = tokio::select! {
            _ = shutdown.changed() => break,
            res = half.read_buf(&mut buf) => match res {
                Ok(n) => n,
                Err(err) => {
                    warn!(name = %name, %err, "read failed");
                    break;
                }
            },
        };
        if n == 0 {
            // EOF. Any unterminated trailing fragment is discarded.
            break;
        }
        let mut lines = Vec::new();
        let (consumed, _) = split_chunks(&buf, |chunk| {
            lines.push(chunk[..chunk.len() - 2].to_vec());
            false
        });
        buf.advance(consumed);
        for line in lines {
            tokio::select! {
                _ = shutdown.changed() => break 'outer,
                sent = tx.send(line) => {
                    if sent.is_err() {
                        break 'outer;
                    }
                }
            }
        }
    }
    trace!(name = %name, "reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunks_complete_and_remainder() {
        let mut seen = Vec::new();
        let (consumed, rest) = split_chunks(b"a\r\nbb\r\nccc", |c| {
            seen.push(c.to_vec());
            false
        });
        assert_eq!(seen, vec![b"a\r\n".to_vec(), b"bb\r\n".to_vec()]);
        assert_eq!(consumed, 7);
        assert!(rest);
    }

    #[test]
    fn test_split_chunks_exact() {
        let mut count = 0;
        let (consumed, rest) = split_chunks(b"one\r\ntwo\r\n", |_| {
            count += 1;
            false
        });
        assert_eq!(count, 2);
        assert_eq!(consumed, 10);
        assert!(!rest);
    }

    #[test]
    fn test_split_chunks_abort() {
        let mut seen = Vec::new();
        let (consumed, rest) = split_chunks(b"a\r\nb\r\nc\r\n", |c| {
            seen.push(c.to_vec());
            true
        });
        assert_eq!(seen.len(), 1);
        assert_eq!(consumed, 3);
        assert!(rest);
    }

    #[test]
    fn test_split_chunks_empty() {
        let (consumed, rest) = split_chunks(b"", |_| false);
        assert_eq!(consumed, 0);
        assert!(!rest);
    }

    #[test]
    fn test_split_lines_appends_terminator() {
        assert_eq!(split_lines(b"PING :x"), vec![b"PING :x\r\n".to_vec()]);
        assert_eq!(split_lines(b"PING :x\r\n"), vec![b"PING :x\r\n".to_vec()]);
        assert_eq!(
            split_lines(b"a\r\nb"),
            vec![b"a\r\n".to_vec(), b"b\r\n".to_vec()]
        );
        assert!(split_lines(b"").is_empty());
        assert!(split_lines(b"\r\n\r\n").is_empty());
    }

    #[tokio::test]
    async fn test_write_then_close() {
        let (local, mut remote) = tokio::io::duplex(256);
        let mut conn = Connection::new(local, "test");
        conn.spawn_workers(true, false);

        conn.write(b"NICK nick1").await.unwrap();
        let mut buf = [0u8; 12];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"NICK nick1\r\n");

        conn.close().await;
        assert!(conn.is_closed());
        assert!(matches!(conn.write(b"x").await, Err(ConnError::Closed)));
        // Repeat close is a no-op.
        conn.close().await;
    }

    #[tokio::test]
    async fn test_reader_frames_lines() {
        let (local, mut remote) = tokio::io::duplex(256);
        let mut conn = Connection::new(local, "test");
        conn.spawn_workers(false, true);

        remote.write_all(b"PING :a\r\nPRI").await.unwrap();
        assert_eq!(conn.read_message().await.unwrap(), b"PING :a".to_vec());

        remote.write_all(b"VMSG #c :hi\r\n").await.unwrap();
        assert_eq!(
            conn.read_message().await.unwrap(),
            b"PRIVMSG #c :hi".to_vec()
        );

        // A trailing fragment with no terminator is never delivered.
        remote.write_all(b"PART").await.unwrap();
        drop(remote);
        assert!(conn.read_message().await.is_none());
        conn.close().await;
    }

    #[tokio::test]
    async fn test_byte_stream_read() {
        let (local, mut remote) = tokio::io::duplex(256);
        let mut conn = Connection::new(local, "test");
        conn.spawn_workers(false, true);

        remote.write_all(b"abcde\r\n").await.unwrap();
        drop(remote);

        let mut out = [0u8; 3];
        assert_eq!(conn.read(&mut out).await.unwrap(), 3);
        assert_eq!(&out, b"abc");
        assert_eq!(conn.read(&mut out).await.unwrap(), 2);
        assert_eq!(&out[..2], b"de");
        assert_eq!(conn.read(&mut out).await.unwrap(), 0);
        conn.close().await;
    }
}
