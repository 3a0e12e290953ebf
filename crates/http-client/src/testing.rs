//! In-memory channel and connector for exercising a connection without sockets.
//!
//! A [`MockChannel`] replays scripted read fragments one per `read` call, which makes it easy
//! to deliver a response in adversarial pieces, and records everything written to it.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::connection::Connector;

/// Scripted duplex channel.
///
/// Each `read` returns at most one scripted fragment. Once the script is exhausted, reads
/// fail when [`fail_reads`](Self::fail_reads) was set, report end of file when
/// `close_on_empty` is set (the default), and otherwise stay pending forever, which is how a
/// silent server looks to the connection.
#[derive(Debug)]
pub struct MockChannel {
    reads: VecDeque<Bytes>,
    close_on_empty: bool,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
    written: Written,
}

/// Shared view of the bytes written to a [`MockChannel`].
#[derive(Debug, Clone, Default)]
pub struct Written {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl Written {
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannel {
    pub fn new() -> Self {
        Self { reads: VecDeque::new(), close_on_empty: true, read_error: None, write_error: None, written: Written::default() }
    }

    /// Appends one read fragment.
    #[must_use]
    pub fn with_read<B: Into<Bytes>>(mut self, bytes: B) -> Self {
        let bytes = bytes.into();
        if !bytes.is_empty() {
            self.reads.push_back(bytes);
        }
        self
    }

    /// Appends `bytes` as fragments of at most `piece` bytes.
    #[must_use]
    pub fn with_trickle(mut self, bytes: &[u8], piece: usize) -> Self {
        for chunk in bytes.chunks(piece.max(1)) {
            self.reads.push_back(Bytes::copy_from_slice(chunk));
        }
        self
    }

    #[must_use]
    pub fn close_on_empty(mut self, close: bool) -> Self {
        self.close_on_empty = close;
        self
    }

    /// Makes reads fail with `kind` once the scripted fragments are used up.
    #[must_use]
    pub fn fail_reads(mut self, kind: io::ErrorKind) -> Self {
        self.read_error = Some(kind);
        self
    }

    /// Makes every write fail with `kind`.
    #[must_use]
    pub fn fail_writes(mut self, kind: io::ErrorKind) -> Self {
        self.write_error = Some(kind);
        self
    }

    pub fn written(&self) -> Written {
        self.written.clone()
    }
}

impl AsyncRead for MockChannel {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.reads.pop_front() {
            Some(mut fragment) => {
                let n = fragment.len().min(buf.remaining());
                buf.put_slice(&fragment.split_to(n));
                if !fragment.is_empty() {
                    this.reads.push_front(fragment);
                }
                Poll::Ready(Ok(()))
            }
            None => match this.read_error {
                Some(kind) => Poll::Ready(Err(io::Error::from(kind))),
                None if this.close_on_empty => Poll::Ready(Ok(())),
                None => Poll::Pending,
            },
        }
    }
}

impl AsyncWrite for MockChannel {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if let Some(kind) = self.write_error {
            return Poll::Ready(Err(io::Error::from(kind)));
        }
        self.written.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Connector handing out scripted channels in order.
///
/// Connecting after the script is exhausted fails with `ConnectionRefused`.
#[derive(Debug, Clone)]
pub struct MockConnector {
    host: String,
    channels: Arc<Mutex<VecDeque<MockChannel>>>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self { host: host.into(), channels: Arc::default(), connects: Arc::default() }
    }

    #[must_use]
    pub fn with_channel(self, channel: MockChannel) -> Self {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner).push_back(channel);
        self
    }

    /// Number of times a channel was requested.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Io = MockChannel;

    async fn connect(&self) -> io::Result<MockChannel> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.channels.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        next.ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "no scripted channel left"))
    }

    fn host(&self) -> &str {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn reads_one_fragment_at_a_time() {
        let mut channel = MockChannel::new().with_read("ab").with_trickle(b"cd", 1);
        let mut buf = [0u8; 16];

        assert_eq!(channel.read(&mut buf).await.unwrap(), 2);
        assert_eq!(channel.read(&mut buf).await.unwrap(), 1);
        assert_eq!(&buf[..1], b"c");
        assert_eq!(channel.read(&mut buf).await.unwrap(), 1);
        assert_eq!(channel.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn small_buffer_keeps_rest() {
        let mut channel = MockChannel::new().with_read("abcdef");
        let mut buf = [0u8; 4];

        assert_eq!(channel.read(&mut buf).await.unwrap(), 4);
        assert_eq!(channel.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[tokio::test]
    async fn records_writes() {
        let mut channel = MockChannel::new();
        let written = channel.written();
        channel.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

        assert_eq!(written.bytes(), b"GET / HTTP/1.1\r\n");
    }

    #[tokio::test]
    async fn failing_reads_after_script() {
        let mut channel = MockChannel::new().with_read("ok").fail_reads(io::ErrorKind::ConnectionReset);
        let mut buf = [0u8; 4];

        assert_eq!(channel.read(&mut buf).await.unwrap(), 2);
        assert_eq!(channel.read(&mut buf).await.unwrap_err().kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn failing_writes() {
        let mut channel = MockChannel::new().fail_writes(io::ErrorKind::BrokenPipe);
        let result = channel.write_all(b"x").await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn connector_hands_out_channels_in_order() {
        let connector = MockConnector::new("example.com").with_channel(MockChannel::new().with_read("1"));

        let mut channel = connector.connect().await.unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(channel.read(&mut buf).await.unwrap(), 1);

        assert!(connector.connect().await.is_err());
        assert_eq!(connector.connects(), 2);
    }
}
