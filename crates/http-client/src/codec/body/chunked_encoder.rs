//! Encoder for request bodies sent with chunked transfer encoding.
//!
//! Each payload item becomes one or more chunks of at most [`CHUNK_BLOCK_SIZE`] bytes,
//! written as `<lowercase hex size>\r\n<data>\r\n`. [`PayloadItem::Eof`] writes the
//! terminal `0\r\n\r\n` without trailers. Outbound framing always uses `\r\n`.

use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::trace;

/// Largest payload carried by a single outbound chunk.
pub const CHUNK_BLOCK_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
    send_size: u64,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false, send_size: 0 }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(mut bytes) => {
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let len = chunk.len().min(CHUNK_BLOCK_SIZE);
                    write!(helper::Writer(dst), "{len:x}\r\n")?;
                    dst.reserve(len + 2);
                    dst.extend_from_slice(&chunk[..len]);
                    dst.extend_from_slice(b"\r\n");
                    bytes.advance(len);
                    self.send_size += len as u64;
                    trace!(len, "encoded chunk");
                }
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.extend_from_slice(b"0\r\n\r\n");
                trace!(total = self.send_size, "encoded last chunk");
                Ok(())
            }
        }
    }
}

mod helper {
    use bytes::{BufMut, BytesMut};
    use std::io;

    pub struct Writer<'a>(pub &'a mut BytesMut);

    impl io::Write for Writer<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.put_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
