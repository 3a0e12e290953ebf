use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

/// Writes a body whose length was announced with `content-length`.
///
/// The body must match the announced length exactly: extra bytes or an early
/// [`PayloadItem::Eof`] fail with [`SendError::InvalidBody`], since the server would
/// otherwise misread the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            warn!("encode payload_item but no need to encode anymore");
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(mut bytes) => {
                let len = bytes.remaining() as u64;
                if len > self.length {
                    return Err(SendError::invalid_body(format!("body exceeds content-length by {} bytes", len - self.length)));
                }
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(n);
                }
                self.length -= len;
                Ok(())
            }
            PayloadItem::Eof => {
                if self.length > 0 {
                    return Err(SendError::invalid_body(format!("body ended {} bytes short of content-length", self.length)));
                }
                self.eof = true;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn exact_length() {
        let mut encoder = LengthEncoder::new(6);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"Tha")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"nks")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"Thanks");
        assert!(encoder.is_finish());
    }

    #[test]
    fn too_long() {
        let mut encoder = LengthEncoder::new(2);
        let mut dst = BytesMut::new();

        let result = encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut dst);
        assert!(matches!(result, Err(SendError::InvalidBody { .. })));
    }

    #[test]
    fn too_short() {
        let mut encoder = LengthEncoder::new(4);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"ab")), &mut dst).unwrap();
        let result = encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst);
        assert!(matches!(result, Err(SendError::InvalidBody { .. })));
    }
}
