//! Decoder implementation for HTTP message payloads.
//!
//! This module provides a unified decoder for handling different types of HTTP response bodies:
//! - Content-Length based payloads
//! - Chunked transfer encoding
//! - Bodies delimited by connection close
//! - Messages with no body
//!
//! The header decoder picks the strategy from the response head, see [`PayloadSize`].

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{Eol, ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A unified decoder for handling HTTP message payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    /// The specific decoding strategy to use
    kind: Kind,
}

/// Enum representing different payload decoding strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),

    /// Everything until the peer closes the connection is payload
    UntilClose,

    /// Handle messages with no body
    NoBody,
}

impl PayloadDecoder {
    /// Creates a PayloadDecoder for messages with no body.
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// Creates a PayloadDecoder for chunked transfer encoding framed with `eol`.
    pub fn chunked(eol: Eol) -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new(eol)) }
    }

    /// Creates a PayloadDecoder for a fixed-length payload.
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    /// Creates a PayloadDecoder for a payload that ends when the connection closes.
    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose }
    }

    /// Builds the decoder matching the framing announced by a response head.
    pub fn from_payload_size(payload_size: PayloadSize, eol: Eol) -> Self {
        match payload_size {
            PayloadSize::Length(size) => Self::fix_length(size),
            PayloadSize::Chunked => Self::chunked(eol),
            PayloadSize::UntilClose => Self::until_close(),
            PayloadSize::Empty => Self::empty(),
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }

    pub fn is_fix_length(&self) -> bool {
        matches!(self.kind, Kind::Length(_))
    }

    /// Returns true when connection close is the normal end of this payload.
    pub fn ends_on_close(&self) -> bool {
        matches!(self.kind, Kind::UntilClose)
    }
}

/// Delegates to the appropriate decoder based on the payload type.
impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::UntilClose if src.is_empty() => Ok(None),
            Kind::UntilClose => Ok(Some(PayloadItem::Chunk(src.split().freeze()))),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_from_payload_size() {
        assert!(PayloadDecoder::from_payload_size(PayloadSize::Chunked, Eol::Lf).is_chunked());
        assert!(PayloadDecoder::from_payload_size(PayloadSize::Length(3), Eol::CrLf).is_fix_length());
        assert!(PayloadDecoder::from_payload_size(PayloadSize::Empty, Eol::CrLf).is_empty());
        assert!(PayloadDecoder::from_payload_size(PayloadSize::UntilClose, Eol::CrLf).ends_on_close());
    }

    #[test]
    fn until_close_takes_everything() {
        let mut decoder = PayloadDecoder::until_close();
        let mut buffer = BytesMut::from(&b"some bytes"[..]);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&item.as_bytes().unwrap()[..], b"some bytes");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn no_body_is_eof() {
        let mut decoder = PayloadDecoder::empty();
        let mut buffer = BytesMut::from(&b"HTTP/1.1 200 OK\r\n"[..]);

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(buffer.len(), 17);
    }
}
