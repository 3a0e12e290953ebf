use std::cmp;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::{ChunkedDecoder, LengthDecoder, PayloadDecoder};
use crate::protocol::{Eol, ParseError, PayloadItem, PayloadSize};

/// Reader for a chunked transfer-encoded body.
pub type ChunkedReader = PayloadReader<ChunkedDecoder>;

/// Reader for a body delimited by `content-length`.
pub type LengthReader = PayloadReader<LengthDecoder>;

/// Incremental body reader that separates receiving wire bytes from consuming payload.
///
/// Bytes arrive through [`feed`](Self::feed) in whatever fragments the channel delivers;
/// the decoder turns them into payload as soon as enough framing is buffered. Consumers pull
/// decoded bytes with [`read`](Self::read), which never blocks: `Ok(None)` means more input
/// is needed.
///
/// When the channel reports closure via [`close`](Self::close) before the body is delimited,
/// every read that cannot be served from already decoded bytes fails with
/// [`ParseError::RemoteClosed`]. A framing error is reported the same way: decoded bytes
/// that precede it are served first, then the error is returned on every later read.
#[derive(Debug)]
pub struct PayloadReader<D> {
    decoder: D,
    buffer: BytesMut,
    decoded: BytesMut,
    eof: bool,
    closed: bool,
    close_delimited: bool,
    fault: Option<ParseError>,
}

impl<D> PayloadReader<D>
where
    D: Decoder<Item = PayloadItem, Error = ParseError>,
{
    pub fn new(decoder: D) -> Self {
        Self::with_buffer(decoder, BytesMut::new())
    }

    /// Creates a reader whose first input is `buffer`, usually the bytes that followed the
    /// response head in the same read.
    pub fn with_buffer(decoder: D, buffer: BytesMut) -> Self {
        let mut reader = Self {
            decoder,
            buffer,
            decoded: BytesMut::new(),
            eof: false,
            closed: false,
            close_delimited: false,
            fault: None,
        };
        reader.advance();
        reader
    }

    /// Appends received wire bytes and decodes as much as possible.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.advance();
    }

    /// Records that the channel will deliver no more bytes.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns up to `amt` decoded payload bytes.
    ///
    /// * `Ok(Some(PayloadItem::Chunk(bytes)))` with `1..=amt` bytes, or empty when `amt` is 0
    ///   and the body is not known to be over yet
    /// * `Ok(Some(PayloadItem::Eof))` once the body is complete and fully consumed
    /// * `Ok(None)` when more input must be fed first
    ///
    /// # Errors
    ///
    /// Returns the framing error found while decoding, or [`ParseError::RemoteClosed`] when the
    /// channel closed before the body was delimited.
    pub fn read(&mut self, amt: usize) -> Result<Option<PayloadItem>, ParseError> {
        self.advance();

        if !self.decoded.is_empty() {
            let n = cmp::min(amt, self.decoded.len());
            return Ok(Some(PayloadItem::Chunk(self.decoded.split_to(n).freeze())));
        }

        if let Some(fault) = &self.fault {
            return Err(fault.replay());
        }

        if self.eof {
            return Ok(Some(PayloadItem::Eof));
        }

        if self.closed {
            if self.close_delimited {
                debug!("connection closed, close delimited body complete");
                self.eof = true;
                return Ok(Some(PayloadItem::Eof));
            }
            debug!(buffered = self.buffer.len(), "connection closed before body was complete");
            self.fault = Some(ParseError::RemoteClosed);
            return Err(ParseError::RemoteClosed);
        }

        if amt == 0 {
            return Ok(Some(PayloadItem::Chunk(Bytes::new())));
        }
        Ok(None)
    }

    /// Returns true once the body is delimited and every decoded byte was read.
    pub fn is_finished(&self) -> bool {
        self.eof && self.decoded.is_empty()
    }

    /// Returns true once the decoder reached the end of the body, even if decoded
    /// bytes are still waiting to be read.
    pub fn is_complete(&self) -> bool {
        self.eof
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns true when a framing error or premature closure was recorded.
    pub fn is_failed(&self) -> bool {
        self.fault.is_some()
    }

    /// Number of decoded bytes ready to be read without further input.
    pub fn available(&self) -> usize {
        self.decoded.len()
    }

    /// Consumes the reader, returning the bytes buffered beyond the end of the body.
    pub fn into_remainder(self) -> BytesMut {
        self.buffer
    }

    fn advance(&mut self) {
        while !self.eof && self.fault.is_none() {
            match self.decoder.decode(&mut self.buffer) {
                Ok(Some(PayloadItem::Chunk(bytes))) => {
                    trace!(len = bytes.len(), "decoded payload bytes");
                    self.decoded.extend_from_slice(&bytes);
                }
                Ok(Some(PayloadItem::Eof)) => {
                    trace!(remainder = self.buffer.len(), "payload complete");
                    self.eof = true;
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(cause = %e, "failed to decode payload");
                    self.fault = Some(e);
                }
            }
        }
    }
}

impl PayloadReader<PayloadDecoder> {
    /// Builds the reader for a response body with the given framing.
    pub fn from_payload_size(payload_size: PayloadSize, eol: Eol, buffer: BytesMut) -> Self {
        let mut reader = Self::with_buffer(PayloadDecoder::from_payload_size(payload_size, eol), buffer);
        reader.close_delimited = payload_size.is_until_close();
        reader
    }
}

impl ChunkedReader {
    /// Creates a reader for chunked framing that uses `eol` as line terminator.
    pub fn chunked(eol: Eol) -> Self {
        Self::new(ChunkedDecoder::new(eol))
    }
}

impl LengthReader {
    /// Creates a reader for a body of exactly `length` bytes.
    pub fn length(length: u64) -> Self {
        Self::new(LengthDecoder::new(length))
    }
}
