//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module provides functionality to decode HTTP messages that use chunked transfer encoding
//! as specified in [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//!
//! The decoder is purely buffer driven: every call consumes as much of the source buffer as it
//! can and returns `Ok(None)` when it needs more bytes. It never assumes wire fragments line up
//! with chunk boundaries, so input may arrive one byte at a time or with many chunks per read.
//!
//! Lines are terminated by the [`Eol`] the response used for its status line. Most servers send
//! `\r\n`, a few broken ones send bare `\n` for the head and all chunk framing.

use crate::ensure;
use crate::protocol::{Eol, ParseError, PayloadItem};
use bytes::{Buf, Bytes, BytesMut};
use std::task::Poll;
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::*;

/// Longest chunk size line (size plus extensions) accepted before giving up.
pub const MAX_CHUNK_SIZE_LINE: usize = 4 * 1024;

/// Longest single trailer line accepted after the last chunk.
const MAX_TRAILER_LINE: usize = 8 * 1024;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// The decoder processes incoming bytes according to the chunked format:
/// - Each chunk starts with its size in hexadecimal
/// - Followed by optional extensions and the line terminator
/// - Then the chunk data and the line terminator
/// - A zero-sized chunk, optional trailers and an empty line end the message
///
/// Bytes following the final empty line are left in the source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    eol: Eol,
}

impl ChunkedDecoder {
    /// Creates a new ChunkedDecoder reading framing terminated by `eol`.
    ///
    /// The decoder starts in the Size state, ready to read the size of the first chunk.
    pub fn new(eol: Eol) -> Self {
        Self { state: Size, remaining_size: 0, eol }
    }

    /// Returns true once the last chunk and the trailer section have been consumed.
    pub fn is_finished(&self) -> bool {
        self.state == End
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new(Eol::CrLf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Waiting for a full chunk size line
    Size,
    /// Reading chunk data
    Body,
    /// Expecting the terminator after chunk data
    BodyEol,
    /// Skipping trailer lines until an empty line
    Trailer,
    /// Final state after the empty line following the last chunk
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when payload bytes are available
    /// - `Ok(Some(PayloadItem::Eof))` when the final chunk and trailers are processed
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError::MalformedChunk)` if the chunked framing is invalid
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                // need more data
                return Ok(None);
            }

            let mut buf = None;

            self.state = match self.state.step(src, &mut self.remaining_size, self.eol, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

impl ChunkedState {
    /// Processes the next step in the chunked decoding state machine.
    ///
    /// # Arguments
    /// * `src` - Source buffer containing the chunked data
    /// * `remaining_size` - Tracks remaining bytes in current chunk
    /// * `eol` - Line terminator used by this message
    /// * `buf` - Receives decoded chunk data
    fn step(
        self,
        src: &mut BytesMut,
        remaining_size: &mut u64,
        eol: Eol,
        buf: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, ParseError>> {
        match self {
            Size => ChunkedState::read_size(src, remaining_size, eol),
            Body => ChunkedState::read_body(src, remaining_size, buf),
            BodyEol => ChunkedState::read_body_eol(src, eol),
            Trailer => ChunkedState::read_trailer(src, eol),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// Reads a whole chunk size line and parses the size from it.
    ///
    /// # State Transitions
    /// - Line incomplete: stay in Size until more bytes arrive
    /// - Size 0: move to Trailer
    /// - Size > 0: move to Body
    fn read_size(src: &mut BytesMut, remaining_size: &mut u64, eol: Eol) -> Poll<Result<ChunkedState, ParseError>> {
        let Some(line_end) = eol.find_in(src) else {
            if src.len() > MAX_CHUNK_SIZE_LINE {
                return Poll::Ready(Err(ParseError::malformed_chunk("chunk size line too long")));
            }
            return Poll::Pending;
        };

        let line = src.split_to(line_end + eol.len());
        *remaining_size = match parse_chunk_size(&line[..line_end], eol) {
            Ok(size) => size,
            Err(e) => return Poll::Ready(Err(e)),
        };

        trace!(size = *remaining_size, "read chunk size");
        if *remaining_size == 0 { Poll::Ready(Ok(Trailer)) } else { Poll::Ready(Ok(Body)) }
    }

    /// Reads the actual chunk data bytes.
    ///
    /// Takes up to `remaining_size` bytes from whatever is buffered; the rest of the chunk
    /// may arrive in later calls.
    ///
    /// # State Transitions
    /// - Data still owed for this chunk: stay in Body
    /// - Chunk complete: move to BodyEol
    fn read_body(src: &mut BytesMut, remaining_size: &mut u64, buf: &mut Option<Bytes>) -> Poll<Result<ChunkedState, ParseError>> {
        if src.is_empty() {
            return Poll::Pending;
        }

        // cap remaining bytes at the max capacity of usize
        let remaining = usize::try_from(*remaining_size).unwrap_or(usize::MAX);
        let read_size = std::cmp::min(remaining, src.len());

        *remaining_size -= read_size as u64;
        *buf = Some(src.split_to(read_size).freeze());

        if *remaining_size > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyEol)) }
    }

    /// Validates the terminator following chunk data.
    ///
    /// A partial terminator waits for more bytes; any byte that cannot start or continue the
    /// terminator is an error right away.
    fn read_body_eol(src: &mut BytesMut, eol: Eol) -> Poll<Result<ChunkedState, ParseError>> {
        let expected = eol.as_bytes();
        let available = std::cmp::min(src.len(), expected.len());

        if src[..available] != expected[..available] {
            return Poll::Ready(Err(ParseError::malformed_chunk("invalid chunk data terminator")));
        }

        if available < expected.len() {
            return Poll::Pending;
        }

        src.advance(expected.len());
        Poll::Ready(Ok(Size))
    }

    /// Skips trailer fields after the last chunk.
    ///
    /// Trailers are read line by line and dropped. An empty line ends the message.
    fn read_trailer(src: &mut BytesMut, eol: Eol) -> Poll<Result<ChunkedState, ParseError>> {
        let Some(line_end) = eol.find_in(src) else {
            if src.len() > MAX_TRAILER_LINE {
                return Poll::Ready(Err(ParseError::malformed_chunk("trailer line too long")));
            }
            return Poll::Pending;
        };

        src.advance(line_end + eol.len());
        if line_end == 0 {
            Poll::Ready(Ok(End))
        } else {
            trace!(len = line_end, "skipped trailer line");
            Poll::Ready(Ok(Trailer))
        }
    }
}

/// Parses `<hex-size>[ *WS][;extension]` from a size line without its terminator.
///
/// Extensions are ignored, but with a `\r\n` terminator a bare `\n` inside the line is
/// rejected, the same way a strict line reader would see two lines there.
fn parse_chunk_size(line: &[u8], eol: Eol) -> Result<u64, ParseError> {
    ensure!(
        eol == Eol::Lf || !line.contains(&b'\n'),
        ParseError::malformed_chunk("chunk size line contains newline")
    );

    let size_part = match line.iter().position(|b| *b == b';') {
        Some(index) => &line[..index],
        None => line,
    };
    let digits = size_part.trim_ascii_end();
    ensure!(!digits.is_empty(), ParseError::malformed_chunk("missing chunk size"));

    let radix = 16;
    let mut size: u64 = 0;
    for b in digits {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b + 10 - b'a',
            b'A'..=b'F' => b + 10 - b'A',
            _ => return Err(ParseError::malformed_chunk("invalid chunk size")),
        };
        size = size
            .checked_mul(radix)
            .and_then(|s| s.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::malformed_chunk("invalid overflow chunked length"))?;
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked_block(data: &[u8], eol: Eol) -> Vec<u8> {
        let mut block = format!("{:x}", data.len()).into_bytes();
        block.extend_from_slice(eol.as_bytes());
        block.extend_from_slice(data);
        block.extend_from_slice(eol.as_bytes());
        block
    }

    /// Drains every item the decoder can produce from `buffer`.
    fn drain(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut, out: &mut Vec<u8>) -> Result<bool, ParseError> {
        loop {
            match decoder.decode(buffer)? {
                Some(PayloadItem::Chunk(bytes)) => out.extend_from_slice(&bytes),
                Some(PayloadItem::Eof) => return Ok(true),
                None => return Ok(false),
            }
        }
    }

    #[test]
    fn test_basic() {
        let mut buffer: BytesMut = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(item.is_chunk());
        assert_eq!(&item.as_bytes().unwrap()[..], b"1234567890abcdef");

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(item.is_eof());
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_hi_scenario() {
        let mut buffer = BytesMut::from(&b"2\r\nhi\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);
        let mut out = Vec::new();

        assert!(drain(&mut decoder, &mut buffer, &mut out).unwrap());
        assert_eq!(out, b"hi");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_chunks() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b", world"));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_chunks_with_extensions() {
        let mut buffer: BytesMut = BytesMut::from(&b"5;chunk-ext=value\r\nhello\r\n0 ;last\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);
        let mut out = Vec::new();

        assert!(drain(&mut decoder, &mut buffer, &mut out).unwrap());
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_chunks_with_trailers() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n0\r\nTrailer: value\r\nOther: x\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);
        let mut out = Vec::new();

        assert!(drain(&mut decoder, &mut buffer, &mut out).unwrap());
        assert_eq!(out, b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_leaves_following_bytes() {
        let mut buffer = BytesMut::from(&b"2\r\nhi\r\n0\r\n\r\nHTTP/1.1 200 OK\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);
        let mut out = Vec::new();

        assert!(drain(&mut decoder, &mut buffer, &mut out).unwrap());
        assert_eq!(&buffer[..], b"HTTP/1.1 200 OK\r\n");
    }

    #[test]
    fn test_incomplete_chunk() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        let chunk = decoder.decode(&mut buffer).unwrap();
        assert_eq!(chunk.unwrap().as_bytes().unwrap(), &Bytes::copy_from_slice(b"hel"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r\n0\r\n\r\n");

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"lo"));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_size_line_split() {
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);
        let mut buffer = BytesMut::from(&b"1"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"4\r");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"\nhihihihihihihihihihi\r\n0\r\n\r\n");
        let mut out = Vec::new();
        assert!(drain(&mut decoder, &mut buffer, &mut out).unwrap());
        assert_eq!(out, b"hi".repeat(10));
    }

    #[test]
    fn test_single_byte_fragments() {
        let data = b"2\r\nhi\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);
        let mut buffer = BytesMut::new();
        let mut out = Vec::new();
        let mut eof = false;

        for b in data {
            buffer.extend_from_slice(&[*b]);
            eof = drain(&mut decoder, &mut buffer, &mut out).unwrap();
        }

        assert!(eof);
        assert_eq!(out, b"hi");
    }

    #[test]
    fn test_many_block_boundaries() {
        let corpus: &[u8] = b"foo\r\nbar\r\nbaz\r\n";

        for step in 1..corpus.len() {
            let mut data: Vec<u8> = corpus.chunks(step).flat_map(|c| chunked_block(c, Eol::CrLf)).collect();
            data.extend_from_slice(&chunked_block(b"", Eol::CrLf));

            for wire_step in 1..data.len() {
                let mut decoder = ChunkedDecoder::new(Eol::CrLf);
                let mut buffer = BytesMut::new();
                let mut out = Vec::new();
                let mut eof = false;

                for fragment in data.chunks(wire_step) {
                    buffer.extend_from_slice(fragment);
                    eof = drain(&mut decoder, &mut buffer, &mut out).unwrap();
                }

                assert!(eof, "step {step} wire step {wire_step}");
                assert_eq!(out, corpus, "step {step} wire step {wire_step}");
            }
        }
    }

    #[test]
    fn test_small_chunk_blocks_large_wire_blocks() {
        let corpus: &[u8] = b"foo\r\nbar\r\nbaz\r\n";
        let mut data: Vec<u8> = corpus.chunks(1).flat_map(|c| chunked_block(c, Eol::CrLf)).collect();
        data.extend_from_slice(&chunked_block(b"", Eol::CrLf));

        let mut decoder = ChunkedDecoder::new(Eol::CrLf);
        let mut buffer = BytesMut::new();
        let mut out = Vec::new();
        let mut eof = false;
        for fragment in data.chunks(4) {
            buffer.extend_from_slice(fragment);
            eof = drain(&mut decoder, &mut buffer, &mut out).unwrap();
        }

        assert!(eof);
        assert_eq!(out, corpus);
    }

    #[test]
    fn test_bare_lf() {
        let mut buffer = BytesMut::from(&b"2\nhi\n0\n\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::Lf);
        let mut out = Vec::new();

        assert!(drain(&mut decoder, &mut buffer, &mut out).unwrap());
        assert_eq!(out, b"hi");
    }

    #[test]
    fn test_bare_lf_matches_crlf() {
        let payload = b"there\n".repeat(5);
        for eol in [Eol::CrLf, Eol::Lf] {
            let mut data = chunked_block(b"hi ", eol);
            data.extend_from_slice(&chunked_block(&payload, eol));
            data.extend_from_slice(&chunked_block(b"", eol));

            let mut decoder = ChunkedDecoder::new(eol);
            let mut buffer = BytesMut::new();
            let mut out = Vec::new();
            let mut eof = false;
            for b in &data {
                buffer.extend_from_slice(&[*b]);
                eof = drain(&mut decoder, &mut buffer, &mut out).unwrap();
            }

            assert!(eof);
            assert_eq!(&out[..3], b"hi ");
            assert_eq!(&out[3..], &payload[..]);
        }
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut buffer: BytesMut = BytesMut::from(&b"xyz\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::MalformedChunk { .. })));
    }

    #[test]
    fn test_empty_chunk_size() {
        let mut buffer: BytesMut = BytesMut::from(&b";ext\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::MalformedChunk { .. })));
    }

    #[test]
    fn test_overflow_chunk_size() {
        let mut buffer: BytesMut = BytesMut::from(&b"fffffffffffffffff\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::MalformedChunk { .. })));
    }

    #[test]
    fn test_extension_with_newline() {
        let mut buffer: BytesMut = BytesMut::from(&b"5;a\nb\r\nhello\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::MalformedChunk { .. })));
    }

    #[test]
    fn test_size_line_too_long() {
        let mut buffer = BytesMut::from(&vec![b'1'; MAX_CHUNK_SIZE_LINE + 1][..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::MalformedChunk { .. })));
    }

    #[test]
    fn test_missing_crlf() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::MalformedChunk { .. })));
    }

    #[test]
    fn test_partial_terminator_waits() {
        let mut buffer: BytesMut = BytesMut::from(&b"2\r\nhi\r"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&chunk.as_bytes().unwrap()[..], b"hi");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"x");
        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::MalformedChunk { .. })));
    }

    #[test]
    fn test_crlf_terminator_rejected_by_lf_reader() {
        let mut buffer: BytesMut = BytesMut::from(&b"2\nhi\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::Lf);

        decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::MalformedChunk { .. })));
    }

    #[test]
    fn test_large_chunk() {
        // Create a large chunk (1MB)
        let size = 1024 * 1024;
        let mut data = Vec::with_capacity(size + 16);
        data.extend(format!("{size:x}\r\n").into_bytes());
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), size);
        assert!(chunk.as_bytes().unwrap().iter().all(|&b| b == b'A'));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_zero_size_chunk() {
        let mut buffer: BytesMut = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(Eol::CrLf);

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }
}
