//! HTTP codec module for encoding requests and decoding responses
//!
//! This module provides the wire level pieces of the client. Every decoder works on
//! whatever bytes have arrived so far: it either produces an item, or returns `Ok(None)`
//! and leaves the partial input in place until more bytes are fed.
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RequestEncoder`]: Encodes outgoing HTTP requests
//!   - Head encoding via [`HeaderEncoder`]
//!   - Body framing via [`PayloadEncoder`], chunked or length delimited
//!
//! - Response handling:
//!   - [`HeaderDecoder`]: Decodes the response status line and headers
//!   - Body decoding via [`PayloadDecoder`], which wraps [`ChunkedDecoder`] and [`LengthDecoder`]
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_http_client::codec::ChunkedDecoder;
//! use micro_http_client::protocol::PayloadItem;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = ChunkedDecoder::default();
//! let mut buffer = BytesMut::from(&b"5\r\nhello\r\n0\r\n\r\n"[..]);
//!
//! let item = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(item.as_bytes().unwrap().as_ref(), b"hello");
//! assert!(matches!(decoder.decode(&mut buffer), Ok(Some(PayloadItem::Eof))));
//! ```

mod body;
mod header;
mod request_encoder;

pub use body::{CHUNK_BLOCK_SIZE, ChunkedDecoder, LengthDecoder, MAX_CHUNK_SIZE_LINE, PayloadDecoder, PayloadEncoder};
pub use header::{HeaderDecoder, HeaderEncoder, MAX_HEADER_BYTES, MAX_HEADER_NUM, is_keep_alive};
pub use request_encoder::RequestEncoder;
