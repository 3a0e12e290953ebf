//! HTTP header processing module for encoding request heads and decoding response heads
//!
//! # Components
//!
//! - [`HeaderDecoder`]: Decodes HTTP response heads from raw bytes
//!   - Supports standard HTTP/1.1 head format and bare `\n` line endings
//!   - Reports the body framing and line terminator of the response
//!   - Manages header size limits
//!
//! - [`HeaderEncoder`]: Encodes HTTP request heads to bytes
//!   - Implements standard HTTP/1.1 request line and header formatting
//!   - Manages content-length and transfer-encoding headers

mod header_decoder;
mod header_encoder;

pub use header_decoder::{HeaderDecoder, MAX_HEADER_BYTES, MAX_HEADER_NUM, is_keep_alive};
pub use header_encoder::HeaderEncoder;
