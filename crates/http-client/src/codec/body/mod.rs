//! HTTP body handling module for decoding response payloads and encoding request payloads
//!
//! This module provides functionality for encoding and decoding HTTP message bodies
//! using different transfer strategies. It supports both chunked transfer encoding
//! and content-length based transfers.
//!
//! # Components
//!
//! ## Decoders
//! - [`ChunkedDecoder`]: Handles chunked transfer encoded payloads, with `\r\n` or bare `\n` framing
//! - [`LengthDecoder`]: Processes fixed-length payloads
//! - [`PayloadDecoder`]: Main decoder that coordinates different decoding strategies
//!
//! ## Encoders
//! - `ChunkedEncoder`: Implements chunked transfer encoding in blocks of at most [`CHUNK_BLOCK_SIZE`]
//! - `LengthEncoder`: Handles fixed-length payload encoding
//! - [`PayloadEncoder`]: Main encoder that manages different encoding strategies
//!
//! All decoders are pure state machines over a `BytesMut`: they never perform I/O and
//! return `Ok(None)` when they need more input.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::{ChunkedDecoder, MAX_CHUNK_SIZE_LINE};
pub use chunked_encoder::CHUNK_BLOCK_SIZE;
pub use length_decoder::LengthDecoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
