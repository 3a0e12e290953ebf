//! Request and response bodies.
//!
//! [`PayloadReader`] drives one of the body decoders over bytes fed from the channel and
//! serves the decoded payload in pieces of the caller's choosing. The connection uses it
//! with [`PayloadDecoder`](crate::codec::PayloadDecoder) so one reader type covers every
//! framing mode; [`ChunkedReader`] and [`LengthReader`] name the single-mode readers.
//!
//! [`RequestBody`] is the ready-made outbound body: fixed bytes, a stream of frames, or
//! anything implementing `AsyncRead`.

mod payload_reader;
mod request_body;

pub use payload_reader::{ChunkedReader, LengthReader, PayloadReader};
pub use request_body::{BoxError, RequestBody};
