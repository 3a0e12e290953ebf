//! Core HTTP protocol abstractions for the client.
//!
//! # Architecture
//!
//! - **Message Handling**: Core message types and payload processing
//!   - [`Message`]: Represents either a request head or payload chunks
//!   - [`PayloadItem`]: Handles individual payload chunks and EOF
//!   - [`PayloadSize`]: The framing of a body on the wire
//!   - [`Eol`]: Line terminator convention of a response
//!
//! - **Request Processing**: [`RequestHead`] wraps the outbound request line and headers
//!
//! - **Response Processing**: [`ResponseHead`] is the parsed status line and headers
//!
//! - **Body Reading** ([`body`]): [`body::PayloadReader`] turns fed wire bytes into payload
//!
//! - **Error Handling**: Error types
//!   - [`HttpError`]: Top-level error type
//!   - [`ParseError`]: Response parsing errors
//!   - [`SendError`]: Request sending errors

mod message;
pub use message::Eol;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHead;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
