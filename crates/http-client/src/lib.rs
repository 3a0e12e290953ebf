//! An asynchronous micro HTTP/1.1 client transport
//!
//! This crate provides the transport layer of an HTTP/1.1 client built on top of tokio:
//! it writes requests to a channel, parses responses back, and reuses one channel for many
//! request/response exchanges. The focus is on exact body framing under adversarial network
//! conditions.
//!
//! # Features
//!
//! - Chunked transfer encoding that decodes across arbitrary fragmentation boundaries
//! - Tolerance for servers that terminate lines with a bare `\n`
//! - Chunked uploads in blocks of 32768 bytes for bodies of unknown size
//! - Keep-alive connections with detection of premature remote closure
//! - One transparent retry when a kept-alive channel turns out to be stale
//! - Read, write and connect timeouts that are reported apart from remote closure
//!
//! # Example
//!
//! ```no_run
//! use http::Request;
//! use micro_http_client::connection::{ConnectionConfig, HttpConnection, TcpConnector};
//! use micro_http_client::protocol::body::RequestBody;
//! use micro_http_client::protocol::HttpError;
//!
//! async fn fetch() -> Result<(), HttpError> {
//!     let connector = TcpConnector::new("127.0.0.1", 8080);
//!     let mut connection = HttpConnection::new(connector, ConnectionConfig::default());
//!
//!     let request = Request::post("/upload").body(RequestBody::from("hello")).unwrap();
//!     connection.request(request).await?;
//!
//!     let mut response = connection.get_response().await?;
//!     let first = response.read(16).await?;
//!     let rest = response.read_to_end().await?;
//!     println!("{} {} bytes", response.status(), first.len() + rest.len());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`connection`]: Connection lifecycle, request sending and response reading
//! - [`protocol`]: Protocol types, body readers and errors
//! - [`codec`]: Head and body encoders/decoders
//!
//! # Core Components
//!
//! ## Connection Handling
//!
//! [`connection::HttpConnection`] owns one channel obtained from a [`connection::Connector`].
//! A [`connection::Response`] borrows the connection, so a new request can only be sent once
//! the previous response is dropped.
//!
//! ## Body Reading
//!
//! [`protocol::body::PayloadReader`] separates feeding wire bytes from reading payload.
//! Feeding never blocks and reading never waits; the connection reads from the channel only
//! when the reader asks for more input.
//!
//! ## Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: Response parsing errors, including remote closure and timeouts
//! - [`protocol::SendError`]: Request sending errors
//!
//! # Limitations
//!
//! - HTTP/1.1 only, no pipelining
//! - No TLS support
//! - Maximum response head size: 8KB
//! - Maximum number of response headers: 64

pub mod codec;
pub mod connection;
pub mod protocol;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

mod utils;
pub(crate) use utils::ensure;
