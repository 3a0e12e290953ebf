//! HTTP client connection handling
//!
//! # Components
//!
//! - [`HttpConnection`]: Runs request/response exchanges over one reused channel
//!   - Sends request heads and bodies, chunked or length delimited
//!   - Reads response heads and serves bodies through [`Response`]
//!   - Detects a server that closed the channel before the body ended
//!   - Sends a request again once when a kept-alive channel went stale
//!
//! - [`Connector`]: Opens channels, with [`TcpConnector`] for plain TCP
//!
//! - [`ConnectionConfig`]: Timeouts, buffer size and the stale channel retry switch

mod config;
mod connector;
mod http_connection;
mod message_writer;

pub use config::ConnectionConfig;
pub use connector::{Connector, LocalConnector, TcpConnector};
pub use http_connection::{HttpConnection, Response};
pub(crate) use message_writer::MessageWriter;
