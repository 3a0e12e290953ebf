//! HTTP response head type.
//!
//! The header decoder produces the status line and headers as `http::Response<()>`;
//! the body is served separately by the connection's payload reader.

use http::Response;

/// Type alias for HTTP response headers.
pub type ResponseHead = Response<()>;
