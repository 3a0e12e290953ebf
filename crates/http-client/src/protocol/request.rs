//! HTTP request head handling for the client side.
//!
//! A request is split into its head and its body before it is written: the head goes
//! through the header encoder, the body through the payload encoder. [`RequestHead`]
//! wraps `http::Request<()>` and answers the questions the connection asks while
//! framing the request.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// The head of an outbound HTTP request.
#[derive(Debug)]
pub struct RequestHead {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHead {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHead {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHead {
    /// Consumes the head and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// The request target written on the request line.
    ///
    /// Only origin-form is produced: the path and query, defaulting to `/`.
    pub fn target(&self) -> &str {
        self.uri().path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// Returns true for methods whose requests normally carry a body, so an empty
    /// body is still announced with `content-length: 0`.
    pub fn expects_body(&self) -> bool {
        matches!(self.method(), &Method::POST | &Method::PUT | &Method::PATCH)
    }

    /// Returns true if the response to this request never has a body.
    pub fn is_head(&self) -> bool {
        self.method() == Method::HEAD
    }
}

impl From<Parts> for RequestHead {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHead {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
