//! HTTP header encoder implementation for serializing HTTP request heads
//!
//! This module serializes the request line and header fields of an outbound request and
//! sets the Content-Length or Transfer-Encoding header from the chosen [`PayloadSize`].
//!
//! The `host` header, when present, is always written first; the other headers follow in
//! map order. Lines are always terminated with `\r\n`.

use crate::protocol::{PayloadSize, RequestHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const CHUNKED_VALUE: HeaderValue = HeaderValue::from_static("chunked");
const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");

/// Encoder for HTTP request heads implementing the [`Encoder`] trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl Encoder<(RequestHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Encodes an HTTP request head into the provided bytes buffer.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - HTTP version is not supported (only HTTP/1.1 supported)
    /// - Writing to buffer fails
    fn encode(&mut self, item: (RequestHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match head.version() {
            Version::HTTP_11 => {
                write!(FastWrite(dst), "{} {} HTTP/1.1\r\n", head.method().as_str(), head.target())?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        // Set appropriate content length or transfer encoding header
        let expects_body = head.expects_body();
        let headers = head.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, CHUNKED_VALUE);
            }
            PayloadSize::Empty | PayloadSize::UntilClose => {
                headers.remove(header::TRANSFER_ENCODING);
                if expects_body {
                    headers.insert(header::CONTENT_LENGTH, ZERO_VALUE);
                } else {
                    headers.remove(header::CONTENT_LENGTH);
                }
            }
        }

        if let Some(host) = head.headers().get(header::HOST) {
            put_header(dst, header::HOST.as_str(), host);
        }

        for (header_name, header_value) in head.headers().iter() {
            if header_name != header::HOST {
                put_header(dst, header_name.as_str(), header_value);
            }
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn put_header(dst: &mut BytesMut, name: &str, value: &HeaderValue) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

/// Writer adapter so `write!` can format straight into a `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn encode(request: Request<()>, payload_size: PayloadSize) -> BytesMut {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((RequestHead::from(request), payload_size), &mut dst).unwrap();
        dst
    }

    #[test]
    fn chunked_post() {
        let request = Request::post("/")
            .header("accept-encoding", "identity")
            .header("host", "1.2.3.4")
            .body(())
            .unwrap();

        let dst = encode(request, PayloadSize::Chunked);
        assert_eq!(
            &dst[..],
            b"POST / HTTP/1.1\r\nhost: 1.2.3.4\r\naccept-encoding: identity\r\ntransfer-encoding: chunked\r\n\r\n"
        );
    }

    #[test]
    fn length_replaces_transfer_encoding() {
        let request = Request::put("/upload?x=1").header("transfer-encoding", "chunked").body(()).unwrap();

        let dst = encode(request, PayloadSize::Length(6));
        assert_eq!(&dst[..], b"PUT /upload?x=1 HTTP/1.1\r\ncontent-length: 6\r\n\r\n");
    }

    #[test]
    fn empty_get_has_no_framing() {
        let request = Request::get("/").header("content-length", "10").body(()).unwrap();

        let dst = encode(request, PayloadSize::Empty);
        assert_eq!(&dst[..], b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn empty_post_has_zero_length() {
        let request = Request::post("/").body(()).unwrap();

        let dst = encode(request, PayloadSize::Empty);
        assert_eq!(&dst[..], b"POST / HTTP/1.1\r\ncontent-length: 0\r\n\r\n");
    }

    #[test]
    fn unsupported_version() {
        let request = Request::get("/").version(Version::HTTP_2).body(()).unwrap();
        let mut dst = BytesMut::new();

        let result = HeaderEncoder.encode((RequestHead::from(request), PayloadSize::Empty), &mut dst);
        assert!(matches!(result, Err(SendError::Io { .. })));
    }
}
