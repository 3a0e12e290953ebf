//! HTTP header decoder implementation for parsing HTTP response heads
//!
//! This module decodes the status line and header fields of a response from raw bytes
//! into an `http::Response<()>`, and decides how the body that follows is framed.
//!
//! # Features
//!
//! - Header parsing using `httparse`
//! - Support for HTTP/1.0 and HTTP/1.1
//! - Tolerates servers that end every line with a bare `\n`; the line terminator found on
//!   the status line is reported so the chunked body decoder can use the same one
//! - Obsolete line folding is unfolded into a single space
//! - Interim `1xx` responses (other than `101`) are skipped
//! - Built-in protection against oversized heads
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB

use std::borrow::Cow;

use bytes::{Buf, BytesMut};
use http::{HeaderName, HeaderValue, Response, StatusCode, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::ensure;

use crate::protocol::{Eol, ParseError, PayloadSize, ResponseHead};

/// Maximum number of headers allowed in a response
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire head section
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP response heads implementing the [`Decoder`] trait.
///
/// Yields the parsed head, the [`PayloadSize`] describing how its body is framed and the
/// [`Eol`] the server used. The head bytes are removed from the source buffer; any body
/// bytes already received stay in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecoder {
    /// Responses to HEAD requests never carry a body whatever their headers say
    head_request: bool,
}

impl HeaderDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder for the response to a request made with `HEAD`.
    pub fn for_head_request() -> Self {
        Self { head_request: true }
    }
}

impl Decoder for HeaderDecoder {
    type Item = (ResponseHead, PayloadSize, Eol);
    type Error = ParseError;

    /// Attempts to decode a response head from the provided bytes buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((head, payload_size, eol)))` if a complete final head was parsed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(eol) = Eol::detect(src) else {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            };

            let Some((head, body_offset)) = parse_head(src)? else {
                return Ok(None);
            };

            src.advance(body_offset);

            if head.status().is_informational() && head.status() != StatusCode::SWITCHING_PROTOCOLS {
                trace!(status = head.status().as_u16(), "skipped interim response");
                continue;
            }

            let payload_size = parse_payload(&head, self.head_request)?;
            trace!(status = head.status().as_u16(), ?payload_size, ?eol, "decoded response head");
            return Ok(Some((head, payload_size, eol)));
        }
    }
}

/// Parses one head from the front of `src`, returning it with the offset of the body.
fn parse_head(src: &[u8]) -> Result<Option<(ResponseHead, usize)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut resp = httparse::Response::new(&mut headers);

    let parsed_result = httparse::ParserConfig::default()
        .allow_obsolete_multiline_headers_in_responses(true)
        .allow_spaces_after_header_name_in_responses(true)
        .parse_response(&mut resp, src)
        .map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            Error::Version => ParseError::InvalidVersion(None),
            Error::Status => ParseError::InvalidStatus(None),
            e => ParseError::invalid_header(e.to_string()),
        });

    let body_offset = match parsed_result? {
        Status::Complete(body_offset) => body_offset,
        Status::Partial => {
            ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
            return Ok(None);
        }
    };

    ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

    let version = match resp.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        v => return Err(ParseError::InvalidVersion(v)),
    };

    let status = resp
        .code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or(ParseError::InvalidStatus(resp.code))?;

    let mut head = Response::new(());
    *head.status_mut() = status;
    *head.version_mut() = version;

    let header_map = head.headers_mut();
    header_map.reserve(resp.headers.len());
    for header in resp.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(&unfold(header.value)).map_err(ParseError::invalid_header)?;
        header_map.append(name, value);
    }

    Ok(Some((head, body_offset)))
}

/// Replaces obsolete line folding (a line break followed by spaces or tabs) with one space.
fn unfold(value: &[u8]) -> Cow<'_, [u8]> {
    if !value.iter().any(|b| *b == b'\r' || *b == b'\n') {
        return Cow::Borrowed(value);
    }

    let mut unfolded = Vec::with_capacity(value.len());
    let mut iter = value.iter().copied().peekable();
    while let Some(b) = iter.next() {
        if b == b'\r' || b == b'\n' {
            while iter.next_if(|b| matches!(b, b'\r' | b'\n' | b' ' | b'\t')).is_some() {}
            unfolded.push(b' ');
        } else {
            unfolded.push(b);
        }
    }
    Cow::Owned(unfolded)
}

/// Determines how the body of a response is framed.
///
/// Follows RFC 9112 section 6.3:
/// - responses to HEAD, and `1xx`/`204`/`304` responses have no body
/// - Transfer-Encoding with chunked last means chunked, any other coding means the body
///   runs until the connection closes; Transfer-Encoding wins over Content-Length
/// - Content-Length gives a fixed length
/// - otherwise the body runs until the connection closes
///
/// # Errors
///
/// Returns `ParseError` if the Content-Length value is invalid or repeated with different values.
fn parse_payload(head: &ResponseHead, head_request: bool) -> Result<PayloadSize, ParseError> {
    let status = head.status();
    if head_request || status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return Ok(PayloadSize::Empty);
    }

    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length
    let te_header = head.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = head.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::UntilClose),

        (te_value @ Some(_), cl_value) => {
            if cl_value.is_some() {
                warn!("transfer-encoding and content-length both present, ignoring content-length");
            }
            if is_chunked(te_value) { Ok(PayloadSize::Chunked) } else { Ok(PayloadSize::UntilClose) }
        }

        (None, Some(_)) => {
            let mut length = None;
            for cl_value in head.headers().get_all(http::header::CONTENT_LENGTH) {
                let cl_str = cl_value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;
                let value = cl_str
                    .trim()
                    .parse::<u64>()
                    .map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

                match length {
                    Some(previous) if previous != value => {
                        return Err(ParseError::invalid_content_length("multiple different content-length values"));
                    }
                    _ => length = Some(value),
                }
            }

            Ok(length.map_or(PayloadSize::UntilClose, PayloadSize::Length))
        }
    }
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// According to RFC 9112, chunked must be the last encoding if present.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
        }
    }
    false
}

/// Returns true if the connection may be reused after this response.
///
/// HTTP/1.1 defaults to persistent connections unless `Connection: close` is sent,
/// HTTP/1.0 only keeps the connection with an explicit `Connection: keep-alive`.
pub fn is_keep_alive(head: &ResponseHead) -> bool {
    let has_token = |token: &str| {
        head.headers()
            .get_all(http::header::CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    };

    match head.version() {
        Version::HTTP_10 => has_token("keep-alive"),
        _ => !has_token("close"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use indoc::indoc;

    fn crlf(s: &str) -> String {
        s.replace('\n', "\r\n")
    }

    #[test]
    fn check_is_chunked() {
        {
            let headers = HeaderMap::new();
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)))
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
            assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "Chunked".parse().unwrap());
            assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }
    }

    #[test]
    fn chunked_response_keeps_body_bytes() {
        let str = crlf(indoc! {r##"
        HTTP/1.1 200 OK
        Server: BogusServer 1.0
        transfer-encoding: chunked

        2
        hi
        "##});

        let mut buf = BytesMut::from(str.as_str());
        let (head, payload_size, eol) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(head.version(), Version::HTTP_11);
        assert_eq!(head.headers().get(http::header::SERVER), Some(&HeaderValue::from_static("BogusServer 1.0")));
        assert_eq!(payload_size, PayloadSize::Chunked);
        assert_eq!(eol, Eol::CrLf);
        assert_eq!(&buf[..], b"2\r\nhi\r\n");
    }

    #[test]
    fn bare_lf_response() {
        let str = indoc! {r##"
        HTTP/1.1 200 OK
        Server: BogusServer 1.0
        transfer-encoding: chunked

        2
        hi
        "##};

        let mut buf = BytesMut::from(str);
        let (_head, payload_size, eol) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Chunked);
        assert_eq!(eol, Eol::Lf);
        assert_eq!(&buf[..], b"2\nhi\n");
    }

    #[test]
    fn content_length_response() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nThanks"[..]);
        let (_head, payload_size, _eol) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Length(6));
        assert_eq!(&buf[..], b"Thanks");
    }

    #[test]
    fn partial_head() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Len"[..]);
        assert!(HeaderDecoder::new().decode(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from(&b"HTTP/1.1 2"[..]);
        assert!(HeaderDecoder::new().decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn head_request_has_no_body() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\n"[..]);
        let (_head, payload_size, _eol) = HeaderDecoder::for_head_request().decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Empty);
    }

    #[test]
    fn no_content_and_not_modified() {
        for status in ["204 No Content", "304 Not Modified"] {
            let str = format!("HTTP/1.1 {status}\r\nContent-Length: 6\r\n\r\n");
            let mut buf = BytesMut::from(str.as_str());
            let (_head, payload_size, _eol) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();
            assert_eq!(payload_size, PayloadSize::Empty);
        }
    }

    #[test]
    fn skips_continue() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n"[..]);
        let (head, payload_size, _eol) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.status(), StatusCode::CREATED);
        assert_eq!(payload_size, PayloadSize::Length(0));
        assert!(buf.is_empty());
    }

    #[test]
    fn until_close_without_framing_headers() {
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\nServer: old\r\n\r\nbody"[..]);
        let (head, payload_size, _eol) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.version(), Version::HTTP_10);
        assert_eq!(payload_size, PayloadSize::UntilClose);
        assert!(!is_keep_alive(&head));
    }

    #[test]
    fn transfer_encoding_wins() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        let (_head, payload_size, _eol) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Chunked);
    }

    #[test]
    fn invalid_content_length() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: six\r\n\r\n"[..]);
        assert!(matches!(HeaderDecoder::new().decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));

        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nContent-Length: 7\r\n\r\n"[..]);
        assert!(matches!(HeaderDecoder::new().decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn folded_header() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nTwoLines: This header\r\n\thas two lines.\r\nContent-Length: 0\r\n\r\n"[..]);
        let (head, _payload_size, _eol) = HeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.headers().get("twolines"), Some(&HeaderValue::from_static("This header has two lines.")));
    }

    #[test]
    fn too_large_head() {
        let mut str = String::from("HTTP/1.1 200 OK\r\n");
        while str.len() <= MAX_HEADER_BYTES {
            str.push_str(&format!("X-Filler: {}\r\n", "a".repeat(1000)));
        }
        let mut buf = BytesMut::from(str.as_str());
        assert!(matches!(HeaderDecoder::new().decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn keep_alive_rules() {
        let head = Response::builder().version(Version::HTTP_11).body(()).unwrap();
        assert!(is_keep_alive(&head));

        let head = Response::builder().version(Version::HTTP_11).header("Connection", "close").body(()).unwrap();
        assert!(!is_keep_alive(&head));

        let head = Response::builder().version(Version::HTTP_10).header("Connection", "Keep-Alive").body(()).unwrap();
        assert!(is_keep_alive(&head));
    }
}
