use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: SendError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: ParseError,
    },

    #[error("connect error: {source}")]
    Connect { source: io::Error },

    #[error("invalid connection state: {reason}")]
    InvalidState { reason: String },
}

impl HttpError {
    pub fn connect<E: Into<io::Error>>(e: E) -> Self {
        Self::Connect { source: e.into() }
    }

    pub fn invalid_state<S: ToString>(str: S) -> Self {
        Self::InvalidState { reason: str.to_string() }
    }

    /// Returns true if the peer closed the connection before the message was delimited.
    pub fn is_remote_closed(&self) -> bool {
        matches!(self, HttpError::ResponseError { source: ParseError::RemoteClosed })
    }

    /// Returns true if a connect, read or write deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        match self {
            HttpError::ResponseError { source: ParseError::Timeout } | HttpError::RequestError { source: SendError::Timeout } => true,
            HttpError::Connect { source } => source.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http status: {0:?}")]
    InvalidStatus(Option<u16>),

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("malformed chunk framing: {reason}")]
    MalformedChunk { reason: String },

    #[error("remote closed the connection before the message was complete")]
    RemoteClosed,

    #[error("timed out waiting for response data")]
    Timeout,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn malformed_chunk<S: ToString>(str: S) -> Self {
        Self::MalformedChunk { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true when a read failed because the peer already dropped the socket,
    /// which is how a stale keep-alive connection can answer the first read after a write.
    pub(crate) fn is_stale_connection(&self) -> bool {
        matches!(self, ParseError::Io { source } if is_stale_kind(source.kind()))
    }

    /// Builds an equivalent error so a failed body reader can report the same
    /// failure on every later read.
    ///
    /// `io::Error` is not `Clone`, so the io variant keeps only its kind and message.
    pub(crate) fn replay(&self) -> Self {
        match self {
            Self::TooLargeHeader { current_size, max_size } => Self::too_large_header(*current_size, *max_size),
            Self::TooManyHeaders { max_num } => Self::too_many_headers(*max_num),
            Self::InvalidHeader { reason } => Self::invalid_header(reason),
            Self::InvalidVersion(v) => Self::InvalidVersion(*v),
            Self::InvalidStatus(s) => Self::InvalidStatus(*s),
            Self::InvalidContentLength { reason } => Self::invalid_content_length(reason),
            Self::MalformedChunk { reason } => Self::malformed_chunk(reason),
            Self::RemoteClosed => Self::RemoteClosed,
            Self::Timeout => Self::Timeout,
            Self::Io { source } => Self::io(io::Error::new(source.kind(), source.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("timed out writing request")]
    Timeout,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true when the failure looks like the peer already dropped the socket,
    /// which is what a stale keep-alive connection produces on write.
    pub(crate) fn is_stale_connection(&self) -> bool {
        matches!(self, SendError::Io { source } if is_stale_kind(source.kind()))
    }
}

fn is_stale_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}
