use bytes::{Buf, Bytes};

/// Represents a HTTP message that can either be a header or payload.
///
/// The request side of the client feeds these into the request encoder: first a
/// `Header`, then any number of `Payload` items ending with [`PayloadItem::Eof`].
pub enum Message<T, Data: Buf = Bytes> {
    /// Contains the header information of type `T`
    Header(T),
    /// Contains a chunk of payload data or EOF marker
    Payload(PayloadItem<Data>),
}

/// Represents an item in the HTTP message payload stream.
///
/// Body decoders produce these while reading a response and body encoders consume
/// them while writing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

/// How the extent of a message body is communicated on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes
    Length(u64),
    /// Payload using chunked transfer encoding
    Chunked,
    /// Empty payload (no body)
    Empty,
    /// Payload delimited by the peer closing the connection
    UntilClose,
}

impl PayloadSize {
    /// Returns true if the payload uses chunked transfer encoding
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    /// Returns true if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// Returns true if only connection close marks the end of the payload
    #[inline]
    pub fn is_until_close(&self) -> bool {
        matches!(self, PayloadSize::UntilClose)
    }
}

/// Line terminator used by a response for its head and chunk framing.
///
/// Well-behaved servers use `CRLF`; some broken ones send bare `LF` throughout.
/// The convention is taken from the status line and then fixed for the whole response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Eol {
    #[default]
    CrLf,
    Lf,
}

impl Eol {
    #[inline]
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Eol::CrLf => b"\r\n",
            Eol::Lf => b"\n",
        }
    }

    #[inline]
    pub fn len(self) -> usize {
        self.as_bytes().len()
    }

    /// Finds the first occurrence of this terminator, returning the index it starts at.
    pub fn find_in(self, src: &[u8]) -> Option<usize> {
        match self {
            Eol::Lf => src.iter().position(|b| *b == b'\n'),
            Eol::CrLf => src.windows(2).position(|w| w == b"\r\n"),
        }
    }

    /// Detects the terminator of the first line in `src`, if a full line is present.
    pub fn detect(src: &[u8]) -> Option<Self> {
        let lf = src.iter().position(|b| *b == b'\n')?;
        if lf > 0 && src[lf - 1] == b'\r' { Some(Eol::CrLf) } else { Some(Eol::Lf) }
    }
}

impl<T> Message<T> {
    /// Returns true if this message contains payload data
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    /// Returns true if this message contains header information
    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }
}

impl<T> From<Bytes> for Message<T> {
    fn from(bytes: Bytes) -> Self {
        Self::Payload(PayloadItem::Chunk(bytes))
    }
}

impl<D: Buf> PayloadItem<D> {
    /// Returns true if this item represents the end of the payload stream
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    /// Returns true if this item contains chunk data
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the PayloadItem and returns the contained bytes if this is a Chunk
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
