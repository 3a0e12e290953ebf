use std::fmt;
use std::fmt::Display;
use std::io;

use bytes::{Bytes, BytesMut};
use http::header::{ACCEPT_ENCODING, AsHeaderName, HOST};
use http::{HeaderMap, HeaderValue, Request, StatusCode, Version};
use http_body::Body;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{HeaderDecoder, PayloadDecoder, is_keep_alive};
use crate::connection::{ConnectionConfig, Connector, MessageWriter};
use crate::protocol::body::PayloadReader;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHead, ResponseHead, SendError};

const IDENTITY: HeaderValue = HeaderValue::from_static("identity");

/// A client connection to one origin server.
///
/// `HttpConnection` owns at most one channel at a time and runs request/response exchanges
/// over it one after another:
///
/// 1. [`request`](Self::request) writes the request head and body, connecting first if needed
/// 2. [`get_response`](Self::get_response) reads the response head
/// 3. [`Response::read`] serves the body, reading from the channel as needed
///
/// Once a body is read to its end the channel is kept for the next request, unless the server
/// asked to close it or the body was delimited by closing the connection.
pub struct HttpConnection<C: Connector> {
    connector: C,
    config: ConnectionConfig,
    io: Option<C::Io>,
    read_buf: BytesMut,
    writer: MessageWriter,
    reader: Option<PayloadReader<PayloadDecoder>>,
    keep_alive: bool,
    in_flight: Option<InFlight>,
    exchanges: usize,
}

/// A request that was sent and whose response head was not read yet.
#[derive(Debug)]
struct InFlight {
    head_request: bool,
    // encoded request, kept when the body had an exact size so it can be sent again
    replay: Option<Bytes>,
}

impl<C: Connector> HttpConnection<C> {
    pub fn new(connector: C, config: ConnectionConfig) -> Self {
        let writer = MessageWriter::with_capacity(config.read_buffer_size(), config.write_timeout());
        Self {
            connector,
            read_buf: BytesMut::with_capacity(config.read_buffer_size()),
            config,
            io: None,
            writer,
            reader: None,
            keep_alive: false,
            in_flight: None,
            exchanges: 0,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns true while a channel is held.
    pub fn is_open(&self) -> bool {
        self.io.is_some()
    }

    /// Number of exchanges completed on the current channel.
    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    /// Opens a channel unless one is already held.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Connect`] when the connector fails or the connect timeout elapses.
    pub async fn connect(&mut self) -> Result<(), HttpError> {
        if self.io.is_some() {
            return Ok(());
        }

        let io = match timeout(self.config.connect_timeout(), self.connector.connect()).await {
            Ok(Ok(io)) => io,
            Ok(Err(e)) => {
                error!(host = self.connector.host(), cause = %e, "failed to connect");
                return Err(HttpError::connect(e));
            }
            Err(_elapsed) => {
                error!(host = self.connector.host(), timeout = ?self.config.connect_timeout(), "connect timed out");
                return Err(HttpError::connect(io::Error::from(io::ErrorKind::TimedOut)));
            }
        };

        info!(host = self.connector.host(), "connection established");
        self.io = Some(io);
        self.read_buf.clear();
        self.exchanges = 0;
        Ok(())
    }

    /// Shuts the channel down and forgets any pending response.
    pub async fn close(&mut self) {
        if let Some(mut io) = self.io.take() {
            if let Err(e) = io.shutdown().await {
                debug!(cause = %e, "failed to shutdown connection");
            }
            debug!(host = self.connector.host(), "connection closed");
        }
        self.reader = None;
        self.in_flight = None;
        self.read_buf.clear();
        self.writer.reset();
        self.exchanges = 0;
    }

    /// Sends a request.
    ///
    /// `Host` and `accept-encoding: identity` are added when absent. A body with an exact size
    /// is sent with `content-length`, any other body is streamed with chunked encoding. If the
    /// previous response body was not read to its end, the old channel is closed and the request
    /// goes out on a new one.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::InvalidBody`] when the body fails or disagrees with its size hint,
    /// [`SendError::Timeout`] when a write stalls, and connect or I/O errors. A stale channel that
    /// cannot be retried surfaces as [`ParseError::RemoteClosed`].
    pub async fn request<B>(&mut self, request: Request<B>) -> Result<(), HttpError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        if self.has_unread_response() {
            warn!("previous response was not read to its end, discard it by closing the connection");
            self.close().await;
        } else if self.reader.take().is_some() {
            debug!("drop the body reader of a failed response");
            self.close().await;
        }

        let (parts, mut body) = request.into_parts();
        let mut head = RequestHead::from(parts);
        self.fill_default_headers(&mut head)?;
        let head_request = head.is_head();

        let payload_size = match body.size_hint().exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        };

        self.connect().await?;
        debug!(method = %head.method(), target = head.target(), ?payload_size, "send request");

        self.writer.reset();
        self.writer.write(Message::<_, Bytes>::Header((head, payload_size)))?;

        let replay = if payload_size.is_chunked() {
            self.send_chunked(&mut body).await?;
            None
        } else {
            if !payload_size.is_empty()
                && let Err(e) = self.writer.write_sized_body(&mut body).await
            {
                error!(cause = %e, "invalid request body");
                self.close().await;
                return Err(e.into());
            }
            let wire = self.writer.take();
            self.send_replayable(&wire).await?;
            Some(wire)
        };

        self.in_flight = Some(InFlight { head_request, replay });
        Ok(())
    }

    /// Reads the head of the response to the last request.
    ///
    /// Interim `1xx` responses other than `101` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::RemoteClosed`] when the channel closes before a full head arrived,
    /// [`ParseError::Timeout`] when a read stalls (the call can be repeated), header errors, and
    /// [`HttpError::InvalidState`] when no request is waiting for its response.
    pub async fn get_response(&mut self) -> Result<Response<'_, C>, HttpError> {
        let Some(in_flight) = &self.in_flight else {
            return Err(HttpError::invalid_state("no request is waiting for a response"));
        };

        let mut decoder = if in_flight.head_request { HeaderDecoder::for_head_request() } else { HeaderDecoder::new() };
        let mut received = !self.read_buf.is_empty();
        let mut retried = false;

        let (head, payload_size, eol) = loop {
            match decoder.decode(&mut self.read_buf) {
                Ok(Some(parsed)) => break parsed,
                Ok(None) => {}
                Err(e) => {
                    error!(cause = %e, "failed to parse response head");
                    self.close().await;
                    return Err(e.into());
                }
            }

            match self.recv().await {
                Ok(0) if !received && !retried && self.can_retry() => {
                    retried = true;
                    warn!("reused connection closed before responding, retry on a new connection");
                    self.resend().await?;
                }
                Ok(0) => {
                    debug!("connection closed before the response head was complete");
                    self.close().await;
                    return Err(ParseError::RemoteClosed.into());
                }
                Ok(_) => received = true,
                Err(ParseError::Timeout) => return Err(ParseError::Timeout.into()),
                Err(e) if e.is_stale_connection() && !received && !retried && self.can_retry() => {
                    retried = true;
                    warn!(cause = %e, "reused connection was reset before responding, retry on a new connection");
                    self.resend().await?;
                }
                Err(e) => {
                    error!(cause = %e, "failed to read response head");
                    self.close().await;
                    return Err(e.into());
                }
            }
        };

        self.in_flight = None;
        self.keep_alive = is_keep_alive(&head) && !payload_size.is_until_close();
        debug!(status = head.status().as_u16(), ?payload_size, ?eol, keep_alive = self.keep_alive, "received response head");

        let reader = PayloadReader::from_payload_size(payload_size, eol, self.read_buf.split());
        let finished = reader.is_finished();
        self.reader = Some(reader);
        if finished {
            self.finish_body().await;
        }

        Ok(Response { conn: self, head, payload_size, partial: BytesMut::new(), done: finished })
    }

    fn fill_default_headers(&self, head: &mut RequestHead) -> Result<(), HttpError> {
        let headers = head.headers_mut();
        if !headers.contains_key(HOST) {
            let host = HeaderValue::from_str(self.connector.host())
                .map_err(|_e| HttpError::invalid_state(format!("invalid host: {}", self.connector.host())))?;
            headers.insert(HOST, host);
        }
        if !headers.contains_key(ACCEPT_ENCODING) {
            headers.insert(ACCEPT_ENCODING, IDENTITY);
        }
        Ok(())
    }

    /// A response is unread while its head or body is still pending on a live reader.
    /// A reader that already failed holds nothing left to discard.
    fn has_unread_response(&self) -> bool {
        self.in_flight.is_some() || self.reader.as_ref().is_some_and(|reader| !reader.is_closed() && !reader.is_failed())
    }

    fn can_retry(&self) -> bool {
        self.exchanges > 0
            && self.config.retry_stale_connection()
            && self.in_flight.as_ref().is_some_and(|in_flight| in_flight.replay.is_some())
    }

    async fn send_chunked<B>(&mut self, body: &mut B) -> Result<(), HttpError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        let reused = self.exchanges > 0;
        let Some(io) = self.io.as_mut() else {
            return Err(HttpError::invalid_state("connection is not open"));
        };

        match self.writer.write_chunked_body(body, io).await {
            Ok(()) => Ok(()),
            Err(e) if reused && e.is_stale_connection() => {
                warn!(cause = %e, "reused connection was closed, a streamed body can't be sent again");
                self.close().await;
                Err(ParseError::RemoteClosed.into())
            }
            Err(e) => {
                error!(cause = %e, "failed to send request");
                self.close().await;
                Err(e.into())
            }
        }
    }

    async fn send_replayable(&mut self, wire: &Bytes) -> Result<(), HttpError> {
        let reused = self.exchanges > 0;
        let result = match self.send_bytes(wire).await {
            Ok(()) => Ok(()),
            Err(e) if reused && e.is_stale_connection() && self.config.retry_stale_connection() => {
                warn!(cause = %e, "reused connection was closed, retry on a new connection");
                self.drop_channel();
                self.connect().await?;
                self.send_bytes(wire).await.map_err(HttpError::from)
            }
            Err(e) if reused && e.is_stale_connection() => {
                warn!(cause = %e, "reused connection was closed");
                Err(ParseError::RemoteClosed.into())
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = &result {
            error!(cause = %e, "failed to send request");
            self.close().await;
        }
        result
    }

    async fn resend(&mut self) -> Result<(), HttpError> {
        let wire = self.in_flight.as_ref().and_then(|in_flight| in_flight.replay.clone()).unwrap_or_default();
        self.drop_channel();
        self.connect().await?;
        if let Err(e) = self.send_bytes(&wire).await {
            error!(cause = %e, "failed to send request again");
            self.close().await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        let Some(io) = self.io.as_mut() else {
            return Err(SendError::io(io::Error::from(io::ErrorKind::NotConnected)));
        };
        self.writer.send(io, bytes).await
    }

    /// Reads once from the channel into the read buffer, returning 0 at end of file.
    async fn recv(&mut self) -> Result<usize, ParseError> {
        let Some(io) = self.io.as_mut() else {
            return Ok(0);
        };

        self.read_buf.reserve(self.config.read_buffer_size());
        match timeout(self.config.read_timeout(), io.read_buf(&mut self.read_buf)).await {
            Ok(Ok(n)) => {
                trace!(n, "read bytes from connection");
                Ok(n)
            }
            Ok(Err(e)) => Err(ParseError::io(e)),
            Err(_elapsed) => {
                debug!(timeout = ?self.config.read_timeout(), "read timed out");
                Err(ParseError::Timeout)
            }
        }
    }

    /// Feeds the body reader with the next bytes from the channel.
    async fn fill_reader(&mut self) -> Result<(), ParseError> {
        let result = self.recv().await;
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };

        match result {
            Ok(0) => {
                debug!("connection closed by the server");
                reader.close();
                self.drop_channel();
                Ok(())
            }
            Ok(_) => {
                reader.feed(&self.read_buf);
                self.read_buf.clear();
                Ok(())
            }
            Err(ParseError::Timeout) => Err(ParseError::Timeout),
            Err(e) => {
                error!(cause = %e, "failed to read response body");
                reader.close();
                self.drop_channel();
                Err(e)
            }
        }
    }

    /// Called once the body reader reported end of body.
    async fn finish_body(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };

        if self.keep_alive && self.io.is_some() {
            self.read_buf = reader.into_remainder();
            self.exchanges += 1;
            debug!(exchanges = self.exchanges, "response complete, keep connection");
        } else {
            debug!("response complete, close connection");
            self.close().await;
        }
    }

    /// Drops the channel without touching the body reader, so its state stays observable.
    fn drop_channel(&mut self) {
        self.io = None;
        self.read_buf.clear();
        self.writer.reset();
        self.exchanges = 0;
    }
}

impl<C: Connector> fmt::Debug for HttpConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("host", &self.connector.host())
            .field("open", &self.io.is_some())
            .field("exchanges", &self.exchanges)
            .field("reading_body", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

/// A response whose body is read from the connection it borrows.
pub struct Response<'conn, C: Connector> {
    conn: &'conn mut HttpConnection<C>,
    head: ResponseHead,
    payload_size: PayloadSize,
    partial: BytesMut,
    done: bool,
}

impl<C: Connector> Response<'_, C> {
    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.head.headers().get(name)
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    /// Returns true once the whole body was returned by [`read`](Self::read).
    pub fn is_finished(&self) -> bool {
        self.done && self.partial.is_empty()
    }

    /// Reads `amt` body bytes, or fewer when the body ends first.
    ///
    /// For a non-zero `amt` an empty result means the body is complete; `read(0)` always
    /// returns empty bytes without touching the channel.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::RemoteClosed`] when the channel closed before the body was
    /// delimited and [`ParseError::MalformedChunk`] on broken chunk framing; both repeat on every
    /// later call. [`ParseError::Timeout`] keeps the bytes read so far, a later call resumes.
    pub async fn read(&mut self, amt: usize) -> Result<Bytes, HttpError> {
        while self.partial.len() < amt && !self.done {
            let Some(reader) = self.conn.reader.as_mut() else {
                return Err(HttpError::invalid_state("response body is no longer available"));
            };

            match reader.read(amt - self.partial.len()) {
                Ok(Some(PayloadItem::Chunk(bytes))) => self.partial.extend_from_slice(&bytes),
                Ok(Some(PayloadItem::Eof)) => {
                    self.done = true;
                    self.conn.finish_body().await;
                }
                Ok(None) => {
                    if let Err(e) = self.conn.fill_reader().await {
                        if !matches!(e, ParseError::Timeout) {
                            self.partial.clear();
                        }
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    error!(cause = %e, "failed to read response body");
                    self.partial.clear();
                    self.conn.drop_channel();
                    return Err(e.into());
                }
            }
        }

        let n = amt.min(self.partial.len());
        Ok(self.partial.split_to(n).freeze())
    }

    /// Reads the rest of the body.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn read_to_end(&mut self) -> Result<Bytes, HttpError> {
        self.read(usize::MAX).await
    }
}

impl<C: Connector> fmt::Debug for Response<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("head", &self.head)
            .field("payload_size", &self.payload_size)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
