use std::fmt::Display;
use std::time::Duration;

use crate::codec::{CHUNK_BLOCK_SIZE, RequestEncoder};
use crate::protocol::{Message, PayloadItem, PayloadSize, RequestHead, SendError};
use bytes::{Buf, Bytes, BytesMut};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

/// Buffers encoded request bytes and writes them to a channel.
///
/// Bodies of known size are encoded into the buffer in full so the request can be kept and
/// sent again. Chunked bodies are streamed: frames are coalesced into blocks of
/// [`CHUNK_BLOCK_SIZE`] bytes and every block is flushed as one chunk.
#[derive(Debug)]
pub struct MessageWriter {
    buffer: BytesMut,
    encoder: RequestEncoder,
    write_timeout: Duration,
}

impl MessageWriter {
    pub fn with_capacity(buffer_size: usize, write_timeout: Duration) -> Self {
        Self { buffer: BytesMut::with_capacity(buffer_size), encoder: RequestEncoder::new(), write_timeout }
    }

    /// Drops buffered bytes and any half-encoded body.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.encoder.reset();
    }

    #[inline]
    pub fn write<D>(&mut self, item: Message<(RequestHead, PayloadSize), D>) -> Result<(), SendError>
    where
        D: Buf,
    {
        self.encoder.encode(item, &mut self.buffer)
    }

    /// Takes everything encoded so far.
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Encodes a body of known size into the buffer without touching the channel.
    pub async fn write_sized_body<B>(&mut self, body: &mut B) -> Result<(), SendError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        while let Some(data) = next_data(body).await? {
            self.write(Message::<(RequestHead, PayloadSize)>::Payload(PayloadItem::Chunk(data)))?;
        }
        self.write(Message::<(RequestHead, PayloadSize)>::Payload(PayloadItem::Eof))
    }

    /// Streams a body of unknown size as chunks, flushing the pending head first.
    pub async fn write_chunked_body<B, W>(&mut self, body: &mut B, writer: &mut W) -> Result<(), SendError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
        W: AsyncWrite + Unpin,
    {
        self.flush(writer).await?;

        let mut block = BytesMut::with_capacity(CHUNK_BLOCK_SIZE);
        let mut blocks = 0usize;
        while let Some(data) = next_data(body).await? {
            block.extend_from_slice(&data);
            while block.len() >= CHUNK_BLOCK_SIZE {
                let full = block.split_to(CHUNK_BLOCK_SIZE).freeze();
                self.write(Message::<(RequestHead, PayloadSize)>::Payload(PayloadItem::Chunk(full)))?;
                self.flush(writer).await?;
                blocks += 1;
            }
        }

        if !block.is_empty() {
            self.write(Message::<(RequestHead, PayloadSize)>::Payload(PayloadItem::Chunk(block.freeze())))?;
            blocks += 1;
        }
        self.write(Message::<(RequestHead, PayloadSize)>::Payload(PayloadItem::Eof))?;
        self.flush(writer).await?;
        debug!(blocks, "chunked request body sent");
        Ok(())
    }

    /// Writes the buffered bytes and flushes the channel.
    pub async fn flush<W>(&mut self, writer: &mut W) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let bytes = self.buffer.split();
        self.send(writer, &bytes).await
    }

    /// Writes `bytes` and flushes the channel within the write timeout.
    pub async fn send<W>(&self, writer: &mut W, bytes: &[u8]) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin,
    {
        trace!(len = bytes.len(), "write request bytes");
        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };
        match timeout(self.write_timeout, write).await {
            Ok(result) => Ok(result?),
            Err(_elapsed) => Err(SendError::Timeout),
        }
    }
}

async fn next_data<B>(body: &mut B) -> Result<Option<Bytes>, SendError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    loop {
        match body.frame().await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) if data.is_empty() => {}
                Ok(data) => return Ok(Some(data)),
                Err(_trailers) => trace!("skip request body trailers"),
            },
            Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve request body error: {e}"))),
            None => return Ok(None),
        }
    }
}
