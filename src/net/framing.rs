//! Delimiter framing over a byte stream.
//!
//! # Responsibilities
//! - Accumulate inbound bytes until a `\r\n\r\n` terminated message is present
//! - Hand out the payload preceding the delimiter and compact the buffer
//! - Append the delimiter to every outbound payload
//!
//! # Design Decisions
//! - The delimiter scan resumes where the previous one stopped, backing up by
//!   `DELIMITER.len() - 1` bytes so a delimiter split across reads is found
//! - No escaping: a payload containing the delimiter is mis-framed
//! - No size bound: a peer that never sends the delimiter grows the buffer

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::error::{ConnectionError, ConnectionResult};

/// Message terminator on the wire.
pub const DELIMITER: &[u8; 4] = b"\r\n\r\n";

/// Default number of bytes requested from the transport per read.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Growable receive buffer with incremental delimiter detection.
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    bytes: Vec<u8>,
    /// First offset not yet ruled out as a delimiter start.
    scanned: usize,
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes received from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Offset of the first delimiter, if one is fully buffered.
    pub fn find_delimiter(&mut self) -> Option<usize> {
        let start = self.scanned;
        match self.bytes[start..]
            .windows(DELIMITER.len())
            .position(|window| window == DELIMITER)
        {
            Some(offset) => {
                self.scanned = start + offset;
                Some(start + offset)
            }
            None => {
                self.scanned = start.max(self.bytes.len().saturating_sub(DELIMITER.len() - 1));
                None
            }
        }
    }

    /// Whether a complete message is waiting to be extracted.
    pub fn has_message(&mut self) -> bool {
        self.find_delimiter().is_some()
    }

    /// Remove the first message and its delimiter, keeping any bytes after it.
    pub fn extract_message(&mut self) -> ConnectionResult<Vec<u8>> {
        let end = self.find_delimiter().ok_or(ConnectionError::Framing)?;
        let message = self.bytes[..end].to_vec();
        self.bytes.drain(..end + DELIMITER.len());
        self.scanned = 0;
        Ok(message)
    }

    /// Drop every buffered byte.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.scanned = 0;
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Buffered bytes, including any partial message.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Build the wire form of `payload`: the payload followed by the delimiter.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(payload.len() + DELIMITER.len());
    wire.extend_from_slice(payload);
    wire.extend_from_slice(DELIMITER);
    wire
}

/// Read side: owns the receive buffer and the transport's read half.
#[derive(Debug)]
pub struct FramedReader<R> {
    io: R,
    buffer: ReceiveBuffer,
    chunk: usize,
}

impl<R> FramedReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(io: R, chunk: usize) -> Self {
        Self {
            io,
            buffer: ReceiveBuffer::new(),
            chunk: chunk.max(1),
        }
    }

    /// Transfer up to `max_bytes` into the buffer with a single transport read.
    ///
    /// Peer EOF is reported as a transport error, never as `Ok(0)`, unless
    /// `max_bytes` is zero.
    pub async fn read(&mut self, max_bytes: usize) -> ConnectionResult<usize> {
        if max_bytes == 0 {
            return Ok(0);
        }
        self.buffer.bytes.reserve(max_bytes.min(self.chunk));
        let transferred = (&mut self.io)
            .take(max_bytes as u64)
            .read_buf(&mut self.buffer.bytes)
            .await?;
        if transferred == 0 {
            return Err(ConnectionError::peer_closed());
        }
        Ok(transferred)
    }

    /// Read until the buffer holds a full delimiter.
    ///
    /// Returns the bytes transferred by this call, which is zero when a
    /// message was already buffered.
    pub async fn read_until_delimiter(&mut self) -> ConnectionResult<usize> {
        let mut transferred = 0;
        while !self.buffer.has_message() {
            transferred += self.read(self.chunk).await?;
        }
        Ok(transferred)
    }

    pub fn extract_message(&mut self) -> ConnectionResult<Vec<u8>> {
        self.buffer.extract_message()
    }

    pub fn reset_buffer(&mut self) {
        self.buffer.reset();
    }

    pub fn buffer(&self) -> &ReceiveBuffer {
        &self.buffer
    }
}

/// Write side: appends the delimiter to each payload.
#[derive(Debug)]
pub struct FramedWriter<W> {
    io: W,
}

impl<W> FramedWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(io: W) -> Self {
        Self { io }
    }

    /// Write `payload` plus delimiter and flush. Returns wire bytes written.
    pub async fn write(&mut self, payload: &[u8]) -> ConnectionResult<usize> {
        let wire = frame(payload);
        self.io.write_all(&wire).await?;
        self.io.flush().await?;
        Ok(wire.len())
    }

    /// Flush and shut down the write direction (FIN, or TLS close_notify).
    pub async fn shutdown(&mut self) -> ConnectionResult<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}

/// A transport with framing on both directions.
///
/// Split into independent halves so one read and one write can be in flight
/// at the same time.
#[derive(Debug)]
pub struct FramedStream<T> {
    reader: FramedReader<ReadHalf<T>>,
    writer: FramedWriter<WriteHalf<T>>,
}

impl<T> FramedStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    pub fn new(io: T, chunk: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(io);
        Self {
            reader: FramedReader::new(read_half, chunk),
            writer: FramedWriter::new(write_half),
        }
    }

    pub async fn read(&mut self, max_bytes: usize) -> ConnectionResult<usize> {
        self.reader.read(max_bytes).await
    }

    pub async fn read_until_delimiter(&mut self) -> ConnectionResult<usize> {
        self.reader.read_until_delimiter().await
    }

    pub fn extract_message(&mut self) -> ConnectionResult<Vec<u8>> {
        self.reader.extract_message()
    }

    pub fn reset_buffer(&mut self) {
        self.reader.reset_buffer();
    }

    pub async fn write(&mut self, payload: &[u8]) -> ConnectionResult<usize> {
        self.writer.write(payload).await
    }

    pub fn buffer(&self) -> &ReceiveBuffer {
        self.reader.buffer()
    }

    pub fn into_parts(self) -> (FramedReader<ReadHalf<T>>, FramedWriter<WriteHalf<T>>) {
        (self.reader, self.writer)
    }
}
