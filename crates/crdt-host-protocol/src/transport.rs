//! Framing and the transport abstraction.
//!
//! A frame is a 4-byte big-endian body length followed by a CBOR body. The
//! length is checked against [`limits::MAX_FRAME_LEN`] before anything is
//! allocated for the body.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};
use crate::messages::limits;

/// Transport trait for exchanging protocol messages with one peer.
///
/// Implementations must be `Send` so a connection can move between tasks.
#[async_trait]
pub trait Transport: Send {
    /// Send one message.
    async fn send<M>(&mut self, message: &M) -> Result<()>
    where
        M: Serialize + Sync;

    /// Receive the next message.
    ///
    /// Returns `None` if the peer closed the connection between messages.
    async fn recv<M>(&mut self) -> Result<Option<M>>
    where
        M: DeserializeOwned + Send;
}

/// Encode a message as a CBOR frame body.
pub fn encode_message<M: Serialize>(message: &M) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| ProtocolError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Decode a message from a CBOR frame body.
pub fn decode_message<M: DeserializeOwned>(body: &[u8]) -> Result<M> {
    ciborium::from_reader(body).map_err(|e| ProtocolError::Decoding(e.to_string()))
}

/// Write one frame.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    if body.len() > limits::MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: body.len(),
            max: limits::MAX_FRAME_LEN,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| ProtocolError::FrameTooLarge {
        len: body.len(),
        max: limits::MAX_FRAME_LEN,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// Returns `None` on a clean end of stream at a frame boundary. End of
/// stream inside a frame is [`ProtocolError::Closed`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::Closed);
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > limits::MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: limits::MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Closed
        } else {
            ProtocolError::Io(e)
        }
    })?;
    Ok(Some(body))
}

/// A byte stream carrying length-prefixed CBOR frames.
#[derive(Debug)]
pub struct FramedStream<S> {
    inner: S,
}

impl<S> FramedStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S> Transport for FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send<M>(&mut self, message: &M) -> Result<()>
    where
        M: Serialize + Sync,
    {
        let body = encode_message(message)?;
        write_frame(&mut self.inner, &body).await
    }

    async fn recv<M>(&mut self) -> Result<Option<M>>
    where
        M: DeserializeOwned + Send,
    {
        match read_frame(&mut self.inner).await? {
            Some(body) => decode_message(&body).map(Some),
            None => Ok(None),
        }
    }
}

/// An in-memory transport for testing.
pub mod memory {
    use super::FramedStream;
    use tokio::io::DuplexStream;

    /// In-memory transport implementation.
    pub type MemoryTransport = FramedStream<DuplexStream>;

    /// Create two connected in-memory transports.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (FramedStream::new(a), FramedStream::new(b))
    }
}
