//! Error types for the protocol layer.

use thiserror::Error;

use crate::messages::HostErrorCode;

/// Errors raised while moving messages over a connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    /// A frame announced a body larger than the limit.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The peer answered with a message that does not fit the request.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,

    /// The host answered with an error frame.
    #[error("remote error ({code:?}): {message}")]
    Remote { code: HostErrorCode, message: String },
}

impl ProtocolError {
    /// The code to report to a peer for this error.
    pub fn code(&self) -> HostErrorCode {
        match self {
            ProtocolError::FrameTooLarge { .. } => HostErrorCode::MessageTooLarge,
            ProtocolError::Decoding(_) | ProtocolError::UnexpectedMessage(_) => {
                HostErrorCode::InvalidMessage
            }
            ProtocolError::Remote { code, .. } => *code,
            ProtocolError::Io(_) | ProtocolError::Encoding(_) | ProtocolError::Closed => {
                HostErrorCode::Unknown
            }
        }
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
