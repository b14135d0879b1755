//! Error types for the host.

use std::path::PathBuf;

use crdt_host_core::CrdtError;
use crdt_host_protocol::{HostErrorCode, ProtocolError};
use thiserror::Error;

/// Errors that can occur while starting or running the host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The descriptor set could not be read. Fatal at startup.
    #[error("cannot read descriptor set {}: {source}", path.display())]
    Descriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two entity definitions share a service name.
    #[error("duplicate service: {0}")]
    DuplicateService(String),

    /// An entity definition has an empty service name.
    #[error("service name must not be empty")]
    EmptyServiceName,

    /// An entity type tag this host cannot serve.
    #[error("unsupported entity kind: {0}")]
    UnsupportedEntityKind(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// No entity is registered under the requested service.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The entity is already bound to another session.
    #[error("entity {entity_id} of {service_name} already has an active session")]
    SessionConflict {
        service_name: String,
        entity_id: String,
    },

    /// The request needs an open session.
    #[error("no active session")]
    NoActiveSession,

    /// CRDT error.
    #[error(transparent)]
    Crdt(#[from] CrdtError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// The code sent to the sidecar when this error ends a request.
    pub fn code(&self) -> HostErrorCode {
        match self {
            HostError::UnknownService(_) => HostErrorCode::UnknownService,
            HostError::SessionConflict { .. } => HostErrorCode::SessionConflict,
            HostError::NoActiveSession => HostErrorCode::NoActiveSession,
            HostError::Crdt(CrdtError::DeltaMismatch { .. }) => HostErrorCode::DeltaMismatch,
            HostError::Crdt(CrdtError::InvalidOperation(_) | CrdtError::CounterOverflow) => {
                HostErrorCode::InvalidOperation
            }
            HostError::Crdt(CrdtError::UnknownKind(_) | CrdtError::Decoding(_)) => {
                HostErrorCode::InvalidMessage
            }
            HostError::Protocol(e) => e.code(),
            _ => HostErrorCode::Unknown,
        }
    }

    /// Whether this error is only possible while configuring the host.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            HostError::Descriptor { .. }
                | HostError::DuplicateService(_)
                | HostError::EmptyServiceName
                | HostError::UnsupportedEntityKind(_)
                | HostError::Config(_)
        )
    }
}

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
