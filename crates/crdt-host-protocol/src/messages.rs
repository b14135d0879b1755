//! Protocol message types.
//!
//! Every frame carries one [`HostRequest`] (sidecar to host) or one
//! [`HostResponse`] (host to sidecar). Requests on a connection are answered
//! in order, one response per request.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crdt_host_core::{CrdtDelta, CrdtKind};

/// Major version of the entity protocol spoken by this host.
pub const PROTOCOL_MAJOR_VERSION: u32 = 0;

/// Minor version of the entity protocol spoken by this host.
pub const PROTOCOL_MINOR_VERSION: u32 = 2;

/// Message size limits.
pub mod limits {
    /// Max bytes in one frame body.
    pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;
    /// Max bytes in a service name or entity id.
    pub const MAX_IDENTIFIER_LEN: usize = 1024;
    /// Max bytes in a command name.
    pub const MAX_COMMAND_NAME_LEN: usize = 256;
}

/// What the sidecar tells the host about itself in a Discover call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyInfo {
    pub protocol_major_version: u32,
    pub protocol_minor_version: u32,
    pub proxy_name: String,
    pub proxy_version: String,
    /// Entity type tags the sidecar can host.
    pub supported_entity_types: Vec<String>,
}

/// One registered entity, as advertised in discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Entity type tag, e.g. `"crdt"`.
    pub entity_type: String,
    /// Fully qualified service name.
    pub service_name: String,
    /// Namespace under which the sidecar stores this entity's state.
    pub persistence_id: String,
}

/// Identity of the user-function process and its support library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service_name: String,
    pub service_version: String,
    pub service_runtime: String,
    pub support_library_name: String,
    pub support_library_version: String,
    pub protocol_major_version: u32,
    pub protocol_minor_version: u32,
}

/// The Discover response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// The serialized descriptor set, passed through untouched.
    pub proto: Bytes,
    pub entities: Vec<EntityDescriptor>,
    pub service_info: ServiceInfo,
}

/// An error the sidecar observed in this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFunctionError {
    pub message: String,
}

/// Messages sent by the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostRequest {
    /// Handshake: ask for the entity specification.
    Discover(ProxyInfo),

    /// Report an error observed about this process.
    ReportError(UserFunctionError),

    /// Bind this connection to one entity instance.
    SessionInit {
        service_name: String,
        entity_id: String,
        /// Restore from a previously exported delta.
        delta: Option<CrdtDelta>,
    },

    /// Run a command against the bound entity.
    Command { name: String, payload: Bytes },

    /// Merge a delta produced by another replica.
    Delta(CrdtDelta),

    /// Unbind the entity. Unexported changes are discarded.
    SessionClose,
}

impl HostRequest {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            HostRequest::Discover(_) => "discover",
            HostRequest::ReportError(_) => "report_error",
            HostRequest::SessionInit { .. } => "session_init",
            HostRequest::Command { .. } => "command",
            HostRequest::Delta(_) => "delta",
            HostRequest::SessionClose => "session_close",
        }
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        match self {
            HostRequest::SessionInit {
                service_name,
                entity_id,
                ..
            } => {
                if service_name.len() > limits::MAX_IDENTIFIER_LEN {
                    return Err("service name too long");
                }
                if entity_id.len() > limits::MAX_IDENTIFIER_LEN {
                    return Err("entity id too long");
                }
            }
            HostRequest::Command { name, .. } => {
                if name.len() > limits::MAX_COMMAND_NAME_LEN {
                    return Err("command name too long");
                }
            }
            HostRequest::Discover(_)
            | HostRequest::ReportError(_)
            | HostRequest::Delta(_)
            | HostRequest::SessionClose => {}
        }
        Ok(())
    }
}

/// Messages sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostResponse {
    Discovered(EntitySpec),

    /// The request was accepted and has no payload.
    Ack,

    SessionOpened { kind: CrdtKind },

    /// A command completed.
    Reply {
        payload: Bytes,
        /// The change to replicate, if any.
        delta: Option<CrdtDelta>,
    },

    /// The entity's handler rejected the command. The session stays open.
    Failure { message: String },

    /// Error condition.
    Error {
        /// Error code for programmatic handling.
        code: HostErrorCode,
        /// Human-readable description.
        message: String,
    },
}

/// Error codes for the host protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum HostErrorCode {
    /// Unknown/unspecified error.
    Unknown = 0,
    /// The request could not be decoded or breaks a limit.
    InvalidMessage = 1,
    /// No entity is registered under the service name.
    UnknownService = 2,
    /// The entity already has an active session.
    SessionConflict = 3,
    /// The request needs a session and none is open.
    NoActiveSession = 4,
    /// A delta's kind does not match the entity's CRDT.
    DeltaMismatch = 5,
    /// A CRDT mutation was rejected.
    InvalidOperation = 6,
    /// Frame exceeds the size limit.
    MessageTooLarge = 7,
}
