//! The sidecar's side of a connection.
//!
//! [`HostClient`] issues one request at a time and waits for the matching
//! response. It is what tests and tools use to drive a running host.

use bytes::Bytes;
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crdt_host_core::{CrdtDelta, CrdtKind};

use crate::error::{ProtocolError, Result};
use crate::messages::{EntitySpec, HostRequest, HostResponse, ProxyInfo, UserFunctionError};
use crate::transport::{FramedStream, Transport};

/// The outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The handler succeeded.
    Reply {
        payload: Bytes,
        delta: Option<CrdtDelta>,
    },
    /// The handler failed with a user-level error.
    Failure(String),
}

/// A client for one host connection.
#[derive(Debug)]
pub struct HostClient<T> {
    transport: T,
}

impl HostClient<FramedStream<TcpStream>> {
    /// Connect to a host over TCP.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(FramedStream::new(stream)))
    }
}

impl<T: Transport> HostClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send a request and wait for its response.
    ///
    /// An error frame from the host becomes [`ProtocolError::Remote`].
    pub async fn call(&mut self, request: &HostRequest) -> Result<HostResponse> {
        debug!(request = request.name(), "sending request");
        self.transport.send(request).await?;
        match self.transport.recv::<HostResponse>().await? {
            Some(HostResponse::Error { code, message }) => {
                Err(ProtocolError::Remote { code, message })
            }
            Some(response) => Ok(response),
            None => Err(ProtocolError::Closed),
        }
    }

    /// Ask the host for its entity specification.
    pub async fn discover(&mut self, info: ProxyInfo) -> Result<EntitySpec> {
        match self.call(&HostRequest::Discover(info)).await? {
            HostResponse::Discovered(spec) => Ok(spec),
            other => Err(unexpected("Discovered", &other)),
        }
    }

    /// Report an error about this process to the host.
    pub async fn report_error(&mut self, message: impl Into<String>) -> Result<()> {
        let request = HostRequest::ReportError(UserFunctionError {
            message: message.into(),
        });
        self.expect_ack(&request).await
    }

    /// Bind this connection to one entity and return its CRDT kind.
    pub async fn open_session(
        &mut self,
        service_name: impl Into<String>,
        entity_id: impl Into<String>,
        delta: Option<CrdtDelta>,
    ) -> Result<CrdtKind> {
        let request = HostRequest::SessionInit {
            service_name: service_name.into(),
            entity_id: entity_id.into(),
            delta,
        };
        match self.call(&request).await? {
            HostResponse::SessionOpened { kind } => Ok(kind),
            other => Err(unexpected("SessionOpened", &other)),
        }
    }

    /// Run a command against the bound entity.
    pub async fn command(
        &mut self,
        name: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Result<CommandOutcome> {
        let request = HostRequest::Command {
            name: name.into(),
            payload: payload.into(),
        };
        match self.call(&request).await? {
            HostResponse::Reply { payload, delta } => Ok(CommandOutcome::Reply { payload, delta }),
            HostResponse::Failure { message } => Ok(CommandOutcome::Failure(message)),
            other => Err(unexpected("Reply", &other)),
        }
    }

    /// Deliver a delta from another replica to the bound entity.
    pub async fn send_delta(&mut self, delta: CrdtDelta) -> Result<()> {
        self.expect_ack(&HostRequest::Delta(delta)).await
    }

    /// Close the session. The connection stays usable.
    pub async fn close_session(&mut self) -> Result<()> {
        self.expect_ack(&HostRequest::SessionClose).await
    }

    async fn expect_ack(&mut self, request: &HostRequest) -> Result<()> {
        match self.call(request).await? {
            HostResponse::Ack => Ok(()),
            other => Err(unexpected("Ack", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &HostResponse) -> ProtocolError {
    ProtocolError::UnexpectedMessage(format!("expected {expected}, got {got:?}"))
}
