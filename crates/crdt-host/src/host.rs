//! The host: listener, connections and request dispatch.
//!
//! Every accepted connection runs in its own task and answers its requests in
//! order. Errors caused by a request are answered with an error frame; only a
//! broken stream ends a connection, and nothing ends the listener except
//! [`RunningHost::shutdown`].

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crdt_host_core::ReplicaId;
use crdt_host_protocol::{
    FramedStream, HostErrorCode, HostRequest, HostResponse, ProtocolError, Transport,
};

use crate::config::HostConfig;
use crate::descriptor::DescriptorSet;
use crate::discovery::{DiscoveryService, EntityDiscovery};
use crate::error::{HostError, Result};
use crate::registry::{EntityDefinition, EntityRegistry, RegistryBuilder};
use crate::session::{CommandResult, EntitySession, SessionTable};

/// A host being configured.
#[derive(Debug)]
pub struct EntityHost {
    config: HostConfig,
    descriptor: DescriptorSet,
    registry: RegistryBuilder,
}

impl EntityHost {
    /// Create a host, reading the descriptor set named by the configuration.
    pub fn new(config: HostConfig) -> Result<Self> {
        let descriptor = DescriptorSet::load(&config.descriptor_set_path)?;
        Ok(Self::with_descriptor(config, descriptor))
    }

    /// Create a host with a descriptor set already in memory.
    pub fn with_descriptor(config: HostConfig, descriptor: DescriptorSet) -> Self {
        Self {
            config,
            descriptor,
            registry: RegistryBuilder::new(),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Register an entity.
    pub fn add_entity(mut self, definition: EntityDefinition) -> Self {
        self.registry.register(definition);
        self
    }

    /// Register several entities.
    pub fn add_entities(mut self, definitions: impl IntoIterator<Item = EntityDefinition>) -> Self {
        for definition in definitions {
            self.registry.register(definition);
        }
        self
    }

    /// Freeze the registry, bind the listener and start accepting.
    ///
    /// Registry errors are reported before any socket is bound.
    pub async fn start(self) -> Result<RunningHost> {
        let registry = Arc::new(self.registry.build()?);

        let listener =
            TcpListener::bind((self.config.bind_address.as_str(), self.config.bind_port)).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!(
            %local_addr,
            service = %self.config.service_name,
            version = %self.config.service_version,
            entities = registry.len(),
            descriptor = %self.descriptor.fingerprint(),
            "entity host listening"
        );

        let shared = Arc::new(Shared {
            discovery: DiscoveryService::new(&self.config, &self.descriptor, Arc::clone(&registry)),
            registry,
            sessions: SessionTable::new(),
            replica: self.config.replica_id,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&shared), shutdown_rx));

        Ok(RunningHost {
            local_addr,
            shared,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// A host that is accepting connections.
#[derive(Debug)]
pub struct RunningHost {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunningHost {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of entities with an open session.
    pub fn active_sessions(&self) -> usize {
        self.shared.sessions.len()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.shared.registry
    }

    /// Stop accepting, close every connection and wait for the listener.
    pub async fn shutdown(self) -> Result<()> {
        // Connections hold receivers too, so a send error means nothing is left to stop.
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| HostError::Io(std::io::Error::other(e)))?;
        tracing::info!(local_addr = %self.local_addr, "entity host stopped");
        Ok(())
    }
}

/// State shared by every connection.
#[derive(Debug)]
struct Shared {
    registry: Arc<EntityRegistry>,
    discovery: DiscoveryService,
    sessions: SessionTable,
    replica: ReplicaId,
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%peer, error = %e, "cannot set TCP_NODELAY");
                    }
                    let shared = Arc::clone(&shared);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve(FramedStream::new(stream), shared, shutdown).await {
                            tracing::warn!(%peer, error = %e, "connection failed");
                        }
                    });
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
        }
    }
}

/// Answer requests on one connection until it closes or the host shuts down.
async fn serve<T: Transport>(
    mut transport: T,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut connection = Connection {
        shared,
        session: None,
    };
    loop {
        let received = tokio::select! {
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
            received = transport.recv::<HostRequest>() => received,
        };

        let response = match received {
            Ok(Some(request)) => connection.handle(request).await,
            Ok(None) => break,
            // The frame was read whole, so the stream is still in sync.
            Err(e @ ProtocolError::Decoding(_)) => error_response(e.code(), e.to_string()),
            Err(e @ ProtocolError::FrameTooLarge { .. }) => {
                let reply = error_response(e.code(), e.to_string());
                // Best effort: the stream is out of sync either way.
                let _ = transport.send(&reply).await;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        transport.send(&response).await?;
    }
    connection.close();
    Ok(())
}

struct Connection {
    shared: Arc<Shared>,
    session: Option<EntitySession>,
}

impl Connection {
    async fn handle(&mut self, request: HostRequest) -> HostResponse {
        if let Err(reason) = request.validate_limits() {
            return error_response(HostErrorCode::InvalidMessage, reason.to_string());
        }
        let name = request.name();
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(request = name, error = %e, "request rejected");
                error_response(e.code(), e.to_string())
            }
        }
    }

    async fn dispatch(&mut self, request: HostRequest) -> Result<HostResponse> {
        match request {
            HostRequest::Discover(proxy) => Ok(HostResponse::Discovered(
                self.shared.discovery.discover(&proxy).await,
            )),
            HostRequest::ReportError(error) => {
                self.shared.discovery.report_error(&error).await;
                Ok(HostResponse::Ack)
            }
            HostRequest::SessionInit {
                service_name,
                entity_id,
                delta,
            } => {
                if let Some(open) = &self.session {
                    return Err(HostError::SessionConflict {
                        service_name: open.service_name().to_string(),
                        entity_id: open.entity_id().to_string(),
                    });
                }
                let definition = self
                    .shared
                    .registry
                    .lookup(&service_name)
                    .ok_or_else(|| HostError::UnknownService(service_name.clone()))?;
                let lease = self.shared.sessions.acquire(&service_name, &entity_id)?;
                let session =
                    EntitySession::open(lease, definition, self.shared.replica, delta.as_ref())?;
                let kind = session.kind();
                self.session = Some(session);
                Ok(HostResponse::SessionOpened { kind })
            }
            HostRequest::Command { name, payload } => {
                let session = self.session.as_mut().ok_or(HostError::NoActiveSession)?;
                Ok(match session.handle_command(&name, &payload) {
                    CommandResult::Reply { payload, delta } => HostResponse::Reply { payload, delta },
                    CommandResult::Failure(error) => HostResponse::Failure {
                        message: format!("{error:#}"),
                    },
                })
            }
            HostRequest::Delta(delta) => {
                let session = self.session.as_mut().ok_or(HostError::NoActiveSession)?;
                session.apply_delta(&delta)?;
                Ok(HostResponse::Ack)
            }
            HostRequest::SessionClose => {
                let session = self.session.take().ok_or(HostError::NoActiveSession)?;
                session.close();
                Ok(HostResponse::Ack)
            }
        }
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}

fn error_response(code: HostErrorCode, message: String) -> HostResponse {
    HostResponse::Error { code, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crdt_host_core::{CrdtDelta, CrdtKind, CrdtOperation, FlagDelta, GCounterDelta};
    use crdt_host_protocol::transport::memory;
    use crdt_host_protocol::{CommandOutcome, HostClient, ProxyInfo};

    use crate::entity::CommandContext;

    fn increment(ctx: &mut CommandContext<'_>, _: &str, payload: &Bytes) -> anyhow::Result<Bytes> {
        let by: i64 = std::str::from_utf8(payload)?.parse()?;
        ctx.mutate(CrdtOperation::Increment(by))?;
        Ok(Bytes::from(ctx.state().to_string()))
    }

    fn shared() -> Arc<Shared> {
        let mut builder = RegistryBuilder::new();
        builder.register(EntityDefinition::crdt("test.Counter", CrdtKind::GCounter, increment));
        let registry = Arc::new(builder.build().unwrap());
        let config = HostConfig::new("test", "0.0.1");
        let descriptor = DescriptorSet::from_bytes(&b"desc"[..]);
        Arc::new(Shared {
            discovery: DiscoveryService::new(&config, &descriptor, Arc::clone(&registry)),
            registry,
            sessions: SessionTable::new(),
            replica: ReplicaId::from_bytes([1; 16]),
        })
    }

    fn connect(shared: &Arc<Shared>) -> (HostClient<memory::MemoryTransport>, watch::Sender<bool>) {
        let (sidecar, host) = memory::pair();
        let (tx, rx) = watch::channel(false);
        tokio::spawn(serve(host, Arc::clone(shared), rx));
        (HostClient::new(sidecar), tx)
    }

    fn remote_code(err: ProtocolError) -> HostErrorCode {
        match err {
            ProtocolError::Remote { code, .. } => code,
            other => panic!("expected remote error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_session_flow() {
        let shared = shared();
        let (mut client, _tx) = connect(&shared);

        let spec = client.discover(ProxyInfo::default()).await.unwrap();
        assert_eq!(spec.entities.len(), 1);

        let kind = client.open_session("test.Counter", "c-1", None).await.unwrap();
        assert_eq!(kind, CrdtKind::GCounter);
        assert!(shared.sessions.is_active("test.Counter", "c-1"));

        let outcome = client.command("Increment", &b"5"[..]).await.unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Reply {
                payload: Bytes::from_static(b"GCounter(5)"),
                delta: Some(CrdtDelta::GCounter(GCounterDelta { increment: 5 })),
            }
        );

        client
            .send_delta(CrdtDelta::GCounter(GCounterDelta { increment: 10 }))
            .await
            .unwrap();
        let outcome = client.command("Increment", &b"1"[..]).await.unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Reply {
                payload: Bytes::from_static(b"GCounter(16)"),
                delta: Some(CrdtDelta::GCounter(GCounterDelta { increment: 1 })),
            }
        );

        client.close_session().await.unwrap();
        assert!(shared.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_errors_keep_connection_open() {
        let shared = shared();
        let (mut client, _tx) = connect(&shared);

        let err = client.command("Increment", &b"1"[..]).await.unwrap_err();
        assert_eq!(remote_code(err), HostErrorCode::NoActiveSession);

        let err = client.open_session("test.Missing", "x", None).await.unwrap_err();
        assert_eq!(remote_code(err), HostErrorCode::UnknownService);

        client.open_session("test.Counter", "c-1", None).await.unwrap();
        let err = client
            .send_delta(CrdtDelta::Flag(FlagDelta { value: true }))
            .await
            .unwrap_err();
        assert_eq!(remote_code(err), HostErrorCode::DeltaMismatch);

        let err = client.open_session("test.Counter", "c-2", None).await.unwrap_err();
        assert_eq!(remote_code(err), HostErrorCode::SessionConflict);

        let outcome = client.command("Increment", &b"-3"[..]).await.unwrap();
        assert!(matches!(outcome, CommandOutcome::Failure(ref m) if m.contains("invalid operation")));

        let outcome = client.command("Increment", &b"2"[..]).await.unwrap();
        assert!(matches!(outcome, CommandOutcome::Reply { .. }));
    }

    #[tokio::test]
    async fn test_same_entity_on_two_connections_conflicts() {
        let shared = shared();
        let (mut first, _tx1) = connect(&shared);
        let (mut second, _tx2) = connect(&shared);

        first.open_session("test.Counter", "c-1", None).await.unwrap();
        let err = second.open_session("test.Counter", "c-1", None).await.unwrap_err();
        assert_eq!(remote_code(err), HostErrorCode::SessionConflict);

        first.close_session().await.unwrap();
        second.open_session("test.Counter", "c-1", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_hangup_releases_session() {
        let shared = shared();
        let (mut client, _tx) = connect(&shared);
        client.open_session("test.Counter", "c-1", None).await.unwrap();
        drop(client);

        for _ in 0..100 {
            if shared.sessions.is_empty() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("session still held after hangup");
    }

    #[tokio::test]
    async fn test_shutdown_ends_connection() {
        let shared = shared();
        let (sidecar, host) = memory::pair();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(serve(host, Arc::clone(&shared), rx));

        let mut client = HostClient::new(sidecar);
        client.open_session("test.Counter", "c-1", None).await.unwrap();

        tx.send(true).unwrap();
        task.await.unwrap().unwrap();
        assert!(shared.sessions.is_empty());
    }
}
