//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a descriptor file on disk, a
//! counter entity, and a host bound to an ephemeral port.

use std::io::Write;
use std::net::SocketAddr;

use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::net::TcpStream;

use crdt_host::{
    CommandContext, CrdtEntityHandler, EntityDefinition, EntityHost, HostConfig, RunningHost,
};
use crdt_host_core::{CrdtKind, CrdtOperation, CrdtValue, ReplicaId};
use crdt_host_protocol::{FramedStream, HostClient, ProxyInfo};

/// Service name of the counter entity registered by [`TestHost::counter`].
pub const COUNTER_SERVICE: &str = "example.counter.Counter";

/// Stand-in descriptor set contents. The host never parses them.
pub const DESCRIPTOR_BYTES: &[u8] = b"\x0a\x0dcounter.proto\x12\x0fexample.counter";

/// Replica id used by fixture hosts.
pub const TEST_REPLICA: ReplicaId = ReplicaId::from_bytes([0x42; 16]);

/// Write [`DESCRIPTOR_BYTES`] to a temporary file.
pub fn descriptor_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create descriptor file");
    file.write_all(DESCRIPTOR_BYTES)
        .expect("write descriptor file");
    file
}

/// A configuration bound to an ephemeral local port.
pub fn test_config(descriptor: &NamedTempFile) -> HostConfig {
    HostConfig::new("crdt-host-testkit", "0.0.0")
        .bind_address("127.0.0.1")
        .bind_port(0)
        .descriptor_set_path(descriptor.path())
        .replica_id(TEST_REPLICA)
}

/// A proxy announcing itself the way a sidecar would.
pub fn test_proxy() -> ProxyInfo {
    ProxyInfo {
        protocol_major_version: crdt_host_protocol::PROTOCOL_MAJOR_VERSION,
        protocol_minor_version: crdt_host_protocol::PROTOCOL_MINOR_VERSION,
        proxy_name: "testkit-proxy".into(),
        proxy_version: "0.0.0".into(),
        supported_entity_types: vec!["crdt".into()],
    }
}

/// Handler for a GCounter entity.
///
/// - `Increment`: payload is a decimal amount; replies with the new value
/// - `Get`: replies with the current value
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterHandler;

impl CrdtEntityHandler for CounterHandler {
    fn handle_command(
        &self,
        ctx: &mut CommandContext<'_>,
        name: &str,
        payload: &Bytes,
    ) -> anyhow::Result<Bytes> {
        match name {
            "Increment" => {
                let by: i64 = std::str::from_utf8(payload)?.trim().parse()?;
                ctx.mutate(CrdtOperation::Increment(by))?;
            }
            "Get" => {}
            other => anyhow::bail!("unknown command: {other}"),
        }
        match ctx.value() {
            CrdtValue::GCounter(value) => Ok(Bytes::from(value.to_string())),
            other => anyhow::bail!("counter holds {other:?}"),
        }
    }
}

/// The counter entity definition.
pub fn counter_entity() -> EntityDefinition {
    EntityDefinition::crdt(COUNTER_SERVICE, CrdtKind::GCounter, CounterHandler)
}

/// A running host and the descriptor file it was started from.
pub struct TestHost {
    host: RunningHost,
    _descriptor: NamedTempFile,
}

impl TestHost {
    /// Start a host serving the given entities.
    pub async fn start(definitions: impl IntoIterator<Item = EntityDefinition>) -> Self {
        let descriptor = descriptor_file();
        let host = EntityHost::new(test_config(&descriptor))
            .expect("load descriptor")
            .add_entities(definitions)
            .start()
            .await
            .expect("start host");
        Self {
            host,
            _descriptor: descriptor,
        }
    }

    /// Start a host serving only the counter entity.
    pub async fn counter() -> Self {
        Self::start([counter_entity()]).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.host.local_addr()
    }

    pub fn host(&self) -> &RunningHost {
        &self.host
    }

    /// Open a new connection to the host.
    pub async fn client(&self) -> HostClient<FramedStream<TcpStream>> {
        HostClient::connect(self.addr())
            .await
            .expect("connect to host")
    }

    pub async fn shutdown(self) {
        self.host.shutdown().await.expect("shutdown host");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdt_host_core::{CrdtDelta, GCounterDelta};
    use crdt_host_protocol::CommandOutcome;

    #[tokio::test]
    async fn test_counter_host() {
        let host = TestHost::counter().await;
        let mut client = host.client().await;

        let spec = client.discover(test_proxy()).await.unwrap();
        assert_eq!(spec.proto, Bytes::from_static(DESCRIPTOR_BYTES));

        client.open_session(COUNTER_SERVICE, "c-1", None).await.unwrap();
        let outcome = client.command("Increment", &b"4"[..]).await.unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Reply {
                payload: Bytes::from_static(b"4"),
                delta: Some(CrdtDelta::GCounter(GCounterDelta { increment: 4 })),
            }
        );

        let outcome = client.command("Reset", Bytes::new()).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Failure("unknown command: Reset".into()));

        host.shutdown().await;
    }
}
