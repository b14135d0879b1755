//! Discovery service.
//!
//! Answers the sidecar's handshake with the descriptor set, the registered
//! entities and the identity of this process, and receives the errors the
//! sidecar reports about it.

use std::sync::Arc;

use async_trait::async_trait;

use crdt_host_protocol::{
    EntitySpec, ProxyInfo, ServiceInfo, UserFunctionError, PROTOCOL_MAJOR_VERSION,
    PROTOCOL_MINOR_VERSION,
};

use crate::config::HostConfig;
use crate::descriptor::DescriptorSet;
use crate::registry::EntityRegistry;

/// Name of the support library reported in discovery.
pub const SUPPORT_LIBRARY_NAME: &str = env!("CARGO_PKG_NAME");

/// Version of the support library reported in discovery.
pub const SUPPORT_LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The discovery half of the protocol.
#[async_trait]
pub trait EntityDiscovery: Send + Sync {
    /// Describe the entities this process serves.
    async fn discover(&self, proxy: &ProxyInfo) -> EntitySpec;

    /// Record an error the sidecar observed. Never fails.
    async fn report_error(&self, error: &UserFunctionError);
}

struct Inner {
    proto: bytes::Bytes,
    registry: Arc<EntityRegistry>,
    service_info: ServiceInfo,
}

/// Discovery backed by a frozen registry. Cheap to clone.
#[derive(Clone)]
pub struct DiscoveryService {
    inner: Arc<Inner>,
}

impl DiscoveryService {
    pub fn new(config: &HostConfig, descriptor: &DescriptorSet, registry: Arc<EntityRegistry>) -> Self {
        let service_info = ServiceInfo {
            service_name: config.service_name.clone(),
            service_version: config.service_version.clone(),
            service_runtime: service_runtime(),
            support_library_name: SUPPORT_LIBRARY_NAME.to_string(),
            support_library_version: SUPPORT_LIBRARY_VERSION.to_string(),
            protocol_major_version: PROTOCOL_MAJOR_VERSION,
            protocol_minor_version: PROTOCOL_MINOR_VERSION,
        };
        Self {
            inner: Arc::new(Inner {
                proto: descriptor.bytes(),
                registry,
                service_info,
            }),
        }
    }

    pub fn service_info(&self) -> &ServiceInfo {
        &self.inner.service_info
    }
}

impl std::fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("service_info", self.service_info())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EntityDiscovery for DiscoveryService {
    async fn discover(&self, proxy: &ProxyInfo) -> EntitySpec {
        let entities = self.inner.registry.descriptors();
        tracing::debug!(
            proxy_name = %proxy.proxy_name,
            proxy_version = %proxy.proxy_version,
            protocol_major = proxy.protocol_major_version,
            protocol_minor = proxy.protocol_minor_version,
            supported_entity_types = ?proxy.supported_entity_types,
            entities = entities.len(),
            "discover"
        );
        EntitySpec {
            proto: self.inner.proto.clone(),
            entities,
            service_info: self.inner.service_info.clone(),
        }
    }

    async fn report_error(&self, error: &UserFunctionError) {
        tracing::error!("Error reported from sidecar: {}", error.message);
    }
}

/// `rust <min-version>+ (<os>-<arch>)`, the runtime reported in discovery.
///
/// The version is the minimum supported toolchain of this crate, not the
/// compiler that built the process.
pub fn service_runtime() -> String {
    format!(
        "rust {}+ ({}-{})",
        env!("CARGO_PKG_RUST_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
