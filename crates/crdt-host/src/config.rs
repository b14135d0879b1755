//! Host configuration.

use std::path::PathBuf;

use crdt_host_core::ReplicaId;

use crate::error::{HostError, Result};

/// Default interface to bind.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default port to bind.
pub const DEFAULT_BIND_PORT: u16 = 8080;

/// Default location of the serialized descriptor set.
pub const DEFAULT_DESCRIPTOR_SET_PATH: &str = "user-function.desc";

/// Configuration for the host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Interface the listener binds to.
    pub bind_address: String,
    /// Port the listener binds to. `0` picks an ephemeral port.
    pub bind_port: u16,
    /// Reported as `service_info.service_name` in discovery.
    pub service_name: String,
    /// Reported as `service_info.service_version` in discovery.
    pub service_version: String,
    /// File holding the descriptor set returned by discovery.
    pub descriptor_set_path: PathBuf,
    /// Identity of this process as a CRDT replica.
    pub replica_id: ReplicaId,
}

impl HostConfig {
    /// Defaults for a service of the given name and version.
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            bind_port: DEFAULT_BIND_PORT,
            service_name: service_name.into(),
            service_version: service_version.into(),
            descriptor_set_path: PathBuf::from(DEFAULT_DESCRIPTOR_SET_PATH),
            replica_id: ReplicaId::random(),
        }
    }

    /// Defaults overridden by the `HOST` and `PORT` environment variables.
    pub fn from_env(
        service_name: impl Into<String>,
        service_version: impl Into<String>,
    ) -> Result<Self> {
        let host = std::env::var("HOST").ok();
        let port = std::env::var("PORT").ok();
        Self::new(service_name, service_version).with_overrides(host.as_deref(), port.as_deref())
    }

    fn with_overrides(mut self, host: Option<&str>, port: Option<&str>) -> Result<Self> {
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.bind_address = host.to_string();
        }
        if let Some(port) = port.filter(|p| !p.is_empty()) {
            self.bind_port = port
                .parse()
                .map_err(|_| HostError::Config(format!("PORT is not a valid port: {port:?}")))?;
        }
        Ok(self)
    }

    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    pub fn bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn descriptor_set_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.descriptor_set_path = path.into();
        self
    }

    pub fn replica_id(mut self, replica_id: ReplicaId) -> Self {
        self.replica_id = replica_id;
        self
    }

    /// The `host:port` string handed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

/// Build a [`HostConfig`] named after the calling crate.
///
/// `host_config!()` uses the defaults. `host_config!(env)` also applies the
/// `HOST` and `PORT` overrides and evaluates to a `Result`.
#[macro_export]
macro_rules! host_config {
    () => {
        $crate::HostConfig::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    };
    (env) => {
        $crate::HostConfig::from_env(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    };
}
