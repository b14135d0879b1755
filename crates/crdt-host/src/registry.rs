//! Entity registry.
//!
//! Definitions are accumulated in a [`RegistryBuilder`] and frozen into an
//! [`EntityRegistry`] before the listener binds. The frozen registry is only
//! read, so it is shared between connections without locking.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crdt_host_core::CrdtKind;
use crdt_host_protocol::EntityDescriptor;

use crate::entity::CrdtEntityHandler;
use crate::error::{HostError, Result};

/// The entity types this host can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A replicated-data entity backed by one CRDT.
    Crdt,
}

impl EntityKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Crdt => "crdt",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "crdt" => Ok(EntityKind::Crdt),
            other => Err(HostError::UnsupportedEntityKind(other.to_string())),
        }
    }
}

/// One entity a user registers with the host.
#[derive(Clone)]
pub struct EntityDefinition {
    entity_kind: EntityKind,
    service_name: String,
    persistence_id: String,
    crdt_kind: CrdtKind,
    handler: Arc<dyn CrdtEntityHandler>,
}

impl EntityDefinition {
    /// A CRDT entity. The persistence id defaults to the last segment of the
    /// service name.
    pub fn crdt(
        service_name: impl Into<String>,
        crdt_kind: CrdtKind,
        handler: impl CrdtEntityHandler + 'static,
    ) -> Self {
        let service_name = service_name.into();
        let persistence_id = default_persistence_id(&service_name).to_string();
        Self {
            entity_kind: EntityKind::Crdt,
            service_name,
            persistence_id,
            crdt_kind,
            handler: Arc::new(handler),
        }
    }

    /// An entity declared by its type tags, as they appear in configuration.
    ///
    /// Fails on an entity type other than `"crdt"` or an unknown CRDT kind.
    pub fn declared(
        entity_type: &str,
        service_name: impl Into<String>,
        crdt_kind: &str,
        handler: impl CrdtEntityHandler + 'static,
    ) -> Result<Self> {
        let entity_kind: EntityKind = entity_type.parse()?;
        let crdt_kind: CrdtKind = crdt_kind.parse()?;
        let mut definition = Self::crdt(service_name, crdt_kind, handler);
        definition.entity_kind = entity_kind;
        Ok(definition)
    }

    /// Override the persistence id.
    pub fn persistence_id(mut self, persistence_id: impl Into<String>) -> Self {
        self.persistence_id = persistence_id.into();
        self
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn crdt_kind(&self) -> CrdtKind {
        self.crdt_kind
    }

    pub fn handler(&self) -> &Arc<dyn CrdtEntityHandler> {
        &self.handler
    }

    /// How this entity is advertised in discovery.
    pub fn descriptor(&self) -> EntityDescriptor {
        EntityDescriptor {
            entity_type: self.entity_kind.as_str().to_string(),
            service_name: self.service_name.clone(),
            persistence_id: self.persistence_id.clone(),
        }
    }
}

impl fmt::Debug for EntityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDefinition")
            .field("entity_kind", &self.entity_kind)
            .field("service_name", &self.service_name)
            .field("persistence_id", &self.persistence_id)
            .field("crdt_kind", &self.crdt_kind)
            .finish_non_exhaustive()
    }
}

fn default_persistence_id(service_name: &str) -> &str {
    service_name.rsplit('.').next().unwrap_or(service_name)
}

/// Accumulates entity definitions in registration order.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: Vec<EntityDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: EntityDefinition) -> &mut Self {
        self.definitions.push(definition);
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Freeze the registry.
    ///
    /// Fails on an empty service name or a service registered twice.
    pub fn build(self) -> Result<EntityRegistry> {
        let mut by_service = HashMap::with_capacity(self.definitions.len());
        for (index, definition) in self.definitions.iter().enumerate() {
            if definition.service_name.is_empty() {
                return Err(HostError::EmptyServiceName);
            }
            if by_service
                .insert(definition.service_name.clone(), index)
                .is_some()
            {
                return Err(HostError::DuplicateService(definition.service_name.clone()));
            }
        }
        Ok(EntityRegistry {
            definitions: self.definitions,
            by_service,
        })
    }
}

/// The frozen set of entities served by a host.
#[derive(Debug)]
pub struct EntityRegistry {
    definitions: Vec<EntityDefinition>,
    by_service: HashMap<String, usize>,
}

impl EntityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Descriptors of every entity, in registration order.
    pub fn descriptors(&self) -> Vec<EntityDescriptor> {
        self.definitions.iter().map(EntityDefinition::descriptor).collect()
    }

    /// Every definition of the given entity kind, in registration order.
    pub fn services(&self, kind: EntityKind) -> impl Iterator<Item = &EntityDefinition> {
        self.definitions
            .iter()
            .filter(move |definition| definition.entity_kind == kind)
    }

    pub fn lookup(&self, service_name: &str) -> Option<&EntityDefinition> {
        self.by_service
            .get(service_name)
            .and_then(|index| self.definitions.get(*index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::entity::CommandContext;

    fn noop(_: &mut CommandContext<'_>, _: &str, _: &Bytes) -> anyhow::Result<Bytes> {
        Ok(Bytes::new())
    }

    #[test]
    fn test_default_persistence_id() {
        let def = EntityDefinition::crdt("com.example.shop.Cart", CrdtKind::OrMap, noop);
        assert_eq!(def.descriptor().persistence_id, "Cart");

        let def = EntityDefinition::crdt("Counter", CrdtKind::GCounter, noop);
        assert_eq!(def.descriptor().persistence_id, "Counter");

        let def = def.persistence_id("counters");
        assert_eq!(def.descriptor().persistence_id, "counters");
    }

    #[test]
    fn test_registration_order_and_lookup() {
        let mut builder = EntityRegistry::builder();
        builder
            .register(EntityDefinition::crdt("a.One", CrdtKind::GCounter, noop))
            .register(EntityDefinition::crdt("a.Two", CrdtKind::OrSet, noop));
        let registry = builder.build().unwrap();

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry
            .descriptors()
            .into_iter()
            .map(|d| d.service_name)
            .collect();
        assert_eq!(names, ["a.One", "a.Two"]);
        assert_eq!(registry.services(EntityKind::Crdt).count(), 2);
        assert_eq!(
            registry.lookup("a.Two").map(EntityDefinition::crdt_kind),
            Some(CrdtKind::OrSet)
        );
        assert!(registry.lookup("a.Three").is_none());
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(EntityDefinition::crdt("a.One", CrdtKind::GCounter, noop))
            .register(EntityDefinition::crdt("a.One", CrdtKind::Flag, noop));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, HostError::DuplicateService(ref name) if name == "a.One"));
    }

    #[test]
    fn test_empty_service_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(EntityDefinition::crdt("", CrdtKind::GCounter, noop));
        assert!(matches!(builder.build(), Err(HostError::EmptyServiceName)));
    }

    #[test]
    fn test_declared_tags() {
        let def = EntityDefinition::declared("crdt", "a.Votes", "vote", noop).unwrap();
        assert_eq!(def.crdt_kind(), CrdtKind::Vote);
        assert_eq!(def.descriptor().entity_type, "crdt");

        let err = EntityDefinition::declared("event-sourced", "a.X", "gcounter", noop).unwrap_err();
        assert!(matches!(err, HostError::UnsupportedEntityKind(ref tag) if tag == "event-sourced"));

        let err = EntityDefinition::declared("crdt", "a.X", "hyperloglog", noop).unwrap_err();
        assert!(matches!(err, HostError::Crdt(_)));
    }
}
