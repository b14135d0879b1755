//! Entity sessions.
//!
//! A session binds one connection to one entity instance, identified by
//! service name and entity id. It owns that instance's CRDT for as long as the
//! session is open. An entity can be bound by at most one session at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use crdt_host_core::{CrdtDelta, CrdtError, CrdtKind, CrdtState, ReplicaId};

use crate::entity::{CommandContext, CrdtEntityHandler};
use crate::error::{HostError, Result};
use crate::registry::EntityDefinition;

type SessionKey = (String, String);

/// The set of entities with an open session.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    active: Arc<Mutex<HashSet<SessionKey>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an entity. The claim is released when the lease is dropped.
    pub fn acquire(&self, service_name: &str, entity_id: &str) -> Result<SessionLease> {
        let key = (service_name.to_string(), entity_id.to_string());
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return Err(HostError::SessionConflict {
                service_name: key.0,
                entity_id: key.1,
            });
        }
        Ok(SessionLease {
            table: self.clone(),
            key,
        })
    }

    pub fn is_active(&self, service_name: &str, entity_id: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.contains(&(service_name.to_string(), entity_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &SessionKey) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Exclusive claim on one entity.
#[derive(Debug)]
pub struct SessionLease {
    table: SessionTable,
    key: SessionKey,
}

impl SessionLease {
    pub fn service_name(&self) -> &str {
        &self.key.0
    }

    pub fn entity_id(&self) -> &str {
        &self.key.1
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}

/// What a command produced.
#[derive(Debug)]
pub enum CommandResult {
    /// The handler succeeded. `delta` is the change to replicate, if any.
    Reply {
        payload: Bytes,
        delta: Option<CrdtDelta>,
    },
    /// The handler failed. Its mutations were rolled back.
    Failure(anyhow::Error),
}

/// One open entity instance.
pub struct EntitySession {
    lease: SessionLease,
    replica: ReplicaId,
    state: CrdtState,
    handler: Arc<dyn CrdtEntityHandler>,
    /// Whether the sidecar has seen this instance's state at least once.
    announced: bool,
}

impl EntitySession {
    /// Open a session, fresh or restored from an exported delta.
    ///
    /// The state writes under a fork of `replica`, so no two sessions of one
    /// entity ever reuse a dot or a ballot generation. A restoring delta of the wrong kind fails with
    /// [`CrdtError::DeltaMismatch`].
    pub fn open(
        lease: SessionLease,
        definition: &EntityDefinition,
        replica: ReplicaId,
        initial: Option<&CrdtDelta>,
    ) -> Result<Self> {
        let kind = definition.crdt_kind();
        let replica = replica.fork();
        let state = match initial {
            Some(delta) if delta.kind() != kind => {
                return Err(CrdtError::DeltaMismatch {
                    expected: kind,
                    found: delta.kind(),
                }
                .into());
            }
            Some(delta) => CrdtState::from_delta(replica, delta)?,
            None => CrdtState::new(kind, replica),
        };
        tracing::debug!(
            service = lease.service_name(),
            entity_id = lease.entity_id(),
            %kind,
            %replica,
            restored = initial.is_some(),
            "session opened"
        );
        Ok(Self {
            lease,
            replica,
            state,
            handler: Arc::clone(definition.handler()),
            announced: initial.is_some(),
        })
    }

    pub fn service_name(&self) -> &str {
        self.lease.service_name()
    }

    pub fn entity_id(&self) -> &str {
        self.lease.entity_id()
    }

    pub fn kind(&self) -> CrdtKind {
        self.state.kind()
    }

    /// The replica id this session's state writes under.
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    pub fn state(&self) -> &CrdtState {
        &self.state
    }

    /// Run a command and export the resulting delta.
    ///
    /// The first successful command of a fresh session always exports a
    /// delta, even an empty one, so the sidecar learns the initial state.
    pub fn handle_command(&mut self, name: &str, payload: &Bytes) -> CommandResult {
        let snapshot = self.state.clone();
        let outcome = {
            let mut ctx = CommandContext::new(self.lease.entity_id(), &mut self.state);
            self.handler.handle_command(&mut ctx, name, payload)
        };
        match outcome {
            Ok(payload) => {
                let delta = self.state.export_delta(!self.announced);
                self.announced = true;
                CommandResult::Reply { payload, delta }
            }
            Err(error) => {
                self.state = snapshot;
                tracing::debug!(
                    service = self.service_name(),
                    entity_id = self.entity_id(),
                    command = name,
                    error = %error,
                    "command failed"
                );
                CommandResult::Failure(error)
            }
        }
    }

    /// Merge a delta from another replica.
    pub fn apply_delta(&mut self, delta: &CrdtDelta) -> Result<()> {
        self.state.apply_delta(delta)?;
        Ok(())
    }

    /// Close the session. Unexported changes are discarded.
    pub fn close(self) {
        tracing::debug!(
            service = self.service_name(),
            entity_id = self.entity_id(),
            discarded_changes = self.state.has_pending(),
            "session closed"
        );
    }
}

impl std::fmt::Debug for EntitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySession")
            .field("service_name", &self.service_name())
            .field("entity_id", &self.entity_id())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
