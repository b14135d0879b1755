//! The seam between the host and entity business logic.

use bytes::Bytes;

use crdt_host_core::{CrdtKind, CrdtOperation, CrdtState, CrdtValue};

/// Business logic for one CRDT entity type.
///
/// The host calls `handle_command` for every command on a session, with
/// mutable access to that entity's CRDT. Mutations made through the context
/// become the delta replicated after the command. If the handler returns an
/// error, its mutations are rolled back and the sidecar receives a failure.
pub trait CrdtEntityHandler: Send + Sync {
    fn handle_command(
        &self,
        ctx: &mut CommandContext<'_>,
        name: &str,
        payload: &Bytes,
    ) -> anyhow::Result<Bytes>;
}

impl<F> CrdtEntityHandler for F
where
    F: Fn(&mut CommandContext<'_>, &str, &Bytes) -> anyhow::Result<Bytes> + Send + Sync,
{
    fn handle_command(
        &self,
        ctx: &mut CommandContext<'_>,
        name: &str,
        payload: &Bytes,
    ) -> anyhow::Result<Bytes> {
        self(ctx, name, payload)
    }
}

/// What a handler sees while processing one command.
#[derive(Debug)]
pub struct CommandContext<'a> {
    entity_id: &'a str,
    state: &'a mut CrdtState,
}

impl<'a> CommandContext<'a> {
    pub fn new(entity_id: &'a str, state: &'a mut CrdtState) -> Self {
        Self { entity_id, state }
    }

    pub fn entity_id(&self) -> &str {
        self.entity_id
    }

    pub fn kind(&self) -> CrdtKind {
        self.state.kind()
    }

    pub fn value(&self) -> CrdtValue {
        self.state.current_value()
    }

    pub fn state(&self) -> &CrdtState {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut CrdtState {
        self.state
    }

    /// Apply a local mutation to the entity's CRDT.
    pub fn mutate(&mut self, op: CrdtOperation) -> crdt_host_core::Result<()> {
        self.state.mutate(op)
    }
}
