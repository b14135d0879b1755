//! The catalog as a sum type.
//!
//! [`CrdtState`] is what an entity session owns: one replica of one
//! replicated value. It dispatches the shared state/delta contract to the
//! variant structs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::delta::CrdtDelta;
use crate::error::{CrdtError, Result};
use crate::flag::Flag;
use crate::gcounter::GCounter;
use crate::gset::GSet;
use crate::kind::CrdtKind;
use crate::lww::{LwwClock, LwwRegister};
use crate::ormap::OrMap;
use crate::orset::OrSet;
use crate::pncounter::PnCounter;
use crate::types::{Element, ReplicaId};
use crate::vote::{Vote, VoteValue};

/// A local mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrdtOperation {
    /// GCounter, PnCounter.
    Increment(i64),
    /// PnCounter.
    Decrement(i64),
    /// GSet, OrSet.
    Add(Element),
    /// OrSet, OrMap (removes the key).
    Remove(Element),
    /// OrSet, OrMap.
    Clear,
    /// Flag.
    Enable,
    /// LwwRegister.
    Set { value: Element, clock: LwwClock },
    /// Vote.
    Vote(bool),
    /// OrMap: make sure `key` holds an empty CRDT of `kind`.
    Put { key: Element, kind: CrdtKind },
    /// OrMap: mutate the CRDT under `key`.
    Update { key: Element, op: Box<CrdtOperation> },
}

impl CrdtOperation {
    pub fn name(&self) -> &'static str {
        match self {
            CrdtOperation::Increment(_) => "increment",
            CrdtOperation::Decrement(_) => "decrement",
            CrdtOperation::Add(_) => "add",
            CrdtOperation::Remove(_) => "remove",
            CrdtOperation::Clear => "clear",
            CrdtOperation::Enable => "enable",
            CrdtOperation::Set { .. } => "set",
            CrdtOperation::Vote(_) => "vote",
            CrdtOperation::Put { .. } => "put",
            CrdtOperation::Update { .. } => "update",
        }
    }
}

/// A materialized snapshot of a CRDT's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrdtValue {
    GCounter(u64),
    PnCounter(i64),
    GSet(BTreeSet<Element>),
    OrSet(BTreeSet<Element>),
    Flag(bool),
    LwwRegister(Option<Element>),
    Vote(VoteValue),
    OrMap(BTreeMap<Element, CrdtValue>),
}

/// One replica of a replicated value, for any kind in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrdtState {
    GCounter(GCounter),
    PnCounter(PnCounter),
    GSet(GSet),
    OrSet(OrSet),
    Flag(Flag),
    LwwRegister(LwwRegister),
    Vote(Vote),
    OrMap(OrMap),
}

impl CrdtState {
    /// A fresh state holding the kind's identity value.
    pub fn new(kind: CrdtKind, replica: ReplicaId) -> Self {
        match kind {
            CrdtKind::GCounter => CrdtState::GCounter(GCounter::new()),
            CrdtKind::PnCounter => CrdtState::PnCounter(PnCounter::new()),
            CrdtKind::GSet => CrdtState::GSet(GSet::new()),
            CrdtKind::OrSet => CrdtState::OrSet(OrSet::new(replica)),
            CrdtKind::Flag => CrdtState::Flag(Flag::new()),
            CrdtKind::LwwRegister => CrdtState::LwwRegister(LwwRegister::new(replica)),
            CrdtKind::Vote => CrdtState::Vote(Vote::new(replica)),
            CrdtKind::OrMap => CrdtState::OrMap(OrMap::new(replica)),
        }
    }

    /// Restore a state from a previously exported delta.
    ///
    /// The result has nothing pending.
    pub fn from_delta(replica: ReplicaId, delta: &CrdtDelta) -> Result<Self> {
        let mut state = Self::new(delta.kind(), replica);
        state.apply_delta(delta)?;
        Ok(state)
    }

    pub fn kind(&self) -> CrdtKind {
        match self {
            CrdtState::GCounter(_) => CrdtKind::GCounter,
            CrdtState::PnCounter(_) => CrdtKind::PnCounter,
            CrdtState::GSet(_) => CrdtKind::GSet,
            CrdtState::OrSet(_) => CrdtKind::OrSet,
            CrdtState::Flag(_) => CrdtKind::Flag,
            CrdtState::LwwRegister(_) => CrdtKind::LwwRegister,
            CrdtState::Vote(_) => CrdtKind::Vote,
            CrdtState::OrMap(_) => CrdtKind::OrMap,
        }
    }

    pub fn current_value(&self) -> CrdtValue {
        match self {
            CrdtState::GCounter(c) => CrdtValue::GCounter(c.value()),
            CrdtState::PnCounter(c) => CrdtValue::PnCounter(c.value()),
            CrdtState::GSet(s) => CrdtValue::GSet(s.elements().clone()),
            CrdtState::OrSet(s) => CrdtValue::OrSet(s.elements()),
            CrdtState::Flag(f) => CrdtValue::Flag(f.is_enabled()),
            CrdtState::LwwRegister(r) => CrdtValue::LwwRegister(r.value().cloned()),
            CrdtState::Vote(v) => CrdtValue::Vote(v.value()),
            CrdtState::OrMap(m) => CrdtValue::OrMap(m.value()),
        }
    }

    /// Whether a mutation is waiting to be exported.
    pub fn has_pending(&self) -> bool {
        match self {
            CrdtState::GCounter(c) => c.has_pending(),
            CrdtState::PnCounter(c) => c.has_pending(),
            CrdtState::GSet(s) => s.has_pending(),
            CrdtState::OrSet(s) => s.has_pending(),
            CrdtState::Flag(f) => f.has_pending(),
            CrdtState::LwwRegister(r) => r.has_pending(),
            CrdtState::Vote(v) => v.has_pending(),
            CrdtState::OrMap(m) => m.has_pending(),
        }
    }

    /// Apply a local mutation.
    ///
    /// An operation the kind does not support fails with
    /// [`CrdtError::InvalidOperation`]. A failed mutation changes nothing.
    pub fn mutate(&mut self, op: CrdtOperation) -> Result<()> {
        match (self, op) {
            (CrdtState::GCounter(c), CrdtOperation::Increment(by)) => c.increment(by),
            (CrdtState::PnCounter(c), CrdtOperation::Increment(by)) => c.increment(by),
            (CrdtState::PnCounter(c), CrdtOperation::Decrement(by)) => c.decrement(by),
            (CrdtState::GSet(s), CrdtOperation::Add(element)) => {
                s.add(element);
                Ok(())
            }
            (CrdtState::OrSet(s), CrdtOperation::Add(element)) => {
                s.add(element);
                Ok(())
            }
            (CrdtState::OrSet(s), CrdtOperation::Remove(element)) => {
                s.remove(&element);
                Ok(())
            }
            (CrdtState::OrSet(s), CrdtOperation::Clear) => {
                s.clear();
                Ok(())
            }
            (CrdtState::Flag(f), CrdtOperation::Enable) => {
                f.enable();
                Ok(())
            }
            (CrdtState::LwwRegister(r), CrdtOperation::Set { value, clock }) => {
                r.set(value, clock);
                Ok(())
            }
            (CrdtState::Vote(v), CrdtOperation::Vote(vote)) => {
                v.vote(vote);
                Ok(())
            }
            (CrdtState::OrMap(m), CrdtOperation::Put { key, kind }) => m.put(key, kind).map(|_| ()),
            (CrdtState::OrMap(m), CrdtOperation::Update { key, op }) => m.update(&key, *op),
            (CrdtState::OrMap(m), CrdtOperation::Remove(key)) => {
                m.remove(&key);
                Ok(())
            }
            (CrdtState::OrMap(m), CrdtOperation::Clear) => {
                m.clear();
                Ok(())
            }
            (state, op) => Err(CrdtError::InvalidOperation(format!(
                "{} does not support {}",
                state.kind(),
                op.name()
            ))),
        }
    }

    /// Hand out the pending delta and reset it.
    ///
    /// Returns `None` when nothing is pending, unless `include_if_empty` asks
    /// for an explicit (possibly empty) delta.
    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<CrdtDelta> {
        match self {
            CrdtState::GCounter(c) => c.export_delta(include_if_empty).map(CrdtDelta::GCounter),
            CrdtState::PnCounter(c) => c.export_delta(include_if_empty).map(CrdtDelta::PnCounter),
            CrdtState::GSet(s) => s.export_delta(include_if_empty).map(CrdtDelta::GSet),
            CrdtState::OrSet(s) => s.export_delta(include_if_empty).map(CrdtDelta::OrSet),
            CrdtState::Flag(f) => f.export_delta(include_if_empty).map(CrdtDelta::Flag),
            CrdtState::LwwRegister(r) => {
                r.export_delta(include_if_empty).map(CrdtDelta::LwwRegister)
            }
            CrdtState::Vote(v) => v.export_delta(include_if_empty).map(CrdtDelta::Vote),
            CrdtState::OrMap(m) => m.export_delta(include_if_empty).map(CrdtDelta::OrMap),
        }
    }

    /// Merge a delta from another replica.
    ///
    /// A delta of a different kind fails with [`CrdtError::DeltaMismatch`]
    /// and leaves the state untouched.
    pub fn apply_delta(&mut self, delta: &CrdtDelta) -> Result<()> {
        match (self, delta) {
            (CrdtState::GCounter(c), CrdtDelta::GCounter(d)) => c.apply_delta(d),
            (CrdtState::PnCounter(c), CrdtDelta::PnCounter(d)) => c.apply_delta(d),
            (CrdtState::GSet(s), CrdtDelta::GSet(d)) => {
                s.apply_delta(d);
                Ok(())
            }
            (CrdtState::OrSet(s), CrdtDelta::OrSet(d)) => {
                s.apply_delta(d);
                Ok(())
            }
            (CrdtState::Flag(f), CrdtDelta::Flag(d)) => {
                f.apply_delta(d);
                Ok(())
            }
            (CrdtState::LwwRegister(r), CrdtDelta::LwwRegister(d)) => {
                r.apply_delta(d);
                Ok(())
            }
            (CrdtState::Vote(v), CrdtDelta::Vote(d)) => {
                v.apply_delta(d);
                Ok(())
            }
            (CrdtState::OrMap(m), CrdtDelta::OrMap(d)) => m.apply_delta(d),
            (state, delta) => Err(CrdtError::DeltaMismatch {
                expected: state.kind(),
                found: delta.kind(),
            }),
        }
    }
}

impl fmt::Display for CrdtState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrdtState::GCounter(c) => c.fmt(f),
            CrdtState::PnCounter(c) => c.fmt(f),
            CrdtState::GSet(s) => s.fmt(f),
            CrdtState::OrSet(s) => s.fmt(f),
            CrdtState::Flag(x) => x.fmt(f),
            CrdtState::LwwRegister(r) => r.fmt(f),
            CrdtState::Vote(v) => v.fmt(f),
            CrdtState::OrMap(m) => m.fmt(f),
        }
    }
}
