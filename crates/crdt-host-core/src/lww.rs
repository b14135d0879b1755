//! Last-writer-wins register.
//!
//! Writes are ordered by [`LwwStamp`]: a logical clock first, then the
//! writing replica's id as a tie-break. The register keeps a Lamport clock
//! that advances past every stamp it has produced or merged, so a default
//! write always supersedes everything this replica has observed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Element, ReplicaId};

/// Total order over register writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LwwStamp {
    pub clock: u64,
    pub replica: ReplicaId,
}

impl LwwStamp {
    /// The stamp of an unset register; every real write is greater.
    pub const ZERO: Self = Self {
        clock: 0,
        replica: ReplicaId::ZERO,
    };
}

/// How the clock of a local write is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LwwClock {
    /// One past the highest clock observed.
    #[default]
    Default,
    /// Exactly the given value, even if older than the current write.
    Custom(u64),
    /// The given value, raised to one past the highest clock observed.
    CustomAutoIncrement(u64),
}

/// A register write: the value (absent for an unset register) and its stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LwwRegisterDelta {
    pub value: Option<Element>,
    pub stamp: LwwStamp,
}

/// A last-writer-wins register replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LwwRegister {
    replica: ReplicaId,
    clock: u64,
    value: Option<Element>,
    stamp: LwwStamp,
    pending: Option<LwwRegisterDelta>,
}

impl LwwRegister {
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            clock: 0,
            value: None,
            stamp: LwwStamp::ZERO,
            pending: None,
        }
    }

    pub fn value(&self) -> Option<&Element> {
        self.value.as_ref()
    }

    pub fn stamp(&self) -> LwwStamp {
        self.stamp
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Write a value and return the stamp it was written with.
    ///
    /// A write whose stamp does not beat the current one leaves the value as
    /// it is but is still exported, so the sidecar sees every local write.
    pub fn set(&mut self, value: Element, clock: LwwClock) -> LwwStamp {
        let next = match clock {
            LwwClock::Default => self.clock.saturating_add(1),
            LwwClock::Custom(v) => v,
            LwwClock::CustomAutoIncrement(v) => v.max(self.clock.saturating_add(1)),
        };
        self.clock = self.clock.max(next);

        let stamp = LwwStamp {
            clock: next,
            replica: self.replica,
        };
        let write = LwwRegisterDelta {
            value: Some(value),
            stamp,
        };
        self.merge(&write);

        // Keep the greatest local write: a later Custom clock may be older,
        // and an equal stamp lost to the earlier write.
        match &self.pending {
            Some(pending) if pending.stamp >= stamp => {}
            _ => self.pending = Some(write),
        }
        stamp
    }

    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<LwwRegisterDelta> {
        match self.pending.take() {
            Some(delta) => Some(delta),
            None if include_if_empty => Some(LwwRegisterDelta {
                value: self.value.clone(),
                stamp: self.stamp,
            }),
            None => None,
        }
    }

    pub fn apply_delta(&mut self, delta: &LwwRegisterDelta) {
        self.clock = self.clock.max(delta.stamp.clock);
        self.merge(delta);
    }

    fn merge(&mut self, write: &LwwRegisterDelta) {
        if write.stamp > self.stamp {
            self.value = write.value.clone();
            self.stamp = write.stamp;
        }
    }
}

impl fmt::Display for LwwRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "LWWRegister({value})"),
            None => f.write_str("LWWRegister(<unset>)"),
        }
    }
}
