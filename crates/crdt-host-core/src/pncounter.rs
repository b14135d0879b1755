//! Positive-negative counter.
//!
//! Like [`crate::GCounter`] but also supports decrements. The value is a
//! signed 64-bit integer; the delta is the net change since the last export.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CrdtError, Result};

/// Net change accumulated since the last export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnCounterDelta {
    pub change: i64,
}

/// A positive-negative counter replica.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PnCounter {
    value: i64,
    delta: i64,
    /// Set once any non-zero change is made, so a net-zero delta still exports.
    dirty: bool,
}

impl PnCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn has_pending(&self) -> bool {
        self.dirty
    }

    /// Add `by` (which may be negative) to the counter.
    pub fn increment(&mut self, by: i64) -> Result<()> {
        if by == 0 {
            return Ok(());
        }
        let value = self.value.checked_add(by).ok_or(CrdtError::CounterOverflow)?;
        let delta = self.delta.checked_add(by).ok_or(CrdtError::CounterOverflow)?;
        self.value = value;
        self.delta = delta;
        self.dirty = true;
        Ok(())
    }

    /// Subtract `by` from the counter.
    pub fn decrement(&mut self, by: i64) -> Result<()> {
        let negated = by.checked_neg().ok_or(CrdtError::CounterOverflow)?;
        self.increment(negated)
    }

    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<PnCounterDelta> {
        if !self.dirty && !include_if_empty {
            return None;
        }
        self.dirty = false;
        Some(PnCounterDelta {
            change: std::mem::take(&mut self.delta),
        })
    }

    pub fn apply_delta(&mut self, delta: &PnCounterDelta) -> Result<()> {
        self.value = self
            .value
            .checked_add(delta.change)
            .ok_or(CrdtError::CounterOverflow)?;
        Ok(())
    }
}

impl fmt::Display for PnCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PNCounter({})", self.value)
    }
}
