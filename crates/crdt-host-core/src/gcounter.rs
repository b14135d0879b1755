//! Grow-only counter.
//!
//! The counter can be incremented but never decremented. The value is an
//! unsigned 64-bit integer; increments that would push it past `u64::MAX`
//! are rejected.
//!
//! Deltas carry increments, never totals, so deltas exported by different
//! replicas commute. Re-applying the same delta counts it twice.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CrdtError, Result};

/// Increment accumulated since the last export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GCounterDelta {
    pub increment: u64,
}

/// A grow-only counter replica.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GCounter {
    value: u64,
    delta: u64,
}

impl GCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current value.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Whether increments are waiting to be exported.
    pub fn has_pending(&self) -> bool {
        self.delta > 0
    }

    /// Increment by a signed amount.
    ///
    /// Negative amounts fail with [`CrdtError::InvalidOperation`]; a zero
    /// increment is a no-op and adds nothing to the pending delta.
    pub fn increment(&mut self, by: i64) -> Result<()> {
        if by < 0 {
            return Err(CrdtError::InvalidOperation(format!(
                "cannot decrement a GCounter (increment of {by})"
            )));
        }
        self.increment_unsigned(by.unsigned_abs())
    }

    /// Increment by an unsigned amount.
    pub fn increment_unsigned(&mut self, by: u64) -> Result<()> {
        if by == 0 {
            return Ok(());
        }
        let value = self.value.checked_add(by).ok_or(CrdtError::CounterOverflow)?;
        let delta = self.delta.checked_add(by).ok_or(CrdtError::CounterOverflow)?;
        self.value = value;
        self.delta = delta;
        Ok(())
    }

    /// Hand out the pending increment and reset it.
    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<GCounterDelta> {
        if self.delta == 0 && !include_if_empty {
            return None;
        }
        Some(GCounterDelta {
            increment: std::mem::take(&mut self.delta),
        })
    }

    /// Add a remote increment to the value.
    pub fn apply_delta(&mut self, delta: &GCounterDelta) -> Result<()> {
        self.value = self
            .value
            .checked_add(delta.increment)
            .ok_or(CrdtError::CounterOverflow)?;
        Ok(())
    }
}

impl fmt::Display for GCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GCounter({})", self.value)
    }
}
