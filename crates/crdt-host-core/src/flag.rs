//! A flag that starts disabled and can only be enabled.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDelta {
    pub value: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flag {
    value: bool,
    pending: bool,
}

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.value
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Enable the flag. Enabling an already enabled flag records nothing.
    pub fn enable(&mut self) {
        if !self.value {
            self.value = true;
            self.pending = true;
        }
    }

    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<FlagDelta> {
        if !self.pending && !include_if_empty {
            return None;
        }
        Some(FlagDelta {
            value: std::mem::take(&mut self.pending),
        })
    }

    pub fn apply_delta(&mut self, delta: &FlagDelta) {
        self.value |= delta.value;
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flag({})", self.value)
    }
}
