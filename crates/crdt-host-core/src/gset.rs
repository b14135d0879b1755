//! Grow-only set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::types::Element;

/// Elements added since the last export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GSetDelta {
    pub added: Vec<Element>,
}

/// A grow-only set replica. Merge is union, so deltas are idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GSet {
    elements: BTreeSet<Element>,
    added: BTreeSet<Element>,
}

impl GSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &BTreeSet<Element> {
        &self.elements
    }

    pub fn contains(&self, element: &Element) -> bool {
        self.elements.contains(element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        !self.added.is_empty()
    }

    /// Add an element. Returns false if it was already present.
    pub fn add(&mut self, element: Element) -> bool {
        if !self.elements.insert(element.clone()) {
            return false;
        }
        self.added.insert(element);
        true
    }

    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<GSetDelta> {
        if self.added.is_empty() && !include_if_empty {
            return None;
        }
        Some(GSetDelta {
            added: std::mem::take(&mut self.added).into_iter().collect(),
        })
    }

    pub fn apply_delta(&mut self, delta: &GSetDelta) {
        self.elements.extend(delta.added.iter().cloned());
    }
}

impl fmt::Display for GSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GSet(")?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{element}")?;
        }
        f.write_str(")")
    }
}
