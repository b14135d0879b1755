//! Observed-remove set.
//!
//! Every add is tagged with a fresh [`Dot`]. A remove only affects the dots
//! the removing replica has observed, so an add concurrent with a remove
//! survives (add wins). Removed dots are tombstoned; a tombstoned dot is never
//! resurrected, whichever order its add and remove arrive in.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::types::{Dot, Element, ReplicaId};

/// Adds and removes since the last export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrSetDelta {
    pub added: Vec<(Element, Dot)>,
    pub removed: Vec<Dot>,
}

impl OrSetDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// An observed-remove set replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrSet {
    replica: ReplicaId,
    /// Highest dot counter issued or seen for this replica.
    counter: u64,
    entries: BTreeMap<Element, BTreeSet<Dot>>,
    index: BTreeMap<Dot, Element>,
    tombstones: BTreeSet<Dot>,
    pending_added: BTreeMap<Dot, Element>,
    pending_removed: BTreeSet<Dot>,
}

impl OrSet {
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            counter: 0,
            entries: BTreeMap::new(),
            index: BTreeMap::new(),
            tombstones: BTreeSet::new(),
            pending_added: BTreeMap::new(),
            pending_removed: BTreeSet::new(),
        }
    }

    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Materialize the current members.
    pub fn elements(&self) -> BTreeSet<Element> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, element: &Element) -> bool {
        self.entries.contains_key(element)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_added.is_empty() || !self.pending_removed.is_empty()
    }

    /// Iterate over the current members in order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.entries.keys()
    }

    /// The live dots of `element`, lowest first.
    pub fn dots(&self, element: &Element) -> impl DoubleEndedIterator<Item = &Dot> {
        self.entries.get(element).into_iter().flatten()
    }

    /// Whether `dot` is a live add of some element.
    pub fn contains_dot(&self, dot: &Dot) -> bool {
        self.index.contains_key(dot)
    }

    /// Add an element. Returns false if it was already present.
    pub fn add(&mut self, element: Element) -> bool {
        self.insert(element).is_some()
    }

    /// Add an element and return the dot tagging the add, or `None` if it
    /// was already present.
    pub fn insert(&mut self, element: Element) -> Option<Dot> {
        if self.entries.contains_key(&element) {
            return None;
        }
        self.counter += 1;
        let dot = Dot::new(self.replica, self.counter);
        self.insert_dot(element.clone(), dot);
        self.pending_added.insert(dot, element);
        Some(dot)
    }

    /// Remove an element and every dot observed for it.
    ///
    /// Returns false if the element was not present.
    pub fn remove(&mut self, element: &Element) -> bool {
        let Some(dots) = self.entries.remove(element) else {
            return false;
        };
        for dot in dots {
            self.index.remove(&dot);
            self.tombstones.insert(dot);
            // A dot nobody has seen yet does not need a remove on the wire.
            if self.pending_added.remove(&dot).is_none() {
                self.pending_removed.insert(dot);
            }
        }
        true
    }

    /// Remove every element currently observed.
    pub fn clear(&mut self) {
        let elements: Vec<Element> = self.entries.keys().cloned().collect();
        for element in &elements {
            self.remove(element);
        }
    }

    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<OrSetDelta> {
        if !self.has_pending() && !include_if_empty {
            return None;
        }
        Some(OrSetDelta {
            added: std::mem::take(&mut self.pending_added)
                .into_iter()
                .map(|(dot, element)| (element, dot))
                .collect(),
            removed: std::mem::take(&mut self.pending_removed).into_iter().collect(),
        })
    }

    /// Merge a remote delta. Removes are applied before adds so a delta that
    /// both adds and removes the same dot leaves it removed.
    pub fn apply_delta(&mut self, delta: &OrSetDelta) {
        for dot in &delta.removed {
            self.observe(dot);
            self.tombstones.insert(*dot);
            if let Some(element) = self.index.remove(dot) {
                if let Some(dots) = self.entries.get_mut(&element) {
                    dots.remove(dot);
                    if dots.is_empty() {
                        self.entries.remove(&element);
                    }
                }
            }
        }

        for (element, dot) in &delta.added {
            self.observe(dot);
            if self.tombstones.contains(dot) || self.index.contains_key(dot) {
                continue;
            }
            self.insert_dot(element.clone(), *dot);
        }
    }

    /// Never reissue a dot this replica is known to have used.
    fn observe(&mut self, dot: &Dot) {
        if dot.replica == self.replica {
            self.counter = self.counter.max(dot.counter);
        }
    }

    fn insert_dot(&mut self, element: Element, dot: Dot) {
        self.index.insert(dot, element.clone());
        self.entries.entry(element).or_default().insert(dot);
    }
}

impl fmt::Display for OrSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ORSet(")?;
        for (i, element) in self.entries.keys().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{element}")?;
        }
        f.write_str(")")
    }
}
