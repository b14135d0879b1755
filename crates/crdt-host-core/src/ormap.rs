//! Observed-remove map of nested CRDTs.
//!
//! The key set behaves exactly like an [`OrSet`]. Every add of a key starts a
//! new incarnation: a nested [`CrdtState`] tagged with the add's [`Dot`].
//! Entry deltas name the incarnation they change, so a remove only ever
//! discards the incarnations it observed. When concurrent puts leave a key
//! with several live incarnations, the one with the greatest dot is visible.
//!
//! Deltas from one replica must be applied in the order they were exported.
//! An entry delta for an incarnation this replica does not hold is dropped:
//! either it was removed here, or its add was never delivered.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::delta::CrdtDelta;
use crate::error::{CrdtError, Result};
use crate::kind::CrdtKind;
use crate::orset::{OrSet, OrSetDelta};
use crate::state::{CrdtOperation, CrdtState, CrdtValue};
use crate::types::{Dot, Element, ReplicaId};

/// A nested delta for the incarnation of `key` started by the add `dot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrMapEntryDelta {
    pub key: Element,
    pub dot: Dot,
    pub delta: CrdtDelta,
}

/// Key changes plus nested deltas since the last export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrMapDelta {
    pub keys: OrSetDelta,
    pub entries: Vec<OrMapEntryDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrMap {
    replica: ReplicaId,
    keys: OrSet,
    /// One nested state per live add.
    values: BTreeMap<Dot, (Element, CrdtState)>,
    /// Incarnations whose state has never been exported.
    fresh: BTreeSet<Dot>,
}

impl OrMap {
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            keys: OrSet::new(replica),
            values: BTreeMap::new(),
            fresh: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    pub fn contains_key(&self, key: &Element) -> bool {
        self.get(key).is_some()
    }

    /// The visible state of `key`.
    pub fn get(&self, key: &Element) -> Option<&CrdtState> {
        let dot = self.visible(key)?;
        self.values.get(&dot).map(|(_, state)| state)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Element> {
        self.entries().map(|(key, _)| key)
    }

    pub fn has_pending(&self) -> bool {
        self.keys.has_pending()
            || !self.fresh.is_empty()
            || self.values.values().any(|(_, state)| state.has_pending())
    }

    pub fn value(&self) -> BTreeMap<Element, CrdtValue> {
        self.entries()
            .map(|(key, state)| (key.clone(), state.current_value()))
            .collect()
    }

    /// Ensure `key` holds a CRDT of `kind`, creating an empty one if absent.
    ///
    /// Fails if the key already holds a different kind.
    pub fn put(&mut self, key: Element, kind: CrdtKind) -> Result<&mut CrdtState> {
        let dot = match self.visible(&key) {
            Some(dot) => dot,
            None => {
                // Adds whose state never arrived are superseded.
                self.keys.remove(&key);
                let dot = self.keys.insert(key.clone()).ok_or_else(|| {
                    CrdtError::InvalidOperation(format!("key {key} is already present"))
                })?;
                self.values
                    .insert(dot, (key.clone(), CrdtState::new(kind, self.replica)));
                self.fresh.insert(dot);
                dot
            }
        };
        let (_, state) = self
            .values
            .get_mut(&dot)
            .ok_or_else(|| CrdtError::InvalidOperation(format!("no entry for key {key}")))?;
        if state.kind() != kind {
            return Err(CrdtError::InvalidOperation(format!(
                "key {key} holds a {}, not a {kind}",
                state.kind()
            )));
        }
        Ok(state)
    }

    /// Mutate the visible CRDT under `key`.
    pub fn update(&mut self, key: &Element, op: CrdtOperation) -> Result<()> {
        let (_, state) = self
            .visible(key)
            .and_then(|dot| self.values.get_mut(&dot))
            .ok_or_else(|| CrdtError::InvalidOperation(format!("no entry for key {key}")))?;
        state.mutate(op)
    }

    /// Remove `key` and every incarnation of it. Unexported nested changes
    /// are dropped.
    pub fn remove(&mut self, key: &Element) -> bool {
        let dots: Vec<Dot> = self.keys.dots(key).copied().collect();
        for dot in &dots {
            self.values.remove(dot);
            self.fresh.remove(dot);
        }
        self.keys.remove(key)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
        self.fresh.clear();
    }

    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<OrMapDelta> {
        let keys = self.keys.export_delta(false);
        let mut entries = Vec::new();
        for (dot, (key, state)) in self.values.iter_mut() {
            let first_export = self.fresh.remove(dot);
            if let Some(delta) = state.export_delta(first_export) {
                entries.push(OrMapEntryDelta {
                    key: key.clone(),
                    dot: *dot,
                    delta,
                });
            }
        }

        if keys.is_none() && entries.is_empty() && !include_if_empty {
            return None;
        }
        Some(OrMapDelta {
            keys: keys.unwrap_or_default(),
            entries,
        })
    }

    /// Merge a remote delta. Either the whole delta applies or nothing does.
    pub fn apply_delta(&mut self, delta: &OrMapDelta) -> Result<()> {
        let mut next = self.clone();
        next.apply_in_place(delta)?;
        *self = next;
        Ok(())
    }

    fn apply_in_place(&mut self, delta: &OrMapDelta) -> Result<()> {
        self.keys.apply_delta(&delta.keys);

        let keys = &self.keys;
        self.values.retain(|dot, _| keys.contains_dot(dot));
        self.fresh.retain(|dot| keys.contains_dot(dot));

        for entry in &delta.entries {
            if !self.keys.contains_dot(&entry.dot) {
                continue;
            }
            match self.values.get_mut(&entry.dot) {
                Some((_, state)) => state.apply_delta(&entry.delta)?,
                None => {
                    let state = CrdtState::from_delta(self.replica, &entry.delta)?;
                    self.values.insert(entry.dot, (entry.key.clone(), state));
                }
            }
        }
        Ok(())
    }

    /// The greatest live dot of `key` that has a state.
    fn visible(&self, key: &Element) -> Option<Dot> {
        self.keys
            .dots(key)
            .rev()
            .find(|dot| self.values.contains_key(*dot))
            .copied()
    }

    fn entries(&self) -> impl Iterator<Item = (&Element, &CrdtState)> {
        self.keys
            .iter()
            .filter_map(move |key| self.get(key).map(|state| (key, state)))
    }
}

impl fmt::Display for OrMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ORMap(")?;
        for (i, (key, state)) in self.entries().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} -> {state}")?;
        }
        f.write_str(")")
    }
}
