//! The closed catalog of CRDT kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrdtError;

/// Discriminator for every replicated data type this runtime can host.
///
/// Extending the catalog means adding a variant here, a variant struct, and
/// the matching arms in [`crate::CrdtState`] and [`crate::CrdtDelta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrdtKind {
    /// Grow-only counter.
    GCounter,
    /// Positive-negative counter.
    PnCounter,
    /// Grow-only set.
    GSet,
    /// Observed-remove set.
    OrSet,
    /// A flag that can only be switched on.
    Flag,
    /// Last-writer-wins register.
    LwwRegister,
    /// One ballot per replica.
    Vote,
    /// Observed-remove map of nested CRDTs.
    OrMap,
}

impl CrdtKind {
    /// Every kind, in declaration order.
    pub const ALL: [CrdtKind; 8] = [
        CrdtKind::GCounter,
        CrdtKind::PnCounter,
        CrdtKind::GSet,
        CrdtKind::OrSet,
        CrdtKind::Flag,
        CrdtKind::LwwRegister,
        CrdtKind::Vote,
        CrdtKind::OrMap,
    ];

    /// Stable tag, shared with the delta envelope.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CrdtKind::GCounter => "gcounter",
            CrdtKind::PnCounter => "pncounter",
            CrdtKind::GSet => "gset",
            CrdtKind::OrSet => "orset",
            CrdtKind::Flag => "flag",
            CrdtKind::LwwRegister => "lwwregister",
            CrdtKind::Vote => "vote",
            CrdtKind::OrMap => "ormap",
        }
    }

    /// Whether re-applying the same delta leaves the value unchanged.
    ///
    /// Counters are not: a redelivered increment is counted again. Maps are
    /// not either, since their entries may be counters.
    pub const fn is_idempotent(&self) -> bool {
        !matches!(
            self,
            CrdtKind::GCounter | CrdtKind::PnCounter | CrdtKind::OrMap
        )
    }
}

impl fmt::Display for CrdtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrdtKind {
    type Err = CrdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CrdtKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CrdtError::UnknownKind(s.to_string()))
    }
}
