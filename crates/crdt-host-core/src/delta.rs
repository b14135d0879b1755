//! The delta envelope exchanged with the sidecar.

use serde::{Deserialize, Serialize};

use crate::flag::FlagDelta;
use crate::gcounter::GCounterDelta;
use crate::gset::GSetDelta;
use crate::kind::CrdtKind;
use crate::lww::LwwRegisterDelta;
use crate::ormap::OrMapDelta;
use crate::orset::OrSetDelta;
use crate::pncounter::PnCounterDelta;
use crate::vote::VoteDelta;

/// A delta tagged by the kind of CRDT that produced it.
///
/// Serialized externally tagged, e.g. `{"gcounter": {"increment": 8}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrdtDelta {
    GCounter(GCounterDelta),
    PnCounter(PnCounterDelta),
    GSet(GSetDelta),
    OrSet(OrSetDelta),
    Flag(FlagDelta),
    LwwRegister(LwwRegisterDelta),
    Vote(VoteDelta),
    OrMap(OrMapDelta),
}

impl CrdtDelta {
    /// The kind tag of this delta.
    pub fn kind(&self) -> CrdtKind {
        match self {
            CrdtDelta::GCounter(_) => CrdtKind::GCounter,
            CrdtDelta::PnCounter(_) => CrdtKind::PnCounter,
            CrdtDelta::GSet(_) => CrdtKind::GSet,
            CrdtDelta::OrSet(_) => CrdtKind::OrSet,
            CrdtDelta::Flag(_) => CrdtKind::Flag,
            CrdtDelta::LwwRegister(_) => CrdtKind::LwwRegister,
            CrdtDelta::Vote(_) => CrdtKind::Vote,
            CrdtDelta::OrMap(_) => CrdtKind::OrMap,
        }
    }
}
