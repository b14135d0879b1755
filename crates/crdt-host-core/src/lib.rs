//! # crdt-host core
//!
//! Delta-state CRDTs for entities hosted by crdt-host.
//!
//! This crate contains no I/O, no networking and no entity logic. It is pure
//! computation over replicated values.
//!
//! ## Key Types
//!
//! - [`CrdtState`] - One replica's view of a replicated value (sum over the catalog)
//! - [`CrdtDelta`] - The minimal change since the last export, tagged by kind
//! - [`CrdtKind`] - The closed set of supported CRDT kinds
//! - [`CrdtOperation`] - A local mutation routed through [`CrdtState::mutate`]
//! - [`ReplicaId`], [`Element`], [`Dot`] - Identity and payload types
//!
//! ## State and Delta
//!
//! Every variant keeps its *current value* apart from a *pending delta*. Local
//! mutations update both; [`CrdtState::export_delta`] hands the pending delta
//! out exactly once and resets it; [`CrdtState::apply_delta`] merges a delta
//! produced by another replica into the current value without touching the
//! pending delta.
//!
//! ```rust
//! use crdt_host_core::{CrdtDelta, CrdtKind, CrdtOperation, CrdtState, CrdtValue, ReplicaId};
//!
//! let mut counter = CrdtState::new(CrdtKind::GCounter, ReplicaId::random());
//! counter.mutate(CrdtOperation::Increment(5)).unwrap();
//! counter.mutate(CrdtOperation::Increment(3)).unwrap();
//!
//! let delta = counter.export_delta(false).unwrap();
//! assert!(counter.export_delta(false).is_none());
//!
//! let replica = CrdtState::from_delta(ReplicaId::random(), &delta).unwrap();
//! assert_eq!(replica.current_value(), CrdtValue::GCounter(8));
//! ```
//!
//! ## Delivery
//!
//! Counter deltas carry increments, not totals. Deltas from different replicas
//! commute, but applying the same counter delta twice counts it twice: the
//! transport must deliver each delta at most once. Set, flag, register, vote
//! and map-key deltas are idempotent.

pub mod codec;
pub mod delta;
pub mod error;
pub mod flag;
pub mod gcounter;
pub mod gset;
pub mod kind;
pub mod lww;
pub mod ormap;
pub mod orset;
pub mod pncounter;
pub mod state;
pub mod types;
pub mod vote;

pub use codec::{decode_delta, encode_delta};
pub use delta::CrdtDelta;
pub use error::{CrdtError, Result};
pub use flag::{Flag, FlagDelta};
pub use gcounter::{GCounter, GCounterDelta};
pub use gset::{GSet, GSetDelta};
pub use kind::CrdtKind;
pub use lww::{LwwClock, LwwRegister, LwwRegisterDelta, LwwStamp};
pub use ormap::{OrMap, OrMapDelta, OrMapEntryDelta};
pub use orset::{OrSet, OrSetDelta};
pub use pncounter::{PnCounter, PnCounterDelta};
pub use state::{CrdtOperation, CrdtState, CrdtValue};
pub use types::{Dot, Element, ReplicaId};
pub use vote::{Ballot, Vote, VoteDelta, VoteValue};
