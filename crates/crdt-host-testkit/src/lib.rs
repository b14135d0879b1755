//! # crdt-host testkit
//!
//! Testing utilities for crdt-host.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a descriptor file on disk, a counter entity, and a host
//!   bound to an ephemeral port
//! - **Generators**: Proptest strategies for replica ids, elements, kinds and
//!   operations that a CRDT of a given kind accepts
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use crdt_host_core::{CrdtState, ReplicaId};
//! use crdt_host_testkit::generators::kind_and_operations;
//!
//! proptest! {
//!     #[test]
//!     fn second_export_is_empty((kind, ops) in kind_and_operations(16)) {
//!         let mut state = CrdtState::new(kind, ReplicaId::random());
//!         for op in ops {
//!             state.mutate(op).unwrap();
//!         }
//!         state.export_delta(false);
//!         prop_assert!(state.export_delta(false).is_none());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use crdt_host_testkit::fixtures::{TestHost, COUNTER_SERVICE};
//!
//! async fn example() {
//!     let host = TestHost::counter().await;
//!     let mut client = host.client().await;
//!     client.open_session(COUNTER_SERVICE, "counter-1", None).await.unwrap();
//!     host.shutdown().await;
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{counter_entity, CounterHandler, TestHost, COUNTER_SERVICE};
pub use generators::{kind_and_operations, operation, operations};
