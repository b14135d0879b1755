//! # crdt-host
//!
//! Host replicated-data (CRDT) entities for a sidecar proxy.
//!
//! ## Overview
//!
//! A user-function process registers entities, each backed by one CRDT from
//! the catalog in [`core`], and starts an [`EntityHost`]. The sidecar connects,
//! discovers the registered entities, and then opens entity sessions over
//! which it sends commands and remote deltas. After every command the host
//! replies with the delta to replicate.
//!
//! ## Key Concepts
//!
//! - **Entity**: a service name bound to a CRDT kind and a command handler
//! - **Registry**: the frozen set of entities; complete before the listener binds
//! - **Discovery**: the handshake describing this process and its entities
//! - **Session**: one entity instance bound to one connection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use crdt_host::core::{CrdtKind, CrdtOperation};
//! use crdt_host::{host_config, CommandContext, EntityDefinition, EntityHost};
//!
//! fn increment(ctx: &mut CommandContext<'_>, _: &str, payload: &Bytes) -> anyhow::Result<Bytes> {
//!     let by: i64 = std::str::from_utf8(payload)?.parse()?;
//!     ctx.mutate(CrdtOperation::Increment(by))?;
//!     Ok(Bytes::from(ctx.state().to_string()))
//! }
//!
//! async fn example() -> crdt_host::Result<()> {
//!     let host = EntityHost::new(host_config!(env)?)?
//!         .add_entity(EntityDefinition::crdt("shop.Counter", CrdtKind::GCounter, increment))
//!         .start()
//!         .await?;
//!     println!("listening on {}", host.local_addr());
//!     host.shutdown().await
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `crdt_host::core` - the CRDT catalog
//! - `crdt_host::protocol` - wire messages, framing and the client

pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod entity;
pub mod error;
pub mod host;
pub mod registry;
pub mod session;

// Re-export component crates
pub use crdt_host_core as core;
pub use crdt_host_protocol as protocol;

pub use config::HostConfig;
pub use descriptor::DescriptorSet;
pub use discovery::{DiscoveryService, EntityDiscovery};
pub use entity::{CommandContext, CrdtEntityHandler};
pub use error::{HostError, Result};
pub use host::{EntityHost, RunningHost};
pub use registry::{EntityDefinition, EntityKind, EntityRegistry, RegistryBuilder};
pub use session::{CommandResult, EntitySession, SessionLease, SessionTable};
