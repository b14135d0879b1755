//! # crdt-host protocol
//!
//! The wire protocol between a sidecar and a crdt-host process.
//!
//! ## Overview
//!
//! Messages are serde types encoded as CBOR, one per length-prefixed frame.
//! A connection carries discovery calls and at most one entity session at a
//! time.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use crdt_host_protocol::{HostClient, ProxyInfo};
//!
//! async fn example() -> crdt_host_protocol::Result<()> {
//!     let mut client = HostClient::connect("127.0.0.1:8080").await?;
//!     let spec = client.discover(ProxyInfo::default()).await?;
//!     println!("{} entities", spec.entities.len());
//!
//!     client.open_session("shop.Counter", "counter-1", None).await?;
//!     let outcome = client.command("Increment", &b"5"[..]).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Sidecar                              Host
//!   |-------- Discover --------------->|
//!   |<------- Discovered --------------|
//!   |-------- SessionInit ------------>|
//!   |<------- SessionOpened -----------|
//!   |-------- Command ---------------->|
//!   |<------- Reply (+ delta) ---------|
//!   |-------- Delta ------------------>|
//!   |<------- Ack ---------------------|
//!   |-------- SessionClose ----------->|
//!   |<------- Ack ---------------------|
//! ```

pub mod client;
pub mod error;
pub mod messages;
pub mod transport;

pub use client::{CommandOutcome, HostClient};
pub use error::{ProtocolError, Result};
pub use messages::{
    limits, EntityDescriptor, EntitySpec, HostErrorCode, HostRequest, HostResponse, ProxyInfo,
    ServiceInfo, UserFunctionError, PROTOCOL_MAJOR_VERSION, PROTOCOL_MINOR_VERSION,
};
pub use transport::{memory::MemoryTransport, FramedStream, Transport};
