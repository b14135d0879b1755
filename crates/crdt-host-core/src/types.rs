//! Strong type definitions shared by the CRDT variants.
//!
//! Identifiers and payloads are newtypes to prevent misuse at compile time.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 16-byte replica identifier.
///
/// Orders LWW writes that carry the same clock and names the owner of votes
/// and set dots.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub [u8; 16]);

impl ReplicaId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a random replica ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// A new identity sharing this one's first eight bytes, with the rest
    /// random.
    ///
    /// Every CRDT instance writes under its own replica id: two instances
    /// of one entity never issue the same dot or ballot generation.
    pub fn fork(&self) -> Self {
        use rand::Rng;
        let mut bytes = self.0;
        rand::thread_rng().fill(&mut bytes[8..]);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// The zero replica ID, lower than every generated one in practice.
    pub const ZERO: Self = Self([0u8; 16]);
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicaId({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 16]> for ReplicaId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

/// An opaque, already-encoded user value.
///
/// Set members, map keys and register values are all elements. Ordering is
/// bytewise, which keeps every materialized collection deterministic.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Element(pub Bytes);

impl Element {
    /// Wrap encoded bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Interpret the bytes as UTF-8, if they are.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "Element({s:?})"),
            None => write!(f, "Element(0x{})", hex::encode(&self.0)),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Element {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<&[u8]> for Element {
    fn from(v: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(v))
    }
}

impl From<Bytes> for Element {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

/// A unique add event: the replica that made it and that replica's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dot {
    pub replica: ReplicaId,
    pub counter: u64,
}

impl Dot {
    pub const fn new(replica: ReplicaId, counter: u64) -> Self {
        Self { replica, counter }
    }
}
