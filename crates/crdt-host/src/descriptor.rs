//! The serialized descriptor set advertised by discovery.
//!
//! The host never parses it: the bytes are read once at startup and handed to
//! the sidecar unchanged.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{HostError, Result};

/// The descriptor set file, loaded into memory.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    path: PathBuf,
    bytes: Bytes,
}

impl DescriptorSet {
    /// Read the descriptor set from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| {
            tracing::error!(path = %path.display(), error = %source, "cannot read descriptor set");
            HostError::Descriptor {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            bytes: Bytes::from(bytes),
        })
    }

    /// Wrap bytes already in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            path: PathBuf::new(),
            bytes: bytes.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw bytes. Cloning is cheap.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// BLAKE3 hash of the contents, hex encoded. Logged at startup so the
    /// descriptor a process serves can be matched to a build.
    pub fn fingerprint(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }
}
