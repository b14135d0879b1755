//! CBOR encoding of deltas.
//!
//! Used when a delta has to leave the process on its own, outside a protocol
//! frame (test vectors, diagnostics, snapshots kept by the sidecar).

use crate::delta::CrdtDelta;
use crate::error::{CrdtError, Result};

/// Encode a delta as CBOR.
pub fn encode_delta(delta: &CrdtDelta) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(delta, &mut buf).map_err(|e| CrdtError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Decode a delta from CBOR.
pub fn decode_delta(bytes: &[u8]) -> Result<CrdtDelta> {
    ciborium::from_reader(bytes).map_err(|e| CrdtError::Decoding(e.to_string()))
}
