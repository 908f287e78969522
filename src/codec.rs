// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! Wire codec for cached values. The cpp-ipc side of this lineage carried
//! raw bytes end-to-end and left framing to FlatBuffers at the message
//! layer; a shared in-process cache has no wire to cross, so a value only
//! needs a stable byte representation to live inside a `DataRegion`.
//! `serde_json` fills the role the pack's other repos use it for
//! (see `iotaledger-stronghold.rs`'s widespread `serde`/`serde_json` use):
//! an untyped, self-describing representation any caller's type can
//! round-trip through via `Serialize`/`Deserialize`.

use crate::error::CacheError;

/// The value type stored under a key. Untyped on purpose — callers decide
/// what shape their values take by serializing into and deserializing out
/// of this representation.
pub type Value = serde_json::Value;

/// Serialize a value to its stored byte representation.
pub(crate) fn pack(value: &Value) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(value).map_err(|e| CacheError::InvalidValue(e.to_string()))
}

/// Deserialize a value from its stored byte representation.
pub(crate) fn unpack(bytes: &[u8]) -> Result<Value, CacheError> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::DecodeFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_plain_values() {
        let v = json!({"a": 1, "b": [true, null, "x"]});
        let bytes = pack(&v).unwrap();
        assert_eq!(unpack(&bytes).unwrap(), v);
    }

    #[test]
    fn rejects_non_finite_floats() {
        let v = Value::from(f64::NAN);
        assert!(pack(&v).is_err());
    }
}
