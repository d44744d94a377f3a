/// Keccak-256 fingerprinting of JSON-serializable values.
///
/// Fingerprints are submitted to the registry contract as `bytes32`
/// arguments, so they use the same keccak-256 the ledger uses everywhere
/// else. Serialization is plain serde_json output; no canonicalization
/// beyond that. Two logically-equal values serialized differently are
/// allowed to produce different digests.
use alloy::primitives::{keccak256, B256};
use serde::Serialize;

use crate::error::{NotaryError, Result};

/// Fingerprint any serializable value into a 32-byte digest.
///
/// Pure function: identical serialized bytes always yield the identical
/// digest. A serialization failure (e.g. a non-string map key) surfaces
/// to the caller.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<B256> {
    let bytes =
        serde_json::to_vec(value).map_err(|e| NotaryError::Serialization(e.to_string()))?;
    Ok(keccak256(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_deterministic() {
        let value = json!({"url": "https://api.example.com/users", "method": "GET"});
        assert_eq!(fingerprint(&value).unwrap(), fingerprint(&value).unwrap());
    }

    #[test]
    fn test_fingerprint_changes_with_any_field() {
        let a = json!({"url": "https://api.example.com/users", "status": 200});
        let b = json!({"url": "https://api.example.com/users", "status": 201});
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_renders_as_prefixed_hex() {
        let digest = fingerprint(&json!("hello")).unwrap();
        let hex = digest.to_string();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
    }

    #[test]
    fn test_fingerprint_matches_raw_keccak() {
        let value = json!([1, 2, 3]);
        let expected = keccak256(serde_json::to_vec(&value).unwrap());
        assert_eq!(fingerprint(&value).unwrap(), expected);
    }
}
