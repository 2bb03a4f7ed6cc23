//! Canonical DAG-CBOR encode/decode and content-identifier computation.
//!
//! Encoding is delegated entirely to `serde_ipld_dagcbor`, which already
//! implements the deterministic subset of CBOR this engine depends on:
//! shortest-form integers, length-then-lex sorted map keys, no
//! indefinite-length items. This crate only adds CID computation on top.

use cid::Cid;
use multihash::Multihash;
use pds_core::error::{RepoError, RepoResult};
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};

/// Multicodec code for DAG-CBOR.
pub const DAG_CBOR: u64 = 0x71;
/// Multicodec code for SHA2-256.
pub const SHA2_256: u64 = 0x12;

/// Encode a value as canonical DAG-CBOR bytes.
pub fn encode<T: Serialize>(value: &T) -> RepoResult<Vec<u8>> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| RepoError::Codec(e.to_string()))
}

/// Decode canonical DAG-CBOR bytes back into a value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> RepoResult<T> {
    serde_ipld_dagcbor::from_slice(bytes).map_err(|e| RepoError::Codec(e.to_string()))
}

/// Compute the CID of already-encoded DAG-CBOR bytes: `cidv1(dag-cbor, sha256(bytes))`.
pub fn compute_cid(bytes: &[u8]) -> RepoResult<Cid> {
    let digest = Sha256::digest(bytes);
    let mh = Multihash::<64>::wrap(SHA2_256, digest.as_slice())
        .map_err(|e| RepoError::Codec(e.to_string()))?;
    Ok(Cid::new_v1(DAG_CBOR, mh))
}

/// Encode a value and compute the CID its bytes would be stored under.
pub fn cid_for_value<T: Serialize>(value: &T) -> RepoResult<Cid> {
    let bytes = encode(value)?;
    compute_cid(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        b: u32,
        a: String,
    }

    #[test]
    fn round_trips() {
        let v = Sample {
            b: 7,
            a: "hi".to_string(),
        };
        let bytes = encode(&v).unwrap();
        let back: Sample = decode(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn cid_is_deterministic() {
        let v = Sample {
            b: 1,
            a: "x".to_string(),
        };
        let c1 = cid_for_value(&v).unwrap();
        let c2 = cid_for_value(&v).unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn map_keys_sort_by_length_then_lex() {
        // struct field order (b, a) must not leak into wire order; dag-cbor
        // sorts map keys, so "a" < "b" regardless of declaration order.
        let v = Sample {
            b: 1,
            a: "z".to_string(),
        };
        let bytes = encode(&v).unwrap();
        // the "a" key (0x61 0x61) must appear before the "b" key (0x61 0x62)
        let pos_a = bytes.windows(2).position(|w| w == [0x61, 0x61]).unwrap();
        let pos_b = bytes.windows(2).position(|w| w == [0x61, 0x62]).unwrap();
        assert!(pos_a < pos_b);
    }
}
