//! DAG-CBOR wire format for an MST node, and the key-shape helpers the tree
//! algorithms in [`super::tree`] build on.
//!
//! Field names are the single-letter atproto wire names (`l`, `e`, `p`, `k`,
//! `v`, `t`); the in-memory tree in `tree.rs` uses full field names and
//! un-compressed keys, and converts to/from this shape only at the
//! store/load boundary.

use cid::Cid;
use pds_core::error::{RepoError, RepoResult};
use sha2::{Digest, Sha256};

/// One entry in a node's wire-format entry list: a prefix-compressed key
/// suffix, the value CID, and the child subtree covering keys between this
/// entry and the next (`None` if there is no such subtree).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TreeEntry {
    #[serde(rename = "p")]
    pub prefix_len: u32,
    #[serde(rename = "k", with = "serde_bytes")]
    pub key_suffix: Vec<u8>,
    #[serde(rename = "v")]
    pub value: Cid,
    #[serde(rename = "t")]
    pub tree: Option<Cid>,
}

/// Wire-format node: `{ l: CID?, e: [TreeEntry] }`.
///
/// `l` and `t` are always present as explicit `null` when absent — the one
/// place in this codec where an absent optional is *not* omitted, because
/// the wire example in the specification shows both unconditionally.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeData {
    #[serde(rename = "l")]
    pub left: Option<Cid>,
    #[serde(rename = "e")]
    pub entries: Vec<TreeEntry>,
}

/// Maximum record-key length, mirroring the wider AT-Protocol record-path
/// rules this key-shape constraint is drawn from.
const MAX_KEY_LEN: usize = 256;

/// Validate an MST key: non-empty, at most 256 bytes, composed only of
/// `[a-zA-Z0-9._:~-]` plus the `/` separator between `nsid` and `rkey`.
pub fn validate_key(key: &str) -> RepoResult<()> {
    if key.is_empty() {
        return Err(RepoError::InvalidCid("empty MST key".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(RepoError::InvalidCid(format!(
            "key exceeds {MAX_KEY_LEN} bytes: {} bytes",
            key.len()
        )));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '~' | '-' | '/'))
    {
        return Err(RepoError::InvalidCid(format!("invalid characters in key: {key}")));
    }
    Ok(())
}

/// `L(k) = leading_zero_nibbles(sha256(k))` — the layer a key is assigned.
///
/// Nibbles, not bits/2: this gives fanout-16, as specified, not the
/// fanout-4 `bits/2` variant some hand-written reference MSTs use.
pub fn layer_for_key(key: &str) -> u32 {
    let hash = Sha256::digest(key.as_bytes());
    leading_zero_nibbles(&hash)
}

fn leading_zero_nibbles(hash: &[u8]) -> u32 {
    let mut count = 0u32;
    for byte in hash {
        if *byte == 0 {
            count += 2;
            continue;
        }
        count += (byte.leading_zeros() / 4) as u32;
        break;
    }
    count
}

/// Length of the shared prefix between two keys, in bytes.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_key_accepts_nsid_slash_rkey() {
        assert!(validate_key("polka.post/3jui7kd54zh2y").is_ok());
    }

    #[test]
    fn validate_key_rejects_empty() {
        assert!(validate_key("").is_err());
    }

    #[test]
    fn validate_key_rejects_too_long() {
        let key = "a".repeat(257);
        assert!(validate_key(&key).is_err());
    }

    #[test]
    fn validate_key_rejects_spaces() {
        assert!(validate_key("polka post/abc").is_err());
    }

    #[test]
    fn layer_is_deterministic() {
        assert_eq!(layer_for_key("polka.post/1"), layer_for_key("polka.post/1"));
    }

    #[test]
    fn leading_zero_nibbles_counts_nibbles_not_bits() {
        // 0x00, 0x0f -> first byte all-zero (2 nibbles), second byte's top
        // nibble is zero (1 more), total 3.
        assert_eq!(leading_zero_nibbles(&[0x00, 0x0f]), 3);
        // 0xf0 -> no leading zero nibbles at all.
        assert_eq!(leading_zero_nibbles(&[0xf0]), 0);
        // all-zero hash (degenerate, never produced by sha256 in practice).
        assert_eq!(leading_zero_nibbles(&[0x00, 0x00]), 4);
    }

    #[test]
    fn common_prefix_len_matches_shared_bytes() {
        assert_eq!(common_prefix_len("polka.post/1", "polka.post/2"), 11);
        assert_eq!(common_prefix_len("abc", "xyz"), 0);
    }
}
