//! `did:key` decoding: recovering an ed25519 public key from a `did:key:z...` string.
//!
//! Encoding lives next to it in [`crate::signing::SigningKey::did_key`] since a
//! signing key is the only thing that ever mints one; decoding stands alone
//! here because commit verification needs it without holding a keypair.

use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use pds_core::error::{RepoError, RepoResult};

/// Multicodec code for ed25519-pub, as an unsigned-varint.
const ED25519_PUB_MULTICODEC: &[u8] = &[0xed, 0x01];

const DID_KEY_PREFIX: &str = "did:key:";

/// Decode a `did:key:z...` string into its ed25519 verifying key.
///
/// Steps: strip the `did:key:` prefix, multibase-decode the remainder,
/// varint-decode the leading multicodec byte(s), require `0xed`
/// (ed25519-pub), and treat the remaining 32 bytes as the public key.
pub fn verifying_key_from_did(did: &str) -> RepoResult<VerifyingKey> {
    let encoded = did
        .strip_prefix(DID_KEY_PREFIX)
        .ok_or_else(|| RepoError::InvalidDid(format!("missing did:key: prefix: {did}")))?;

    let (_base, decoded) =
        multibase::decode(encoded).map_err(|e| RepoError::InvalidDid(e.to_string()))?;

    let (code, rest) = decode_varint(&decoded)
        .ok_or_else(|| RepoError::InvalidDid("truncated multicodec prefix".to_string()))?;

    if code != 0xed {
        return Err(RepoError::InvalidDid(format!(
            "unsupported multicodec 0x{code:x}, expected ed25519-pub (0xed)"
        )));
    }

    if rest.len() != PUBLIC_KEY_LENGTH {
        return Err(RepoError::InvalidDid(format!(
            "expected {PUBLIC_KEY_LENGTH} public key bytes, got {}",
            rest.len()
        )));
    }

    let mut key_bytes = [0u8; PUBLIC_KEY_LENGTH];
    key_bytes.copy_from_slice(rest);

    VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| RepoError::InvalidDid(format!("invalid ed25519 public key: {e}")))
}

/// Encode a public key as a `did:key:z...` string (ed25519-pub multicodec).
pub(crate) fn encode_did_key(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> String {
    let mut prefixed = Vec::with_capacity(ED25519_PUB_MULTICODEC.len() + PUBLIC_KEY_LENGTH);
    prefixed.extend_from_slice(ED25519_PUB_MULTICODEC);
    prefixed.extend_from_slice(public_key);
    format!(
        "{DID_KEY_PREFIX}{}",
        multibase::encode(multibase::Base::Base58Btc, &prefixed)
    )
}

/// Decode a single unsigned-varint from the front of `bytes`, returning the
/// decoded value and the remaining slice.
fn decode_varint(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((value, &bytes[i + 1..]));
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SigningKey;

    #[test]
    fn round_trips_through_generated_key() {
        let key = SigningKey::generate();
        let did = key.did_key();
        let recovered = verifying_key_from_did(&did).unwrap();
        assert_eq!(recovered.to_bytes(), key.verifying_key().to_bytes());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(verifying_key_from_did("z6Mkqh5AD5V3GY6A8G7o7yD1Mjwp7RmpsRwidFTEsTPb5ow1").is_err());
    }

    #[test]
    fn rejects_wrong_multicodec() {
        // 0x00 0x01 is an invalid/placeholder codec, not ed25519-pub.
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(&[0u8; 32]);
        let encoded = multibase::encode(multibase::Base::Base58Btc, &bytes);
        let did = format!("did:key:{encoded}");
        assert!(verifying_key_from_did(&did).is_err());
    }

    #[test]
    fn accepts_spec_example_did() {
        // literal scenario S1's example did:key must at least parse as
        // well-formed multibase, even if it isn't one we minted ourselves.
        let did = "did:key:z6Mkqh5AD5V3GY6A8G7o7yD1Mjwp7RmpsRwidFTEsTPb5ow1";
        let encoded = did.strip_prefix("did:key:").unwrap();
        assert!(multibase::decode(encoded).is_ok());
    }
}
