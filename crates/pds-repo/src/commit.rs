//! The commit protocol: the unsigned commit a repository root is expressed
//! as, and the signed commit that is actually published and exchanged.

use cid::Cid;
use pds_core::error::{RepoError, RepoResult};
use pds_crypto::signing::{SigningKey, verify};
use serde::{Deserialize, Serialize};

/// Current commit wire version this engine writes.
pub const COMMIT_VERSION: i64 = 3;

/// Commit wire versions this engine accepts when opening an existing
/// repository. Both 2 and 3 are structurally identical on the wire; this
/// engine always writes 3 but tolerates repositories carried over from a
/// host that still stamps 2.
const SUPPORTED_VERSIONS: [i64; 2] = [2, 3];

/// A commit before it has been signed: everything the signature covers.
///
/// `prev` is always serialized, even when absent, as an explicit CBOR
/// `null` — commits from different points in a repository's history must
/// hash identically regardless of whether the field carries a `Cid` or not.
///
/// `rev` is likewise always serialized. The original schema marks it
/// omit-empty, but this engine only ever constructs a commit with a `rev`
/// freshly drawn from the TID clock, so the empty string that rule exists
/// for never reaches the wire here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedCommit {
    pub did: String,
    pub version: i64,
    pub data: Cid,
    pub rev: String,
    pub prev: Option<Cid>,
}

impl UnsignedCommit {
    pub fn new(did: impl Into<String>, data: Cid, rev: impl Into<String>, prev: Option<Cid>) -> Self {
        Self {
            did: did.into(),
            version: COMMIT_VERSION,
            data,
            rev: rev.into(),
            prev,
        }
    }

    /// Canonical DAG-CBOR bytes of this commit, sans signature. This is the
    /// exact byte string an owner signing key signs and a verifier checks
    /// the signature of.
    pub fn to_signing_bytes(&self) -> RepoResult<Vec<u8>> {
        pds_dagcbor::encode(self)
    }

    pub fn sign(self, key: &SigningKey) -> RepoResult<SignedCommit> {
        let bytes = self.to_signing_bytes()?;
        let sig = key.sign(&bytes);
        Ok(SignedCommit {
            did: self.did,
            version: self.version,
            data: self.data,
            rev: self.rev,
            prev: self.prev,
            sig,
        })
    }
}

/// A commit as published: an [`UnsignedCommit`] plus the owner's detached
/// ed25519 signature over its canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCommit {
    pub did: String,
    pub version: i64,
    pub data: Cid,
    pub rev: String,
    pub prev: Option<Cid>,
    #[serde(with = "serde_bytes")]
    pub sig: Vec<u8>,
}

impl SignedCommit {
    /// The unsigned form this commit's signature was computed over.
    pub fn unsigned(&self) -> UnsignedCommit {
        UnsignedCommit {
            did: self.did.clone(),
            version: self.version,
            data: self.data,
            rev: self.rev.clone(),
            prev: self.prev,
        }
    }

    /// Verify the signature against a known public key, and reject any
    /// commit written by a version of this protocol this engine doesn't
    /// understand.
    pub fn verify(&self, verifying_key: &ed25519_dalek::VerifyingKey) -> RepoResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            return Err(RepoError::UnsupportedVersion(self.version));
        }
        let bytes = self.unsigned().to_signing_bytes()?;
        verify(verifying_key, &bytes, &self.sig)
    }

    pub fn cid(&self) -> RepoResult<Cid> {
        pds_dagcbor::cid_for_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pds_crypto::signing::SigningKey;

    fn sample_cid() -> Cid {
        pds_dagcbor::cid_for_value(&"sample-data-root").unwrap()
    }

    #[test]
    fn sign_then_verify_roundtrips() {
        let key = SigningKey::generate();
        let commit = UnsignedCommit::new(key.did_key(), sample_cid(), "3jui7kd54zh2y", None);
        let signed = commit.sign(&key).unwrap();
        signed.verify(&key.verifying_key()).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_data_root() {
        let key = SigningKey::generate();
        let commit = UnsignedCommit::new(key.did_key(), sample_cid(), "3jui7kd54zh2y", None);
        let mut signed = commit.sign(&key).unwrap();
        signed.data = pds_dagcbor::cid_for_value(&"different-root").unwrap();
        assert!(signed.verify(&key.verifying_key()).is_err());
    }

    #[test]
    fn verify_rejects_unsupported_version() {
        let key = SigningKey::generate();
        let commit = UnsignedCommit::new(key.did_key(), sample_cid(), "3jui7kd54zh2y", None);
        let mut signed = commit.sign(&key).unwrap();
        signed.version = 1;
        match signed.verify(&key.verifying_key()) {
            Err(RepoError::UnsupportedVersion(1)) => {}
            other => panic!("expected UnsupportedVersion(1), got {other:?}"),
        }
    }

    #[test]
    fn verify_accepts_legacy_version_two() {
        // version 2 and 3 commits are wire-identical; only the version tag
        // differs, and both must be accepted on open.
        let key = SigningKey::generate();
        let mut commit = UnsignedCommit::new(key.did_key(), sample_cid(), "3jui7kd54zh2y", None);
        commit.version = 2;
        let signed = commit.sign(&key).unwrap();
        signed.verify(&key.verifying_key()).unwrap();
    }

    #[test]
    fn signing_bytes_are_order_independent_of_field_declaration() {
        // prev must appear as an explicit null, not be omitted, so two
        // commits differing only in whether prev is set never collide.
        let key = SigningKey::generate();
        let no_prev = UnsignedCommit::new(key.did_key(), sample_cid(), "rev1", None);
        let with_prev = UnsignedCommit::new(key.did_key(), sample_cid(), "rev1", Some(sample_cid()));
        assert_ne!(no_prev.to_signing_bytes().unwrap(), with_prev.to_signing_bytes().unwrap());
    }

    #[test]
    fn commit_cid_is_deterministic() {
        let key = SigningKey::generate();
        let commit = UnsignedCommit::new(key.did_key(), sample_cid(), "rev1", None);
        let signed = commit.sign(&key).unwrap();
        assert_eq!(signed.cid().unwrap(), signed.cid().unwrap());
    }
}
