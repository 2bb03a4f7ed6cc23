use ed25519_dalek::{Signature, Signer, SigningKey as DalekSigningKey, VerifyingKey};
use pds_core::error::{RepoError, RepoResult};

use crate::did::encode_did_key;

/// An ed25519 owner keypair: generates/loads, signs commit bytes, and derives
/// the `did:key` identifier the commit protocol publishes and later verifies
/// against.
///
/// The engine itself never persists the secret seed backing this key — only
/// the embedding application does, by however it chooses to store
/// [`SigningKey::to_bytes`].
#[derive(Clone)]
pub struct SigningKey(DalekSigningKey);

impl SigningKey {
    /// Generate a new random ed25519 signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self(DalekSigningKey::generate(&mut csprng))
    }

    /// Reconstruct a signing key deterministically from a 32-byte secret seed.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self(DalekSigningKey::from_bytes(seed))
    }

    /// Export the 32-byte secret seed.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Sign a message, producing a detached 64-byte ed25519 signature.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.0.sign(msg).to_bytes().to_vec()
    }

    /// The corresponding public (verifying) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.0.verifying_key()
    }

    /// The `did:key:z...` string naming this key's public half.
    pub fn did_key(&self) -> String {
        encode_did_key(&self.verifying_key().to_bytes())
    }
}

/// Verify a detached signature against a message using a recovered public key.
pub fn verify(pubkey: &VerifyingKey, msg: &[u8], sig: &[u8]) -> RepoResult<()> {
    let sig = Signature::from_slice(sig).map_err(|_| RepoError::InvalidSignature)?;
    pubkey
        .verify_strict(msg, &sig)
        .map_err(|_| RepoError::InvalidSignature)
}
