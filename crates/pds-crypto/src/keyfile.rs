//! Owner signing-key persistence.
//!
//! A repository has exactly one secret: the 32-byte ed25519 seed backing
//! its owner key. This loads it from disk, or generates and persists a new
//! one on first run, the same write-temp-then-rename way the block store
//! writes blocks so a crash mid-write never corrupts the key file.

use std::path::Path;

use pds_core::error::{RepoError, RepoResult};

use crate::signing::SigningKey;

/// Load the owner signing key from `path`, generating and persisting a new
/// one if the file doesn't exist yet.
pub fn load_or_generate(path: impl AsRef<Path>) -> RepoResult<SigningKey> {
    let path = path.as_ref();
    if path.exists() {
        return load(path);
    }
    let key = SigningKey::generate();
    persist(path, &key)?;
    Ok(key)
}

/// Load the owner signing key from `path`. Fails if the file is missing or
/// not exactly 32 bytes.
pub fn load(path: impl AsRef<Path>) -> RepoResult<SigningKey> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        RepoError::Codec(format!(
            "owner key file at {} must be exactly 32 bytes, got {}",
            path.display(),
            bytes.len()
        ))
    })?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Persist `key`'s secret seed to `path`, creating parent directories as
/// needed and restricting the file to owner-only access where supported.
pub fn persist(path: impl AsRef<Path>, key: &SigningKey) -> RepoResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, key.to_bytes())?;
    std::fs::rename(&tmp_path, path)?;
    restrict_permissions(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> RepoResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> RepoResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_persists_on_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owner.key");
        assert!(!path.exists());

        let key = load_or_generate(&path).unwrap();
        assert!(path.exists());

        let reloaded = load_or_generate(&path).unwrap();
        assert_eq!(key.did_key(), reloaded.did_key());
    }

    #[test]
    fn load_rejects_wrong_length_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owner.key");
        std::fs::write(&path, b"too short").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("owner.key");
        load_or_generate(&path).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn restricts_permissions_to_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owner.key");
        load_or_generate(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
