//! Test-only helpers shared across this workspace's crates: a deterministic
//! signing key so test output is reproducible, a freshly committed
//! in-memory repository to build scenarios on top of, and assertions for
//! the shapes tests here check most often.

use std::sync::Arc;

use cid::Cid;
use pds_blockstore::{BlockStore, MemoryBlockStore};
use pds_core::error::RepoResult;
use pds_crypto::signing::SigningKey;
use pds_repo::Repository;

/// A signing key derived from an all-zero seed — stable across runs, never
/// to be used outside tests.
pub fn test_keypair() -> SigningKey {
    SigningKey::from_bytes(&[0u8; 32])
}

/// A signing key derived from a single-byte seed, for tests that need more
/// than one distinct identity.
pub fn test_keypair_n(n: u8) -> SigningKey {
    SigningKey::from_bytes(&[n; 32])
}

/// A fresh repository over an in-memory block store, already committed to
/// its empty genesis state, owned by [`test_keypair`].
pub async fn fresh_repo() -> Repository {
    let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
    Repository::create(store, test_keypair(), 1)
        .await
        .expect("genesis commit of a fresh in-memory repository cannot fail")
}

/// A fresh repository sharing an explicit block store, for tests that need
/// to inspect the store directly (e.g. CAR export/import round trips).
pub async fn fresh_repo_with_store(store: Arc<dyn BlockStore>) -> Repository {
    Repository::create(store, test_keypair(), 1)
        .await
        .expect("genesis commit cannot fail")
}

/// Assert that writing `record` under `key` and reading it back returns the
/// exact same bytes.
pub async fn assert_record_roundtrips(repo: &mut Repository, collection: &str, record: &[u8]) -> RepoResult<String> {
    let (key, _cid) = repo.create_record(collection, record).await?;
    let fetched = repo.get_record(&key).await?.expect("just-written record must read back");
    assert_eq!(&fetched[..], record, "record at {key} did not round-trip");
    Ok(key)
}

/// Assert two repositories currently commit to the same MST root.
pub async fn assert_same_root(a: &Repository, b: &Repository) {
    let root_a = a.head().data;
    let root_b = b.head().data;
    assert_eq!(root_a, root_b, "expected matching MST roots, got {root_a} and {root_b}");
}

/// Assert a CID is present in a block store.
pub async fn assert_block_present(store: &Arc<dyn BlockStore>, cid: &Cid) {
    assert!(store.has(cid).await.unwrap(), "expected block {cid} to be present");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_repo_starts_empty_and_committed() {
        let repo = fresh_repo().await;
        assert!(repo.mst().is_empty());
        assert_eq!(repo.head().prev, None);
    }

    #[tokio::test]
    async fn test_keypair_is_deterministic_across_calls() {
        assert_eq!(test_keypair().did_key(), test_keypair().did_key());
    }

    #[tokio::test]
    async fn distinct_n_produce_distinct_identities() {
        assert_ne!(test_keypair_n(1).did_key(), test_keypair_n(2).did_key());
    }

    #[tokio::test]
    async fn assert_record_roundtrips_helper_works() {
        let mut repo = fresh_repo().await;
        assert_record_roundtrips(&mut repo, "app.bsky.post", b"hello world").await.unwrap();
    }

    #[tokio::test]
    async fn assert_same_root_holds_across_insertion_order() {
        // same key/value set, two different insertion orders, built up as
        // two separate repositories: their committed MST roots must match.
        let records: [(&str, &[u8]); 3] =
            [("app.bsky.post/a", b"a"), ("app.bsky.post/b", b"b"), ("app.bsky.post/c", b"c")];

        let mut ascending = fresh_repo().await;
        for (key, body) in records {
            ascending.put_record(key, body).await.unwrap();
        }
        ascending.commit().await.unwrap();

        let mut descending = fresh_repo().await;
        for (key, body) in records.iter().copied().rev() {
            descending.put_record(key, body).await.unwrap();
        }
        descending.commit().await.unwrap();

        assert_same_root(&ascending, &descending).await;
    }
}
