//! Content-addressed block storage.
//!
//! A [`BlockStore`] is an opaque CID-keyed map from a content identifier to
//! the immutable bytes it hashes to. The MST and commit layers never reach
//! past this trait to touch a concrete backend; two reference
//! implementations ship here (in-memory and file-backed) and are exercised
//! by the same [`tests::blockstore_contract`] suite so a third backend can
//! be validated by running it against that suite too.

mod cancellable;
mod file;
mod memory;

pub use cancellable::CancellableBlockStore;
pub use file::FileBlockStore;
pub use memory::MemoryBlockStore;

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use pds_core::error::RepoResult;

/// Opaque mapping from [`Cid`] to immutable bytes.
///
/// Writing the same bytes twice is idempotent: `put` always returns the same
/// CID for the same bytes, and a second `put` is a no-op beyond that. Blocks
/// are never mutated once written; `delete` exists only for host tooling
/// (garbage collection, test teardown), never on the engine's hot path.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Compute `cidv1(dag-cbor, sha256(bytes))` and store `bytes` under it.
    async fn put(&self, bytes: &[u8]) -> RepoResult<Cid>;

    /// Fetch a block's bytes. Fails with `NotFound` if the CID is absent.
    async fn get(&self, cid: &Cid) -> RepoResult<Bytes>;

    /// Check for a block's presence without reading its bytes.
    async fn has(&self, cid: &Cid) -> RepoResult<bool>;

    /// Remove a block. Used only by host tooling; the engine never calls this.
    async fn delete(&self, cid: &Cid) -> RepoResult<()>;
}
