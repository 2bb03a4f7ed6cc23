use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use pds_core::error::{RepoError, RepoResult};
use tokio_util::sync::CancellationToken;

use crate::BlockStore;

/// Wraps a [`BlockStore`] with a [`CancellationToken`], honouring it at every
/// I/O call — block-store access is the engine's only suspension point (the
/// MST and commit layers are otherwise CPU-bound), so this is the one place
/// cancellation needs to be wired in for it to cover every operation built on
/// top of a store.
///
/// A tripped token aborts the in-flight call with `RepoError::Cancelled`
/// before the underlying store's future resolves; a call that already
/// completed is never rolled back. Since every MST mutation produces a new
/// root value rather than mutating one in place, a cancelled operation simply
/// never hands its caller a replacement root — the caller's existing
/// in-memory state is untouched either way.
pub struct CancellableBlockStore<S> {
    inner: S,
    token: CancellationToken,
}

impl<S> CancellableBlockStore<S> {
    pub fn new(inner: S, token: CancellationToken) -> Self {
        Self { inner, token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[async_trait]
impl<S: BlockStore> BlockStore for CancellableBlockStore<S> {
    async fn put(&self, bytes: &[u8]) -> RepoResult<Cid> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RepoError::Cancelled),
            result = self.inner.put(bytes) => result,
        }
    }

    async fn get(&self, cid: &Cid) -> RepoResult<Bytes> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RepoError::Cancelled),
            result = self.inner.get(cid) => result,
        }
    }

    async fn has(&self, cid: &Cid) -> RepoResult<bool> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RepoError::Cancelled),
            result = self.inner.has(cid) => result,
        }
    }

    async fn delete(&self, cid: &Cid) -> RepoResult<()> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RepoError::Cancelled),
            result = self.inner.delete(cid) => result,
        }
    }
}
