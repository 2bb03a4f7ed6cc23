use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use pds_core::error::{RepoError, RepoResult};

use crate::BlockStore;

/// In-memory block store backed by a guarded hash map.
///
/// Useful for tests and for a fresh repository that has nothing to persist
/// yet; every block is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<Cid, Bytes>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn put(&self, bytes: &[u8]) -> RepoResult<Cid> {
        let cid = pds_dagcbor::compute_cid(bytes)?;
        self.blocks
            .write()
            .expect("blockstore lock poisoned")
            .insert(cid, Bytes::copy_from_slice(bytes));
        Ok(cid)
    }

    async fn get(&self, cid: &Cid) -> RepoResult<Bytes> {
        self.blocks
            .read()
            .expect("blockstore lock poisoned")
            .get(cid)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(cid.to_string()))
    }

    async fn has(&self, cid: &Cid) -> RepoResult<bool> {
        Ok(self
            .blocks
            .read()
            .expect("blockstore lock poisoned")
            .contains_key(cid))
    }

    async fn delete(&self, cid: &Cid) -> RepoResult<()> {
        self.blocks
            .write()
            .expect("blockstore lock poisoned")
            .remove(cid);
        Ok(())
    }
}
