use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use pds_core::error::{RepoError, RepoResult};

use crate::BlockStore;

/// File-backed block store. Each block lives at `<base_dir>/<cid-text>`,
/// written via a temp-file-then-rename so a crash mid-write never leaves a
/// partially-written block visible under its final name.
#[derive(Debug, Clone)]
pub struct FileBlockStore {
    base_dir: PathBuf,
}

impl FileBlockStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> RepoResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn block_path(&self, cid: &Cid) -> PathBuf {
        self.base_dir.join(cid.to_string())
    }
}

#[async_trait]
impl BlockStore for FileBlockStore {
    async fn put(&self, bytes: &[u8]) -> RepoResult<Cid> {
        let cid = pds_dagcbor::compute_cid(bytes)?;
        let final_path = self.block_path(&cid);
        if tokio::fs::metadata(&final_path).await.is_ok() {
            return Ok(cid); // idempotent: identical bytes already on disk
        }

        let tmp_path = self.base_dir.join(format!("{cid}.tmp-{}", std::process::id()));
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(cid)
    }

    async fn get(&self, cid: &Cid) -> RepoResult<Bytes> {
        match tokio::fs::read(self.block_path(cid)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepoError::NotFound(cid.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn has(&self, cid: &Cid) -> RepoResult<bool> {
        Ok(tokio::fs::metadata(self.block_path(cid)).await.is_ok())
    }

    async fn delete(&self, cid: &Cid) -> RepoResult<()> {
        match tokio::fs::remove_file(self.block_path(cid)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nothing_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileBlockStore::new(dir.path()).is_ok());
    }
}
