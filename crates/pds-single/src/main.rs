//! A minimal single-repository host: loads configuration, opens (or
//! creates) one repository over a file-backed block store, and writes a
//! handful of sample records to prove the engine end to end.
//!
//! There is no network surface here — no XRPC, no firehose, no accounts.
//! This binary exists to exercise [`pds_repo::Repository`] the way an
//! embedding application would, nothing more.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pds_blockstore::{BlockStore, FileBlockStore, MemoryBlockStore};
use pds_core::EngineConfig;
use pds_crypto::keyfile;
use pds_repo::{Repository, SignedCommit, car};

/// Name of the file next to the block store that records the current
/// commit CID, so a restart can resume from where the last run left off.
const HEAD_FILE: &str = "HEAD";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().pretty().init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/single.toml".to_string());
    let config = EngineConfig::load(&config_path)?;

    let signing_key = keyfile::load_or_generate(&config.owner_key_path)?;
    tracing::info!(did = %signing_key.did_key(), "loaded owner signing key");

    let store: Arc<dyn BlockStore> = match &config.block_store.path {
        Some(path) => Arc::new(FileBlockStore::new(path)?),
        None => Arc::new(MemoryBlockStore::new()),
    };

    let head_path = config
        .block_store
        .path
        .as_ref()
        .map(|p| Path::new(p).join(HEAD_FILE));

    let mut repo = match &head_path {
        Some(path) if path.exists() => {
            let cid_text = std::fs::read_to_string(path)?;
            let commit_cid: cid::Cid = cid_text.trim().parse()?;
            let commit_bytes = store.get(&commit_cid).await?;
            let commit: SignedCommit = pds_dagcbor::decode(&commit_bytes)?;
            Repository::open(store.clone(), signing_key, commit, config.clock_id).await?
        }
        _ => Repository::create(store.clone(), signing_key, config.clock_id).await?,
    };

    let (key, _cid) = repo
        .create_record("app.bsky.feed.post", br#"{"text":"hello from pds-single"}"#)
        .await?;
    tracing::info!(key = %key, "wrote sample record");
    repo.commit().await?;

    if let Some(path) = &head_path {
        persist_head(path, repo.head().cid()?)?;
    }

    let archive = car::export_car(&store, repo.head().cid()?).await?;
    tracing::info!(bytes = archive.len(), "exported repository to a CAR archive in memory");

    Ok(())
}

fn persist_head(path: &PathBuf, commit_cid: cid::Cid) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, commit_cid.to_string())?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
