//! CAR (Content Addressable aRchive) transfer: packing a repository, or the
//! blocks new since some earlier commit, into the single-file format used
//! to move a whole repository between stores, and unpacking one back in.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use cid::Cid;
use iroh_car::{CarHeader, CarReader, CarWriter};
use pds_blockstore::BlockStore;
use pds_core::error::{RepoError, RepoResult};

use crate::commit::SignedCommit;
use crate::mst::NodeData;

/// Export a full repository as CAR bytes: the signed commit as the single
/// root, followed by every MST node and record block it reaches.
pub async fn export_car(store: &Arc<dyn BlockStore>, commit_cid: Cid) -> RepoResult<Vec<u8>> {
    export_car_since(store, commit_cid, None).await
}

/// Export only the blocks new since an earlier commit: every block
/// reachable from `commit_cid` that wasn't already reachable from `since`.
///
/// Useful for the common sync case — shipping what changed since the last
/// export — without re-sending a repository's entire history of blocks.
pub async fn export_car_since(
    store: &Arc<dyn BlockStore>,
    commit_cid: Cid,
    since: Option<Cid>,
) -> RepoResult<Vec<u8>> {
    let exclude = match since {
        Some(since_commit_cid) => {
            let since_bytes = store.get(&since_commit_cid).await?;
            let since_commit: SignedCommit = pds_dagcbor::decode(&since_bytes)?;
            let mut already = BTreeMap::new();
            collect_blocks(store, since_commit.data, &HashSet::new(), &mut already).await?;
            already.into_keys().collect::<HashSet<_>>()
        }
        None => HashSet::new(),
    };

    let commit_bytes = store.get(&commit_cid).await?;
    let commit: SignedCommit = pds_dagcbor::decode(&commit_bytes)?;

    let mut blocks = BTreeMap::new();
    blocks.insert(commit_cid, commit_bytes);
    collect_blocks(store, commit.data, &exclude, &mut blocks).await?;

    let mut buffer = Vec::new();
    let header = CarHeader::new_v1(vec![commit_cid]);
    let mut writer = CarWriter::new(header, &mut buffer);
    for (cid, data) in blocks {
        writer
            .write(cid, data.as_ref())
            .await
            .map_err(|e| RepoError::Codec(e.to_string()))?;
    }
    writer.finish().await.map_err(|e| RepoError::Codec(e.to_string()))?;
    Ok(buffer)
}

/// Import a CAR archive into a block store, re-hashing every block and
/// rejecting the archive if any block's bytes don't match its claimed CID.
/// Returns the archive's root CID (the signed commit it was exported from).
pub async fn import_car(store: &Arc<dyn BlockStore>, car_bytes: &[u8]) -> RepoResult<Cid> {
    let mut reader = CarReader::new(car_bytes)
        .await
        .map_err(|e| RepoError::Codec(e.to_string()))?;
    let root = *reader
        .header()
        .roots()
        .first()
        .ok_or_else(|| RepoError::CorruptCommit("CAR archive has no roots".to_string()))?;

    loop {
        match reader.next_block().await {
            Ok(Some((cid, data))) => {
                let recomputed = pds_dagcbor::compute_cid(&data)?;
                if recomputed != cid {
                    return Err(RepoError::CorruptNode(format!(
                        "block claims {cid} but hashes to {recomputed}"
                    )));
                }
                store.put(&data).await?;
            }
            Ok(None) => break,
            Err(e) => return Err(RepoError::Codec(e.to_string())),
        }
    }
    Ok(root)
}

/// Copy every block reachable from `root` into `dest`, deduplicated by the
/// same link-scan traversal export uses. Backs `Repository::copy_data_to`.
pub async fn copy_reachable(store: &Arc<dyn BlockStore>, dest: &Arc<dyn BlockStore>, root: Cid) -> RepoResult<()> {
    let mut blocks = BTreeMap::new();
    collect_blocks(store, root, &HashSet::new(), &mut blocks).await?;
    for (_, data) in blocks {
        dest.put(&data).await?;
    }
    Ok(())
}

/// Walk every block reachable from `root`, skipping anything already in
/// `exclude` or already visited, and stash its raw bytes in `out`.
///
/// A block decodes as an MST node only if it has exactly the node wire
/// shape (`l`/`e`); anything else — a record, a commit reached some other
/// way — is treated as an opaque leaf and not recursed into further.
#[async_recursion::async_recursion]
async fn collect_blocks(
    store: &Arc<dyn BlockStore>,
    root: Cid,
    exclude: &HashSet<Cid>,
    out: &mut BTreeMap<Cid, Bytes>,
) -> RepoResult<()> {
    if exclude.contains(&root) || out.contains_key(&root) {
        return Ok(());
    }
    let bytes = store.get(&root).await?;
    out.insert(root, bytes.clone());

    if let Ok(node) = pds_dagcbor::decode::<NodeData>(&bytes) {
        if let Some(left) = node.left {
            collect_blocks(store, left, exclude, out).await?;
        }
        for entry in node.entries {
            collect_blocks(store, entry.value, exclude, out).await?;
            if let Some(tree) = entry.tree {
                collect_blocks(store, tree, exclude, out).await?;
            }
        }
    }
    Ok(())
}
