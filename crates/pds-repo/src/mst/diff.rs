//! Structural diff between two tree states: the minimal set of `Add`/
//! `Update`/`Delete` operations that take `before` to `after`.
//!
//! Identical subtrees are pruned by CID comparison without ever loading
//! their bytes; only the branches that actually changed are walked. Once a
//! pair of subtrees stop lining up node-for-node (different layer, or a
//! different entry key at the same position — the common case once a
//! single add/delete has shifted later splits), the remainder of each side
//! is flattened and diffed as two sorted key lists instead.

use std::sync::Arc;

use async_recursion::async_recursion;
use cid::Cid;
use pds_blockstore::BlockStore;
use pds_core::error::RepoResult;

use super::tree::{Child, Node, Mst, collect_all};

/// One unit of change between two tree states, as produced by
/// [`Mst::diff_since`](super::tree::Mst::diff_since).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Add { key: String, value: Cid },
    Update { key: String, old_value: Cid, new_value: Cid },
    Delete { key: String, old_value: Cid },
}

impl DiffOp {
    pub fn key(&self) -> &str {
        match self {
            DiffOp::Add { key, .. } => key,
            DiffOp::Update { key, .. } => key,
            DiffOp::Delete { key, .. } => key,
        }
    }
}

pub(crate) async fn diff_trees(before: &Mst, after: &Mst) -> RepoResult<Vec<DiffOp>> {
    let store = after.store.clone();
    let mut ops = Vec::new();
    diff_child(&store, &before.root, &after.root, &mut ops).await?;
    Ok(ops)
}

#[async_recursion]
async fn diff_child(
    store: &Arc<dyn BlockStore>,
    before: &Option<Child>,
    after: &Option<Child>,
    ops: &mut Vec<DiffOp>,
) -> RepoResult<()> {
    match (before, after) {
        (None, None) => Ok(()),
        (None, Some(c)) => collect_adds(store, c, ops).await,
        (Some(c), None) => collect_deletes(store, c, ops).await,
        (Some(b), Some(a)) => {
            if let (Some(bc), Some(ac)) = (b.known_cid(), a.known_cid()) {
                if bc == ac {
                    return Ok(());
                }
            }
            let bn = b.resolve(store).await?;
            let an = a.resolve(store).await?;
            diff_nodes(store, &bn, &an, ops).await
        }
    }
}

async fn diff_nodes(store: &Arc<dyn BlockStore>, before: &Node, after: &Node, ops: &mut Vec<DiffOp>) -> RepoResult<()> {
    let same_shape = before.layer == after.layer
        && before.entries.len() == after.entries.len()
        && before.entries.iter().zip(&after.entries).all(|(b, a)| b.key == a.key);

    if same_shape {
        diff_child(store, &before.left, &after.left, ops).await?;
        for (b, a) in before.entries.iter().zip(&after.entries) {
            if b.value != a.value {
                ops.push(DiffOp::Update {
                    key: b.key.clone(),
                    old_value: b.value,
                    new_value: a.value,
                });
            }
            diff_child(store, &b.tree, &a.tree, ops).await?;
        }
        return Ok(());
    }

    let mut before_entries = Vec::new();
    collect_all(&Child::Loaded(Arc::new(before.clone())), store, &mut before_entries).await?;
    let mut after_entries = Vec::new();
    collect_all(&Child::Loaded(Arc::new(after.clone())), store, &mut after_entries).await?;
    merge_walk(&before_entries, &after_entries, ops);
    Ok(())
}

fn merge_walk(before: &[(String, Cid)], after: &[(String, Cid)], ops: &mut Vec<DiffOp>) {
    let mut i = 0;
    let mut j = 0;
    while i < before.len() && j < after.len() {
        match before[i].0.cmp(&after[j].0) {
            std::cmp::Ordering::Less => {
                ops.push(DiffOp::Delete {
                    key: before[i].0.clone(),
                    old_value: before[i].1,
                });
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                ops.push(DiffOp::Add {
                    key: after[j].0.clone(),
                    value: after[j].1,
                });
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                if before[i].1 != after[j].1 {
                    ops.push(DiffOp::Update {
                        key: before[i].0.clone(),
                        old_value: before[i].1,
                        new_value: after[j].1,
                    });
                }
                i += 1;
                j += 1;
            }
        }
    }
    for (k, v) in &before[i..] {
        ops.push(DiffOp::Delete {
            key: k.clone(),
            old_value: *v,
        });
    }
    for (k, v) in &after[j..] {
        ops.push(DiffOp::Add {
            key: k.clone(),
            value: *v,
        });
    }
}

async fn collect_adds(store: &Arc<dyn BlockStore>, child: &Child, ops: &mut Vec<DiffOp>) -> RepoResult<()> {
    let mut entries = Vec::new();
    collect_all(child, store, &mut entries).await?;
    for (key, value) in entries {
        ops.push(DiffOp::Add { key, value });
    }
    Ok(())
}

async fn collect_deletes(store: &Arc<dyn BlockStore>, child: &Child, ops: &mut Vec<DiffOp>) -> RepoResult<()> {
    let mut entries = Vec::new();
    collect_all(child, store, &mut entries).await?;
    for (key, value) in entries {
        ops.push(DiffOp::Delete { key, old_value: value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pds_blockstore::MemoryBlockStore;

    fn cid_for(n: u8) -> Cid {
        pds_dagcbor::cid_for_value(&n).unwrap()
    }

    #[tokio::test]
    async fn diff_of_identical_trees_is_empty() {
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let mst = Mst::empty(store).add("k", cid_for(1)).await.unwrap();
        let ops = diff_trees(&mst, &mst).await.unwrap();
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn diff_reports_single_add() {
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let before = Mst::empty(store);
        let after = before.add("k", cid_for(1)).await.unwrap();
        let ops = diff_trees(&before, &after).await.unwrap();
        assert_eq!(ops, vec![DiffOp::Add { key: "k".to_string(), value: cid_for(1) }]);
    }

    #[tokio::test]
    async fn diff_reports_single_update() {
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let before = Mst::empty(store).add("k", cid_for(1)).await.unwrap();
        let after = before.update("k", cid_for(2)).await.unwrap();
        let ops = diff_trees(&before, &after).await.unwrap();
        assert_eq!(
            ops,
            vec![DiffOp::Update {
                key: "k".to_string(),
                old_value: cid_for(1),
                new_value: cid_for(2)
            }]
        );
    }

    #[tokio::test]
    async fn diff_reports_single_delete() {
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let before = Mst::empty(store).add("k", cid_for(1)).await.unwrap();
        let after = before.delete("k").await.unwrap();
        let ops = diff_trees(&before, &after).await.unwrap();
        assert_eq!(ops, vec![DiffOp::Delete { key: "k".to_string(), old_value: cid_for(1) }]);
    }

    #[tokio::test]
    async fn diff_of_many_mutations_is_minimal() {
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let mut before = Mst::empty(store);
        for (i, k) in ["a/1", "a/2", "a/3", "a/4", "a/5"].iter().enumerate() {
            before = before.add(k, cid_for(i as u8)).await.unwrap();
        }
        let after = before.update("a/3", cid_for(99)).await.unwrap();
        let after = after.add("a/6", cid_for(100)).await.unwrap();
        let after = after.delete("a/1").await.unwrap();

        let ops = diff_trees(&before, &after).await.unwrap();
        assert_eq!(ops.len(), 3, "expected exactly update+add+delete, got {ops:?}");
        assert!(ops.iter().any(|o| matches!(o, DiffOp::Update { key, .. } if key == "a/3")));
        assert!(ops.iter().any(|o| matches!(o, DiffOp::Add { key, .. } if key == "a/6")));
        assert!(ops.iter().any(|o| matches!(o, DiffOp::Delete { key, .. } if key == "a/1")));
    }
}
