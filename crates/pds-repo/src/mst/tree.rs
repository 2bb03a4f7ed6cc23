//! In-memory Merkle Search Tree: the persistent, content-addressed ordered
//! map from record key to record-value CID.
//!
//! Every mutation (`add`/`update`/`delete`) returns a brand new [`Mst`];
//! the tree it was called on is left untouched and any CID it was loaded
//! from (or has already been stored under) stays valid. Nothing is ever
//! mutated in place and nothing is ever garbage collected here — that is
//! host tooling's job, not the engine's.

use std::cmp::Ordering;
use std::sync::Arc;

use async_recursion::async_recursion;
use cid::Cid;
use pds_blockstore::BlockStore;
use pds_core::error::{RepoError, RepoResult};

use super::node::{NodeData, TreeEntry, common_prefix_len, layer_for_key, validate_key};

/// A subtree: either a CID pointing at an already-stored block, or a node
/// materialized in memory (freshly built or modified, not yet stored).
#[derive(Debug, Clone)]
pub(crate) enum Child {
    Unloaded(Cid),
    Loaded(Arc<Node>),
}

impl Child {
    pub(crate) async fn resolve(&self, store: &Arc<dyn BlockStore>) -> RepoResult<Arc<Node>> {
        match self {
            Child::Loaded(node) => Ok(node.clone()),
            Child::Unloaded(cid) => {
                let bytes = store.get(cid).await?;
                let data: NodeData = pds_dagcbor::decode(&bytes)?;
                Ok(Arc::new(Node::from_wire(data)?))
            }
        }
    }

    /// The CID this child is already known to live at, if it hasn't been
    /// modified since it was loaded or last stored.
    pub(crate) fn known_cid(&self) -> Option<Cid> {
        match self {
            Child::Unloaded(cid) => Some(*cid),
            Child::Loaded(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub key: String,
    pub value: Cid,
    pub tree: Option<Child>,
}

/// One materialized MST node: a layer number, the subtree covering keys
/// below its first entry, and a sorted entry list each carrying the
/// subtree covering keys between it and the next entry.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub layer: u32,
    pub left: Option<Child>,
    pub entries: Vec<Entry>,
}

impl Node {
    fn from_wire(data: NodeData) -> RepoResult<Node> {
        if data.entries.is_empty() {
            return Err(RepoError::CorruptNode(
                "node has zero entries; empty nodes must be elided".to_string(),
            ));
        }
        let mut entries = Vec::with_capacity(data.entries.len());
        let mut prev_key = String::new();
        for te in &data.entries {
            if te.prefix_len as usize > prev_key.len() {
                return Err(RepoError::CorruptNode("prefix_len exceeds previous key".to_string()));
            }
            let prefix = &prev_key[..te.prefix_len as usize];
            let suffix = std::str::from_utf8(&te.key_suffix)
                .map_err(|e| RepoError::CorruptNode(e.to_string()))?;
            let key = format!("{prefix}{suffix}");
            entries.push(Entry {
                key: key.clone(),
                value: te.value,
                tree: te.tree.map(Child::Unloaded),
            });
            prev_key = key;
        }
        let layer = layer_for_key(&entries[0].key);
        Ok(Node {
            layer,
            left: data.left.map(Child::Unloaded),
            entries,
        })
    }
}

/// Build the optional child a node's `(left, entries)` collapse to: a node
/// with zero entries is not a node at all, it elides to its single child
/// (or to nothing, if it had no child either).
fn node_from_parts(layer: u32, left: Option<Child>, entries: Vec<Entry>) -> Option<Child> {
    if entries.is_empty() {
        left
    } else {
        Some(Child::Loaded(Arc::new(Node { layer, left, entries })))
    }
}

/// Recursively encode and store every in-memory node reachable from `child`,
/// leaving already-stored subtrees untouched, and return the resulting CID.
#[async_recursion]
async fn store_rec(child: &Child, store: &Arc<dyn BlockStore>) -> RepoResult<Cid> {
    match child {
        Child::Unloaded(cid) => Ok(*cid),
        Child::Loaded(node) => {
            let left = match &node.left {
                Some(c) => Some(store_rec(c, store).await?),
                None => None,
            };
            let mut wire_entries = Vec::with_capacity(node.entries.len());
            let mut prev_key = String::new();
            for e in &node.entries {
                let prefix_len = common_prefix_len(&prev_key, &e.key);
                let key_suffix = e.key.as_bytes()[prefix_len..].to_vec();
                let tree = match &e.tree {
                    Some(c) => Some(store_rec(c, store).await?),
                    None => None,
                };
                wire_entries.push(TreeEntry {
                    prefix_len: prefix_len as u32,
                    key_suffix,
                    value: e.value,
                    tree,
                });
                prev_key = e.key.clone();
            }
            let data = NodeData { left, entries: wire_entries };
            let bytes = pds_dagcbor::encode(&data)?;
            store.put(&bytes).await
        }
    }
}

#[async_recursion]
pub(crate) async fn collect_all(
    child: &Child,
    store: &Arc<dyn BlockStore>,
    out: &mut Vec<(String, Cid)>,
) -> RepoResult<()> {
    let node = child.resolve(store).await?;
    if let Some(l) = &node.left {
        collect_all(l, store, out).await?;
    }
    for e in &node.entries {
        out.push((e.key.clone(), e.value));
        if let Some(t) = &e.tree {
            collect_all(t, store, out).await?;
        }
    }
    Ok(())
}

fn partition_point(entries: &[Entry], key: &str) -> usize {
    entries.partition_point(|e| e.key.as_str() < key)
}

#[async_recursion]
async fn get_rec(child: &Child, key: &str, store: &Arc<dyn BlockStore>) -> RepoResult<Option<Cid>> {
    let node = child.resolve(store).await?;
    let i = partition_point(&node.entries, key);
    if let Some(e) = node.entries.get(i) {
        if e.key == key {
            return Ok(Some(e.value));
        }
    }
    let subtree = if i == 0 { &node.left } else { &node.entries[i - 1].tree };
    match subtree {
        Some(c) => get_rec(c, key, store).await,
        None => Ok(None),
    }
}

/// Split the subtree rooted at `child` into everything strictly less than
/// `key` and everything strictly greater; `key` itself is never present as
/// an exact entry in a subtree being split this way.
#[async_recursion]
async fn split_child(
    child: &Option<Child>,
    key: &str,
    store: &Arc<dyn BlockStore>,
) -> RepoResult<(Option<Child>, Option<Child>)> {
    let Some(child) = child else {
        return Ok((None, None));
    };
    let node = child.resolve(store).await?;
    let i = partition_point(&node.entries, key);
    if i == 0 {
        let (ll, lr) = split_child(&node.left, key, store).await?;
        let right = node_from_parts(node.layer, lr, node.entries.clone());
        Ok((ll, right))
    } else {
        let pivot = node.entries[i - 1].clone();
        let (tl, tr) = split_child(&pivot.tree, key, store).await?;
        let mut left_entries = node.entries[..i - 1].to_vec();
        left_entries.push(Entry {
            key: pivot.key,
            value: pivot.value,
            tree: tl,
        });
        let left = node_from_parts(node.layer, node.left.clone(), left_entries);
        let right_entries = node.entries[i..].to_vec();
        let right = node_from_parts(node.layer, tr, right_entries);
        Ok((left, right))
    }
}

async fn insert_into_node(
    node: Arc<Node>,
    key: &str,
    value: Cid,
    store: &Arc<dyn BlockStore>,
) -> RepoResult<Child> {
    let i = partition_point(&node.entries, key);
    let mut entries = node.entries.clone();
    let left = if i == 0 {
        let (left_of_new, right_of_new) = split_child(&node.left, key, store).await?;
        entries.insert(
            0,
            Entry {
                key: key.to_string(),
                value,
                tree: right_of_new,
            },
        );
        left_of_new
    } else {
        let (left_of_new, right_of_new) = split_child(&entries[i - 1].tree, key, store).await?;
        entries[i - 1].tree = left_of_new;
        entries.insert(
            i,
            Entry {
                key: key.to_string(),
                value,
                tree: right_of_new,
            },
        );
        node.left.clone()
    };
    Ok(Child::Loaded(Arc::new(Node {
        layer: node.layer,
        left,
        entries,
    })))
}

async fn add_into_option(
    opt: &Option<Child>,
    key: &str,
    value: Cid,
    key_layer: u32,
    store: &Arc<dyn BlockStore>,
) -> RepoResult<Child> {
    match opt {
        Some(c) => add_rec(c, key, value, key_layer, store).await,
        None => Ok(Child::Loaded(Arc::new(Node {
            layer: key_layer,
            left: None,
            entries: vec![Entry {
                key: key.to_string(),
                value,
                tree: None,
            }],
        }))),
    }
}

async fn descend_and_add(
    node: Arc<Node>,
    key: &str,
    value: Cid,
    key_layer: u32,
    store: &Arc<dyn BlockStore>,
) -> RepoResult<Child> {
    let i = partition_point(&node.entries, key);
    let mut entries = node.entries.clone();
    let left = if i == 0 {
        Some(add_into_option(&node.left, key, value, key_layer, store).await?)
    } else {
        let new_child = add_into_option(&entries[i - 1].tree, key, value, key_layer, store).await?;
        entries[i - 1].tree = Some(new_child);
        node.left.clone()
    };
    Ok(Child::Loaded(Arc::new(Node {
        layer: node.layer,
        left,
        entries,
    })))
}

#[async_recursion]
async fn add_rec(
    child: &Child,
    key: &str,
    value: Cid,
    key_layer: u32,
    store: &Arc<dyn BlockStore>,
) -> RepoResult<Child> {
    let node = child.resolve(store).await?;
    match key_layer.cmp(&node.layer) {
        Ordering::Greater => {
            let (left, right) = split_child(&Some(child.clone()), key, store).await?;
            Ok(Child::Loaded(Arc::new(Node {
                layer: key_layer,
                left,
                entries: vec![Entry {
                    key: key.to_string(),
                    value,
                    tree: right,
                }],
            })))
        }
        Ordering::Equal => insert_into_node(node, key, value, store).await,
        Ordering::Less => descend_and_add(node, key, value, key_layer, store).await,
    }
}

#[async_recursion]
async fn update_rec(child: &Child, key: &str, value: Cid, store: &Arc<dyn BlockStore>) -> RepoResult<Child> {
    let node = child.resolve(store).await?;
    let i = partition_point(&node.entries, key);
    let mut entries = node.entries.clone();
    if let Some(e) = entries.get_mut(i) {
        if e.key == key {
            e.value = value;
            return Ok(Child::Loaded(Arc::new(Node {
                layer: node.layer,
                left: node.left.clone(),
                entries,
            })));
        }
    }
    if i == 0 {
        match &node.left {
            Some(c) => {
                let new_child = update_rec(c, key, value, store).await?;
                Ok(Child::Loaded(Arc::new(Node {
                    layer: node.layer,
                    left: Some(new_child),
                    entries,
                })))
            }
            None => Err(RepoError::KeyNotFound(key.to_string())),
        }
    } else {
        match &entries[i - 1].tree.clone() {
            Some(c) => {
                let new_child = update_rec(c, key, value, store).await?;
                entries[i - 1].tree = Some(new_child);
                Ok(Child::Loaded(Arc::new(Node {
                    layer: node.layer,
                    left: node.left.clone(),
                    entries,
                })))
            }
            None => Err(RepoError::KeyNotFound(key.to_string())),
        }
    }
}

/// Merge two adjacent subtrees (everything in `left` sorts before
/// everything in `right`) into one, preserving the layer invariant.
#[async_recursion]
async fn merge_child(
    left: Option<Child>,
    right: Option<Child>,
    store: &Arc<dyn BlockStore>,
) -> RepoResult<Option<Child>> {
    match (left, right) {
        (None, None) => Ok(None),
        (Some(c), None) | (None, Some(c)) => Ok(Some(c)),
        (Some(l), Some(r)) => {
            let ln = l.resolve(store).await?;
            let rn = r.resolve(store).await?;
            match ln.layer.cmp(&rn.layer) {
                Ordering::Equal => {
                    let last_tree = ln.entries.last().and_then(|e| e.tree.clone());
                    let fused_mid = merge_child(last_tree, rn.left.clone(), store).await?;
                    let mut entries = ln.entries.clone();
                    if let Some(last) = entries.last_mut() {
                        last.tree = fused_mid;
                    }
                    entries.extend(rn.entries.iter().cloned());
                    Ok(Some(Child::Loaded(Arc::new(Node {
                        layer: ln.layer,
                        left: ln.left.clone(),
                        entries,
                    }))))
                }
                Ordering::Greater => {
                    let mut entries = ln.entries.clone();
                    let last_tree = entries.last().and_then(|e| e.tree.clone());
                    let fused = merge_child(last_tree, Some(r.clone()), store).await?;
                    if let Some(last) = entries.last_mut() {
                        last.tree = fused;
                    }
                    Ok(Some(Child::Loaded(Arc::new(Node {
                        layer: ln.layer,
                        left: ln.left.clone(),
                        entries,
                    }))))
                }
                Ordering::Less => {
                    let fused = merge_child(Some(l.clone()), rn.left.clone(), store).await?;
                    Ok(Some(Child::Loaded(Arc::new(Node {
                        layer: rn.layer,
                        left: fused,
                        entries: rn.entries.clone(),
                    }))))
                }
            }
        }
    }
}

#[async_recursion]
async fn delete_rec(child: &Child, key: &str, store: &Arc<dyn BlockStore>) -> RepoResult<Option<Child>> {
    let node = child.resolve(store).await?;
    let i = partition_point(&node.entries, key);
    if let Some(e) = node.entries.get(i) {
        if e.key == key {
            let left_of_gap = if i == 0 {
                node.left.clone()
            } else {
                node.entries[i - 1].tree.clone()
            };
            let right_of_gap = node.entries[i].tree.clone();
            let fused = merge_child(left_of_gap, right_of_gap, store).await?;
            let mut entries = node.entries.clone();
            entries.remove(i);
            return if i == 0 {
                Ok(node_from_parts(node.layer, fused, entries))
            } else {
                entries[i - 1].tree = fused;
                Ok(node_from_parts(node.layer, node.left.clone(), entries))
            };
        }
    }
    let mut entries = node.entries.clone();
    if i == 0 {
        let Some(c) = &node.left else {
            return Err(RepoError::KeyNotFound(key.to_string()));
        };
        let new_sub = delete_rec(c, key, store).await?;
        Ok(node_from_parts(node.layer, new_sub, entries))
    } else {
        let Some(c) = entries[i - 1].tree.clone() else {
            return Err(RepoError::KeyNotFound(key.to_string()));
        };
        let new_sub = delete_rec(&c, key, store).await?;
        entries[i - 1].tree = new_sub;
        Ok(node_from_parts(node.layer, node.left.clone(), entries))
    }
}

/// Whether [`Mst::walk_leaves_from`] includes the boundary key itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Inclusive,
    Exclusive,
}

/// Returned by a [`Mst::walk_leaves_cb`] callback: whether traversal should
/// keep going or stop immediately, leaving later leaves unvisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    Done,
}

/// Visit every `(key, value)` pair at or after `start` in ascending order,
/// calling `cb` for each and stopping as soon as it returns
/// `WalkControl::Done` — later leaves, including whole unvisited subtrees,
/// are never loaded from the store.
#[async_recursion]
async fn walk_rec(
    child: &Child,
    store: &Arc<dyn BlockStore>,
    start: Option<(&str, Walk)>,
    cb: &mut (dyn FnMut(&str, Cid) -> RepoResult<WalkControl> + Send),
) -> RepoResult<WalkControl> {
    let node = child.resolve(store).await?;

    // The left child covers every key below the node's first entry; once
    // the start bound reaches or passes that entry, nothing in `left` can
    // still be >= start, so it can be skipped without loading it.
    let skip_left = match start {
        Some((key, _)) => node.entries.first().is_some_and(|e| key >= e.key.as_str()),
        None => false,
    };
    if !skip_left {
        if let Some(left) = &node.left {
            if walk_rec(left, store, start, cb).await? == WalkControl::Done {
                return Ok(WalkControl::Done);
            }
        }
    }

    for e in &node.entries {
        let include = match start {
            None => true,
            Some((key, walk)) => match e.key.as_str().cmp(key) {
                Ordering::Greater => true,
                Ordering::Equal => walk == Walk::Inclusive,
                Ordering::Less => false,
            },
        };
        if include && cb(&e.key, e.value)? == WalkControl::Done {
            return Ok(WalkControl::Done);
        }
        if let Some(t) = &e.tree {
            if walk_rec(t, store, start, cb).await? == WalkControl::Done {
                return Ok(WalkControl::Done);
            }
        }
    }
    Ok(WalkControl::Continue)
}

/// A Merkle Search Tree over a content-addressed [`BlockStore`].
///
/// Cloning an `Mst` is cheap (an `Arc` and at most a handful of `Cid`s/node
/// pointers); every mutating method takes `&self` and returns a new `Mst`
/// sharing structure with the old one.
#[derive(Clone)]
pub struct Mst {
    pub(crate) store: Arc<dyn BlockStore>,
    pub(crate) root: Option<Child>,
}

impl Mst {
    /// A fresh, empty tree over `store`.
    pub fn empty(store: Arc<dyn BlockStore>) -> Self {
        Self { store, root: None }
    }

    /// A tree whose root is already a stored block at `root_cid`, resolved
    /// lazily as operations touch it.
    pub fn load(store: Arc<dyn BlockStore>, root_cid: Cid) -> Self {
        Self {
            store,
            root: Some(Child::Unloaded(root_cid)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Store every modified node reachable from the root and return its CID,
    /// or `None` if the tree has no entries at all.
    pub async fn root_cid(&self) -> RepoResult<Option<Cid>> {
        match &self.root {
            None => Ok(None),
            Some(child) => Ok(Some(store_rec(child, &self.store).await?)),
        }
    }

    pub async fn get(&self, key: &str) -> RepoResult<Option<Cid>> {
        validate_key(key)?;
        match &self.root {
            None => Ok(None),
            Some(child) => get_rec(child, key, &self.store).await,
        }
    }

    /// Insert `key` with a brand new value. Fails with `KeyExists` if the
    /// key is already present.
    pub async fn add(&self, key: &str, value: Cid) -> RepoResult<Mst> {
        validate_key(key)?;
        if self.get(key).await?.is_some() {
            return Err(RepoError::KeyExists(key.to_string()));
        }
        let key_layer = layer_for_key(key);
        let new_root = match &self.root {
            None => Child::Loaded(Arc::new(Node {
                layer: key_layer,
                left: None,
                entries: vec![Entry {
                    key: key.to_string(),
                    value,
                    tree: None,
                }],
            })),
            Some(child) => add_rec(child, key, value, key_layer, &self.store).await?,
        };
        Ok(Mst {
            store: self.store.clone(),
            root: Some(new_root),
        })
    }

    /// Replace the value stored at an existing key. Fails with
    /// `KeyNotFound` if the key is absent.
    pub async fn update(&self, key: &str, value: Cid) -> RepoResult<Mst> {
        validate_key(key)?;
        let root = self.root.as_ref().ok_or_else(|| RepoError::KeyNotFound(key.to_string()))?;
        let new_root = update_rec(root, key, value, &self.store).await?;
        Ok(Mst {
            store: self.store.clone(),
            root: Some(new_root),
        })
    }

    /// Remove a key. Fails with `KeyNotFound` if the key is absent.
    pub async fn delete(&self, key: &str) -> RepoResult<Mst> {
        validate_key(key)?;
        let root = self.root.as_ref().ok_or_else(|| RepoError::KeyNotFound(key.to_string()))?;
        let new_root = delete_rec(root, key, &self.store).await?;
        Ok(Mst {
            store: self.store.clone(),
            root: new_root,
        })
    }

    /// Walk `(key, value)` pairs in ascending key order, starting from an
    /// optional bound, invoking `cb` for each. Traversal stops as soon as
    /// `cb` returns [`WalkControl::Done`] — subtrees past that point are
    /// never loaded from the store.
    pub async fn walk_leaves_cb(
        &self,
        start: Option<(&str, Walk)>,
        mut cb: impl FnMut(&str, Cid) -> RepoResult<WalkControl> + Send,
    ) -> RepoResult<()> {
        if let Some(child) = &self.root {
            walk_rec(child, &self.store, start, &mut cb).await?;
        }
        Ok(())
    }

    /// All `(key, value)` pairs in ascending key order, optionally starting
    /// from a bound.
    pub async fn walk_leaves_from(&self, start: Option<(&str, Walk)>) -> RepoResult<Vec<(String, Cid)>> {
        let mut out = Vec::new();
        self.walk_leaves_cb(start, |key, value| {
            out.push((key.to_string(), value));
            Ok(WalkControl::Continue)
        })
        .await?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pds_blockstore::MemoryBlockStore;

    fn cid_for(n: u8) -> Cid {
        pds_dagcbor::cid_for_value(&n).unwrap()
    }

    fn store() -> Arc<dyn BlockStore> {
        Arc::new(MemoryBlockStore::new())
    }

    #[tokio::test]
    async fn empty_tree_has_no_root() {
        let mst = Mst::empty(store());
        assert_eq!(mst.root_cid().await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_then_get_roundtrips() {
        let mst = Mst::empty(store());
        let v = cid_for(1);
        let mst = mst.add("app.bsky.post/a", v).await.unwrap();
        assert_eq!(mst.get("app.bsky.post/a").await.unwrap(), Some(v));
    }

    #[tokio::test]
    async fn add_existing_key_fails() {
        let mst = Mst::empty(store());
        let mst = mst.add("k", cid_for(1)).await.unwrap();
        assert!(mst.add("k", cid_for(2)).await.is_err());
    }

    #[tokio::test]
    async fn update_changes_value_without_changing_keyset() {
        let mst = Mst::empty(store());
        let mst = mst.add("k", cid_for(1)).await.unwrap();
        let mst = mst.update("k", cid_for(2)).await.unwrap();
        assert_eq!(mst.get("k").await.unwrap(), Some(cid_for(2)));
    }

    #[tokio::test]
    async fn update_missing_key_fails() {
        let mst = Mst::empty(store());
        assert!(mst.update("missing", cid_for(1)).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let mst = Mst::empty(store());
        let mst = mst.add("k", cid_for(1)).await.unwrap();
        let mst = mst.delete("k").await.unwrap();
        assert_eq!(mst.get("k").await.unwrap(), None);
        assert!(mst.is_empty());
    }

    #[tokio::test]
    async fn old_root_survives_mutation() {
        let mst = Mst::empty(store());
        let v1 = mst.add("k", cid_for(1)).await.unwrap();
        let v2 = v1.add("k2", cid_for(2)).await.unwrap();
        assert_eq!(v1.get("k2").await.unwrap(), None);
        assert_eq!(v2.get("k").await.unwrap(), Some(cid_for(1)));
    }

    #[tokio::test]
    async fn many_inserts_preserve_ascending_order() {
        let mut mst = Mst::empty(store());
        let keys = [
            "a.post/1", "a.post/2", "a.post/5", "b.post/1", "c.post/9", "z.post/0",
        ];
        for (i, k) in keys.iter().enumerate() {
            mst = mst.add(k, cid_for(i as u8)).await.unwrap();
        }
        let walked = mst.walk_leaves_from(None).await.unwrap();
        let walked_keys: Vec<&str> = walked.iter().map(|(k, _)| k.as_str()).collect();
        let mut sorted_keys = keys.to_vec();
        sorted_keys.sort();
        assert_eq!(walked_keys, sorted_keys);
    }

    #[tokio::test]
    async fn walk_leaves_cb_stops_early_on_done() {
        let mut mst = Mst::empty(store());
        let keys = ["a", "b", "c", "d", "e"];
        for (i, k) in keys.iter().enumerate() {
            mst = mst.add(k, cid_for(i as u8)).await.unwrap();
        }

        let mut visited = Vec::new();
        mst.walk_leaves_cb(None, |key, _value| {
            visited.push(key.to_string());
            if visited.len() == 2 {
                Ok(WalkControl::Done)
            } else {
                Ok(WalkControl::Continue)
            }
        })
        .await
        .unwrap();

        assert_eq!(visited, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn walk_from_bound_respects_inclusive_exclusive() {
        let mut mst = Mst::empty(store());
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            mst = mst.add(k, cid_for(i as u8)).await.unwrap();
        }
        let inclusive = mst.walk_leaves_from(Some(("b", Walk::Inclusive))).await.unwrap();
        assert_eq!(
            inclusive.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            vec!["b", "c", "d"]
        );
        let exclusive = mst.walk_leaves_from(Some(("b", Walk::Exclusive))).await.unwrap();
        assert_eq!(
            exclusive.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            vec!["c", "d"]
        );
    }

    #[tokio::test]
    async fn stored_root_reloads_to_same_shape() {
        let backing = store();
        let mut mst = Mst::empty(backing.clone());
        for (i, k) in ["a.x/1", "a.x/2", "b.x/1"].iter().enumerate() {
            mst = mst.add(k, cid_for(i as u8)).await.unwrap();
        }
        let root = mst.root_cid().await.unwrap().unwrap();
        let reloaded = Mst::load(backing, root);
        let walked = reloaded.walk_leaves_from(None).await.unwrap();
        assert_eq!(walked.len(), 3);
        assert_eq!(reloaded.get("a.x/2").await.unwrap(), Some(cid_for(1)));
    }

    #[tokio::test]
    async fn delete_all_keys_returns_to_empty() {
        let mut mst = Mst::empty(store());
        let keys = ["m.k/1", "m.k/2", "m.k/3", "m.k/4"];
        for (i, k) in keys.iter().enumerate() {
            mst = mst.add(k, cid_for(i as u8)).await.unwrap();
        }
        for k in keys {
            mst = mst.delete(k).await.unwrap();
        }
        assert!(mst.is_empty());
        assert_eq!(mst.root_cid().await.unwrap(), None);
    }

    #[tokio::test]
    async fn validate_key_propagates_from_add() {
        let mst = Mst::empty(store());
        assert!(mst.add("", cid_for(1)).await.is_err());
    }

    #[tokio::test]
    async fn insertion_order_does_not_affect_root_cid() {
        // canonicity: two trees holding the same key/value set must be
        // byte-identical regardless of the order keys were inserted in.
        let keys = ["a", "b", "c", "d", "e"];

        let mut ascending = Mst::empty(store());
        for (i, k) in keys.iter().enumerate() {
            ascending = ascending.add(k, cid_for(i as u8)).await.unwrap();
        }

        let mut reversed = Mst::empty(store());
        for (i, k) in keys.iter().enumerate().rev() {
            reversed = reversed.add(k, cid_for(i as u8)).await.unwrap();
        }

        let ascending_root = ascending.root_cid().await.unwrap();
        let reversed_root = reversed.root_cid().await.unwrap();
        assert_eq!(ascending_root, reversed_root);
    }
}
