//! The repository: a versioned, signed binding of an owner DID to an MST
//! root, and the record-level CRUD that stages changes against it between
//! explicit commits.

use std::sync::Arc;

use cid::Cid;
use pds_blockstore::BlockStore;
use pds_core::error::{RepoError, RepoResult};
use pds_crypto::did::verifying_key_from_did;
use pds_crypto::signing::SigningKey;
use pds_crypto::tid::TidGenerator;
use tracing::{debug, info};

use crate::car;
use crate::commit::{SignedCommit, UnsignedCommit};
use crate::mst::{DiffOp, Mst, Walk};

/// A record key, `<collection-nsid>/<record-key>`, e.g. `app.bsky.post/3jui7kd54zh2y`.
pub fn record_key(collection: &str, rkey: &str) -> String {
    format!("{collection}/{rkey}")
}

/// An open repository: a staged MST plus the most recently signed commit
/// over it.
///
/// Record mutations (`create_record`, `put_record`, `update_record`,
/// `delete_record`) only touch the staged tree and mark the repository
/// dirty; nothing is signed or written as a new head until [`Repository::commit`]
/// is called. Readers that need a stable, history-independent view — record
/// listing in particular — read the last *committed* root rather than the
/// staged one, so in-flight mutations never leak into iteration.
pub struct Repository {
    store: Arc<dyn BlockStore>,
    signing_key: SigningKey,
    staged: Mst,
    head: SignedCommit,
    dirty: bool,
    tid: TidGenerator,
}

impl Repository {
    /// Create a brand new, empty repository owned by `signing_key`, and
    /// commit its (empty) genesis state.
    pub async fn create(store: Arc<dyn BlockStore>, signing_key: SigningKey, clock_id: u16) -> RepoResult<Self> {
        let mst = Mst::empty(store.clone());
        let tid = TidGenerator::with_clock_id(clock_id);
        let did = signing_key.did_key();
        info!(did = %did, "creating new repository");
        let rev = tid.next_tid();
        let head = commit_mst(&store, &signing_key, &did, &mst, rev, None).await?;
        Ok(Self {
            store,
            signing_key,
            staged: mst,
            head,
            dirty: false,
            tid,
        })
    }

    /// Open a repository from its most recent signed commit, verifying the
    /// signature and rejecting unsupported commit versions before trusting
    /// any of its data.
    pub async fn open(
        store: Arc<dyn BlockStore>,
        signing_key: SigningKey,
        commit: SignedCommit,
        clock_id: u16,
    ) -> RepoResult<Self> {
        let verifying_key = verifying_key_from_did(&commit.did)?;
        commit.verify(&verifying_key)?;
        let mst = Mst::load(store.clone(), commit.data);
        info!(did = %commit.did, rev = %commit.rev, "opened repository");
        Ok(Self {
            store,
            signing_key,
            staged: mst,
            head: commit,
            dirty: false,
            tid: TidGenerator::with_clock_id(clock_id),
        })
    }

    pub fn did(&self) -> &str {
        &self.head.did
    }

    /// The most recently committed signed commit. Does not reflect staged,
    /// uncommitted mutations — call [`Repository::commit`] first.
    pub fn head(&self) -> &SignedCommit {
        &self.head
    }

    /// `true` if there are staged mutations not yet folded into a commit.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The currently staged tree, including any uncommitted mutations.
    pub fn mst(&self) -> &Mst {
        &self.staged
    }

    /// Draw a fresh record key and store a record under a newly generated
    /// TID, staging the addition.
    pub async fn create_record(&mut self, collection: &str, record: &[u8]) -> RepoResult<(String, Cid)> {
        let rkey = self.tid.next_tid();
        let key = record_key(collection, &rkey);
        let cid = self.put_record_block(record).await?;
        debug!(key = %key, cid = %cid, "adding record");
        self.staged = self.staged.add(&key, cid).await?;
        self.dirty = true;
        Ok((key, cid))
    }

    /// Store a record under a caller-supplied path. Add-only: fails with
    /// `KeyExists` if the path is already occupied.
    pub async fn put_record(&mut self, rpath: &str, record: &[u8]) -> RepoResult<Cid> {
        let cid = self.put_record_block(record).await?;
        debug!(key = %rpath, cid = %cid, "adding record at caller-supplied path");
        self.staged = self.staged.add(rpath, cid).await?;
        self.dirty = true;
        Ok(cid)
    }

    /// Replace the value at an existing record key.
    pub async fn update_record(&mut self, key: &str, record: &[u8]) -> RepoResult<Cid> {
        let cid = self.put_record_block(record).await?;
        debug!(key = %key, cid = %cid, "updating record");
        self.staged = self.staged.update(key, cid).await?;
        self.dirty = true;
        Ok(cid)
    }

    /// Remove a record key.
    pub async fn delete_record(&mut self, key: &str) -> RepoResult<()> {
        debug!(key = %key, "deleting record");
        self.staged = self.staged.delete(key).await?;
        self.dirty = true;
        Ok(())
    }

    /// Fetch a record's raw DAG-CBOR bytes by key, from the staged tree (so
    /// a reader sees its own uncommitted writes).
    pub async fn get_record(&self, key: &str) -> RepoResult<Option<bytes::Bytes>> {
        match self.staged.get(key).await? {
            None => Ok(None),
            Some(cid) => Ok(Some(self.store.get(&cid).await?)),
        }
    }

    /// All `(key, cid)` pairs in ascending key order from the last
    /// *committed* root, optionally starting from a bound. Staged mutations
    /// are not visible here until [`Repository::commit`] is called.
    pub async fn list_records(&self, start: Option<(&str, Walk)>) -> RepoResult<Vec<(String, Cid)>> {
        let committed = Mst::load(self.store.clone(), self.head.data);
        committed.walk_leaves_from(start).await
    }

    /// The minimal set of record-level changes between this repository's
    /// staged state and another signed commit's MST.
    pub async fn diff_since(&self, other_root: Cid) -> RepoResult<Vec<DiffOp>> {
        let other_mst = Mst::load(self.store.clone(), other_root);
        self.staged.diff_since(&other_mst).await
    }

    /// Copy every block reachable from the last committed MST root into
    /// `dest`, deduplicated — the same link-scan CAR export uses, without
    /// producing a CAR byte stream.
    pub async fn copy_data_to(&self, dest: &Arc<dyn BlockStore>) -> RepoResult<()> {
        car::copy_reachable(&self.store, dest, self.head.data).await
    }

    async fn put_record_block(&self, record: &[u8]) -> RepoResult<Cid> {
        self.store.put(record).await
    }

    /// Fold all staged mutations into a new signed commit, chained from the
    /// current head, and make it the repository's new head. A no-op commit
    /// (nothing staged since the last one) is permitted — it simply produces
    /// a new commit over an unchanged root.
    pub async fn commit(&mut self) -> RepoResult<&SignedCommit> {
        let rev = self.tid.next_tid();
        let prev = self.head.cid()?;
        let did = self.head.did.clone();
        let signed = commit_mst(&self.store, &self.signing_key, &did, &self.staged, rev, Some(prev)).await?;
        self.head = signed;
        self.dirty = false;
        Ok(&self.head)
    }
}

async fn commit_mst(
    store: &Arc<dyn BlockStore>,
    signing_key: &SigningKey,
    did: &str,
    mst: &Mst,
    rev: String,
    prev: Option<Cid>,
) -> RepoResult<SignedCommit> {
    let data = match mst.root_cid().await? {
        Some(cid) => cid,
        None => empty_mst_cid(store).await?,
    };
    let unsigned = UnsignedCommit::new(did, data, rev.clone(), prev);
    let signed = unsigned.sign(signing_key)?;
    let bytes = pds_dagcbor::encode(&signed)?;
    store.put(&bytes).await?;
    info!(did = %did, rev = %rev, data = %data, "committed");
    Ok(signed)
}

/// The CID an empty MST (zero entries) is defined to have: the empty node
/// elision rule collapses any zero-entry node to its child, but the
/// top-level empty tree has no child to collapse to, so it gets one fixed
/// CID of its own — the DAG-CBOR encoding of an entry-less node.
async fn empty_mst_cid(store: &Arc<dyn BlockStore>) -> RepoResult<Cid> {
    #[derive(serde::Serialize)]
    struct EmptyNode {
        l: Option<Cid>,
        e: Vec<()>,
    }
    let bytes = pds_dagcbor::encode(&EmptyNode { l: None, e: vec![] })
        .map_err(|e| RepoError::Codec(e.to_string()))?;
    store.put(&bytes).await
}
