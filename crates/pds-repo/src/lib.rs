//! The repository engine: the Merkle Search Tree that indexes record paths
//! to record CIDs, the commit protocol that signs and publishes a root, and
//! the CAR transfer format used to move a whole repository between stores.

pub mod car;
pub mod commit;
pub mod mst;
pub mod repo;

pub use commit::{SignedCommit, UnsignedCommit};
pub use mst::{DiffOp, Mst, Walk, WalkControl};
pub use repo::Repository;
