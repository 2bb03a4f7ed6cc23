use thiserror::Error;

/// Error kinds surfaced across the block store, codec, MST, and commit layers.
///
/// Each lower-level crate owns a narrower error type for the failures only it
/// can produce; this is the type those errors are converted `Into` at the
/// boundary where a [`crate::config::EngineConfig`]-configured engine method
/// is the one calling them, so callers of the engine only ever see one enum.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key already exists: {0}")]
    KeyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt node: {0}")]
    CorruptNode(String),

    #[error("corrupt commit: {0}")]
    CorruptCommit(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("unsupported commit version: {0}")]
    UnsupportedVersion(i64),

    #[error("invalid did: {0}")]
    InvalidDid(String),

    #[error("invalid cid: {0}")]
    InvalidCid(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),
}

pub type RepoResult<T> = Result<T, RepoError>;
