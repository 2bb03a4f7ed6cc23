use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub block_store: BlockStoreConfig,
    pub owner_did: String,
    #[serde(default)]
    pub clock_id: u16,
    /// Path to the file holding the owner's 32-byte ed25519 signing seed.
    /// Generated on first run if it doesn't exist yet.
    pub owner_key_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockStoreConfig {
    /// Directory backing a file-based block store. `None` means in-memory only.
    #[serde(default)]
    pub path: Option<String>,
}

impl EngineConfig {
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PDS_ENGINE__").split("__"))
            .extract()
    }
}
