pub mod did;
pub mod keyfile;
pub mod signing;
pub mod tid;

pub use did::verifying_key_from_did;
pub use signing::{SigningKey, verify};
pub use tid::TidGenerator;
