//! Key lifecycle and envelope encryption for EventShield.
//!
//! - [`record`]: key records, bundles and exported public keys
//! - [`store`]: the [`KeyStore`] boundary and an in-memory backend
//! - [`sqlite_store`]: durable SQLite backend
//! - [`lifecycle`]: issuance, rotation, revocation and purge
//! - [`orchestrator`]: RSA then ECC layered encryption with an HMAC envelope

pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod record;
pub mod sqlite_store;
pub mod store;

pub use error::{KeyError, KeyResult};
pub use lifecycle::KeyLifecycleManager;
pub use orchestrator::{
    decrypt_with_bundle, encrypt_with_bundle, generate_data_mac, verify_data_mac,
    EncryptionOrchestrator, Envelope,
};
pub use record::{
    ExportedPublicKeys, KeyAlgorithm, KeyBundle, KeyRecord, KeyStatus, PublicKeyInfo,
};
pub use sqlite_store::SqliteKeyStore;
pub use store::{KeyStore, MemoryKeyStore};
