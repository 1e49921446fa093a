//! Error types for key lifecycle and envelope encryption.

use eventshield_crypto::CryptoError;
use thiserror::Error;

use crate::record::KeyAlgorithm;

#[derive(Debug, Error)]
pub enum KeyError {
    /// MAC on an envelope does not match its ciphertext
    #[error("Integrity check failed: MAC does not match ciphertext")]
    Integrity,

    /// Owner has no active key (or the key lacks the needed component)
    #[error("No usable {algorithm} key for owner {owner_id}")]
    KeyNotFound {
        owner_id: String,
        algorithm: KeyAlgorithm,
    },

    #[error("Owner {owner_id} already has an active {algorithm} key")]
    DuplicateActive {
        owner_id: String,
        algorithm: KeyAlgorithm,
    },

    #[error("Unknown key: {key_id}")]
    UnknownKey { key_id: String },

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store-level failure (poisoned lock, corrupt row, RNG failure)
    #[error("Key store error: {0}")]
    Store(String),
}

pub type KeyResult<T> = Result<T, KeyError>;

/// Map a poisoned-lock error into [`KeyError::Store`].
pub(crate) fn lock_error<E: std::fmt::Display>(e: E) -> KeyError {
    KeyError::Store(format!("Lock error: {}", e))
}
