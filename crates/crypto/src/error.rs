//! Error types for the cryptographic primitives.

use thiserror::Error;

/// Errors raised by the primitive layer.
///
/// Primitives fail fast: none of them returns partial or corrupted output.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Plaintext block does not fit below the RSA modulus
    #[error("Block too large for key: {block_len} bytes (max {max_len})")]
    BlockTooLarge { block_len: usize, max_len: usize },

    /// Malformed hex, base32, JSON envelope or hash triple
    #[error("Format error: {0}")]
    Format(String),

    /// gcd(a, m) != 1
    #[error("Modular inverse does not exist")]
    NoInverse,

    /// Caller supplied an unusable parameter (range, size, digits)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Point is not on the curve or is the point at infinity where a finite point is required
    #[error("Invalid curve point: {0}")]
    InvalidPoint(String),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for primitive operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
