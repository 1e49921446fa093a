//! Salted, iterated SHA-256 password hashing.
//!
//! `digest_0 = sha256_hex(password || salt)`, then each further round hashes
//! the previous hex digest string. Stored as `salt$iterations$digest`.

use std::fmt;
use std::str::FromStr;

use eventshield_core::PasswordConfig;
use rand::{Rng, RngCore};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::hash::sha256_hex;

/// Alphabet for generated salts.
pub const SALT_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const FIELD_SEPARATOR: char = '$';
const DIGEST_HEX_LEN: usize = 64;

/// Parsed `salt$iterations$digest` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub salt: String,
    pub iterations: u32,
    pub hash: String,
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}${}", self.salt, self.iterations, self.hash)
    }
}

impl FromStr for PasswordHash {
    type Err = CryptoError;

    fn from_str(stored: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = stored.split(FIELD_SEPARATOR).collect();
        let [salt, iterations, hash] = parts.as_slice() else {
            return Err(CryptoError::Format(format!(
                "password hash must have 3 '$'-separated fields, found {}",
                parts.len()
            )));
        };

        if salt.is_empty() {
            return Err(CryptoError::Format("password hash has an empty salt".to_string()));
        }

        let iterations: u32 = iterations
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| CryptoError::Format(format!("invalid iteration count {:?}", iterations)))?;

        if hash.len() != DIGEST_HEX_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CryptoError::Format(
                "password digest must be 64 hex characters".to_string(),
            ));
        }

        Ok(Self {
            salt: salt.to_string(),
            iterations,
            hash: hash.to_string(),
        })
    }
}

/// Random salt of `length` characters from [`SALT_ALPHABET`].
pub fn generate_salt<R: RngCore + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| SALT_ALPHABET[rng.gen_range(0..SALT_ALPHABET.len())] as char)
        .collect()
}

/// Hash with an explicit salt.
pub fn hash_password(password: &str, salt: &str, iterations: u32) -> CryptoResult<PasswordHash> {
    if salt.is_empty() || salt.contains(FIELD_SEPARATOR) {
        return Err(CryptoError::Format(
            "salt must be non-empty and must not contain '$'".to_string(),
        ));
    }
    if iterations == 0 {
        return Err(CryptoError::InvalidParameter(
            "iteration count must be positive".to_string(),
        ));
    }

    let seed = Zeroizing::new(format!("{}{}", password, salt));
    let mut digest = sha256_hex(&seed);
    for _ in 1..iterations {
        digest = sha256_hex(&digest);
    }

    Ok(PasswordHash {
        salt: salt.to_string(),
        iterations,
        hash: digest,
    })
}

/// False for a wrong password or a malformed stored string; never errors.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(expected) = stored.parse::<PasswordHash>() else {
        return false;
    };

    match hash_password(password, &expected.salt, expected.iterations) {
        Ok(computed) => computed.hash.eq_ignore_ascii_case(&expected.hash),
        Err(_) => false,
    }
}

/// General-purpose SHA-256 hex digest.
pub fn hash_data(data: &str) -> String {
    sha256_hex(data)
}

/// Hasher carrying the configured salt length and iteration count.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: u32,
    salt_length: usize,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(&PasswordConfig::default())
    }
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Self {
        Self {
            iterations: config.iterations,
            salt_length: config.salt_length,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash with a freshly generated salt.
    pub fn hash<R: RngCore + ?Sized>(&self, password: &str, rng: &mut R) -> CryptoResult<PasswordHash> {
        let salt = generate_salt(rng, self.salt_length);
        hash_password(password, &salt, self.iterations)
    }

    pub fn hash_with_salt(&self, password: &str, salt: &str) -> CryptoResult<PasswordHash> {
        hash_password(password, salt, self.iterations)
    }

    pub fn verify(&self, password: &str, stored: &str) -> bool {
        verify_password(password, stored)
    }
}
