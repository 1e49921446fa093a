//! Cryptographic primitives for the EventShield platform.
//!
//! Everything here is implemented in-crate on top of `num-bigint` integers
//! and plain byte arrays, so that stored ciphertexts, MACs and password
//! digests keep their exact byte-level format.
//!
//! # Components
//!
//! - **Number theory**: modular exponentiation, extended Euclid, Miller-Rabin
//! - **RSA**: textbook RSA with colon-joined hex blocks for long messages
//! - **ECC**: secp256k1 arithmetic, XOR-keystream encryption, ECDSA-shaped signatures
//! - **Hashing**: SHA-256 and SHA-1, streaming and one-shot
//! - **HMAC**: generic over [`hash::HashFunction`]
//! - **MAC service**: HMAC, a simplified CBC-style MAC, timestamped replay checks
//! - **Passwords**: salted iterated SHA-256 in `salt$iterations$digest` form
//! - **TOTP**: RFC 6238 codes, provisioning URIs and backup codes
//!
//! # Randomness
//!
//! Randomized operations take the generator as an argument. Production
//! callers pass an OS-seeded RNG; tests pass a seeded `StdRng`.
//!
//! # Handling secrets
//!
//! Private keys implement a redacting `Debug`. Never log plaintext, private
//! key components, MAC keys, TOTP secrets or passwords.

pub mod bigint;
pub mod ecc;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod hmac;
pub mod mac;
pub mod password;
pub mod prime;
pub mod rsa;
pub mod totp;

#[cfg(test)]
mod test_vectors;

pub use ecc::{EccCiphertext, EccKeyPair, EccPrivateKey, EccPublicKey, EccSignature, Point};
pub use error::{CryptoError, CryptoResult};
pub use hash::{sha1, sha256, sha256_hex, HashFunction, Sha1, Sha256};
pub use hmac::{hmac, hmac_sha1, hmac_sha256, hmac_sha256_hex};
pub use mac::{MacKind, MacService, TimestampedMac};
pub use password::{PasswordHash, PasswordHasher};
pub use rsa::{RsaKeyPair, RsaPrivateKey, RsaPublicKey};
pub use totp::TotpService;
