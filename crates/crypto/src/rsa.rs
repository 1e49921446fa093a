//! Textbook RSA over the in-crate big-integer routines.
//!
//! Blocks are raw UTF-8 integers with no padding scheme; the only guard is
//! the 11-byte margin below the modulus width used when chunking long
//! messages. Oversized blocks are a hard error, never truncated.
//!
//! Key export uses JSON with decimal strings:
//! public `{"e":"65537","n":"..."}`, private `{"d":"...","n":"..."}`.

use num_bigint::BigUint;
use num_traits::One;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::bigint::{self, mod_inverse, mod_pow};
use crate::encoding::decimal;
use crate::error::{CryptoError, CryptoResult};
use crate::prime::generate_prime;

/// Fixed public exponent.
pub const PUBLIC_EXPONENT: u32 = 65537;

/// Bytes reserved below the modulus width when chunking.
pub const BLOCK_MARGIN: usize = 11;

/// Separator between ciphertext blocks produced by [`encrypt_long`].
pub const BLOCK_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaPublicKey {
    #[serde(with = "decimal")]
    pub e: BigUint,
    #[serde(with = "decimal")]
    pub n: BigUint,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaPrivateKey {
    #[serde(with = "decimal")]
    pub d: BigUint,
    #[serde(with = "decimal")]
    pub n: BigUint,
}

impl std::fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("d", &"<redacted>")
            .field("n_bits", &self.n.bits())
            .finish()
    }
}

/// A generated key pair together with the primes it came from.
#[derive(Debug, Clone)]
pub struct RsaKeyPair {
    pub public: RsaPublicKey,
    pub private: RsaPrivateKey,
    p: BigUint,
    q: BigUint,
}

impl RsaKeyPair {
    /// The prime factors `(p, q)` of the modulus.
    pub fn primes(&self) -> (&BigUint, &BigUint) {
        (&self.p, &self.q)
    }
}

impl RsaPublicKey {
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| CryptoError::Format(format!("invalid RSA public key: {}", e)))?;
        check_modulus(&key.n)?;
        Ok(key)
    }

    /// Largest chunk [`encrypt_long`] will place in one block.
    pub fn max_block_size(&self) -> usize {
        max_block_size(&self.n)
    }
}

impl RsaPrivateKey {
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| CryptoError::Format(format!("invalid RSA private key: {}", e)))?;
        check_modulus(&key.n)?;
        Ok(key)
    }
}

fn check_modulus(n: &BigUint) -> CryptoResult<()> {
    if n <= &BigUint::one() {
        return Err(CryptoError::Format("RSA modulus must exceed 1".to_string()));
    }
    Ok(())
}

fn max_block_size(n: &BigUint) -> usize {
    ((n.bits() / 8) as usize).saturating_sub(BLOCK_MARGIN)
}

/// Generate a key pair whose modulus is built from two `bits / 2` primes.
pub fn generate_key_pair<R: RngCore + ?Sized>(bits: u32, rng: &mut R) -> CryptoResult<RsaKeyPair> {
    if bits < 16 || bits % 2 != 0 {
        return Err(CryptoError::InvalidParameter(format!(
            "RSA key size must be even and at least 16 bits, got {}",
            bits
        )));
    }

    let half = u64::from(bits / 2);
    let e = BigUint::from(PUBLIC_EXPONENT);

    loop {
        let p = generate_prime(half, rng)?;
        let q = loop {
            let q = generate_prime(half, rng)?;
            if q != p {
                break q;
            }
        };

        let n = &p * &q;
        let phi = (&p - 1u32) * (&q - 1u32);

        // e shares a factor with phi only when p or q is 1 mod 65537; draw again.
        let d = match mod_inverse(&e, &phi) {
            Ok(d) => d,
            Err(CryptoError::NoInverse) => continue,
            Err(other) => return Err(other),
        };

        return Ok(RsaKeyPair {
            public: RsaPublicKey { e, n: n.clone() },
            private: RsaPrivateKey { d, n },
            p,
            q,
        });
    }
}

/// Encrypt one block; the result is lowercase hex of `m^e mod n`.
pub fn encrypt(block: &str, public: &RsaPublicKey) -> CryptoResult<String> {
    let m = bigint::from_utf8_bytes(block);
    if m >= public.n {
        return Err(CryptoError::BlockTooLarge {
            block_len: block.len(),
            max_len: ((public.n.bits() / 8) as usize),
        });
    }

    Ok(bigint::to_hex(&mod_pow(&m, &public.e, &public.n)))
}

/// Decrypt one hex block back to its UTF-8 plaintext.
pub fn decrypt(ciphertext: &str, private: &RsaPrivateKey) -> CryptoResult<String> {
    let c = bigint::parse_hex(ciphertext)?;
    let m = mod_pow(&c, &private.d, &private.n);
    bigint::to_utf8_string(&m)
}

/// Split at character boundaries into blocks of at most `max_bytes` bytes.
pub(crate) fn chunk_utf8(message: &str, max_bytes: usize) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut start = 0;
    let mut end = 0;

    for (offset, ch) in message.char_indices() {
        let next = offset + ch.len_utf8();
        if next - start > max_bytes && end > start {
            blocks.push(&message[start..end]);
            start = end;
        }
        end = next;
    }

    if end > start {
        blocks.push(&message[start..end]);
    }

    blocks
}

/// Encrypt an arbitrary-length message as colon-joined hex blocks.
pub fn encrypt_long(message: &str, public: &RsaPublicKey) -> CryptoResult<String> {
    let max_block = public.max_block_size();
    if max_block == 0 {
        return Err(CryptoError::InvalidParameter(format!(
            "modulus of {} bits is too small for chunked encryption",
            public.n.bits()
        )));
    }

    let blocks = chunk_utf8(message, max_block)
        .into_iter()
        .map(|block| encrypt(block, public))
        .collect::<CryptoResult<Vec<_>>>()?;

    Ok(blocks.join(&BLOCK_SEPARATOR.to_string()))
}

/// Inverse of [`encrypt_long`].
pub fn decrypt_long(ciphertext: &str, private: &RsaPrivateKey) -> CryptoResult<String> {
    if ciphertext.is_empty() {
        return Ok(String::new());
    }

    ciphertext
        .split(BLOCK_SEPARATOR)
        .map(|block| decrypt(block, private))
        .collect()
}
