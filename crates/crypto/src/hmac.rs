//! HMAC (RFC 2104) over any [`HashFunction`].

use zeroize::Zeroizing;

use crate::hash::{HashFunction, Sha1, Sha256};

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// `H((K' ^ opad) || H((K' ^ ipad) || message))`.
///
/// Keys longer than the block size are hashed first; shorter keys are
/// zero-padded to the block size.
pub fn hmac<H: HashFunction>(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut block_key = Zeroizing::new(vec![0u8; H::BLOCK_SIZE]);
    if key.len() > H::BLOCK_SIZE {
        let hashed = H::digest(key);
        block_key[..hashed.len()].copy_from_slice(&hashed);
    } else {
        block_key[..key.len()].copy_from_slice(key);
    }

    let inner_pad: Zeroizing<Vec<u8>> = Zeroizing::new(block_key.iter().map(|b| b ^ IPAD).collect());
    let outer_pad: Zeroizing<Vec<u8>> = Zeroizing::new(block_key.iter().map(|b| b ^ OPAD).collect());

    let mut inner = H::default();
    inner.update(&inner_pad);
    inner.update(message);
    let inner_digest = inner.finalize();

    let mut outer = H::default();
    outer.update(&outer_pad);
    outer.update(&inner_digest);
    outer.finalize()
}

pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hmac::<Sha256>(key, message));
    out
}

pub fn hmac_sha1(key: &[u8], message: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&hmac::<Sha1>(key, message));
    out
}

/// Lowercase hex HMAC-SHA256 with UTF-8 key and message.
pub fn hmac_sha256_hex(key: &str, message: &str) -> String {
    hex::encode(hmac_sha256(key.as_bytes(), message.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOX: &str = "The quick brown fox jumps over the lazy dog";

    #[test]
    fn test_hmac_sha256_known_answer() {
        assert_eq!(
            hmac_sha256_hex("key", FOX),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_hmac_sha1_known_answer() {
        assert_eq!(
            hex::encode(hmac_sha1(b"key", FOX.as_bytes())),
            "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
    }

    #[test]
    fn test_rfc4231_case_2() {
        assert_eq!(
            hmac_sha256_hex("Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_long_key_is_hashed_first() {
        let long_key = vec![0xaa; 131];
        let hashed_key = crate::hash::sha256(&long_key);
        assert_eq!(
            hmac_sha256(&long_key, b"payload"),
            hmac_sha256(&hashed_key, b"payload")
        );
    }
}
