//! Published known-answer vectors for the hash, HMAC and TOTP primitives.
//!
//! These pin the byte-level output of every primitive whose result is
//! persisted or exchanged: stored password digests, MACs on envelopes and
//! authenticator-app codes all depend on them staying fixed.

/// A message/digest pair.
#[derive(Debug, Clone, Copy)]
pub struct DigestVector {
    pub name: &'static str,
    pub message: &'static str,
    pub expected_hex: &'static str,
}

/// A keyed MAC vector.
#[derive(Debug, Clone, Copy)]
pub struct MacVector {
    pub name: &'static str,
    pub key: &'static str,
    pub message: &'static str,
    pub expected_hex: &'static str,
}

/// An RFC 6238 appendix B row (SHA-1, 8 digits, 30 s step).
#[derive(Debug, Clone, Copy)]
pub struct TotpVector {
    pub unix_secs: u64,
    pub expected: &'static str,
}

const NIST_448_BIT: &str = "abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq";

pub const SHA256_VECTORS: &[DigestVector] = &[
    DigestVector {
        name: "empty",
        message: "",
        expected_hex: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
    },
    DigestVector {
        name: "abc",
        message: "abc",
        expected_hex: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
    },
    DigestVector {
        name: "two_blocks",
        message: NIST_448_BIT,
        expected_hex: "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1",
    },
];

pub const SHA1_VECTORS: &[DigestVector] = &[
    DigestVector {
        name: "empty",
        message: "",
        expected_hex: "da39a3ee5e6b4b0d3255bfef95601890afd80709",
    },
    DigestVector {
        name: "abc",
        message: "abc",
        expected_hex: "a9993e364706816aba3e25717850c26c9cd0d89d",
    },
    DigestVector {
        name: "two_blocks",
        message: NIST_448_BIT,
        expected_hex: "84983e441c3bd26ebaae4aa1f95129e5e54670f1",
    },
];

pub const HMAC_SHA256_VECTORS: &[MacVector] = &[
    MacVector {
        name: "quick_brown_fox",
        key: "key",
        message: "The quick brown fox jumps over the lazy dog",
        expected_hex: "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8",
    },
    MacVector {
        name: "rfc4231_case_2",
        key: "Jefe",
        message: "what do ya want for nothing?",
        expected_hex: "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843",
    },
];

pub const HMAC_SHA1_VECTORS: &[MacVector] = &[MacVector {
    name: "quick_brown_fox",
    key: "key",
    message: "The quick brown fox jumps over the lazy dog",
    expected_hex: "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9",
}];

/// Base32 of the ASCII seed "12345678901234567890".
pub const RFC6238_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

pub const RFC6238_VECTORS: &[TotpVector] = &[
    TotpVector { unix_secs: 59, expected: "94287082" },
    TotpVector { unix_secs: 1_111_111_109, expected: "07081804" },
    TotpVector { unix_secs: 1_111_111_111, expected: "14050471" },
    TotpVector { unix_secs: 1_234_567_890, expected: "89005924" },
    TotpVector { unix_secs: 2_000_000_000, expected: "69279037" },
    TotpVector { unix_secs: 20_000_000_000, expected: "65353130" },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{sha1_hex, sha256_hex, HashFunction, Sha256};
    use crate::hmac::{hmac_sha1, hmac_sha256_hex};
    use crate::totp::generate_totp;

    #[test]
    fn test_sha256_vectors() {
        for vector in SHA256_VECTORS {
            assert_eq!(sha256_hex(vector.message), vector.expected_hex, "{}", vector.name);
        }
    }

    #[test]
    fn test_sha1_vectors() {
        for vector in SHA1_VECTORS {
            assert_eq!(sha1_hex(vector.message), vector.expected_hex, "{}", vector.name);
        }
    }

    #[test]
    fn test_sha256_million_a() {
        let mut hasher = Sha256::new();
        let chunk = [b'a'; 1000];
        for _ in 0..1000 {
            hasher.update(&chunk);
        }
        assert_eq!(
            hex::encode(hasher.finalize()),
            "cdc76e5c9914fb9281a1c7e284d73e67f1809a48a497200e046d39ccc7112cd0"
        );
    }

    #[test]
    fn test_hmac_vectors() {
        for vector in HMAC_SHA256_VECTORS {
            assert_eq!(
                hmac_sha256_hex(vector.key, vector.message),
                vector.expected_hex,
                "{}",
                vector.name
            );
        }
        for vector in HMAC_SHA1_VECTORS {
            assert_eq!(
                hex::encode(hmac_sha1(vector.key.as_bytes(), vector.message.as_bytes())),
                vector.expected_hex,
                "{}",
                vector.name
            );
        }
    }

    #[test]
    fn test_rfc6238_vectors() {
        for vector in RFC6238_VECTORS {
            assert_eq!(
                generate_totp(RFC6238_SECRET, vector.unix_secs, 30, 8).unwrap(),
                vector.expected,
                "T={}",
                vector.unix_secs
            );
        }
    }
}
