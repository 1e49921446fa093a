//! SHA-256 (FIPS 180-4) and SHA-1 (RFC 3174) implemented from scratch.
//!
//! Both are Merkle-Damgard constructions over 64-byte blocks with big-endian
//! length padding, so they share the buffering logic in [`BlockBuffer`].

/// A streaming hash function usable by [`crate::hmac::hmac`].
pub trait HashFunction: Default {
    /// Compression block size in bytes.
    const BLOCK_SIZE: usize;
    /// Digest length in bytes.
    const OUTPUT_SIZE: usize;

    fn update(&mut self, data: &[u8]);

    fn finalize(self) -> Vec<u8>;

    /// One-shot digest.
    fn digest(data: &[u8]) -> Vec<u8> {
        let mut hasher = Self::default();
        hasher.update(data);
        hasher.finalize()
    }
}

const BLOCK_LEN: usize = 64;

/// Pending partial block plus total message length.
#[derive(Clone)]
struct BlockBuffer {
    block: [u8; BLOCK_LEN],
    filled: usize,
    total_len: u64,
}

impl Default for BlockBuffer {
    fn default() -> Self {
        Self {
            block: [0u8; BLOCK_LEN],
            filled: 0,
            total_len: 0,
        }
    }
}

impl BlockBuffer {
    fn input(&mut self, mut data: &[u8], mut compress: impl FnMut(&[u8; BLOCK_LEN])) {
        self.total_len = self.total_len.wrapping_add(data.len() as u64);

        if self.filled > 0 {
            let take = (BLOCK_LEN - self.filled).min(data.len());
            self.block[self.filled..self.filled + take].copy_from_slice(&data[..take]);
            self.filled += take;
            data = &data[take..];

            if self.filled < BLOCK_LEN {
                return;
            }
            compress(&self.block);
            self.filled = 0;
        }

        let mut chunks = data.chunks_exact(BLOCK_LEN);
        for chunk in &mut chunks {
            let mut block = [0u8; BLOCK_LEN];
            block.copy_from_slice(chunk);
            compress(&block);
        }

        let rest = chunks.remainder();
        self.block[..rest.len()].copy_from_slice(rest);
        self.filled = rest.len();
    }

    /// Append 0x80, zeros and the 64-bit big-endian bit length.
    fn pad(&mut self, mut compress: impl FnMut(&[u8; BLOCK_LEN])) {
        let bit_len = self.total_len.wrapping_mul(8);

        self.block[self.filled] = 0x80;
        self.block[self.filled + 1..].fill(0);

        if self.filled + 1 > BLOCK_LEN - 8 {
            compress(&self.block);
            self.block.fill(0);
        }

        self.block[BLOCK_LEN - 8..].copy_from_slice(&bit_len.to_be_bytes());
        compress(&self.block);
        self.filled = 0;
    }
}

const SHA256_K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

const SHA256_H0: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Streaming SHA-256.
#[derive(Clone)]
pub struct Sha256 {
    state: [u32; 8],
    buffer: BlockBuffer,
}

impl Default for Sha256 {
    fn default() -> Self {
        Self {
            state: SHA256_H0,
            buffer: BlockBuffer::default(),
        }
    }
}

impl Sha256 {
    pub fn new() -> Self {
        Self::default()
    }

    fn compress(state: &mut [u32; 8], block: &[u8; BLOCK_LEN]) {
        let mut w = [0u32; 64];
        for (i, word) in block.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        }
        for i in 16..64 {
            let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
            let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
            w[i] = w[i - 16]
                .wrapping_add(s0)
                .wrapping_add(w[i - 7])
                .wrapping_add(s1);
        }

        let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

        for i in 0..64 {
            let s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
            let ch = (e & f) ^ (!e & g);
            let temp1 = h
                .wrapping_add(s1)
                .wrapping_add(ch)
                .wrapping_add(SHA256_K[i])
                .wrapping_add(w[i]);
            let s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
            let maj = (a & b) ^ (a & c) ^ (b & c);
            let temp2 = s0.wrapping_add(maj);

            h = g;
            g = f;
            f = e;
            e = d.wrapping_add(temp1);
            d = c;
            c = b;
            b = a;
            a = temp1.wrapping_add(temp2);
        }

        for (slot, value) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
            *slot = slot.wrapping_add(value);
        }
    }
}

impl HashFunction for Sha256 {
    const BLOCK_SIZE: usize = BLOCK_LEN;
    const OUTPUT_SIZE: usize = 32;

    fn update(&mut self, data: &[u8]) {
        let state = &mut self.state;
        self.buffer.input(data, |block| Self::compress(state, block));
    }

    fn finalize(mut self) -> Vec<u8> {
        let state = &mut self.state;
        self.buffer.pad(|block| Self::compress(state, block));
        self.state.iter().flat_map(|word| word.to_be_bytes()).collect()
    }
}

const SHA1_H0: [u32; 5] = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0];

/// Streaming SHA-1. Kept for TOTP interoperability only.
#[derive(Clone)]
pub struct Sha1 {
    state: [u32; 5],
    buffer: BlockBuffer,
}

impl Default for Sha1 {
    fn default() -> Self {
        Self {
            state: SHA1_H0,
            buffer: BlockBuffer::default(),
        }
    }
}

impl Sha1 {
    pub fn new() -> Self {
        Self::default()
    }

    fn compress(state: &mut [u32; 5], block: &[u8; BLOCK_LEN]) {
        let mut w = [0u32; 80];
        for (i, word) in block.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        }
        for i in 16..80 {
            w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
        }

        let [mut a, mut b, mut c, mut d, mut e] = *state;

        for (i, word) in w.iter().enumerate() {
            let (f, k) = match i {
                0..=19 => ((b & c) | (!b & d), 0x5A827999),
                20..=39 => (b ^ c ^ d, 0x6ED9EBA1),
                40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1BBCDC),
                _ => (b ^ c ^ d, 0xCA62C1D6),
            };

            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(*word);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }

        for (slot, value) in state.iter_mut().zip([a, b, c, d, e]) {
            *slot = slot.wrapping_add(value);
        }
    }
}

impl HashFunction for Sha1 {
    const BLOCK_SIZE: usize = BLOCK_LEN;
    const OUTPUT_SIZE: usize = 20;

    fn update(&mut self, data: &[u8]) {
        let state = &mut self.state;
        self.buffer.input(data, |block| Self::compress(state, block));
    }

    fn finalize(mut self) -> Vec<u8> {
        let state = &mut self.state;
        self.buffer.pad(|block| Self::compress(state, block));
        self.state.iter().flat_map(|word| word.to_be_bytes()).collect()
    }
}

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// SHA-1 digest of `data`.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Sha1::digest(data));
    out
}

/// Lowercase hex SHA-256 of a UTF-8 string.
pub fn sha256_hex(text: &str) -> String {
    hex::encode(sha256(text.as_bytes()))
}

/// Lowercase hex SHA-1 of a UTF-8 string.
pub fn sha1_hex(text: &str) -> String {
    hex::encode(sha1(text.as_bytes()))
}
