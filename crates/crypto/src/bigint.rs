//! Big-integer number theory used by the RSA and curve engines.
//!
//! `num-bigint` supplies the integer representation and schoolbook
//! arithmetic; exponentiation, inversion and sampling live here so their
//! behaviour is pinned independently of the library's own helpers.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Signed, Zero};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// Right-to-left square-and-multiply, least significant exponent bit first.
///
/// A modulus of 0 or 1 yields 0.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus.is_zero() || modulus.is_one() {
        return BigUint::zero();
    }

    let mut result = BigUint::one();
    let mut base = base % modulus;

    for i in 0..exponent.bits() {
        if exponent.bit(i) {
            result = (&result * &base) % modulus;
        }
        base = (&base * &base) % modulus;
    }

    result
}

/// Iterative extended Euclid: returns `(g, x, y)` with `a*x + b*y = g`.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let quotient = &old_r / &r;

        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);

        let next_t = &old_t - &quotient * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    if old_r.is_negative() {
        (-old_r, -old_s, -old_t)
    } else {
        (old_r, old_s, old_t)
    }
}

/// Multiplicative inverse of `a` modulo `m`.
///
/// Fails with [`CryptoError::NoInverse`] when `gcd(a, m) != 1` or `m == 0`.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> CryptoResult<BigUint> {
    if m.is_zero() {
        return Err(CryptoError::NoInverse);
    }

    let a = BigInt::from_biguint(Sign::Plus, a % m);
    let m_signed = BigInt::from_biguint(Sign::Plus, m.clone());
    let (g, x, _) = extended_gcd(&a, &m_signed);

    if !g.is_one() {
        return Err(CryptoError::NoInverse);
    }

    let normalized = ((x % &m_signed) + &m_signed) % &m_signed;
    normalized.to_biguint().ok_or(CryptoError::NoInverse)
}

/// `bits` uniformly random bits as an integer in `[0, 2^bits)`.
pub fn random_bits<R: RngCore + ?Sized>(rng: &mut R, bits: u64) -> BigUint {
    if bits == 0 {
        return BigUint::zero();
    }

    let byte_len = ((bits + 7) / 8) as usize;
    let mut bytes = vec![0u8; byte_len];
    rng.fill_bytes(&mut bytes);

    let excess = (byte_len as u64) * 8 - bits;
    bytes[0] &= 0xFF >> excess;

    BigUint::from_bytes_be(&bytes)
}

/// Uniform integer in `[min, max]`.
///
/// Draws `bitlen(max - min + 1)` bits and rejects candidates outside the
/// range, so there is no modulo bias.
pub fn random_range<R: RngCore + ?Sized>(
    rng: &mut R,
    min: &BigUint,
    max: &BigUint,
) -> CryptoResult<BigUint> {
    if min > max {
        return Err(CryptoError::InvalidParameter(format!(
            "empty range [{}, {}]",
            min, max
        )));
    }

    let range = max - min + 1u32;
    let bits = range.bits();

    loop {
        let candidate = random_bits(rng, bits);
        if candidate < range {
            return Ok(min + candidate);
        }
    }
}

/// Lowercase hex without leading zeros (`0` for zero).
pub fn to_hex(value: &BigUint) -> String {
    value.to_str_radix(16)
}

/// Parse hex digits (either case, no prefix, no separators).
pub fn parse_hex(text: &str) -> CryptoResult<BigUint> {
    parse_radix(text, 16)
}

/// Parse decimal digits (no sign, no separators).
pub fn parse_decimal(text: &str) -> CryptoResult<BigUint> {
    parse_radix(text, 10)
}

fn parse_radix(text: &str, radix: u32) -> CryptoResult<BigUint> {
    let valid = !text.is_empty() && text.chars().all(|c| c.is_digit(radix));
    if !valid {
        return Err(CryptoError::Format(format!(
            "invalid base-{} integer: {:?}",
            radix,
            truncate_for_error(text)
        )));
    }

    BigUint::parse_bytes(text.as_bytes(), radix)
        .ok_or_else(|| CryptoError::Format(format!("invalid base-{} integer", radix)))
}

fn truncate_for_error(text: &str) -> String {
    text.chars().take(16).collect()
}

/// Big-endian bytes of a UTF-8 string as an integer (empty string is zero).
pub fn from_utf8_bytes(text: &str) -> BigUint {
    BigUint::from_bytes_be(text.as_bytes())
}

/// Inverse of [`from_utf8_bytes`]: zero maps to the empty string.
///
/// Leading zero bytes cannot survive the integer representation, so a
/// block that started with NUL comes back without it.
pub fn to_utf8_string(value: &BigUint) -> CryptoResult<String> {
    if value.is_zero() {
        return Ok(String::new());
    }

    String::from_utf8(value.to_bytes_be())
        .map_err(|_| CryptoError::Format("decrypted block is not valid UTF-8".to_string()))
}
