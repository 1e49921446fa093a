//! secp256k1 point arithmetic with an XOR-keystream encryption scheme and
//! an ECDSA-shaped signature.
//!
//! Encryption derives a one-block keystream from the x-coordinate of an
//! ephemeral Diffie-Hellman point and XORs it into the message integer. The
//! signature hashes the message with a rolling fold over UTF-16 code units
//! rather than a digest. Both constructions are kept bit-for-bit so stored
//! ciphertexts and signatures stay readable.

use std::sync::OnceLock;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::bigint::{self, extended_gcd, mod_inverse, random_range};
use crate::encoding::hex_biguint;
use crate::error::{CryptoError, CryptoResult};
use crate::rsa::chunk_utf8;

/// Plaintext bytes per block in [`encrypt_long`].
pub const MAX_BLOCK_BYTES: usize = 32;

const P: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];
const GX: [u8; 32] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07,
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];
const GY: [u8; 32] = [
    0x48, 0x3a, 0xda, 0x77, 0x26, 0xa3, 0xc4, 0x65, 0x5d, 0xa4, 0xfb, 0xfc, 0x0e, 0x11, 0x08, 0xa8,
    0xfd, 0x17, 0xb4, 0x48, 0xa6, 0x85, 0x54, 0x19, 0x9c, 0x47, 0xd0, 0x8f, 0xfb, 0x10, 0xd4, 0xb8,
];
const N: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// A curve point in affine coordinates, or the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: BigUint, y: BigUint },
}

impl Point {
    pub fn affine(x: BigUint, y: BigUint) -> Self {
        Point::Affine { x, y }
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    pub fn x(&self) -> Option<&BigUint> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, .. } => Some(x),
        }
    }
}

/// Domain parameters of `y^2 = x^3 + ax + b` over `F_p` with base point `g` of order `n`.
#[derive(Debug)]
pub struct Secp256k1 {
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
    pub g: Point,
    pub n: BigUint,
}

/// Shared curve parameters.
pub fn curve() -> &'static Secp256k1 {
    static CURVE: OnceLock<Secp256k1> = OnceLock::new();
    CURVE.get_or_init(|| Secp256k1 {
        p: BigUint::from_bytes_be(&P),
        a: BigUint::zero(),
        b: BigUint::from(7u32),
        g: Point::affine(BigUint::from_bytes_be(&GX), BigUint::from_bytes_be(&GY)),
        n: BigUint::from_bytes_be(&N),
    })
}

impl Secp256k1 {
    fn sub_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let a = a % &self.p;
        let b = b % &self.p;
        if a >= b {
            a - b
        } else {
            &self.p - (b - a)
        }
    }

    /// Inverse in `F_p`; `p` is prime so every non-zero element has one.
    fn field_inverse(&self, value: &BigUint) -> BigUint {
        let p = BigInt::from_biguint(Sign::Plus, self.p.clone());
        let v = BigInt::from_biguint(Sign::Plus, value % &self.p);
        let (_, x, _) = extended_gcd(&v, &p);
        let normalized = ((x % &p) + &p) % &p;
        normalized.to_biguint().unwrap_or_default()
    }

    pub fn is_on_curve(&self, point: &Point) -> bool {
        match point {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                if x >= &self.p || y >= &self.p {
                    return false;
                }
                let lhs = (y * y) % &self.p;
                let rhs = (x * x * x + &self.a * x + &self.b) % &self.p;
                lhs == rhs
            }
        }
    }

    pub fn point_add(&self, p1: &Point, p2: &Point) -> Point {
        let (x1, y1, x2, y2) = match (p1, p2) {
            (Point::Infinity, other) | (other, Point::Infinity) => return other.clone(),
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => (x1, y1, x2, y2),
        };

        if x1 == x2 {
            if y1 == y2 {
                return self.point_double(p1);
            }
            // P + (-P)
            return Point::Infinity;
        }

        let slope = (self.sub_mod(y2, y1) * self.field_inverse(&self.sub_mod(x2, x1))) % &self.p;
        let x3 = self.sub_mod(&self.sub_mod(&(&slope * &slope), x1), x2);
        let y3 = self.sub_mod(&((&slope * self.sub_mod(x1, &x3)) % &self.p), y1);

        Point::affine(x3, y3)
    }

    pub fn point_double(&self, point: &Point) -> Point {
        let (x, y) = match point {
            Point::Infinity => return Point::Infinity,
            Point::Affine { x, y } => (x, y),
        };

        if y.is_zero() {
            return Point::Infinity;
        }

        let numerator = (x * x * 3u32 + &self.a) % &self.p;
        let slope = (numerator * self.field_inverse(&(y * 2u32))) % &self.p;
        let x3 = self.sub_mod(&(&slope * &slope), &((x * 2u32) % &self.p));
        let y3 = self.sub_mod(&((&slope * self.sub_mod(x, &x3)) % &self.p), y);

        Point::affine(x3, y3)
    }

    /// Double-and-add, least significant bit first.
    pub fn scalar_multiply(&self, k: &BigUint, point: &Point) -> Point {
        let mut result = Point::Infinity;
        let mut addend = point.clone();

        for i in 0..k.bits() {
            if k.bit(i) {
                result = self.point_add(&result, &addend);
            }
            addend = self.point_double(&addend);
        }

        result
    }

    /// `k * G`.
    pub fn multiply_generator(&self, k: &BigUint) -> Point {
        self.scalar_multiply(k, &self.g)
    }

    fn random_scalar<R: RngCore + ?Sized>(&self, rng: &mut R) -> CryptoResult<BigUint> {
        random_range(rng, &BigUint::one(), &(&self.n - 1u32))
    }
}

/// Public key `{"x":"<hex>","y":"<hex>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EccPublicKey {
    #[serde(with = "hex_biguint")]
    pub x: BigUint,
    #[serde(with = "hex_biguint")]
    pub y: BigUint,
}

impl EccPublicKey {
    /// Validates that the point is finite and on the curve.
    pub fn from_point(point: &Point) -> CryptoResult<Self> {
        match point {
            Point::Infinity => Err(CryptoError::InvalidPoint(
                "point at infinity is not a public key".to_string(),
            )),
            Point::Affine { x, y } if curve().is_on_curve(point) => Ok(Self {
                x: x.clone(),
                y: y.clone(),
            }),
            Point::Affine { .. } => Err(CryptoError::InvalidPoint(
                "point is not on secp256k1".to_string(),
            )),
        }
    }

    pub fn to_point(&self) -> Point {
        Point::affine(self.x.clone(), self.y.clone())
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| CryptoError::Format(format!("invalid ECC public key: {}", e)))?;
        Self::from_point(&key.to_point())
    }
}

/// Private scalar, exported as bare lowercase hex.
#[derive(Clone, PartialEq, Eq)]
pub struct EccPrivateKey(BigUint);

impl std::fmt::Debug for EccPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EccPrivateKey(<redacted>)")
    }
}

impl EccPrivateKey {
    /// Accepts scalars in `[1, n-1]`.
    pub fn new(scalar: BigUint) -> CryptoResult<Self> {
        if scalar.is_zero() || scalar >= curve().n {
            return Err(CryptoError::InvalidParameter(
                "private scalar must be in [1, n-1]".to_string(),
            ));
        }
        Ok(Self(scalar))
    }

    pub fn scalar(&self) -> &BigUint {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        bigint::to_hex(&self.0)
    }

    pub fn from_hex(text: &str) -> CryptoResult<Self> {
        Self::new(bigint::parse_hex(text)?)
    }

    pub fn public_key(&self) -> CryptoResult<EccPublicKey> {
        EccPublicKey::from_point(&curve().multiply_generator(&self.0))
    }
}

#[derive(Debug, Clone)]
pub struct EccKeyPair {
    pub public: EccPublicKey,
    pub private: EccPrivateKey,
}

/// One encrypted block as it appears in the serialized array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EccCiphertext {
    pub ephemeral_public: EccPublicKey,
    pub ciphertext: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EccSignature {
    #[serde(with = "hex_biguint")]
    pub r: BigUint,
    #[serde(with = "hex_biguint")]
    pub s: BigUint,
}

pub fn generate_key_pair<R: RngCore + ?Sized>(rng: &mut R) -> CryptoResult<EccKeyPair> {
    let private = EccPrivateKey::new(curve().random_scalar(rng)?)?;
    let public = private.public_key()?;
    Ok(EccKeyPair { public, private })
}

fn shared_x(scalar: &BigUint, point: &Point) -> CryptoResult<BigUint> {
    curve()
        .scalar_multiply(scalar, point)
        .x()
        .cloned()
        .ok_or_else(|| CryptoError::InvalidPoint("shared secret is the point at infinity".to_string()))
}

/// Encrypt one block: `bigint(message) XOR (ek * pub).x`.
pub fn encrypt<R: RngCore + ?Sized>(
    message: &str,
    public: &EccPublicKey,
    rng: &mut R,
) -> CryptoResult<EccCiphertext> {
    let m = bigint::from_utf8_bytes(message);

    let ephemeral = generate_key_pair(rng)?;
    let key = shared_x(ephemeral.private.scalar(), &public.to_point())?;

    Ok(EccCiphertext {
        ephemeral_public: ephemeral.public,
        ciphertext: bigint::to_hex(&(m ^ key)),
    })
}

pub fn decrypt(block: &EccCiphertext, private: &EccPrivateKey) -> CryptoResult<String> {
    let ephemeral = block.ephemeral_public.to_point();
    if !curve().is_on_curve(&ephemeral) {
        return Err(CryptoError::InvalidPoint(
            "ephemeral public key is not on secp256k1".to_string(),
        ));
    }

    let c = bigint::parse_hex(&block.ciphertext)?;
    let key = shared_x(private.scalar(), &ephemeral)?;
    bigint::to_utf8_string(&(c ^ key))
}

/// Encrypt in 32-byte blocks, serialized as a JSON array of [`EccCiphertext`].
pub fn encrypt_long<R: RngCore + ?Sized>(
    message: &str,
    public: &EccPublicKey,
    rng: &mut R,
) -> CryptoResult<String> {
    let blocks = chunk_utf8(message, MAX_BLOCK_BYTES)
        .into_iter()
        .map(|block| encrypt(block, public, &mut *rng))
        .collect::<CryptoResult<Vec<_>>>()?;

    Ok(serde_json::to_string(&blocks)?)
}

pub fn decrypt_long(ciphertext: &str, private: &EccPrivateKey) -> CryptoResult<String> {
    if ciphertext.is_empty() {
        return Ok(String::new());
    }

    let blocks: Vec<EccCiphertext> = serde_json::from_str(ciphertext)
        .map_err(|e| CryptoError::Format(format!("invalid ECC ciphertext: {}", e)))?;

    blocks.iter().map(|block| decrypt(block, private)).collect()
}

/// Rolling fold `h = ((h << 5) + unit) mod n` over UTF-16 code units.
pub fn message_hash(message: &str) -> BigUint {
    let n = &curve().n;
    message.encode_utf16().fold(BigUint::zero(), |hash, unit| {
        ((hash << 5u32) + BigUint::from(unit)) % n
    })
}

pub fn sign<R: RngCore + ?Sized>(
    message: &str,
    private: &EccPrivateKey,
    rng: &mut R,
) -> CryptoResult<EccSignature> {
    let curve = curve();
    let hash = message_hash(message);

    loop {
        let k = curve.random_scalar(rng)?;
        let r = match curve.multiply_generator(&k).x() {
            Some(x) => x % &curve.n,
            None => continue,
        };
        if r.is_zero() {
            continue;
        }

        let k_inv = mod_inverse(&k, &curve.n)?;
        let s = (k_inv * (&hash + &r * private.scalar())) % &curve.n;
        if s.is_zero() {
            continue;
        }

        return Ok(EccSignature { r, s });
    }
}

pub fn verify(message: &str, signature: &EccSignature, public: &EccPublicKey) -> bool {
    let curve = curve();
    let in_range = |v: &BigUint| !v.is_zero() && v < &curve.n;
    if !in_range(&signature.r) || !in_range(&signature.s) {
        return false;
    }

    let public_point = public.to_point();
    if !curve.is_on_curve(&public_point) {
        return false;
    }

    let w = match mod_inverse(&signature.s, &curve.n) {
        Ok(w) => w,
        Err(_) => return false,
    };
    let hash = message_hash(message);
    let u1 = (&hash * &w) % &curve.n;
    let u2 = (&signature.r * &w) % &curve.n;

    let point = curve.point_add(
        &curve.multiply_generator(&u1),
        &curve.scalar_multiply(&u2, &public_point),
    );

    match point.x() {
        Some(x) => (x % &curve.n) == signature.r,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_generator_is_on_curve() {
        let curve = curve();
        assert!(curve.is_on_curve(&curve.g));
        assert!(!curve.is_on_curve(&Point::affine(BigUint::from(1u32), BigUint::from(1u32))));
    }

    #[test]
    fn test_order_times_generator_is_infinity() {
        let curve = curve();
        assert_eq!(curve.multiply_generator(&curve.n), Point::Infinity);
    }

    #[test]
    fn test_doubling_generator() {
        let curve = curve();
        let doubled = curve.point_double(&curve.g);
        let expected = Point::affine(
            bigint::parse_hex("c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5")
                .unwrap(),
            bigint::parse_hex("1ae168fea63dc339a3c58419466ceaeef7f632653266d0e1236431a950cfe52a")
                .unwrap(),
        );

        assert_eq!(doubled, expected);
        assert_eq!(curve.point_add(&curve.g, &curve.g), expected);
        assert_eq!(curve.multiply_generator(&BigUint::from(2u32)), expected);
    }

    #[test]
    fn test_point_addition_identities() {
        let curve = curve();
        let g = &curve.g;
        let neg_g = match g {
            Point::Affine { x, y } => Point::affine(x.clone(), &curve.p - y),
            Point::Infinity => unreachable!(),
        };

        assert_eq!(curve.point_add(&Point::Infinity, g), *g);
        assert_eq!(curve.point_add(g, &Point::Infinity), *g);
        assert_eq!(curve.point_add(g, &neg_g), Point::Infinity);
        assert_eq!(curve.scalar_multiply(&BigUint::zero(), g), Point::Infinity);

        let three_g = curve.point_add(&curve.point_double(g), g);
        assert_eq!(three_g, curve.multiply_generator(&BigUint::from(3u32)));
        assert!(curve.is_on_curve(&three_g));
    }

    #[test]
    fn test_key_pair_is_consistent() {
        let pair = generate_key_pair(&mut rng(1)).unwrap();
        assert_eq!(pair.private.public_key().unwrap(), pair.public);
        assert!(curve().is_on_curve(&pair.public.to_point()));
    }

    #[test]
    fn test_block_roundtrip() {
        let pair = generate_key_pair(&mut rng(2)).unwrap();
        let block = encrypt("seat 14B", &pair.public, &mut rng(3)).unwrap();
        assert_eq!(decrypt(&block, &pair.private).unwrap(), "seat 14B");
    }

    #[test]
    fn test_long_roundtrip() {
        let pair = generate_key_pair(&mut rng(4)).unwrap();
        let message = "Registration for the annual summit — 3 days, 42 sessions, ünïcödé ✓";
        let ciphertext = encrypt_long(message, &pair.public, &mut rng(5)).unwrap();

        let blocks: Vec<EccCiphertext> = serde_json::from_str(&ciphertext).unwrap();
        assert!(blocks.len() >= 3);
        assert_eq!(decrypt_long(&ciphertext, &pair.private).unwrap(), message);
    }

    #[test]
    fn test_ciphertext_json_shape() {
        let pair = generate_key_pair(&mut rng(6)).unwrap();
        let ciphertext = encrypt_long("hi", &pair.public, &mut rng(7)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&ciphertext).unwrap();

        assert!(value[0]["ephemeralPublic"]["x"].is_string());
        assert!(value[0]["ephemeralPublic"]["y"].is_string());
        assert!(value[0]["ciphertext"].is_string());
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let alice = generate_key_pair(&mut rng(8)).unwrap();
        let mallory = generate_key_pair(&mut rng(9)).unwrap();
        let block = encrypt("secret", &alice.public, &mut rng(10)).unwrap();

        if let Ok(text) = decrypt(&block, &mallory.private) {
            assert_ne!(text, "secret");
        }
    }

    #[test]
    fn test_decrypt_rejects_off_curve_ephemeral() {
        let pair = generate_key_pair(&mut rng(11)).unwrap();
        let mut block = encrypt("x", &pair.public, &mut rng(12)).unwrap();
        block.ephemeral_public.y += 1u32;

        assert!(matches!(
            decrypt(&block, &pair.private),
            Err(CryptoError::InvalidPoint(_))
        ));
    }

    #[test]
    fn test_decrypt_long_rejects_garbage() {
        let pair = generate_key_pair(&mut rng(13)).unwrap();
        assert!(matches!(
            decrypt_long("not json", &pair.private),
            Err(CryptoError::Format(_))
        ));
        assert_eq!(decrypt_long("[]", &pair.private).unwrap(), "");
    }

    #[test]
    fn test_sign_and_verify() {
        let pair = generate_key_pair(&mut rng(14)).unwrap();
        let signature = sign("ticket:1234", &pair.private, &mut rng(15)).unwrap();

        assert!(verify("ticket:1234", &signature, &pair.public));
        assert!(!verify("ticket:1235", &signature, &pair.public));

        let other = generate_key_pair(&mut rng(16)).unwrap();
        assert!(!verify("ticket:1234", &signature, &other.public));
    }

    #[test]
    fn test_verify_rejects_out_of_range_signature() {
        let pair = generate_key_pair(&mut rng(17)).unwrap();
        let zero = EccSignature {
            r: BigUint::zero(),
            s: BigUint::one(),
        };
        let too_big = EccSignature {
            r: BigUint::one(),
            s: curve().n.clone(),
        };

        assert!(!verify("m", &zero, &pair.public));
        assert!(!verify("m", &too_big, &pair.public));
    }

    #[test]
    fn test_message_hash_fold() {
        // ((0 << 5) + 'a') << 5 + 'b' = 97 * 32 + 98
        assert_eq!(message_hash("ab"), BigUint::from(97u32 * 32 + 98));
        assert_eq!(message_hash(""), BigUint::zero());
        // one UTF-16 unit per BMP char, two for astral
        assert_eq!(message_hash("é"), BigUint::from(0xe9u32));
        assert_eq!(
            message_hash("😀"),
            BigUint::from(0xd83du32 * 32 + 0xde00)
        );
    }

    #[test]
    fn test_key_export_formats() {
        let pair = generate_key_pair(&mut rng(18)).unwrap();
        let json = pair.public.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["x"], bigint::to_hex(&pair.public.x));
        assert_eq!(EccPublicKey::from_json(&json).unwrap(), pair.public);
        assert_eq!(
            EccPrivateKey::from_hex(&pair.private.to_hex()).unwrap(),
            pair.private
        );
        assert!(EccPrivateKey::from_hex("0").is_err());
    }

    #[test]
    fn test_signature_json() {
        let pair = generate_key_pair(&mut rng(19)).unwrap();
        let signature = sign("hello", &pair.private, &mut rng(20)).unwrap();
        let json = serde_json::to_string(&signature).unwrap();
        let parsed: EccSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, signature);
    }
}
