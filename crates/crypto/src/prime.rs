//! Miller-Rabin primality testing and random prime generation.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::RngCore;

use crate::bigint::{mod_pow, random_bits, random_range};
use crate::error::{CryptoError, CryptoResult};

/// Witness rounds used when none are specified.
pub const DEFAULT_ROUNDS: usize = 5;

const SMALL_PRIMES: [u32; 24] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Probabilistic primality test.
///
/// Composites are always rejected once a witness is found; a prime is
/// accepted with false-positive probability at most `4^-rounds`.
pub fn is_prime<R: RngCore + ?Sized>(n: &BigUint, rounds: usize, rng: &mut R) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    let three = BigUint::from(3u32);

    if n <= &one {
        return false;
    }
    if n <= &three {
        return true;
    }
    if !n.bit(0) {
        return false;
    }

    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    // n - 1 = 2^r * d with d odd
    let n_minus_one = n - &one;
    let r = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> r;

    let witness_max = n - &two;

    'witness: for _ in 0..rounds {
        let a = match random_range(rng, &two, &witness_max) {
            Ok(a) => a,
            Err(_) => return false,
        };

        let mut x = mod_pow(&a, &d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }

        for _ in 1..r {
            x = mod_pow(&x, &two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }

        return false;
    }

    true
}

/// Random prime of exactly `bits` bits (top bit and low bit forced on).
pub fn generate_prime<R: RngCore + ?Sized>(bits: u64, rng: &mut R) -> CryptoResult<BigUint> {
    if bits < 2 {
        return Err(CryptoError::InvalidParameter(format!(
            "prime size must be at least 2 bits, got {}",
            bits
        )));
    }

    loop {
        let mut candidate = random_bits(rng, bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);

        if is_prime(&candidate, DEFAULT_ROUNDS, rng) {
            return Ok(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigint::parse_decimal;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    #[test]
    fn test_small_numbers() {
        let mut rng = rng();
        let primes: Vec<u32> = (0u32..60)
            .filter(|n| is_prime(&BigUint::from(*n), DEFAULT_ROUNDS, &mut rng))
            .collect();

        assert_eq!(
            primes,
            vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59]
        );
    }

    #[test]
    fn test_known_large_prime() {
        let mut rng = rng();
        // 2^127 - 1
        let mersenne = parse_decimal("170141183460469231731687303715884105727").unwrap();
        assert!(is_prime(&mersenne, DEFAULT_ROUNDS, &mut rng));
    }

    #[test]
    fn test_carmichael_numbers_rejected() {
        let mut rng = rng();
        for n in [561u32, 1105, 1729, 2465, 2821, 6601, 8911] {
            assert!(!is_prime(&BigUint::from(n), DEFAULT_ROUNDS, &mut rng), "{}", n);
        }
    }

    #[test]
    fn test_semiprime_rejected() {
        let mut rng = rng();
        let p = parse_decimal("170141183460469231731687303715884105727").unwrap();
        let q = parse_decimal("2305843009213693951").unwrap();
        assert!(!is_prime(&(&p * &q), DEFAULT_ROUNDS, &mut rng));
    }

    #[test]
    fn test_generate_prime_has_exact_width() {
        let mut rng = rng();
        let prime = generate_prime(128, &mut rng).unwrap();

        assert_eq!(prime.bits(), 128);
        assert!(prime.bit(0));
        assert!(is_prime(&prime, 20, &mut rng));
    }

    #[test]
    fn test_generate_prime_rejects_tiny_sizes() {
        let mut rng = rng();
        assert!(generate_prime(1, &mut rng).is_err());
    }
}
