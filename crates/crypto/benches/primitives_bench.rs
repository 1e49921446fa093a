//! Primitive Performance Benchmarks
//!
//! Measures the hot paths of the crypto layer:
//! - SHA-256 throughput at several message sizes
//! - Password hashing at the default iteration count
//! - RSA and ECC chunked encryption and decryption
//! - Key generation for both engines

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eventshield_crypto::{ecc, password, rsa, sha256, totp};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sample_payload(len: usize) -> String {
    "EventShield ticket payload ".chars().cycle().take(len).collect()
}

/// Benchmark: SHA-256 over varying input sizes
fn bench_sha256(c: &mut Criterion) {
    for size in [64usize, 1024, 16 * 1024] {
        let data = vec![0x5au8; size];
        c.bench_with_input(BenchmarkId::new("sha256", size), &data, |b, data| {
            b.iter(|| black_box(sha256(data)))
        });
    }
}

/// Benchmark: default 10k-iteration password hash
fn bench_password_hash(c: &mut Criterion) {
    c.bench_function("password_hash_10k", |b| {
        b.iter(|| black_box(password::hash_password("correct horse", "NaClNaClNaCl", 10_000)))
    });
}

/// Benchmark: TOTP generation
fn bench_totp(c: &mut Criterion) {
    c.bench_function("totp_generate", |b| {
        b.iter(|| {
            black_box(totp::generate_totp(
                "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ",
                1_700_000_000,
                30,
                6,
            ))
        })
    });
}

/// Benchmark: RSA-1024 key generation and chunked encryption
fn bench_rsa(c: &mut Criterion) {
    let mut group = c.benchmark_group("rsa_1024");
    group.sample_size(10);

    group.bench_function("generate_key_pair", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| black_box(rsa::generate_key_pair(1024, &mut rng)))
    });

    let mut rng = StdRng::seed_from_u64(2);
    if let Ok(pair) = rsa::generate_key_pair(1024, &mut rng) {
        let message = sample_payload(512);
        group.bench_function("encrypt_long_512", |b| {
            b.iter(|| black_box(rsa::encrypt_long(&message, &pair.public)))
        });

        if let Ok(ciphertext) = rsa::encrypt_long(&message, &pair.public) {
            group.bench_function("decrypt_long_512", |b| {
                b.iter(|| black_box(rsa::decrypt_long(&ciphertext, &pair.private)))
            });
        }
    }

    group.finish();
}

/// Benchmark: secp256k1 key generation and chunked encryption
fn bench_ecc(c: &mut Criterion) {
    let mut group = c.benchmark_group("secp256k1");
    group.sample_size(20);

    let mut rng = StdRng::seed_from_u64(3);
    group.bench_function("generate_key_pair", |b| {
        b.iter(|| black_box(ecc::generate_key_pair(&mut rng)))
    });

    let mut rng = StdRng::seed_from_u64(4);
    if let Ok(pair) = ecc::generate_key_pair(&mut rng) {
        let message = sample_payload(256);
        group.bench_function("encrypt_long_256", |b| {
            b.iter(|| black_box(ecc::encrypt_long(&message, &pair.public, &mut rng)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sha256,
    bench_password_hash,
    bench_totp,
    bench_rsa,
    bench_ecc,
);

criterion_main!(benches);
