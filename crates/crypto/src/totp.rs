//! Time-based one-time passwords (RFC 6238 over HMAC-SHA1) and backup codes.

use std::sync::Arc;

use eventshield_core::{Clock, TotpConfig};
use rand::{Rng, RngCore};
use tracing::debug;
use zeroize::Zeroizing;

use crate::encoding::{base32_decode, BASE32_ALPHABET};
use crate::error::{CryptoError, CryptoResult};
use crate::hmac::hmac_sha1;

/// Digits in a backup code, printed as `DDDD-DDDD`.
pub const BACKUP_CODE_DIGITS: usize = 8;

/// Random secret of `length` base32 characters.
pub fn generate_secret<R: RngCore + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char)
        .collect()
}

fn check_parameters(step_secs: u64, digits: u32) -> CryptoResult<()> {
    if step_secs == 0 {
        return Err(CryptoError::InvalidParameter("TOTP step must be positive".to_string()));
    }
    if !(1..=9).contains(&digits) {
        return Err(CryptoError::InvalidParameter(format!(
            "TOTP digits must be between 1 and 9, got {}",
            digits
        )));
    }
    Ok(())
}

/// RFC 4226 HOTP value for one counter.
pub fn hotp(key: &[u8], counter: u64, digits: u32) -> String {
    let mac = hmac_sha1(key, &counter.to_be_bytes());

    // dynamic truncation
    let offset = (mac[mac.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([mac[offset], mac[offset + 1], mac[offset + 2], mac[offset + 3]])
        & 0x7fff_ffff;

    let code = binary % 10u32.pow(digits);
    format!("{:0width$}", code, width = digits as usize)
}

/// Token for the step containing `unix_secs`.
pub fn generate_totp(secret: &str, unix_secs: u64, step_secs: u64, digits: u32) -> CryptoResult<String> {
    check_parameters(step_secs, digits)?;
    let key = Zeroizing::new(base32_decode(secret)?);
    Ok(hotp(&key, unix_secs / step_secs, digits))
}

/// Accepts a token from any step within `window` steps of `unix_secs`.
///
/// An undecodable secret or invalid parameters verify as `false`.
pub fn verify_totp(
    token: &str,
    secret: &str,
    unix_secs: u64,
    window: u64,
    step_secs: u64,
    digits: u32,
) -> bool {
    if check_parameters(step_secs, digits).is_err() {
        return false;
    }
    let key = match base32_decode(secret) {
        Ok(key) => Zeroizing::new(key),
        Err(e) => {
            debug!(error = %e, "TOTP secret failed to decode");
            return false;
        }
    };

    let current = unix_secs / step_secs;
    let first = current.saturating_sub(window);
    let last = current.saturating_add(window);

    (first..=last).any(|counter| hotp(&key, counter, digits) == token)
}

/// `otpauth://totp/<issuer>:<account>?secret=<secret>&issuer=<issuer>`.
pub fn provisioning_uri(secret: &str, account: &str, issuer: &str) -> String {
    let issuer = urlencoding::encode(issuer);
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}",
        issuer,
        urlencoding::encode(account),
        secret,
        issuer
    )
}

/// `count` single-use codes of the form `DDDD-DDDD`.
pub fn generate_backup_codes<R: RngCore + ?Sized>(rng: &mut R, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let digits: String = (0..BACKUP_CODE_DIGITS)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect();
            format!("{}-{}", &digits[..4], &digits[4..])
        })
        .collect()
}

fn digits_only(code: &str) -> String {
    code.chars().filter(char::is_ascii_digit).collect()
}

/// Index of the matching backup code, comparing digits only.
///
/// The caller removes the matched code so it cannot be used again.
pub fn verify_backup_code<S: AsRef<str>>(code: &str, backup_codes: &[S]) -> Option<usize> {
    let candidate = digits_only(code);
    if candidate.is_empty() {
        return None;
    }
    backup_codes
        .iter()
        .position(|stored| digits_only(stored.as_ref()) == candidate)
}

/// TOTP operations bound to configured parameters and a clock.
pub struct TotpService {
    config: TotpConfig,
    clock: Arc<dyn Clock>,
}

impl TotpService {
    pub fn new(config: TotpConfig, clock: Arc<dyn Clock>) -> CryptoResult<Self> {
        check_parameters(config.step_secs, config.digits)?;
        Ok(Self { config, clock })
    }

    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    pub fn generate_secret<R: RngCore + ?Sized>(&self, rng: &mut R) -> String {
        generate_secret(rng, self.config.secret_length)
    }

    pub fn generate(&self, secret: &str) -> CryptoResult<String> {
        generate_totp(
            secret,
            self.clock.now_secs(),
            self.config.step_secs,
            self.config.digits,
        )
    }

    pub fn verify(&self, token: &str, secret: &str) -> bool {
        verify_totp(
            token,
            secret,
            self.clock.now_secs(),
            self.config.window,
            self.config.step_secs,
            self.config.digits,
        )
    }

    pub fn provisioning_uri(&self, secret: &str, account: &str) -> String {
        provisioning_uri(secret, account, &self.config.issuer)
    }

    pub fn generate_backup_codes<R: RngCore + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        generate_backup_codes(rng, self.config.backup_code_count)
    }
}
