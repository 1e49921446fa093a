//! Configuration management for EventShield.
//!
//! Every section has reference defaults, so a partial TOML file only needs
//! to name the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    pub rsa: RsaConfig,
    pub keys: KeyLifecycleConfig,
    pub password: PasswordConfig,
    pub totp: TotpConfig,
    pub mac: MacConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsaConfig {
    /// Modulus size for issued RSA keys.
    pub key_bits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLifecycleConfig {
    /// Validity window of a freshly issued key record.
    pub validity_days: u64,
    /// How long an expired record is retained before it may be purged.
    pub purge_grace_days: u64,
    /// Length of generated HMAC secrets (alphanumeric characters).
    pub mac_key_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub iterations: u32,
    pub salt_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotpConfig {
    pub step_secs: u64,
    pub digits: u32,
    /// Number of steps tolerated on either side of the current one.
    pub window: u64,
    pub secret_length: usize,
    pub backup_code_count: usize,
    pub issuer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacConfig {
    /// Maximum accepted age of a timestamped MAC.
    pub max_age_ms: u64,
}

impl Default for RsaConfig {
    fn default() -> Self {
        Self { key_bits: 2048 }
    }
}

impl Default for KeyLifecycleConfig {
    fn default() -> Self {
        Self {
            validity_days: 30,
            purge_grace_days: 90,
            mac_key_length: 64,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            salt_length: 32,
        }
    }
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            step_secs: 30,
            digits: 6,
            window: 1,
            secret_length: 32,
            backup_code_count: 10,
            issuer: "EventShield".to_string(),
        }
    }
}

impl Default for MacConfig {
    fn default() -> Self {
        Self { max_age_ms: 300_000 }
    }
}

impl KeyLifecycleConfig {
    pub const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

    pub fn validity_ms(&self) -> u64 {
        self.validity_days.saturating_mul(Self::MILLIS_PER_DAY)
    }

    pub fn purge_grace_ms(&self) -> u64 {
        self.purge_grace_days.saturating_mul(Self::MILLIS_PER_DAY)
    }
}

impl ShieldConfig {
    /// Load and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let bits = self.rsa.key_bits;
        if !(128..=4096).contains(&bits) || bits % 2 != 0 {
            return Err(CoreError::Config(format!(
                "rsa.key_bits must be even and within 128..=4096, got {}",
                bits
            )));
        }

        if self.keys.validity_days == 0 {
            return Err(CoreError::Config(
                "keys.validity_days must be positive".to_string(),
            ));
        }

        if self.keys.mac_key_length == 0 {
            return Err(CoreError::Config(
                "keys.mac_key_length must be positive".to_string(),
            ));
        }

        if self.password.iterations == 0 {
            return Err(CoreError::Config(
                "password.iterations must be positive".to_string(),
            ));
        }

        if self.totp.step_secs == 0 {
            return Err(CoreError::Config(
                "totp.step_secs must be positive".to_string(),
            ));
        }

        if !(1..=9).contains(&self.totp.digits) {
            return Err(CoreError::Config(format!(
                "totp.digits must be within 1..=9, got {}",
                self.totp.digits
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = ShieldConfig::default();

        assert_eq!(config.rsa.key_bits, 2048);
        assert_eq!(config.keys.validity_days, 30);
        assert_eq!(config.keys.purge_grace_days, 90);
        assert_eq!(config.password.iterations, 10_000);
        assert_eq!(config.totp.step_secs, 30);
        assert_eq!(config.totp.digits, 6);
        assert_eq!(config.totp.window, 1);
        assert_eq!(config.mac.max_age_ms, 300_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ShieldConfig::from_toml_str(
            r#"
            [rsa]
            key_bits = 1024

            [totp]
            issuer = "Campus Events"
            "#,
        )
        .unwrap();

        assert_eq!(config.rsa.key_bits, 1024);
        assert_eq!(config.totp.issuer, "Campus Events");
        assert_eq!(config.totp.digits, 6);
        assert_eq!(config.password.iterations, 10_000);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(ShieldConfig::from_toml_str("[rsa]\nkey_bits = 1023").is_err());
        assert!(ShieldConfig::from_toml_str("[password]\niterations = 0").is_err());
        assert!(ShieldConfig::from_toml_str("[totp]\ndigits = 12").is_err());
        assert!(ShieldConfig::from_toml_str("[totp]\nstep_secs = 0").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mac]\nmax_age_ms = 60000").unwrap();

        let config = ShieldConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mac.max_age_ms, 60_000);
    }

    #[test]
    fn test_lifecycle_durations() {
        let keys = KeyLifecycleConfig::default();
        assert_eq!(keys.validity_ms(), 30 * 86_400_000);
        assert_eq!(keys.purge_grace_ms(), 90 * 86_400_000);
    }
}
