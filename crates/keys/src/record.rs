//! Key records, bundles and their public projections.

use std::fmt;
use std::str::FromStr;

use eventshield_crypto::{EccPrivateKey, EccPublicKey, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeyError, KeyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "ECC")]
    Ecc,
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
}

impl KeyAlgorithm {
    /// The three algorithms making up a bundle, in issuance order.
    pub const ALL: [KeyAlgorithm; 3] = [KeyAlgorithm::Rsa, KeyAlgorithm::Ecc, KeyAlgorithm::HmacSha256];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ecc => "ECC",
            KeyAlgorithm::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// Prefix used in generated key ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "rsa",
            KeyAlgorithm::Ecc => "ecc",
            KeyAlgorithm::HmacSha256 => "mac",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA" => Ok(KeyAlgorithm::Rsa),
            "ECC" => Ok(KeyAlgorithm::Ecc),
            "HMAC-SHA256" => Ok(KeyAlgorithm::HmacSha256),
            other => Err(KeyError::Store(format!("unknown key algorithm {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Expired,
    Revoked,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Expired => "expired",
            KeyStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyStatus {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(KeyStatus::Active),
            "expired" => Ok(KeyStatus::Expired),
            "revoked" => Ok(KeyStatus::Revoked),
            other => Err(KeyError::Store(format!("unknown key status {:?}", other))),
        }
    }
}

/// One stored key.
///
/// RSA and ECC records carry `public_component` and `private_component`;
/// MAC records carry only `secret_component`. Components are cleared from
/// memory when the record is dropped. Timestamps are Unix milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub owner_id: String,
    pub key_id: String,
    #[zeroize(skip)]
    pub algorithm: KeyAlgorithm,
    pub public_component: Option<String>,
    pub private_component: Option<String>,
    pub secret_component: Option<String>,
    #[zeroize(skip)]
    pub status: KeyStatus,
    pub created_at: u64,
    pub expires_at: u64,
    pub expired_at: Option<u64>,
    pub revoked_at: Option<u64>,
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |c: &Option<String>| c.as_ref().map(|_| "<redacted>");
        f.debug_struct("KeyRecord")
            .field("owner_id", &self.owner_id)
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("public_component", &self.public_component)
            .field("private_component", &redact(&self.private_component))
            .field("secret_component", &redact(&self.secret_component))
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("expired_at", &self.expired_at)
            .field("revoked_at", &self.revoked_at)
            .finish()
    }
}

impl KeyRecord {
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }

    /// True once the validity window has closed.
    pub fn is_due_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// First 16 bytes of BLAKE3 over the public component, hex-encoded.
    pub fn fingerprint(&self) -> Option<String> {
        self.public_component.as_ref().map(|public| {
            let hash = blake3::hash(public.as_bytes());
            hex::encode(&hash.as_bytes()[..16])
        })
    }

    fn missing(&self) -> KeyError {
        KeyError::KeyNotFound {
            owner_id: self.owner_id.clone(),
            algorithm: self.algorithm,
        }
    }

    fn component<'a>(&self, component: &'a Option<String>, wanted: KeyAlgorithm) -> KeyResult<&'a str> {
        if self.algorithm != wanted {
            return Err(self.missing());
        }
        component.as_deref().ok_or_else(|| self.missing())
    }

    pub fn rsa_public(&self) -> KeyResult<RsaPublicKey> {
        Ok(RsaPublicKey::from_json(self.component(&self.public_component, KeyAlgorithm::Rsa)?)?)
    }

    pub fn rsa_private(&self) -> KeyResult<RsaPrivateKey> {
        Ok(RsaPrivateKey::from_json(self.component(&self.private_component, KeyAlgorithm::Rsa)?)?)
    }

    pub fn ecc_public(&self) -> KeyResult<EccPublicKey> {
        Ok(EccPublicKey::from_json(self.component(&self.public_component, KeyAlgorithm::Ecc)?)?)
    }

    pub fn ecc_private(&self) -> KeyResult<EccPrivateKey> {
        Ok(EccPrivateKey::from_hex(self.component(&self.private_component, KeyAlgorithm::Ecc)?)?)
    }

    pub fn mac_secret(&self) -> KeyResult<&str> {
        self.component(&self.secret_component, KeyAlgorithm::HmacSha256)
    }
}

/// The active RSA, ECC and MAC records of one owner.
#[derive(Debug, Clone)]
pub struct KeyBundle {
    pub rsa: KeyRecord,
    pub ecc: KeyRecord,
    pub mac: KeyRecord,
}

impl KeyBundle {
    pub fn owner_id(&self) -> &str {
        &self.rsa.owner_id
    }

    pub fn records(&self) -> [&KeyRecord; 3] {
        [&self.rsa, &self.ecc, &self.mac]
    }

    pub fn key_ids(&self) -> [&str; 3] {
        [&self.rsa.key_id, &self.ecc.key_id, &self.mac.key_id]
    }
}

/// A shareable view of one active public key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyInfo {
    pub key_id: String,
    pub algorithm: KeyAlgorithm,
    pub public_key: serde_json::Value,
    pub fingerprint: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl PublicKeyInfo {
    pub fn from_record(record: &KeyRecord) -> KeyResult<Option<Self>> {
        let (Some(public), Some(fingerprint)) = (&record.public_component, record.fingerprint()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            key_id: record.key_id.clone(),
            algorithm: record.algorithm,
            public_key: serde_json::from_str(public)?,
            fingerprint,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }))
    }
}

/// Active public keys of one owner, grouped by algorithm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedPublicKeys {
    pub rsa_keys: Vec<PublicKeyInfo>,
    pub ecc_keys: Vec<PublicKeyInfo>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn record(owner: &str, key_id: &str, algorithm: KeyAlgorithm, created_at: u64) -> KeyRecord {
        KeyRecord {
            owner_id: owner.to_string(),
            key_id: key_id.to_string(),
            algorithm,
            public_component: match algorithm {
                KeyAlgorithm::HmacSha256 => None,
                _ => Some(format!("{{\"id\":\"{}\"}}", key_id)),
            },
            private_component: match algorithm {
                KeyAlgorithm::HmacSha256 => None,
                _ => Some("private".to_string()),
            },
            secret_component: match algorithm {
                KeyAlgorithm::HmacSha256 => Some("secret".to_string()),
                _ => None,
            },
            status: KeyStatus::Active,
            created_at,
            expires_at: created_at + 1_000,
            expired_at: None,
            revoked_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;

    #[test]
    fn test_algorithm_wire_names() {
        assert_eq!(serde_json::to_string(&KeyAlgorithm::HmacSha256).unwrap(), "\"HMAC-SHA256\"");
        assert_eq!(serde_json::to_string(&KeyStatus::Revoked).unwrap(), "\"revoked\"");
        for algorithm in KeyAlgorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<KeyAlgorithm>().unwrap(), algorithm);
        }
        assert!("DSA".parse::<KeyAlgorithm>().is_err());
        assert_eq!("expired".parse::<KeyStatus>().unwrap(), KeyStatus::Expired);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mac = record("alice", "mac_1", KeyAlgorithm::HmacSha256, 0);
        let rsa = record("alice", "rsa_1", KeyAlgorithm::Rsa, 0);

        let rendered = format!("{:?} {:?}", mac, rsa);
        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("\"private\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_fingerprint() {
        let rsa = record("alice", "rsa_1", KeyAlgorithm::Rsa, 0);
        let fingerprint = rsa.fingerprint().unwrap();

        assert_eq!(fingerprint.len(), 32);
        assert_eq!(rsa.fingerprint(), rsa.clone().fingerprint());
        assert!(record("alice", "mac_1", KeyAlgorithm::HmacSha256, 0).fingerprint().is_none());
    }

    #[test]
    fn test_component_accessors_check_algorithm() {
        let mac = record("alice", "mac_1", KeyAlgorithm::HmacSha256, 0);
        assert_eq!(mac.mac_secret().unwrap(), "secret");
        assert!(matches!(
            mac.rsa_public(),
            Err(KeyError::KeyNotFound { algorithm: KeyAlgorithm::HmacSha256, .. })
        ));

        let mut ecc = record("alice", "ecc_1", KeyAlgorithm::Ecc, 0);
        ecc.private_component = None;
        assert!(matches!(ecc.ecc_private(), Err(KeyError::KeyNotFound { .. })));
    }

    #[test]
    fn test_secret_borrow_outlives_other_reads() {
        let mac = record("alice", "mac_1", KeyAlgorithm::HmacSha256, 0);
        let secret = mac.mac_secret().unwrap();

        assert!(mac.fingerprint().is_none());
        assert!(mac.is_active());
        assert_eq!(secret, mac.secret_component.as_deref().unwrap());
    }

    #[test]
    fn test_due_at_boundary() {
        let rsa = record("alice", "rsa_1", KeyAlgorithm::Rsa, 0);
        assert!(!rsa.is_due_at(999));
        assert!(rsa.is_due_at(1_000));
    }

    #[test]
    fn test_record_json_is_camel_case() {
        let value = serde_json::to_value(record("bob", "ecc_9", KeyAlgorithm::Ecc, 5)).unwrap();
        assert_eq!(value["ownerId"], "bob");
        assert_eq!(value["algorithm"], "ECC");
        assert_eq!(value["status"], "active");
        assert_eq!(value["expiresAt"], 1_005);
    }
}
