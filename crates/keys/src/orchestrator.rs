//! Encryption Orchestrator
//!
//! Layered envelope encryption over an owner's key bundle:
//!
//! 1. Render the payload (strings raw, anything else as JSON)
//! 2. RSA chunked encryption with the bundle's RSA public key
//! 3. ECC chunked encryption of the RSA output with the ECC public key
//! 4. HMAC-SHA256 of the final ciphertext with the bundle's MAC secret
//!
//! Decryption verifies the MAC first and fails closed on a mismatch. An
//! empty MAC skips verification entirely; existing callers rely on that, so
//! it is kept and logged at `warn`.
//!
//! RSA blocks travel as integers, so a NUL at the start of a block is lost:
//! a raw string payload beginning with `\0` decrypts without it.

use std::sync::{Arc, Mutex};

use eventshield_crypto::mac::{self, canonical_message};
use eventshield_crypto::{ecc, rsa};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{lock_error, KeyError, KeyResult};
use crate::lifecycle::KeyLifecycleManager;
use crate::record::KeyBundle;

/// Ciphertext plus the MAC binding it to the owner's MAC key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub ciphertext: String,
    pub mac: String,
}

/// Encrypt `payload` under an explicit bundle.
pub fn encrypt_with_bundle<T, R>(payload: &T, bundle: &KeyBundle, rng: &mut R) -> KeyResult<Envelope>
where
    T: Serialize + ?Sized,
    R: RngCore + ?Sized,
{
    let plaintext = Zeroizing::new(canonical_message(payload)?);

    let rsa_layer = rsa::encrypt_long(&plaintext, &bundle.rsa.rsa_public()?)?;
    let ciphertext = ecc::encrypt_long(&rsa_layer, &bundle.ecc.ecc_public()?, rng)?;
    let mac = mac::generate_hmac(&ciphertext, bundle.mac.mac_secret()?);

    debug!(
        owner_id = %bundle.owner_id(),
        ciphertext_len = ciphertext.len(),
        "Encrypted payload"
    );

    Ok(Envelope { ciphertext, mac })
}

/// Decrypt an envelope under an explicit bundle.
///
/// Returns the parsed JSON value when the plaintext is valid JSON, otherwise
/// the plaintext as a JSON string.
pub fn decrypt_with_bundle(ciphertext: &str, mac: &str, bundle: &KeyBundle) -> KeyResult<Value> {
    if mac.is_empty() {
        warn!(
            owner_id = %bundle.owner_id(),
            "Decrypting envelope without MAC; integrity not verified"
        );
    } else if !mac::verify_hmac(ciphertext, mac, bundle.mac.mac_secret()?) {
        warn!(owner_id = %bundle.owner_id(), "Envelope MAC mismatch");
        return Err(KeyError::Integrity);
    }

    let rsa_layer = ecc::decrypt_long(ciphertext, &bundle.ecc.ecc_private()?)?;
    let plaintext = Zeroizing::new(rsa::decrypt_long(&rsa_layer, &bundle.rsa.rsa_private()?)?);

    Ok(serde_json::from_str(&plaintext).unwrap_or_else(|_| Value::String(plaintext.to_string())))
}

/// HMAC-SHA256 over the rendered form of `data`.
pub fn generate_data_mac<T: Serialize + ?Sized>(data: &T, key: &str) -> KeyResult<String> {
    Ok(mac::generate_hmac_json(data, key)?)
}

pub fn verify_data_mac<T: Serialize + ?Sized>(data: &T, mac: &str, key: &str) -> KeyResult<bool> {
    Ok(mac::verify_hmac_json(data, mac, key)?)
}

/// Owner-scoped envelope encryption backed by a [`KeyLifecycleManager`].
pub struct EncryptionOrchestrator {
    keys: Arc<KeyLifecycleManager>,
    rng: Mutex<StdRng>,
}

impl EncryptionOrchestrator {
    pub fn new(keys: Arc<KeyLifecycleManager>) -> Self {
        Self::with_rng(keys, StdRng::from_entropy())
    }

    pub fn with_rng(keys: Arc<KeyLifecycleManager>, rng: StdRng) -> Self {
        Self {
            keys,
            rng: Mutex::new(rng),
        }
    }

    pub fn keys(&self) -> &Arc<KeyLifecycleManager> {
        &self.keys
    }

    /// Seed a per-call generator so encryption runs outside the shared lock.
    fn child_rng(&self) -> KeyResult<StdRng> {
        let mut parent = self.rng.lock().map_err(lock_error)?;
        StdRng::from_rng(&mut *parent).map_err(|e| KeyError::Store(format!("RNG error: {}", e)))
    }

    /// Encrypt for `owner_id`, issuing a bundle first if the owner has none.
    pub fn encrypt<T: Serialize + ?Sized>(&self, payload: &T, owner_id: &str) -> KeyResult<Envelope> {
        let bundle = self.keys.get_or_issue_bundle(owner_id)?;
        let mut rng = self.child_rng()?;
        encrypt_with_bundle(payload, &bundle, &mut rng)
    }

    /// Decrypt with the owner's active bundle. Never issues keys.
    pub fn decrypt(&self, ciphertext: &str, mac: &str, owner_id: &str) -> KeyResult<Value> {
        let bundle = self.keys.active_bundle(owner_id)?;
        decrypt_with_bundle(ciphertext, mac, &bundle)
    }

    /// [`generate_data_mac`] with the owner's active MAC key.
    pub fn mac_for_owner<T: Serialize + ?Sized>(&self, data: &T, owner_id: &str) -> KeyResult<String> {
        let bundle = self.keys.active_bundle(owner_id)?;
        generate_data_mac(data, bundle.mac.mac_secret()?)
    }

    pub fn verify_for_owner<T: Serialize + ?Sized>(&self, data: &T, mac: &str, owner_id: &str) -> KeyResult<bool> {
        let bundle = self.keys.active_bundle(owner_id)?;
        verify_data_mac(data, mac, bundle.mac.mac_secret()?)
    }
}
