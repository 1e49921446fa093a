//! Key Lifecycle Manager
//!
//! Issues, rotates, revokes and purges per-owner key bundles. A bundle is one
//! active RSA, ECC and HMAC-SHA256 record per owner; records are valid for a
//! fixed window from issuance and are retained for a grace period after they
//! expire.
//!
//! Issuance is check-then-act, so every operation that may create records for
//! an owner runs under that owner's lease, and the final write goes through
//! the store's atomic `insert_if_absent` / `replace_active`. Either alone is
//! enough to keep a single active record per algorithm inside one process;
//! the store-level guarantee also covers several processes sharing a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use eventshield_core::{Clock, KeyLifecycleConfig, ShieldConfig};
use eventshield_crypto::{ecc, rsa};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::{lock_error, KeyError, KeyResult};
use crate::record::{
    ExportedPublicKeys, KeyAlgorithm, KeyBundle, KeyRecord, KeyStatus, PublicKeyInfo,
};
use crate::store::KeyStore;

const KEY_ID_SUFFIX_LEN: usize = 9;
const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `<prefix>_<createdAtMillis>_<9 base36 chars>`
fn generate_key_id<R: RngCore + ?Sized>(algorithm: KeyAlgorithm, now_ms: u64, rng: &mut R) -> String {
    let suffix: String = (0..KEY_ID_SUFFIX_LEN)
        .map(|_| BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())] as char)
        .collect();
    format!("{}_{}_{}", algorithm.id_prefix(), now_ms, suffix)
}

fn generate_mac_secret<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}

pub struct KeyLifecycleManager {
    store: Arc<dyn KeyStore>,
    clock: Arc<dyn Clock>,
    config: KeyLifecycleConfig,
    rsa_bits: u32,
    rng: Mutex<StdRng>,
    leases: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLifecycleManager {
    /// Manager seeded from OS entropy.
    pub fn new(store: Arc<dyn KeyStore>, clock: Arc<dyn Clock>, config: &ShieldConfig) -> Self {
        Self::with_rng(store, clock, config, StdRng::from_entropy())
    }

    /// Manager with an explicit generator, for reproducible tests.
    pub fn with_rng(
        store: Arc<dyn KeyStore>,
        clock: Arc<dyn Clock>,
        config: &ShieldConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            clock,
            config: config.keys.clone(),
            rsa_bits: config.rsa.key_bits,
            rng: Mutex::new(rng),
            leases: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    pub fn config(&self) -> &KeyLifecycleConfig {
        &self.config
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Split off a generator so key generation does not hold the shared lock.
    fn child_rng(&self) -> KeyResult<StdRng> {
        let mut parent = self.rng.lock().map_err(lock_error)?;
        StdRng::from_rng(&mut *parent).map_err(|e| KeyError::Store(format!("RNG error: {}", e)))
    }

    /// Run `f` while holding the owner's lease. The entry is dropped from the
    /// map once no other caller holds or waits on it.
    fn with_lease<T>(&self, owner_id: &str, f: impl FnOnce() -> KeyResult<T>) -> KeyResult<T> {
        let lease = {
            let mut leases = self.leases.lock().map_err(lock_error)?;
            leases.entry(owner_id.to_string()).or_default().clone()
        };

        let result = lease.lock().map_err(lock_error).and_then(|_guard| f());

        let mut leases = self.leases.lock().map_err(lock_error)?;
        // Map entry plus ours
        if Arc::strong_count(&lease) == 2 {
            leases.remove(owner_id);
        }
        result
    }

    fn issue_record<R: RngCore + ?Sized>(
        &self,
        owner_id: &str,
        algorithm: KeyAlgorithm,
        now_ms: u64,
        rng: &mut R,
    ) -> KeyResult<KeyRecord> {
        let key_id = generate_key_id(algorithm, now_ms, rng);

        let (public_component, private_component, secret_component) = match algorithm {
            KeyAlgorithm::Rsa => {
                let pair = rsa::generate_key_pair(self.rsa_bits, rng)?;
                (Some(pair.public.to_json()?), Some(pair.private.to_json()?), None)
            }
            KeyAlgorithm::Ecc => {
                let pair = ecc::generate_key_pair(rng)?;
                (Some(pair.public.to_json()?), Some(pair.private.to_hex()), None)
            }
            KeyAlgorithm::HmacSha256 => {
                (None, None, Some(generate_mac_secret(rng, self.config.mac_key_length)))
            }
        };

        debug!(
            owner_id = %owner_id,
            key_id = %key_id,
            algorithm = %algorithm,
            "Generated key material"
        );

        Ok(KeyRecord {
            owner_id: owner_id.to_string(),
            key_id,
            algorithm,
            public_component,
            private_component,
            secret_component,
            status: KeyStatus::Active,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(self.config.validity_ms()),
            expired_at: None,
            revoked_at: None,
        })
    }

    fn issue_bundle_records(&self, owner_id: &str, now_ms: u64) -> KeyResult<Vec<KeyRecord>> {
        let mut rng = self.child_rng()?;
        KeyAlgorithm::ALL
            .iter()
            .map(|algorithm| self.issue_record(owner_id, *algorithm, now_ms, &mut rng))
            .collect()
    }

    fn bundle_from(owner_id: &str, mut records: Vec<KeyRecord>) -> KeyResult<KeyBundle> {
        let mut take = |algorithm: KeyAlgorithm| -> KeyResult<KeyRecord> {
            match records.iter().position(|r| r.algorithm == algorithm) {
                Some(i) => Ok(records.swap_remove(i)),
                None => Err(KeyError::KeyNotFound {
                    owner_id: owner_id.to_string(),
                    algorithm,
                }),
            }
        };

        Ok(KeyBundle {
            rsa: take(KeyAlgorithm::Rsa)?,
            ecc: take(KeyAlgorithm::Ecc)?,
            mac: take(KeyAlgorithm::HmacSha256)?,
        })
    }

    /// The owner's active bundle, without issuing anything.
    pub fn active_bundle(&self, owner_id: &str) -> KeyResult<KeyBundle> {
        let records = KeyAlgorithm::ALL
            .iter()
            .map(|algorithm| {
                self.store
                    .get_active(owner_id, *algorithm)?
                    .ok_or_else(|| KeyError::KeyNotFound {
                        owner_id: owner_id.to_string(),
                        algorithm: *algorithm,
                    })
            })
            .collect::<KeyResult<Vec<_>>>()?;

        Self::bundle_from(owner_id, records)
    }

    /// The owner's active bundle, issuing whichever records are missing.
    pub fn get_or_issue_bundle(&self, owner_id: &str) -> KeyResult<KeyBundle> {
        self.with_lease(owner_id, || self.fill_bundle(owner_id))
    }

    fn fill_bundle(&self, owner_id: &str) -> KeyResult<KeyBundle> {
        let mut records = Vec::with_capacity(KeyAlgorithm::ALL.len());
        let mut rng = self.child_rng()?;

        for algorithm in KeyAlgorithm::ALL {
            if let Some(existing) = self.store.get_active(owner_id, algorithm)? {
                records.push(existing);
                continue;
            }

            let now_ms = self.clock.now_millis();
            let candidate = self.issue_record(owner_id, algorithm, now_ms, &mut rng)?;
            let candidate_id = candidate.key_id.clone();
            let stored = self.store.insert_if_absent(candidate)?;

            if stored.key_id == candidate_id {
                info!(
                    owner_id = %owner_id,
                    key_id = %stored.key_id,
                    algorithm = %algorithm,
                    expires_at = stored.expires_at,
                    "Issued key"
                );
            }
            records.push(stored);
        }

        Self::bundle_from(owner_id, records)
    }

    fn rotate_locked(&self, owner_id: &str) -> KeyResult<KeyBundle> {
        let now_ms = self.clock.now_millis();
        let records = self.issue_bundle_records(owner_id, now_ms)?;
        let retired = self.store.replace_active(owner_id, records.clone(), now_ms)?;

        let bundle = Self::bundle_from(owner_id, records)?;
        info!(
            owner_id = %owner_id,
            retired,
            rsa_key_id = %bundle.rsa.key_id,
            ecc_key_id = %bundle.ecc.key_id,
            mac_key_id = %bundle.mac.key_id,
            "Rotated key bundle"
        );

        Ok(bundle)
    }

    /// Expire every active record of the owner and issue a fresh bundle.
    pub fn rotate(&self, owner_id: &str) -> KeyResult<KeyBundle> {
        self.with_lease(owner_id, || self.rotate_locked(owner_id))
    }

    /// Rotate only if some algorithm has no active record or its record has
    /// passed `expires_at`. Returns the new bundle when a rotation happened.
    pub fn rotate_if_due(&self, owner_id: &str) -> KeyResult<Option<KeyBundle>> {
        self.with_lease(owner_id, || self.rotate_if_due_locked(owner_id))
    }

    fn rotate_if_due_locked(&self, owner_id: &str) -> KeyResult<Option<KeyBundle>> {
        let now_ms = self.clock.now_millis();
        let mut due = false;
        for algorithm in KeyAlgorithm::ALL {
            match self.store.get_active(owner_id, algorithm)? {
                Some(record) if !record.is_due_at(now_ms) => {}
                _ => {
                    due = true;
                    break;
                }
            }
        }

        if !due {
            return Ok(None);
        }
        self.rotate_locked(owner_id).map(Some)
    }

    /// Look up any record by id, whatever its status.
    pub fn key(&self, key_id: &str) -> KeyResult<KeyRecord> {
        self.store
            .get(key_id)?
            .ok_or_else(|| KeyError::UnknownKey {
                key_id: key_id.to_string(),
            })
    }

    /// True if the key is unknown or its validity window has closed.
    pub fn needs_rotation(&self, key_id: &str) -> KeyResult<bool> {
        Ok(match self.store.get(key_id)? {
            Some(record) => record.is_due_at(self.clock.now_millis()),
            None => true,
        })
    }

    /// Revoke a key in any state. Returns false if the key is unknown.
    pub fn revoke_key(&self, key_id: &str) -> KeyResult<bool> {
        let revoked = self.store.mark_revoked(key_id, self.clock.now_millis())?;
        if revoked {
            info!(key_id = %key_id, "Revoked key");
        } else {
            warn!(key_id = %key_id, "Revocation requested for unknown key");
        }
        Ok(revoked)
    }

    /// Active RSA and ECC public keys of an owner.
    pub fn export_public_keys(&self, owner_id: &str) -> KeyResult<ExportedPublicKeys> {
        let mut exported = ExportedPublicKeys::default();

        for record in self.store.list_for_owner(owner_id)? {
            if !record.is_active() {
                continue;
            }
            let target = match record.algorithm {
                KeyAlgorithm::Rsa => &mut exported.rsa_keys,
                KeyAlgorithm::Ecc => &mut exported.ecc_keys,
                KeyAlgorithm::HmacSha256 => continue,
            };
            if let Some(info) = PublicKeyInfo::from_record(&record)? {
                target.push(info);
            }
        }

        Ok(exported)
    }

    /// Delete expired records older than the grace period. Returns how many were removed.
    pub fn purge_expired(&self) -> KeyResult<usize> {
        let cutoff = self
            .clock
            .now_millis()
            .saturating_sub(self.config.purge_grace_ms());
        let purged = self.store.purge_expired_before(cutoff)?;

        if purged > 0 {
            info!(purged, cutoff, "Purged expired keys");
        }
        Ok(purged)
    }
}
