//! Key persistence boundary.
//!
//! [`KeyStore`] is the only thing the lifecycle manager knows about storage.
//! Every backend must make `insert_if_absent` and `replace_active` atomic
//! with respect to the "one active record per (owner, algorithm)" rule, so
//! concurrent issuance for the same owner can never leave duplicates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{lock_error, KeyError, KeyResult};
use crate::record::{KeyAlgorithm, KeyRecord, KeyStatus};

pub trait KeyStore: Send + Sync {
    /// The active record for `(owner_id, algorithm)`, if any.
    fn get_active(&self, owner_id: &str, algorithm: KeyAlgorithm) -> KeyResult<Option<KeyRecord>>;

    /// Insert or overwrite a record by key id.
    ///
    /// Fails with [`KeyError::DuplicateActive`] if the record is active and
    /// a different active record already exists for the same owner and algorithm.
    fn put(&self, record: KeyRecord) -> KeyResult<()>;

    /// Insert `record` unless an active record for its owner and algorithm
    /// exists. Returns whichever record is active afterwards.
    fn insert_if_absent(&self, record: KeyRecord) -> KeyResult<KeyRecord>;

    /// Expire every active record of `owner_id` at `now_ms` and insert
    /// `records` in the same step. Returns the number of records retired.
    fn replace_active(&self, owner_id: &str, records: Vec<KeyRecord>, now_ms: u64) -> KeyResult<usize>;

    /// Move an active record to `expired`. Returns false if no active record has that id.
    fn mark_expired(&self, key_id: &str, at_ms: u64) -> KeyResult<bool>;

    /// Move a record in any state to `revoked`. Returns false if the id is unknown.
    fn mark_revoked(&self, key_id: &str, at_ms: u64) -> KeyResult<bool>;

    fn get(&self, key_id: &str) -> KeyResult<Option<KeyRecord>>;

    /// All records of an owner, oldest first.
    fn list_for_owner(&self, owner_id: &str) -> KeyResult<Vec<KeyRecord>>;

    /// Delete `expired` records whose `expired_at` is before `cutoff_ms`.
    fn purge_expired_before(&self, cutoff_ms: u64) -> KeyResult<usize>;
}

/// Reject a batch that would put two active records on one (owner, algorithm).
pub(crate) fn check_batch(owner_id: &str, records: &[KeyRecord]) -> KeyResult<()> {
    let mut seen = Vec::with_capacity(records.len());
    for record in records {
        if record.owner_id != owner_id {
            return Err(KeyError::Store(format!(
                "record {} belongs to {}, not {}",
                record.key_id, record.owner_id, owner_id
            )));
        }
        if record.is_active() {
            if seen.contains(&record.algorithm) {
                return Err(KeyError::DuplicateActive {
                    owner_id: owner_id.to_string(),
                    algorithm: record.algorithm,
                });
            }
            seen.push(record.algorithm);
        }
    }
    Ok(())
}

/// In-process store keyed by key id.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    records: Arc<RwLock<HashMap<String, KeyRecord>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> KeyResult<usize> {
        Ok(self.records.read().map_err(lock_error)?.len())
    }

    pub fn is_empty(&self) -> KeyResult<bool> {
        Ok(self.len()? == 0)
    }

    fn find_active<'a>(
        records: &'a HashMap<String, KeyRecord>,
        owner_id: &str,
        algorithm: KeyAlgorithm,
    ) -> Option<&'a KeyRecord> {
        records
            .values()
            .find(|r| r.is_active() && r.owner_id == owner_id && r.algorithm == algorithm)
    }
}

impl KeyStore for MemoryKeyStore {
    fn get_active(&self, owner_id: &str, algorithm: KeyAlgorithm) -> KeyResult<Option<KeyRecord>> {
        let records = self.records.read().map_err(lock_error)?;
        Ok(Self::find_active(&records, owner_id, algorithm).cloned())
    }

    fn put(&self, record: KeyRecord) -> KeyResult<()> {
        let mut records = self.records.write().map_err(lock_error)?;

        if record.is_active() {
            if let Some(existing) = Self::find_active(&records, &record.owner_id, record.algorithm) {
                if existing.key_id != record.key_id {
                    return Err(KeyError::DuplicateActive {
                        owner_id: record.owner_id.clone(),
                        algorithm: record.algorithm,
                    });
                }
            }
        }

        records.insert(record.key_id.clone(), record);
        Ok(())
    }

    fn insert_if_absent(&self, record: KeyRecord) -> KeyResult<KeyRecord> {
        let mut records = self.records.write().map_err(lock_error)?;

        if let Some(existing) = Self::find_active(&records, &record.owner_id, record.algorithm) {
            return Ok(existing.clone());
        }

        records.insert(record.key_id.clone(), record.clone());
        Ok(record)
    }

    fn replace_active(&self, owner_id: &str, new_records: Vec<KeyRecord>, now_ms: u64) -> KeyResult<usize> {
        check_batch(owner_id, &new_records)?;

        let mut records = self.records.write().map_err(lock_error)?;

        let mut retired = 0;
        for record in records.values_mut() {
            if record.owner_id == owner_id && record.is_active() {
                record.status = KeyStatus::Expired;
                record.expired_at = Some(now_ms);
                retired += 1;
            }
        }

        for record in new_records {
            records.insert(record.key_id.clone(), record);
        }

        Ok(retired)
    }

    fn mark_expired(&self, key_id: &str, at_ms: u64) -> KeyResult<bool> {
        let mut records = self.records.write().map_err(lock_error)?;

        match records.get_mut(key_id) {
            Some(record) if record.is_active() => {
                record.status = KeyStatus::Expired;
                record.expired_at = Some(at_ms);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn mark_revoked(&self, key_id: &str, at_ms: u64) -> KeyResult<bool> {
        let mut records = self.records.write().map_err(lock_error)?;

        match records.get_mut(key_id) {
            Some(record) => {
                record.status = KeyStatus::Revoked;
                record.revoked_at = Some(at_ms);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get(&self, key_id: &str) -> KeyResult<Option<KeyRecord>> {
        let records = self.records.read().map_err(lock_error)?;
        Ok(records.get(key_id).cloned())
    }

    fn list_for_owner(&self, owner_id: &str) -> KeyResult<Vec<KeyRecord>> {
        let records = self.records.read().map_err(lock_error)?;

        let mut owned: Vec<KeyRecord> = records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.key_id.cmp(&b.key_id))
        });

        Ok(owned)
    }

    fn purge_expired_before(&self, cutoff_ms: u64) -> KeyResult<usize> {
        let mut records = self.records.write().map_err(lock_error)?;

        let before = records.len();
        records.retain(|_, r| {
            !(r.status == KeyStatus::Expired && r.expired_at.map_or(false, |at| at < cutoff_ms))
        });

        Ok(before - records.len())
    }
}
