//! SQLite-backed [`KeyStore`].
//!
//! A partial unique index on `(owner_id, algorithm) WHERE status = 'active'`
//! enforces the single-active-key rule at the database level, so even two
//! processes sharing the file cannot both win an issuance race.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{lock_error, KeyError, KeyResult};
use crate::record::{KeyAlgorithm, KeyRecord, KeyStatus};
use crate::store::{check_batch, KeyStore};

const RECORD_COLUMNS: &str = "owner_id, key_id, algorithm, public_component, private_component, \
     secret_component, status, created_at, expires_at, expired_at, revoked_at";

impl ToSql for KeyAlgorithm {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for KeyAlgorithm {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: KeyError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for KeyStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for KeyStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: KeyError| FromSqlError::Other(Box::new(e)))
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<KeyRecord> {
    Ok(KeyRecord {
        owner_id: row.get(0)?,
        key_id: row.get(1)?,
        algorithm: row.get(2)?,
        public_component: row.get(3)?,
        private_component: row.get(4)?,
        secret_component: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get::<_, i64>(7)? as u64,
        expires_at: row.get::<_, i64>(8)? as u64,
        expired_at: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
        revoked_at: row.get::<_, Option<i64>>(10)?.map(|v| v as u64),
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

/// Upsert by key id. The active-key index still rejects a second active record.
fn upsert(conn: &Connection, record: &KeyRecord) -> KeyResult<()> {
    let result = conn.execute(
        r#"
        INSERT INTO key_records (
            owner_id, key_id, algorithm, public_component, private_component,
            secret_component, status, created_at, expires_at, expired_at, revoked_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(key_id) DO UPDATE SET
            owner_id = excluded.owner_id,
            algorithm = excluded.algorithm,
            public_component = excluded.public_component,
            private_component = excluded.private_component,
            secret_component = excluded.secret_component,
            status = excluded.status,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at,
            expired_at = excluded.expired_at,
            revoked_at = excluded.revoked_at
        "#,
        params![
            record.owner_id,
            record.key_id,
            record.algorithm,
            record.public_component,
            record.private_component,
            record.secret_component,
            record.status,
            record.created_at as i64,
            record.expires_at as i64,
            record.expired_at.map(|v| v as i64),
            record.revoked_at.map(|v| v as i64),
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(KeyError::DuplicateActive {
            owner_id: record.owner_id.clone(),
            algorithm: record.algorithm,
        }),
        Err(e) => Err(KeyError::Database(e)),
    }
}

fn select_active(conn: &Connection, owner_id: &str, algorithm: KeyAlgorithm) -> KeyResult<Option<KeyRecord>> {
    let sql = format!(
        "SELECT {} FROM key_records WHERE owner_id = ?1 AND algorithm = ?2 AND status = 'active'",
        RECORD_COLUMNS
    );
    let record = conn
        .query_row(&sql, params![owner_id, algorithm], record_from_row)
        .optional()?;
    Ok(record)
}

/// Durable key store over a single SQLite connection.
pub struct SqliteKeyStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyStore {
    /// Open (or create) a key database at `path`.
    pub fn open(path: impl AsRef<Path>) -> KeyResult<Self> {
        let path = path.as_ref();

        info!(path = %path.display(), "Opening key store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| KeyError::Store(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private, non-persistent database.
    pub fn open_in_memory() -> KeyResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> KeyResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS key_records (
                key_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                public_component TEXT,
                private_component TEXT,
                secret_component TEXT,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                expired_at INTEGER,
                revoked_at INTEGER
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_one_active_key
                ON key_records(owner_id, algorithm) WHERE status = 'active';
            CREATE INDEX IF NOT EXISTS idx_owner ON key_records(owner_id);
            CREATE INDEX IF NOT EXISTS idx_status_expired ON key_records(status, expired_at);
            "#,
        )?;

        Ok(())
    }
}

impl KeyStore for SqliteKeyStore {
    fn get_active(&self, owner_id: &str, algorithm: KeyAlgorithm) -> KeyResult<Option<KeyRecord>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        select_active(&conn, owner_id, algorithm)
    }

    fn put(&self, record: KeyRecord) -> KeyResult<()> {
        let conn = self.conn.lock().map_err(lock_error)?;
        upsert(&conn, &record)
    }

    fn insert_if_absent(&self, record: KeyRecord) -> KeyResult<KeyRecord> {
        let mut conn = self.conn.lock().map_err(lock_error)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = select_active(&tx, &record.owner_id, record.algorithm)? {
            return Ok(existing);
        }

        upsert(&tx, &record)?;
        tx.commit()?;

        debug!(
            owner_id = %record.owner_id,
            key_id = %record.key_id,
            algorithm = %record.algorithm,
            "Inserted key record"
        );

        Ok(record)
    }

    fn replace_active(&self, owner_id: &str, records: Vec<KeyRecord>, now_ms: u64) -> KeyResult<usize> {
        check_batch(owner_id, &records)?;

        let mut conn = self.conn.lock().map_err(lock_error)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let retired = tx.execute(
            "UPDATE key_records SET status = 'expired', expired_at = ?2 \
             WHERE owner_id = ?1 AND status = 'active'",
            params![owner_id, now_ms as i64],
        )?;

        for record in &records {
            upsert(&tx, record)?;
        }

        tx.commit()?;
        Ok(retired)
    }

    fn mark_expired(&self, key_id: &str, at_ms: u64) -> KeyResult<bool> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let changed = conn.execute(
            "UPDATE key_records SET status = 'expired', expired_at = ?2 \
             WHERE key_id = ?1 AND status = 'active'",
            params![key_id, at_ms as i64],
        )?;
        Ok(changed > 0)
    }

    fn mark_revoked(&self, key_id: &str, at_ms: u64) -> KeyResult<bool> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let changed = conn.execute(
            "UPDATE key_records SET status = 'revoked', revoked_at = ?2 WHERE key_id = ?1",
            params![key_id, at_ms as i64],
        )?;
        Ok(changed > 0)
    }

    fn get(&self, key_id: &str) -> KeyResult<Option<KeyRecord>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let sql = format!("SELECT {} FROM key_records WHERE key_id = ?1", RECORD_COLUMNS);
        let record = conn.query_row(&sql, [key_id], record_from_row).optional()?;
        Ok(record)
    }

    fn list_for_owner(&self, owner_id: &str) -> KeyResult<Vec<KeyRecord>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let sql = format!(
            "SELECT {} FROM key_records WHERE owner_id = ?1 ORDER BY created_at ASC, key_id ASC",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([owner_id], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn purge_expired_before(&self, cutoff_ms: u64) -> KeyResult<usize> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let purged = conn.execute(
            "DELETE FROM key_records WHERE status = 'expired' AND expired_at < ?1",
            params![cutoff_ms as i64],
        )?;
        Ok(purged)
    }
}
