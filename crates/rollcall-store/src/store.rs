use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection};
use thiserror::Error;

use rollcall_core::{Descriptor, EnrolledIdentity, RegistryError, RegistryLoader};

use crate::codec;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("identity not found: {0}")]
    IdentityNotFound(String),
    #[error("refusing to enroll an empty descriptor for {0}")]
    EmptyDescriptor(String),
    #[error("corrupt descriptor blob for {identity_id}: {reason}")]
    CorruptDescriptor {
        identity_id: String,
        reason: String,
    },
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    identity_id  TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    descriptor   BLOB,
    updated_at   TEXT NOT NULL
);
";

/// SQLite-backed registry of enrolled identities.
///
/// Records are created without a descriptor (not yet enrolled for
/// recognition); [`enroll`](Self::enroll) attaches one to an existing
/// record, and [`remove_descriptor`](Self::remove_descriptor) clears it
/// while keeping the record, matching the enrollment write path of the
/// attendance service.
pub struct RegistryStore {
    conn: Connection,
}

impl RegistryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create or rename an identity record. Does not touch any enrolled
    /// descriptor.
    pub fn add_identity(&self, identity_id: &str, display_name: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO identities (identity_id, display_name, descriptor, updated_at)
             VALUES (?1, ?2, NULL, ?3)
             ON CONFLICT(identity_id)
             DO UPDATE SET display_name = excluded.display_name, updated_at = excluded.updated_at",
            params![identity_id, display_name, Utc::now().to_rfc3339()],
        )?;
        tracing::info!(identity_id, display_name, "identity record upserted");
        Ok(())
    }

    /// Attach a face descriptor to an existing identity.
    pub fn enroll(&self, identity_id: &str, descriptor: &Descriptor) -> Result<(), StoreError> {
        if descriptor.is_empty() {
            return Err(StoreError::EmptyDescriptor(identity_id.to_string()));
        }
        let updated = self.conn.execute(
            "UPDATE identities SET descriptor = ?2, updated_at = ?3 WHERE identity_id = ?1",
            params![
                identity_id,
                codec::encode(descriptor.values()),
                Utc::now().to_rfc3339()
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::IdentityNotFound(identity_id.to_string()));
        }
        tracing::info!(identity_id, dim = descriptor.dim(), "descriptor enrolled");
        Ok(())
    }

    /// Clear an identity's descriptor, keeping the record itself.
    pub fn remove_descriptor(&self, identity_id: &str) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE identities SET descriptor = NULL, updated_at = ?2 WHERE identity_id = ?1",
            params![identity_id, Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(StoreError::IdentityNotFound(identity_id.to_string()));
        }
        tracing::info!(identity_id, "descriptor removed");
        Ok(())
    }

    /// All identity records, ordered by id, with descriptor presence.
    pub fn list(&self) -> Result<Vec<EnrolledIdentity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT identity_id, display_name, descriptor
             FROM identities ORDER BY identity_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<Vec<u8>>>(2)?,
            ))
        })?;

        let mut identities = Vec::new();
        for row in rows {
            let (identity_id, display_name, blob) = row?;
            let descriptor = match blob {
                Some(bytes) => {
                    let values = codec::decode(&bytes).map_err(|e| {
                        StoreError::CorruptDescriptor {
                            identity_id: identity_id.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    Some(Descriptor::new(values))
                }
                None => None,
            };
            identities.push(EnrolledIdentity {
                identity_id,
                display_name,
                descriptor,
            });
        }
        Ok(identities)
    }

    /// Number of identities enrolled for recognition (non-empty
    /// descriptor).
    pub fn registered_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM identities
             WHERE descriptor IS NOT NULL AND length(descriptor) > 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl RegistryLoader for RegistryStore {
    fn load(&self) -> Result<Vec<EnrolledIdentity>, RegistryError> {
        self.list().map_err(|e| RegistryError(e.to_string()))
    }
}
