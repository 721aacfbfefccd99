//! SQLite implementation of the EntityStore trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Security metadata is stored
//! in its canonical CBOR form.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use delegation_kernel_core::{
    canonical_metadata_bytes, metadata_from_canonical_bytes, AccessLevel, DataOwnerId, EntityId,
    Revision, SecuredEntity,
};

use crate::error::{Result, StoreError};
use crate::index::{index_entries, level_from_i64, level_to_i64};
use crate::migration::{self, now_millis};
use crate::traits::{EntityStore, SaveOutcome};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` on the connection from the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

fn poisoned<T>(e: PoisonError<T>) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
        Some(format!("mutex poisoned: {}", e)),
    ))
}

fn encode_legacy(delegates: &BTreeSet<DataOwnerId>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(delegates, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn load_entity(conn: &Connection, id: &EntityId) -> Result<Option<SecuredEntity>> {
    let row: Option<(i64, Vec<u8>, Vec<u8>)> = conn
        .query_row(
            "SELECT rev, security_metadata, legacy_delegates FROM entities WHERE id = ?1",
            params![id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((rev, metadata, legacy)) = row else {
        return Ok(None);
    };

    let legacy_delegates: BTreeSet<DataOwnerId> = ciborium::from_reader(&legacy[..])
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Some(SecuredEntity {
        id: id.clone(),
        rev: Some(Revision(rev as u64)),
        security_metadata: metadata_from_canonical_bytes(&metadata)?,
        legacy_delegates,
    }))
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn load(&self, id: &EntityId) -> Result<Option<SecuredEntity>> {
        let id = id.clone();
        self.blocking(move |conn| load_entity(conn, &id)).await
    }

    async fn save(&self, entity: &SecuredEntity) -> Result<SaveOutcome> {
        let entity = entity.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let stored: Option<i64> = tx
                .query_row(
                    "SELECT rev FROM entities WHERE id = ?1",
                    params![entity.id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if stored.map(|r| Revision(r as u64)) != entity.rev {
                let current = load_entity(&tx, &entity.id)?;
                return Ok(SaveOutcome::Conflict { current });
            }

            let entries = index_entries(&entity.security_metadata)?;
            let metadata = canonical_metadata_bytes(&entity.security_metadata)?;
            let legacy = encode_legacy(&entity.legacy_delegates)?;
            let rev = entity.rev.map_or(Revision::FIRST, Revision::next);

            tx.execute(
                "INSERT INTO entities (id, rev, security_metadata, legacy_delegates, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    rev = excluded.rev,
                    security_metadata = excluded.security_metadata,
                    legacy_delegates = excluded.legacy_delegates,
                    updated_at = excluded.updated_at",
                params![entity.id.as_str(), rev.value() as i64, metadata, legacy, now_millis()],
            )?;

            tx.execute(
                "DELETE FROM accessor_index WHERE entity_id = ?1",
                params![entity.id.as_str()],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO accessor_index (accessor, entity_id, level) VALUES (?1, ?2, ?3)",
                )?;
                for (accessor, level) in &entries {
                    stmt.execute(params![accessor, entity.id.as_str(), level_to_i64(*level)])?;
                }
            }
            tx.commit()?;

            debug!(entity = %entity.id, %rev, accessors = entries.len(), "saved entity");
            let mut saved = entity;
            saved.rev = Some(rev);
            Ok(SaveOutcome::Saved(saved))
        })
        .await
    }

    async fn entities_accessible_by(
        &self,
        accessors: &BTreeSet<String>,
        min_level: AccessLevel,
    ) -> Result<BTreeSet<EntityId>> {
        let accessors: Vec<String> = accessors.iter().cloned().collect();
        let min_level = level_to_i64(min_level);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT entity_id FROM accessor_index WHERE accessor = ?1 AND level >= ?2",
            )?;
            let mut found = BTreeSet::new();
            for accessor in &accessors {
                let rows = stmt.query_map(params![accessor, min_level], |row| row.get::<_, String>(0))?;
                for row in rows {
                    found.insert(EntityId::new(row?));
                }
            }
            Ok(found)
        })
        .await
    }

    async fn accessors_of(&self, id: &EntityId) -> Result<BTreeMap<String, AccessLevel>> {
        let id = id.clone();

        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT accessor, level FROM accessor_index WHERE entity_id = ?1")?;
            let rows = stmt.query_map(params![id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut accessors = BTreeMap::new();
            for row in rows {
                let (accessor, level) = row?;
                let level = level_from_i64(level).ok_or_else(|| {
                    StoreError::Serialization(format!("unknown access level {}", level))
                })?;
                accessors.insert(accessor, level);
            }
            Ok(accessors)
        })
        .await
    }

    async fn list_entities(&self) -> Result<Vec<EntityId>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM entities ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .map(|id| id.map(EntityId::new))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
    }
}
