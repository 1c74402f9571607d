//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the DurableStore trait.

use crate::model::Asset;
use crate::storage::archive;
use crate::storage::schema::{initialize_schema, CORPUS_UPDATED_AT};
use crate::storage::traits::{DurableStore, StorageError, StorageResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the store at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl DurableStore for SqliteStore {
    // ===== Corpus =====

    fn put_corpus(&self, assets: &[Asset]) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM corpus_assets", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO corpus_assets
                 (game_id, position, title, author, description, link, thumb_url, inv_popularity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(game_id) DO UPDATE SET
                    title = excluded.title,
                    author = excluded.author,
                    description = excluded.description,
                    link = excluded.link,
                    thumb_url = excluded.thumb_url,
                    inv_popularity = excluded.inv_popularity",
            )?;

            for (position, asset) in assets.iter().enumerate() {
                stmt.execute(params![
                    asset.game_id,
                    position as i64,
                    asset.title,
                    asset.author,
                    asset.description,
                    asset.link,
                    asset.thumb_url,
                    asset.inv_popularity,
                ])?;
            }
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        tx.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![CORPUS_UPDATED_AT, now],
        )?;

        tx.commit()?;
        tracing::debug!("Stored corpus of {} assets", assets.len());
        Ok(())
    }

    fn get_corpus(&self) -> StorageResult<Vec<Asset>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT game_id, title, author, description, link, thumb_url, inv_popularity
             FROM corpus_assets ORDER BY position",
        )?;

        let assets = stmt
            .query_map([], |row| {
                Ok(Asset {
                    game_id: row.get(0)?,
                    title: row.get(1)?,
                    author: row.get(2)?,
                    description: row.get(3)?,
                    link: row.get(4)?,
                    thumb_url: row.get(5)?,
                    inv_popularity: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(assets)
    }

    fn corpus_update_time(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![CORPUS_UPDATED_AT],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|_| StorageError::InvalidTimestamp(raw))
            })
            .transpose()
    }

    // ===== Archives =====

    fn put_archive(&self, source: &Path, name: &str) -> StorageResult<()> {
        let payload = archive::pack(source)?;
        let digest = sha256_hex(&payload);
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO archives (name, payload, sha256, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                payload = excluded.payload,
                sha256 = excluded.sha256,
                created_at = excluded.created_at",
            params![name, payload, digest, now],
        )?;

        tracing::debug!(
            "Stored archive {} ({} bytes, sha256 {})",
            name,
            payload.len(),
            digest
        );
        Ok(())
    }

    fn get_archive(&self, name: &str, dest_dir: &Path) -> StorageResult<PathBuf> {
        let row: Option<(Vec<u8>, String)> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT payload, sha256 FROM archives WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        let (payload, expected) =
            row.ok_or_else(|| StorageError::ArchiveNotFound(name.to_string()))?;

        let actual = sha256_hex(&payload);
        if actual != expected {
            return Err(StorageError::Integrity {
                name: name.to_string(),
                expected,
                actual,
            });
        }

        archive::unpack(&payload, dest_dir)
    }
}
