//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Assetgrep store.

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- The harvested corpus, one row per asset
CREATE TABLE IF NOT EXISTS corpus_assets (
    game_id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    description TEXT NOT NULL,
    link TEXT NOT NULL,
    thumb_url TEXT NOT NULL,
    inv_popularity INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_corpus_assets_position ON corpus_assets(position);

-- Key/value metadata such as the corpus update time
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Compressed bundles such as the prebuilt search index
CREATE TABLE IF NOT EXISTS archives (
    name TEXT PRIMARY KEY,
    payload BLOB NOT NULL,
    sha256 TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Metadata key holding the corpus update time (RFC 3339)
pub const CORPUS_UPDATED_AT: &str = "corpus_updated_at";

/// Initializes the database schema
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
