//! Durable Entry Store
//!
//! The authoritative, persistent side of the cache: a logical table of
//! [`CacheEntry`] rows that survives restarts and is the single source of
//! truth for cached content. The in-memory similarity index is a derived
//! projection rebuilt from here on startup.
//!
//! The [`EntryStore`] trait keeps the backend interchangeable; the crate
//! ships [`SqliteStore`] (embedded SQLite via rusqlite). A networked
//! relational backend would implement the same contract rather than
//! duplicating cache logic.
//!
//! Embeddings cross the trait boundary as `Vec<f32>`; on disk they are the
//! versioned binary blobs produced by [`crate::codec`], which SQLite never
//! interprets.

use crate::codec::{decode_embedding, encode_embedding};
use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// SQLite schema for the cache table, applied idempotently on open.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS semantic_cache (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    query_hash   TEXT NOT NULL,
    query        TEXT NOT NULL,
    response     TEXT NOT NULL,
    embedding    BLOB NOT NULL,
    model_source TEXT NOT NULL,
    hit_count    INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_semantic_cache_query_hash
    ON semantic_cache (query_hash);
";

/// A stored cache row: one answered query with its embedding and bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Store-assigned monotonic identifier, never reused
    pub id: i64,
    /// Digest of the normalized query text, used by the exact tier
    pub query_hash: String,
    /// Original query text, stored verbatim for inspection
    pub query: String,
    /// Cached answer text
    pub response: String,
    /// Unit-norm query embedding
    pub embedding: Vec<f32>,
    /// Opaque tag for the upstream model that produced `response`.
    /// Carried for caller-side invalidation; never inspected for hit
    /// eligibility.
    pub model_source: String,
    /// Number of lookups this entry has answered (exact or semantic)
    pub hit_count: u64,
}

/// Fields of a not-yet-persisted entry, passed to [`EntryStore::insert`].
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    /// Digest of the normalized query text
    pub query_hash: &'a str,
    /// Original query text
    pub query: &'a str,
    /// Answer text to cache
    pub response: &'a str,
    /// Unit-norm query embedding
    pub embedding: &'a [f32],
    /// Opaque upstream-model tag
    pub model_source: &'a str,
}

/// Durable storage capability backing the cache.
///
/// Implementations must make each call atomic with respect to concurrent
/// readers: no reader observes a row with some fields populated and others
/// pending. Beyond that, no cross-call locking is required of the backend.
pub trait EntryStore: Send + Sync {
    /// Persist a new entry and return its assigned id.
    ///
    /// On error, no partial write may be visible to later reads.
    fn insert(&self, entry: NewEntry<'_>) -> Result<i64>;

    /// Exact-tier lookup by query digest.
    ///
    /// `query_hash` is not constrained unique by the schema; if duplicates
    /// exist (racing writers on the same new query), the earliest row wins.
    fn find_by_hash(&self, query_hash: &str) -> Result<Option<CacheEntry>>;

    /// Point lookup by id, used to hydrate a semantic-tier hit.
    fn find_by_id(&self, id: i64) -> Result<Option<CacheEntry>>;

    /// Increment an entry's hit counter.
    ///
    /// The cache controller treats failures here as non-fatal; this method
    /// still reports them so the controller can log the degradation.
    fn increment_hits(&self, id: i64) -> Result<()>;

    /// All `(id, embedding)` pairs in ascending insertion order.
    ///
    /// Used once at startup to rebuild the similarity index. An empty store
    /// yields an empty vec, not an error.
    ///
    /// Deliberately materialized rather than lazy: the controller consumes
    /// the whole sequence exactly once, and a cursor-shaped return would
    /// pin the backend's connection for the duration of the rebuild.
    fn load_all(&self) -> Result<Vec<(i64, Vec<f32>)>>;

    /// Number of stored entries.
    fn len(&self) -> Result<usize>;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Embedded SQLite implementation of [`EntryStore`].
///
/// The connection lives behind a mutex so the store is `Send + Sync`;
/// each trait call is a single serialized statement or implicit
/// transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at the given path.
    ///
    /// Parent directories are created as needed and the schema is applied
    /// idempotently.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (contents vanish when dropped).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<(CacheEntry, Vec<u8>)> {
        let entry = CacheEntry {
            id: row.get(0)?,
            query_hash: row.get(1)?,
            query: row.get(2)?,
            response: row.get(3)?,
            embedding: Vec::new(), // decoded by the caller from the blob
            model_source: row.get(5)?,
            hit_count: row.get::<_, i64>(6)? as u64,
        };
        let blob: Vec<u8> = row.get(4)?;
        Ok((entry, blob))
    }

    fn query_one<P: rusqlite::ToSql>(&self, sql: &str, param: P) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(sql, [param], Self::row_to_entry)
            .optional()?;
        drop(conn);

        match found {
            Some((mut entry, blob)) => {
                entry.embedding = decode_embedding(&blob)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }
}

impl EntryStore for SqliteStore {
    fn insert(&self, entry: NewEntry<'_>) -> Result<i64> {
        let blob = encode_embedding(entry.embedding);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO semantic_cache
                (query_hash, query, response, embedding, model_source)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.query_hash,
                entry.query,
                entry.response,
                blob,
                entry.model_source
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_by_hash(&self, query_hash: &str) -> Result<Option<CacheEntry>> {
        self.query_one(
            "SELECT id, query_hash, query, response, embedding, model_source, hit_count
             FROM semantic_cache WHERE query_hash = ?1 ORDER BY id LIMIT 1",
            query_hash,
        )
    }

    fn find_by_id(&self, id: i64) -> Result<Option<CacheEntry>> {
        self.query_one(
            "SELECT id, query_hash, query, response, embedding, model_source, hit_count
             FROM semantic_cache WHERE id = ?1",
            id,
        )
    }

    fn increment_hits(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE semantic_cache SET hit_count = hit_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, embedding FROM semantic_cache ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut pairs = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            pairs.push((id, decode_embedding(&blob)?));
        }
        Ok(pairs)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM semantic_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry<'a>(embedding: &'a [f32]) -> NewEntry<'a> {
        NewEntry {
            query_hash: "abc123",
            query: "What is Rust?",
            response: "A systems programming language.",
            embedding,
            model_source: "model-a",
        }
    }

    #[test]
    fn test_insert_assigns_monotonic_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let emb = vec![1.0, 0.0];
        let first = store.insert(sample_entry(&emb)).unwrap();
        let second = store.insert(sample_entry(&emb)).unwrap();
        assert!(second > first);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_find_by_hash_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let emb = vec![0.6, 0.8];
        let id = store.insert(sample_entry(&emb)).unwrap();

        let entry = store.find_by_hash("abc123").unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.query, "What is Rust?");
        assert_eq!(entry.response, "A systems programming language.");
        assert_eq!(entry.embedding, emb);
        assert_eq!(entry.model_source, "model-a");
        assert_eq!(entry.hit_count, 0);
    }

    #[test]
    fn test_find_by_hash_miss_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.find_by_hash("nope").unwrap().is_none());
    }

    #[test]
    fn test_find_by_hash_duplicate_prefers_earliest() {
        let store = SqliteStore::open_in_memory().unwrap();
        let emb = vec![1.0, 0.0];
        let first = store.insert(sample_entry(&emb)).unwrap();
        store.insert(sample_entry(&emb)).unwrap();

        let entry = store.find_by_hash("abc123").unwrap().unwrap();
        assert_eq!(entry.id, first);
    }

    #[test]
    fn test_find_by_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let emb = vec![1.0, 0.0];
        let id = store.insert(sample_entry(&emb)).unwrap();
        assert!(store.find_by_id(id).unwrap().is_some());
        assert!(store.find_by_id(id + 1000).unwrap().is_none());
    }

    #[test]
    fn test_increment_hits() {
        let store = SqliteStore::open_in_memory().unwrap();
        let emb = vec![1.0, 0.0];
        let id = store.insert(sample_entry(&emb)).unwrap();

        store.increment_hits(id).unwrap();
        store.increment_hits(id).unwrap();
        let entry = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(entry.hit_count, 2);
    }

    #[test]
    fn test_increment_hits_missing_row_is_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        // UPDATE on a nonexistent id affects zero rows; not an error.
        store.increment_hits(42).unwrap();
    }

    #[test]
    fn test_load_all_ascending_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let id_a = store.insert(sample_entry(&a)).unwrap();
        let id_b = store.insert(sample_entry(&b)).unwrap();

        let pairs = store.load_all().unwrap();
        assert_eq!(pairs, vec![(id_a, a), (id_b, b)]);
    }

    #[test]
    fn test_load_all_empty_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_all().unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_open_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let emb = vec![0.6, 0.8];
        let id = {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(sample_entry(&emb)).unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        let entry = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(entry.embedding, emb);
    }
}
