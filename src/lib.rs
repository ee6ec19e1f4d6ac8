//! # Mnemo - Two-Tier Semantic Response Cache
//!
//! Mnemo caches expensive natural-language query/answer pairs. Instead of
//! recomputing an answer for every incoming query, it recognizes queries
//! that are exact or semantically near-duplicate of previously answered
//! ones and returns the stored answer.
//!
//! Lookups run through two tiers:
//!
//! 1. **Exact tier** — a SHA-256 digest of the normalized query text is
//!    matched against a durable SQLite table. Exact textual duplicates are
//!    always authoritative.
//! 2. **Semantic tier** — the query embedding is searched against an
//!    in-memory inner-product index over unit-norm vectors; the best
//!    candidate is accepted when its cosine similarity reaches the
//!    configured threshold.
//!
//! The SQLite table is the source of truth; the similarity index is a
//! derived projection rebuilt from it on startup, so the cache survives
//! process restarts.
//!
//! ## Quick Start
//!
//! ```rust
//! use mnemo::{CacheConfig, HitSource, MockEmbedder, SemanticCache, SqliteStore};
//! use std::sync::Arc;
//!
//! fn main() -> mnemo::Result<()> {
//!     let store = SqliteStore::open_in_memory()?;
//!     let embedder = Arc::new(MockEmbedder::new(384));
//!     let cache = SemanticCache::new(
//!         CacheConfig::new(384).with_threshold(0.9),
//!         store,
//!         embedder,
//!     )?;
//!
//!     // Miss: compute the answer upstream, then store it.
//!     assert!(cache.lookup("What is the capital of France?")?.is_none());
//!     cache.store("What is the capital of France?", "Paris", "model-a")?;
//!
//!     // Exact-tier hit (normalization makes case and spacing irrelevant).
//!     let hit = cache.lookup("what is the capital of france?")?.unwrap();
//!     assert_eq!(hit.response, "Paris");
//!     assert_eq!(hit.source, HitSource::Exact);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Persistence
//!
//! ```rust,no_run
//! use mnemo::{CacheConfig, MockEmbedder, SemanticCache, SqliteStore};
//! use std::sync::Arc;
//!
//! fn main() -> mnemo::Result<()> {
//!     // Reopening the same file rebuilds the similarity index from the
//!     // stored entries; previously cached answers keep hitting.
//!     let store = SqliteStore::open("responses.db")?;
//!     let embedder = Arc::new(MockEmbedder::new(384));
//!     let cache = SemanticCache::new(CacheConfig::new(384), store, embedder)?;
//!     println!("rebuilt with {} entries", cache.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! [`SemanticCache`] is `Send + Sync`; share it across request-handling
//! threads with `Arc`. Lookups proceed concurrently; stores serialize on a
//! short write section that keeps the index and its id map in lockstep.

#![warn(missing_docs)]

pub mod cache;
pub mod codec;
pub mod distance;
pub mod encoder;
pub mod error;
pub mod index;
pub mod store;

pub use cache::{
    CacheConfig, CacheHit, CacheStats, CachedClient, Completion, HitSource, SemanticCache,
};
pub use encoder::{Embedder, MockEmbedder};
pub use error::{MnemoError, Result};
pub use index::FlatIpIndex;
pub use store::{CacheEntry, EntryStore, NewEntry, SqliteStore};
