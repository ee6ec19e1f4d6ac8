//! Two-Tier Semantic Cache
//!
//! The cache controller orchestrates lookups and stores across two tiers:
//!
//! 1. **Exact tier**: a digest of the normalized query text is matched
//!    against the durable entry store. An exact textual duplicate is always
//!    authoritative, regardless of the similarity threshold.
//! 2. **Semantic tier**: the query is embedded and the in-memory
//!    inner-product index is searched; the single best candidate is accepted
//!    when its score reaches the configured threshold (inclusive).
//!
//! The controller owns the slot-to-id mapping (`id_map`) that ties index
//! positions back to store rows. The central invariant is positional
//! correspondence: `id_map.len()` always equals the index's vector count,
//! and every slot resolves to a live row. Stores write to the durable store
//! *first* and only then touch the index, so a crash between the two leaves
//! the store ahead of the index — recoverable by a rebuild — never the
//! reverse.
//!
//! # Example
//!
//! ```
//! use mnemo::{CacheConfig, MockEmbedder, SemanticCache, SqliteStore};
//! use std::sync::Arc;
//!
//! fn main() -> mnemo::Result<()> {
//!     let store = SqliteStore::open_in_memory()?;
//!     let embedder = Arc::new(MockEmbedder::new(128));
//!     let cache = SemanticCache::new(CacheConfig::new(128), store, embedder)?;
//!
//!     cache.store("What is the capital of France?", "Paris", "model-a")?;
//!
//!     let hit = cache.lookup("what is the capital of france?")?.unwrap();
//!     assert_eq!(hit.response, "Paris");
//!     Ok(())
//! }
//! ```

use crate::encoder::Embedder;
use crate::error::{MnemoError, Result};
use crate::index::FlatIpIndex;
use crate::store::{EntryStore, NewEntry};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of candidates retrieved per semantic search. Only rank 0 is
/// evaluated for acceptance; the extra candidates leave room for future
/// re-ranking without an index API change.
const DEFAULT_TOP_K: usize = 5;

/// Configuration for the semantic cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Embedding dimensionality; must match the injected encoder
    pub dimensions: usize,
    /// Similarity acceptance threshold in `(0, 1]`. A score equal to the
    /// threshold counts as a hit.
    pub threshold: f32,
    /// Candidates retrieved per semantic search
    pub top_k: usize,
}

impl CacheConfig {
    /// Create a config for the given embedding dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            threshold: 0.92,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set the similarity acceptance threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the number of candidates retrieved per semantic search.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(MnemoError::InvalidConfig(
                "dimensions must be positive".into(),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(MnemoError::InvalidConfig(format!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.top_k == 0 {
            return Err(MnemoError::InvalidConfig("top_k must be positive".into()));
        }
        Ok(())
    }
}

/// Which tier answered a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitSource {
    /// Matched on the digest of the normalized query text
    Exact,
    /// Matched via embedding similarity above the threshold
    Semantic,
}

/// A successful cache lookup
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// Store id of the answering entry
    pub id: i64,
    /// Cached response text
    pub response: String,
    /// Tier that produced the hit
    pub source: HitSource,
    /// Similarity score; `1.0` for exact-tier hits
    pub similarity: f32,
}

/// Aggregated cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total lookups issued
    pub lookups: u64,
    /// Lookups answered from either tier
    pub hits: u64,
    /// Lookups answered by neither tier
    pub misses: u64,
    /// Hits from the exact tier
    pub exact_matches: u64,
    /// Hits from the semantic tier
    pub semantic_matches: u64,
    /// Entries stored through this handle
    pub stores: u64,
    /// hits / lookups, `0.0` before any lookup
    pub hit_rate: f64,
}

#[derive(Default)]
struct StatsInternal {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    exact_matches: AtomicU64,
    semantic_matches: AtomicU64,
    stores: AtomicU64,
}

/// Similarity index plus its slot-to-id mapping.
///
/// Both live behind one lock so their lengths can never be observed to
/// disagree: readers hold the lock across search + slot resolution, writers
/// across append + push.
struct IndexState {
    index: FlatIpIndex,
    id_map: Vec<i64>,
}

/// Two-tier semantic response cache.
///
/// Shared across worker threads via `Arc`: lookups take a read lock on the
/// similarity index and may run concurrently; stores take the write lock
/// for the index append only (the durable insert happens before, unlocked).
pub struct SemanticCache<S: EntryStore> {
    config: CacheConfig,
    store: S,
    embedder: Arc<dyn Embedder>,
    state: RwLock<IndexState>,
    stats: StatsInternal,
}

impl<S: EntryStore> std::fmt::Debug for SemanticCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: EntryStore> SemanticCache<S> {
    /// Create a cache over the given store and encoder, rebuilding the
    /// similarity index from the store's contents.
    ///
    /// Fails with [`MnemoError::InvalidConfig`] when the config is invalid
    /// or the encoder's dimensionality disagrees with it, and with
    /// [`MnemoError::Corruption`] when the store's persisted embeddings
    /// cannot establish a consistent index.
    pub fn new(config: CacheConfig, store: S, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        if embedder.dimensions() != config.dimensions {
            return Err(MnemoError::InvalidConfig(format!(
                "encoder produces {}-dimensional vectors, config expects {}",
                embedder.dimensions(),
                config.dimensions
            )));
        }

        let state = Self::build_state(&config, &store)?;
        Ok(Self {
            config,
            store,
            embedder,
            state: RwLock::new(state),
            stats: StatsInternal::default(),
        })
    }

    fn build_state(config: &CacheConfig, store: &S) -> Result<IndexState> {
        let pairs = store.load_all()?;
        let mut index = FlatIpIndex::new(config.dimensions);
        let mut id_map = Vec::with_capacity(pairs.len());

        for (id, embedding) in pairs {
            if embedding.len() != config.dimensions {
                return Err(MnemoError::Corruption(format!(
                    "entry {id} has a {}-dimensional embedding, expected {}",
                    embedding.len(),
                    config.dimensions
                )));
            }
            let slot = index.add(embedding);
            id_map.push(id);
            debug!(id, slot, "indexed stored embedding");
        }

        if id_map.len() != index.len() {
            return Err(MnemoError::Corruption(format!(
                "id map length {} diverges from index length {}",
                id_map.len(),
                index.len()
            )));
        }

        info!(entries = index.len(), "similarity index rebuilt");
        Ok(IndexState { index, id_map })
    }

    /// Resolve a query against both tiers.
    ///
    /// Returns `Ok(None)` on a definitive miss; the caller is expected to
    /// compute a fresh response and [`store`](Self::store) it. Storage and
    /// encoder failures propagate; a hit whose hit-count bump fails is
    /// still served (the degradation is logged).
    pub fn lookup(&self, query: &str) -> Result<Option<CacheHit>> {
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);

        let normalized = normalize_query(query);
        let digest = hash_query(&normalized);

        // Exact tier: authoritative regardless of threshold.
        if let Some(entry) = self.store.find_by_hash(&digest)? {
            self.bump_hits(entry.id);
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            self.stats.exact_matches.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(CacheHit {
                id: entry.id,
                response: entry.response,
                source: HitSource::Exact,
                similarity: 1.0,
            }));
        }

        // Semantic tier. Skip the embedding call entirely when the index
        // has nothing to offer.
        if self.state.read().index.is_empty() {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let embedding = self.embed_checked(query)?;

        let candidate = {
            let state = self.state.read();
            let results = state.index.search(&embedding, self.config.top_k);
            // Only rank 0 is evaluated for acceptance.
            results.first().map(|&(slot, score)| {
                debug!(slot, score, threshold = self.config.threshold, "best semantic candidate");
                (state.id_map[slot], score)
            })
        };

        if let Some((id, score)) = candidate {
            if score >= self.config.threshold {
                match self.store.find_by_id(id)? {
                    Some(entry) => {
                        self.bump_hits(entry.id);
                        self.stats.hits.fetch_add(1, Ordering::Relaxed);
                        self.stats.semantic_matches.fetch_add(1, Ordering::Relaxed);
                        return Ok(Some(CacheHit {
                            id: entry.id,
                            response: entry.response,
                            source: HitSource::Semantic,
                            similarity: score,
                        }));
                    }
                    None => {
                        // Index points at a row the store no longer has.
                        // Soft miss; a rebuild is the prescribed recovery.
                        warn!(id, "semantic hit resolved to a missing store row");
                    }
                }
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    /// Persist a fresh query/response pair and index its embedding.
    ///
    /// The durable insert completes before the index is touched; if it
    /// fails, the index and id map are left unchanged.
    pub fn store(&self, query: &str, response: &str, model_source: &str) -> Result<i64> {
        let embedding = self.embed_checked(query)?;
        let normalized = normalize_query(query);
        let digest = hash_query(&normalized);

        let id = self.store.insert(NewEntry {
            query_hash: &digest,
            query,
            response,
            embedding: &embedding,
            model_source,
        })?;

        {
            let mut state = self.state.write();
            let slot = state.index.add(embedding);
            state.id_map.push(id);
            debug_assert_eq!(state.id_map.len(), state.index.len());
            debug!(id, slot, "entry stored and indexed");
        }

        self.stats.stores.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Discard the similarity index and rebuild it from the durable store.
    ///
    /// This is the prescribed recovery from index/store divergence. Stores
    /// are excluded for the duration; lookups resume against the fresh
    /// index afterwards.
    pub fn rebuild(&self) -> Result<()> {
        let mut state = self.state.write();
        *state = Self::build_state(&self.config, &self.store)?;
        Ok(())
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.state.read().index.is_empty()
    }

    /// Configured similarity threshold.
    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Configured embedding dimensionality.
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let lookups = self.stats.lookups.load(Ordering::Relaxed);
        let hits = self.stats.hits.load(Ordering::Relaxed);
        CacheStats {
            lookups,
            hits,
            misses: self.stats.misses.load(Ordering::Relaxed),
            exact_matches: self.stats.exact_matches.load(Ordering::Relaxed),
            semantic_matches: self.stats.semantic_matches.load(Ordering::Relaxed),
            stores: self.stats.stores.load(Ordering::Relaxed),
            hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }

    /// Borrow the underlying entry store.
    pub fn entry_store(&self) -> &S {
        &self.store
    }

    fn embed_checked(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(text)?;
        if embedding.len() != self.config.dimensions {
            return Err(MnemoError::DimensionMismatch {
                expected: self.config.dimensions,
                got: embedding.len(),
            });
        }
        Ok(embedding)
    }

    /// Best-effort hit-count bump: failure degrades to "hit served,
    /// counter not updated" and must never fail the lookup.
    fn bump_hits(&self, id: i64) {
        if let Err(err) = self.store.increment_hits(id) {
            warn!(id, %err, "hit count increment failed");
        }
    }
}

/// Normalize query text for exact-tier matching: lowercase, trim, collapse
/// interior whitespace.
fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// SHA-256 hex digest of normalized query text.
fn hash_query(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Response returned by [`CachedClient::complete`]
#[derive(Debug, Clone)]
pub struct Completion {
    /// Response text, cached or freshly generated
    pub response: String,
    /// Whether the response came from the cache
    pub cache_hit: bool,
    /// Tier that answered, when served from cache
    pub source: Option<HitSource>,
    /// Similarity score, when served from cache
    pub similarity: Option<f32>,
}

/// Wrapper combining a [`SemanticCache`] with an upstream generation
/// function: consult the cache, and on a miss generate, store, and return.
pub struct CachedClient<S, G>
where
    S: EntryStore,
    G: Fn(&str) -> Result<String>,
{
    cache: SemanticCache<S>,
    generate: G,
    model_source: String,
}

impl<S, G> CachedClient<S, G>
where
    S: EntryStore,
    G: Fn(&str) -> Result<String>,
{
    /// Create a client that tags stored responses with `model_source`.
    pub fn new(cache: SemanticCache<S>, generate: G, model_source: impl Into<String>) -> Self {
        Self {
            cache,
            generate,
            model_source: model_source.into(),
        }
    }

    /// Answer a prompt from the cache, or generate and store on a miss.
    pub fn complete(&self, prompt: &str) -> Result<Completion> {
        if let Some(hit) = self.cache.lookup(prompt)? {
            return Ok(Completion {
                response: hit.response,
                cache_hit: true,
                source: Some(hit.source),
                similarity: Some(hit.similarity),
            });
        }

        let response = (self.generate)(prompt)?;
        self.cache.store(prompt, &response, &self.model_source)?;

        Ok(Completion {
            response,
            cache_hit: false,
            source: None,
            similarity: None,
        })
    }

    /// Borrow the underlying cache.
    pub fn cache(&self) -> &SemanticCache<S> {
        &self.cache
    }
}
