pub mod catalog;
pub mod data;
pub mod error;
pub mod matcher;
pub mod normalize;
pub mod rank;
pub mod search;
pub mod similarity;

pub use catalog::{CatalogSnapshot, Completion};
pub use data::{CatalogPayload, Category, EntityId, EntityRecord, NameSet};
pub use error::{CatalogError, ConfigError};
pub use matcher::MatchKind;
pub use normalize::{
    NormalizedString, Script, detect_script, dominant_script, normalize, normalize_text,
};
pub use rank::{RankedResult, RankingWeights, ScoreBreakdown};
pub use search::{MatchResult, SearchOptions};
pub use similarity::similarity;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Score floor used by [`SearchEngine::suggest`].
pub const SUGGEST_MIN_SCORE: f64 = 0.2;
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: RankingWeights,
    /// Number of cached result lists. `0` turns the cache off.
    pub cache_capacity: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Lightweight autocomplete row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub id: EntityId,
    pub category: Category,
    /// Latin primary name, or the best fallback when a record has none.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arabic: Option<String>,
    pub kind: MatchKind,
    pub score: f64,
}

impl From<&RankedResult> for Suggestion {
    fn from(result: &RankedResult) -> Self {
        Self {
            id: result.record.id.clone(),
            category: result.category(),
            label: result.record.label().to_string(),
            arabic: Some(result.record.arabic.primary.clone())
                .filter(|name| !name.trim().is_empty()),
            kind: result.kind,
            score: result.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    generation: u64,
    query: String,
    limit: usize,
    min_score: u64,
    flags: [bool; 3],
}

impl CacheKey {
    fn new(generation: u64, query: &str, options: &SearchOptions) -> Self {
        Self {
            generation,
            query: query.to_string(),
            limit: options.limit,
            min_score: options.min_score.to_bits(),
            flags: [
                options.include_partial,
                options.include_initials,
                options.bilingual,
            ],
        }
    }
}

struct Loaded {
    snapshot: Arc<CatalogSnapshot>,
    generation: u64,
}

/// Bilingual search over a swappable catalog snapshot.
///
/// Queries clone the current snapshot handle and run without holding any lock,
/// so a [`load`](Self::load) never waits on searches and in-flight searches
/// finish against the snapshot they started with.
pub struct SearchEngine {
    config: EngineConfig,
    current: RwLock<Loaded>,
    cache: Option<Mutex<LruCache<CacheKey, Vec<RankedResult>>>>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SearchEngine {
    /// Creates an engine over an empty catalog.
    ///
    /// Invalid ranking weights are replaced by the defaults; use
    /// [`try_new`](Self::try_new) to reject them instead.
    pub fn new(mut config: EngineConfig) -> Self {
        if let Err(err) = config.validate() {
            warn!(%err, "Ignoring configured ranking weights");
            config.weights = RankingWeights::default();
        }
        let cache = NonZeroUsize::new(config.cache_capacity)
            .map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            config,
            current: RwLock::new(Loaded {
                snapshot: Arc::new(CatalogSnapshot::default()),
                generation: 0,
            }),
            cache,
        }
    }

    pub fn try_new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn with_snapshot(config: EngineConfig, snapshot: CatalogSnapshot) -> Self {
        let engine = Self::new(config);
        engine.load(snapshot);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the catalog wholesale and drops every cached result.
    pub fn load(&self, snapshot: CatalogSnapshot) {
        let snapshot = Arc::new(snapshot);
        let generation = {
            let mut current = self.current.write();
            current.generation += 1;
            current.snapshot = Arc::clone(&snapshot);
            current.generation
        };
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
        let counts: Vec<usize> = snapshot.collections().iter().map(|c| c.len()).collect();
        info!(
            generation,
            reciters = counts.first().copied().unwrap_or_default(),
            chapters = counts.get(1).copied().unwrap_or_default(),
            terms = counts.get(2).copied().unwrap_or_default(),
            "Loaded catalog snapshot"
        );
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.current.read().snapshot)
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Matches, merges and ranks `query` across every collection.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<RankedResult> {
        let (snapshot, generation) = {
            let current = self.current.read();
            (Arc::clone(&current.snapshot), current.generation)
        };
        let key = self
            .cache
            .as_ref()
            .map(|_| CacheKey::new(generation, query, options));

        if let (Some(cache), Some(key)) = (&self.cache, &key)
            && let Some(hit) = cache.lock().get(key)
        {
            debug!(query, returned = hit.len(), cache_hit = true, "Search");
            return hit.clone();
        }

        let merged = search::search_catalog(query, &snapshot, options);
        let candidates = merged.len();
        let mut ranked = rank::rank(merged, query, &self.config.weights);
        ranked.truncate(options.limit);
        debug!(
            query,
            script = %detect_script(query),
            candidates,
            returned = ranked.len(),
            cache_hit = false,
            "Search"
        );

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.lock().put(key, ranked.clone());
        }
        ranked
    }

    /// Autocomplete entities for a partially typed query.
    pub fn suggest(&self, partial: &str, limit: usize) -> Vec<Suggestion> {
        let options = SearchOptions {
            limit,
            min_score: SUGGEST_MIN_SCORE,
            ..SearchOptions::default()
        };
        self.search(partial, &options)
            .iter()
            .map(Suggestion::from)
            .collect()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<EntityRecord>> {
        self.current.read().snapshot.get(id).cloned()
    }

    /// Canonical names starting with `prefix`, for completing the query text itself.
    pub fn complete(&self, prefix: &str, limit: usize) -> Vec<Completion> {
        self.snapshot().complete(prefix, limit)
    }
}
