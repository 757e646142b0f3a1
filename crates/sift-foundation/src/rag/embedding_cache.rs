//! Embedding cache with request coalescing
//!
//! Wraps any [`Embedder`] with a strict LRU keyed by a content hash of the
//! input text. Misses of one call are sent upstream as a single batch, and
//! concurrent calls with the same miss-set share one in-flight upstream call.
//!
//! The LRU map sits behind a read/write lock that is only held for in-memory
//! bookkeeping. In-flight calls live in a separate keyed registry, so the
//! lock is never held while the wrapped generator is running.
//!
//! Each upstream batch runs as its own tokio task. It finishes, publishes to
//! the LRU and leaves the registry even when every caller waiting on it has
//! been cancelled, so [`CachedEmbedder`] must be used inside a tokio runtime.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sift_kernel::rag::Embedder;
use sift_kernel::{RagError, RagResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Configuration for [`CachedEmbedder`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingCacheConfig {
    /// Maximum number of cached vectors. Zero disables caching but keeps
    /// request coalescing.
    pub max_entries: usize,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self { max_entries: 10_000 }
    }
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Calls made to the wrapped embedder
    pub upstream_calls: u64,
    pub entries: usize,
}

/// Stable cache key for a text.
pub fn content_key(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Key of one coalesced upstream batch: a hash over the sorted miss keys.
fn batch_key<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Strict LRU over content keys.
///
/// Recency is a monotonically increasing tick; `order` maps tick to key so
/// the least recently used entry is always the first one.
struct LruEntries {
    max_entries: usize,
    tick: u64,
    map: HashMap<String, (Arc<Vec<f32>>, u64)>,
    order: BTreeMap<u64, String>,
}

impl LruEntries {
    fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            tick: 0,
            map: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Look up and promote to most recently used.
    fn get(&mut self, key: &str) -> Option<Arc<Vec<f32>>> {
        let tick = self.next_tick();
        let (vector, last) = self.map.get_mut(key)?;
        self.order.remove(last);
        *last = tick;
        self.order.insert(tick, key.to_string());
        Some(Arc::clone(vector))
    }

    fn insert(&mut self, key: String, vector: Arc<Vec<f32>>) {
        if self.max_entries == 0 {
            return;
        }
        let tick = self.next_tick();
        if let Some((_, last)) = self.map.insert(key.clone(), (vector, tick)) {
            self.order.remove(&last);
        }
        self.order.insert(tick, key);

        while self.map.len() > self.max_entries {
            let Some((_, evicted)) = self.order.pop_first() else {
                break;
            };
            self.map.remove(&evicted);
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

type BatchResult = RagResult<Arc<HashMap<String, Arc<Vec<f32>>>>>;
type InFlightBatch = Shared<BoxFuture<'static, BatchResult>>;

struct CacheState {
    entries: RwLock<LruEntries>,
    in_flight: DashMap<String, InFlightBatch>,
    hits: AtomicU64,
    misses: AtomicU64,
    upstream_calls: AtomicU64,
}

/// LRU + request-coalescing wrapper over any embedding generator.
///
/// This type is cheaply cloneable; all clones share the same cache, so one
/// instance can be handed to every retriever of a process.
#[derive(Clone)]
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    state: Arc<CacheState>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, config: EmbeddingCacheConfig) -> Self {
        Self {
            inner,
            state: Arc::new(CacheState {
                entries: RwLock::new(LruEntries::new(config.max_entries)),
                in_flight: DashMap::new(),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                upstream_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Wrap with the default capacity.
    pub fn with_defaults(inner: Arc<dyn Embedder>) -> Self {
        Self::new(inner, EmbeddingCacheConfig::default())
    }

    /// Whether a vector for `text` is currently cached. Does not promote.
    pub fn contains(&self, text: &str) -> bool {
        self.state.entries.read().contains(&content_key(text))
    }

    pub fn len(&self) -> usize {
        self.state.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.state.hits.load(Ordering::Relaxed),
            misses: self.state.misses.load(Ordering::Relaxed),
            upstream_calls: self.state.upstream_calls.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Upstream batches currently registered as in flight.
    pub fn in_flight_batches(&self) -> usize {
        self.state.in_flight.len()
    }

    /// Join the in-flight call for this miss-set, or start one.
    fn join_or_start(&self, misses: BTreeMap<String, String>) -> InFlightBatch {
        let key = batch_key(misses.keys());
        match self.state.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!(batch = %key, "joining in-flight embedding batch");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let task = tokio::spawn(Self::upstream_batch(
                    Arc::clone(&self.inner),
                    Arc::clone(&self.state),
                    key,
                    misses,
                ));
                let call = async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => Err(RagError::Internal(format!("embedding batch task failed: {e}"))),
                    }
                }
                .boxed()
                .shared();
                slot.insert(call.clone());
                call
            }
        }
    }

    async fn upstream_batch(
        inner: Arc<dyn Embedder>,
        state: Arc<CacheState>,
        key: String,
        misses: BTreeMap<String, String>,
    ) -> BatchResult {
        // Declared first so it drops last, after the LRU publish.
        let _registration = InFlightRegistration {
            state: Arc::clone(&state),
            key: key.clone(),
        };
        let (keys, texts): (Vec<String>, Vec<String>) = misses.into_iter().unzip();
        state.upstream_calls.fetch_add(1, Ordering::Relaxed);
        debug!(batch = %key, size = texts.len(), "embedding cache misses upstream");

        let result = inner.embed(&texts).await.and_then(|vectors| {
            if vectors.len() == keys.len() {
                Ok(vectors)
            } else {
                Err(RagError::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    keys.len()
                )))
            }
        });

        let outcome = match result {
            Ok(vectors) => {
                let fetched: HashMap<String, Arc<Vec<f32>>> = keys
                    .into_iter()
                    .zip(vectors.into_iter().map(Arc::new))
                    .collect();
                let mut entries = state.entries.write();
                for (k, v) in &fetched {
                    entries.insert(k.clone(), Arc::clone(v));
                }
                Ok(Arc::new(fetched))
            }
            Err(e) => {
                warn!(batch = %key, error = %e, "upstream embedding batch failed");
                Err(e)
            }
        };
        outcome
    }
}

/// Removes a batch from the in-flight registry when its task ends, including
/// by panic. The LRU is written before this runs, so a caller arriving after
/// removal hits.
struct InFlightRegistration {
    state: Arc<CacheState>,
    key: String,
}

impl Drop for InFlightRegistration {
    fn drop(&mut self) {
        self.state.in_flight.remove(&self.key);
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = texts.iter().map(|t| content_key(t)).collect();
        let mut found: Vec<Option<Arc<Vec<f32>>>> = Vec::with_capacity(keys.len());
        let mut misses: BTreeMap<String, String> = BTreeMap::new();

        {
            let mut entries = self.state.entries.write();
            for (key, text) in keys.iter().zip(texts) {
                let hit = entries.get(key);
                if hit.is_none() {
                    misses.entry(key.clone()).or_insert_with(|| text.clone());
                }
                found.push(hit);
            }
        }

        let miss_count = found.iter().filter(|v| v.is_none()).count() as u64;
        self.state.misses.fetch_add(miss_count, Ordering::Relaxed);
        self.state
            .hits
            .fetch_add(found.len() as u64 - miss_count, Ordering::Relaxed);

        let fetched = if misses.is_empty() {
            None
        } else {
            Some(self.join_or_start(misses).await?)
        };

        keys.iter()
            .zip(found)
            .map(|(key, hit)| {
                hit.or_else(|| fetched.as_ref().and_then(|f| f.get(key).cloned()))
                    .map(|v| Vec::clone(&v))
                    .ok_or_else(|| RagError::Internal("embedding missing after upstream batch".to_string()))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingEmbedder {
        calls: AtomicUsize,
        texts_seen: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                texts_seen: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts_seen.fetch_add(texts.len(), Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(RagError::Embedding("model offline".to_string()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn cache_over(inner: Arc<CountingEmbedder>, max_entries: usize) -> CachedEmbedder {
        CachedEmbedder::new(inner, EmbeddingCacheConfig { max_entries })
    }

    #[tokio::test]
    async fn repeated_embed_does_not_call_upstream_again() {
        let upstream = Arc::new(CountingEmbedder::new());
        let cache = cache_over(upstream.clone(), 100);

        let first = cache.embed(&texts(&["hello"])).await.unwrap();
        for _ in 0..5 {
            let again = cache.embed(&texts(&["hello"])).await.unwrap();
            assert_eq!(again, first);
        }

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 5);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.upstream_calls, 1);
    }

    #[tokio::test]
    async fn misses_are_batched_into_one_call() {
        let upstream = Arc::new(CountingEmbedder::new());
        let cache = cache_over(upstream.clone(), 100);

        cache.embed(&texts(&["a"])).await.unwrap();
        let out = cache.embed(&texts(&["a", "bb", "ccc", "bb"])).await.unwrap();

        assert_eq!(out.len(), 4);
        assert_eq!(out[1], vec![2.0, 1.0]);
        assert_eq!(out[3], vec![2.0, 1.0]);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
        // duplicate "bb" and the cached "a" are not re-sent
        assert_eq!(upstream.texts_seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn size_is_bounded_by_max_entries() {
        let upstream = Arc::new(CountingEmbedder::new());
        let cache = cache_over(upstream, 3);

        for i in 0..10 {
            cache.embed(&[format!("text-{i}")]).await.unwrap();
            assert_eq!(cache.len(), (i + 1).min(3));
        }
    }

    #[tokio::test]
    async fn eviction_removes_least_recently_used() {
        let upstream = Arc::new(CountingEmbedder::new());
        let cache = cache_over(upstream, 2);

        cache.embed(&texts(&["a"])).await.unwrap();
        cache.embed(&texts(&["b"])).await.unwrap();
        // touching "a" makes "b" the eviction candidate
        cache.embed(&texts(&["a"])).await.unwrap();
        cache.embed(&texts(&["c"])).await.unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let upstream = Arc::new(CountingEmbedder::new());
        let cache = cache_over(upstream.clone(), 10);
        assert!(cache.embed(&[]).await.unwrap().is_empty());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_error_fails_call_and_caches_nothing() {
        let upstream = Arc::new(CountingEmbedder::failing());
        let cache = cache_over(upstream, 10);

        let err = cache.embed(&texts(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_identical_misses_share_one_upstream_call() {
        let upstream = Arc::new(CountingEmbedder::slow(Duration::from_millis(100)));
        let cache = cache_over(upstream.clone(), 10);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.embed_one("the same uncached text").await
            }));
        }

        let mut vectors = Vec::new();
        for handle in handles {
            vectors.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(vectors.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn zero_capacity_never_caches() {
        let upstream = Arc::new(CountingEmbedder::new());
        let cache = cache_over(upstream.clone(), 0);

        cache.embed(&texts(&["a"])).await.unwrap();
        cache.embed(&texts(&["a"])).await.unwrap();

        assert!(cache.is_empty());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_batches_still_complete_and_unregister() {
        let upstream = Arc::new(CountingEmbedder::slow(Duration::from_millis(200)));
        let cache = cache_over(upstream.clone(), 100);

        for i in 0..50 {
            let abandoned =
                tokio::time::timeout(Duration::from_millis(1), cache.embed_one(&format!("other-{i}"))).await;
            assert!(abandoned.is_err());
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 50);
        assert_eq!(cache.in_flight_batches(), 0);
        assert_eq!(cache.len(), 50);

        // finished in the background, so this is a hit
        cache.embed_one("other-7").await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn content_key_is_stable() {
        assert_eq!(content_key("abc"), content_key("abc"));
        assert_ne!(content_key("abc"), content_key("abd"));
        assert_eq!(content_key("abc").len(), 64);
    }
}
