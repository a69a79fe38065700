//! Bounded LIFO proxy pool with blacklist and lazy refill.

use crate::proxy::ProxyRecord;
use crate::source::{Candidate, ProxySource};

use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared state behind one lock: the LIFO store, the raw candidate cache and
/// the blacklist. The lock is never held across an await; refills fetch
/// outside it.
struct PoolState {
    /// Available records, most recently released at the tail.
    available: Vec<ProxyRecord>,
    /// Raw candidates drawn from during synthesis, without replacement.
    candidates: Vec<Candidate>,
    /// Endpoints reported bad by callers. Recorded for diagnostics only;
    /// neither `acquire` nor synthesis filters against it.
    blacklist: HashSet<String>,
}

/// A bounded pool of reuse-capped proxies shared across concurrent
/// downloads. The most recently released proxy is the next one handed out.
pub struct ProxyPool {
    capacity: usize,
    max_reuse: u32,
    source: Arc<dyn ProxySource>,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// Create an empty pool. Call `prime` to load the initial batch.
    pub fn new(capacity: usize, max_reuse: u32, source: Arc<dyn ProxySource>) -> Self {
        Self {
            capacity,
            max_reuse,
            source,
            state: Mutex::new(PoolState {
                available: Vec::new(),
                candidates: Vec::new(),
                blacklist: HashSet::new(),
            }),
        }
    }

    /// Initial fill: fetch one batch of candidates and materialize up to
    /// `capacity` records into the store. A failed or empty fetch leaves the
    /// pool empty; `acquire` will synthesize on demand instead.
    pub async fn prime(&self) {
        let batch = self.fetch_batch().await;
        if batch.is_empty() {
            warn!("proxy source yielded no candidates at startup");
            return;
        }
        let mut state = self.state.lock();
        state.candidates = batch;
        for _ in 0..self.capacity {
            let record = self.synthesize(&mut state);
            if record.endpoint().is_empty() {
                break;
            }
            state.available.push(record);
        }
        info!(
            "proxy pool primed with {}/{} proxies",
            state.available.len(),
            self.capacity
        );
    }

    /// Hand out a proxy record. Pops the most recently released record still
    /// holding uses (exhausted ones are dropped on the way); on an empty
    /// store, synthesizes a fresh record from the raw candidate cache,
    /// refilling the cache from the source when it has run nearly dry.
    /// Never fails: with no candidates available the returned record has an
    /// empty identity, which callers treat as "direct connection".
    pub async fn acquire(&self) -> ProxyRecord {
        {
            let mut state = self.state.lock();
            while let Some(record) = state.available.pop() {
                if record.is_valid() {
                    return record;
                }
                debug!("dropping exhausted proxy {}", record);
            }
            if state.candidates.len() > 1 {
                return self.synthesize(&mut state);
            }
        }

        // Store empty and candidate cache nearly dry: refill outside the
        // lock, then synthesize from whatever came back.
        let batch = self.fetch_batch().await;
        let mut state = self.state.lock();
        state.candidates = batch;
        self.synthesize(&mut state)
    }

    /// Return a record to the store. Exhausted or identityless records are
    /// dropped; so is anything beyond capacity, with a log line rather than
    /// an error.
    pub fn release(&self, record: ProxyRecord) {
        if record.endpoint().is_empty() {
            return;
        }
        if !record.is_valid() {
            debug!("dropping exhausted proxy {}", record);
            return;
        }
        let mut state = self.state.lock();
        if state.available.len() >= self.capacity {
            debug!("proxy pool is full, discarding proxy: {}", record);
            return;
        }
        state.available.push(record);
    }

    /// Report a failed proxy and obtain a substitute in one call. The
    /// endpoint lands in the blacklist set; the replacement comes from the
    /// regular `acquire` path.
    pub async fn blacklist(&self, endpoint: &str) -> ProxyRecord {
        if !endpoint.is_empty() {
            let mut state = self.state.lock();
            state.blacklist.insert(endpoint.to_string());
            warn!(
                "blacklisted proxy {} ({} endpoints total)",
                endpoint,
                state.blacklist.len()
            );
        }
        self.acquire().await
    }

    /// Number of available records and blacklisted endpoints.
    pub fn stats(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.available.len(), state.blacklist.len())
    }

    async fn fetch_batch(&self) -> Vec<Candidate> {
        match self.source.fetch_candidates().await {
            Ok(batch) => {
                debug!("fetched {} proxy candidates", batch.len());
                batch
            }
            Err(e) => {
                warn!("failed to fetch proxy candidates: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Draw a uniformly random candidate without replacement and build a
    /// fresh record from it. An empty cache produces the unaddressed record.
    fn synthesize(&self, state: &mut PoolState) -> ProxyRecord {
        if state.candidates.is_empty() {
            debug!("no proxy candidates left, falling back to direct connection");
            return ProxyRecord::unaddressed(self.max_reuse);
        }
        let index = rand::rng().random_range(0..state.candidates.len());
        let (scheme, host, port) = state.candidates.swap_remove(index);
        ProxyRecord::new(scheme, format!("{}:{}", host, port), self.max_reuse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio_test::block_on;

    /// Source scripted with successive batches; yields empty once drained.
    struct StubSource {
        batches: Mutex<Vec<Vec<Candidate>>>,
        calls: Mutex<usize>,
    }

    impl StubSource {
        fn new(batches: Vec<Vec<Candidate>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl ProxySource for StubSource {
        async fn fetch_candidates(&self) -> Result<Vec<Candidate>> {
            *self.calls.lock() += 1;
            let mut batches = self.batches.lock();
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(batches.remove(0))
            }
        }
    }

    fn candidates(n: u16) -> Vec<Candidate> {
        (0..n)
            .map(|i| ("http".to_string(), format!("10.0.0.{}", i + 1), 8080))
            .collect()
    }

    #[test]
    fn release_then_acquire_is_lifo() {
        let pool = ProxyPool::new(3, 5, StubSource::new(vec![]));
        let a = ProxyRecord::new("http", "10.0.0.1:8080", 5);
        let b = ProxyRecord::new("http", "10.0.0.2:8080", 5);
        pool.release(a);
        pool.release(b);
        let first = block_on(pool.acquire());
        let second = block_on(pool.acquire());
        assert_eq!(first.endpoint(), "10.0.0.2:8080");
        assert_eq!(second.endpoint(), "10.0.0.1:8080");
    }

    #[test]
    fn releasing_beyond_capacity_drops_the_excess() {
        let pool = ProxyPool::new(2, 5, StubSource::new(vec![]));
        for i in 0..4 {
            pool.release(ProxyRecord::new("http", format!("10.0.0.{}:8080", i), 5));
        }
        let (available, _) = pool.stats();
        assert_eq!(available, 2);
    }

    #[test]
    fn exhausted_records_are_not_pooled() {
        let pool = ProxyPool::new(3, 1, StubSource::new(vec![]));
        let mut record = ProxyRecord::new("http", "10.0.0.1:8080", 1);
        record.try_use();
        pool.release(record);
        let (available, _) = pool.stats();
        assert_eq!(available, 0);
    }

    #[test]
    fn empty_pool_synthesizes_distinct_records() {
        // Capacity 3, cap 2: three acquires with no releases draw three
        // distinct raw candidates, each with a zero use count.
        let source = StubSource::new(vec![candidates(5)]);
        let pool = ProxyPool::new(3, 2, source);
        let records = block_on(async {
            let mut out = Vec::new();
            for _ in 0..3 {
                out.push(pool.acquire().await);
            }
            out
        });
        let endpoints: HashSet<_> = records.iter().map(|r| r.endpoint().to_string()).collect();
        assert_eq!(endpoints.len(), 3);
        assert!(records.iter().all(|r| r.use_count() == 0));
    }

    #[test]
    fn refill_triggers_when_cache_runs_dry() {
        let source = StubSource::new(vec![candidates(2), candidates(4)]);
        let pool = ProxyPool::new(3, 2, source.clone());
        block_on(async {
            // First acquire refills (cache empty), leaving 1 candidate.
            pool.acquire().await;
            assert_eq!(source.calls(), 1);
            // Cache is at <=1 now, so the next acquire refills again.
            pool.acquire().await;
            assert_eq!(source.calls(), 2);
        });
    }

    #[test]
    fn source_failure_degrades_to_direct_connection() {
        let pool = ProxyPool::new(3, 2, StubSource::new(vec![]));
        let record = block_on(pool.acquire());
        assert!(record.endpoint().is_empty());
        assert!(record.is_valid());
    }

    #[test]
    fn blacklist_records_endpoint_and_returns_replacement() {
        let source = StubSource::new(vec![candidates(5)]);
        let pool = ProxyPool::new(3, 2, source);
        let replacement = block_on(pool.blacklist("10.9.9.9:8080"));
        assert!(!replacement.endpoint().is_empty());
        let (_, blacklisted) = pool.stats();
        assert_eq!(blacklisted, 1);
    }

    #[test]
    fn prime_fills_up_to_capacity() {
        let source = StubSource::new(vec![candidates(10)]);
        let pool = ProxyPool::new(4, 2, source);
        block_on(pool.prime());
        let (available, _) = pool.stats();
        assert_eq!(available, 4);
    }
}
