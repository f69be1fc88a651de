//! Stale-while-revalidate fetch pipeline.
//!
//! A [`Source`] bundles a cache key, a TTL, a revalidation policy and an
//! ordered chain of [`Retriever`]s.  The caller drives it in two steps:
//!
//! 1. [`Source::peek`] reads the cache synchronously so a present record can
//!    be shown at once (status `cached`), and [`Source::wants_fetch`] says
//!    whether the network should be tried at all.
//! 2. [`Source::refresh`] walks the chain.  The first retriever returning a
//!    non-empty payload wins and is written through to the cache (status
//!    `live`).  If every retriever fails, a cached payload is still preferred
//!    over an `error`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::{CacheStore, Cacheable};
use crate::freshness;
use crate::source::Retriever;

/// A payload the pipeline can cache and judge for emptiness.
pub trait Payload: Cacheable {
    /// Empty results do not win the chain.
    fn is_empty(&self) -> bool {
        false
    }
}

/// Presentation status of a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Loading,
    NeedsCity,
    Cached,
    Live,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::NeedsCity => "needs-city",
            Self::Cached => "cached",
            Self::Live => "live",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `{value, status}` pair handed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Loadable<T> {
    pub value: Option<T>,
    pub status: Status,
}

impl<T> Loadable<T> {
    pub fn loading() -> Self {
        Self {
            value: None,
            status: Status::Loading,
        }
    }

    pub fn live(value: T) -> Self {
        Self {
            value: Some(value),
            status: Status::Live,
        }
    }

    pub fn cached(value: T) -> Self {
        Self {
            value: Some(value),
            status: Status::Cached,
        }
    }

    pub fn error() -> Self {
        Self {
            value: None,
            status: Status::Error,
        }
    }

    /// Fold a refresh outcome into what is currently shown.
    ///
    /// A failed refresh never discards a value already on screen.
    pub fn merge(&mut self, outcome: Loadable<T>) {
        match outcome.value {
            Some(value) => {
                self.value = Some(value);
                self.status = outcome.status;
            }
            None if self.value.is_some() => self.status = Status::Cached,
            None => self.status = outcome.status,
        }
    }
}

/// Whether a present cache record still triggers a network fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
    /// Refresh a fresh record once per session, then only when stale
    /// (weather).
    Once,
    /// Fetch only when absent or past the TTL (news).
    WhenStale,
}

/// Per-source in-flight guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    Fetching,
}

impl FetchState {
    /// `idle → fetching`; `false` if a fetch is already in flight.
    pub fn try_begin(&mut self) -> bool {
        match self {
            Self::Idle => {
                *self = Self::Fetching;
                true
            }
            Self::Fetching => false,
        }
    }

    pub fn finish(&mut self) {
        *self = Self::Idle;
    }

    pub fn is_fetching(self) -> bool {
        self == Self::Fetching
    }
}

/// A cached record as seen at activation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Peek<T> {
    pub payload: T,
    pub fresh: bool,
}

/// One trackable feed with its fallback chain.
pub struct Source<Q, T> {
    pub id: String,
    pub cache_key: String,
    pub ttl: Duration,
    pub revalidate: Revalidate,
    chain: Vec<Arc<dyn Retriever<Q, T>>>,
}

impl<Q: Sync, T: Payload> Source<Q, T> {
    pub fn new(
        id: impl Into<String>,
        cache_key: impl Into<String>,
        ttl: Duration,
        revalidate: Revalidate,
        chain: Vec<Arc<dyn Retriever<Q, T>>>,
    ) -> Self {
        Self {
            id: id.into(),
            cache_key: cache_key.into(),
            ttl,
            revalidate,
            chain,
        }
    }

    /// Retriever names in fallback order.
    pub fn chain_names(&self) -> Vec<&str> {
        self.chain.iter().map(|r| r.name()).collect()
    }

    pub fn peek(&self, store: &CacheStore, now: DateTime<Utc>) -> Option<Peek<T>> {
        store.get::<T>(&self.cache_key).map(|record| Peek {
            fresh: freshness::is_fresh(&record, self.ttl, now),
            payload: record.payload,
        })
    }

    /// `revalidated` says whether this session already fetched the source.
    pub fn wants_fetch(&self, peek: Option<&Peek<T>>, revalidated: bool) -> bool {
        match (self.revalidate, peek) {
            (_, None) => true,
            (_, Some(peek)) if !peek.fresh => true,
            (Revalidate::Once, Some(_)) => !revalidated,
            (Revalidate::WhenStale, Some(_)) => false,
        }
    }

    /// Walk the chain; the first successful non-empty payload wins.
    pub async fn run_chain(&self, query: &Q) -> Option<T> {
        for retriever in &self.chain {
            match retriever.retrieve(query).await {
                Ok(payload) if !payload.is_empty() => {
                    tracing::debug!(
                        source = %self.id,
                        retriever = retriever.name(),
                        "retriever succeeded"
                    );
                    return Some(payload);
                }
                Ok(_) => {
                    tracing::warn!(
                        source = %self.id,
                        retriever = retriever.name(),
                        "retriever returned no data"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        source = %self.id,
                        retriever = retriever.name(),
                        error = %e,
                        "retriever failed"
                    );
                }
            }
        }
        None
    }

    /// Fetch through the chain, writing a success through to the cache.
    pub async fn refresh(&self, query: &Q, store: &CacheStore) -> Loadable<T> {
        let cached = store.get::<T>(&self.cache_key);

        if let Some(payload) = self.run_chain(query).await {
            store.put(&self.cache_key, &payload);
            tracing::info!(source = %self.id, "source refreshed");
            return Loadable::live(payload);
        }

        match cached {
            Some(record) => {
                tracing::info!(
                    source = %self.id,
                    "all retrievers failed; keeping cached payload"
                );
                Loadable::cached(record.payload)
            }
            None => {
                tracing::warn!(source = %self.id, "all retrievers failed with nothing cached");
                Loadable::error()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRecord;
    use crate::source::FetchError;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Batch(Vec<u32>);

    impl Cacheable for Batch {
        const FIELD: &'static str = "items";
    }

    impl Payload for Batch {
        fn is_empty(&self) -> bool {
            self.0.is_empty()
        }
    }

    /// Returns `result` (or fails when `None`), counting calls.
    struct Scripted {
        result: Option<Batch>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(items: &[u32]) -> Arc<Self> {
            Arc::new(Self {
                result: Some(Batch(items.to_vec())),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Retriever<(), Batch> for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn retrieve(&self, _: &()) -> Result<Batch, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().ok_or(FetchError::Status(502))
        }
    }

    fn source(revalidate: Revalidate, chain: Vec<Arc<Scripted>>) -> Source<(), Batch> {
        let chain = chain
            .into_iter()
            .map(|r| r as Arc<dyn Retriever<(), Batch>>)
            .collect();
        let ttl = Duration::from_secs(15 * 60);
        Source::new("test", "test-cache", ttl, revalidate, chain)
    }

    // -- refresh -------------------------------------------------------------

    #[tokio::test]
    async fn falls_back_to_second_retriever() {
        let a = Scripted::failing();
        let b = Scripted::ok(&[1]);
        let src = source(Revalidate::Once, vec![a.clone(), b.clone()]);
        let store = CacheStore::in_memory();

        let outcome = src.refresh(&(), &store).await;

        assert_eq!(outcome, Loadable::live(Batch(vec![1])));
        assert_eq!((a.calls(), b.calls()), (1, 1));
        let record: CacheRecord<Batch> = store.get("test-cache").unwrap();
        assert_eq!(record.payload, Batch(vec![1]));
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let a = Scripted::ok(&[7, 8]);
        let b = Scripted::ok(&[9]);
        let src = source(Revalidate::Once, vec![a, b.clone()]);

        let outcome = src.refresh(&(), &CacheStore::in_memory()).await;

        assert_eq!(outcome.value, Some(Batch(vec![7, 8])));
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn empty_result_tries_next() {
        let a = Scripted::ok(&[]);
        let b = Scripted::ok(&[3]);
        let src = source(Revalidate::Once, vec![a, b]);

        let outcome = src.refresh(&(), &CacheStore::in_memory()).await;
        assert_eq!(outcome.value, Some(Batch(vec![3])));
    }

    #[tokio::test]
    async fn stale_cache_preferred_over_error() {
        let store = CacheStore::in_memory();
        let old = Utc::now() - TimeDelta::hours(2);
        store.put_at("test-cache", &Batch(vec![5]), old);
        let chain = vec![Scripted::failing(), Scripted::failing()];
        let src = source(Revalidate::Once, chain);

        let outcome = src.refresh(&(), &store).await;

        assert_eq!(outcome, Loadable::cached(Batch(vec![5])));
    }

    #[tokio::test]
    async fn total_failure_without_cache_is_error() {
        let src = source(Revalidate::Once, vec![Scripted::failing()]);
        let outcome = src.refresh(&(), &CacheStore::in_memory()).await;
        assert_eq!(outcome, Loadable::error());
    }

    #[tokio::test]
    async fn failed_refresh_never_overwrites_record() {
        let store = CacheStore::in_memory();
        let at = Utc::now() - TimeDelta::minutes(40);
        store.put_at("test-cache", &Batch(vec![5]), at);
        let src = source(Revalidate::Once, vec![Scripted::failing()]);

        src.refresh(&(), &store).await;

        let record: CacheRecord<Batch> = store.get("test-cache").unwrap();
        assert_eq!(record.payload, Batch(vec![5]));
        assert_eq!(record.updated_at.timestamp_millis(), at.timestamp_millis());
    }

    #[test]
    fn chain_names_follow_fallback_order() {
        let chain = vec![Scripted::failing(), Scripted::ok(&[1])];
        let src = source(Revalidate::Once, chain);
        assert_eq!(src.chain_names(), ["scripted", "scripted"]);
    }

    #[tokio::test]
    async fn empty_chain_behaves_like_total_failure() {
        let src = source(Revalidate::Once, Vec::new());
        let outcome = src.refresh(&(), &CacheStore::in_memory()).await;
        assert_eq!(outcome.status, Status::Error);
    }

    // -- peek / wants_fetch --------------------------------------------------

    #[test]
    fn peek_reports_freshness() {
        let store = CacheStore::in_memory();
        let now = Utc::now();
        store.put_at("test-cache", &Batch(vec![1]), now - TimeDelta::minutes(5));
        let src = source(Revalidate::Once, Vec::new());

        let peek = src.peek(&store, now).unwrap();
        assert!(peek.fresh);
        let later = now + TimeDelta::minutes(10);
        assert!(!src.peek(&store, later).unwrap().fresh);
    }

    #[test]
    fn peek_on_empty_cache_is_none() {
        let src = source(Revalidate::Once, Vec::new());
        assert!(src.peek(&CacheStore::in_memory(), Utc::now()).is_none());
    }

    #[test]
    fn revalidation_policy() {
        let fresh = Peek {
            payload: Batch(vec![1]),
            fresh: true,
        };
        let stale = Peek {
            payload: Batch(vec![1]),
            fresh: false,
        };

        let weather = source(Revalidate::Once, Vec::new());
        assert!(weather.wants_fetch(None, true));
        assert!(weather.wants_fetch(Some(&fresh), false));
        assert!(!weather.wants_fetch(Some(&fresh), true));
        assert!(weather.wants_fetch(Some(&stale), true));

        let news = source(Revalidate::WhenStale, Vec::new());
        assert!(news.wants_fetch(None, false));
        assert!(!news.wants_fetch(Some(&fresh), false));
        assert!(news.wants_fetch(Some(&stale), false));
    }

    // -- Loadable / FetchState -----------------------------------------------

    #[test]
    fn merge_keeps_shown_value_on_failure() {
        let mut shown = Loadable::live(Batch(vec![1]));
        shown.merge(Loadable::error());
        assert_eq!(shown, Loadable::cached(Batch(vec![1])));
    }

    #[test]
    fn merge_without_value_takes_outcome_status() {
        let mut shown: Loadable<Batch> = Loadable::loading();
        shown.merge(Loadable::error());
        assert_eq!(shown.status, Status::Error);

        shown.merge(Loadable::live(Batch(vec![2])));
        assert_eq!(shown, Loadable::live(Batch(vec![2])));
    }

    #[test]
    fn fetch_guard_rejects_reentry() {
        let mut state = FetchState::default();
        assert!(state.try_begin());
        assert!(state.is_fetching());
        assert!(!state.try_begin());
        state.finish();
        assert!(state.try_begin());
    }

    #[test]
    fn status_strings() {
        let all = [
            Status::Loading,
            Status::NeedsCity,
            Status::Cached,
            Status::Live,
            Status::Error,
        ];
        let names: Vec<_> = all.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["loading", "needs-city", "cached", "live", "error"]);
    }
}
