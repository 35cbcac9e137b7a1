//! The label resolver: eligibility, cache lookup, coalescing and delivery.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::join_all;
use glossa_core::{
    CachedLabel, EligiblePrefixSet, GlossaError, GlossaResult, Label, ResolverConfig,
};
use glossa_sparql::QueryExecutor;
use glossa_storage::{CacheStats, InMemoryLabelCache, LabelStore};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::fetcher::LabelFetcher;
use crate::scheduler::{CancelToken, Generation, SchedulerState};
use crate::subscription::{LabelSubscription, LabelsSubscription};

/// Caches at or below this size are included in full in [`ResolverInspection`].
pub const INSPECTION_SAMPLE_LIMIT: usize = 100;

/// Resolves RDF resource URIs to human-readable labels.
///
/// Requests for uncached URIs are coalesced into batches: a batch is
/// flushed once `max_batch_size` distinct URIs are pending or after the
/// debounce window passes without a new request. Results, including
/// "no label", are cached for the lifetime of the resolver.
///
/// Cloning is cheap; clones share cache and scheduler.
#[derive(Clone)]
pub struct LabelResolver {
    inner: Arc<ResolverInner>,
}

pub(crate) struct ResolverInner {
    config: ResolverConfig,
    prefixes: EligiblePrefixSet,
    cache: Arc<dyn LabelStore>,
    fetcher: LabelFetcher,
    state: Mutex<SchedulerState>,
    runtime: Handle,
}

impl LabelResolver {
    /// Create a resolver with an in-memory cache.
    ///
    /// Must be called from within a tokio runtime; timers and fetches are
    /// spawned onto it.
    pub fn new(executor: Arc<dyn QueryExecutor>, config: ResolverConfig) -> GlossaResult<Self> {
        Self::with_store(executor, Arc::new(InMemoryLabelCache::new()), config)
    }

    /// Create a resolver backed by a caller-supplied store.
    pub fn with_store(
        executor: Arc<dyn QueryExecutor>,
        store: Arc<dyn LabelStore>,
        config: ResolverConfig,
    ) -> GlossaResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| GlossaError::RuntimeUnavailable {
            reason: e.to_string(),
        })?;
        let prefixes = config.eligible_prefixes();
        let fetcher = LabelFetcher::new(executor, config.language.clone(), config.fetch_timeout);
        tracing::debug!(
            prefixes = prefixes.len(),
            max_batch_size = config.max_batch_size,
            debounce_ms = config.debounce_window.as_millis() as u64,
            language = %config.language,
            "label resolver created"
        );
        Ok(Self {
            inner: Arc::new(ResolverInner {
                config,
                prefixes,
                cache: store,
                fetcher,
                state: Mutex::new(SchedulerState::default()),
                runtime,
            }),
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    /// True if `uri` starts with a known namespace prefix.
    pub fn is_eligible(&self, uri: &str) -> bool {
        self.inner.prefixes.is_eligible(uri)
    }

    /// Cache lookup without scheduling. `None` means unknown.
    pub fn get_cached(&self, uri: &str) -> Option<CachedLabel> {
        self.inner.cache.get(uri)
    }

    /// Request the label of `uri`.
    ///
    /// Ineligible and cached URIs invoke `callback` before this returns.
    /// Otherwise `callback` runs once the URI's generation completes, on a
    /// runtime worker, unless the returned handle is cancelled first.
    pub fn request<F>(&self, uri: &str, callback: F) -> RequestHandle
    where
        F: FnOnce(Label) + Send + 'static,
    {
        if let Some(label) = self.inner.immediate(uri) {
            callback(label);
            return RequestHandle::settled(uri);
        }

        let token = CancelToken::new();
        let (id, generation) = {
            let mut state = self.inner.lock_state();
            let id = state.register(uri, token.clone(), Box::new(callback));
            (id, self.inner.schedule(&mut state))
        };
        if let Some(generation) = generation {
            self.inner.dispatch(generation);
        }
        RequestHandle::pending(uri, id, token, Arc::downgrade(&self.inner))
    }

    /// Request many URIs at once.
    ///
    /// All uncached URIs are registered under a single lock and the batching
    /// policy runs once, so a request larger than `max_batch_size` flushes as
    /// one generation split into several sub-batches. Returns one handle per
    /// input URI, in input order.
    pub fn request_many<I, S, F, C>(&self, uris: I, mut make_callback: F) -> Vec<RequestHandle>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str) -> C,
        C: FnOnce(Label) + Send + 'static,
    {
        let mut handles = Vec::new();
        let mut waiting = Vec::new();
        for uri in uris {
            let uri = uri.as_ref();
            let callback = make_callback(uri);
            if let Some(label) = self.inner.immediate(uri) {
                callback(label);
            } else {
                waiting.push((handles.len(), callback));
            }
            handles.push(RequestHandle::settled(uri));
        }
        if waiting.is_empty() {
            return handles;
        }

        let generation = {
            let mut state = self.inner.lock_state();
            for (index, callback) in waiting {
                let uri = handles[index].uri.clone();
                let token = CancelToken::new();
                let id = state.register(&uri, token.clone(), Box::new(callback));
                handles[index] = RequestHandle::pending(&uri, id, token, Arc::downgrade(&self.inner));
            }
            self.inner.schedule(&mut state)
        };
        if let Some(generation) = generation {
            self.inner.dispatch(generation);
        }
        handles
    }

    /// Resolve one URI.
    ///
    /// The request is registered when this is called, not when the future
    /// is first polled, so several `resolve` calls made back to back share
    /// a batch.
    pub fn resolve(&self, uri: &str) -> impl Future<Output = Label> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.request(uri, move |label| {
            let _ = tx.send(label);
        });
        async move { rx.await.unwrap_or(None) }
    }

    /// Resolve a set of URIs; the map has one entry per distinct input URI.
    pub fn resolve_many<I, S>(&self, uris: I) -> impl Future<Output = HashMap<String, Label>> + Send + 'static
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, Label)>();
        self.request_many(uris, |uri| {
            let tx = tx.clone();
            let uri = uri.to_string();
            move |label: Label| {
                let _ = tx.send((uri, label));
            }
        });
        drop(tx);
        async move {
            let mut labels = HashMap::new();
            while let Some((uri, label)) = rx.recv().await {
                labels.insert(uri, label);
            }
            labels
        }
    }

    /// Start a cancellable single-URI subscription.
    pub fn subscribe(&self, uri: &str) -> LabelSubscription {
        let mut subscription = LabelSubscription::new(self.clone());
        subscription.resolve(uri);
        subscription
    }

    /// Start a cancellable subscription over several URIs.
    pub fn subscribe_many<I, S>(&self, uris: I) -> LabelsSubscription
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut subscription = LabelsSubscription::new(self.clone());
        subscription.resolve(uris);
        subscription
    }

    /// Snapshot of resolver internals for debugging.
    pub fn inspect(&self) -> ResolverInspection {
        let (pending_requests, in_flight_generations) = {
            let state = self.inner.lock_state();
            (state.pending_len(), state.in_flight())
        };
        let cache_size = self.inner.cache.len();
        let sample_entries =
            (cache_size <= INSPECTION_SAMPLE_LIMIT).then(|| self.inner.cache.snapshot());
        ResolverInspection {
            cache_size,
            pending_requests,
            eligible_prefixes: self.inner.prefixes.len(),
            in_flight_generations,
            cache_stats: self.inner.cache.stats(),
            sample_entries,
        }
    }

    /// Drop every cached label and every pending request.
    ///
    /// Pending subscribers are discarded without being called. Generations
    /// already in flight still complete and write their results.
    pub fn clear(&self) {
        let discarded = self.inner.lock_state().clear();
        self.inner.cache.clear();
        tracing::info!(discarded_pending = discarded, "label resolver cleared");
    }
}

impl std::fmt::Debug for LabelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelResolver")
            .field("config", &self.inner.config)
            .field("fetcher", &self.inner.fetcher)
            .field("cache_size", &self.inner.cache.len())
            .finish()
    }
}

impl ResolverInner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Label that can be delivered without scheduling, if any.
    fn immediate(&self, uri: &str) -> Option<Label> {
        if !self.prefixes.is_eligible(uri) {
            return Some(None);
        }
        self.cache.get(uri).map(CachedLabel::into_label)
    }

    /// Apply the batching policy after a registration. Returns a generation
    /// that must be dispatched once the lock is released.
    fn schedule(self: &Arc<Self>, state: &mut SchedulerState) -> Option<Generation> {
        if state.pending_len() >= self.config.max_batch_size {
            tracing::trace!(pending = state.pending_len(), "batch size reached, flushing");
            return state.take_generation();
        }
        let epoch = state.next_timer_epoch();
        let window = self.config.debounce_window;
        let weak = Arc::downgrade(self);
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = weak.upgrade() {
                inner.flush_if_current(epoch);
            }
        });
        state.set_timer(timer);
        None
    }

    fn flush_if_current(self: &Arc<Self>, epoch: u64) {
        let generation = {
            let mut state = self.lock_state();
            if !state.is_current_timer(epoch) {
                return;
            }
            state.release_timer();
            state.take_generation()
        };
        if let Some(generation) = generation {
            self.dispatch(generation);
        }
    }

    /// Deliver cache hits and spawn the fetch for the rest.
    fn dispatch(self: &Arc<Self>, mut generation: Generation) {
        let guard = InFlightGuard(Arc::clone(self));
        let uris = std::mem::take(&mut generation.uris);
        let mut to_fetch = Vec::with_capacity(uris.len());
        for uri in uris {
            match self.cache.peek(&uri) {
                Some(cached) => generation.deliver(&uri, &cached.into_label()),
                None => to_fetch.push(uri),
            }
        }
        if to_fetch.is_empty() {
            return;
        }
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let _guard = guard;
            inner.run_generation(generation, to_fetch).await;
        });
    }

    async fn run_generation(&self, mut generation: Generation, uris: Vec<String>) {
        let started = Instant::now();
        let batches = uris.chunks(self.config.max_batch_size);
        let sub_batches = batches.len();
        let results = join_all(batches.map(|chunk| self.fetcher.fetch_batch(chunk))).await;

        let mut fetched: HashMap<String, Label> = HashMap::with_capacity(uris.len());
        for result in results {
            fetched.extend(result);
        }

        let resolved: Vec<(String, Label)> = uris
            .into_iter()
            .map(|uri| {
                let label = fetched.remove(&uri).flatten();
                let canonical = self.cache.set(&uri, label).into_label();
                (uri, canonical)
            })
            .collect();

        tracing::debug!(
            generation = generation.id,
            uris = resolved.len(),
            sub_batches,
            labelled = resolved.iter().filter(|(_, l)| l.is_some()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "label generation resolved"
        );

        for (uri, label) in &resolved {
            generation.deliver(uri, label);
        }
    }
}

/// Decrements the in-flight counter when a generation ends, even if the
/// fetch task is aborted.
struct InFlightGuard(Arc<ResolverInner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.lock_state().finish_generation();
    }
}

/// Debug view returned by [`LabelResolver::inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct ResolverInspection {
    pub cache_size: usize,
    pub pending_requests: usize,
    pub eligible_prefixes: usize,
    pub in_flight_generations: usize,
    pub cache_stats: CacheStats,
    /// Full cache contents, present only for small caches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_entries: Option<BTreeMap<String, CachedLabel>>,
}

/// Handle to one request made through [`LabelResolver::request`].
#[derive(Debug)]
pub struct RequestHandle {
    uri: String,
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    /// The callback already ran.
    Settled,
    Pending {
        id: u64,
        token: CancelToken,
        resolver: Weak<ResolverInner>,
    },
}

impl RequestHandle {
    fn settled(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            state: HandleState::Settled,
        }
    }

    fn pending(uri: &str, id: u64, token: CancelToken, resolver: Weak<ResolverInner>) -> Self {
        Self {
            uri: uri.to_string(),
            state: HandleState::Pending { id, token, resolver },
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// True if the callback ran before the request call returned.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, HandleState::Settled)
    }

    /// Stop the callback from running. The fetch itself is not aborted and
    /// still populates the cache. Cancelling after delivery has no effect.
    pub fn cancel(&self) {
        if let HandleState::Pending { id, token, resolver } = &self.state {
            token.cancel();
            if let Some(inner) = resolver.upgrade() {
                inner.lock_state().remove_subscriber(&self.uri, *id);
            }
        }
    }
}
