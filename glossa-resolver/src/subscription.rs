//! Cancellable label views for reactive consumers.
//!
//! A subscription runs in cycles. Each call to `resolve` cancels the
//! previous cycle, so a late result for an old URI can never overwrite the
//! state of a newer one. Cancellation only silences the subscription: the
//! shared fetch still runs and still fills the cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glossa_core::Label;
use serde::Serialize;
use tokio::sync::watch;

use crate::resolver::{LabelResolver, RequestHandle};
use crate::scheduler::CancelToken;

/// Observable state of a [`LabelSubscription`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubscriptionState {
    Idle,
    Loading { uri: String },
    Resolved { uri: String, label: Label },
    Cancelled,
}

impl SubscriptionState {
    pub fn label(&self) -> Option<&str> {
        match self {
            SubscriptionState::Resolved { label, .. } => label.as_deref(),
            _ => None,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            SubscriptionState::Loading { uri } | SubscriptionState::Resolved { uri, .. } => {
                Some(uri.as_str())
            }
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SubscriptionState::Loading { .. })
    }
}

/// Tracks the label of one URI at a time.
pub struct LabelSubscription {
    resolver: LabelResolver,
    state: Arc<watch::Sender<SubscriptionState>>,
    receiver: watch::Receiver<SubscriptionState>,
    cycle: CancelToken,
    current: Option<RequestHandle>,
}

impl LabelSubscription {
    /// An idle subscription; call [`resolve`](Self::resolve) to start.
    pub fn new(resolver: LabelResolver) -> Self {
        let (sender, receiver) = watch::channel(SubscriptionState::Idle);
        Self {
            resolver,
            state: Arc::new(sender),
            receiver,
            cycle: CancelToken::new(),
            current: None,
        }
    }

    /// Point the subscription at `uri`, cancelling whatever it was doing.
    ///
    /// An empty `uri` leaves the subscription idle. Ineligible and cached
    /// URIs resolve before this returns.
    pub fn resolve(&mut self, uri: &str) {
        self.end_cycle();
        self.cycle = CancelToken::new();
        self.state.send_replace(SubscriptionState::Idle);

        if uri.is_empty() {
            return;
        }
        if !self.resolver.is_eligible(uri) {
            self.state.send_replace(SubscriptionState::Resolved {
                uri: uri.to_string(),
                label: None,
            });
            return;
        }

        // a cache hit runs the callback inside `request`
        self.state.send_replace(SubscriptionState::Loading {
            uri: uri.to_string(),
        });
        let sender = Arc::clone(&self.state);
        let cycle = self.cycle.clone();
        let target = uri.to_string();
        self.current = Some(self.resolver.request(uri, move |label| {
            sender.send_if_modified(|state| {
                if cycle.is_cancelled() {
                    return false;
                }
                *state = SubscriptionState::Resolved { uri: target, label };
                true
            });
        }));
    }

    pub fn state(&self) -> SubscriptionState {
        self.receiver.borrow().clone()
    }

    /// The resolved label, or `None` while idle, loading or unlabelled.
    pub fn label(&self) -> Label {
        self.receiver.borrow().label().map(str::to_string)
    }

    pub fn uri(&self) -> Option<String> {
        self.receiver.borrow().uri().map(str::to_string)
    }

    pub fn is_loading(&self) -> bool {
        self.receiver.borrow().is_loading()
    }

    /// A receiver for observing state changes elsewhere.
    pub fn watch(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Wait for the next state change and return the new state.
    pub async fn changed(&mut self) -> SubscriptionState {
        // the sender lives as long as `self`, so this cannot fail
        let _ = self.receiver.changed().await;
        self.receiver.borrow_and_update().clone()
    }

    /// Wait until the subscription is no longer loading.
    pub async fn settled(&mut self) -> SubscriptionState {
        let settled = self
            .receiver
            .wait_for(|state| !state.is_loading())
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Stop listening. The subscription ends in [`SubscriptionState::Cancelled`]
    /// and later results are ignored.
    pub fn cancel(&mut self) {
        self.end_cycle();
        self.state.send_replace(SubscriptionState::Cancelled);
    }

    fn end_cycle(&mut self) {
        self.cycle.cancel();
        if let Some(handle) = self.current.take() {
            handle.cancel();
        }
    }
}

impl Drop for LabelSubscription {
    fn drop(&mut self) {
        self.end_cycle();
    }
}

impl std::fmt::Debug for LabelSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelSubscription")
            .field("state", &*self.receiver.borrow())
            .finish()
    }
}

/// Observable state of a [`LabelsSubscription`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelsSnapshot {
    /// Resolved labels keyed by URI. Ineligible URIs are left out.
    pub labels: HashMap<String, Label>,
    /// URIs still waiting for a fetch.
    pub pending: usize,
    /// Set by [`LabelsSubscription::cancel`]; later results are ignored.
    pub cancelled: bool,
}

impl LabelsSnapshot {
    pub fn is_loading(&self) -> bool {
        self.pending > 0
    }
}

/// Tracks the labels of a set of URIs.
pub struct LabelsSubscription {
    resolver: LabelResolver,
    state: Arc<watch::Sender<LabelsSnapshot>>,
    receiver: watch::Receiver<LabelsSnapshot>,
    cycle: CancelToken,
    handles: Vec<RequestHandle>,
}

impl LabelsSubscription {
    pub fn new(resolver: LabelResolver) -> Self {
        let (sender, receiver) = watch::channel(LabelsSnapshot::default());
        Self {
            resolver,
            state: Arc::new(sender),
            receiver,
            cycle: CancelToken::new(),
            handles: Vec::new(),
        }
    }

    /// Replace the tracked set with `uris`, cancelling earlier requests.
    ///
    /// Ineligible URIs are dropped, cached ones are filled in immediately,
    /// and the rest are requested together.
    pub fn resolve<I, S>(&mut self, uris: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.end_cycle();
        self.cycle = CancelToken::new();

        let mut seen = HashSet::new();
        let mut tracked = Vec::new();
        for uri in uris {
            let uri = uri.as_ref();
            if self.resolver.is_eligible(uri) && seen.insert(uri.to_string()) {
                tracked.push(uri.to_string());
            }
        }

        // cache hits are filled in by their callbacks before request_many returns
        self.state.send_replace(LabelsSnapshot {
            pending: tracked.len(),
            ..LabelsSnapshot::default()
        });
        if tracked.is_empty() {
            return;
        }

        let sender = Arc::clone(&self.state);
        let cycle = self.cycle.clone();
        self.handles = self.resolver.request_many(&tracked, |uri| {
            let sender = Arc::clone(&sender);
            let cycle = cycle.clone();
            let uri = uri.to_string();
            move |label: Label| {
                sender.send_if_modified(|snapshot| {
                    if cycle.is_cancelled() || snapshot.labels.contains_key(&uri) {
                        return false;
                    }
                    snapshot.labels.insert(uri, label);
                    snapshot.pending = snapshot.pending.saturating_sub(1);
                    true
                });
            }
        });
    }

    pub fn snapshot(&self) -> LabelsSnapshot {
        self.receiver.borrow().clone()
    }

    pub fn labels(&self) -> HashMap<String, Label> {
        self.receiver.borrow().labels.clone()
    }

    /// Label of one tracked URI; `None` if unresolved, unlabelled or untracked.
    pub fn label(&self, uri: &str) -> Label {
        self.receiver.borrow().labels.get(uri).cloned().flatten()
    }

    pub fn pending_count(&self) -> usize {
        self.receiver.borrow().pending
    }

    pub fn is_loading(&self) -> bool {
        self.receiver.borrow().is_loading()
    }

    pub fn watch(&self) -> watch::Receiver<LabelsSnapshot> {
        self.state.subscribe()
    }

    pub async fn changed(&mut self) -> LabelsSnapshot {
        let _ = self.receiver.changed().await;
        self.receiver.borrow_and_update().clone()
    }

    /// Wait until nothing is pending.
    pub async fn settled(&mut self) -> LabelsSnapshot {
        let settled = self
            .receiver
            .wait_for(|snapshot| !snapshot.is_loading())
            .await
            .map(|snapshot| snapshot.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Stop listening. Labels resolved so far are kept, nothing is left
    /// pending and the snapshot is marked cancelled.
    pub fn cancel(&mut self) {
        self.end_cycle();
        self.state.send_modify(|snapshot| {
            snapshot.pending = 0;
            snapshot.cancelled = true;
        });
    }

    fn end_cycle(&mut self) {
        self.cycle.cancel();
        for handle in self.handles.drain(..) {
            handle.cancel();
        }
    }
}

impl Drop for LabelsSubscription {
    fn drop(&mut self) {
        self.end_cycle();
    }
}

impl std::fmt::Debug for LabelsSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelsSubscription")
            .field("snapshot", &*self.receiver.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossa_core::ResolverConfig;
    use glossa_test_utils::{fixtures, MockQueryExecutor};
    use std::time::Duration;

    fn setup(pairs: &[(&str, &str)]) -> (Arc<MockQueryExecutor>, LabelResolver) {
        let mock = Arc::new(MockQueryExecutor::with_dataset(fixtures::labelled_dataset(pairs)));
        let resolver = LabelResolver::new(mock.clone(), ResolverConfig::default()).unwrap();
        (mock, resolver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_loading_resolved() {
        let uri = fixtures::authority_uri("country", "ITA");
        let (_, resolver) = setup(&[(uri.as_str(), "Italy")]);
        let mut subscription = LabelSubscription::new(resolver);
        assert_eq!(subscription.state(), SubscriptionState::Idle);

        subscription.resolve(&uri);
        assert!(subscription.is_loading());
        assert_eq!(subscription.uri().as_deref(), Some(uri.as_str()));

        let state = subscription.settled().await;
        assert_eq!(
            state,
            SubscriptionState::Resolved {
                uri: uri.clone(),
                label: Some("Italy".to_string())
            }
        );
        assert_eq!(subscription.label().as_deref(), Some("Italy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_uri_resolves_immediately() {
        let uri = fixtures::authority_uri("country", "AUT");
        let (mock, resolver) = setup(&[(uri.as_str(), "Austria")]);
        resolver.subscribe(&uri).settled().await;
        let stats = resolver.inspect().cache_stats;
        assert_eq!((stats.hits, stats.misses), (0, 1));

        let subscription = resolver.subscribe(&uri);
        assert_eq!(subscription.label().as_deref(), Some("Austria"));
        assert!(!subscription.is_loading());
        assert_eq!(mock.call_count(), 1);
        let stats = resolver.inspect().cache_stats;
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_uri_stays_idle() {
        let (mock, resolver) = setup(&[]);
        let subscription = resolver.subscribe("");
        assert_eq!(subscription.state(), SubscriptionState::Idle);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ineligible_resolves_immediately() {
        let (_, resolver) = setup(&[]);
        let subscription = resolver.subscribe("mailto:someone@example.org");
        assert_eq!(
            subscription.state(),
            SubscriptionState::Resolved {
                uri: "mailto:someone@example.org".to_string(),
                label: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retarget_ignores_old_result() {
        let first = fixtures::authority_uri("country", "ESP");
        let second = fixtures::authority_uri("country", "PRT");
        let (mock, resolver) = setup(&[(first.as_str(), "Spain"), (second.as_str(), "Portugal")]);
        let mut subscription = resolver.subscribe(&first);
        subscription.resolve(&second);

        let state = subscription.settled().await;
        assert_eq!(state.label(), Some("Portugal"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(subscription.label().as_deref(), Some("Portugal"));
        // both were fetched in one batch and cached
        assert_eq!(mock.call_count(), 1);
        assert!(resolver.get_cached(&first).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_cancelled_state() {
        let uri = fixtures::authority_uri("country", "NLD");
        let (_, resolver) = setup(&[(uri.as_str(), "Netherlands")]);
        let mut subscription = resolver.subscribe(&uri);
        let mut watcher = subscription.watch();
        subscription.cancel();
        assert_eq!(subscription.state(), SubscriptionState::Cancelled);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*watcher.borrow_and_update(), SubscriptionState::Cancelled);
        assert_eq!(
            resolver.resolve(&uri).await.as_deref(),
            Some("Netherlands")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_labels_subscription_tracks_pending() {
        let a = fixtures::authority_uri("currency", "EUR");
        let b = fixtures::authority_uri("currency", "USD");
        let (_, resolver) = setup(&[(a.as_str(), "Euro")]);
        assert_eq!(resolver.resolve(&a).await.as_deref(), Some("Euro"));

        let mut subscription = resolver.subscribe_many([
            a.as_str(),
            b.as_str(),
            b.as_str(),
            "urn:isbn:0451450523",
        ]);
        let snapshot = subscription.snapshot();
        assert_eq!(snapshot.pending, 1);
        assert!(snapshot.is_loading());
        assert_eq!(snapshot.labels.get(&a), Some(&Some("Euro".to_string())));
        assert!(!snapshot.labels.contains_key("urn:isbn:0451450523"));
        // one lookup each: the earlier miss for `a`, then a hit and a miss
        let stats = resolver.inspect().cache_stats;
        assert_eq!((stats.hits, stats.misses), (1, 2));

        let settled = subscription.settled().await;
        assert_eq!(settled.pending, 0);
        assert_eq!(settled.labels.len(), 2);
        assert_eq!(subscription.label(&b), None);
        assert!(!subscription.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_labels_subscription_resolve_cancels_previous() {
        let a = fixtures::authority_uri("currency", "GBP");
        let b = fixtures::authority_uri("currency", "CHF");
        let (_, resolver) = setup(&[(a.as_str(), "Pound sterling"), (b.as_str(), "Swiss franc")]);
        let mut subscription = resolver.subscribe_many([a.as_str()]);
        subscription.resolve([b.as_str()]);

        let settled = subscription.settled().await;
        assert_eq!(settled.labels.len(), 1);
        assert_eq!(subscription.label(&b).as_deref(), Some("Swiss franc"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!subscription.labels().contains_key(&a));
    }

    #[tokio::test(start_paused = true)]
    async fn test_labels_subscription_cancel_settles() {
        let uri = fixtures::authority_uri("country", "BEL");
        let (_, resolver) = setup(&[(uri.as_str(), "Belgium")]);
        let mut subscription = resolver.subscribe_many([uri.as_str()]);
        assert!(subscription.is_loading());
        subscription.cancel();

        let settled = tokio::time::timeout(Duration::from_secs(5), subscription.settled())
            .await
            .expect("cancelled subscription should settle");
        assert!(settled.cancelled);
        assert_eq!(settled.pending, 0);
        assert!(!subscription.is_loading());

        // the fetch still runs and fills the cache, the snapshot ignores it
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(subscription.labels().is_empty());
        assert!(resolver.get_cached(&uri).is_some());

        subscription.resolve([uri.as_str()]);
        let snapshot = subscription.snapshot();
        assert!(!snapshot.cancelled);
        assert_eq!(snapshot.labels.get(&uri), Some(&Some("Belgium".to_string())));
    }
}
