//! Resolution properties of `LabelResolver`
//!
//! - A URI is unknown until resolved and stable afterwards
//! - Ineligible input never reaches the executor
//! - Label priority: prefLabel@lang, label@lang, untagged label, none
//! - A failed sub-batch only affects its own URIs
//! - Cancelled subscribers are never notified, the cache still fills

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glossa_core::{CachedLabel, Label, ResolverConfig};
use glossa_resolver::LabelResolver;
use glossa_storage::{InMemoryLabelCache, LabelStore};
use glossa_test_utils::{fixtures, generators, MockQueryExecutor};
use proptest::prelude::*;

fn resolver_for(mock: &Arc<MockQueryExecutor>) -> LabelResolver {
    LabelResolver::new(mock.clone(), ResolverConfig::default()).unwrap()
}

// ============================================================================
// CACHE STABILITY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn unknown_before_stable_after() {
    let uri = fixtures::authority_uri("country", "BEL");
    let mock = Arc::new(MockQueryExecutor::with_dataset(fixtures::labelled_dataset(&[(
        uri.as_str(),
        "Belgium",
    )])));
    let resolver = resolver_for(&mock);

    assert_eq!(resolver.get_cached(&uri), None);
    assert_eq!(resolver.resolve(&uri).await.as_deref(), Some("Belgium"));
    assert_eq!(
        resolver.get_cached(&uri),
        Some(CachedLabel::Label("Belgium".to_string()))
    );

    // served synchronously from cache
    let delivered = Arc::new(AtomicUsize::new(0));
    let seen = delivered.clone();
    let handle = resolver.request(&uri, move |label| {
        assert_eq!(label.as_deref(), Some("Belgium"));
        seen.fetch_add(1, Ordering::SeqCst);
    });
    assert!(handle.is_settled());
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.resolve(&uri).await.as_deref(), Some("Belgium"));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn absent_label_is_cached_and_not_refetched() {
    let uri = fixtures::authority_uri("country", "XXX");
    let mock = Arc::new(MockQueryExecutor::new());
    let resolver = resolver_for(&mock);

    assert_eq!(resolver.resolve(&uri).await, None);
    assert_eq!(resolver.get_cached(&uri), Some(CachedLabel::Absent));
    assert_eq!(resolver.resolve(&uri).await, None);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn injected_store_is_consulted() {
    let uri = fixtures::authority_uri("language", "FRA");
    let store = Arc::new(InMemoryLabelCache::new());
    store.set(&uri, Some("French".to_string()));
    let mock = Arc::new(MockQueryExecutor::new());
    let resolver =
        LabelResolver::with_store(mock.clone(), store.clone(), ResolverConfig::default()).unwrap();

    assert_eq!(resolver.resolve(&uri).await.as_deref(), Some("French"));
    assert_eq!(mock.call_count(), 0);
    assert_eq!(store.stats().hits, 1);
}

#[tokio::test(start_paused = true)]
async fn each_lookup_is_counted_once() {
    let uri = fixtures::authority_uri("language", "DEU");
    let mock = Arc::new(MockQueryExecutor::with_dataset(fixtures::labelled_dataset(&[(
        uri.as_str(),
        "German",
    )])));
    let resolver = resolver_for(&mock);

    resolver.resolve(&uri).await;
    let stats = resolver.inspect().cache_stats;
    assert_eq!((stats.hits, stats.misses), (0, 1));

    resolver.resolve(&uri).await;
    let stats = resolver.inspect().cache_stats;
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn panicking_callback_does_not_block_other_requests() {
    let uri = fixtures::authority_uri("language", "ITA");
    let mock = Arc::new(MockQueryExecutor::with_dataset(fixtures::labelled_dataset(&[(
        uri.as_str(),
        "Italian",
    )])));
    let resolver = resolver_for(&mock);

    let _handle = resolver.request(&uri, |_: Label| panic!("subscriber failure"));
    let label = resolver.resolve(&uri).await;
    assert_eq!(label.as_deref(), Some("Italian"));
    assert_eq!(resolver.inspect().in_flight_generations, 0);
}

// ============================================================================
// ELIGIBILITY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn ineligible_inputs_resolve_to_none_without_fetching() {
    let mock = Arc::new(MockQueryExecutor::new());
    let resolver = resolver_for(&mock);

    for uri in ["", "https://example.org/x", "urn:isbn:0451450523", "not a uri"] {
        assert!(!resolver.is_eligible(uri));
        assert_eq!(resolver.resolve(uri).await, None);
        assert_eq!(resolver.get_cached(uri), None);
    }
    let labels = resolver
        .resolve_many(["https://example.org/a", "https://example.org/b"])
        .await;
    assert_eq!(labels.len(), 2);
    assert!(labels.values().all(Option::is_none));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(mock.call_count(), 0);
    assert_eq!(resolver.inspect().cache_size, 0);
}

#[tokio::test(start_paused = true)]
async fn extra_prefixes_replace_fixed_extras() {
    let mock = Arc::new(MockQueryExecutor::new());
    let config = ResolverConfig::default().with_extra_prefixes(["https://example.org/vocab/"]);
    let resolver = LabelResolver::new(mock.clone(), config).unwrap();
    assert!(resolver.is_eligible("https://example.org/vocab/Thing"));
    assert!(!resolver.is_eligible("https://example.org/other/Thing"));
    assert!(!resolver.is_eligible("http://data.europa.eu/cpv/cpv/45000000"));
    // registry namespaces are unaffected
    assert!(resolver.is_eligible("http://www.w3.org/2004/02/skos/core#Concept"));
}

proptest! {
    /// Property: ineligible URIs are answered inline and never scheduled.
    #[test]
    fn prop_ineligible_answered_synchronously(uri in generators::arb_ineligible_uri()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let mock = Arc::new(MockQueryExecutor::new());
        let resolver = resolver_for(&mock);

        let delivered: Arc<std::sync::Mutex<Option<Label>>> = Arc::default();
        let sink = delivered.clone();
        let handle = resolver.request(&uri, move |label| {
            *sink.lock().unwrap() = Some(label);
        });

        prop_assert!(handle.is_settled());
        prop_assert_eq!(delivered.lock().unwrap().clone(), Some(None));
        prop_assert_eq!(resolver.inspect().pending_requests, 0);
        prop_assert_eq!(mock.call_count(), 0);
    }

    /// Property: eligible URIs are never answered inline on a cold cache.
    #[test]
    fn prop_eligible_uri_is_scheduled(uri in generators::arb_eligible_uri()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let mock = Arc::new(MockQueryExecutor::new());
        let resolver = resolver_for(&mock);

        prop_assert!(resolver.is_eligible(&uri));
        let handle = resolver.request(&uri, |_| {});
        prop_assert!(!handle.is_settled());
        prop_assert_eq!(resolver.inspect().pending_requests, 1);
    }
}

// ============================================================================
// LABEL PRIORITY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn label_priority_tiers() {
    let a = fixtures::authority_uri("corporate-body", "A");
    let b = fixtures::authority_uri("corporate-body", "B");
    let c = fixtures::authority_uri("corporate-body", "C");
    let d = fixtures::authority_uri("corporate-body", "D");
    let mock = Arc::new(MockQueryExecutor::with_dataset(vec![
        fixtures::rdfs_label(&a, "A untagged", None),
        fixtures::rdfs_label(&a, "A label", Some("en")),
        fixtures::pref_label(&a, "A preferred", Some("en")),
        fixtures::rdfs_label(&b, "B untagged", None),
        fixtures::rdfs_label(&b, "B label", Some("en")),
        fixtures::pref_label(&b, "B préféré", Some("fr")),
        fixtures::rdfs_label(&c, "C untagged", None),
        fixtures::pref_label(&d, "D bevorzugt", Some("de")),
        fixtures::rdfs_label(&d, "D étiquette", Some("fr")),
    ]));
    let resolver = resolver_for(&mock);

    let labels = resolver.resolve_many([&a, &b, &c, &d]).await;
    assert_eq!(labels[&a].as_deref(), Some("A preferred"));
    assert_eq!(labels[&b].as_deref(), Some("B label"));
    assert_eq!(labels[&c].as_deref(), Some("C untagged"));
    assert_eq!(labels[&d], None);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn preferred_language_is_configurable() {
    let uri = fixtures::authority_uri("country", "DEU");
    let mock = Arc::new(MockQueryExecutor::with_dataset(vec![
        fixtures::pref_label(&uri, "Germany", Some("en")),
        fixtures::pref_label(&uri, "Deutschland", Some("de")),
    ]));
    let resolver =
        LabelResolver::new(mock.clone(), ResolverConfig::default().with_language("de")).unwrap();

    assert_eq!(resolver.resolve(&uri).await.as_deref(), Some("Deutschland"));
    assert!(mock.calls()[0].query.contains(r#"= "de""#));
}

// ============================================================================
// FAILURE ISOLATION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn failed_sub_batch_only_affects_its_uris() {
    let uris = fixtures::numbered_uris(25);
    let pairs: Vec<(&str, &str)> = uris.iter().map(|u| (u.as_str(), "label")).collect();
    let mock = Arc::new(MockQueryExecutor::with_dataset(fixtures::labelled_dataset(&pairs)));
    mock.fail_when_requested(uris[22].clone());
    let resolver = resolver_for(&mock);

    let labels = resolver.resolve_many(&uris).await;
    assert_eq!(labels.len(), 25);
    for uri in &uris[..20] {
        assert_eq!(labels[uri].as_deref(), Some("label"), "{}", uri);
    }
    for uri in &uris[20..] {
        assert_eq!(labels[uri], None, "{}", uri);
        assert_eq!(resolver.get_cached(uri), Some(CachedLabel::Absent));
    }
    glossa_test_utils::assert_batch_sizes(&mock, &[20, 5]);

    // failures are cached as absent, not retried
    assert_eq!(resolver.resolve(&uris[22]).await, None);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn parse_failure_resolves_to_none() {
    let uri = fixtures::authority_uri("country", "AUT");
    let mock = Arc::new(MockQueryExecutor::with_dataset(fixtures::labelled_dataset(&[(
        uri.as_str(),
        "Austria",
    )])));
    mock.fail_parse_when_requested(uri.clone());
    let resolver = resolver_for(&mock);
    assert_eq!(resolver.resolve(&uri).await, None);
    assert_eq!(resolver.get_cached(&uri), Some(CachedLabel::Absent));
}

#[tokio::test(start_paused = true)]
async fn hung_fetch_times_out_to_absent() {
    let uri = fixtures::authority_uri("country", "POL");
    let mock = Arc::new(MockQueryExecutor::new());
    mock.hang_when_requested(uri.clone());
    let config = ResolverConfig::default().with_fetch_timeout(Some(Duration::from_secs(2)));
    let resolver = LabelResolver::new(mock.clone(), config).unwrap();

    let started = tokio::time::Instant::now();
    assert_eq!(resolver.resolve(&uri).await, None);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(resolver.get_cached(&uri), Some(CachedLabel::Absent));
    assert_eq!(resolver.inspect().in_flight_generations, 0);
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cancelled_subscriber_is_not_notified() {
    let uri = fixtures::authority_uri("country", "SWE");
    let mock = Arc::new(MockQueryExecutor::with_dataset(fixtures::labelled_dataset(&[(
        uri.as_str(),
        "Sweden",
    )])));
    let resolver = resolver_for(&mock);

    let notified = Arc::new(AtomicUsize::new(0));
    let seen = notified.clone();
    let cancelled = resolver.request(&uri, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let kept = resolver.resolve(&uri);
    cancelled.cancel();

    assert_eq!(kept.await.as_deref(), Some("Sweden"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(notified.load(Ordering::SeqCst), 0);

    // the shared fetch filled the cache
    assert_eq!(resolver.resolve(&uri).await.as_deref(), Some("Sweden"));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_subscription_still_fills_cache() {
    let uri = fixtures::authority_uri("country", "FIN");
    let mock = Arc::new(MockQueryExecutor::with_dataset(fixtures::labelled_dataset(&[(
        uri.as_str(),
        "Finland",
    )])));
    let resolver = resolver_for(&mock);

    let subscription = resolver.subscribe(&uri);
    assert!(subscription.is_loading());
    drop(subscription);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(mock.call_count(), 1);
    let again = resolver.subscribe(&uri);
    assert_eq!(again.label().as_deref(), Some("Finland"));
}
