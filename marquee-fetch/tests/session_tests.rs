//! Identity switches and logout.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{
    InstrumentedResolver, RecordingLoader, counting_fetcher, movie, scheduler,
};
use marquee_config::FetchLayerConfig;
use marquee_fetch::prelude::*;

fn manager() -> (SessionManager<String>, Arc<PrefetchScheduler>) {
    let (prefetch, _) = scheduler(4);
    let manager =
        SessionManager::new(FetchLayerConfig::default(), Arc::clone(&prefetch));
    (manager, prefetch)
}

#[tokio::test(start_paused = true)]
async fn switching_identity_tears_down_the_previous_scope() {
    let (manager, _) = manager();
    let calls = Arc::new(AtomicUsize::new(0));

    let alice = manager.switch_identity("alice");
    alice.store().execute_query(
        "library:movies",
        alice.query_config(),
        counting_fetcher(calls.clone(), Duration::from_secs(30), |n| {
            Ok(format!("alice page {n}"))
        }),
    );
    alice.store().set_query_data("profile", "alice".to_owned());
    assert_eq!(alice.store().in_flight_count(), 1);

    let bob = manager.switch_identity("bob");

    assert!(alice.is_torn_down());
    assert!(alice.store().is_shut_down());
    assert_eq!(alice.store().in_flight_count(), 0);
    assert!(alice.store().keys().is_empty());
    assert!(!bob.is_torn_down());
    assert!(bob.store().get_query("profile").data.is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(alice.store().get_query("library:movies").data.is_none());
    assert!(bob.store().keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reselecting_the_active_identity_keeps_the_scope() {
    let (manager, _) = manager();

    let first = manager.switch_identity("alice");
    first.store().set_query_data("profile", "alice".to_owned());
    let again = manager.switch_identity("alice");

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!first.is_torn_down());
    let profile = again.store().get_query("profile");
    assert_eq!(profile.data.as_deref(), Some("alice"));
}

#[tokio::test(start_paused = true)]
async fn torn_down_store_ignores_new_queries() {
    let (manager, _) = manager();
    let calls = Arc::new(AtomicUsize::new(0));

    let alice = manager.switch_identity("alice");
    manager.switch_identity("bob");

    let state = alice.store().execute_query(
        "late",
        alice.query_config(),
        counting_fetcher(calls.clone(), Duration::ZERO, |_| Ok(String::new())),
    );
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!state.is_loading);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn logout_clears_session_and_prefetch_caches() {
    let (manager, prefetch) = manager();
    let resolver = InstrumentedResolver::new(Duration::from_millis(10));

    let scope = manager.switch_identity("alice");
    let cached = scope
        .fetch_cached("home", Duration::from_secs(60), |_| async {
            Ok("home rows".to_owned())
        })
        .await;
    assert_eq!(cached.as_deref(), Ok("home rows"));
    let cancel = CancellationToken::new();
    prefetch
        .preload_critical(&[movie("m1")], &resolver, 10, &cancel)
        .await;
    assert_eq!(prefetch.cached_url_count(), 1);

    manager.switch_identity("bob");
    assert_eq!(prefetch.cached_url_count(), 1);
    assert_eq!(scope.cached_len(), 0);

    manager.logout();
    assert!(manager.current().is_none());
    assert_eq!(prefetch.cached_url_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn scope_observer_polls_the_session_store() {
    let (manager, _) = manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let scope = manager.switch_identity("alice");
    let mut observer = scope.observer();

    let state = observer.observe(
        "continue-watching",
        scope.query_config(),
        counting_fetcher(calls.clone(), Duration::from_millis(200), |_| {
            Ok("row".to_owned())
        }),
    );
    assert!(state.is_loading);

    let state = observer.settle("continue-watching").await;
    assert_eq!(state.data.as_deref(), Some("row"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn manager_from_env_applies_loaded_settings() {
    let user_dir = tempfile::tempdir().expect("config dir");
    unsafe {
        std::env::set_var("MARQUEE_SKIP_DOTENV", "1");
        std::env::set_var("MARQUEE_CONFIG_DIR", user_dir.path());
        std::env::set_var(
            "MARQUEE_CONFIG_JSON",
            r#"{
                "cache": {"capacity": 2},
                "prefetch": {"max_concurrent": 3, "critical_max_items": 1}
            }"#,
        );
    }

    let loaded = SessionManager::<String>::from_env(Arc::new(
        RecordingLoader::default(),
    ));
    unsafe {
        std::env::remove_var("MARQUEE_CONFIG_JSON");
        std::env::remove_var("MARQUEE_CONFIG_DIR");
    }
    let manager = loaded.expect("configuration loads");

    assert_eq!(manager.config().cache.capacity, 2);
    assert_eq!(manager.prefetch().capacity(), 3);
    assert_eq!(manager.prefetch().options().critical_max_items, 1);
    assert!(manager.current().is_none());
}
