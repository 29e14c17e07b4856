//! Architectural Contract Test: Fatal Notifier Authentication
//!
//! Constraints verified:
//! - `NotifyError::Auth` terminates the engine loop with an error
//! - No further cycle runs after the fatal error
//! - State is flushed before the engine returns

mod common;

use clubwatch_core::error::{Error, NotifyError};
use clubwatch_core::traits::StateStore;
use common::*;
use tokio_test::assert_err;

#[tokio::test]
async fn auth_failure_stops_the_engine() {
    let source = ScriptedSource::count("registration_bans").then(Ok(count(5)));
    let notifier = RecordingNotifier::new().then(Err(NotifyError::Auth("401 Unauthorized".into())));
    let store = CountingStateStore::new();
    store
        .put_snapshot("registration_bans", &count(3))
        .await
        .unwrap();

    let (engine, _event_rx) = engine_with(&[&source], &notifier, &store, minimal_config());

    // The shutdown sender is kept alive: only the fatal error may stop the engine
    let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let result = tokio::time::timeout(
        tokio::time::Duration::from_secs(5),
        engine.run_with_shutdown(Some(shutdown_rx)),
    )
    .await
    .expect("engine should stop on its own");

    let err = assert_err!(result);
    assert!(matches!(err, Error::Notify(NotifyError::Auth(_))), "got: {err:?}");
    assert!(err.is_fatal());

    assert_eq!(source.fetch_call_count(), 1, "no further cycle after auth failure");
    assert_eq!(
        store.get_snapshot("registration_bans").await.unwrap(),
        Some(count(3))
    );
    assert_eq!(store.flush_call_count(), 1);
}

#[tokio::test]
async fn auth_failure_skips_remaining_sources() {
    let first = ScriptedSource::count("registration_bans").then(Ok(count(1)));
    let second = ScriptedSource::roster("roster").then(Ok(roster(&[("Ali Yilmaz", "Faal")])));
    let notifier = RecordingNotifier::new().then(Err(NotifyError::Auth("expired token".into())));
    let store = CountingStateStore::new();

    let (engine, _event_rx) = engine_with(&[&first, &second], &notifier, &store, minimal_config());

    assert_err!(engine.run_cycle().await);
    assert_eq!(second.fetch_call_count(), 0);

    // Count baselines are recorded even when the announcement fails
    assert_eq!(
        store.get_snapshot("registration_bans").await.unwrap(),
        Some(count(1))
    );
}
