//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without talking to any remote system.

#![allow(dead_code)]

use clubwatch_core::config::EngineConfig;
use clubwatch_core::error::{FetchError, NotifyError, Result};
use clubwatch_core::model::{NotificationId, PlayerRecord, RosterSnapshot, ScalarSnapshot, Snapshot};
use clubwatch_core::traits::{BaselinePersistence, Notifier, Source, SourceState, StateStore};
use clubwatch_core::engine::{EngineEvent, WatchEngine};
use clubwatch_core::MemoryStateStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A source replaying scripted fetch results
///
/// Results are consumed in order; once the script is exhausted the last
/// result is repeated. Clones share the script and the call counter.
#[derive(Clone)]
pub struct ScriptedSource {
    id: String,
    policy: BaselinePersistence,
    script: Arc<Mutex<VecDeque<std::result::Result<Snapshot, FetchError>>>>,
    last: Arc<Mutex<Option<std::result::Result<Snapshot, FetchError>>>>,
    fetch_call_count: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(id: &str, policy: BaselinePersistence) -> Self {
        Self {
            id: id.to_string(),
            policy,
            script: Arc::new(Mutex::new(VecDeque::new())),
            last: Arc::new(Mutex::new(None)),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A count source (baselines recorded regardless of notify outcome)
    pub fn count(id: &str) -> Self {
        Self::new(id, BaselinePersistence::RecordAlways)
    }

    /// A roster source (baselines recorded only after notify)
    pub fn roster(id: &str) -> Self {
        Self::new(id, BaselinePersistence::AfterNotify)
    }

    /// Append a result to the script
    pub fn then(self, result: std::result::Result<Snapshot, FetchError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    /// Get the number of times fetch() was called
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Source for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> std::result::Result<Snapshot, FetchError> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(result) = next {
            *last = Some(result);
        }
        last.clone()
            .unwrap_or_else(|| Err(FetchError::transport("script is empty")))
    }

    fn baseline_persistence(&self) -> BaselinePersistence {
        self.policy
    }
}

/// A notifier recording every text and replaying scripted failures
///
/// Once the script is exhausted every send succeeds.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    script: Arc<Mutex<VecDeque<std::result::Result<(), NotifyError>>>>,
    send_call_count: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome for the next send
    pub fn then(self, result: std::result::Result<(), NotifyError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    /// Texts delivered successfully
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Get the number of times send() was called
    pub fn send_call_count(&self) -> usize {
        self.send_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> std::result::Result<NotificationId, NotifyError> {
        let call = self.send_call_count.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(Err(e)) = self.script.lock().unwrap().pop_front() {
            return Err(e);
        }

        self.sent.lock().unwrap().push(text.to_string());
        Ok(NotificationId::new(call.to_string()))
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// A StateStore counting writes and flushes on top of a memory store
#[derive(Clone, Default)]
pub struct CountingStateStore {
    inner: MemoryStateStore,
    put_call_count: Arc<AtomicUsize>,
    flush_call_count: Arc<AtomicUsize>,
}

impl CountingStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of snapshot writes
    pub fn put_call_count(&self) -> usize {
        self.put_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times flush() was called
    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StateStore for CountingStateStore {
    async fn get_state(&self, source_id: &str) -> Result<Option<SourceState>> {
        self.inner.get_state(source_id).await
    }

    async fn put_snapshot(&self, source_id: &str, snapshot: &Snapshot) -> Result<()> {
        self.put_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.put_snapshot(source_id, snapshot).await
    }

    async fn set_state(&self, state: &SourceState) -> Result<()> {
        self.put_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.set_state(state).await
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        self.inner.list_sources().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Helper to create a minimal EngineConfig for testing
pub fn minimal_config() -> EngineConfig {
    EngineConfig {
        poll_interval_secs: 3600,
        force_baseline: false,
        message_max_chars: 280,
        event_channel_capacity: 100,
    }
}

pub const CLUB: &str = "Kayserispor";

pub fn count(n: u64) -> Snapshot {
    Snapshot::from(ScalarSnapshot::new(n))
}

/// Roster of (name, license status) pairs
pub fn roster(players: &[(&str, &str)]) -> Snapshot {
    Snapshot::from(RosterSnapshot::from_records(
        players
            .iter()
            .map(|(name, status)| PlayerRecord::new(*name, "Forvet", *status)),
    ))
}

/// Build an engine over clones of the given doubles (clones share counters)
pub fn engine_with(
    sources: &[&ScriptedSource],
    notifier: &RecordingNotifier,
    store: &CountingStateStore,
    config: EngineConfig,
) -> (WatchEngine, mpsc::Receiver<EngineEvent>) {
    let sources = sources
        .iter()
        .map(|s| Box::new((*s).clone()) as Box<dyn Source>)
        .collect();

    WatchEngine::new(
        sources,
        Box::new(notifier.clone()),
        Box::new(store.clone()),
        CLUB,
        config,
    )
    .expect("engine construction succeeds")
}
