//! Core watch engine
//!
//! The WatchEngine is responsible for:
//! - Polling every configured Source once per cycle
//! - Diffing each snapshot against the last persisted one
//! - Sending one notification per source per cycle via the Notifier
//! - Persisting snapshots once their notification (if any) has completed
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Source    │─── Snapshot / FetchError ───┐
//! └─────────────┘                             │
//!                                             ▼
//!                                    ┌──────────────┐
//!                                    │ WatchEngine  │
//!                                    └──────────────┘
//!                                             │
//!         ┌───────────────────┬───────────────┼───────────────────┐
//!         │                   │               │                   │
//!         ▼                   ▼               ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐ ┌──────────────┐    ┌─────────────┐
//! │ StateStore  │     │    diff     │ │   Notifier   │    │   Events    │
//! │ (read/put)  │     │   (pure)    │ │   (send)     │    │ (monitor)   │
//! └─────────────┘     └─────────────┘ └──────────────┘    └─────────────┘
//! ```
//!
//! ## Cycle Flow (per source, sequentially)
//!
//! 1. Fetch a snapshot; on failure log and move to the next source
//! 2. Read the previous snapshot from the StateStore
//! 3. No previous snapshot: announce a baseline
//! 4. Otherwise diff; non-empty diff: send one summary message
//! 5. Persist only after a successful send (first-observation baselines of
//!    `RecordAlways` sources are persisted regardless)
//!
//! The engine sleeps for the poll interval after the whole cycle. The loop
//! ends on shutdown or on a fatal notifier authentication error.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::diff::diff;
use crate::error::{Error, NotifyError, Result};
use crate::message::MessageFormatter;
use crate::model::{NotificationId, Snapshot};
use crate::traits::{BaselinePersistence, Notifier, Source, StateStore};

/// Events emitted by the WatchEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { sources_count: usize },

    /// A polling cycle started
    CycleStarted { cycle: u64 },

    /// A source could not be fetched this cycle
    FetchFailed {
        source_id: String,
        class: &'static str,
        error: String,
    },

    /// First observation of a source (or forced baseline)
    BaselineRecorded {
        source_id: String,
        notified: bool,
        persisted: bool,
    },

    /// The diff against the stored snapshot was non-empty
    ChangesDetected { source_id: String, count: usize },

    /// Nothing changed for a source
    Unchanged { source_id: String },

    /// A notification was delivered
    NotificationSent {
        source_id: String,
        notification_id: NotificationId,
    },

    /// A notification could not be delivered
    NotificationFailed {
        source_id: String,
        class: &'static str,
        error: String,
    },

    /// A polling cycle finished
    CycleCompleted { cycle: u64, notifications: usize },

    /// Engine stopped
    Stopped { reason: String },
}

/// What happened to one source during one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Snapshot equal to the stored one; nothing sent, nothing persisted
    Unchanged,

    /// Baseline announced (or attempted)
    Baseline { notified: bool, persisted: bool },

    /// Changes notified and the new snapshot persisted
    Notified { events: usize },

    /// Changes detected but the notification failed; state kept
    NotifyFailed { events: usize, class: &'static str },

    /// The adapter failed; state untouched
    FetchFailed { class: &'static str },

    /// Reading or writing state failed
    StateStoreFailed,
}

/// Per-source outcomes of one cycle, in polling order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub outcomes: Vec<(String, SourceOutcome)>,
}

impl CycleReport {
    /// Outcome of a given source, if it was polled
    pub fn outcome(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, outcome)| outcome)
    }

    /// Number of notifications delivered during the cycle
    pub fn notifications(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| {
                matches!(
                    outcome,
                    SourceOutcome::Notified { .. }
                        | SourceOutcome::Baseline { notified: true, .. }
                )
            })
            .count()
    }
}

/// Core watch engine
///
/// The engine orchestrates the poll → diff → notify → persist flow for a
/// fixed list of sources. It runs until a shutdown signal is received or the
/// notifier reports an authentication failure.
///
/// ## Lifecycle
///
/// 1. Create with [`WatchEngine::new()`]
/// 2. Start with [`WatchEngine::run()`], or drive single cycles with
///    [`WatchEngine::run_cycle()`]
/// 3. Engine runs until shutdown signal or fatal error
///
/// ## Failure Isolation
///
/// A failing source never prevents the other sources of the same cycle from
/// being polled. Only `NotifyError::Auth` stops the engine.
pub struct WatchEngine {
    /// Sources, polled in this order
    sources: Vec<Box<dyn Source>>,

    /// Notifier for announcements
    notifier: Box<dyn Notifier>,

    /// State store holding the last snapshot per source
    state_store: Box<dyn StateStore>,

    /// Message formatting for the watched club
    formatter: MessageFormatter,

    /// Sleep between cycles
    poll_interval: Duration,

    /// Announce baselines on the next cycle regardless of stored state
    force_baseline: AtomicBool,

    /// Number of cycles started
    cycles: AtomicU64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl WatchEngine {
    /// Create a new watch engine
    ///
    /// # Parameters
    ///
    /// - `sources`: Source implementations, with unique ids
    /// - `notifier`: Notifier implementation
    /// - `state_store`: State store implementation
    /// - `club_name`: Display name used in messages
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        sources: Vec<Box<dyn Source>>,
        notifier: Box<dyn Notifier>,
        state_store: Box<dyn StateStore>,
        club_name: impl Into<String>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        if sources.is_empty() {
            return Err(Error::config("No sources configured"));
        }

        for (i, source) in sources.iter().enumerate() {
            if sources[..i].iter().any(|s| s.id() == source.id()) {
                return Err(Error::config(format!("Duplicate source id: {}", source.id())));
            }
        }

        let club_name = club_name.into();
        if club_name.trim().is_empty() {
            return Err(Error::config("Club name cannot be empty"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            sources,
            notifier,
            state_store,
            formatter: MessageFormatter::new(club_name, config.message_max_chars),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            force_baseline: AtomicBool::new(config.force_baseline),
            cycles: AtomicU64::new(0),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Ids of the configured sources, in polling order
    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Run the engine
    ///
    /// Polls immediately, then once per poll interval, until SIGINT/SIGTERM.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error::Notify(NotifyError::Auth))`: Notifier credentials rejected
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(&self, mut shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            sources_count: self.sources.len(),
        });
        info!(
            "Watching {} source(s), polling every {}s",
            self.sources.len(),
            self.poll_interval.as_secs()
        );
        self.log_stored_state().await;

        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Stopping engine: {}", e);
                self.emit_event(EngineEvent::Stopped {
                    reason: e.to_string(),
                });
                if let Err(flush_err) = self.state_store.flush().await {
                    warn!("Failed to flush state on exit: {}", flush_err);
                }
                return Err(e);
            }

            let shutdown = match shutdown_rx.as_mut() {
                // Test mode: wait for the provided shutdown signal
                Some(rx) => tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => false,
                    _ = rx => true,
                },
                // Production mode: wait for SIGINT/SIGTERM
                None => tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => false,
                    _ = shutdown_signal() => true,
                },
            };

            if shutdown {
                info!("Shutdown signal received");
                self.emit_event(EngineEvent::Stopped {
                    reason: "Shutdown signal".to_string(),
                });
                break;
            }
        }

        // Flush state before exiting
        self.state_store.flush().await?;
        info!("State flushed, engine stopped");

        Ok(())
    }

    /// Report what the state store already knows about each source
    async fn log_stored_state(&self) {
        let stored = match self.state_store.list_sources().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to list stored sources: {}", e);
                return;
            }
        };

        for source_id in &stored {
            if !self.sources.iter().any(|s| s.id() == source_id.as_str()) {
                warn!("Stored state for unknown source {} is ignored", source_id);
            }
        }

        for source in &self.sources {
            match self.state_store.get_state(source.id()).await {
                Ok(Some(state)) => info!(
                    "Resuming {} from snapshot accepted at {}",
                    state.source_id,
                    state.last_updated_at.to_rfc3339()
                ),
                Ok(None) => info!("No stored state for {}, first poll is a baseline", source.id()),
                Err(e) => warn!(source = source.id(), "Failed to read stored state: {}", e),
            }
        }
    }

    /// Run one polling cycle over every source
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The cycle completed (individual sources may have failed)
    /// - `Err(Error)`: Fatal error; the engine must stop
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let force_baseline = self.force_baseline.swap(false, Ordering::SeqCst);
        if force_baseline {
            info!("Force baseline requested, announcing every source");
        }

        self.emit_event(EngineEvent::CycleStarted { cycle });
        debug!("Cycle {} started", cycle);

        let mut report = CycleReport::default();
        for source in &self.sources {
            let outcome = match self.process_source(source.as_ref(), force_baseline).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        source = source.id(),
                        class = "state_store",
                        "Skipping source this cycle: {}",
                        e
                    );
                    SourceOutcome::StateStoreFailed
                }
            };
            report.outcomes.push((source.id().to_string(), outcome));
        }

        self.emit_event(EngineEvent::CycleCompleted {
            cycle,
            notifications: report.notifications(),
        });
        debug!("Cycle {} completed", cycle);

        Ok(report)
    }

    /// Poll, diff, notify and persist a single source
    async fn process_source(
        &self,
        source: &dyn Source,
        force_baseline: bool,
    ) -> Result<SourceOutcome> {
        let source_id = source.id();

        let snapshot = match source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(source = source_id, class = e.class(), "Fetch failed: {}", e);
                self.emit_event(EngineEvent::FetchFailed {
                    source_id: source_id.to_string(),
                    class: e.class(),
                    error: e.to_string(),
                });
                return Ok(SourceOutcome::FetchFailed { class: e.class() });
            }
        };

        if let Snapshot::Roster(roster) = &snapshot
            && roster.is_empty()
        {
            warn!(source = source_id, "Roster snapshot is empty");
        }

        let previous = self.state_store.get_snapshot(source_id).await?;
        let first_observation = previous.is_none();

        let events = match previous {
            _ if force_baseline => None,
            None => None,
            Some(previous) => match diff(Some(&previous), &snapshot) {
                Ok(events) => Some(events),
                Err(e) => {
                    warn!(source = source_id, "Re-baselining: {}", e);
                    None
                }
            },
        };

        match events {
            None => {
                self.announce_baseline(source, &snapshot, first_observation)
                    .await
            }
            Some(events) if events.is_empty() => {
                debug!("Source {} unchanged", source_id);
                self.emit_event(EngineEvent::Unchanged {
                    source_id: source_id.to_string(),
                });
                Ok(SourceOutcome::Unchanged)
            }
            Some(events) => {
                self.emit_event(EngineEvent::ChangesDetected {
                    source_id: source_id.to_string(),
                    count: events.len(),
                });
                for event in &events {
                    debug!("{}: {}", source_id, event);
                }

                let text = self.formatter.changes(&events);
                match self.send(source_id, &text).await? {
                    Ok(_) => {
                        self.persist(source_id, &snapshot).await?;
                        Ok(SourceOutcome::Notified {
                            events: events.len(),
                        })
                    }
                    // Old state kept: the same diff is recomputed next cycle
                    Err(e) => Ok(SourceOutcome::NotifyFailed {
                        events: events.len(),
                        class: e.class(),
                    }),
                }
            }
        }
    }

    /// Announce the first observation of a source
    ///
    /// A forced or re-announced baseline over existing state is persisted
    /// only after delivery.
    async fn announce_baseline(
        &self,
        source: &dyn Source,
        snapshot: &Snapshot,
        first_observation: bool,
    ) -> Result<SourceOutcome> {
        let source_id = source.id();
        // A baseline replacing stored state must not lose a pending change
        let record_always = first_observation
            && source.baseline_persistence() == BaselinePersistence::RecordAlways;
        let text = self.formatter.baseline(snapshot);

        let notified = match self.send(source_id, &text).await {
            Ok(sent) => sent.is_ok(),
            Err(fatal) => {
                if record_always {
                    if let Err(e) = self.persist(source_id, snapshot).await {
                        warn!(source = source_id, "Failed to record baseline: {}", e);
                    }
                }
                return Err(fatal);
            }
        };

        let persisted = notified || record_always;
        if persisted {
            self.persist(source_id, snapshot).await?;
        } else {
            debug!("Baseline of {} not recorded, will announce again", source_id);
        }

        self.emit_event(EngineEvent::BaselineRecorded {
            source_id: source_id.to_string(),
            notified,
            persisted,
        });

        Ok(SourceOutcome::Baseline {
            notified,
            persisted,
        })
    }

    /// Send a message, classifying the failure
    ///
    /// Cycle-local failures come back as `Ok(Err(_))`; fatal ones as `Err`.
    async fn send(
        &self,
        source_id: &str,
        text: &str,
    ) -> Result<std::result::Result<NotificationId, NotifyError>> {
        match self.notifier.send(text).await {
            Ok(id) => {
                info!(
                    source = source_id,
                    notifier = self.notifier.notifier_name(),
                    "Notification sent (id: {})",
                    id
                );
                self.emit_event(EngineEvent::NotificationSent {
                    source_id: source_id.to_string(),
                    notification_id: id.clone(),
                });
                Ok(Ok(id))
            }
            Err(e) => {
                self.emit_event(EngineEvent::NotificationFailed {
                    source_id: source_id.to_string(),
                    class: e.class(),
                    error: e.to_string(),
                });
                if e.is_fatal() {
                    error!(source = source_id, class = e.class(), "Notification failed: {}", e);
                    return Err(Error::Notify(e));
                }
                warn!(source = source_id, class = e.class(), "Notification failed: {}", e);
                Ok(Err(e))
            }
        }
    }

    async fn persist(&self, source_id: &str, snapshot: &Snapshot) -> Result<()> {
        self.state_store.put_snapshot(source_id, snapshot).await?;
        info!("Persisted snapshot for {}", source_id);
        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }

    /// Test-only helper to run the engine with a controlled shutdown signal
    ///
    /// **TESTING ONLY**: contract tests require controlled shutdown.
    /// Production daemon code should use `run()` instead, which manages shutdown
    /// via OS signals (SIGTERM/SIGINT) rather than programmatic channels.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report_counts_notifications() {
        let report = CycleReport {
            outcomes: vec![
                ("a".to_string(), SourceOutcome::Notified { events: 2 }),
                (
                    "b".to_string(),
                    SourceOutcome::Baseline {
                        notified: false,
                        persisted: true,
                    },
                ),
                ("c".to_string(), SourceOutcome::FetchFailed { class: "protocol" }),
            ],
        };

        assert_eq!(report.notifications(), 1);
        assert_eq!(
            report.outcome("c"),
            Some(&SourceOutcome::FetchFailed { class: "protocol" })
        );
        assert_eq!(report.outcome("missing"), None);
    }

    #[test]
    fn test_engine_event_clone() {
        let event = EngineEvent::NotificationSent {
            source_id: "registration_bans".to_string(),
            notification_id: NotificationId::new("1"),
        };
        assert_eq!(event.clone(), event);
    }
}
