// Polling scheduler - keeps the project store fresh while the dashboard is up
//
//   Idle ──activate()──▶ Active ──deactivate() / logout / 401──▶ Idle
//
// While active, the poll task refreshes immediately and then on every
// interval tick. Refreshes never overlap: the loop awaits each one before
// waiting for the next tick, and ticks missed in the meantime are skipped.
//
// Deactivation clears the run's liveness flag and aborts the task. The
// store checks the flag under its lock before applying a result, so no new
// tick fires and any refresh that has not yet reached that check is
// dropped. An apply already past the check may still finish.

use crate::events::MonitorEvent;
use crate::session::SessionContext;
use crate::store::{ProjectStore, RefreshOutcome};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Active,
}

/// One activation of the poller
struct ActiveRun {
    live: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Drives periodic `ProjectStore::refresh()` calls
pub struct PollingScheduler {
    store: Arc<ProjectStore>,
    session: Arc<SessionContext>,
    interval: Duration,
    events: Option<mpsc::Sender<MonitorEvent>>,
    run: Option<ActiveRun>,
}

impl PollingScheduler {
    pub fn new(store: Arc<ProjectStore>, session: Arc<SessionContext>, interval: Duration) -> Self {
        Self {
            store,
            session,
            interval,
            events: None,
            run: None,
        }
    }

    /// Report refresh results and session expiry on this channel
    pub fn with_events(mut self, events: mpsc::Sender<MonitorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current state; a run that ended itself on an auth failure counts as Idle
    pub fn state(&self) -> SchedulerState {
        match &self.run {
            Some(run) if run.live.load(Ordering::SeqCst) => SchedulerState::Active,
            _ => SchedulerState::Idle,
        }
    }

    /// Start polling. Returns false if already active or not logged in.
    pub fn activate(&mut self) -> bool {
        if self.state() == SchedulerState::Active {
            return false;
        }
        // Reap a run that stopped on its own
        self.deactivate();

        if !self.session.is_authenticated() {
            tracing::warn!("Not starting poller: no authenticated session");
            return false;
        }

        let live = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(poll_loop(
            self.store.clone(),
            self.session.clone(),
            live.clone(),
            self.interval,
            self.events.clone(),
        ));
        tracing::info!("Polling every {}s", self.interval.as_secs());
        self.run = Some(ActiveRun { live, handle });
        true
    }

    /// Stop polling. No refresh is started after this returns, and results
    /// that reach the store's liveness check afterwards are discarded.
    pub fn deactivate(&mut self) {
        if let Some(run) = self.run.take() {
            let was_live = run.live.swap(false, Ordering::SeqCst);
            run.handle.abort();
            if was_live {
                tracing::info!("Polling stopped");
            }
        }
    }

    /// Logout or fatal auth failure: stop polling, forget projects and token
    pub fn end_session(&mut self) {
        self.deactivate();
        self.store.clear();
        if let Err(e) = self.session.teardown() {
            tracing::error!("Failed to clear session: {:#}", e);
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn emit(events: &Option<mpsc::Sender<MonitorEvent>>, event: MonitorEvent) {
    if let Some(tx) = events {
        // Use try_send so a slow UI never stalls polling
        let _ = tx.try_send(event);
    }
}

async fn poll_loop(
    store: Arc<ProjectStore>,
    session: Arc<SessionContext>,
    live: Arc<AtomicBool>,
    interval: Duration,
    events: Option<mpsc::Sender<MonitorEvent>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // First tick completes immediately
        ticker.tick().await;
        if !live.load(Ordering::SeqCst) {
            break;
        }

        match store.refresh_while(&live).await {
            Ok(RefreshOutcome::Applied(count)) => emit(
                &events,
                MonitorEvent::Refreshed {
                    timestamp: Utc::now(),
                    count,
                },
            ),
            Ok(RefreshOutcome::Discarded) => {}
            Err(err) if err.is_auth() => {
                tracing::warn!("Session rejected by server, stopping poller: {}", err);
                live.store(false, Ordering::SeqCst);
                store.clear();
                if let Err(e) = session.teardown() {
                    tracing::error!("Failed to clear session: {:#}", e);
                }
                emit(
                    &events,
                    MonitorEvent::SessionEnded {
                        timestamp: Utc::now(),
                        reason: err.to_string(),
                    },
                );
                break;
            }
            Err(err) => emit(
                &events,
                MonitorEvent::RefreshFailed {
                    timestamp: Utc::now(),
                    // Same text as the dashboard's alert line, when recorded
                    message: store.last_error().unwrap_or_else(|| err.to_string()),
                },
            ),
        }
    }
}
