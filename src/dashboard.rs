//! Polling controller behind the dashboard view.
//!
//! Every cycle fetches system metrics and the most recent opportunities
//! concurrently, waits for both, and folds the results into a new
//! [`DashboardSnapshot`]. Readers observe whole [`DashboardState`] values
//! through a `watch` channel and never see a half-applied cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::api::OpportunityFilter;
use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{Opportunity, SystemMetrics};

/// Where a cycle gets its data from.
#[async_trait]
pub trait DashboardSource: Send + Sync + 'static {
    async fn fetch_metrics(&self) -> ApiResult<SystemMetrics>;

    async fn fetch_recent_opportunities(&self, limit: u32) -> ApiResult<Vec<Opportunity>>;
}

#[async_trait]
impl DashboardSource for ApiClient {
    async fn fetch_metrics(&self) -> ApiResult<SystemMetrics> {
        self.metrics().get().await
    }

    async fn fetch_recent_opportunities(&self, limit: u32) -> ApiResult<Vec<Opportunity>> {
        let filter = OpportunityFilter::new().limit(limit).offset(0);
        Ok(self.opportunities().list(Some(&filter)).await?.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceName {
    Metrics,
    Opportunities,
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceName::Metrics => f.write_str("metrics"),
            ResourceName::Opportunities => f.write_str("opportunities"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// How many opportunities each cycle asks for.
    pub recent_limit: u32,
    /// Successful fetches a cycle needs before it may replace the snapshot.
    /// Clamped to 1..=2.
    pub min_successes: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            recent_limit: 10,
            min_successes: 1,
        }
    }
}

/// Latest fetched dashboard data. Replaced whole, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub metrics: Option<SystemMetrics>,
    pub opportunities: Vec<Opportunity>,
    pub loaded_at: DateTime<Utc>,
    /// Resources whose values were carried over from the previous snapshot.
    pub partial_failures: Vec<ResourceName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Settled,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Complete,
    Partial,
    Failed,
}

/// What happened in the most recent cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub status: CycleStatus,
    pub finished_at: DateTime<Utc>,
    pub errors: Vec<(ResourceName, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub phase: Phase,
    pub snapshot: Option<Arc<DashboardSnapshot>>,
    pub last_cycle: Option<CycleReport>,
    pub cycles: u64,
    pub total_failures: u64,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Install this snapshot.
    Replace(DashboardSnapshot, CycleReport),
    /// Too few fetches succeeded; the previous snapshot stays.
    Keep(CycleReport),
}

impl CycleOutcome {
    pub fn report(&self) -> &CycleReport {
        match self {
            CycleOutcome::Replace(_, report) | CycleOutcome::Keep(report) => report,
        }
    }
}

/// Combine one cycle's results with the previous snapshot.
///
/// A failed resource keeps its previous value and is listed in
/// `partial_failures`. When fewer than `min_successes` fetches succeed the
/// cycle is a total failure and nothing is replaced.
pub fn merge_cycle(
    prev: Option<&DashboardSnapshot>,
    metrics: ApiResult<SystemMetrics>,
    opportunities: ApiResult<Vec<Opportunity>>,
    min_successes: usize,
    now: DateTime<Utc>,
) -> CycleOutcome {
    let min_successes = min_successes.clamp(1, 2);
    let mut errors = Vec::new();
    let mut partial_failures = Vec::new();

    let metrics = match metrics {
        Ok(m) => Some(m),
        Err(e) => {
            errors.push((ResourceName::Metrics, e.to_string()));
            partial_failures.push(ResourceName::Metrics);
            prev.and_then(|p| p.metrics.clone())
        }
    };
    let opportunities = match opportunities {
        Ok(list) => list,
        Err(e) => {
            errors.push((ResourceName::Opportunities, e.to_string()));
            partial_failures.push(ResourceName::Opportunities);
            prev.map(|p| p.opportunities.clone()).unwrap_or_default()
        }
    };

    let successes = 2 - errors.len();
    if successes < min_successes {
        return CycleOutcome::Keep(CycleReport {
            status: CycleStatus::Failed,
            finished_at: now,
            errors,
        });
    }

    let status = if errors.is_empty() {
        CycleStatus::Complete
    } else {
        CycleStatus::Partial
    };
    CycleOutcome::Replace(
        DashboardSnapshot {
            metrics,
            opportunities,
            loaded_at: now,
            partial_failures,
        },
        CycleReport {
            status,
            finished_at: now,
            errors,
        },
    )
}

/// Apply a finished cycle. Returns `false`, leaving the state untouched, once
/// the controller has been stopped.
fn apply_outcome(state: &watch::Sender<DashboardState>, outcome: CycleOutcome) -> bool {
    state.send_if_modified(|s| {
        if s.phase == Phase::Stopped {
            return false;
        }
        s.cycles += 1;
        match outcome {
            CycleOutcome::Replace(snapshot, report) => {
                s.snapshot = Some(Arc::new(snapshot));
                s.last_cycle = Some(report);
                s.phase = Phase::Settled;
            }
            CycleOutcome::Keep(report) => {
                s.total_failures += 1;
                s.last_cycle = Some(report);
                s.phase = if s.snapshot.is_some() {
                    Phase::Settled
                } else {
                    Phase::Idle
                };
            }
        }
        true
    })
}

fn log_outcome(outcome: &CycleOutcome) {
    let report = outcome.report();
    match report.status {
        CycleStatus::Complete => tracing::debug!("Dashboard cycle complete"),
        CycleStatus::Partial => {
            for (resource, error) in &report.errors {
                tracing::warn!(%resource, "Dashboard fetch failed, keeping stale data: {}", error);
            }
        }
        CycleStatus::Failed => {
            let failed: Vec<String> = report
                .errors
                .iter()
                .map(|(resource, error)| format!("{resource}: {error}"))
                .collect();
            tracing::warn!("Dashboard cycle failed, snapshot unchanged: {}", failed.join("; "));
        }
    }
}

async fn run_cycle<S: DashboardSource>(
    source: &S,
    config: &DashboardConfig,
    state: &watch::Sender<DashboardState>,
) {
    let started = state.send_if_modified(|s| {
        if s.phase == Phase::Stopped {
            return false;
        }
        s.phase = Phase::Loading;
        true
    });
    if !started {
        return;
    }

    let (metrics, opportunities) = tokio::join!(
        source.fetch_metrics(),
        source.fetch_recent_opportunities(config.recent_limit)
    );

    let prev = state.borrow().snapshot.clone();
    let outcome = merge_cycle(
        prev.as_deref(),
        metrics,
        opportunities,
        config.min_successes,
        Utc::now(),
    );
    log_outcome(&outcome);
    if !apply_outcome(state, outcome) {
        tracing::debug!("Discarding dashboard cycle that finished after stop");
    }
}

async fn poll_loop<S: DashboardSource>(
    source: Arc<S>,
    config: DashboardConfig,
    state: Arc<watch::Sender<DashboardState>>,
    mut stop: watch::Receiver<bool>,
    wake: Arc<Notify>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            _ = stop.changed() => break,
            _ = run_cycle(source.as_ref(), &config, &state) => {}
        }
        tokio::select! {
            _ = stop.changed() => break,
            _ = tokio::time::sleep(config.interval) => {}
            _ = wake.notified() => {}
        }
    }
    tracing::debug!("Dashboard poll loop exited");
}

/// Owns the polling task. Dropping the controller aborts the task.
pub struct DashboardController {
    state: Arc<watch::Sender<DashboardState>>,
    stop: watch::Sender<bool>,
    wake: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl DashboardController {
    /// Begin polling: one cycle right away, then one per interval.
    pub fn start<S: DashboardSource>(source: Arc<S>, config: DashboardConfig) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        let state = Arc::new(state);
        let (stop, stop_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());

        tracing::info!(
            interval_secs = config.interval.as_secs(),
            recent_limit = config.recent_limit,
            "Starting dashboard polling"
        );
        let task = tokio::spawn(poll_loop(
            source,
            config,
            state.clone(),
            stop_rx,
            wake.clone(),
        ));

        Self {
            state,
            stop,
            wake,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<DashboardSnapshot>> {
        self.state.borrow().snapshot.clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    /// Run the next cycle now instead of waiting out the interval. A cycle
    /// already in flight finishes first.
    pub fn refresh_now(&self) {
        self.wake.notify_one();
    }

    /// Enter `Stopped` and wait for the poll task to exit. Results from a
    /// cycle still in flight are discarded.
    pub async fn stop(&mut self) {
        self.state.send_if_modified(|s| {
            if s.phase == Phase::Stopped {
                return false;
            }
            s.phase = Phase::Stopped;
            true
        });
        let _ = self.stop.send(true);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!("Dashboard poll task panicked: {}", e);
                }
            }
            tracing::info!("Dashboard polling stopped");
        }
    }
}

impl Drop for DashboardController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
