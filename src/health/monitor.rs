use super::record::{ModelHealthRecord, ModelStatus, RollingStats};
use crate::config::HealthConfig;
use crate::provider::{AdapterSet, ProviderFailureKind, ProviderKind};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// One observed request result, passive or probed.
#[derive(Debug, Clone, Copy)]
pub enum CallOutcome {
    Success { latency: Duration },
    Failure { kind: ProviderFailureKind },
}

impl CallOutcome {
    pub fn success(latency: Duration) -> Self {
        CallOutcome::Success { latency }
    }

    pub fn failure(kind: ProviderFailureKind) -> Self {
        CallOutcome::Failure { kind }
    }
}

// ─── Per-model state ────────────────────────────────────────────────────────

struct ModelHealthState {
    status: ModelStatus,
    stats: RollingStats,
    consecutive_failures: u32,
    last_checked: Option<DateTime<Utc>>,
}

impl ModelHealthState {
    fn new(window: usize) -> Self {
        Self {
            status: ModelStatus::Unknown,
            stats: RollingStats::new(window),
            consecutive_failures: 0,
            last_checked: None,
        }
    }

    fn snapshot(&self, model: &str) -> ModelHealthRecord {
        ModelHealthRecord {
            model: model.to_string(),
            status: self.status,
            success_rate: self.stats.success_rate(),
            mean_latency_ms: self.stats.mean_latency_ms(),
            consecutive_failures: self.consecutive_failures,
            last_checked: self.last_checked,
            samples: self.stats.len(),
        }
    }
}

// ─── Monitor ────────────────────────────────────────────────────────────────

/// Tracks, per model, whether the backend is actually reachable and
/// performing acceptably.
///
/// State machine per model: `unknown -> available` on first success;
/// `available -> degraded` when the trailing success rate or mean latency
/// crosses its threshold; `degraded -> unavailable` once consecutive
/// failures exceed the ceiling; `unavailable -> degraded` on the next single
/// success, and back to `available` only after a sustained full window of
/// healthy traffic. A hard failure (auth rejection) drops to `unavailable`
/// from any state.
///
/// `report_outcome` is the passive signal fed by real traffic; `probe` is
/// the active one. Both land in the same rolling window, so busy models need
/// fewer probes. Reads never touch the network.
pub struct HealthMonitor {
    config: HealthConfig,
    records: RwLock<HashMap<String, Arc<Mutex<ModelHealthState>>>>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create the health record for a newly-registered model. Idempotent;
    /// records persist for as long as the model stays configured.
    pub fn register(&self, model: &str) {
        let mut records = self.records.write().expect("health table lock poisoned");
        records
            .entry(model.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ModelHealthState::new(self.config.window))));
    }

    fn cell(&self, model: &str) -> Option<Arc<Mutex<ModelHealthState>>> {
        let records = self.records.read().expect("health table lock poisoned");
        records.get(model).cloned()
    }

    /// Fold one outcome into the model's record and run the status
    /// transitions. Concurrent reports for one model serialize on the
    /// record's own lock, so none is lost.
    pub fn report_outcome(&self, model: &str, outcome: CallOutcome) {
        let Some(cell) = self.cell(model) else {
            tracing::debug!(model, "Outcome for unregistered model dropped");
            return;
        };
        let mut state = cell.lock().expect("health record lock poisoned");
        state.last_checked = Some(Utc::now());

        match outcome {
            CallOutcome::Success { latency } => {
                state.stats.push(true, latency);
                state.consecutive_failures = 0;
                self.apply_success_transition(model, &mut state);
            }
            CallOutcome::Failure { kind } => {
                state.stats.push(false, Duration::ZERO);
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                self.apply_failure_transition(model, &mut state, kind);
            }
        }
    }

    fn healthy_window(&self, state: &ModelHealthState) -> bool {
        state.stats.success_rate() >= self.config.success_rate_threshold
            && state
                .stats
                .mean_latency_ms()
                .is_none_or(|ms| ms <= self.config.latency_ceiling_ms)
    }

    fn apply_success_transition(&self, model: &str, state: &mut ModelHealthState) {
        let next = match state.status {
            ModelStatus::Unknown => ModelStatus::Available,
            // A single success after an outage is not trusted yet.
            ModelStatus::Unavailable => ModelStatus::Degraded,
            ModelStatus::Degraded => {
                if state.stats.is_full() && self.healthy_window(state) {
                    ModelStatus::Available
                } else {
                    ModelStatus::Degraded
                }
            }
            ModelStatus::Available => {
                if self.healthy_window(state) {
                    ModelStatus::Available
                } else {
                    ModelStatus::Degraded
                }
            }
        };
        Self::log_transition(model, state.status, next);
        state.status = next;
    }

    fn apply_failure_transition(
        &self,
        model: &str,
        state: &mut ModelHealthState,
        kind: ProviderFailureKind,
    ) {
        let next = if kind.is_hard() {
            ModelStatus::Unavailable
        } else if state.consecutive_failures > self.config.failure_threshold {
            ModelStatus::Unavailable
        } else {
            match state.status {
                ModelStatus::Available if !self.healthy_window(state) => ModelStatus::Degraded,
                other => other,
            }
        };
        Self::log_transition(model, state.status, next);
        state.status = next;
    }

    fn log_transition(model: &str, from: ModelStatus, to: ModelStatus) {
        if from != to {
            tracing::info!(model, from = %from, to = %to, "Model health transition");
        }
    }

    /// Pure in-memory read; `None` for a model never registered.
    pub fn status_of(&self, model: &str) -> Option<ModelHealthRecord> {
        let cell = self.cell(model)?;
        let state = cell.lock().expect("health record lock poisoned");
        Some(state.snapshot(model))
    }

    /// Full table snapshot for status indicators.
    pub fn snapshot(&self) -> BTreeMap<String, ModelHealthRecord> {
        let records = self.records.read().expect("health table lock poisoned");
        records
            .iter()
            .map(|(model, cell)| {
                let state = cell.lock().expect("health record lock poisoned");
                (model.clone(), state.snapshot(model))
            })
            .collect()
    }

    fn last_checked(&self, model: &str) -> Option<DateTime<Utc>> {
        let cell = self.cell(model)?;
        let state = cell.lock().expect("health record lock poisoned");
        state.last_checked
    }

    /// Actively probe one model through its adapter, with the probe timeout.
    pub async fn probe(&self, adapters: &AdapterSet, kind: ProviderKind, model: &str) {
        let Some(adapter) = adapters.get(kind) else {
            tracing::debug!(model, provider = %kind, "No adapter for probe");
            return;
        };
        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        let started = std::time::Instant::now();
        let outcome = match tokio::time::timeout(timeout, adapter.probe(model)).await {
            Ok(Ok(_)) => CallOutcome::success(started.elapsed()),
            Ok(Err(failure)) => {
                tracing::debug!(model, kind = %failure.kind, "Probe failed: {}", failure.message);
                CallOutcome::failure(failure.kind)
            }
            Err(_) => CallOutcome::failure(ProviderFailureKind::Timeout),
        };
        self.report_outcome(model, outcome);
    }

    /// Probe every model whose record has gone stale. Models with fresh
    /// passive traffic are skipped; real requests already told us.
    pub async fn probe_sweep(&self, adapters: &AdapterSet, models: &[(String, ProviderKind)]) {
        let stale_after = chrono::Duration::seconds(
            i64::try_from(self.config.probe_interval_secs).unwrap_or(i64::MAX / 1_000),
        );
        let now = Utc::now();
        for (model, kind) in models {
            let fresh = self
                .last_checked(model)
                .is_some_and(|at| now - at < stale_after);
            if fresh {
                continue;
            }
            self.probe(adapters, *kind, model).await;
        }
    }

    /// Spawn the active probe timer.
    pub fn spawn_probe_loop(
        self: Arc<Self>,
        adapters: AdapterSet,
        models: Vec<(String, ProviderKind)>,
    ) -> tokio::task::JoinHandle<()> {
        let interval = Duration::from_secs(self.config.probe_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.probe_sweep(&adapters, &models).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HealthMonitor {
        let config = HealthConfig {
            window: 4,
            success_rate_threshold: 0.9,
            latency_ceiling_ms: 1_000,
            failure_threshold: 3,
            probe_interval_secs: 60,
            probe_timeout_secs: 5,
        };
        let m = HealthMonitor::new(config);
        m.register("model-a");
        m
    }

    fn ok(m: &HealthMonitor) {
        m.report_outcome("model-a", CallOutcome::success(Duration::from_millis(50)));
    }

    fn fail(m: &HealthMonitor) {
        m.report_outcome(
            "model-a",
            CallOutcome::failure(ProviderFailureKind::Unreachable),
        );
    }

    fn status(m: &HealthMonitor) -> ModelStatus {
        m.status_of("model-a").unwrap().status
    }

    #[test]
    fn registered_model_starts_unknown() {
        let m = monitor();
        assert_eq!(status(&m), ModelStatus::Unknown);
    }

    #[test]
    fn first_success_promotes_unknown_to_available() {
        let m = monitor();
        ok(&m);
        assert_eq!(status(&m), ModelStatus::Available);
    }

    #[test]
    fn slow_responses_degrade_an_available_model() {
        let m = monitor();
        ok(&m);
        m.report_outcome("model-a", CallOutcome::success(Duration::from_secs(10)));
        assert_eq!(status(&m), ModelStatus::Degraded);
    }

    #[test]
    fn low_success_rate_degrades_an_available_model() {
        let m = monitor();
        ok(&m);
        fail(&m);
        // rate 0.5 < 0.9 over the window
        assert_eq!(status(&m), ModelStatus::Degraded);
    }

    #[test]
    fn consecutive_failures_beyond_threshold_mark_unavailable() {
        let m = monitor();
        ok(&m);
        for _ in 0..3 {
            fail(&m);
        }
        assert_ne!(status(&m), ModelStatus::Unavailable);
        fail(&m);
        assert_eq!(status(&m), ModelStatus::Unavailable);
    }

    #[test]
    fn single_success_after_outage_lands_on_degraded_not_available() {
        let m = monitor();
        for _ in 0..5 {
            fail(&m);
        }
        assert_eq!(status(&m), ModelStatus::Unavailable);
        ok(&m);
        assert_eq!(status(&m), ModelStatus::Degraded);
    }

    #[test]
    fn sustained_success_window_restores_available() {
        let m = monitor();
        for _ in 0..5 {
            fail(&m);
        }
        // Window of 4: successes push the failures out entirely.
        ok(&m);
        assert_eq!(status(&m), ModelStatus::Degraded);
        ok(&m);
        ok(&m);
        assert_eq!(status(&m), ModelStatus::Degraded);
        ok(&m);
        assert_eq!(status(&m), ModelStatus::Available);
    }

    #[test]
    fn hard_failure_drops_any_state_to_unavailable() {
        let m = monitor();
        ok(&m);
        assert_eq!(status(&m), ModelStatus::Available);
        m.report_outcome(
            "model-a",
            CallOutcome::failure(ProviderFailureKind::AuthRejected),
        );
        assert_eq!(status(&m), ModelStatus::Unavailable);
    }

    #[test]
    fn concurrent_reports_are_all_counted() {
        let m = Arc::new(monitor());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        m.report_outcome(
                            "model-a",
                            CallOutcome::success(Duration::from_millis(1)),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let record = m.status_of("model-a").unwrap();
        // Window is bounded, but every report ran the transition logic.
        assert_eq!(record.status, ModelStatus::Available);
        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.samples, 4);
    }

    #[test]
    fn snapshot_lists_every_registered_model() {
        let m = monitor();
        m.register("model-b");
        let snap = m.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap.contains_key("model-a"));
        assert!(snap.contains_key("model-b"));
    }

    #[test]
    fn status_of_unregistered_model_is_none() {
        let m = monitor();
        assert!(m.status_of("ghost").is_none());
    }
}
