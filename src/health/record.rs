use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use strum::Display;

// ─── Status ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelStatus {
    Unknown,
    Available,
    Degraded,
    Unavailable,
}

/// Point-in-time view of one model's health. Cheap to clone; what
/// `status_of` and `list_model_health` hand out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHealthRecord {
    pub model: String,
    pub status: ModelStatus,
    /// Success rate over the trailing window; 1.0 with no samples.
    pub success_rate: f64,
    pub mean_latency_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub last_checked: Option<DateTime<Utc>>,
    pub samples: usize,
}

impl ModelHealthRecord {
    pub fn unknown(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            status: ModelStatus::Unknown,
            success_rate: 1.0,
            mean_latency_ms: None,
            consecutive_failures: 0,
            last_checked: None,
            samples: 0,
        }
    }
}

// ─── Rolling statistics ─────────────────────────────────────────────────────

/// Bounded trailing window of request outcomes. Passive traffic and active
/// probes both land here.
#[derive(Debug)]
pub struct RollingStats {
    outcomes: VecDeque<(bool, u64)>,
    cap: usize,
}

impl RollingStats {
    pub fn new(cap: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, success: bool, latency: Duration) {
        if self.outcomes.len() == self.cap {
            self.outcomes.pop_front();
        }
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.outcomes.push_back((success, latency_ms));
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_full(&self) -> bool {
        self.outcomes.len() == self.cap
    }

    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let successes = self.outcomes.iter().filter(|(ok, _)| *ok).count();
        #[allow(clippy::cast_precision_loss)]
        {
            successes as f64 / self.outcomes.len() as f64
        }
    }

    /// Mean latency of successful outcomes; failures do not drag the mean.
    pub fn mean_latency_ms(&self) -> Option<u64> {
        let successes: Vec<u64> = self
            .outcomes
            .iter()
            .filter(|(ok, _)| *ok)
            .map(|(_, ms)| *ms)
            .collect();
        if successes.is_empty() {
            return None;
        }
        let total: u128 = successes.iter().map(|ms| u128::from(*ms)).sum();
        u64::try_from(total / successes.len() as u128).ok()
    }
}
