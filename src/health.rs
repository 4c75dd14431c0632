//! Endpoint health tracking for the health-check sweep
//!
//! Each endpoint keeps lifetime success/failure counters, a reliability
//! figure over its most recent outcomes, a running mean latency and a
//! composite health score in [0, 100]. Records start fully healthy.

use crate::error::{Error, Result};
use crate::history::push_bounded;
use crate::round::{failed_round, RoundRunner};
use crate::sink::NotificationSink;
use crate::types::{HealthEvent, HealthReport, Notification, ProbeType};
use chrono::Utc;
use hdrhistogram::Histogram;
use log::{info, warn};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Outcomes considered by the reliability figure
pub const RELIABILITY_WINDOW: usize = 20;
pub const HEALTH_HISTORY_CAPACITY: usize = 10;
pub const ERROR_LOG_CAPACITY: usize = 50;
/// Flat score penalty for a failed probe
pub const FAILURE_PENALTY: f64 = 20.0;
/// Latency at which the latency factor reaches zero
pub const LATENCY_CEILING_MS: f64 = 2000.0;

const RELIABILITY_WEIGHT: f64 = 0.7;
const LATENCY_WEIGHT: f64 = 0.3;

pub struct EndpointHealth {
    response_success: u64,
    response_failure: u64,
    avg_latency: f64,
    health_score: f64,
    outcomes: VecDeque<bool>,
    health_history: VecDeque<f64>,
    latency_history: VecDeque<f64>,
    errors: VecDeque<HealthEvent>,
    latencies: Histogram<u64>,
}

impl EndpointHealth {
    pub fn new() -> Self {
        // Constant bounds, only rejected if low > high or sigfig > 5
        let latencies = Histogram::<u64>::new_with_bounds(1, 60_000, 3)
            .expect("histogram bounds are valid");

        Self {
            response_success: 0,
            response_failure: 0,
            avg_latency: 0.0,
            health_score: 100.0,
            outcomes: VecDeque::with_capacity(RELIABILITY_WINDOW),
            health_history: VecDeque::with_capacity(HEALTH_HISTORY_CAPACITY),
            latency_history: VecDeque::with_capacity(HEALTH_HISTORY_CAPACITY),
            errors: VecDeque::new(),
            latencies,
        }
    }

    pub fn response_success(&self) -> u64 {
        self.response_success
    }

    pub fn response_failure(&self) -> u64 {
        self.response_failure
    }

    pub fn avg_latency(&self) -> f64 {
        self.avg_latency
    }

    pub fn health_score(&self) -> f64 {
        self.health_score
    }

    /// Lifetime success percentage; 100 before any probe
    pub fn uptime(&self) -> f64 {
        let total = self.response_success + self.response_failure;
        if total == 0 {
            100.0
        } else {
            self.response_success as f64 / total as f64 * 100.0
        }
    }

    /// Success percentage over the last `RELIABILITY_WINDOW` outcomes
    pub fn reliability(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 100.0;
        }
        let successes = self.outcomes.iter().filter(|ok| **ok).count();
        successes as f64 / self.outcomes.len() as f64 * 100.0
    }

    pub fn p95_latency(&self) -> Option<f64> {
        if self.latencies.len() == 0 {
            None
        } else {
            Some(self.latencies.value_at_quantile(0.95) as f64)
        }
    }

    pub fn record_success(&mut self, latency_ms: f64) {
        let previous = self.response_success as f64;
        self.avg_latency = (self.avg_latency * previous + latency_ms) / (previous + 1.0);
        self.response_success += 1;
        push_bounded(&mut self.outcomes, true, RELIABILITY_WINDOW);

        let reliability_factor = self.reliability() / 100.0;
        let latency_factor = (1.0 - self.avg_latency / LATENCY_CEILING_MS).max(0.0);
        self.health_score = ((reliability_factor * RELIABILITY_WEIGHT
            + latency_factor * LATENCY_WEIGHT)
            * 100.0)
            .round();

        push_bounded(&mut self.health_history, self.health_score, HEALTH_HISTORY_CAPACITY);
        push_bounded(&mut self.latency_history, latency_ms, HEALTH_HISTORY_CAPACITY);
        self.latencies
            .saturating_record(latency_ms.round().max(1.0) as u64);
    }

    pub fn record_failure(&mut self, message: &str) {
        self.response_failure += 1;
        push_bounded(&mut self.outcomes, false, RELIABILITY_WINDOW);

        self.health_score = (self.health_score - FAILURE_PENALTY).max(0.0);
        push_bounded(&mut self.health_history, self.health_score, HEALTH_HISTORY_CAPACITY);

        let event = HealthEvent {
            timestamp: Utc::now().to_rfc3339(),
            message: message.to_string(),
        };
        push_bounded(&mut self.errors, event, ERROR_LOG_CAPACITY);
    }

    pub fn report(&self, endpoint: &str) -> HealthReport {
        HealthReport {
            endpoint: endpoint.to_string(),
            response_success: self.response_success,
            response_failure: self.response_failure,
            uptime: self.uptime(),
            reliability: self.reliability(),
            avg_latency: self.avg_latency,
            p95_latency: self.p95_latency(),
            health_score: self.health_score,
            health_history: self.health_history.iter().copied().collect(),
            latency_history: self.latency_history.iter().copied().collect(),
            errors: self.errors.iter().cloned().collect(),
        }
    }
}

impl Default for EndpointHealth {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HealthTracker {
    records: BTreeMap<String, EndpointHealth>,
}

impl HealthTracker {
    pub fn new(endpoints: &[String]) -> Self {
        let records = endpoints
            .iter()
            .map(|endpoint| (endpoint.clone(), EndpointHealth::new()))
            .collect();
        Self { records }
    }

    fn entry(&mut self, endpoint: &str) -> &mut EndpointHealth {
        self.records
            .entry(endpoint.to_string())
            .or_default()
    }

    pub fn record_success(&mut self, endpoint: &str, latency_ms: f64) {
        self.entry(endpoint).record_success(latency_ms);
    }

    pub fn record_failure(&mut self, endpoint: &str, message: &str) {
        self.entry(endpoint).record_failure(message);
    }

    pub fn get(&self, endpoint: &str) -> Option<&EndpointHealth> {
        self.records.get(endpoint)
    }

    pub fn reports(&self) -> Vec<HealthReport> {
        self.records
            .iter()
            .map(|(endpoint, health)| health.report(endpoint))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub checked: usize,
    pub healthy: usize,
    pub failed: usize,
}

struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct HealthMonitor {
    runner: RoundRunner,
    tracker: Mutex<HealthTracker>,
    sweeping: AtomicBool,
}

impl HealthMonitor {
    pub fn new(runner: RoundRunner, endpoints: &[String]) -> Self {
        Self {
            runner,
            tracker: Mutex::new(HealthTracker::new(endpoints)),
            sweeping: AtomicBool::new(false),
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::Acquire)
    }

    /// Pings every endpoint once and records the outcomes.
    ///
    /// Returns `Ok(None)` without probing anything when a sweep is already
    /// in flight.
    pub async fn sweep(
        &self,
        endpoints: &[String],
        notifier: &dyn NotificationSink,
    ) -> Result<Option<SweepReport>> {
        if endpoints.is_empty() {
            let err = Error::NoEndpointsEnabled;
            notifier.notify(Notification::error("Error", err.to_string()));
            return Err(err);
        }

        let _guard = match BusyGuard::acquire(&self.sweeping) {
            Some(guard) => guard,
            None => {
                warn!("⚠️ Health check already in progress, skipping");
                return Ok(None);
            }
        };

        info!("🩺 Checking health of {} endpoints", endpoints.len());

        let outcomes = match self.runner.run(endpoints, ProbeType::Ping).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!("⚠️ Health check round failed: {}", e);
                failed_round(endpoints, &e.to_string())
            }
        };

        let mut tracker = self.tracker.lock().await;
        let mut report = SweepReport {
            checked: outcomes.len(),
            ..Default::default()
        };

        for outcome in &outcomes {
            match outcome.latency_ms {
                Some(latency) => {
                    report.healthy += 1;
                    tracker.record_success(&outcome.endpoint, latency);
                }
                None => {
                    report.failed += 1;
                    let message = outcome.error.as_deref().unwrap_or("unknown error");
                    tracker.record_failure(&outcome.endpoint, message);
                }
            }
        }

        notifier.notify(Notification::success(
            "Health Check Complete",
            format!(
                "{} of {} endpoints healthy, {} failing.",
                report.healthy, report.checked, report.failed
            ),
        ));
        Ok(Some(report))
    }

    pub async fn reports(&self) -> Vec<HealthReport> {
        self.tracker.lock().await.reports()
    }

    pub async fn report(&self, endpoint: &str) -> Option<HealthReport> {
        self.tracker
            .lock()
            .await
            .get(endpoint)
            .map(|health| health.report(endpoint))
    }

    pub async fn reset(&self, endpoints: &[String]) {
        *self.tracker.lock().await = HealthTracker::new(endpoints);
    }
}
