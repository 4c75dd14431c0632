use crate::error::{Error, Result};
use crate::history::HistoryStore;
use crate::round::{failed_round, RoundRunner};
use crate::sink::{NotificationSink, ProgressSink};
use crate::stats::{average, percentile};
use crate::types::{AggregateResult, Endpoint, Notification, ProbeType, RoundResult};
use log::{info, warn};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex;

/// Leading rounds that only absorb connection setup (DNS, TLS)
pub const WARM_UP_ROUNDS: usize = 1;

#[derive(Default)]
struct RunFlags {
    running: bool,
    cancel_requested: bool,
}

/// Running and cancel flags, always changed under the same lock
#[derive(Default)]
struct RunControl {
    flags: StdMutex<RunFlags>,
}

impl RunControl {
    fn flags(&self) -> MutexGuard<'_, RunFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Option<RunTicket<'_>> {
        let mut flags = self.flags();
        if flags.running {
            return None;
        }
        flags.running = true;
        flags.cancel_requested = false;
        Some(RunTicket { control: self })
    }

    fn is_running(&self) -> bool {
        self.flags().running
    }

    fn request_cancel(&self) {
        let mut flags = self.flags();
        if flags.running {
            flags.cancel_requested = true;
        }
    }

    fn take_cancel(&self) -> bool {
        std::mem::take(&mut self.flags().cancel_requested)
    }
}

struct RunTicket<'a> {
    control: &'a RunControl,
}

impl Drop for RunTicket<'_> {
    fn drop(&mut self) {
        let mut flags = self.control.flags();
        flags.running = false;
        flags.cancel_requested = false;
    }
}

#[derive(Default)]
struct RunState {
    latest: Vec<AggregateResult>,
    history: HistoryStore,
}

/// Runs latency tests round by round and keeps the session's results.
pub struct TestOrchestrator {
    runner: RoundRunner,
    num_rounds: usize,
    state: Mutex<RunState>,
    control: RunControl,
}

impl TestOrchestrator {
    pub fn new(runner: RoundRunner, num_rounds: usize) -> Result<Self> {
        if num_rounds == 0 {
            return Err(Error::InvalidRounds(num_rounds));
        }

        Ok(Self {
            runner,
            num_rounds,
            state: Mutex::new(RunState::default()),
            control: RunControl::default(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Asks the in-flight run to stop before its next round. No-op when idle.
    pub fn cancel(&self) {
        self.control.request_cancel();
    }

    /// Measures every enabled endpoint over `num_rounds` rounds and returns
    /// the ranked aggregates.
    ///
    /// Results and history are only replaced when the whole run succeeds.
    /// A run that starts while another is in flight is rejected.
    pub async fn run_test(
        &self,
        endpoints: &[Endpoint],
        probe: ProbeType,
        progress: &dyn ProgressSink,
        notifier: &dyn NotificationSink,
    ) -> Result<Vec<AggregateResult>> {
        let enabled: Vec<String> = endpoints
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.url.clone())
            .collect();

        if enabled.is_empty() {
            let err = Error::NoEndpointsEnabled;
            notifier.notify(Notification::error("Error", err.to_string()));
            return Err(err);
        }

        let _ticket = match self.control.begin() {
            Some(ticket) => ticket,
            None => {
                warn!("⚠️ Latency test requested while another is running, skipping");
                return Err(Error::RunInProgress);
            }
        };

        info!(
            "🎯 Testing {} endpoints with {} over {} rounds",
            enabled.len(),
            probe,
            self.num_rounds
        );

        match self.execute(&enabled, probe, progress).await {
            Ok(results) => {
                let mut state = self.state.lock().await;
                state.history.record_batch(&results);
                state.latest = results.clone();

                notifier.notify(Notification::success(
                    "Test Complete",
                    "RPC testing completed successfully.",
                ));
                Ok(results)
            }
            Err(e) => {
                notifier.notify(Notification::error("Test Failed", e.to_string()));
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        endpoints: &[String],
        probe: ProbeType,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<AggregateResult>> {
        let total = self.num_rounds;
        progress.report(initial_progress(total));

        let mut rounds: Vec<RoundResult> = Vec::with_capacity(total);
        for round in 0..total {
            if self.control.take_cancel() {
                return Err(Error::Cancelled {
                    completed: round,
                    total,
                });
            }

            let outcomes = match self.runner.run(endpoints, probe).await {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    warn!(
                        "⚠️ Round {} failed, counting every endpoint as failed: {}",
                        round, e
                    );
                    failed_round(endpoints, &e.to_string())
                }
            };
            rounds.push(outcomes);
            progress.report(round_progress(round, total));
        }

        let mut results = aggregate(endpoints, &rounds);
        rank(&mut results);
        Ok(results)
    }

    pub async fn latest_results(&self) -> Vec<AggregateResult> {
        self.state.lock().await.latest.clone()
    }

    pub async fn history(&self, endpoint: &str) -> Vec<f64> {
        self.state.lock().await.history.get(endpoint)
    }

    pub async fn history_snapshot(&self) -> BTreeMap<String, Vec<f64>> {
        self.state.lock().await.history.snapshot()
    }
}

fn initial_progress(total: usize) -> f64 {
    (0.5 / total as f64) * 100.0
}

fn round_progress(round: usize, total: usize) -> f64 {
    (((round as f64 + 1.5) / total as f64) * 100.0).min(100.0)
}

/// Summarizes each endpoint over the scored rounds.
///
/// Scanning stops at an endpoint's first missing latency after the warm-up
/// round: one miss marks the endpoint as failed for the whole run, even if
/// later rounds succeeded.
pub fn aggregate(endpoints: &[String], rounds: &[RoundResult]) -> Vec<AggregateResult> {
    endpoints
        .iter()
        .enumerate()
        .map(|(i, endpoint)| {
            let mut latencies = Vec::with_capacity(rounds.len().saturating_sub(WARM_UP_ROUNDS));
            let mut missed = false;

            for round in rounds.iter().skip(WARM_UP_ROUNDS) {
                match round.get(i).and_then(|outcome| outcome.latency_ms) {
                    Some(latency) => latencies.push(latency),
                    None => {
                        missed = true;
                        break;
                    }
                }
            }

            if missed || latencies.is_empty() {
                return AggregateResult::failed(endpoint.as_str());
            }

            AggregateResult {
                endpoint: endpoint.clone(),
                average: Some(average(&latencies)),
                p50: percentile(&latencies, 0.5),
                p90: percentile(&latencies, 0.9),
                error: false,
            }
        })
        .collect()
}

/// Working endpoints first, fastest average first. Failed endpoints keep
/// their relative order.
pub fn rank(results: &mut [AggregateResult]) {
    results.sort_by(|a, b| match (a.error, b.error) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
        (false, false) => a
            .average
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.average.unwrap_or(f64::INFINITY)),
    });
}
