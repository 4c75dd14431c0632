use crate::error::{Error, ProbeError, Result};
use crate::transport::{millis, Transport};
use crate::types::{ProbeOutcome, ProbeType, RoundResult};
use futures::future::join_all;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Fans one probe out to every endpoint and collects the outcomes in order.
pub struct RoundRunner {
    transport: Arc<dyn Transport>,
    round_timeout: Duration,
}

impl RoundRunner {
    pub fn new(transport: Arc<dyn Transport>, round_timeout: Duration) -> Self {
        Self {
            transport,
            round_timeout,
        }
    }

    /// Runs one round. Every probe is spawned before any is awaited, and a
    /// failing or panicking probe only fills its own slot. The returned
    /// round is aligned with `endpoints`.
    ///
    /// Fails as a whole only when the fan-in outlives the round timeout; the
    /// outstanding probes are aborted in that case.
    pub async fn run(&self, endpoints: &[String], probe: ProbeType) -> Result<RoundResult> {
        let handles: Vec<_> = endpoints
            .iter()
            .cloned()
            .map(|endpoint| {
                let transport = self.transport.clone();
                tokio::spawn(async move { transport.probe(&endpoint, probe).await })
            })
            .collect();
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let joined = match timeout(self.round_timeout, join_all(handles)).await {
            Ok(joined) => joined,
            Err(_) => {
                for handle in abort_handles {
                    handle.abort();
                }
                return Err(Error::RoundTimeout(self.round_timeout.as_millis() as u64));
            }
        };

        let outcomes = endpoints
            .iter()
            .zip(joined)
            .map(|(endpoint, joined)| {
                let result = joined.unwrap_or_else(|e| Err(ProbeError::Task(e.to_string())));
                match result {
                    Ok(elapsed) => ProbeOutcome::success(endpoint.as_str(), millis(elapsed)),
                    Err(e) => {
                        debug!("Probe against {} failed: {}", endpoint, e);
                        ProbeOutcome::failure(endpoint.as_str(), e.to_string())
                    }
                }
            })
            .collect();

        Ok(outcomes)
    }
}

pub fn failed_round(endpoints: &[String], reason: &str) -> RoundResult {
    endpoints
        .iter()
        .map(|endpoint| ProbeOutcome::failure(endpoint.as_str(), reason))
        .collect()
}
