use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Endpoint {
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            enabled: true,
        }
    }

    pub fn disabled(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ProbeType {
    #[default]
    #[serde(rename = "multiGetObjects")]
    MultiGetObjects,
    #[serde(rename = "queryTransactionBlocks")]
    QueryTransactionBlocks,
    #[serde(rename = "ping")]
    Ping,
}

impl fmt::Display for ProbeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeType::MultiGetObjects => "multiGetObjects",
            ProbeType::QueryTransactionBlocks => "queryTransactionBlocks",
            ProbeType::Ping => "ping",
        };
        f.write_str(name)
    }
}

impl FromStr for ProbeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiGetObjects" => Ok(ProbeType::MultiGetObjects),
            "queryTransactionBlocks" => Ok(ProbeType::QueryTransactionBlocks),
            "ping" => Ok(ProbeType::Ping),
            other => Err(Error::UnknownProbeType(other.to_string())),
        }
    }
}

/// One endpoint's result for one round. `latency_ms` is absent on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub endpoint: String,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn success(endpoint: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            endpoint: endpoint.into(),
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub fn failure(endpoint: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            latency_ms: None,
            error: Some(error.into()),
        }
    }
}

/// Outcomes of one round, positionally aligned with the run's endpoint list
pub type RoundResult = Vec<ProbeOutcome>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub endpoint: String,
    pub average: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub error: bool,
}

impl AggregateResult {
    pub fn failed(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            average: None,
            p50: None,
            p90: None,
            error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum JobMessage {
    #[serde(rename = "latencyTest")]
    LatencyTest {
        #[serde(rename = "testId")]
        test_id: Option<String>,
        endpoints: Option<Vec<Endpoint>>,
        #[serde(rename = "probeType", default)]
        probe_type: ProbeType,
    },
    #[serde(rename = "healthCheck")]
    HealthCheck { endpoints: Option<Vec<String>> },
    /// Stops the in-flight latency test before its next round
    #[serde(rename = "cancel")]
    Cancel,
}

#[derive(Debug, Serialize)]
pub struct ProgressUpdate {
    #[serde(rename = "testId")]
    pub test_id: String,
    pub progress: f64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct TestReport {
    #[serde(rename = "testId")]
    pub test_id: String,
    pub network: String,
    #[serde(rename = "probeType")]
    pub probe_type: ProbeType,
    #[serde(rename = "completedAt")]
    pub completed_at: String,
    pub results: Vec<AggregateResult>,
    pub history: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthEvent {
    pub timestamp: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub endpoint: String,
    #[serde(rename = "responseSuccess")]
    pub response_success: u64,
    #[serde(rename = "responseFailure")]
    pub response_failure: u64,
    pub uptime: f64,
    pub reliability: f64,
    #[serde(rename = "avgLatency")]
    pub avg_latency: f64,
    #[serde(rename = "p95Latency")]
    pub p95_latency: Option<f64>,
    #[serde(rename = "healthScore")]
    pub health_score: f64,
    #[serde(rename = "healthHistory")]
    pub health_history: Vec<f64>,
    #[serde(rename = "latencyHistory")]
    pub latency_history: Vec<f64>,
    pub errors: Vec<HealthEvent>,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub timestamp: String,
    pub endpoints: Vec<HealthReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latency_job() {
        let payload = r#"{
            "type": "latencyTest",
            "testId": "abc",
            "probeType": "queryTransactionBlocks",
            "endpoints": [
                {"url": "https://a.example", "enabled": false},
                {"url": "https://b.example"}
            ]
        }"#;

        match serde_json::from_str::<JobMessage>(payload).unwrap() {
            JobMessage::LatencyTest {
                test_id,
                endpoints,
                probe_type,
            } => {
                assert_eq!(test_id.as_deref(), Some("abc"));
                assert_eq!(probe_type, ProbeType::QueryTransactionBlocks);
                let endpoints = endpoints.unwrap();
                assert!(!endpoints[0].enabled);
                assert!(endpoints[1].enabled);
            }
            other => panic!("unexpected job: {:?}", other),
        }
    }

    #[test]
    fn test_parse_health_job_defaults() {
        let job: JobMessage = serde_json::from_str(r#"{"type": "healthCheck"}"#).unwrap();
        assert!(matches!(job, JobMessage::HealthCheck { endpoints: None }));

        let job: JobMessage = serde_json::from_str(r#"{"type": "cancel"}"#).unwrap();
        assert!(matches!(job, JobMessage::Cancel));

        let job: JobMessage = serde_json::from_str(r#"{"type": "latencyTest"}"#).unwrap();
        match job {
            JobMessage::LatencyTest { probe_type, .. } => {
                assert_eq!(probe_type, ProbeType::MultiGetObjects)
            }
            other => panic!("unexpected job: {:?}", other),
        }
    }

    #[test]
    fn test_failed_aggregate_serializes_nulls() {
        let value = serde_json::to_value(AggregateResult::failed("https://a.example")).unwrap();
        assert_eq!(value["error"], true);
        assert!(value["average"].is_null());
        assert!(value["p90"].is_null());
    }

    #[test]
    fn test_probe_type_round_trips_through_str() {
        for probe in [
            ProbeType::MultiGetObjects,
            ProbeType::QueryTransactionBlocks,
            ProbeType::Ping,
        ] {
            assert_eq!(probe.to_string().parse::<ProbeType>().unwrap(), probe);
        }
        assert!("getBalance".parse::<ProbeType>().is_err());
    }
}
