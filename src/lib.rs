//! rpc-latency-worker - ranks blockchain RPC endpoints by response latency
//!
//! Probes a set of Sui JSON-RPC endpoints concurrently over repeated rounds,
//! discards the warm-up round, summarizes each endpoint with average, p50 and
//! p90 latency, ranks them and keeps a short rolling history per endpoint.
//! A separate health sweep tracks uptime, reliability and a composite health
//! score per endpoint.

pub mod config;
pub mod directory;
pub mod error;
pub mod health;
pub mod history;
pub mod orchestrator;
pub mod round;
pub mod scheduler;
pub mod sink;
pub mod stats;
pub mod transport;
pub mod types;
pub mod worker;

pub use config::{Config, QueueNames};
pub use directory::{seed_endpoints, Network};
pub use error::{Error, ProbeError, Result};
pub use health::{EndpointHealth, HealthMonitor, HealthTracker, SweepReport};
pub use history::HistoryStore;
pub use orchestrator::TestOrchestrator;
pub use round::RoundRunner;
pub use sink::{LogSink, NotificationSink, ProgressSink, QueuePublisher};
pub use transport::{JsonRpcTransport, Transport};
pub use types::{AggregateResult, Endpoint, JobMessage, Notification, ProbeOutcome, ProbeType};
pub use worker::Worker;
