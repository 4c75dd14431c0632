use crate::config::Config;
use crate::error::Result;
use crate::health::HealthMonitor;
use crate::orchestrator::TestOrchestrator;
use crate::round::RoundRunner;
use crate::sink::QueuePublisher;
use crate::transport::Transport;
use crate::types::{Endpoint, HealthSnapshot, JobMessage, ProbeType, TestReport};
use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

pub struct Worker {
    config: Config,
    orchestrator: TestOrchestrator,
    monitor: HealthMonitor,
    publisher: QueuePublisher,
}

impl Worker {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        publisher: QueuePublisher,
    ) -> Result<Self> {
        let orchestrator = TestOrchestrator::new(
            RoundRunner::new(transport.clone(), config.round_timeout),
            config.num_rounds,
        )?;
        let monitor = HealthMonitor::new(
            RoundRunner::new(transport, config.round_timeout),
            &config.endpoint_urls(),
        );

        Ok(Self {
            config,
            orchestrator,
            monitor,
            publisher,
        })
    }

    pub fn is_testing(&self) -> bool {
        self.orchestrator.is_running()
    }

    pub fn is_sweeping(&self) -> bool {
        self.monitor.is_sweeping()
    }

    pub async fn handle(&self, job: JobMessage) -> Result<()> {
        match job {
            JobMessage::LatencyTest {
                test_id,
                endpoints,
                probe_type,
            } => {
                let test_id = test_id.unwrap_or_else(|| Uuid::new_v4().to_string());
                let endpoints = endpoints.unwrap_or_else(|| self.config.endpoints.clone());
                self.run_latency_test(&test_id, &endpoints, probe_type).await
            }
            JobMessage::HealthCheck { endpoints } => {
                let endpoints = endpoints.unwrap_or_else(|| self.config.endpoint_urls());
                self.run_health_check(&endpoints).await
            }
            JobMessage::Cancel => {
                info!("🛑 Cancelling latency test in progress");
                self.orchestrator.cancel();
                Ok(())
            }
        }
    }

    /// Latency run over the configured endpoints, used by the auto-repeat schedule
    pub async fn run_default_latency_test(&self) -> Result<()> {
        let test_id = Uuid::new_v4().to_string();
        self.run_latency_test(&test_id, &self.config.endpoints, self.config.auto_repeat_probe)
            .await
    }

    pub async fn run_latency_test(
        &self,
        test_id: &str,
        endpoints: &[Endpoint],
        probe: ProbeType,
    ) -> Result<()> {
        info!("🧪 Starting latency test: {}", test_id);

        let progress = self.publisher.progress_for(test_id);
        let results = self
            .orchestrator
            .run_test(endpoints, probe, &progress, &self.publisher)
            .await?;

        if let Some(fastest) = results.iter().find(|r| !r.error) {
            info!(
                "🏆 Fastest endpoint: {} ({:.2}ms avg)",
                fastest.endpoint,
                fastest.average.unwrap_or_default()
            );
        }

        let report = TestReport {
            test_id: test_id.to_string(),
            network: self.config.network.to_string(),
            probe_type: probe,
            completed_at: Utc::now().to_rfc3339(),
            results,
            history: self.orchestrator.history_snapshot().await,
        };
        self.publisher
            .publish(&self.publisher.queues().results, &report)?;

        info!("📤 Test result sent to queue");
        Ok(())
    }

    pub async fn run_health_check(&self, endpoints: &[String]) -> Result<()> {
        let Some(report) = self.monitor.sweep(endpoints, &self.publisher).await? else {
            return Ok(());
        };

        info!(
            "🩺 Health check finished: {}/{} healthy",
            report.healthy, report.checked
        );

        let snapshot = HealthSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            endpoints: self.monitor.reports().await,
        };
        self.publisher
            .publish(&self.publisher.queues().health, &snapshot)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{seed_endpoints, Network};
    use crate::error::Error;
    use crate::sink::recording::drain;
    use crate::sink::Outgoing;
    use crate::transport::mock::{ScriptedTransport, Step};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn worker_with(
        pairs: &[(&str, &str)],
        transport: Arc<ScriptedTransport>,
    ) -> (Worker, UnboundedReceiver<Outgoing>) {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let (publisher, rx) = QueuePublisher::new(config.queues.clone());
        (Worker::new(config, transport, publisher).unwrap(), rx)
    }

    fn latency_job(test_id: Option<&str>) -> JobMessage {
        JobMessage::LatencyTest {
            test_id: test_id.map(str::to_string),
            endpoints: None,
            probe_type: ProbeType::QueryTransactionBlocks,
        }
    }

    #[tokio::test]
    async fn test_latency_job_defaults_to_network_seed() {
        let transport = Arc::new(ScriptedTransport::new(Step::Ok(25)));
        let (worker, mut rx) = worker_with(&[("NUM_ROUNDS", "3")], transport.clone());

        worker.handle(latency_job(Some("run-1"))).await.unwrap();

        let seeds: Vec<String> = seed_endpoints(Network::Mainnet)
            .into_iter()
            .map(|e| e.url)
            .collect();
        for url in &seeds {
            assert_eq!(transport.call_count(url), 3);
        }
        assert!(transport
            .calls()
            .iter()
            .all(|(_, probe)| *probe == ProbeType::QueryTransactionBlocks));

        let messages = drain(&mut rx);
        let (queue, report) = messages.last().unwrap();
        assert_eq!(queue, "latency_results");
        assert_eq!(report["testId"], "run-1");
        assert_eq!(report["network"], "mainnet");
        assert_eq!(report["probeType"], "queryTransactionBlocks");
        assert_eq!(report["results"].as_array().unwrap().len(), seeds.len());
        assert_eq!(report["history"][&seeds[0]][0], 25.0);
    }

    #[tokio::test]
    async fn test_latency_job_publishes_progress_then_report() {
        let transport = Arc::new(ScriptedTransport::new(Step::Ok(10)));
        let (worker, mut rx) = worker_with(
            &[("NUM_ROUNDS", "2"), ("RPC_ENDPOINTS", "https://a.example")],
            transport,
        );

        worker.handle(latency_job(None)).await.unwrap();

        let queues: Vec<String> = drain(&mut rx).into_iter().map(|(q, _)| q).collect();
        assert_eq!(
            queues,
            vec![
                "latency_progress",
                "latency_progress",
                "latency_progress",
                "notifications",
                "latency_results",
            ]
        );
    }

    #[tokio::test]
    async fn test_generated_test_id_is_shared_by_progress_and_report() {
        let transport = Arc::new(ScriptedTransport::new(Step::Ok(10)));
        let (worker, mut rx) = worker_with(
            &[("NUM_ROUNDS", "2"), ("RPC_ENDPOINTS", "https://a.example")],
            transport,
        );

        worker.handle(latency_job(None)).await.unwrap();

        let messages = drain(&mut rx);
        let test_id = messages[0].1["testId"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&test_id).is_ok());
        let (_, report) = messages.last().unwrap();
        assert_eq!(report["testId"], test_id.as_str());
    }

    #[tokio::test]
    async fn test_health_job_defaults_to_configured_urls() {
        let transport = Arc::new(
            ScriptedTransport::new(Step::Ok(80)).with_script("https://b.example", vec![Step::Fail]),
        );
        let (worker, mut rx) = worker_with(
            &[("RPC_ENDPOINTS", "https://a.example,https://b.example")],
            transport.clone(),
        );

        worker
            .handle(JobMessage::HealthCheck { endpoints: None })
            .await
            .unwrap();

        let mut probed: Vec<String> = transport.calls().into_iter().map(|(url, _)| url).collect();
        probed.sort();
        assert_eq!(probed, vec!["https://a.example", "https://b.example"]);
        assert!(transport.calls().iter().all(|(_, probe)| *probe == ProbeType::Ping));

        let messages = drain(&mut rx);
        let (queue, snapshot) = messages.last().unwrap();
        assert_eq!(queue, "endpoint_health");
        let endpoints = snapshot["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0]["responseSuccess"], 1);
        assert_eq!(endpoints[1]["responseFailure"], 1);
        assert_eq!(endpoints[1]["healthScore"], 80.0);
    }

    #[tokio::test]
    async fn test_cancel_job_stops_running_test() {
        let transport = Arc::new(
            ScriptedTransport::new(Step::Ok(10))
                .with_delay("https://a.example", Duration::from_millis(30)),
        );
        let (worker, mut rx) = worker_with(
            &[("NUM_ROUNDS", "4"), ("RPC_ENDPOINTS", "https://a.example")],
            transport.clone(),
        );

        let (run, cancel) = tokio::join!(worker.handle(latency_job(Some("run-2"))), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            worker.handle(JobMessage::Cancel).await
        });

        cancel.unwrap();
        assert!(matches!(
            run,
            Err(Error::Cancelled {
                completed: 1,
                total: 4
            })
        ));
        assert_eq!(transport.call_count("https://a.example"), 1);
        assert!(!worker.is_testing());

        let messages = drain(&mut rx);
        assert!(messages.iter().all(|(queue, _)| queue != "latency_results"));
        let (queue, notice) = messages.last().unwrap();
        assert_eq!(queue, "notifications");
        assert_eq!(notice["title"], "Test Failed");
    }

    #[tokio::test]
    async fn test_cancel_while_idle_is_harmless() {
        let transport = Arc::new(ScriptedTransport::new(Step::Ok(10)));
        let (worker, mut rx) = worker_with(
            &[("NUM_ROUNDS", "2"), ("RPC_ENDPOINTS", "https://a.example")],
            transport,
        );

        worker.handle(JobMessage::Cancel).await.unwrap();
        assert!(drain(&mut rx).is_empty());

        worker.handle(latency_job(Some("run-3"))).await.unwrap();
        let (queue, _) = drain(&mut rx).pop().unwrap();
        assert_eq!(queue, "latency_results");
    }
}
