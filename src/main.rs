use anyhow::Result;
use futures_lite::StreamExt;
use lapin::{options::*, types::FieldTable, Connection, ConnectionProperties};
use log::{error, info, warn};
use std::sync::Arc;

use rpc_latency_worker::{
    scheduler, sink, Config, JobMessage, JsonRpcTransport, QueuePublisher, Worker,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    info!("🚀 RPC latency worker starting...");

    let config = Config::from_env()?;
    info!(
        "🌐 Network {} with {} candidate endpoints, {} rounds per test",
        config.network,
        config.endpoints.len(),
        config.num_rounds
    );

    info!("📡 Connecting to RabbitMQ at {}", config.rabbitmq_url);

    let conn = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default()).await?;
    let channel = conn.create_channel().await?;

    info!("✅ Connected to RabbitMQ successfully");

    let queues = config.queues.clone();
    for queue in [
        &queues.jobs,
        &queues.results,
        &queues.progress,
        &queues.health,
        &queues.notifications,
    ] {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
    }

    let transport = Arc::new(JsonRpcTransport::new(config.probe_timeout)?);
    let (publisher, outgoing) = QueuePublisher::new(queues.clone());
    sink::spawn_amqp_forwarder(channel.clone(), outgoing);
    let worker = Arc::new(Worker::new(config.clone(), transport, publisher)?);

    if let Some(period) = config.auto_repeat {
        let busy = worker.clone();
        let job = worker.clone();
        scheduler::spawn_periodic(
            "latency test",
            period,
            move || busy.is_testing(),
            move || {
                let worker = job.clone();
                async move {
                    if let Err(e) = worker.run_default_latency_test().await {
                        warn!("⚠️ Scheduled latency test failed: {}", e);
                    }
                }
            },
        );
    }

    if let Some(period) = config.health_interval {
        let busy = worker.clone();
        let job = worker.clone();
        let endpoints = config.endpoint_urls();
        scheduler::spawn_periodic(
            "health check",
            period,
            move || busy.is_sweeping(),
            move || {
                let worker = job.clone();
                let endpoints = endpoints.clone();
                async move {
                    if let Err(e) = worker.run_health_check(&endpoints).await {
                        warn!("⚠️ Scheduled health check failed: {}", e);
                    }
                }
            },
        );
    }

    info!("🎧 Waiting for jobs on {}...", queues.jobs);

    let mut consumer = channel
        .basic_consume(
            &queues.jobs,
            "rpc_latency_worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let payload = String::from_utf8_lossy(&delivery.data);
                info!("📨 Received message: {}", payload);

                match serde_json::from_str::<JobMessage>(&payload) {
                    Ok(job) => {
                        let worker = worker.clone();
                        tokio::spawn(async move {
                            match worker.handle(job).await {
                                Ok(_) => info!("✅ Job completed successfully"),
                                Err(e) => error!("❌ Job failed: {}", e),
                            }
                        });

                        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                            error!("❌ Failed to ack message: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("❌ Failed to parse message: {}", e);
                        if let Err(e) = delivery
                            .nack(BasicNackOptions {
                                requeue: false,
                                ..Default::default()
                            })
                            .await
                        {
                            error!("❌ Failed to nack message: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                error!("❌ Consumer error: {}", e);
            }
        }
    }

    Ok(())
}
