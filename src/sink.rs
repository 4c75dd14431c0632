use crate::config::QueueNames;
use crate::error::{Error, Result};
use crate::types::{Notification, ProgressUpdate, Severity};
use chrono::Utc;
use lapin::{options::*, BasicProperties, Channel};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receives run progress as a percentage in [0, 100]. Best-effort.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

/// Receives terminal notices for runs and sweeps. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, percent: f64) {
        info!("⏳ Testing RPC endpoints... {}%", percent.round());
    }
}

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Success => info!("✅ {}: {}", notification.title, notification.description),
            Severity::Error => error!("❌ {}: {}", notification.title, notification.description),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub queue: String,
    pub payload: Vec<u8>,
}

/// Queues worker output for a single forwarding task, so messages reach the
/// broker in the order they were produced.
#[derive(Clone)]
pub struct QueuePublisher {
    tx: mpsc::UnboundedSender<Outgoing>,
    queues: QueueNames,
}

impl QueuePublisher {
    pub fn new(queues: QueueNames) -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, queues }, rx)
    }

    pub fn queues(&self) -> &QueueNames {
        &self.queues
    }

    /// Never waits on the broker
    pub fn publish<T: Serialize>(&self, queue: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.tx
            .send(Outgoing {
                queue: queue.to_string(),
                payload,
            })
            .map_err(|_| Error::PublisherClosed)
    }

    pub fn progress_for(&self, test_id: &str) -> QueueProgress {
        QueueProgress {
            publisher: self.clone(),
            test_id: test_id.to_string(),
        }
    }
}

impl NotificationSink for QueuePublisher {
    fn notify(&self, notification: Notification) {
        LogSink.notify(notification.clone());
        if let Err(e) = self.publish(&self.queues.notifications, &notification) {
            warn!("⚠️ Dropping notification: {}", e);
        }
    }
}

pub struct QueueProgress {
    publisher: QueuePublisher,
    test_id: String,
}

impl ProgressSink for QueueProgress {
    fn report(&self, percent: f64) {
        let update = ProgressUpdate {
            test_id: self.test_id.clone(),
            progress: percent,
            timestamp: Utc::now().to_rfc3339(),
        };
        if let Err(e) = self
            .publisher
            .publish(&self.publisher.queues.progress, &update)
        {
            warn!("⚠️ Dropping progress update: {}", e);
        }
    }
}

/// Drains the publisher channel into RabbitMQ, one message at a time.
/// Ends once every `QueuePublisher` clone is dropped.
pub fn spawn_amqp_forwarder(
    channel: Channel,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let published = channel
                .basic_publish(
                    "",
                    &message.queue,
                    BasicPublishOptions::default(),
                    &message.payload,
                    BasicProperties::default(),
                )
                .await;

            match published {
                Ok(_) => debug!("📤 Published {} bytes to {}", message.payload.len(), message.queue),
                Err(e) => warn!("⚠️ Failed to publish to {}: {}", message.queue, e),
            }
        }
        info!("📪 Publisher channel closed");
    })
}

#[cfg(test)]
pub mod recording {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingSink {
        progress: Mutex<Vec<f64>>,
        notifications: Mutex<Vec<Notification>>,
    }

    impl RecordingSink {
        pub fn progress(&self) -> Vec<f64> {
            self.progress.lock().unwrap().clone()
        }

        pub fn notifications(&self) -> Vec<Notification> {
            self.notifications.lock().unwrap().clone()
        }
    }

    impl ProgressSink for RecordingSink {
        fn report(&self, percent: f64) {
            self.progress.lock().unwrap().push(percent);
        }
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, notification: Notification) {
            self.notifications.lock().unwrap().push(notification);
        }
    }

    pub fn drain(rx: &mut mpsc::UnboundedReceiver<Outgoing>) -> Vec<(String, serde_json::Value)> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            let value = serde_json::from_slice(&message.payload).unwrap();
            messages.push((message.queue, value));
        }
        messages
    }
}
