use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use rdkafka::producer::FutureRecord;
use rdkafka::util::Timeout;
use serde_json::Value;

use crate::auth::errors::NotificationError;
use crate::auth::ports::NotificationDispatcher;
use crate::config::KafkaConfig;
use crate::domain::auth::models::NotificationTemplate;
use crate::outbound::notifications::messages::NotificationMessage;

/// Publishes notifications to a Kafka topic for the mail delivery service.
pub struct KafkaNotificationDispatcher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaNotificationDispatcher {
    /// Create a producer with "at least once" delivery semantics
    ///
    /// # Notes:
    /// - `acks=all`: Wait for all in-sync replicas to acknowledge
    /// - `enable.idempotence=true`: Prevents duplicate messages during retries
    pub fn new(config: &KafkaConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(
            brokers = %config.brokers,
            topic = %config.topic,
            "Initializing Kafka producer for notifications"
        );

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "10000")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "5")
            .set("retry.backoff.ms", "100")
            .create()?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            timeout: Duration::from_secs(10),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for KafkaNotificationDispatcher {
    async fn send(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        payload: Value,
    ) -> Result<(), NotificationError> {
        let message = NotificationMessage::new(recipient, template, payload);
        let body = serde_json::to_string(&message)
            .map_err(|e| NotificationError::SerializationFailed(e.to_string()))?;

        // Keyed by recipient so messages to one address stay ordered
        let record = FutureRecord::to(&self.topic).key(recipient).payload(&body);

        self.producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map(|_| {
                tracing::debug!(
                    topic = %self.topic,
                    template = template.as_str(),
                    message_id = %message.message_id,
                    "Notification published"
                );
            })
            .map_err(|(err, _)| NotificationError::DeliveryFailed(err.to_string()))
    }
}
