use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties,
    options::{BasicAckOptions, BasicGetOptions, BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
};
use tracing::{debug, info};

use crate::error::QueueError;

/// One unacknowledged delivery pulled from a queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub payload: Vec<u8>,
}

/// Seam over the durable-queue broker. Processors are generic over this so
/// their drain logic can be exercised against an in-memory double; the
/// production implementation is [`RabbitMqClient`].
#[allow(async_fn_in_trait)]
pub trait Broker {
    /// Declares a queue. Safe to call repeatedly with identical arguments.
    async fn declare(&self, queue: &str, durable: bool) -> Result<(), QueueError>;

    /// Current number of messages sitting in the queue.
    async fn depth(&self, queue: &str, durable: bool) -> Result<u32, QueueError>;

    /// Publishes a persistent payload to the queue.
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), QueueError>;

    /// Pulls at most `min(max_count, current depth)` deliveries, in broker
    /// delivery order, without waiting for messages that are not yet enqueued.
    async fn consume_batch(&self, queue: &str, max_count: u32)
    -> Result<Vec<Delivery>, QueueError>;

    /// Acknowledges (and thereby removes) a prior delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError>;
}

pub struct RabbitMqClient {
    channel: Channel,
}

impl RabbitMqClient {
    /// Opens a fresh connection and channel. Connections are scoped to one
    /// processing invocation; dropping the client releases them.
    pub async fn connect(rabbitmq_url: &str) -> Result<Self, QueueError> {
        let connection = Connection::connect(rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::BrokerUnavailable(format!("connect failed: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| QueueError::BrokerUnavailable(format!("channel creation failed: {e}")))?;

        debug!("RabbitMQ channel created");

        Ok(Self { channel })
    }

    async fn declare_inner(&self, queue: &str, durable: bool) -> Result<lapin::Queue, QueueError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::BrokerUnavailable(format!("declare of '{queue}' failed: {e}")))
    }
}

impl Broker for RabbitMqClient {
    async fn declare(&self, queue: &str, durable: bool) -> Result<(), QueueError> {
        self.declare_inner(queue, durable).await?;
        info!(queue, durable, "Queue declared");
        Ok(())
    }

    async fn depth(&self, queue: &str, durable: bool) -> Result<u32, QueueError> {
        // Redeclaring with identical arguments is a no-op that reports the
        // current message count.
        let declared = self.declare_inner(queue, durable).await?;
        Ok(declared.message_count())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), QueueError> {
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| QueueError::PublishRejected(format!("publish to '{queue}' failed: {e}")))?;

        Ok(())
    }

    async fn consume_batch(
        &self,
        queue: &str,
        max_count: u32,
    ) -> Result<Vec<Delivery>, QueueError> {
        let mut batch = Vec::new();

        // basic_get fetches exactly one already-enqueued message per call and
        // returns None on an empty queue, so the batch never blocks waiting
        // for future publishes.
        for _ in 0..max_count {
            let fetched = self
                .channel
                .basic_get(queue, BasicGetOptions::default())
                .await
                .map_err(|e| {
                    QueueError::BrokerUnavailable(format!("get from '{queue}' failed: {e}"))
                })?;

            match fetched {
                Some(message) => batch.push(Delivery {
                    tag: message.delivery.delivery_tag,
                    payload: message.delivery.data.clone(),
                }),
                None => break,
            }
        }

        debug!(queue, count = batch.len(), "Batch consumed");

        Ok(batch)
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::BrokerUnavailable(format!("ack failed: {e}")))?;

        Ok(())
    }
}
