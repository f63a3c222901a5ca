use tracing::info;
use uuid::Uuid;

use crate::clients::rbmq::Broker;
use crate::config::Config;
use crate::error::QueueError;
use crate::models::message::PublishRequest;

#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Message accepted and queued; carries the server-generated id.
    Accepted(Uuid),
    /// Validation failed; nothing reached the broker.
    Rejected(Vec<String>),
}

/// Publish-time gate: validates the request and, only if it passes, declares
/// the primary queue and publishes the message persistently.
pub async fn publish_notification(
    broker: &impl Broker,
    config: &Config,
    request: PublishRequest,
) -> Result<PublishOutcome, QueueError> {
    let message = match request.into_message() {
        Ok(message) => message,
        Err(errors) => return Ok(PublishOutcome::Rejected(errors)),
    };

    let payload = serde_json::to_vec(&message)
        .map_err(|e| QueueError::PublishRejected(format!("encode failed: {e}")))?;

    broker
        .declare(&config.queue_name, config.queue_durable)
        .await?;
    broker.publish(&config.queue_name, &payload).await?;

    info!(id = %message.id, origin = %message.origin, "Notification queued");

    Ok(PublishOutcome::Accepted(message.id))
}
