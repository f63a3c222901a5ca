use thiserror::Error;

/// Broker-side failures. Both variants are transient: the scheduler retries
/// the whole cycle with a fixed delay instead of crashing the worker.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("publish rejected by broker: {0}")]
    PublishRejected(String),
}

/// Printer device failures.
#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("printer unreachable: {0}")]
    Unavailable(String),

    #[error("printer i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("printer did not respond within {0}ms")]
    Timeout(u64),

    #[error("feed of {0} lines out of range (device accepts 5-255)")]
    FeedOutOfRange(u16),
}

/// Per-message failure while turning a queued payload into printer output.
/// Contained at message granularity: the processor dead-letters the payload
/// and moves on to the next delivery.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("payload is not a valid notification message: {0}")]
    BadPayload(#[from] serde_json::Error),

    #[error("key-value body is not a flat json object: {0}")]
    MalformedKeyValueBody(String),

    #[error(transparent)]
    Printer(#[from] PrinterError),
}
