use tracing::{debug, error, info, warn};

use crate::clients::rbmq::Broker;
use crate::config::Config;
use crate::error::QueueError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub republished: u32,
    pub failed: u32,
}

/// Drains the entire current dead-letter depth back onto the primary queue.
///
/// Each successfully republished message is acked immediately, so a crash
/// mid-drain cannot duplicate messages that already made it back. Messages
/// whose republish fails are acked too, but their payloads accumulate in an
/// in-memory set and are re-parked on the dead-letter queue only after the
/// full pass; interleaving fresh dead-letter publishes with the drain cursor
/// would feed the drain its own rejects. This two-phase scheme assumes at
/// most one recovery invocation per queue at a time.
///
/// Failed republishes are a reported outcome, never an error.
pub async fn run_recovery(
    broker: &impl Broker,
    config: &Config,
) -> Result<RecoveryReport, QueueError> {
    let dead_queue = &config.dead_letter_queue_name;

    let depth = broker.depth(dead_queue, config.queue_durable).await?;
    if depth == 0 {
        debug!(queue = %dead_queue, "Dead-letter queue empty");
        return Ok(RecoveryReport::default());
    }

    broker
        .declare(&config.queue_name, config.queue_durable)
        .await?;

    let batch = broker.consume_batch(dead_queue, depth).await?;

    let mut republished = 0;
    let mut failed_payloads = Vec::new();

    for delivery in batch {
        match broker.publish(&config.queue_name, &delivery.payload).await {
            Ok(()) => {
                broker.ack(delivery.tag).await?;
                republished += 1;
            }
            Err(e) => {
                warn!(error = %e, "Republish failed, holding message for re-park");
                broker.ack(delivery.tag).await?;
                failed_payloads.push(delivery.payload);
            }
        }
    }

    for payload in &failed_payloads {
        if let Err(e) = broker.publish(dead_queue, payload).await {
            error!(error = %e, "Re-park failed, message dropped from broker");
        }
    }

    let report = RecoveryReport {
        republished,
        failed: failed_payloads.len() as u32,
    };

    info!(
        republished = report.republished,
        failed = report.failed,
        "Dead-letter recovery completed"
    );

    Ok(report)
}
