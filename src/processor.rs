use tracing::{debug, info, warn};

use crate::clients::printer::Printer;
use crate::clients::rbmq::Broker;
use crate::config::Config;
use crate::dispatch;
use crate::error::{DispatchError, QueueError};
use crate::models::message::NotificationMessage;
use crate::models::paper::PaperStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The availability gate failed; the queue was not touched and the
    /// messages wait for the next tick.
    PrinterUnavailable,
    Completed { printed: u32, dead_lettered: u32 },
}

/// One processing cycle over the primary queue: gate, bounded drain, and
/// per-message dispatch with dead-lettering.
///
/// Per-message failures never abort the batch. The dead-letter publish
/// happens before the primary ack, so a crash between the two re-delivers
/// the message instead of losing it.
pub async fn run_cycle(
    broker: &impl Broker,
    printer: &impl Printer,
    config: &Config,
) -> Result<ProcessOutcome, QueueError> {
    if !gate_open(printer, config).await {
        return Ok(ProcessOutcome::PrinterUnavailable);
    }

    let depth = broker.depth(&config.queue_name, config.queue_durable).await?;
    if depth == 0 {
        debug!(queue = %config.queue_name, "Queue empty, nothing to print");
        return Ok(ProcessOutcome::Completed {
            printed: 0,
            dead_lettered: 0,
        });
    }

    broker
        .declare(&config.dead_letter_queue_name, config.queue_durable)
        .await?;

    let batch = broker
        .consume_batch(&config.queue_name, depth.min(config.batch_size))
        .await?;

    let mut printed = 0;
    let mut dead_lettered = 0;

    for delivery in batch {
        match dispatch_payload(printer, &delivery.payload, &config.message_separator).await {
            Ok(()) => {
                broker.ack(delivery.tag).await?;
                printed += 1;
            }
            Err(e) => {
                warn!(error = %e, "Dispatch failed, dead-lettering message");

                // Park the unmodified payload first; only then remove it from
                // the primary queue.
                broker
                    .publish(&config.dead_letter_queue_name, &delivery.payload)
                    .await?;
                broker.ack(delivery.tag).await?;
                dead_lettered += 1;
            }
        }
    }

    info!(printed, dead_lettered, "Print cycle completed");

    Ok(ProcessOutcome::Completed {
        printed,
        dead_lettered,
    })
}

/// Availability gate consulted before any queue interaction. Advisory at
/// batch granularity: the device can still drop mid-batch, which surfaces as
/// ordinary per-message dispatch failures.
async fn gate_open(printer: &impl Printer, config: &Config) -> bool {
    if !printer.is_online().await {
        warn!("Printer offline, skipping cycle");
        return false;
    }

    if config.paper_check_enabled {
        match printer.paper_status().await {
            Ok(PaperStatus::Plenty) => {}
            Ok(status) => {
                warn!(?status, "Paper not ready, skipping cycle");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Paper status query failed, skipping cycle");
                return false;
            }
        }
    }

    true
}

async fn dispatch_payload(
    printer: &impl Printer,
    payload: &[u8],
    separator: &str,
) -> Result<(), DispatchError> {
    let message: NotificationMessage = serde_json::from_slice(payload)?;
    dispatch::dispatch(printer, &message, separator).await
}
