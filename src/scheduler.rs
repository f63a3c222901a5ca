use tokio::time::{Duration, interval, sleep};
use tracing::{debug, info, warn};

use crate::clients::printer::NetworkPrinter;
use crate::clients::rbmq::RabbitMqClient;
use crate::config::Config;
use crate::error::QueueError;
use crate::processor::{self, ProcessOutcome};
use crate::recovery::{self, RecoveryReport};

/// Ticks the print processor on its fixed period, forever. A failed cycle is
/// retried with a fixed delay up to the configured attempt count; exhausting
/// the attempts only logs and waits for the next natural tick.
pub async fn run_print_worker(config: Config) {
    let mut ticker = interval(Duration::from_secs(config.queue_schedule_secs));

    info!(
        period_secs = config.queue_schedule_secs,
        "Print worker started"
    );

    loop {
        ticker.tick().await;

        let result = with_fixed_retry(
            config.queue_max_retries,
            Duration::from_secs(config.queue_retry_delay_secs),
            || print_tick(&config),
        )
        .await;

        if let Ok(ProcessOutcome::Completed {
            printed,
            dead_lettered,
        }) = result
            && printed + dead_lettered > 0
        {
            debug!(printed, dead_lettered, "Tick drained messages");
        }
    }
}

/// Ticks dead-letter recovery on its own fixed period, forever.
pub async fn run_recovery_worker(config: Config) {
    let mut ticker = interval(Duration::from_secs(config.dead_queue_schedule_secs));

    info!(
        period_secs = config.dead_queue_schedule_secs,
        "Dead-letter recovery worker started"
    );

    loop {
        ticker.tick().await;

        let result = with_fixed_retry(
            config.dead_queue_max_retries,
            Duration::from_secs(config.dead_queue_retry_delay_secs),
            || recovery_tick(&config),
        )
        .await;

        if let Ok(report) = result
            && report != RecoveryReport::default()
        {
            debug!(
                republished = report.republished,
                failed = report.failed,
                "Tick recovered messages"
            );
        }
    }
}

/// One invocation of the queue processor, with connections scoped to this
/// tick: broker and printer handles are opened here and dropped on return.
async fn print_tick(config: &Config) -> Result<ProcessOutcome, QueueError> {
    let broker = RabbitMqClient::connect(&config.rabbitmq_url).await?;
    let printer = NetworkPrinter::new(config.printer_host.clone(), config.printer_port);

    processor::run_cycle(&broker, &printer, config).await
}

async fn recovery_tick(config: &Config) -> Result<RecoveryReport, QueueError> {
    let broker = RabbitMqClient::connect(&config.rabbitmq_url).await?;

    recovery::run_recovery(&broker, config).await
}

/// Runs `operation` up to `max_attempts` times with a fixed delay between
/// attempts. Exceeding the count reports the last error; the caller skips the
/// cycle rather than escalating.
pub async fn with_fixed_retry<F, Fut, T, E>(
    max_attempts: u32,
    delay: Duration,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(attempt, "Retry succeeded");
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    warn!(
                        max_attempts,
                        error = %e,
                        "Cycle abandoned until next scheduled tick"
                    );
                    return Err(e);
                }

                debug!(attempt, error = %e, "Cycle failed, retrying after fixed delay");
                sleep(delay).await;
            }
        }
    }
}
