use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    pub queue_name: String,
    pub dead_letter_queue_name: String,
    pub queue_durable: bool,
    pub batch_size: u32,

    pub printer_host: String,
    pub printer_port: u16,
    pub message_separator: String,
    pub paper_check_enabled: bool,

    pub queue_schedule_secs: u64,
    pub queue_max_retries: u32,
    pub queue_retry_delay_secs: u64,

    pub dead_queue_schedule_secs: u64,
    pub dead_queue_max_retries: u32,
    pub dead_queue_retry_delay_secs: u64,

    pub server_port: u16,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {e}"))?;
        Ok(config)
    }
}
