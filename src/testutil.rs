//! In-memory broker and printer doubles for exercising the drain logic
//! without a live RabbitMQ or device on the network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::clients::printer::{Printer, validate_feed_lines};
use crate::clients::rbmq::{Broker, Delivery};
use crate::config::Config;
use crate::error::{PrinterError, QueueError};
use crate::models::paper::PaperStatus;

pub fn test_config() -> Config {
    Config {
        rabbitmq_url: "amqp://localhost:5672".to_string(),
        queue_name: "print.notifications".to_string(),
        dead_letter_queue_name: "print.notifications.dead".to_string(),
        queue_durable: true,
        batch_size: 10,
        printer_host: "127.0.0.1".to_string(),
        printer_port: 9100,
        message_separator: "--------------------------------".to_string(),
        paper_check_enabled: false,
        queue_schedule_secs: 5,
        queue_max_retries: 3,
        queue_retry_delay_secs: 1,
        dead_queue_schedule_secs: 60,
        dead_queue_max_retries: 3,
        dead_queue_retry_delay_secs: 1,
        server_port: 8080,
    }
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    unacked: HashMap<u64, Vec<u8>>,
    next_tag: u64,
    fail_publishes: Vec<(String, Vec<u8>)>,
    ops: Vec<String>,
}

/// FIFO in-memory stand-in for the broker. Records every operation so tests
/// can assert on call ordering (dead-letter publish before primary ack) and
/// on short-circuit paths performing no queue I/O.
#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
}

impl MemoryBroker {
    pub fn with_messages(queue: &str, payloads: &[&[u8]]) -> Self {
        let broker = Self::default();
        for payload in payloads {
            broker.seed(queue, payload);
        }
        broker
    }

    /// Enqueues a payload without touching the operation log.
    pub fn seed(&self, queue: &str, payload: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_vec());
    }

    /// Makes every publish of `payload` to `queue` fail.
    pub fn fail_publish(&self, queue: &str, payload: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .fail_publishes
            .push((queue.to_string(), payload.to_vec()));
    }

    pub fn queue_contents(&self, queue: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn unacked_count(&self) -> usize {
        self.state.lock().unwrap().unacked.len()
    }

    pub fn ops(&self) -> Vec<String> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Index of the first logged operation starting with `prefix`.
    pub fn op_index(&self, prefix: &str) -> Option<usize> {
        self.ops().iter().position(|op| op.starts_with(prefix))
    }
}

impl Broker for MemoryBroker {
    async fn declare(&self, queue: &str, _durable: bool) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.queues.entry(queue.to_string()).or_default();
        state.ops.push(format!("declare {queue}"));
        Ok(())
    }

    async fn depth(&self, queue: &str, _durable: bool) -> Result<u32, QueueError> {
        let mut state = self.state.lock().unwrap();
        let depth = state.queues.get(queue).map_or(0, |q| q.len()) as u32;
        state.ops.push(format!("depth {queue}"));
        Ok(depth)
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("publish {queue}"));

        let rejected = state
            .fail_publishes
            .iter()
            .any(|(q, p)| q == queue && p == payload);
        if rejected {
            return Err(QueueError::PublishRejected(format!(
                "forced failure for '{queue}'"
            )));
        }

        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_vec());
        Ok(())
    }

    async fn consume_batch(
        &self,
        queue: &str,
        max_count: u32,
    ) -> Result<Vec<Delivery>, QueueError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("consume {queue} {max_count}"));

        let mut batch = Vec::new();
        for _ in 0..max_count {
            let Some(payload) = state.queues.get_mut(queue).and_then(VecDeque::pop_front) else {
                break;
            };
            state.next_tag += 1;
            let tag = state.next_tag;
            state.unacked.insert(tag, payload.clone());
            batch.push(Delivery { tag, payload });
        }

        Ok(batch)
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("ack {delivery_tag}"));
        state.unacked.remove(&delivery_tag);
        Ok(())
    }
}

struct PrinterState {
    printed: Vec<String>,
    feeds: Vec<u16>,
    cuts: u32,
}

/// Scriptable printer double: online flag, paper state, and an optional
/// marker that makes any receipt containing it fail at the device.
pub struct FakePrinter {
    online: bool,
    paper: PaperStatus,
    fail_line_containing: Option<String>,
    state: Mutex<PrinterState>,
}

impl Default for FakePrinter {
    fn default() -> Self {
        Self {
            online: true,
            paper: PaperStatus::Plenty,
            fail_line_containing: None,
            state: Mutex::new(PrinterState {
                printed: Vec::new(),
                feeds: Vec::new(),
                cuts: 0,
            }),
        }
    }
}

impl FakePrinter {
    pub fn offline() -> Self {
        Self {
            online: false,
            ..Self::default()
        }
    }

    pub fn with_paper(paper: PaperStatus) -> Self {
        Self {
            paper,
            ..Self::default()
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_line_containing: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn printed_lines(&self) -> Vec<String> {
        self.state.lock().unwrap().printed.clone()
    }

    pub fn cut_count(&self) -> u32 {
        self.state.lock().unwrap().cuts
    }

    pub fn feeds(&self) -> Vec<u16> {
        self.state.lock().unwrap().feeds.clone()
    }
}

impl Printer for FakePrinter {
    async fn is_online(&self) -> bool {
        self.online
    }

    async fn paper_status(&self) -> Result<PaperStatus, PrinterError> {
        if !self.online {
            return Err(PrinterError::Unavailable("offline".to_string()));
        }
        Ok(self.paper)
    }

    async fn write_lines(&self, lines: &[String]) -> Result<(), PrinterError> {
        if let Some(marker) = &self.fail_line_containing
            && lines.iter().any(|line| line.contains(marker))
        {
            return Err(PrinterError::Io(std::io::Error::other("forced write error")));
        }

        self.state.lock().unwrap().printed.extend_from_slice(lines);
        Ok(())
    }

    async fn feed(&self, lines: u16) -> Result<(), PrinterError> {
        validate_feed_lines(lines)?;
        self.state.lock().unwrap().feeds.push(lines);
        Ok(())
    }

    async fn cut(&self) -> Result<(), PrinterError> {
        self.state.lock().unwrap().cuts += 1;
        Ok(())
    }
}
