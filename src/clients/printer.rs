use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::PrinterError;
use crate::models::paper::PaperStatus;

/// ESC @ - initialize printer
const INIT: [u8; 2] = [0x1B, 0x40];
/// ESC d n - print and feed n lines
const FEED: [u8; 2] = [0x1B, 0x64];
/// GS V 0 - full cut
const CUT: [u8; 3] = [0x1D, 0x56, 0x00];
/// DLE EOT 4 - transmit paper sensor status
const PAPER_SENSOR_QUERY: [u8; 3] = [0x10, 0x04, 0x04];

/// Device-capability bounds for a single feed command.
pub const FEED_MIN_LINES: u16 = 5;
pub const FEED_MAX_LINES: u16 = 255;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const STATUS_TIMEOUT_MS: u64 = 1500;

/// Seam over the receipt printer. The dispatcher and the processor gate are
/// generic over this; the production implementation is [`NetworkPrinter`].
#[allow(async_fn_in_trait)]
pub trait Printer {
    async fn is_online(&self) -> bool;

    async fn paper_status(&self) -> Result<PaperStatus, PrinterError>;

    /// Emits each line as a separate row of receipt text, in order.
    async fn write_lines(&self, lines: &[String]) -> Result<(), PrinterError>;

    /// Feeds `lines` rows of blank paper. `lines` outside
    /// [`FEED_MIN_LINES`, `FEED_MAX_LINES`] is rejected before the device is
    /// contacted.
    async fn feed(&self, lines: u16) -> Result<(), PrinterError>;

    async fn cut(&self) -> Result<(), PrinterError>;
}

/// Rejects feed counts the device cannot execute, without any device I/O.
pub fn validate_feed_lines(lines: u16) -> Result<u8, PrinterError> {
    if !(FEED_MIN_LINES..=FEED_MAX_LINES).contains(&lines) {
        return Err(PrinterError::FeedOutOfRange(lines));
    }
    Ok(lines as u8)
}

/// Thermal printer reachable over raw TCP (port 9100 on most devices).
///
/// Each trait operation opens its own connection and releases it on every
/// exit path; nothing is pooled across invocations.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    host: String,
    port: u16,
}

impl NetworkPrinter {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    async fn connect(&self) -> Result<TcpStream, PrinterError> {
        let addr = format!("{}:{}", self.host, self.port);

        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| PrinterError::Timeout(CONNECT_TIMEOUT.as_millis() as u64))?
            .map_err(|e| PrinterError::Unavailable(format!("{addr}: {e}")))
    }

    async fn send(&self, data: &[u8]) -> Result<(), PrinterError> {
        let mut stream = self.connect().await?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }
}

impl Printer for NetworkPrinter {
    async fn is_online(&self) -> bool {
        match self.connect().await {
            Ok(_) => true,
            Err(e) => {
                warn!(host = %self.host, error = %e, "Printer offline");
                false
            }
        }
    }

    async fn paper_status(&self) -> Result<PaperStatus, PrinterError> {
        let mut stream = self.connect().await?;
        stream.write_all(&PAPER_SENSOR_QUERY).await?;
        stream.flush().await?;

        let mut reply = [0u8; 1];
        tokio::time::timeout(
            Duration::from_millis(STATUS_TIMEOUT_MS),
            stream.read_exact(&mut reply),
        )
        .await
        .map_err(|_| PrinterError::Timeout(STATUS_TIMEOUT_MS))??;

        let status = PaperStatus::from_code(decode_paper_sensor(reply[0]));
        debug!(raw = reply[0], ?status, "Paper sensor replied");

        Ok(status)
    }

    async fn write_lines(&self, lines: &[String]) -> Result<(), PrinterError> {
        let mut data = Vec::with_capacity(lines.iter().map(|l| l.len() + 1).sum::<usize>() + 2);
        data.extend_from_slice(&INIT);
        for line in lines {
            data.extend_from_slice(line.as_bytes());
            data.push(b'\n');
        }

        self.send(&data).await
    }

    async fn feed(&self, lines: u16) -> Result<(), PrinterError> {
        let count = validate_feed_lines(lines)?;
        self.send(&[FEED[0], FEED[1], count]).await
    }

    async fn cut(&self) -> Result<(), PrinterError> {
        self.send(&CUT).await
    }
}

/// Maps a DLE EOT 4 reply byte onto the documented sensor codes
/// (0 = empty, 1 = near end, 2 = plenty). Reply bytes that do not carry the
/// fixed frame bits of a real status reply yield an out-of-range code, which
/// [`PaperStatus::from_code`] turns into `Invalid`.
fn decode_paper_sensor(raw: u8) -> u8 {
    // Bits 0, 1, 4 and 7 of a paper-sensor reply are fixed at 0, 1, 1, 0.
    if raw & 0b1001_0011 != 0b0001_0010 {
        return 0xFF;
    }

    if raw & 0b0110_0000 == 0b0110_0000 {
        0 // roll-end sensor: paper not present
    } else if raw & 0b0000_1100 == 0b0000_1100 {
        1 // near-end sensor tripped
    } else {
        2
    }
}
