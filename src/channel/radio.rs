//! # Radio Channel
//!
//! Long-range low-bandwidth downlink over a LoRa-class serial modem.
//!
//! The link is connectionless: there is no session to rebuild, so recovery
//! after a failed write is just the generic backoff. Framing on the wire is
//! length-implicit: each base64 packet is terminated by a single `@`
//! sentinel byte, and the ground station splits the stream on it.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::error::{Result, TelemetryError};

/// Sentinel byte terminating each packet on the radio stream
pub const PACKET_SENTINEL: u8 = b'@';

/// Serial link collaborator behind the radio channel.
///
/// The concrete implementation owns the device; mocks stand in for it in
/// tests.
#[async_trait]
pub trait RadioLink: Send {
    /// Open (or reopen) the underlying device
    async fn open(&mut self) -> Result<()>;

    /// Write raw bytes to the link
    async fn write_bytes(&mut self, data: &[u8]) -> Result<()>;
}

/// Radio link over a tokio-serial port
pub struct SerialRadioLink {
    device: String,
    baud_rate: u32,
    port: Option<tokio_serial::SerialStream>,
}

impl SerialRadioLink {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            port: None,
        }
    }
}

#[async_trait]
impl RadioLink for SerialRadioLink {
    async fn open(&mut self) -> Result<()> {
        let port = tokio_serial::new(&self.device, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                TelemetryError::Transport(format!("failed to open {}: {}", self.device, e))
            })?;

        info!("radio serial port open at {}", self.device);
        self.port = Some(port);
        Ok(())
    }

    async fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| TelemetryError::Transport("radio port not open".to_string()))?;

        port.write_all(data)
            .await
            .map_err(|e| TelemetryError::Transport(format!("radio write failed: {}", e)))?;
        port.flush()
            .await
            .map_err(|e| TelemetryError::Transport(format!("radio flush failed: {}", e)))?;

        debug!("sent radio packet ({} bytes)", data.len());
        Ok(())
    }
}

/// Radio downlink channel
pub struct RadioChannel<L: RadioLink> {
    link: L,
}

impl<L: RadioLink> RadioChannel<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }
}

#[async_trait]
impl<L: RadioLink> Channel for RadioChannel<L> {
    fn name(&self) -> &'static str {
        "radio"
    }

    async fn open(&mut self) -> Result<()> {
        self.link.open().await
    }

    async fn send(&mut self, packet: &str) -> Result<()> {
        let mut framed = Vec::with_capacity(packet.len() + 1);
        framed.extend_from_slice(packet.as_bytes());
        framed.push(PACKET_SENTINEL);
        self.link.write_bytes(&framed).await
    }
}
