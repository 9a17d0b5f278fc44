//! # Cellular Channel
//!
//! Telemetry uplink over the cellular modem: HTTP POST of each encoded
//! packet to a fixed ground endpoint.
//!
//! The channel keeps one underlying session alive across many sends
//! instead of paying reconnect cost every cycle. Two flags owned by the
//! session drive that: `should_open` is true only for the very first
//! request and for the request immediately after a recovery, and
//! `should_close` is true only when the previous cycle failed and the
//! socket must be torn down first. Recovery is a blind close-then-reopen:
//! transient link loss is the dominant failure mode in flight, and this
//! recovers it without deeper modem diagnostics.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::channel::{Cadence, Channel, SessionState};
use crate::error::{Result, TelemetryError};
use crate::frame::TelemetryFrame;
use crate::packet::encoder;
use crate::packet::registry::FieldId;

/// Modem collaborator behind the cellular channel.
///
/// On flight hardware this is the AT-command driver; the shipped
/// [`HttpModem`] rides the host IP stack instead.
#[async_trait]
pub trait Modem: Send {
    /// Bring the modem itself up
    async fn initialize(&mut self) -> Result<()>;

    /// Attach to the carrier access point (may block and retry internally)
    async fn connect(&mut self, apn: &str) -> Result<()>;

    /// Current link-layer address, `None` while detached from the carrier
    async fn link_address(&mut self) -> Result<Option<IpAddr>>;

    /// Signal strength metric, `None` when the modem cannot report one
    async fn signal_strength(&mut self) -> Result<Option<f64>>;

    /// Drop any pending bytes in the modem receive buffer
    async fn clear_receive_buffer(&mut self);

    /// POST one packet to the telemetry endpoint.
    ///
    /// `should_close` tears the existing session down first; `should_open`
    /// establishes a fresh one. With both false the session from previous
    /// requests is reused.
    async fn post(&mut self, packet: &str, should_open: bool, should_close: bool) -> Result<()>;
}

/// Session state carried across loop iterations
#[derive(Debug, Clone, Copy)]
pub struct CellularSession {
    pub state: SessionState,
    pub should_open: bool,
    pub should_close: bool,
}

impl CellularSession {
    fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            should_open: false,
            should_close: false,
        }
    }
}

/// Outcome of one loop cycle, deciding the next sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Packet posted; continue at the send cadence
    Sent,
    /// No carrier address; wait out the backoff without touching the session
    NoLink,
    /// Encode failed; skip this cycle, connection left alone
    SkippedEncode,
}

/// Cellular uplink channel
pub struct CellularChannel<M: Modem> {
    modem: M,
    frame: Arc<TelemetryFrame>,
    apn: String,
    session: CellularSession,
}

impl<M: Modem> CellularChannel<M> {
    pub fn new(modem: M, frame: Arc<TelemetryFrame>, apn: impl Into<String>) -> Self {
        Self {
            modem,
            frame,
            apn: apn.into(),
            session: CellularSession::new(),
        }
    }

    /// Current session state and reconnect flags
    pub fn session(&self) -> CellularSession {
        self.session
    }

    /// Initialize the modem and attach to the carrier.
    ///
    /// On success the very next request opens the session
    /// (`should_open = true`).
    pub async fn connect(&mut self) -> Result<()> {
        self.session.state = SessionState::Connecting;
        self.modem.initialize().await?;
        self.modem.connect(&self.apn).await?;
        self.session.state = SessionState::Connected;
        self.session.should_open = true;
        self.session.should_close = false;
        info!("modem attached to APN {}", self.apn);
        Ok(())
    }

    /// POST one packet with the current session flags, clearing them on
    /// success
    async fn post_packet(&mut self, packet: &str) -> Result<()> {
        let should_open = self.session.should_open;
        let should_close = self.session.should_close;
        self.modem.post(packet, should_open, should_close).await?;
        self.session.should_open = false;
        self.session.should_close = false;
        self.session.state = SessionState::Connected;
        Ok(())
    }

    /// One loop cycle: link gate, signal sample, encode, post.
    ///
    /// The signal-strength write is itself a producer write into the shared
    /// frame, so the metric rides the same packets as everything else.
    pub async fn cycle(&mut self) -> Result<CycleOutcome> {
        if self.modem.link_address().await?.is_none() {
            self.session.state = SessionState::Disconnected;
            warn!("no carrier link address, waiting");
            return Ok(CycleOutcome::NoLink);
        }

        if let Some(rssi) = self.modem.signal_strength().await? {
            self.frame.set(FieldId::CellSignal, rssi);
        }

        let packet = match encoder::encode(&self.frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("encode failed, skipping cycle: {}", e);
                return Ok(CycleOutcome::SkippedEncode);
            }
        };

        self.post_packet(&packet).await?;
        Ok(CycleOutcome::Sent)
    }

    /// Supervised cellular loop.
    ///
    /// Connect (retrying forever), then cycle at the send cadence while
    /// connected and at the backoff cadence otherwise. Never returns.
    pub async fn run(mut self, cadence: Cadence, startup_delay: Duration) {
        // Give the modem time to register on the network after power-up
        sleep(startup_delay).await;
        info!("starting cellular loop");

        loop {
            match self.connect().await {
                Ok(()) => break,
                Err(e) => {
                    warn!("modem connect failed: {}", e);
                    sleep(cadence.backoff).await;
                }
            }
        }

        loop {
            match self.cycle().await {
                Ok(CycleOutcome::Sent) | Ok(CycleOutcome::SkippedEncode) => {
                    sleep(cadence.send_interval).await;
                }
                Ok(CycleOutcome::NoLink) => {
                    sleep(cadence.backoff).await;
                }
                Err(e) => {
                    warn!("cellular cycle failed: {}", e);
                    if let Err(e) = self.recover().await {
                        warn!("cellular recovery failed: {}", e);
                    }
                    sleep(cadence.backoff).await;
                }
            }
        }
    }
}

#[async_trait]
impl<M: Modem> Channel for CellularChannel<M> {
    fn name(&self) -> &'static str {
        "cellular"
    }

    async fn open(&mut self) -> Result<()> {
        self.connect().await
    }

    async fn send(&mut self, packet: &str) -> Result<()> {
        self.post_packet(packet).await
    }

    /// Deferred teardown: the socket is closed by the next request
    async fn close(&mut self) -> Result<()> {
        self.session.should_close = true;
        Ok(())
    }

    /// Flag-based recovery: clear the modem buffer and force the next
    /// request through a clean close-then-reopen
    async fn recover(&mut self) -> Result<()> {
        self.modem.clear_receive_buffer().await;
        self.session.state = SessionState::Recovering;
        self.session.should_close = true;
        self.session.should_open = true;
        Ok(())
    }
}

/// HTTP "modem": posts packets over the host IP stack via reqwest.
///
/// Flight builds replace this with the AT-command driver; the session
/// flags map onto dropping and rebuilding the HTTP client, which closes
/// and reopens the underlying connection pool.
pub struct HttpModem {
    url: reqwest::Url,
    request_timeout: Duration,
    client: Option<reqwest::Client>,
}

impl HttpModem {
    /// Create a modem posting to the given endpoint URL
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| TelemetryError::Transport(format!("bad endpoint '{}': {}", endpoint, e)))?;
        Ok(Self {
            url,
            request_timeout,
            client: None,
        })
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?)
    }
}

#[async_trait]
impl Modem for HttpModem {
    async fn initialize(&mut self) -> Result<()> {
        // The host IP stack needs no AT bring-up
        Ok(())
    }

    async fn connect(&mut self, _apn: &str) -> Result<()> {
        // Carrier attachment is owned by the OS network link
        Ok(())
    }

    async fn link_address(&mut self) -> Result<Option<IpAddr>> {
        let Some(host) = self.url.host_str() else {
            return Ok(None);
        };
        let port = self.url.port_or_known_default().unwrap_or(80);

        // A connected UDP socket resolves the route without sending
        // anything; no route or no resolution means no usable link
        let socket = tokio::net::UdpSocket::bind("0.0.0.0:0").await?;
        match socket.connect((host, port)).await {
            Ok(()) => Ok(socket.local_addr().ok().map(|addr| addr.ip())),
            Err(_) => Ok(None),
        }
    }

    async fn signal_strength(&mut self) -> Result<Option<f64>> {
        // Not observable through the IP stack
        Ok(None)
    }

    async fn clear_receive_buffer(&mut self) {}

    async fn post(&mut self, packet: &str, should_open: bool, should_close: bool) -> Result<()> {
        if should_close {
            // Dropping the client closes its pooled connections
            self.client = None;
        }
        if should_open || self.client.is_none() {
            self.client = Some(self.build_client()?);
        }

        // Checked just above
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| TelemetryError::Transport("no http client".to_string()))?;

        client
            .post(self.url.clone())
            .body(packet.to_string())
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
