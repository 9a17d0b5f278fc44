//! # Stratolink
//!
//! Telemetry firmware for an airborne probe.
//!
//! Continuously samples sensors into a shared telemetry frame and
//! transmits encoded snapshots redundantly over radio, cellular and a
//! local durable log, each in its own supervised loop.

use std::sync::Arc;

use anyhow::Result;
use tokio::time::Duration;
use tracing::{info, warn};

use stratolink::channel::cellular::{CellularChannel, HttpModem};
use stratolink::channel::onboard::OnboardLogChannel;
use stratolink::channel::radio::{RadioChannel, SerialRadioLink};
use stratolink::channel::{self, Cadence};
use stratolink::config::Config;
use stratolink::frame::TelemetryFrame;
use stratolink::producer::position::{NmeaFixParser, PositionProducer, SerialSentenceFeed};
use stratolink::producer::sensors::{BenchSensorSuite, SensorSampler, SensorSuite};

/// Configuration file looked up in the working directory
const CONFIG_PATH: &str = "stratolink.toml";

/// Main entry point for the Stratolink firmware
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration and pick the frame registry variant
///    - Decide whether the onboard log survives this boot
///
/// 2. **Supervised loops** (one tokio task each, running forever)
///    - Radio channel at ~750 ms cadence
///    - Cellular channel at ~50 ms cadence once attached
///    - Onboard log channel at ~950 ms cadence
///    - Sensor sampler feeding the frame
///    - Position producer polling the GNSS feed
///
/// 3. **Shutdown**
///    - Ctrl+C stops the process; the loops themselves never exit
///
/// # Errors
///
/// Returns an error only for an invalid configuration file. Missing
/// devices, an unreachable endpoint or storage faults are handled inside
/// the affected loop and never abort the process.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Stratolink v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH)?;
    let registry = config.frame.variant.registry();
    info!(
        "frame variant {:?}: {} fields, {} bytes on the wire",
        config.frame.variant,
        registry.len(),
        registry.wire_size()
    );

    let frame = Arc::new(TelemetryFrame::new(registry));

    // Onboard log boot decision: the first battery reading decides whether
    // this is a deliberate power-up or an in-flight brownout. A failed read
    // counts as 0.0 V and preserves the previous flight's log.
    let mut suite = BenchSensorSuite;
    let boot_voltage = match suite.sample().await {
        Ok(sample) => sample.battery_volts,
        Err(e) => {
            warn!("boot battery read failed: {}", e);
            0.0
        }
    };
    let onboard = OnboardLogChannel::new(&config.onboard.path);
    match onboard
        .clear_if_stable(boot_voltage, config.onboard.battery_threshold_v)
        .await
    {
        Ok(true) => {}
        Ok(false) => info!("onboard log preserved from previous boot"),
        Err(e) => warn!("onboard log boot check failed: {}", e),
    }

    // Radio downlink
    let radio = RadioChannel::new(SerialRadioLink::new(
        config.radio.device.as_str(),
        config.radio.baud_rate,
    ));
    tokio::spawn(channel::run(
        radio,
        Arc::clone(&frame),
        Cadence::from_millis(config.radio.send_interval_ms, config.radio.backoff_ms),
    ));

    // Cellular uplink
    let modem = HttpModem::new(
        &config.cellular.endpoint,
        Duration::from_millis(config.cellular.request_timeout_ms),
    )?;
    let cellular = CellularChannel::new(modem, Arc::clone(&frame), config.cellular.apn.as_str());
    tokio::spawn(cellular.run(
        Cadence::from_millis(config.cellular.send_interval_ms, config.cellular.backoff_ms),
        Duration::from_millis(config.cellular.startup_delay_ms),
    ));

    // Onboard durable log
    tokio::spawn(channel::run(
        onboard,
        Arc::clone(&frame),
        Cadence::from_millis(config.onboard.send_interval_ms, config.onboard.backoff_ms),
    ));

    // Sensor sampler
    let sampler = SensorSampler::new(suite, Arc::clone(&frame));
    tokio::spawn(sampler.run(
        Duration::from_millis(config.sensors.sample_interval_ms),
        Duration::from_millis(config.sensors.backoff_ms),
    ));

    // Position producer
    let position = PositionProducer::new(
        SerialSentenceFeed::new(config.gps.device.as_str(), config.gps.baud_rate),
        NmeaFixParser::new(),
        Arc::clone(&frame),
    );
    tokio::spawn(position.run(
        Duration::from_millis(config.gps.poll_interval_ms),
        Duration::from_millis(config.gps.backoff_ms),
    ));

    info!("all loops started, press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cadences_match_flight_constants() {
        let config = Config::default();
        let radio = Cadence::from_millis(config.radio.send_interval_ms, config.radio.backoff_ms);
        assert_eq!(radio.send_interval, Duration::from_millis(750));
        assert_eq!(radio.backoff, Duration::from_millis(1000));

        let cellular =
            Cadence::from_millis(config.cellular.send_interval_ms, config.cellular.backoff_ms);
        assert_eq!(cellular.send_interval, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_bench_boot_voltage_clears_onboard_log() {
        // The first battery reading gates boot truncation; the bench suite
        // must read as a deliberate stable power-up
        let mut suite = BenchSensorSuite;
        let boot_voltage = suite.sample().await.unwrap().battery_volts;
        let config = Config::default();
        assert!(boot_voltage >= config.onboard.battery_threshold_v);

        let dir = tempfile::tempdir().unwrap();
        let onboard = OnboardLogChannel::new(dir.path().join("onboard.log"));
        std::fs::write(onboard.path(), "previous-flight\n").unwrap();
        let cleared = onboard
            .clear_if_stable(boot_voltage, config.onboard.battery_threshold_v)
            .await
            .unwrap();
        assert!(cleared);
    }

    #[test]
    fn test_config_path_is_relative() {
        // The probe runs from its own working directory
        assert!(!CONFIG_PATH.starts_with('/'));
    }
}
