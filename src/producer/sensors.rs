//! # Sensor Sampler
//!
//! Continuously reads the physical sensor suite and writes every
//! measurement into the shared frame.
//!
//! The suite itself (I2C barometers, IMU, magnetometer, battery ADC) sits
//! behind the [`SensorSuite`] trait: the sampler only cares about getting
//! one coherent-enough batch of readings per cycle. A failed read is
//! logged and skipped; the frame keeps the stale values until the next
//! good sample.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Timelike;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::error::Result;
use crate::frame::TelemetryFrame;
use crate::packet::registry::FieldId;

/// One batch of physical readings from the sensor suite
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorSample {
    /// Milliseconds since start of day
    pub time_ms: f64,
    pub battery_volts: f64,
    /// BMP / BME / MS5611 pressures, hPa
    pub pressure_hpa: [f64; 3],
    /// BMP / IMU / BME / MS5611 temperatures, °C
    pub temperature_c: [f64; 4],
    pub humidity_pct: f64,
    /// Acceleration, m/s²
    pub accel: [f64; 3],
    /// Angular rate, deg/s
    pub gyro: [f64; 3],
    /// Magnetic field, µT
    pub mag: [f64; 3],
}

/// Physical sensor collaborator read once per sampling cycle
#[async_trait]
pub trait SensorSuite: Send {
    async fn sample(&mut self) -> Result<SensorSample>;
}

/// Milliseconds since start of day, the probe's wire time base
pub fn millis_of_day() -> f64 {
    let now = chrono::Utc::now().time();
    (now.num_seconds_from_midnight() as u64 * 1000 + (now.nanosecond() / 1_000_000) as u64) as f64
}

/// Bench stand-in for the flight sensor suite.
///
/// Flight builds replace this with the I2C drivers; on a host run it
/// reports nominal ground-level readings with a live time base, the same
/// way [`crate::channel::cellular::HttpModem`] rides the host IP stack
/// instead of the AT modem. Every frame field stays live, including the
/// battery voltage that gates the onboard log at boot.
pub struct BenchSensorSuite;

#[async_trait]
impl SensorSuite for BenchSensorSuite {
    async fn sample(&mut self) -> Result<SensorSample> {
        Ok(SensorSample {
            time_ms: millis_of_day(),
            battery_volts: 4.1,
            pressure_hpa: [1013.25, 1013.11, 1013.32],
            temperature_c: [21.4, 24.0, 21.2, 21.0],
            humidity_pct: 45.0,
            accel: [0.0, 0.0, 9.81],
            gyro: [0.0, 0.0, 0.0],
            mag: [22.0, 0.5, 42.3],
        })
    }
}

/// Supervised sampling loop feeding the frame
pub struct SensorSampler<S: SensorSuite> {
    suite: S,
    frame: Arc<TelemetryFrame>,
}

impl<S: SensorSuite> SensorSampler<S> {
    pub fn new(suite: S, frame: Arc<TelemetryFrame>) -> Self {
        Self { suite, frame }
    }

    fn apply(&self, sample: &SensorSample) {
        let frame = &self.frame;
        frame.set(FieldId::Time, sample.time_ms);
        frame.set(FieldId::BatteryVolts, sample.battery_volts);
        frame.set(FieldId::PressBmp, sample.pressure_hpa[0]);
        frame.set(FieldId::PressBme, sample.pressure_hpa[1]);
        frame.set(FieldId::PressMs5611, sample.pressure_hpa[2]);
        frame.set(FieldId::TempBmp, sample.temperature_c[0]);
        frame.set(FieldId::TempImu, sample.temperature_c[1]);
        frame.set(FieldId::TempBme, sample.temperature_c[2]);
        frame.set(FieldId::TempMs5611, sample.temperature_c[3]);
        frame.set(FieldId::Humidity, sample.humidity_pct);
        frame.set(FieldId::AccelX, sample.accel[0]);
        frame.set(FieldId::AccelY, sample.accel[1]);
        frame.set(FieldId::AccelZ, sample.accel[2]);
        frame.set(FieldId::GyroX, sample.gyro[0]);
        frame.set(FieldId::GyroY, sample.gyro[1]);
        frame.set(FieldId::GyroZ, sample.gyro[2]);
        // Dropped by the frame when the minimal variant is active
        frame.set(FieldId::MagX, sample.mag[0]);
        frame.set(FieldId::MagY, sample.mag[1]);
        frame.set(FieldId::MagZ, sample.mag[2]);
    }

    /// Sampling loop: read, write into the frame, sleep, forever.
    ///
    /// Never stops sampling: any read failure is logged and the loop
    /// continues at the backoff cadence.
    pub async fn run(mut self, sample_interval: Duration, backoff: Duration) {
        info!("starting sensor loop");
        loop {
            match self.suite.sample().await {
                Ok(sample) => {
                    self.apply(&sample);
                    sleep(sample_interval).await;
                }
                Err(e) => {
                    warn!("sensor read failed: {}", e);
                    sleep(backoff).await;
                }
            }
        }
    }
}
