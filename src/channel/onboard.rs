//! # Onboard Durable Log Channel
//!
//! Appends every encoded packet to a local file, one packet per line, so
//! flight data survives the loss of both wireless links as long as the
//! airframe is physically recovered.
//!
//! The file is truncated at boot only when battery voltage shows a
//! deliberate, stable power-up. A boot without that evidence is assumed to
//! be a brownout or in-flight reset, and the preceding flight data is kept.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::Result;

/// Append-only log of encoded packets on local storage
pub struct OnboardLogChannel {
    path: PathBuf,
}

impl OnboardLogChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Boot-time truncation decision.
    ///
    /// Clears the log only when `battery_volts` is above `threshold_v`,
    /// the evidence of a deliberate stable power-up. Returns whether the
    /// log was cleared.
    pub async fn clear_if_stable(&self, battery_volts: f64, threshold_v: f64) -> Result<bool> {
        if battery_volts < threshold_v {
            warn!(
                "battery at {:.2}V (below {:.2}V), preserving onboard log",
                battery_volts, threshold_v
            );
            return Ok(false);
        }

        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await?;
        info!("onboard log cleared for new flight");
        Ok(true)
    }

    /// Append one packet line to the log
    async fn append(&self, packet: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(packet.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        debug!("onboard log appended {} bytes", packet.len() + 1);
        Ok(())
    }
}

#[async_trait]
impl Channel for OnboardLogChannel {
    fn name(&self) -> &'static str {
        "onboard"
    }

    /// Storage faults are logged and the cycle skipped; there is no
    /// session to rebuild
    async fn send(&mut self, packet: &str) -> Result<()> {
        self.append(packet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_in(dir: &tempfile::TempDir) -> OnboardLogChannel {
        OnboardLogChannel::new(dir.path().join("onboard.log"))
    }

    #[tokio::test]
    async fn test_append_one_packet_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut channel = log_in(&dir);

        channel.send("AAECAw==").await.unwrap();
        channel.send("BAUGBw==").await.unwrap();

        let contents = std::fs::read_to_string(channel.path()).unwrap();
        assert_eq!(contents, "AAECAw==\nBAUGBw==\n");
    }

    #[tokio::test]
    async fn test_low_battery_boot_preserves_log() {
        let dir = tempfile::tempdir().unwrap();
        let channel = log_in(&dir);
        std::fs::write(channel.path(), "flight-data\n").unwrap();

        // Below threshold: looks like an in-flight reset or bench power
        let cleared = channel.clear_if_stable(2.1, 3.0).await.unwrap();
        assert!(!cleared);
        let contents = std::fs::read_to_string(channel.path()).unwrap();
        assert_eq!(contents, "flight-data\n");
    }

    #[tokio::test]
    async fn test_healthy_battery_boot_truncates_log() {
        let dir = tempfile::tempdir().unwrap();
        let channel = log_in(&dir);
        std::fs::write(channel.path(), "previous-flight\n").unwrap();

        let cleared = channel.clear_if_stable(4.1, 3.0).await.unwrap();
        assert!(cleared);
        let contents = std::fs::read_to_string(channel.path()).unwrap();
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn test_clear_with_no_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let channel = log_in(&dir);
        assert!(channel.clear_if_stable(4.1, 3.0).await.unwrap());
        assert!(channel.path().exists());
    }

    #[tokio::test]
    async fn test_appends_survive_preserved_boot() {
        let dir = tempfile::tempdir().unwrap();
        let mut channel = log_in(&dir);

        channel.send("flight1").await.unwrap();
        channel.clear_if_stable(0.0, 3.0).await.unwrap();
        channel.send("flight1-continued").await.unwrap();

        let contents = std::fs::read_to_string(channel.path()).unwrap();
        assert_eq!(contents, "flight1\nflight1-continued\n");
    }

    #[tokio::test]
    async fn test_append_failure_is_an_error_not_a_panic() {
        let mut channel = OnboardLogChannel::new("/nonexistent-dir/onboard.log");
        assert!(channel.send("data").await.is_err());
    }
}
