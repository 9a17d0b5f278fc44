//! # Position Producer
//!
//! Feeds the GNSS sentence stream character-by-character into an external
//! parser collaborator and writes completed fixes into the frame.
//!
//! The parser itself is not this crate's business: [`NmeaFixParser`]
//! adapts the `nmea` crate, and flight builds can swap in whatever the
//! receiver speaks. The producer only moves characters in and fix fields
//! out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};
use crate::frame::TelemetryFrame;
use crate::packet::registry::FieldId;

/// One complete position solution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    /// Decimal degrees, south negative
    pub latitude: f64,
    /// Decimal degrees, west negative
    pub longitude: f64,
    pub satellites: u32,
    pub hdop: f64,
    /// Meters above mean sea level
    pub altitude: f64,
}

/// Source of raw positioning sentences (one line per call, `None` when
/// nothing is pending)
#[async_trait]
pub trait SentenceFeed: Send {
    async fn read_sentence(&mut self) -> Result<Option<String>>;
}

/// External sentence parser collaborator, fed one character at a time
pub trait FixParser: Send {
    /// Push the next character of the stream
    fn feed(&mut self, c: char);

    /// Latest complete solution, if the parser has seen one
    fn fix(&self) -> Option<PositionFix>;
}

/// `nmea` crate adapter: buffers a line, hands completed sentences to the
/// parser, and exposes the accumulated solution
pub struct NmeaFixParser {
    inner: nmea::Nmea,
    line: String,
}

impl NmeaFixParser {
    pub fn new() -> Self {
        Self {
            inner: nmea::Nmea::default(),
            line: String::new(),
        }
    }
}

impl Default for NmeaFixParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FixParser for NmeaFixParser {
    fn feed(&mut self, c: char) {
        if c != '\n' {
            if c != '\r' {
                self.line.push(c);
            }
            return;
        }
        let sentence = std::mem::take(&mut self.line);
        let sentence = sentence.trim();
        if sentence.is_empty() {
            return;
        }
        // Unknown or corrupt sentences are routine on a live feed
        if let Err(e) = self.inner.parse(sentence) {
            debug!("unparsed sentence: {:?}", e);
        }
    }

    fn fix(&self) -> Option<PositionFix> {
        Some(PositionFix {
            latitude: self.inner.latitude?,
            longitude: self.inner.longitude?,
            satellites: self.inner.num_of_fix_satellites.unwrap_or(0),
            hdop: self.inner.hdop.unwrap_or(0.0) as f64,
            altitude: self.inner.altitude.unwrap_or(0.0) as f64,
        })
    }
}

/// Sentence feed over a tokio-serial GNSS receiver
pub struct SerialSentenceFeed {
    device: String,
    baud_rate: u32,
    reader: Option<BufReader<tokio_serial::SerialStream>>,
}

impl SerialSentenceFeed {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            reader: None,
        }
    }

    fn open(&mut self) -> Result<()> {
        let port = tokio_serial::new(&self.device, self.baud_rate)
            .open_native_async()
            .map_err(|e| {
                TelemetryError::Transport(format!("failed to open {}: {}", self.device, e))
            })?;
        info!("gnss serial port open at {}", self.device);
        self.reader = Some(BufReader::new(port));
        Ok(())
    }
}

#[async_trait]
impl SentenceFeed for SerialSentenceFeed {
    async fn read_sentence(&mut self) -> Result<Option<String>> {
        if self.reader.is_none() {
            self.open()?;
        }
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| TelemetryError::Transport("gnss port not open".to_string()))?;

        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line)),
            Err(e) => {
                // Force a reopen on the next call
                self.reader = None;
                Err(TelemetryError::Transport(format!("gnss read failed: {}", e)))
            }
        }
    }
}

/// Supervised loop moving sentences from the feed into the frame
pub struct PositionProducer<F: SentenceFeed, P: FixParser> {
    feed: F,
    parser: P,
    frame: Arc<TelemetryFrame>,
}

impl<F: SentenceFeed, P: FixParser> PositionProducer<F, P> {
    pub fn new(feed: F, parser: P, frame: Arc<TelemetryFrame>) -> Self {
        Self { feed, parser, frame }
    }

    /// One iteration: pull a sentence, feed the parser, publish any fix.
    ///
    /// Returns whether a fix was written into the frame.
    pub async fn poll(&mut self) -> Result<bool> {
        let Some(sentence) = self.feed.read_sentence().await? else {
            return Ok(false);
        };

        for c in sentence.chars() {
            self.parser.feed(c);
        }
        if !sentence.ends_with('\n') {
            self.parser.feed('\n');
        }

        let Some(fix) = self.parser.fix() else {
            return Ok(false);
        };

        let frame = &self.frame;
        frame.set(FieldId::Latitude, fix.latitude);
        frame.set(FieldId::Longitude, fix.longitude);
        frame.set(FieldId::GpsSats, fix.satellites as f64);
        frame.set(FieldId::GpsHdop, fix.hdop);
        frame.set(FieldId::GpsAltitude, fix.altitude);
        Ok(true)
    }

    /// Polling loop: failures are logged and the loop continues
    pub async fn run(mut self, poll_interval: std::time::Duration, backoff: std::time::Duration) {
        info!("starting position loop");
        loop {
            match self.poll().await {
                Ok(_) => tokio::time::sleep(poll_interval).await,
                Err(e) => {
                    warn!("position update failed: {}", e);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::registry::FrameVariant;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // Reference sentence: 53°21.6802'N 006°30.3372'W, 8 sats, hdop 1.03,
    // altitude 61.7 m
    const GGA: &str =
        "$GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,*76\r\n";

    struct ScriptedFeed {
        sentences: Arc<Mutex<VecDeque<Option<String>>>>,
    }

    impl ScriptedFeed {
        fn new(sentences: Vec<Option<&str>>) -> Self {
            Self {
                sentences: Arc::new(Mutex::new(
                    sentences
                        .into_iter()
                        .map(|s| s.map(str::to_string))
                        .collect(),
                )),
            }
        }
    }

    #[async_trait]
    impl SentenceFeed for ScriptedFeed {
        async fn read_sentence(&mut self) -> Result<Option<String>> {
            Ok(self.sentences.lock().unwrap().pop_front().flatten())
        }
    }

    fn test_frame() -> Arc<TelemetryFrame> {
        Arc::new(TelemetryFrame::new(FrameVariant::Minimal.registry()))
    }

    #[tokio::test]
    async fn test_complete_sentence_publishes_fix() {
        let frame = test_frame();
        let mut producer = PositionProducer::new(
            ScriptedFeed::new(vec![Some(GGA)]),
            NmeaFixParser::new(),
            Arc::clone(&frame),
        );

        assert!(producer.poll().await.unwrap());

        let lat = frame.get(FieldId::Latitude).unwrap();
        let lon = frame.get(FieldId::Longitude).unwrap();
        assert!((lat - 53.361336).abs() < 1e-4, "latitude {}", lat);
        assert!((lon + 6.505620).abs() < 1e-4, "longitude {}", lon);
        assert_eq!(frame.get(FieldId::GpsSats), Some(8.0));
        assert!((frame.get(FieldId::GpsHdop).unwrap() - 1.03).abs() < 1e-6);
        assert!((frame.get(FieldId::GpsAltitude).unwrap() - 61.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_feed_publishes_nothing() {
        let frame = test_frame();
        let mut producer = PositionProducer::new(
            ScriptedFeed::new(vec![None]),
            NmeaFixParser::new(),
            Arc::clone(&frame),
        );

        assert!(!producer.poll().await.unwrap());
        assert_eq!(frame.get(FieldId::Latitude), Some(0.0));
    }

    #[tokio::test]
    async fn test_garbage_sentence_does_not_clear_previous_fix() {
        let frame = test_frame();
        let mut producer = PositionProducer::new(
            ScriptedFeed::new(vec![Some(GGA), Some("$GPGGA,garbage*00\r\n")]),
            NmeaFixParser::new(),
            Arc::clone(&frame),
        );

        assert!(producer.poll().await.unwrap());
        let lat_before = frame.get(FieldId::Latitude).unwrap();

        // Corrupt line: parser keeps the previous solution
        producer.poll().await.unwrap();
        assert_eq!(frame.get(FieldId::Latitude), Some(lat_before));
    }

    #[test]
    fn test_parser_accumulates_characters() {
        let mut parser = NmeaFixParser::new();
        assert!(parser.fix().is_none());

        for c in GGA.chars() {
            parser.feed(c);
        }

        let fix = parser.fix().expect("fix after complete sentence");
        assert_eq!(fix.satellites, 8);
        assert!((fix.altitude - 61.7).abs() < 1e-6);
    }

    #[test]
    fn test_parser_has_no_fix_before_sentence_ends() {
        let mut parser = NmeaFixParser::new();
        // Everything except the terminating newline
        for c in GGA.trim_end().chars() {
            parser.feed(c);
        }
        assert!(parser.fix().is_none());
    }
}
