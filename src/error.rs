//! # Error Types
//!
//! Custom error types for Stratolink using `thiserror`.

use thiserror::Error;

/// Main error type for Stratolink
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A field's scaled value does not fit its wire type.
    ///
    /// Raised before any bytes are produced, so a failed encode never
    /// yields a partial packet.
    #[error(
        "encode overflow in field '{field}': {value} * {multiplier} = {scaled}, \
         allowed range {min}..={max}"
    )]
    EncodeOverflow {
        field: &'static str,
        value: f64,
        multiplier: f64,
        scaled: i64,
        min: i64,
        max: i64,
    },

    /// Packet decoding errors (bad base64, wrong length)
    #[error("decode error: {0}")]
    Decode(String),

    /// Link write, socket or modem call failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Sensor collaborator read failed
    #[error("sensor error: {0}")]
    Sensor(String),

    /// Cellular HTTP errors
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Stratolink
pub type Result<T> = std::result::Result<T, TelemetryError>;
