//! # Telemetry Packet Module
//!
//! Fixed-point binary wire format for telemetry frames.
//!
//! This module handles:
//! - The static field registry (wire order, widths, signedness, multipliers)
//! - All-or-nothing encoding with per-field overflow detection
//! - Base64 text wrapping for transports that require text safety
//! - Decoding back to physical values (exact inverse up to multiplier rounding)

pub mod registry;
pub mod encoder;
pub mod decoder;
