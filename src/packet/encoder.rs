//! # Packet Encoder
//!
//! Encodes a frame snapshot into the fixed-layout big-endian wire buffer
//! and wraps it in base64 for transports that carry text.
//!
//! Encoding is all-or-nothing: every field is scaled and range-checked
//! before a single byte is emitted, so an overflow can never produce a
//! truncated packet on the wire.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::BufMut;

use crate::error::{Result, TelemetryError};
use crate::frame::TelemetryFrame;
use crate::packet::registry::{FieldDescriptor, FieldKind, Registry};

/// Encode the current frame contents as a base64 text packet.
///
/// Takes a lock-free snapshot of the frame; concurrent producer writes may
/// interleave (see [`crate::frame`] for the consistency model).
///
/// # Errors
///
/// Returns [`TelemetryError::EncodeOverflow`] when any field's scaled value
/// does not fit its wire type. No output is produced in that case.
pub fn encode(frame: &TelemetryFrame) -> Result<String> {
    encode_values(frame.registry(), &frame.snapshot())
}

/// Encode a plain snapshot slice (wire order) as a base64 text packet
pub fn encode_values(registry: Registry, values: &[f64]) -> Result<String> {
    Ok(BASE64.encode(encode_raw(registry, values)?))
}

/// Encode a snapshot into the fixed-size binary buffer.
///
/// # Arguments
///
/// * `registry` - Field table owning the wire order
/// * `values` - One physical value per field, in registry order
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Buffer of exactly `registry.wire_size()` bytes
pub fn encode_raw(registry: Registry, values: &[f64]) -> Result<Vec<u8>> {
    debug_assert_eq!(values.len(), registry.len());

    // First pass: scale and range-check everything up front, so a failure
    // in a late field cannot leave a partial buffer behind
    let mut scaled = Vec::with_capacity(registry.len());
    for (descriptor, &value) in registry.fields().iter().zip(values) {
        scaled.push(scale_field(descriptor, value)?);
    }

    // Second pass: fixed-width big-endian writes in wire order
    let mut buffer = Vec::with_capacity(registry.wire_size());
    for (descriptor, &raw) in registry.fields().iter().zip(&scaled) {
        match descriptor.kind {
            FieldKind::I8 => buffer.put_i8(raw as i8),
            FieldKind::I16 => buffer.put_i16(raw as i16),
            FieldKind::I32 => buffer.put_i32(raw as i32),
            FieldKind::U8 => buffer.put_u8(raw as u8),
            FieldKind::U16 => buffer.put_u16(raw as u16),
            FieldKind::U32 => buffer.put_u32(raw as u32),
        }
    }

    Ok(buffer)
}

/// Convert one physical value to its fixed-point wire integer
fn scale_field(descriptor: &FieldDescriptor, value: f64) -> Result<i64> {
    let rounded = (value * descriptor.multiplier).round();
    let min = descriptor.kind.min();
    let max = descriptor.kind.max();

    if !rounded.is_finite() || rounded < min as f64 || rounded > max as f64 {
        return Err(TelemetryError::EncodeOverflow {
            field: descriptor.name,
            value,
            multiplier: descriptor.multiplier,
            // f64 -> i64 saturates, which keeps the reported value sane
            // even for non-finite inputs
            scaled: rounded as i64,
            min,
            max,
        });
    }

    Ok(rounded as i64)
}
