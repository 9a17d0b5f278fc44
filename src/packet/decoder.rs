//! # Packet Decoder
//!
//! Decodes a base64 text packet back into physical field values.
//!
//! The decoder iterates the same registry table as the encoder, so the two
//! sides can never disagree about field order or widths. Decoding is the
//! exact left inverse of encoding up to multiplier rounding:
//! `decode(encode(f))[k] == round(f[k] * m_k) / m_k`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Buf;

use crate::error::{Result, TelemetryError};
use crate::packet::registry::{FieldId, FieldKind, Registry};

/// Decoded field values in wire order, with by-id access.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    registry: Registry,
    values: Vec<f64>,
}

impl DecodedFrame {
    /// Value of a field, if the registry variant carries it
    pub fn get(&self, id: FieldId) -> Option<f64> {
        self.registry.index_of(id).map(|i| self.values[i])
    }

    /// All values in wire order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate `(name, value)` pairs in wire order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.registry
            .fields()
            .iter()
            .zip(&self.values)
            .map(|(descriptor, &value)| (descriptor.name, value))
    }
}

/// Decode a base64 text packet produced by [`crate::packet::encoder`].
///
/// # Errors
///
/// Returns [`TelemetryError::Decode`] when the text is not valid base64 or
/// the decoded buffer does not match the registry's wire size.
pub fn decode(registry: Registry, text: &str) -> Result<DecodedFrame> {
    let raw = BASE64
        .decode(text.trim())
        .map_err(|e| TelemetryError::Decode(format!("invalid base64: {}", e)))?;

    decode_raw(registry, &raw)
}

/// Decode the fixed-size binary buffer directly
pub fn decode_raw(registry: Registry, raw: &[u8]) -> Result<DecodedFrame> {
    if raw.len() != registry.wire_size() {
        return Err(TelemetryError::Decode(format!(
            "packet is {} bytes, registry expects {}",
            raw.len(),
            registry.wire_size()
        )));
    }

    let mut buf = raw;
    let mut values = Vec::with_capacity(registry.len());
    for descriptor in registry.fields() {
        let scaled = match descriptor.kind {
            FieldKind::I8 => buf.get_i8() as i64,
            FieldKind::I16 => buf.get_i16() as i64,
            FieldKind::I32 => buf.get_i32() as i64,
            FieldKind::U8 => buf.get_u8() as i64,
            FieldKind::U16 => buf.get_u16() as i64,
            FieldKind::U32 => buf.get_u32() as i64,
        };
        values.push(scaled as f64 / descriptor.multiplier);
    }

    Ok(DecodedFrame { registry, values })
}
