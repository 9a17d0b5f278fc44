//! # Telemetry Frame
//!
//! The single shared record holding the latest known value of every
//! telemetry field, written concurrently by producers and read by every
//! channel loop.
//!
//! The frame is a weakly-consistent shared register: one atomic 64-bit cell
//! per field (the f64 bit pattern), no lock around the record as a whole.
//! A write to one field can never corrupt another, but a snapshot may
//! combine values written at different instants. That torn-snapshot
//! behavior is accepted: telemetry is periodic best-effort data, and a
//! single mutex here would serialize every producer and consumer loop.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::packet::registry::{FieldId, Registry};

/// Shared telemetry record, one slot per registry field.
///
/// Cheap to share via `Arc`; all access goes through `&self`.
pub struct TelemetryFrame {
    registry: Registry,
    cells: Vec<AtomicU64>,
}

impl TelemetryFrame {
    /// Create a frame for the given registry with every field at zero
    pub fn new(registry: Registry) -> Self {
        let cells = (0..registry.len())
            .map(|_| AtomicU64::new(0.0f64.to_bits()))
            .collect();
        Self { registry, cells }
    }

    /// Registry this frame was built for
    pub fn registry(&self) -> Registry {
        self.registry
    }

    /// Store the current physical value of a field.
    ///
    /// Writes to fields absent from the active registry variant are
    /// silently dropped, so producers can always report everything they
    /// measure without knowing which variant is deployed.
    pub fn set(&self, id: FieldId, value: f64) {
        if let Some(index) = self.registry.index_of(id) {
            self.cells[index].store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Latest stored value of a field, if the variant carries it
    pub fn get(&self, id: FieldId) -> Option<f64> {
        let index = self.registry.index_of(id)?;
        Some(f64::from_bits(self.cells[index].load(Ordering::Relaxed)))
    }

    /// Read every field in wire order.
    ///
    /// Individual values are never torn, but the snapshot as a whole may
    /// mix sampling instants (see module docs).
    pub fn snapshot(&self) -> Vec<f64> {
        self.cells
            .iter()
            .map(|cell| f64::from_bits(cell.load(Ordering::Relaxed)))
            .collect()
    }
}

impl std::fmt::Debug for TelemetryFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryFrame")
            .field("fields", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::registry::FrameVariant;
    use std::sync::Arc;

    #[test]
    fn test_frame_initialized_to_zero() {
        let frame = TelemetryFrame::new(FrameVariant::Minimal.registry());
        assert_eq!(frame.get(FieldId::BatteryVolts), Some(0.0));
        assert!(frame.snapshot().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_set_and_get() {
        let frame = TelemetryFrame::new(FrameVariant::Minimal.registry());
        frame.set(FieldId::BatteryVolts, 4.231);
        frame.set(FieldId::Latitude, 55.1234567);
        assert_eq!(frame.get(FieldId::BatteryVolts), Some(4.231));
        assert_eq!(frame.get(FieldId::Latitude), Some(55.1234567));
    }

    #[test]
    fn test_write_does_not_disturb_neighbors() {
        let frame = TelemetryFrame::new(FrameVariant::Minimal.registry());
        frame.set(FieldId::Latitude, 55.0);
        frame.set(FieldId::Longitude, 25.0);
        frame.set(FieldId::Latitude, -12.5);
        assert_eq!(frame.get(FieldId::Longitude), Some(25.0));
        assert_eq!(frame.get(FieldId::Latitude), Some(-12.5));
    }

    #[test]
    fn test_absent_field_write_is_dropped() {
        let frame = TelemetryFrame::new(FrameVariant::Minimal.registry());
        // Magnetometer only exists in the extended variant
        frame.set(FieldId::MagX, 12.0);
        assert_eq!(frame.get(FieldId::MagX), None);
    }

    #[test]
    fn test_snapshot_in_wire_order() {
        let registry = FrameVariant::Minimal.registry();
        let frame = TelemetryFrame::new(registry);
        frame.set(FieldId::GpsSats, 9.0);
        let snapshot = frame.snapshot();
        assert_eq!(snapshot.len(), registry.len());
        let index = registry.index_of(FieldId::GpsSats).unwrap();
        assert_eq!(snapshot[index], 9.0);
    }

    #[test]
    fn test_concurrent_writers() {
        let frame = Arc::new(TelemetryFrame::new(FrameVariant::Extended.registry()));
        let mut handles = Vec::new();
        for worker in 0..4 {
            let frame = Arc::clone(&frame);
            handles.push(std::thread::spawn(move || {
                for i in 0..1000 {
                    frame.set(FieldId::AccelX, worker as f64);
                    frame.set(FieldId::Time, i as f64);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        // The stored value must be one of the values actually written,
        // never a torn bit pattern
        let accel = frame.get(FieldId::AccelX).unwrap();
        assert!((0.0..4.0).contains(&accel));
    }
}
