//! # Field Registry
//!
//! Static description of every telemetry field: wire type, fixed-point
//! multiplier and position in the on-wire sequence.
//!
//! The registry is an immutable table fixed at startup. Wire position of a
//! field is its index in the table, and both the encoder and every decoder
//! iterate the same table, so field order can never drift between the two
//! sides. Two named variants exist for different deployment targets; their
//! wire layouts are bit-incompatible and are never merged.

use serde::Deserialize;

/// Identifier for every telemetry field the firmware knows.
///
/// A given registry variant carries a subset of these; writes to a field
/// absent from the active registry are silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    /// Milliseconds since start of day
    Time,
    /// Battery voltage in volts
    BatteryVolts,
    /// Latitude in decimal degrees
    Latitude,
    /// Longitude in decimal degrees
    Longitude,
    /// GNSS satellites in use
    GpsSats,
    /// Horizontal dilution of precision
    GpsHdop,
    /// GNSS altitude in meters
    GpsAltitude,
    /// Barometric pressure from the BMP sensor, hPa
    PressBmp,
    /// Barometric pressure from the BME sensor, hPa
    PressBme,
    /// Barometric pressure from the MS5611 sensor, hPa
    PressMs5611,
    /// Temperature at the BMP sensor, °C
    TempBmp,
    /// Temperature at the IMU die, °C
    TempImu,
    /// Temperature at the BME sensor, °C
    TempBme,
    /// Temperature at the MS5611 sensor, °C
    TempMs5611,
    /// Relative humidity, %
    Humidity,
    /// Acceleration, m/s²
    AccelX,
    AccelY,
    AccelZ,
    /// Angular rate, deg/s
    GyroX,
    GyroY,
    GyroZ,
    /// Cellular signal strength metric (modem-reported RSSI)
    CellSignal,
    /// Magnetic field, µT (extended variant only)
    MagX,
    MagY,
    MagZ,
    /// Attitude angles in degrees (extended variant only, reserved for the
    /// fusion filter output)
    Pitch,
    Roll,
    Yaw,
    /// CO₂ concentration, ppm (extended variant only)
    Co2,
    /// Total volatile organic compounds, ppb (extended variant only)
    Tvoc,
    /// Vertical speed, m/s (extended variant only)
    VerticalSpeed,
}

/// Wire type of a field: width and signedness of its fixed-point integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
}

impl FieldKind {
    /// Encoded size in bytes
    pub const fn size(self) -> usize {
        match self {
            FieldKind::I8 | FieldKind::U8 => 1,
            FieldKind::I16 | FieldKind::U16 => 2,
            FieldKind::I32 | FieldKind::U32 => 4,
        }
    }

    /// Smallest representable scaled value
    pub const fn min(self) -> i64 {
        match self {
            FieldKind::I8 => i8::MIN as i64,
            FieldKind::I16 => i16::MIN as i64,
            FieldKind::I32 => i32::MIN as i64,
            FieldKind::U8 | FieldKind::U16 | FieldKind::U32 => 0,
        }
    }

    /// Largest representable scaled value
    pub const fn max(self) -> i64 {
        match self {
            FieldKind::I8 => i8::MAX as i64,
            FieldKind::I16 => i16::MAX as i64,
            FieldKind::I32 => i32::MAX as i64,
            FieldKind::U8 => u8::MAX as i64,
            FieldKind::U16 => u16::MAX as i64,
            FieldKind::U32 => u32::MAX as i64,
        }
    }
}

/// Static metadata for one telemetry field.
///
/// `multiplier` is the positive fixed-point scale converting the physical
/// float into the wire integer: `raw = round(value * multiplier)`.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub name: &'static str,
    pub kind: FieldKind,
    pub multiplier: f64,
}

const fn field(id: FieldId, name: &'static str, kind: FieldKind, multiplier: f64) -> FieldDescriptor {
    FieldDescriptor { id, name, kind, multiplier }
}

use FieldId as F;
use FieldKind as K;

/// Minimal deployment variant: 22 fields, 56 bytes on the wire.
pub const MINIMAL_FIELDS: &[FieldDescriptor] = &[
    field(F::Time, "time", K::U32, 1.0),
    field(F::BatteryVolts, "bat_v", K::U16, 1000.0),
    field(F::Latitude, "lat", K::I32, 10_000_000.0),
    field(F::Longitude, "lon", K::I32, 10_000_000.0),
    field(F::GpsSats, "gps_sats", K::U8, 1.0),
    field(F::GpsHdop, "gps_hdop", K::U16, 100.0),
    field(F::GpsAltitude, "gps_alt", K::I32, 100.0),
    field(F::PressBmp, "baro_bmp", K::U32, 10_000.0),
    field(F::PressBme, "baro_bme", K::U32, 10_000.0),
    field(F::PressMs5611, "baro_ms5611", K::U32, 10_000.0),
    field(F::TempBmp, "temp_bmp", K::I16, 100.0),
    field(F::TempImu, "temp_imu", K::I16, 100.0),
    field(F::TempBme, "temp_bme", K::I16, 100.0),
    field(F::TempMs5611, "temp_ms5611", K::I16, 100.0),
    field(F::Humidity, "hum_bme", K::I16, 100.0),
    field(F::AccelX, "acc_x", K::I16, 100.0),
    field(F::AccelY, "acc_y", K::I16, 100.0),
    field(F::AccelZ, "acc_z", K::I16, 100.0),
    field(F::GyroX, "gyro_x", K::I16, 10.0),
    field(F::GyroY, "gyro_y", K::I16, 10.0),
    field(F::GyroZ, "gyro_z", K::I16, 10.0),
    field(F::CellSignal, "cell_signal", K::U8, 1.0),
];

/// Extended deployment variant: the minimal set plus magnetometer, attitude,
/// air-quality and vertical-speed fields. 31 fields, 74 bytes on the wire.
pub const EXTENDED_FIELDS: &[FieldDescriptor] = &[
    field(F::Time, "time", K::U32, 1.0),
    field(F::BatteryVolts, "bat_v", K::U16, 1000.0),
    field(F::Latitude, "lat", K::I32, 10_000_000.0),
    field(F::Longitude, "lon", K::I32, 10_000_000.0),
    field(F::GpsSats, "gps_sats", K::U8, 1.0),
    field(F::GpsHdop, "gps_hdop", K::U16, 100.0),
    field(F::GpsAltitude, "gps_alt", K::I32, 100.0),
    field(F::PressBmp, "baro_bmp", K::U32, 10_000.0),
    field(F::PressBme, "baro_bme", K::U32, 10_000.0),
    field(F::PressMs5611, "baro_ms5611", K::U32, 10_000.0),
    field(F::TempBmp, "temp_bmp", K::I16, 100.0),
    field(F::TempImu, "temp_imu", K::I16, 100.0),
    field(F::TempBme, "temp_bme", K::I16, 100.0),
    field(F::TempMs5611, "temp_ms5611", K::I16, 100.0),
    field(F::Humidity, "hum_bme", K::I16, 100.0),
    field(F::AccelX, "acc_x", K::I16, 100.0),
    field(F::AccelY, "acc_y", K::I16, 100.0),
    field(F::AccelZ, "acc_z", K::I16, 100.0),
    field(F::GyroX, "gyro_x", K::I16, 10.0),
    field(F::GyroY, "gyro_y", K::I16, 10.0),
    field(F::GyroZ, "gyro_z", K::I16, 10.0),
    field(F::CellSignal, "cell_signal", K::U8, 1.0),
    field(F::MagX, "mag_x", K::I16, 100.0),
    field(F::MagY, "mag_y", K::I16, 100.0),
    field(F::MagZ, "mag_z", K::I16, 100.0),
    field(F::Pitch, "pitch", K::I16, 100.0),
    field(F::Roll, "roll", K::I16, 100.0),
    field(F::Yaw, "yaw", K::I16, 100.0),
    field(F::Co2, "co2", K::U16, 1.0),
    field(F::Tvoc, "tvoc", K::U16, 1.0),
    field(F::VerticalSpeed, "vspeed", K::I16, 100.0),
];

/// Named registry variant selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameVariant {
    Minimal,
    Extended,
}

impl FrameVariant {
    /// Registry for this variant
    pub fn registry(self) -> Registry {
        match self {
            FrameVariant::Minimal => Registry::new(MINIMAL_FIELDS),
            FrameVariant::Extended => Registry::new(EXTENDED_FIELDS),
        }
    }
}

/// An ordered, immutable table of field descriptors.
///
/// The registry owns the canonical wire order: a field's position in the
/// encoded buffer is derived from its index here and nowhere else.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    fields: &'static [FieldDescriptor],
}

impl Registry {
    /// Create a registry over a static descriptor table
    pub const fn new(fields: &'static [FieldDescriptor]) -> Self {
        Self { fields }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the registry has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Descriptor table in wire order
    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    /// Total encoded size in bytes
    pub fn wire_size(&self) -> usize {
        self.fields.iter().map(|f| f.kind.size()).sum()
    }

    /// Wire index of a field, if present in this variant
    pub fn index_of(&self, id: FieldId) -> Option<usize> {
        self.fields.iter().position(|f| f.id == id)
    }

    /// Byte offset of a field within the encoded buffer
    pub fn offset_of(&self, id: FieldId) -> Option<usize> {
        let index = self.index_of(id)?;
        Some(self.fields[..index].iter().map(|f| f.kind.size()).sum())
    }

    /// Descriptor for a field, if present in this variant
    pub fn descriptor(&self, id: FieldId) -> Option<&'static FieldDescriptor> {
        self.index_of(id).map(|i| &self.fields[i])
    }

    /// True when this variant carries the field
    pub fn contains(&self, id: FieldId) -> bool {
        self.index_of(id).is_some()
    }
}
