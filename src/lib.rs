//! # Stratolink Library
//!
//! Telemetry firmware for an airborne probe (balloon or rocket payload).
//!
//! This library provides the telemetry data model, its fixed-point binary
//! codec, and the multi-channel resilient transmission pipeline: sensor
//! producers write into a shared [`frame::TelemetryFrame`], and independent
//! channel loops (radio, cellular, onboard log) repeatedly serialize and
//! emit snapshots of it.

pub mod config;
pub mod error;
pub mod packet;
pub mod frame;
pub mod channel;
pub mod producer;
