//! # Producer Module
//!
//! Update loops writing sensor readings into the shared telemetry frame.
//!
//! Producers are independent of the channels and of each other: each runs
//! in its own supervised loop, logs read failures and continues, leaving
//! the last good value in the frame.

pub mod sensors;
pub mod position;
