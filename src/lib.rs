#![forbid(unsafe_code)]

//! Device-side endpoint of the OPI perimetry protocol.
//!
//! A test-logic host connects over TCP, configures the background and
//! fixation target, and presents timed multi-step stimuli; the device
//! reports whether and when the patient responded.

pub mod config;
pub mod display;
pub mod engine;
pub mod errors;
pub mod models;
pub mod net;
pub mod protocol;
pub mod trigger;

pub use config::ServerConfig;
pub use errors::{AppError, Result};
