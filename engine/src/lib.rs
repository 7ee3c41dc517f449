//! Gaze engine library: smoothing and hands-free gestures over a raw
//! eye-tracking stream, with bounded calibration drift correction.
//!
//! This library crate exposes the engine's modules for integration
//! testing. The trace-replay binary lives in `main.rs`.

pub mod calibration;
pub mod clock;
pub mod config;
pub mod effects;
pub mod error;
pub mod filter;
pub mod input_source;
pub mod interaction;
pub mod pipeline;
pub mod sample;
pub mod scheduler;
