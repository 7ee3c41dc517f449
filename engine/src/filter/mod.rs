//! Gaze signal smoothing.

pub mod one_euro;
pub mod signal;

pub use one_euro::{OneEuroFilter, OneEuroFilter2D, OneEuroParams};
pub use signal::{FilterConfig, FilterPreset, FilterProfile, SignalFilter};
