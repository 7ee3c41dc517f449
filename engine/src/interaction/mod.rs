//! Gesture detectors fed by the stabilized gaze point.

pub mod dwell_click;
pub mod edge;
pub mod swipe;

pub use dwell_click::{ClickConfig, ClickStep, ClickTiming, DwellClickDetector};
pub use edge::{classify, EdgeConfig, EdgeStep, EdgeTriggerEngine, Zone, ZoneState};
pub use swipe::{
    SwipeConfig, SwipeDirection, SwipeFailure, SwipeGestureEngine, SwipeState, SwipeStep,
};
