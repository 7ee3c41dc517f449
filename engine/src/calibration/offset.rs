//! Cursor offset validation.

use tracing::{debug, warn};

const MAX_SAFE_OFFSET_PX: f32 = 100.0;
const EXTREME_OFFSET_PX: f32 = 200.0;
const SCREEN_RATIO_LIMIT: f32 = 0.1;
const MAX_SAFE_CHANGE_PX: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OffsetLevel {
    Safe,
    Warning,
    Dangerous,
    Extreme,
}

impl OffsetLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Warning => "warning",
            Self::Dangerous => "dangerous",
            Self::Extreme => "extreme",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetValidation {
    /// Whether the requested offset may be used unchanged.
    pub valid: bool,
    pub level: OffsetLevel,
    /// Offset to apply instead.
    pub recommended: (f32, f32),
    pub message: Option<&'static str>,
}

/// Check a cursor offset against absolute and screen-relative limits.
pub fn validate_offset(ox: f32, oy: f32, width: f32, height: f32) -> OffsetValidation {
    let magnitude = ox.hypot(oy);

    if ox.abs() > EXTREME_OFFSET_PX || oy.abs() > EXTREME_OFFSET_PX {
        let rec = (
            signum0(ox) * MAX_SAFE_OFFSET_PX,
            signum0(oy) * MAX_SAFE_OFFSET_PX,
        );
        warn!("offset ({:.0}, {:.0}) extreme, limited to {:?}", ox, oy, rec);
        return OffsetValidation {
            valid: false,
            level: OffsetLevel::Extreme,
            recommended: rec,
            message: Some("Offset is very large. Try calibrating again."),
        };
    }

    let screen_limit = width.min(height) * SCREEN_RATIO_LIMIT;
    if magnitude > screen_limit {
        let k = screen_limit / magnitude;
        warn!("offset {:.0} px over screen limit {:.0} px, scaled", magnitude, screen_limit);
        return OffsetValidation {
            valid: false,
            level: OffsetLevel::Dangerous,
            recommended: (ox * k, oy * k),
            message: Some("Offset is large for this screen and was reduced."),
        };
    }

    if magnitude > MAX_SAFE_OFFSET_PX * 0.7 {
        debug!("offset {:.0} px in warning range", magnitude);
        return OffsetValidation {
            valid: true,
            level: OffsetLevel::Warning,
            recommended: (ox, oy),
            message: Some("Offset is fairly large. Recalibrating may help."),
        };
    }

    OffsetValidation {
        valid: true,
        level: OffsetLevel::Safe,
        recommended: (ox, oy),
        message: None,
    }
}

fn signum0(v: f32) -> f32 {
    if v == 0.0 {
        0.0
    } else {
        v.signum()
    }
}

/// Whether moving from one offset to another is a safe single step.
pub fn is_offset_change_safe(from: (f32, f32), to: (f32, f32)) -> bool {
    (to.0 - from.0).hypot(to.1 - from.1) <= MAX_SAFE_CHANGE_PX
}

/// Offset quality out of 100.
pub fn offset_quality_score(ox: f32, oy: f32, width: f32, height: f32) -> u32 {
    let magnitude = ox.hypot(oy);
    let mut score: i32 = 100;

    score -= if magnitude > MAX_SAFE_OFFSET_PX {
        40
    } else if magnitude > MAX_SAFE_OFFSET_PX * 0.7 {
        20
    } else if magnitude > MAX_SAFE_OFFSET_PX * 0.5 {
        10
    } else {
        0
    };

    let ratio = magnitude / width.min(height);
    score -= if ratio > 0.1 {
        30
    } else if ratio > 0.05 {
        15
    } else {
        0
    };

    let asymmetry = (ox.abs() - oy.abs()).abs();
    score -= if asymmetry > 30.0 {
        15
    } else if asymmetry > 15.0 {
        5
    } else {
        0
    };

    score.clamp(0, 100) as u32
}
