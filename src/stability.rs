use crate::models::EventKind;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_STABILITY: u8 = 100;
pub const MIN_STABILITY: u8 = 0;
pub const NEGATIVE_STEP: u8 = 8;
pub const POSITIVE_STEP: u8 = 4;

/// Bounded [0, 100] score moved by each logged event.
///
/// Deserialization clamps out-of-range persisted values instead of failing,
/// so a hand-edited or legacy snapshot still loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct StabilityScore(u8);

impl StabilityScore {
    pub const FULL: Self = Self(MAX_STABILITY);

    pub fn new(value: i64) -> Self {
        Self(value.clamp(i64::from(MIN_STABILITY), i64::from(MAX_STABILITY)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Returns the score after one event of `kind`, clamped at both ends.
    pub fn apply(self, kind: EventKind) -> Self {
        match kind {
            EventKind::Negative => Self(self.0.saturating_sub(NEGATIVE_STEP)),
            EventKind::Positive => Self(self.0.saturating_add(POSITIVE_STEP).min(MAX_STABILITY)),
        }
    }
}

impl Default for StabilityScore {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<i64> for StabilityScore {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<StabilityScore> for u8 {
    fn from(value: StabilityScore) -> Self {
        value.0
    }
}

impl fmt::Display for StabilityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
