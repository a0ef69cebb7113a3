//! In-game duration measured in whole seconds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// A non-negative span of in-game time, in seconds.
///
/// Task time costs and event intervals are whole seconds in the game
/// model; sub-second precision has no meaning at the table. The
/// constructor clamps negative values to zero so a time cost can
/// never rewind the session clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationSecs(i64);

impl DurationSecs {
    /// Zero seconds.
    pub const ZERO: DurationSecs = DurationSecs(0);

    /// Create from whole seconds. Negative input clamps to zero.
    pub fn from_secs(secs: i64) -> Self {
        Self(secs.max(0))
    }

    /// Create from whole minutes. Negative input clamps to zero.
    pub fn from_mins(mins: i64) -> Self {
        Self::from_secs(mins.saturating_mul(60))
    }

    /// Create from whole hours. Negative input clamps to zero.
    pub fn from_hours(hours: i64) -> Self {
        Self::from_secs(hours.saturating_mul(3600))
    }

    /// The span in whole seconds.
    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Convert to a chrono delta for clock arithmetic.
    pub fn to_delta(self) -> chrono::TimeDelta {
        chrono::TimeDelta::seconds(self.0)
    }

    /// Whether this span is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for DurationSecs {
    type Output = DurationSecs;

    fn add(self, rhs: DurationSecs) -> DurationSecs {
        DurationSecs(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for DurationSecs {
    fn add_assign(&mut self, rhs: DurationSecs) {
        *self = *self + rhs;
    }
}

impl fmt::Display for DurationSecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
