use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settle time after the focus target moves, before the next pair appears
pub const FOCUS_SETTLE: Duration = Duration::from_secs(1);

/// Vertical range a perturbation may move the focus target to
pub const PERTURBATION_RANGE: std::ops::Range<f64> = -0.5..0.5;

/// Bounds for the random-interval countdown
pub const RANDOM_INTERVAL_SETS: std::ops::RangeInclusive<i64> = 1..=10;

/// How the focus target moves over a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "camelCase")]
pub enum FocusChangeMode {
    #[default]
    Static,
    FixedInterval,
    RandomInterval,
}

impl FocusChangeMode {
    /// Legacy numeric codes used by older settings files
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FocusChangeMode::Static),
            1 => Some(FocusChangeMode::FixedInterval),
            2 => Some(FocusChangeMode::RandomInterval),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "camelCase")]
pub enum FocusShape {
    #[default]
    Circle,
    Cross,
}

impl FocusShape {
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            FocusShape::Circle
        } else {
            FocusShape::Cross
        }
    }
}

/// Initial appearance of the fixation target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusTarget {
    pub shape: FocusShape,
    pub offset: f64,
    pub scale: f64,
}

impl Default for FocusTarget {
    fn default() -> Self {
        Self {
            shape: FocusShape::Circle,
            offset: 0.0,
            scale: 0.1,
        }
    }
}

/// Trial countdown deciding when the focus target is perturbed
#[derive(Debug, Clone)]
pub struct FocusScheduler {
    mode: FocusChangeMode,
    interval_sets: i64,
    sets_until_change: i64,
}

impl FocusScheduler {
    pub fn new<R: Rng + ?Sized>(mode: FocusChangeMode, interval_sets: u32, rng: &mut R) -> Self {
        let mut scheduler = Self {
            mode,
            interval_sets: i64::from(interval_sets.max(1)),
            sets_until_change: 0,
        };
        scheduler.reset(rng);
        scheduler
    }

    pub fn sets_until_change(&self) -> i64 {
        self.sets_until_change
    }

    /// Counts down one trial; true when a perturbation is due now.
    pub fn should_fire(&mut self) -> bool {
        self.sets_until_change -= 1;
        self.mode != FocusChangeMode::Static && self.sets_until_change <= 0
    }

    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self.mode {
            FocusChangeMode::Static => {}
            FocusChangeMode::FixedInterval => self.sets_until_change = self.interval_sets,
            FocusChangeMode::RandomInterval => {
                self.sets_until_change = rng.gen_range(RANDOM_INTERVAL_SETS)
            }
        }
    }

    /// New vertical offset for the focus target.
    pub fn perturb<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(PERTURBATION_RANGE)
    }
}
