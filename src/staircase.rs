use tracing::{debug, info};

pub const MIN_TIER: u8 = 1;
pub const MAX_TIER: u8 = 10;

/// Difficulty axis the staircase can move
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Axis {
    Separation,
    Scale,
}

impl Axis {
    pub fn other(self) -> Self {
        match self {
            Axis::Separation => Axis::Scale,
            Axis::Scale => Axis::Separation,
        }
    }
}

/// Direction a chunk evaluation pushes difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Direction {
    Harder,
    Easier,
}

/// Current tier on each axis.
///
/// Harder means a lower separation tier (stimuli closer to the focus target)
/// or a higher scale tier (stimuli rendered smaller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiers {
    pub separation: u8,
    pub scale: u8,
}

impl Tiers {
    pub fn new(separation: u8, scale: u8) -> Self {
        Self {
            separation: separation.clamp(MIN_TIER, MAX_TIER),
            scale: scale.clamp(MIN_TIER, MAX_TIER),
        }
    }

    /// Moves one step along `axis`; false when already at the bound.
    fn step(&mut self, axis: Axis, direction: Direction) -> bool {
        let tier = match axis {
            Axis::Separation => &mut self.separation,
            Axis::Scale => &mut self.scale,
        };
        let raise = matches!(
            (axis, direction),
            (Axis::Separation, Direction::Easier) | (Axis::Scale, Direction::Harder)
        );

        if raise && *tier < MAX_TIER {
            *tier += 1;
            true
        } else if !raise && *tier > MIN_TIER {
            *tier -= 1;
            true
        } else {
            false
        }
    }
}

/// Counts verdicts until a chunk is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkAccumulator {
    pub correct: usize,
    pub total: usize,
}

impl ChunkAccumulator {
    pub fn push(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.correct * 100) as f64 / self.total as f64
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What a full chunk did to the tiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkOutcome {
    /// Accuracy fell between the thresholds
    Hold,
    Adjusted { axis: Axis, direction: Direction },
    /// Both axes were already at the requested bound
    Saturated { direction: Direction },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkEvaluation {
    pub accuracy: f64,
    pub outcome: ChunkOutcome,
    pub tiers: Tiers,
}

/// Thresholds and chunk size the controller evaluates against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaircaseRules {
    pub chunk_size: usize,
    pub success_rate_threshold: f64,
    pub fail_rate_threshold: f64,
}

/// Two-axis staircase driven by chunked accuracy
#[derive(Debug, Clone)]
pub struct DifficultyController {
    rules: StaircaseRules,
    tiers: Tiers,
    next_axis: Axis,
    chunk: ChunkAccumulator,
    evaluations: usize,
}

impl DifficultyController {
    pub fn new(rules: StaircaseRules, initial: Tiers) -> Self {
        Self {
            rules: StaircaseRules {
                chunk_size: rules.chunk_size.max(1),
                ..rules
            },
            tiers: initial,
            next_axis: Axis::Separation,
            chunk: ChunkAccumulator::default(),
            evaluations: 0,
        }
    }

    pub fn current_tiers(&self) -> Tiers {
        self.tiers
    }

    pub fn next_axis(&self) -> Axis {
        self.next_axis
    }

    pub fn chunk(&self) -> ChunkAccumulator {
        self.chunk
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Adds one verdict; returns the evaluation when this verdict fills the chunk.
    pub fn record(&mut self, correct: bool) -> Option<ChunkEvaluation> {
        self.chunk.push(correct);
        if self.chunk.total < self.rules.chunk_size {
            return None;
        }

        let accuracy = self.chunk.accuracy();
        self.chunk.clear();
        self.evaluations += 1;

        // success wins when the thresholds overlap
        let outcome = if accuracy >= self.rules.success_rate_threshold {
            self.adjust(Direction::Harder)
        } else if accuracy <= self.rules.fail_rate_threshold {
            self.adjust(Direction::Easier)
        } else {
            ChunkOutcome::Hold
        };

        match outcome {
            ChunkOutcome::Adjusted { axis, direction } => info!(
                accuracy,
                %axis,
                %direction,
                separation = self.tiers.separation,
                scale = self.tiers.scale,
                "difficulty adjusted"
            ),
            _ => debug!(accuracy, ?outcome, "chunk evaluated"),
        }

        Some(ChunkEvaluation {
            accuracy,
            outcome,
            tiers: self.tiers,
        })
    }

    fn adjust(&mut self, direction: Direction) -> ChunkOutcome {
        let preferred = self.next_axis;
        if self.tiers.step(preferred, direction) {
            self.next_axis = preferred.other();
            return ChunkOutcome::Adjusted {
                axis: preferred,
                direction,
            };
        }

        // the cursor stays put on fallback so the same axis is tried first next time
        let fallback = preferred.other();
        if self.tiers.step(fallback, direction) {
            ChunkOutcome::Adjusted {
                axis: fallback,
                direction,
            }
        } else {
            ChunkOutcome::Saturated { direction }
        }
    }
}
