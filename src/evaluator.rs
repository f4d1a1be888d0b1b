use std::time::Duration;

/// Scored result of one response window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub correct: bool,
    pub reaction_time: Option<Duration>,
}

/// One completed trial, handed to the aggregator and dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialRecord {
    pub stimuli_match: bool,
    pub responded: bool,
    pub correct: bool,
    pub reaction_time: Option<Duration>,
}

impl TrialRecord {
    pub fn new(stimuli_match: bool, responded: bool, verdict: Verdict) -> Self {
        Self {
            stimuli_match,
            responded,
            correct: verdict.correct,
            reaction_time: verdict.reaction_time,
        }
    }
}

/// The only response is a "match" signal, so silence is the right answer for a
/// non-matching pair. Reaction time is kept only for responses to matches.
pub fn evaluate(stimuli_match: bool, responded: bool, elapsed_at_response: Duration) -> Verdict {
    Verdict {
        correct: responded == stimuli_match,
        reaction_time: (responded && stimuli_match).then_some(elapsed_at_response),
    }
}
