use crate::evaluator::TrialRecord;
use crate::staircase::Tiers;
use serde::Serialize;
use std::time::Duration;

/// Why the trial loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    Completed,
    Cancelled,
}

/// Session-lifetime counters, only ever incremented
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub similar_pairs: u32,
    pub non_similar_pairs: u32,
    pub similar_correct: u32,
    pub non_similar_correct: u32,
    pub correct_responses: u32,
    pub incorrect_responses: u32,
    pub total_reaction_time: Duration,
    pub reaction_samples: u32,
}

impl SessionStats {
    pub fn record(&mut self, trial: &TrialRecord) {
        if trial.stimuli_match {
            self.similar_pairs += 1;
            if trial.correct {
                self.similar_correct += 1;
            }
        } else {
            self.non_similar_pairs += 1;
            if trial.correct {
                self.non_similar_correct += 1;
            }
        }

        if trial.correct {
            self.correct_responses += 1;
        } else {
            self.incorrect_responses += 1;
        }

        if let Some(rt) = trial.reaction_time {
            self.total_reaction_time += rt;
            self.reaction_samples += 1;
        }
    }

    pub fn total_trials(&self) -> u32 {
        self.similar_pairs + self.non_similar_pairs
    }

    pub fn summarize(&self, context: SummaryContext) -> SessionSummary {
        SessionSummary {
            similar_accuracy: percent(self.similar_correct, self.similar_pairs),
            non_similar_accuracy: percent(self.non_similar_correct, self.non_similar_pairs),
            overall_accuracy: percent(self.correct_responses, self.total_trials()),
            mean_reaction_time: if self.reaction_samples > 0 {
                self.total_reaction_time / self.reaction_samples
            } else {
                Duration::ZERO
            },
            total_trials: self.total_trials(),
            similar_pairs: self.similar_pairs,
            non_similar_pairs: self.non_similar_pairs,
            correct_responses: self.correct_responses,
            incorrect_responses: self.incorrect_responses,
            final_separation_tier: context.tiers.separation,
            final_scale_tier: context.tiers.scale,
            chunk_evaluations: context.chunk_evaluations,
            focus_perturbations: context.focus_perturbations,
            elapsed: context.elapsed,
            end_reason: context.end_reason,
        }
    }
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) * 100.0 / f64::from(whole)
    }
}

/// Session facts the aggregator does not own but reports alongside its counters
#[derive(Debug, Clone, Copy)]
pub struct SummaryContext {
    pub tiers: Tiers,
    pub chunk_evaluations: usize,
    pub focus_perturbations: u32,
    pub elapsed: Duration,
    pub end_reason: EndReason,
}

/// End-of-session report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub similar_accuracy: f64,
    pub non_similar_accuracy: f64,
    pub overall_accuracy: f64,
    pub mean_reaction_time: Duration,
    pub total_trials: u32,
    pub similar_pairs: u32,
    pub non_similar_pairs: u32,
    pub correct_responses: u32,
    pub incorrect_responses: u32,
    pub final_separation_tier: u8,
    pub final_scale_tier: u8,
    pub chunk_evaluations: usize,
    pub focus_perturbations: u32,
    pub elapsed: Duration,
    pub end_reason: EndReason,
}
