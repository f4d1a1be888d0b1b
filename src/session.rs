use crate::config::SessionConfig;
use crate::error::Result;
use crate::evaluator::{evaluate, TrialRecord};
use crate::focus::{FocusScheduler, FOCUS_SETTLE};
use crate::intent::{Intent, IntentSink};
use crate::runtime::{Clock, ResponseInput, SessionEvent};
use crate::staircase::DifficultyController;
use crate::stats::{EndReason, SessionStats, SessionSummary, SummaryContext};
use crate::stimulus::{Placement, StimulusCatalog, StimulusSelector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tracing::{debug, info, trace};

/// A suspension was cut short by a stop request or a closed input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cancelled;

/// One participant session: owns every piece of mutable trial state and
/// drives the trial loop against a clock, an input and an intent sink.
pub struct Session<C, I, S> {
    config: SessionConfig,
    selector: StimulusSelector,
    focus: FocusScheduler,
    controller: DifficultyController,
    stats: SessionStats,
    rng: StdRng,
    clock: C,
    input: I,
    sink: S,
    pending_hide: Option<Duration>,
    elapsed: Duration,
    focus_perturbations: u32,
}

impl<C: Clock, I: ResponseInput, S: IntentSink> Session<C, I, S> {
    pub fn new(
        config: SessionConfig,
        catalog: &StimulusCatalog,
        clock: C,
        input: I,
        sink: S,
    ) -> Result<Self> {
        let selector = StimulusSelector::new(catalog, &config.active_stimulus_pools)?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let focus = FocusScheduler::new(config.focus_change_mode, config.interval_sets, &mut rng);
        let controller =
            DifficultyController::new(config.staircase_rules(), config.initial_tiers());

        Ok(Self {
            config,
            selector,
            focus,
            controller,
            stats: SessionStats::default(),
            rng,
            clock,
            input,
            sink,
            pending_hide: None,
            elapsed: Duration::ZERO,
            focus_perturbations: 0,
        })
    }

    /// Runs trials until the session clock reaches the configured duration or
    /// the input asks to stop, then summarizes what was gathered.
    pub fn run(mut self) -> SessionSummary {
        info!(
            duration_secs = self.config.session_duration.as_secs_f64(),
            window_ms = self.config.max_response_window().as_millis() as u64,
            focus_mode = %self.config.focus_change_mode,
            pools = ?self.selector.active_pools(),
            "session started"
        );

        self.sink.emit(Intent::PlaceFocus {
            shape: self.config.focus.shape,
            offset: self.config.focus.offset,
            scale: self.config.focus.scale,
        });

        let end_reason = loop {
            if self.elapsed >= self.config.session_duration {
                break EndReason::Completed;
            }

            let started = self.clock.now();
            let trial = self.run_trial();
            self.elapsed += self.clock.now().saturating_sub(started);

            if trial.is_err() {
                break EndReason::Cancelled;
            }
        };

        // a hide still pending belongs to a trial that never finished
        self.pending_hide = None;

        let summary = self.stats.summarize(SummaryContext {
            tiers: self.controller.current_tiers(),
            chunk_evaluations: self.controller.evaluations(),
            focus_perturbations: self.focus_perturbations,
            elapsed: self.elapsed,
            end_reason,
        });

        info!(
            %end_reason,
            trials = summary.total_trials,
            similar_accuracy = summary.similar_accuracy,
            non_similar_accuracy = summary.non_similar_accuracy,
            mean_rt_ms = summary.mean_reaction_time.as_millis() as u64,
            "session finished"
        );
        summary
    }

    fn run_trial(&mut self) -> std::result::Result<TrialRecord, Cancelled> {
        let trial = self.stats.total_trials() + 1;

        if self.focus.should_fire() {
            let offset = self.focus.perturb(&mut self.rng);
            self.focus_perturbations += 1;
            self.sink.emit(Intent::RelocateFocus { offset });
            info!(trial, offset, "focus target relocated");
            self.pause(FOCUS_SETTLE)?;
            self.focus.reset(&mut self.rng);
        }

        let tiers = self.controller.current_tiers();
        let pair = self.selector.draw_pair(&mut self.rng);
        self.sink.emit(Intent::ShowStimuli {
            left: pair.left,
            right: pair.right,
            placement: Placement::from_tiers(tiers),
        });

        let shown_at = self.clock.now();
        self.pending_hide = Some(shown_at + self.config.presentation_duration);

        self.input.open_window();
        let response =
            self.wait_until(shown_at + self.config.max_response_window(), Some(shown_at))?;

        let responded = response.is_some();
        let verdict = evaluate(pair.matching, responded, response.unwrap_or_default());
        self.sink.emit(Intent::PlayFeedback {
            correct: verdict.correct,
        });

        // stimuli never outlive their response window
        if self.pending_hide.take().is_some() {
            self.sink.emit(Intent::HideStimuli);
        }

        let record = TrialRecord::new(pair.matching, responded, verdict);
        self.stats.record(&record);
        self.controller.record(verdict.correct);

        debug!(
            trial,
            matching = pair.matching,
            responded,
            correct = verdict.correct,
            rt_ms = verdict.reaction_time.map(|rt| rt.as_millis() as u64),
            separation = tiers.separation,
            scale = tiers.scale,
            "trial scored"
        );

        self.pause(self.config.inter_trial_interval)?;
        Ok(record)
    }

    fn pause(&mut self, duration: Duration) -> std::result::Result<(), Cancelled> {
        let deadline = self.clock.now() + duration;
        self.wait_until(deadline, None).map(|_| ())
    }

    /// Suspends until `deadline`, firing the hide timer if it falls due. With a
    /// `window_start` the first response inside the window ends the wait and
    /// its latency is returned; otherwise responses are dropped.
    fn wait_until(
        &mut self,
        deadline: Duration,
        window_start: Option<Duration>,
    ) -> std::result::Result<Option<Duration>, Cancelled> {
        loop {
            let now = self.clock.now();
            if self.pending_hide.is_some_and(|at| at <= now) {
                self.pending_hide = None;
                self.sink.emit(Intent::HideStimuli);
            }
            if now >= deadline {
                return Ok(None);
            }

            let wake = self.pending_hide.map_or(deadline, |at| at.min(deadline));
            match self.input.recv_timeout(wake - now) {
                Ok(SessionEvent::Response) => {
                    let at = self.clock.now();
                    match window_start {
                        Some(start) if at < deadline => return Ok(Some(at - start)),
                        Some(_) => trace!("response after window closed"),
                        None => trace!("response outside window dropped"),
                    }
                }
                Ok(SessionEvent::Stop) => {
                    info!("stop requested");
                    return Err(Cancelled);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    info!("input closed, stopping session");
                    return Err(Cancelled);
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }
}

/// Builds a session from `config` and runs it to completion.
pub fn run_session<C, I, S>(
    config: SessionConfig,
    catalog: &StimulusCatalog,
    clock: C,
    input: I,
    sink: S,
) -> Result<SessionSummary>
where
    C: Clock,
    I: ResponseInput,
    S: IntentSink,
{
    Ok(Session::new(config, catalog, clock, input, sink)?.run())
}
