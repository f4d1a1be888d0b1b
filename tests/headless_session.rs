// Full sessions through the public library on virtual time.

use std::time::Duration;

use assert_matches::assert_matches;
use sightline::{
    focus::FocusChangeMode,
    run_session,
    runtime::{ScriptedInput, VirtualClock},
    session_log::{SessionLog, SessionLogRow},
    stimulus::PoolId,
    EndReason, Error, Intent, SessionConfig, SessionSummary, StimulusCatalog,
};
use tempfile::tempdir;

fn seeded_config() -> SessionConfig {
    SessionConfig {
        session_duration: Duration::from_secs(45),
        presentation_duration: Duration::from_millis(400),
        inter_trial_interval: Duration::from_millis(800),
        focus_change_mode: FocusChangeMode::RandomInterval,
        chunk_size: 6,
        active_stimulus_pools: [2, 4, 9].into_iter().filter_map(PoolId::new).collect(),
        seed: Some(2024),
        ..SessionConfig::default()
    }
}

fn replay(
    cfg: SessionConfig,
    responder: impl FnMut(usize) -> Option<Duration>,
) -> (SessionSummary, Vec<Intent>) {
    let clock = VirtualClock::new();
    let input = ScriptedInput::new(clock.clone(), responder);
    let mut intents = Vec::new();
    let summary =
        run_session(cfg, &StimulusCatalog::default(), clock, input, &mut intents).unwrap();
    (summary, intents)
}

/// Responds on every third window, at varying latencies
fn sometimes(window: usize) -> Option<Duration> {
    (window % 3 == 0).then(|| Duration::from_millis(150 + (window as u64 % 7) * 40))
}

#[test]
fn reloaded_settings_replay_the_same_session() {
    let cfg = seeded_config();
    let reloaded =
        SessionConfig::from_json_slice(cfg.to_json_string().unwrap().as_bytes()).unwrap();
    assert_eq!(reloaded, cfg);

    let (first, first_intents) = replay(cfg, sometimes);
    let (second, second_intents) = replay(reloaded, sometimes);

    assert_eq!(first_intents, second_intents);
    assert_eq!(first, second);
    assert!(first.total_trials > 0);
}

#[test]
fn stimuli_only_come_from_active_pools() {
    let cfg = seeded_config();
    let active = cfg.active_stimulus_pools.clone();
    let (_, intents) = replay(cfg, |_| None);

    for intent in &intents {
        if let Intent::ShowStimuli { left, right, .. } = intent {
            assert!(active.contains(&left.pool));
            assert_eq!(left.pool, right.pool);
        }
    }
}

#[test]
fn always_responding_is_right_only_on_matches() {
    let cfg = SessionConfig {
        session_duration: Duration::from_secs(60),
        seed: Some(3),
        ..SessionConfig::default()
    };
    let (summary, _) = replay(cfg, |_| Some(Duration::from_millis(250)));

    assert!(summary.similar_pairs > 0);
    assert!(summary.non_similar_pairs > 0);
    assert_eq!(summary.similar_accuracy, 100.0);
    assert_eq!(summary.non_similar_accuracy, 0.0);
    assert_eq!(summary.mean_reaction_time, Duration::from_millis(250));
    assert_eq!(summary.correct_responses, summary.similar_pairs);
}

#[test]
fn feedback_follows_every_shown_pair() {
    let (_, intents) = replay(seeded_config(), sometimes);

    let shows = intents
        .iter()
        .filter(|i| matches!(i, Intent::ShowStimuli { .. }))
        .count();
    let feedback = intents
        .iter()
        .filter(|i| matches!(i, Intent::PlayFeedback { .. }))
        .count();
    let hides = intents.iter().filter(|i| **i == Intent::HideStimuli).count();
    assert_eq!(shows, feedback);
    assert_eq!(shows, hides);
    assert_matches!(intents.first(), Some(Intent::PlaceFocus { .. }));
}

#[test]
fn stopped_session_is_still_recorded() {
    let cfg = seeded_config();
    let clock = VirtualClock::new();
    let input =
        ScriptedInput::new(clock.clone(), sometimes).stop_at(Duration::from_millis(5_100));
    let mut intents = Vec::new();
    let summary = run_session(cfg.clone(), &StimulusCatalog::default(), clock, input, &mut intents)
        .unwrap();

    assert_eq!(summary.end_reason, EndReason::Cancelled);
    assert_eq!(summary.elapsed, Duration::from_millis(5_100));

    let dir = tempdir().unwrap();
    let log = SessionLog::with_path(dir.path().join("sessions.csv"));
    log.append(&SessionLogRow::new(&cfg, &summary)).unwrap();

    let rows = log.read_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].end_reason, "Cancelled");
    assert_eq!(rows[0].pools, "2 4 9");
    assert_eq!(rows[0].seed, Some(2024));
    assert_eq!(rows[0].trials, summary.total_trials);
}

#[test]
fn empty_catalog_is_an_error() {
    let clock = VirtualClock::new();
    let input = ScriptedInput::new(clock.clone(), |_| None);
    let mut intents = Vec::new();
    let result = run_session(
        SessionConfig::default(),
        &StimulusCatalog::empty(),
        clock,
        input,
        &mut intents,
    );
    assert_matches!(result, Err(Error::EmptyCatalog));
    assert!(intents.is_empty());
}
