use crate::error::Result;
use crate::focus::{FocusChangeMode, FocusShape, FocusTarget};
use crate::staircase::{StaircaseRules, Tiers, MAX_TIER, MIN_TIER};
use crate::stimulus::PoolId;
use directories::ProjectDirs;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Hard cap on how long a response window stays open
pub const MAX_RESPONSE_WINDOW: Duration = Duration::from_secs(2);

/// Immutable parameters for one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub session_duration: Duration,
    pub presentation_duration: Duration,
    pub inter_trial_interval: Duration,
    pub focus_change_mode: FocusChangeMode,
    pub interval_sets: u32,
    pub success_rate_threshold: f64,
    pub fail_rate_threshold: f64,
    pub chunk_size: usize,
    pub initial_separation_tier: u8,
    pub initial_scale_tier: u8,
    /// Empty means every pool
    pub active_stimulus_pools: BTreeSet<PoolId>,
    pub focus: FocusTarget,
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_duration: Duration::from_secs(10),
            presentation_duration: Duration::from_millis(1500),
            inter_trial_interval: Duration::from_millis(1500),
            focus_change_mode: FocusChangeMode::Static,
            interval_sets: 1,
            success_rate_threshold: 80.0,
            fail_rate_threshold: 20.0,
            chunk_size: 15,
            initial_separation_tier: 1,
            initial_scale_tier: 5,
            active_stimulus_pools: BTreeSet::new(),
            focus: FocusTarget::default(),
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn max_response_window(&self) -> Duration {
        self.inter_trial_interval.min(MAX_RESPONSE_WINDOW)
    }

    pub fn initial_tiers(&self) -> Tiers {
        Tiers::new(self.initial_separation_tier, self.initial_scale_tier)
    }

    pub fn staircase_rules(&self) -> StaircaseRules {
        StaircaseRules {
            chunk_size: self.chunk_size,
            success_rate_threshold: self.success_rate_threshold,
            fail_rate_threshold: self.fail_rate_threshold,
        }
    }

    /// Best-effort read of a settings document: each field that is missing or
    /// malformed keeps its default, the rest are taken as given.
    pub fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(doc) = value.as_object() else {
            warn!("settings document is not an object, using defaults");
            return defaults;
        };
        let fields = Fields { doc };

        Self {
            session_duration: fields
                .read(&["sessionDuration", "gameDuration"], seconds)
                .unwrap_or(defaults.session_duration),
            presentation_duration: fields
                .read(&["presentationDuration", "shapeDisplayDuration"], millis)
                .unwrap_or(defaults.presentation_duration),
            inter_trial_interval: fields
                .read(&["interTrialInterval", "betweenShapesDuration"], millis)
                .unwrap_or(defaults.inter_trial_interval),
            focus_change_mode: fields
                .read(&["focusChangeMode"], focus_change_mode)
                .unwrap_or(defaults.focus_change_mode),
            interval_sets: fields
                .read(&["intervalSets"], count)
                .unwrap_or(defaults.interval_sets),
            success_rate_threshold: fields
                .read(&["successRateThreshold"], rate)
                .unwrap_or(defaults.success_rate_threshold),
            fail_rate_threshold: fields
                .read(&["failRateThreshold"], rate)
                .unwrap_or(defaults.fail_rate_threshold),
            chunk_size: fields
                .read(&["chunkSize"], count)
                .map(|n| n as usize)
                .unwrap_or(defaults.chunk_size),
            initial_separation_tier: fields
                .read(&["initialSeparationTier", "startingDistanceTier"], tier)
                .unwrap_or(defaults.initial_separation_tier),
            initial_scale_tier: fields
                .read(&["initialScaleTier"], tier)
                .unwrap_or(defaults.initial_scale_tier),
            active_stimulus_pools: fields
                .read(&["activeStimulusPools", "imageSet"], pools)
                .unwrap_or(defaults.active_stimulus_pools),
            focus: FocusTarget {
                shape: fields
                    .read(&["focusShape"], focus_shape)
                    .unwrap_or(defaults.focus.shape),
                offset: fields
                    .read(&["focusOffset", "focusY"], finite)
                    .unwrap_or(defaults.focus.offset),
                scale: fields
                    .read(&["focusScale"], non_negative)
                    .unwrap_or(defaults.focus.scale),
            },
            seed: fields.read(&["seed"], Value::as_u64).or(defaults.seed),
        }
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_json(&value))
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&SettingsDocument::from(self))?)
    }
}

/// On-disk shape of a settings document
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsDocument {
    session_duration: f64,
    presentation_duration: u64,
    inter_trial_interval: u64,
    focus_change_mode: FocusChangeMode,
    interval_sets: u32,
    success_rate_threshold: f64,
    fail_rate_threshold: f64,
    chunk_size: usize,
    initial_separation_tier: u8,
    initial_scale_tier: u8,
    active_stimulus_pools: Vec<PoolId>,
    focus_shape: FocusShape,
    focus_offset: f64,
    focus_scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl From<&SessionConfig> for SettingsDocument {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            session_duration: cfg.session_duration.as_secs_f64(),
            presentation_duration: cfg.presentation_duration.as_millis() as u64,
            inter_trial_interval: cfg.inter_trial_interval.as_millis() as u64,
            focus_change_mode: cfg.focus_change_mode,
            interval_sets: cfg.interval_sets,
            success_rate_threshold: cfg.success_rate_threshold,
            fail_rate_threshold: cfg.fail_rate_threshold,
            chunk_size: cfg.chunk_size,
            initial_separation_tier: cfg.initial_separation_tier,
            initial_scale_tier: cfg.initial_scale_tier,
            active_stimulus_pools: cfg.active_stimulus_pools.iter().copied().collect(),
            focus_shape: cfg.focus.shape,
            focus_offset: cfg.focus.offset,
            focus_scale: cfg.focus.scale,
            seed: cfg.seed,
        }
    }
}

struct Fields<'a> {
    doc: &'a Map<String, Value>,
}

impl Fields<'_> {
    /// First key present wins; a present but unusable value is logged and ignored.
    fn read<T>(&self, keys: &[&str], parse: impl Fn(&Value) -> Option<T>) -> Option<T> {
        let (key, value) = keys
            .iter()
            .find_map(|key| self.doc.get(*key).map(|value| (*key, value)))?;

        let parsed = parse(value);
        if parsed.is_none() {
            warn!(key, %value, "malformed settings field, using default");
        } else {
            debug!(key, %value, "settings field");
        }
        parsed
    }
}

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|x| x.is_finite())
}

fn non_negative(value: &Value) -> Option<f64> {
    finite(value).filter(|x| *x >= 0.0)
}

fn rate(value: &Value) -> Option<f64> {
    finite(value)
}

// microsecond resolution keeps fractional documents from drifting
fn seconds(value: &Value) -> Option<Duration> {
    non_negative(value).map(|secs| Duration::from_micros((secs * 1e6).round() as u64))
}

fn millis(value: &Value) -> Option<Duration> {
    match value.as_u64() {
        Some(ms) => Some(Duration::from_millis(ms)),
        None => non_negative(value).map(|ms| Duration::from_micros((ms * 1e3).round() as u64)),
    }
}

fn count(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
}

fn tier(value: &Value) -> Option<u8> {
    finite(value).map(|x| x.round().clamp(f64::from(MIN_TIER), f64::from(MAX_TIER)) as u8)
}

fn focus_change_mode(value: &Value) -> Option<FocusChangeMode> {
    match value {
        Value::Number(n) => n.as_i64().and_then(FocusChangeMode::from_code),
        other => serde_json::from_value(other.clone()).ok(),
    }
}

fn focus_shape(value: &Value) -> Option<FocusShape> {
    match value {
        Value::Number(n) => n.as_i64().map(FocusShape::from_code),
        other => serde_json::from_value(other.clone()).ok(),
    }
}

fn pool_id(value: &Value) -> Option<PoolId> {
    value
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .and_then(PoolId::new)
}

/// A list of pool ids, or a single id as older documents stored it. Entries
/// outside the known pools are dropped.
fn pools(value: &Value) -> Option<BTreeSet<PoolId>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| {
                    let id = pool_id(item);
                    if id.is_none() {
                        warn!(%item, "ignoring unknown stimulus pool");
                    }
                    id
                })
                .collect(),
        ),
        single => pool_id(single).map(|id| BTreeSet::from([id])),
    }
}

pub trait ConfigStore {
    fn load(&self) -> SessionConfig;
    fn save(&self, cfg: &SessionConfig) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "sightline") {
            pd.config_dir().join("settings.json")
        } else {
            PathBuf::from("sightline_settings.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> SessionConfig {
        match fs::read(&self.path) {
            Ok(bytes) => SessionConfig::from_json_slice(&bytes).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), %err, "unreadable settings, using defaults");
                SessionConfig::default()
            }),
            Err(err) => {
                debug!(path = %self.path.display(), %err, "no settings file, using defaults");
                SessionConfig::default()
            }
        }
    }

    fn save(&self, cfg: &SessionConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, cfg.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn custom_config() -> SessionConfig {
        SessionConfig {
            session_duration: Duration::from_secs(90),
            presentation_duration: Duration::from_millis(800),
            inter_trial_interval: Duration::from_millis(2500),
            focus_change_mode: FocusChangeMode::RandomInterval,
            interval_sets: 4,
            success_rate_threshold: 75.0,
            fail_rate_threshold: 30.0,
            chunk_size: 10,
            initial_separation_tier: 6,
            initial_scale_tier: 2,
            active_stimulus_pools: [2, 9].into_iter().filter_map(PoolId::new).collect(),
            focus: FocusTarget {
                shape: FocusShape::Cross,
                offset: 0.25,
                scale: 0.5,
            },
            seed: Some(1234),
        }
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = SessionConfig::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = custom_config();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), SessionConfig::default());
    }

    #[test]
    fn garbage_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), SessionConfig::default());
    }

    #[test]
    fn each_field_falls_back_independently() {
        let cfg = SessionConfig::from_json(&json!({
            "sessionDuration": "ten minutes",
            "presentationDuration": 700,
            "chunkSize": 0,
            "successRateThreshold": 90,
            "failRateThreshold": null,
            "focusChangeMode": "sometimes",
            "initialScaleTier": 8
        }));

        let defaults = SessionConfig::default();
        assert_eq!(cfg.session_duration, defaults.session_duration);
        assert_eq!(cfg.presentation_duration, Duration::from_millis(700));
        assert_eq!(cfg.chunk_size, defaults.chunk_size);
        assert_eq!(cfg.success_rate_threshold, 90.0);
        assert_eq!(cfg.fail_rate_threshold, defaults.fail_rate_threshold);
        assert_eq!(cfg.focus_change_mode, defaults.focus_change_mode);
        assert_eq!(cfg.initial_scale_tier, 8);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        assert_eq!(SessionConfig::from_json(&json!({})), SessionConfig::default());
        assert_eq!(SessionConfig::from_json(&json!([1, 2])), SessionConfig::default());
    }

    #[test]
    fn legacy_keys_and_codes_are_understood() {
        let cfg = SessionConfig::from_json(&json!({
            "gameDuration": 120.0,
            "shapeDisplayDuration": 1000.0,
            "betweenShapesDuration": 1200.0,
            "focusChangeMode": 1,
            "intervalSets": 3,
            "focusShape": 1,
            "focusY": -0.2,
            "imageSet": 4
        }));

        assert_eq!(cfg.session_duration, Duration::from_secs(120));
        assert_eq!(cfg.presentation_duration, Duration::from_millis(1000));
        assert_eq!(cfg.inter_trial_interval, Duration::from_millis(1200));
        assert_eq!(cfg.focus_change_mode, FocusChangeMode::FixedInterval);
        assert_eq!(cfg.interval_sets, 3);
        assert_eq!(cfg.focus.shape, FocusShape::Cross);
        assert_eq!(cfg.focus.offset, -0.2);
        assert_eq!(
            cfg.active_stimulus_pools,
            BTreeSet::from([PoolId::new(4).unwrap()])
        );
    }

    #[test]
    fn tiers_are_clamped_and_unknown_pools_dropped() {
        let cfg = SessionConfig::from_json(&json!({
            "initialSeparationTier": 0,
            "initialScaleTier": 14,
            "activeStimulusPools": [1, 42, "three", 10]
        }));

        assert_eq!(cfg.initial_separation_tier, MIN_TIER);
        assert_eq!(cfg.initial_scale_tier, MAX_TIER);
        assert_eq!(
            cfg.active_stimulus_pools,
            [1, 10]
                .into_iter()
                .filter_map(PoolId::new)
                .collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn response_window_is_capped() {
        let mut cfg = SessionConfig::default();
        cfg.inter_trial_interval = Duration::from_millis(500);
        assert_eq!(cfg.max_response_window(), Duration::from_millis(500));

        cfg.inter_trial_interval = Duration::from_secs(5);
        assert_eq!(cfg.max_response_window(), MAX_RESPONSE_WINDOW);
    }

    #[test]
    fn document_uses_camel_case_keys() {
        let text = custom_config().to_json_string().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["focusChangeMode"], json!("randomInterval"));
        assert_eq!(value["interTrialInterval"], json!(2500));
        assert_eq!(value["activeStimulusPools"], json!([2, 9]));
        assert_eq!(value["seed"], json!(1234));
    }
}
