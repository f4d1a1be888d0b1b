use crate::app_dirs::AppDirs;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::stats::SessionSummary;
use chrono::Local;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// One line of session history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogRow {
    pub date: String,
    pub session_secs: f64,
    pub elapsed_secs: f64,
    pub trials: u32,
    pub similar_accuracy: f64,
    pub non_similar_accuracy: f64,
    pub mean_rt_ms: u64,
    pub separation_tier: u8,
    pub scale_tier: u8,
    pub focus_mode: String,
    pub pools: String,
    pub seed: Option<u64>,
    pub end_reason: String,
}

impl SessionLogRow {
    pub fn new(cfg: &SessionConfig, summary: &SessionSummary) -> Self {
        Self {
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            session_secs: cfg.session_duration.as_secs_f64(),
            elapsed_secs: summary.elapsed.as_secs_f64(),
            trials: summary.total_trials,
            similar_accuracy: summary.similar_accuracy,
            non_similar_accuracy: summary.non_similar_accuracy,
            mean_rt_ms: summary.mean_reaction_time.as_millis() as u64,
            separation_tier: summary.final_separation_tier,
            scale_tier: summary.final_scale_tier,
            focus_mode: cfg.focus_change_mode.to_string(),
            pools: if cfg.active_stimulus_pools.is_empty() {
                "all".to_string()
            } else {
                cfg.active_stimulus_pools.iter().join(" ")
            },
            seed: cfg.seed,
            end_reason: summary.end_reason.to_string(),
        }
    }
}

/// Append-only CSV of finished sessions
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            path: AppDirs::session_log_path()
                .unwrap_or_else(|| PathBuf::from("sightline_sessions.csv")),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, row: &SessionLogRow) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet, we need to emit a header
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<SessionLogRow>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staircase::Tiers;
    use crate::stats::{EndReason, SessionStats, SummaryContext};
    use crate::stimulus::PoolId;
    use std::time::Duration;
    use tempfile::tempdir;

    fn summary() -> SessionSummary {
        SessionStats::default().summarize(SummaryContext {
            tiers: Tiers::new(2, 9),
            chunk_evaluations: 0,
            focus_perturbations: 0,
            elapsed: Duration::from_millis(10_500),
            end_reason: EndReason::Completed,
        })
    }

    #[test]
    fn appends_rows_with_single_header() {
        let dir = tempdir().unwrap();
        let log = SessionLog::with_path(dir.path().join("state").join("sessions.csv"));
        let mut cfg = SessionConfig::default();

        log.append(&SessionLogRow::new(&cfg, &summary())).unwrap();
        cfg.active_stimulus_pools = [3, 5].into_iter().filter_map(PoolId::new).collect();
        cfg.seed = Some(8);
        log.append(&SessionLogRow::new(&cfg, &summary())).unwrap();

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pools, "all");
        assert_eq!(rows[0].seed, None);
        assert_eq!(rows[1].pools, "3 5");
        assert_eq!(rows[1].seed, Some(8));
        assert_eq!(rows[1].separation_tier, 2);
        assert_eq!(rows[1].elapsed_secs, 10.5);
        assert_eq!(rows[1].end_reason, "Completed");

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("date,").count(), 1);
    }

    #[test]
    fn reading_missing_log_fails() {
        let dir = tempdir().unwrap();
        let log = SessionLog::with_path(dir.path().join("absent.csv"));
        assert!(log.read_all().is_err());
    }
}
