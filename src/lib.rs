// Library surface for the binary, headless runs and integration tests.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod focus;
pub mod intent;
pub mod runtime;
pub mod session;
pub mod session_log;
pub mod staircase;
pub mod stats;
pub mod stimulus;
pub mod ui;

pub use config::{ConfigStore, FileConfigStore, SessionConfig};
pub use error::{Error, Result};
pub use intent::{Intent, IntentSink};
pub use session::{run_session, Session};
pub use stats::{EndReason, SessionSummary};
pub use stimulus::StimulusCatalog;
