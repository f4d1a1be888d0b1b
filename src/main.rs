use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use sightline::{
    app_dirs::AppDirs,
    run_session,
    runtime::{self, ChannelInput, MonotonicClock},
    session_log::{SessionLog, SessionLogRow},
    ui::Display,
    ConfigStore, FileConfigStore, SessionConfig, SessionSummary, StimulusCatalog,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::{mpsc, Mutex},
    thread,
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// peripheral vision trainer: spot matching pairs while holding your gaze on a focus point
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal trainer for peripheral vision. Keep your eyes on the focus marker, press space when the two flanking symbols match, and let the staircase pull the pair in toward the focus point and shrink it as you improve."
)]
pub struct Cli {
    /// settings file to load instead of the default one
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// seed for a reproducible trial sequence
    #[clap(long)]
    seed: Option<u64>,

    /// session length in seconds
    #[clap(short = 'd', long, value_parser = parse_secs)]
    duration: Option<Duration>,

    /// print the effective settings as JSON and exit
    #[clap(long)]
    print_config: bool,

    /// write the effective settings to the settings file and exit
    #[clap(long)]
    save_config: bool,

    /// do not append this session to the history file
    #[clap(long)]
    no_log: bool,
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(Duration::from_micros((secs * 1e6).round() as u64))
    } else {
        Err("duration must be a positive number of seconds".to_string())
    }
}

impl Cli {
    fn store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    /// Stored settings with command line overrides applied
    fn session_config(&self, store: &dyn ConfigStore) -> SessionConfig {
        let mut cfg = store.load();
        if let Some(seed) = self.seed {
            cfg.seed = Some(seed);
        }
        if let Some(duration) = self.duration {
            cfg.session_duration = duration;
        }
        cfg
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    // installed before settings load so field fallbacks are recorded
    init_tracing();

    let store = cli.store();
    let cfg = cli.session_config(&store);

    if cli.print_config {
        println!("{}", cfg.to_json_string()?);
        return Ok(());
    }

    if cli.save_config {
        store.save(&cfg)?;
        println!("settings written to {}", store.path().display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, cfg.clone());

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    let summary = outcome?;
    print_summary(&summary);

    if !cli.no_log {
        let log = SessionLog::new();
        if let Err(err) = log.append(&SessionLogRow::new(&cfg, &summary)) {
            warn!(%err, path = %log.path().display(), "could not record session");
            eprintln!("could not record session: {err}");
        }
    }

    Ok(())
}

/// Trace output goes to a file so it never lands on the TUI.
fn init_tracing() {
    let Some(path) = AppDirs::trace_log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

/// Runs the session on a worker thread and redraws on every intent until it ends.
fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    cfg: SessionConfig,
) -> Result<SessionSummary, Box<dyn Error>> {
    let (event_tx, event_rx) = mpsc::channel();
    let (intent_tx, intent_rx) = mpsc::channel();
    runtime::spawn_key_reader(event_tx);

    info!(seed = ?cfg.seed, "launching session");
    let worker = thread::spawn(move || {
        run_session(
            cfg,
            &StimulusCatalog::default(),
            MonotonicClock::new(),
            ChannelInput::new(event_rx),
            intent_tx,
        )
    });

    let mut display = Display::default();
    terminal.draw(|f| f.render_widget(&display, f.area()))?;

    for intent in intent_rx {
        display.apply(&intent);
        terminal.draw(|f| f.render_widget(&display, f.area()))?;
    }

    let summary = worker
        .join()
        .map_err(|_| "session thread panicked")??;
    Ok(summary)
}

fn print_summary(summary: &SessionSummary) {
    println!("=== RESULTS ===");
    println!(
        "Similar pairs:      {:>5.1}% of {}",
        summary.similar_accuracy, summary.similar_pairs
    );
    println!(
        "Non-similar pairs:  {:>5.1}% of {}",
        summary.non_similar_accuracy, summary.non_similar_pairs
    );
    println!(
        "Overall:            {:>5.1}% over {} trials",
        summary.overall_accuracy, summary.total_trials
    );
    println!(
        "Average response time: {:.2} seconds",
        summary.mean_reaction_time.as_secs_f64()
    );
    println!(
        "Final tiers: separation {}, scale {} ({})",
        summary.final_separation_tier, summary.final_scale_tier, summary.end_reason
    );
}
