#![forbid(unsafe_code)]

mod config;
mod constants;
mod coordinator;
mod game_state;
mod log_config;
mod log_reader;
mod paths;
mod process;
mod prompt;
mod tracking;
mod x11_events;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use tracing::{debug, info, trace, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::{Cli, Settings};
use constants::env::LOG_LEVEL;
use constants::runtime::MAIN_LOOP_TICK;
use coordinator::{Collaborators, LifecycleCoordinator};
use game_state::TracingGameState;
use log_reader::{LogLine, LogReaderManager};
use process::{ProcessWatcher, ProcfsProcessList};
use tracking::TrackingController;
use x11_events::{X11Geometry, X11Notifier};

fn init_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose {
        TraceLevel::DEBUG
    } else {
        match std::env::var(LOG_LEVEL)
            .unwrap_or_else(|_| "info".to_string())
            .to_lowercase()
            .as_str()
        {
            "trace" => TraceLevel::TRACE,
            "debug" => TraceLevel::DEBUG,
            "warn" => TraceLevel::WARN,
            "error" => TraceLevel::ERROR,
            _ => TraceLevel::INFO,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        signal_hook::flag::register(SIGINT, Arc::clone(&flag))
            .context("Failed to register SIGINT handler")?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&flag))
            .context("Failed to register SIGTERM handler")?;
    }
    Ok(flag)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut settings = Settings::load(cli.config.as_deref());
    settings.apply_cli(&cli);

    let log_config_path = settings.log_config_path();
    info!(
        target_name = %settings.target_name,
        log_config = %log_config_path.display(),
        zones = ?settings.zones,
        "Starting hearthwatch"
    );

    if cli.check {
        let outcome = log_config::reconcile_file(&log_config_path, &settings.zones);
        info!(
            missing = ?outcome.missing_zones,
            written = outcome.written,
            "Log config checked"
        );
        return Ok(());
    }

    let shutdown = shutdown_flag()?;

    let log_dir = settings.log_dir();
    info!(path = %log_dir.display(), "Tailing zone logs");
    let readers = LogReaderManager::new(
        log_dir,
        settings.zones.clone(),
        Box::new(|line: LogLine| trace!(zone = %line.zone, line = %line.text, "Log line")),
    );

    // log.config must be up to date before anything watches the client
    let outcome = LifecycleCoordinator::reconcile(&log_config_path, &settings.zones);

    // Armed before the running check; launches in between wait in the channel
    let (tx, rx) = mpsc::channel();
    X11Notifier::connect()?.spawn(tx)?;

    let game = Arc::new(TracingGameState::default());
    let geometry = Arc::new(X11Geometry::spawn(settings.target_name.clone())?);
    let watcher = ProcessWatcher::new(
        settings.target_name.clone(),
        Box::new(ProcfsProcessList::new()),
    );
    let tracking = TrackingController::new(Arc::new(readers))?;

    let mut coordinator = LifecycleCoordinator::start(
        &outcome,
        watcher,
        tracking,
        Collaborators {
            game: game.clone(),
            geometry: geometry.clone(),
            prompt: prompt::for_mode(settings.prompt),
        },
    );

    info!(phase = ?coordinator.phase(), "Watching desktop");
    while !shutdown.load(Ordering::Relaxed) {
        match rx.recv_timeout(MAIN_LOOP_TICK) {
            Ok(notification) => {
                coordinator.handle(&notification);
                debug!(
                    phase = ?coordinator.phase(),
                    tracking = coordinator.is_tracking(),
                    active = game.is_active(),
                    window = ?geometry.current(),
                    "Notification handled"
                );
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Desktop notifications stopped");
                break;
            }
        }
    }

    info!(running = game.is_running(), "Shutting down");
    coordinator.shutdown();
    Ok(())
}
