//! Target process awareness
//!
//! The OS adapter turns raw desktop events into [`Notification`]s carrying the
//! application they concern. [`ProcessWatcher`] drops anything that is not about
//! the target, tracks [`ProcessState`], and hands the coordinator a [`Signal`].

mod procfs;

pub use procfs::ProcfsProcessList;

use anyhow::Result;
use tracing::{debug, trace, warn};

/// Application descriptor attached to a desktop notification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppInfo {
    pub display_name: String,
    pub pid: Option<u32>,
}

impl AppInfo {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            pid: None,
        }
    }
}

/// Typed desktop notification produced at the OS boundary
///
/// `None` means the adapter could not resolve which application the event
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Launched(Option<AppInfo>),
    Terminated(Option<AppInfo>),
    Activated(Option<AppInfo>),
    Deactivated(Option<AppInfo>),
    /// Virtual desktop switch; not tied to any application
    SpaceChanged,
}

/// Lifecycle signal about the target application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Launched,
    Terminated,
    Activated,
    Deactivated,
    /// Re-assertion of the last known foreground belief
    SpaceChanged { foregrounded: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessState {
    pub running: bool,
    pub foregrounded: bool,
}

/// Source of the live process list
pub trait ProcessList: Send + Sync {
    fn running_applications(&self) -> Result<Vec<AppInfo>>;
}

pub struct ProcessWatcher {
    target: String,
    processes: Box<dyn ProcessList>,
    state: ProcessState,
}

impl ProcessWatcher {
    /// Create a watcher and seed `running` from the live process list
    pub fn new(target: impl Into<String>, processes: Box<dyn ProcessList>) -> Self {
        let mut watcher = Self {
            target: target.into(),
            processes,
            state: ProcessState::default(),
        };
        watcher.state.running = watcher.is_target_running();
        debug!(app = %watcher.target, running = watcher.state.running, "Process watcher initialized");
        watcher
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Query the OS for a process whose display name equals the target
    pub fn is_target_running(&self) -> bool {
        match self.processes.running_applications() {
            Ok(apps) => apps.iter().any(|app| app.display_name == self.target),
            Err(e) => {
                warn!(error = ?e, "Failed to query process list, assuming target is not running");
                false
            }
        }
    }

    /// Apply a notification, returning the signal it produces for the target
    ///
    /// Notifications for other applications, or without an application, change
    /// nothing and yield `None`. A space change never queries the OS.
    pub fn handle(&mut self, notification: &Notification) -> Option<Signal> {
        let (app, signal) = match notification {
            Notification::SpaceChanged => {
                return Some(Signal::SpaceChanged {
                    foregrounded: self.state.foregrounded,
                });
            }
            Notification::Launched(app) => (app, Signal::Launched),
            Notification::Terminated(app) => (app, Signal::Terminated),
            Notification::Activated(app) => (app, Signal::Activated),
            Notification::Deactivated(app) => (app, Signal::Deactivated),
        };

        let Some(app) = app else {
            debug!(signal = ?signal, "Dropping notification without application info");
            return None;
        };
        if app.display_name != self.target {
            trace!(app = %app.display_name, signal = ?signal, "Ignoring notification for other application");
            return None;
        }

        match signal {
            Signal::Launched => self.state.running = true,
            Signal::Terminated => self.state.running = false,
            Signal::Activated => self.state.foregrounded = true,
            Signal::Deactivated => self.state.foregrounded = false,
            Signal::SpaceChanged { .. } => {}
        }
        Some(signal)
    }
}
