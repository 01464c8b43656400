//! Top-level lifecycle coordination
//!
//! Startup happens in two steps around arming the desktop listener:
//! [`LifecycleCoordinator::reconcile`] makes sure `log.config` enables the
//! required zones before anything watches the client, then
//! [`LifecycleCoordinator::start`] checks whether the client is already up,
//! prompting for a restart if it read a stale file, and starts tracking. A
//! launch racing with that check is still buffered by the listener. After that
//! the coordinator only reacts to notifications delivered by the main loop.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::hearthstone::RESTART_MESSAGE;
use crate::log_config::{self, LogZone, ReconcileOutcome};
use crate::process::{Notification, ProcessState, ProcessWatcher, Signal};
use crate::tracking::TrackingController;

/// Typed lifecycle event published to the game-state consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Running(bool),
    Active(bool),
}

/// Consumer of the client's running/foreground state
///
/// Called on the main thread, possibly many times with the same value.
pub trait GameState: Send + Sync {
    fn set_active(&self, active: bool);

    fn on_event(&self, _event: LifecycleEvent) {}
}

/// Cached geometry of the client window; `reload` is a fire-and-forget hint
pub trait WindowGeometry: Send + Sync {
    fn reload(&self);
}

/// Blocking acknowledgement shown on the main thread
pub trait RestartPrompt {
    fn show(&self, message: &str);
}

pub struct Collaborators {
    pub game: Arc<dyn GameState>,
    pub geometry: Arc<dyn WindowGeometry>,
    pub prompt: Box<dyn RestartPrompt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not running (or not seen yet)
    Idle,
    /// Running and foregrounded
    Active,
    /// Running in the background
    Inactive,
}

impl From<ProcessState> for Phase {
    fn from(state: ProcessState) -> Self {
        match (state.running, state.foregrounded) {
            (false, _) => Phase::Idle,
            (true, true) => Phase::Active,
            (true, false) => Phase::Inactive,
        }
    }
}

pub struct LifecycleCoordinator {
    watcher: ProcessWatcher,
    tracking: TrackingController,
    game: Arc<dyn GameState>,
    geometry: Arc<dyn WindowGeometry>,
}

impl LifecycleCoordinator {
    /// Enable the required zones in `log_config`
    ///
    /// Must run before any notification source is armed.
    pub fn reconcile(log_config: &Path, zones: &[LogZone]) -> ReconcileOutcome {
        log_config::reconcile_file(log_config, zones)
    }

    /// Start tracking if the target is already running
    ///
    /// `watcher` must be created after the notification source is armed so a
    /// launch is either seen here or delivered later as a notification.
    pub fn start(
        outcome: &ReconcileOutcome,
        watcher: ProcessWatcher,
        tracking: TrackingController,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators { game, geometry, prompt } = collaborators;

        let running = watcher.state().running;
        if outcome.written && running {
            info!(app = %watcher.target(), "Log zones changed while client is running, asking for restart");
            prompt.show(RESTART_MESSAGE);
        }

        let coordinator = Self {
            watcher,
            tracking,
            game,
            geometry,
        };

        if running {
            info!(app = %coordinator.watcher.target(), "Client already running at startup");
            coordinator.tracking.start_session();
            coordinator.game.set_active(true);
            coordinator.game.on_event(LifecycleEvent::Running(true));
            coordinator.game.on_event(LifecycleEvent::Active(true));
        }

        coordinator
    }

    /// Dispatch one desktop notification
    pub fn handle(&mut self, notification: &Notification) {
        let Some(signal) = self.watcher.handle(notification) else {
            return;
        };
        let app = self.watcher.target();

        match signal {
            Signal::Launched => {
                info!(app = %app, "Client is now launched");
                self.tracking.start_session();
                self.geometry.reload();
                self.publish(LifecycleEvent::Running(true));
            }
            Signal::Terminated => {
                info!(app = %app, "Client is now closed");
                self.tracking.stop_session();
                self.publish(LifecycleEvent::Running(false));
            }
            Signal::Activated => {
                info!(app = %app, "Client is now active");
                self.geometry.reload();
                self.publish(LifecycleEvent::Active(true));
            }
            Signal::Deactivated => {
                info!(app = %app, "Client is now inactive");
                self.publish(LifecycleEvent::Active(false));
            }
            Signal::SpaceChanged { foregrounded } => {
                debug!(foregrounded, "Desktop switched, re-asserting activation");
                self.publish(LifecycleEvent::Active(foregrounded));
            }
        }
    }

    fn publish(&self, event: LifecycleEvent) {
        let (LifecycleEvent::Running(active) | LifecycleEvent::Active(active)) = event;
        self.game.set_active(active);
        self.game.on_event(event);
    }

    pub fn state(&self) -> ProcessState {
        self.watcher.state()
    }

    pub fn phase(&self) -> Phase {
        self.watcher.state().into()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_active()
    }

    /// Stop any session and join the tracking worker
    pub fn shutdown(&self) {
        info!("Shutting down lifecycle coordinator");
        self.tracking.shutdown();
    }
}
