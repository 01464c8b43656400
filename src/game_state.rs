//! Minimal game-state consumer: keeps the latest belief and logs changes

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, trace};

use crate::coordinator::{GameState, LifecycleEvent};

#[derive(Debug, Default)]
pub struct TracingGameState {
    active: AtomicBool,
    running: AtomicBool,
}

impl TracingGameState {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl GameState for TracingGameState {
    fn set_active(&self, active: bool) {
        let previous = self.active.swap(active, Ordering::AcqRel);
        if previous == active {
            trace!(active, "Game activation unchanged");
        } else {
            info!(active, "Game activation changed");
        }
    }

    fn on_event(&self, event: LifecycleEvent) {
        if let LifecycleEvent::Running(running) = event {
            self.running.store(running, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_latest_values() {
        let state = TracingGameState::default();
        state.set_active(true);
        state.set_active(true);
        assert!(state.is_active());

        state.on_event(LifecycleEvent::Running(true));
        state.on_event(LifecycleEvent::Active(false));
        assert!(state.is_running());

        state.set_active(false);
        state.on_event(LifecycleEvent::Running(false));
        assert!(!state.is_active());
        assert!(!state.is_running());
    }
}
