//! Log pipeline session control
//!
//! Start and stop requests update the session handle under one mutex and are
//! queued, in that same critical section, to a dedicated worker thread. The
//! pipeline therefore sees strictly alternating start/stop calls in request
//! order, and never on the caller's thread.

use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::constants::runtime::TRACKING_THREAD;

/// Background log reading, driven by the tracking worker
///
/// `start` may block on file I/O but must return once reading is under way;
/// `stop` must make running readers finish promptly.
pub trait LogPipeline: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Handle for one running pipeline session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingSession {
    pub id: u64,
}

enum Command {
    Start(u64),
    Stop(u64),
    Shutdown,
}

struct Inner {
    session: Option<TrackingSession>,
    next_id: u64,
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

pub struct TrackingController {
    inner: Mutex<Inner>,
}

impl TrackingController {
    /// Spawn the worker thread that runs the pipeline for the controller's lifetime
    pub fn new(pipeline: Arc<dyn LogPipeline>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(TRACKING_THREAD.to_string())
            .spawn(move || run_worker(rx, pipeline))
            .context("Failed to spawn tracking worker thread")?;

        Ok(Self {
            inner: Mutex::new(Inner {
                session: None,
                next_id: 0,
                commands: Some(tx),
                worker: Some(worker),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule a pipeline start unless a session is already active
    ///
    /// Returns true if a new session was created.
    pub fn start_session(&self) -> bool {
        let mut inner = self.lock();
        if let Some(session) = inner.session {
            debug!(session = session.id, "Tracking already active");
            return false;
        }
        let Some(commands) = inner.commands.as_ref() else {
            warn!("Tracking controller is shut down, ignoring start request");
            return false;
        };

        let id = inner.next_id + 1;
        if commands.send(Command::Start(id)).is_err() {
            error!(session = id, "Tracking worker is gone, cannot start session");
            return false;
        }
        inner.next_id = id;
        inner.session = Some(TrackingSession { id });
        info!(session = id, "Tracking session started");
        true
    }

    /// Signal the pipeline to stop and clear the session handle
    ///
    /// Returns true if a session was active. Does not wait for the readers.
    pub fn stop_session(&self) -> bool {
        let mut inner = self.lock();
        let Some(session) = inner.session.take() else {
            debug!("No tracking session to stop");
            return false;
        };
        if let Some(commands) = inner.commands.as_ref()
            && commands.send(Command::Stop(session.id)).is_err()
        {
            error!(session = session.id, "Tracking worker is gone, cannot stop session");
        }
        info!(session = session.id, "Tracking session stopped");
        true
    }

    pub fn session(&self) -> Option<TrackingSession> {
        self.lock().session
    }

    pub fn is_active(&self) -> bool {
        self.session().is_some()
    }

    /// Stop any session, drain queued requests and join the worker
    ///
    /// Later start requests are ignored. Safe to call more than once.
    pub fn shutdown(&self) {
        self.stop_session();

        let worker = {
            let mut inner = self.lock();
            if let Some(commands) = inner.commands.take() {
                let _ = commands.send(Command::Shutdown);
            }
            inner.worker.take()
        };

        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("Tracking worker panicked");
            } else {
                debug!("Tracking worker joined");
            }
        }
    }
}

impl Drop for TrackingController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(commands: Receiver<Command>, pipeline: Arc<dyn LogPipeline>) {
    debug!("Tracking worker running");
    while let Ok(command) = commands.recv() {
        match command {
            Command::Start(id) => {
                debug!(session = id, "Starting log pipeline");
                pipeline.start();
            }
            Command::Stop(id) => {
                debug!(session = id, "Stopping log pipeline");
                pipeline.stop();
            }
            Command::Shutdown => break,
        }
    }
    debug!("Tracking worker exiting");
}
