//! X11 desktop adapter
//!
//! Watches EWMH properties on the root window and turns them into typed
//! [`Notification`]s:
//! - `_NET_CLIENT_LIST`: an application's first window appearing is a launch,
//!   its last window disappearing is a termination
//! - `_NET_ACTIVE_WINDOW`: focus moving between applications is a
//!   deactivation followed by an activation
//! - `_NET_CURRENT_DESKTOP`: virtual desktop switch
//!
//! Windows are attributed to applications through `_NET_WM_PID` and the
//! process list, falling back to the `WM_CLASS` class name.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::constants::runtime::{GEOMETRY_THREAD, X11_THREAD};
use crate::constants::x11::{CARDINAL_SIZE, MAX_STRING_PROPERTY};
use crate::coordinator::WindowGeometry;
use crate::process::{AppInfo, Notification, ProcfsProcessList};

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_client_list: Atom,
    pub net_active_window: Atom,
    pub net_current_desktop: Atom,
    pub net_wm_pid: Atom,
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .context(format!("Failed to intern {} atom", name))?
        .reply()
        .context(format!("Failed to get reply for {} atom", name))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        Ok(Self {
            net_client_list: intern(conn, "_NET_CLIENT_LIST")?,
            net_active_window: intern(conn, "_NET_ACTIVE_WINDOW")?,
            net_current_desktop: intern(conn, "_NET_CURRENT_DESKTOP")?,
            net_wm_pid: intern(conn, "_NET_WM_PID")?,
        })
    }
}

/// Managed client windows, as listed in `_NET_CLIENT_LIST`
fn client_windows(conn: &RustConnection, root: Window, atoms: &CachedAtoms) -> Result<Vec<Window>> {
    let prop = conn
        .get_property(false, root, atoms.net_client_list, AtomEnum::WINDOW, 0, u32::MAX)
        .context("Failed to query _NET_CLIENT_LIST property")?
        .reply()
        .context("Failed to get window list from X11 server")?;
    Ok(prop.value32().map(|v| v.collect()).unwrap_or_default())
}

fn first_cardinal(conn: &RustConnection, window: Window, property: Atom, type_: AtomEnum) -> Result<Option<u32>> {
    let prop = conn
        .get_property(false, window, property, type_, 0, 1)
        .context(format!("Failed to query property {} on window {}", property, window))?
        .reply()
        .context(format!("Failed to get property {} reply for window {}", property, window))?;
    if prop.value.len() < CARDINAL_SIZE {
        return Ok(None);
    }
    Ok(prop.value32().and_then(|mut v| v.next()))
}

/// Focused client window; `None` when nothing (or the root) is active
fn active_window(conn: &RustConnection, root: Window, atoms: &CachedAtoms) -> Result<Option<Window>> {
    Ok(first_cardinal(conn, root, atoms.net_active_window, AtomEnum::WINDOW)?
        .filter(|w| *w != x11rb::NONE && *w != root))
}

/// Class part of `WM_CLASS` ("instance\0class\0")
fn wm_class(conn: &RustConnection, window: Window) -> Result<Option<String>> {
    let prop = conn
        .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, MAX_STRING_PROPERTY)
        .context(format!("Failed to query WM_CLASS for window {}", window))?
        .reply()
        .context(format!("Failed to get WM_CLASS reply for window {}", window))?;
    Ok(prop
        .value
        .split(|b| *b == 0)
        .nth(1)
        .filter(|class| !class.is_empty())
        .map(|class| String::from_utf8_lossy(class).into_owned()))
}

/// Work out which application owns `window`
fn resolve_app(
    conn: &RustConnection,
    atoms: &CachedAtoms,
    processes: &ProcfsProcessList,
    window: Window,
) -> Result<Option<AppInfo>> {
    if let Some(pid) = first_cardinal(conn, window, atoms.net_wm_pid, AtomEnum::CARDINAL)?
        && let Some(display_name) = processes.display_name(pid)
    {
        return Ok(Some(AppInfo {
            display_name,
            pid: Some(pid),
        }));
    }
    Ok(wm_class(conn, window)?.map(AppInfo::new))
}

/// Converts desktop snapshots into notifications
///
/// Kept free of X11 calls; window owners are resolved through a callback.
#[derive(Debug, Default)]
pub struct DesktopTracker {
    windows: HashMap<Window, Option<AppInfo>>,
    app_windows: HashMap<String, usize>,
    active: Option<AppInfo>,
    desktop: Option<u32>,
}

impl DesktopTracker {
    /// Record the initial desktop without emitting anything
    ///
    /// Applications already running at startup are found through the process
    /// list, not reported as launches.
    pub fn prime(
        &mut self,
        windows: &[Window],
        active: Option<Window>,
        desktop: Option<u32>,
        mut resolve: impl FnMut(Window) -> Option<AppInfo>,
    ) {
        let _ = self.update_clients(windows, &mut resolve);
        self.active = active.and_then(|w| self.owner(w, &mut resolve));
        self.desktop = desktop;
    }

    fn owner(&self, window: Window, resolve: &mut impl FnMut(Window) -> Option<AppInfo>) -> Option<AppInfo> {
        match self.windows.get(&window) {
            Some(app) => app.clone(),
            None => resolve(window),
        }
    }

    /// Diff a new `_NET_CLIENT_LIST` against the known windows
    pub fn update_clients(
        &mut self,
        windows: &[Window],
        mut resolve: impl FnMut(Window) -> Option<AppInfo>,
    ) -> Vec<Notification> {
        let mut notifications = Vec::new();
        let current: HashSet<Window> = windows.iter().copied().collect();

        let removed: Vec<Window> = self
            .windows
            .keys()
            .filter(|w| !current.contains(w))
            .copied()
            .collect();
        for window in removed {
            let Some(Some(app)) = self.windows.remove(&window) else {
                continue;
            };
            if let Some(count) = self.app_windows.get_mut(&app.display_name) {
                *count -= 1;
                if *count == 0 {
                    self.app_windows.remove(&app.display_name);
                    notifications.push(Notification::Terminated(Some(app)));
                }
            }
        }

        for &window in windows {
            if self.windows.contains_key(&window) {
                continue;
            }
            let app = resolve(window);
            match &app {
                Some(app) => {
                    let count = self.app_windows.entry(app.display_name.clone()).or_insert(0);
                    *count += 1;
                    if *count == 1 {
                        notifications.push(Notification::Launched(Some(app.clone())));
                    }
                }
                None => trace!(window, "Window owner unknown"),
            }
            self.windows.insert(window, app);
        }

        notifications
    }

    /// Handle a new `_NET_ACTIVE_WINDOW` value
    pub fn update_active(
        &mut self,
        window: Option<Window>,
        mut resolve: impl FnMut(Window) -> Option<AppInfo>,
    ) -> Vec<Notification> {
        let app = window.and_then(|w| self.owner(w, &mut resolve));
        let same = app.as_ref().map(|a| &a.display_name) == self.active.as_ref().map(|a| &a.display_name);
        if same {
            return Vec::new();
        }

        let mut notifications = Vec::new();
        if let Some(previous) = self.active.take() {
            notifications.push(Notification::Deactivated(Some(previous)));
        }
        if window.is_some() {
            notifications.push(Notification::Activated(app.clone()));
        }
        self.active = app;
        notifications
    }

    /// Handle a new `_NET_CURRENT_DESKTOP` value
    pub fn update_desktop(&mut self, desktop: Option<u32>) -> Vec<Notification> {
        if desktop == self.desktop {
            return Vec::new();
        }
        self.desktop = desktop;
        vec![Notification::SpaceChanged]
    }
}

/// Root-window listener feeding notifications to the main loop
pub struct X11Notifier {
    conn: RustConnection,
    root: Window,
    atoms: CachedAtoms,
    processes: ProcfsProcessList,
    tracker: DesktopTracker,
}

impl X11Notifier {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .context("Failed to connect to X11 server. Is DISPLAY set correctly?")?;
        let root = conn.setup().roots[screen_num].root;
        info!(screen = screen_num, "Connected to X11 server");

        let atoms = CachedAtoms::new(&conn).context("Failed to cache X11 atoms at startup")?;
        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )
        .context("Failed to set event mask on root window")?;
        conn.flush().context("Failed to flush X11 connection")?;

        let mut notifier = Self {
            conn,
            root,
            atoms,
            processes: ProcfsProcessList::new(),
            tracker: DesktopTracker::default(),
        };

        let windows = client_windows(&notifier.conn, root, &notifier.atoms)?;
        let active = active_window(&notifier.conn, root, &notifier.atoms)?;
        let desktop = first_cardinal(&notifier.conn, root, notifier.atoms.net_current_desktop, AtomEnum::CARDINAL)?;
        let Self { conn, atoms, processes, tracker, .. } = &mut notifier;
        tracker.prime(&windows, active, desktop, |w| resolve_or_log(conn, atoms, processes, w));
        debug!(windows = windows.len(), "Initial desktop state recorded");

        Ok(notifier)
    }

    /// Translate one X11 event
    fn translate(&mut self, event: &Event) -> Result<Vec<Notification>> {
        let Event::PropertyNotify(event) = event else {
            return Ok(Vec::new());
        };
        if event.window != self.root {
            return Ok(Vec::new());
        }

        let Self { conn, root, atoms, processes, tracker } = self;
        let resolve = |w| resolve_or_log(conn, atoms, processes, w);

        if event.atom == atoms.net_client_list {
            let windows = client_windows(conn, *root, atoms)?;
            Ok(tracker.update_clients(&windows, resolve))
        } else if event.atom == atoms.net_active_window {
            let active = active_window(conn, *root, atoms)?;
            Ok(tracker.update_active(active, resolve))
        } else if event.atom == atoms.net_current_desktop {
            let desktop = first_cardinal(conn, *root, atoms.net_current_desktop, AtomEnum::CARDINAL)?;
            Ok(tracker.update_desktop(desktop))
        } else {
            Ok(Vec::new())
        }
    }

    /// Run the event loop on its own thread until the receiver goes away
    pub fn spawn(self, notifications: Sender<Notification>) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(X11_THREAD.to_string())
            .spawn(move || {
                if let Err(e) = self.run(&notifications) {
                    error!(error = ?e, "X11 notification thread crashed");
                }
            })
            .context("Failed to spawn X11 notification thread")
    }

    fn run(mut self, notifications: &Sender<Notification>) -> Result<()> {
        loop {
            let event = self.conn.wait_for_event()
                .context("Failed to wait for X11 event")?;
            let translated = match self.translate(&event) {
                Ok(translated) => translated,
                Err(e) => {
                    // Windows can vanish between the notify and our queries
                    debug!(error = ?e, "Failed to translate X11 event");
                    continue;
                }
            };
            for notification in translated {
                trace!(notification = ?notification, "Desktop notification");
                if notifications.send(notification).is_err() {
                    debug!("Notification receiver closed, stopping X11 listener");
                    return Ok(());
                }
            }
        }
    }
}

fn resolve_or_log(
    conn: &RustConnection,
    atoms: &CachedAtoms,
    processes: &ProcfsProcessList,
    window: Window,
) -> Option<AppInfo> {
    resolve_app(conn, atoms, processes, window)
        .inspect_err(|e| debug!(window, error = ?e, "Failed to resolve window owner"))
        .ok()
        .flatten()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

/// Window geometry of the target, refreshed on a helper thread
pub struct X11Geometry {
    requests: Sender<()>,
    rect: Arc<Mutex<Option<WindowRect>>>,
}

impl X11Geometry {
    /// Spawn the helper; it connects to X11 lazily so startup never waits on it
    pub fn spawn(target: String) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let rect = Arc::new(Mutex::new(None));
        let shared = Arc::clone(&rect);
        thread::Builder::new()
            .name(GEOMETRY_THREAD.to_string())
            .spawn(move || run_geometry(&target, &rx, &shared))
            .context("Failed to spawn window geometry thread")?;
        Ok(Self { requests: tx, rect })
    }

    pub fn current(&self) -> Option<WindowRect> {
        *self.rect.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WindowGeometry for X11Geometry {
    fn reload(&self) {
        if self.requests.send(()).is_err() {
            trace!("Window geometry helper is gone");
        }
    }
}

fn run_geometry(target: &str, requests: &Receiver<()>, rect: &Mutex<Option<WindowRect>>) {
    let mut connection: Option<(RustConnection, Window, CachedAtoms)> = None;
    let processes = ProcfsProcessList::new();

    while requests.recv().is_ok() {
        // Coalesce bursts of reload hints
        while requests.try_recv().is_ok() {}

        if connection.is_none() {
            match connect_geometry() {
                Ok(conn) => connection = Some(conn),
                Err(e) => {
                    warn!(error = ?e, "Window geometry unavailable");
                    continue;
                }
            }
        }
        let Some((conn, root, atoms)) = connection.as_ref() else {
            continue;
        };

        match find_target_rect(conn, *root, atoms, &processes, target) {
            Ok(found) => {
                debug!(rect = ?found, "Window geometry reloaded");
                *rect.lock().unwrap_or_else(PoisonError::into_inner) = found;
            }
            Err(e) => {
                warn!(error = ?e, "Failed to reload window geometry");
                connection = None;
            }
        }
    }
}

fn connect_geometry() -> Result<(RustConnection, Window, CachedAtoms)> {
    let (conn, screen_num) = x11rb::connect(None)
        .context("Failed to connect to X11 server for window geometry")?;
    let root = conn.setup().roots[screen_num].root;
    let atoms = CachedAtoms::new(&conn)?;
    Ok((conn, root, atoms))
}

fn find_target_rect(
    conn: &RustConnection,
    root: Window,
    atoms: &CachedAtoms,
    processes: &ProcfsProcessList,
    target: &str,
) -> Result<Option<WindowRect>> {
    for window in client_windows(conn, root, atoms)? {
        let owned = resolve_app(conn, atoms, processes, window)?
            .is_some_and(|app| app.display_name == target);
        if !owned {
            continue;
        }

        let geom = conn.get_geometry(window)
            .context(format!("Failed to query geometry of window {}", window))?
            .reply()
            .context(format!("Failed to get geometry reply for window {}", window))?;
        let origin = conn.translate_coordinates(window, root, 0, 0)
            .context(format!("Failed to translate coordinates of window {}", window))?
            .reply()
            .context(format!("Failed to get coordinates reply for window {}", window))?;
        return Ok(Some(WindowRect {
            x: origin.dst_x,
            y: origin.dst_y,
            width: geom.width,
            height: geom.height,
        }));
    }
    Ok(None)
}
