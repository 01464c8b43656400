//! Process list backed by `/proc`
//!
//! Wine processes carry their Windows path in argv[0]
//! (`C:\Program Files (x86)\Hearthstone\Hearthstone.exe`), so the display name
//! is the last path component with any `.exe` suffix stripped.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{AppInfo, ProcessList};
use crate::constants::procfs::{CMDLINE, COMM, EXE_SUFFIX, ROOT};

pub struct ProcfsProcessList {
    root: PathBuf,
}

impl ProcfsProcessList {
    pub fn new() -> Self {
        Self::with_root(ROOT)
    }

    /// Read processes from an alternative procfs mount
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Display name of a single process, if it is still alive
    pub fn display_name(&self, pid: u32) -> Option<String> {
        read_display_name(&self.root.join(pid.to_string()))
    }
}

impl Default for ProcfsProcessList {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessList for ProcfsProcessList {
    fn running_applications(&self) -> Result<Vec<AppInfo>> {
        let entries = fs::read_dir(&self.root)
            .context(format!("Failed to list processes in {}", self.root.display()))?;

        let mut apps = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            // Processes can exit between read_dir and the reads below
            if let Some(display_name) = read_display_name(&entry.path()) {
                apps.push(AppInfo {
                    display_name,
                    pid: Some(pid),
                });
            }
        }
        Ok(apps)
    }
}

fn read_display_name(dir: &Path) -> Option<String> {
    if let Ok(cmdline) = fs::read(dir.join(CMDLINE))
        && let Some(name) = display_name_from_cmdline(&cmdline)
    {
        return Some(name);
    }

    // Kernel threads have an empty cmdline
    let comm = fs::read_to_string(dir.join(COMM)).ok()?;
    let name = strip_exe_suffix(comm.trim_end());
    (!name.is_empty()).then(|| name.to_string())
}

/// Derive a display name from a raw NUL-separated `/proc/<pid>/cmdline`
pub fn display_name_from_cmdline(cmdline: &[u8]) -> Option<String> {
    let argv0 = cmdline.split(|b| *b == 0).next()?;
    if argv0.is_empty() {
        return None;
    }
    let argv0 = String::from_utf8_lossy(argv0);
    let file = argv0.rsplit(['/', '\\']).next()?;
    let name = strip_exe_suffix(file);
    (!name.is_empty()).then(|| name.to_string())
}

fn strip_exe_suffix(name: &str) -> &str {
    match name.len().checked_sub(EXE_SUFFIX.len()) {
        Some(split)
            if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(EXE_SUFFIX) =>
        {
            &name[..split]
        }
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_from_wine_cmdline() {
        let cmdline = b"C:\\Program Files (x86)\\Hearthstone\\Hearthstone.exe\0-launch\0";
        assert_eq!(display_name_from_cmdline(cmdline).as_deref(), Some("Hearthstone"));
    }

    #[test]
    fn test_display_name_from_unix_cmdline() {
        assert_eq!(display_name_from_cmdline(b"/usr/bin/firefox\0--new-window\0").as_deref(), Some("firefox"));
        assert_eq!(display_name_from_cmdline(b"bash\0").as_deref(), Some("bash"));
    }

    #[test]
    fn test_display_name_suffix_case_insensitive() {
        assert_eq!(display_name_from_cmdline(b"Z:\\games\\Hearthstone.EXE\0").as_deref(), Some("Hearthstone"));
    }

    #[test]
    fn test_display_name_rejects_empty() {
        assert_eq!(display_name_from_cmdline(b""), None);
        assert_eq!(display_name_from_cmdline(b"\0\0"), None);
        assert_eq!(display_name_from_cmdline(b"/opt/game/\0"), None);
    }

    #[test]
    fn test_running_applications_reads_fixture() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        fs::create_dir(root.join("100")).unwrap();
        fs::write(root.join("100/cmdline"), b"C:\\Hearthstone\\Hearthstone.exe\0").unwrap();

        // Kernel thread: empty cmdline, name from comm
        fs::create_dir(root.join("2")).unwrap();
        fs::write(root.join("2/cmdline"), b"").unwrap();
        fs::write(root.join("2/comm"), "kthreadd\n").unwrap();

        // Non-process entries are skipped
        fs::create_dir(root.join("self")).unwrap();
        fs::write(root.join("uptime"), "1.0 1.0").unwrap();

        let list = ProcfsProcessList::with_root(root);
        let mut apps = list.running_applications().unwrap();
        apps.sort_by_key(|a| a.pid);

        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].display_name, "kthreadd");
        assert_eq!(apps[0].pid, Some(2));
        assert_eq!(apps[1].display_name, "Hearthstone");
        assert_eq!(list.display_name(100).as_deref(), Some("Hearthstone"));
        assert_eq!(list.display_name(999), None);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let list = ProcfsProcessList::with_root("/nonexistent/proc/root");
        assert!(list.running_applications().is_err());
    }
}
