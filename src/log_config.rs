//! Hearthstone `log.config` reconciliation
//!
//! The client only writes a zone's log file when that zone's section in
//! `log.config` contains `FilePrinting=true`. Reconciliation appends a section
//! for every required zone that is not satisfied and never edits existing
//! lines, so user additions survive and a satisfied file is never rewritten.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error, info, trace};

use crate::constants::log_config::{FILE_PRINTING_ENABLED, SECTION_BODY, TEMP_SUFFIX};

/// Diagnostic subsystems of the client that the log pipeline consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum LogZone {
    Achievements,
    Arena,
    Asset,
    Bob,
    LoadingScreen,
    Net,
    Power,
    Rachelle,
    Zone,
}

impl LogZone {
    /// Every zone known to this build, in section append order
    pub const ALL: [LogZone; 9] = [
        LogZone::Achievements,
        LogZone::Arena,
        LogZone::Asset,
        LogZone::Bob,
        LogZone::LoadingScreen,
        LogZone::Net,
        LogZone::Power,
        LogZone::Rachelle,
        LogZone::Zone,
    ];

    /// Section name as written in `log.config` (also the log file stem)
    pub fn as_str(self) -> &'static str {
        match self {
            LogZone::Achievements => "Achievements",
            LogZone::Arena => "Arena",
            LogZone::Asset => "Asset",
            LogZone::Bob => "Bob",
            LogZone::LoadingScreen => "LoadingScreen",
            LogZone::Net => "Net",
            LogZone::Power => "Power",
            LogZone::Rachelle => "Rachelle",
            LogZone::Zone => "Zone",
        }
    }
}

impl fmt::Display for LogZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogZone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        LogZone::ALL
            .into_iter()
            .find(|zone| zone.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown log zone '{}'", s))
    }
}

/// One `[Zone]` section parsed from the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneConfigBlock {
    pub zone: LogZone,
    pub file_printing_enabled: bool,
    /// Body lines following the header, in file order
    pub raw_lines: Vec<String>,
}

/// Outcome of comparing a file against the required zones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub missing_zones: BTreeSet<LogZone>,
    pub rewritten_content: String,
    pub changed: bool,
}

/// What `reconcile_file` did on disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub missing_zones: BTreeSet<LogZone>,
    /// True only if the rewritten file was persisted successfully
    pub written: bool,
}

/// Returns the section name if `line` is exactly `[<name>]`
fn section_name(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']')
}

/// Parse every known zone section in file order
///
/// Lines before the first header and sections with unknown names are skipped.
/// A zone may appear in several blocks. Lines are split with `str::lines`, so a
/// CRLF file matches the same way as an LF one.
pub fn parse_blocks(content: &str) -> Vec<ZoneConfigBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<ZoneConfigBlock> = None;

    for line in content.lines() {
        if let Some(name) = section_name(line) {
            blocks.extend(current.take());
            current = match name.parse::<LogZone>() {
                Ok(zone) => Some(ZoneConfigBlock {
                    zone,
                    file_printing_enabled: false,
                    raw_lines: Vec::new(),
                }),
                Err(_) => {
                    trace!(section = %name, "Ignoring unknown log.config section");
                    None
                }
            };
            continue;
        }

        if let Some(block) = current.as_mut() {
            if line == FILE_PRINTING_ENABLED {
                block.file_printing_enabled = true;
            }
            block.raw_lines.push(line.to_string());
        }
    }
    blocks.extend(current);

    blocks
}

/// Line terminator used by `content`; CRLF files keep CRLF when sections are appended
fn line_ending(content: &str) -> &'static str {
    match content.find('\n') {
        Some(i) if content[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

fn append_section(content: &mut String, zone: LogZone, eol: &str) {
    if !content.is_empty() && !content.ends_with('\n') {
        content.push_str(eol);
    }
    content.push('[');
    content.push_str(zone.as_str());
    content.push(']');
    content.push_str(eol);
    for line in SECTION_BODY {
        content.push_str(line);
        content.push_str(eol);
    }
}

/// Compare `existing` against `required` and append sections for unsatisfied zones
///
/// `None` means the file does not exist. When nothing is missing the content is
/// returned unchanged and `changed` is false.
pub fn reconcile(existing: Option<&str>, required: &[LogZone]) -> Reconciliation {
    let content = existing.unwrap_or_default();

    let satisfied: BTreeSet<LogZone> = parse_blocks(content)
        .into_iter()
        .filter(|block| block.file_printing_enabled)
        .map(|block| block.zone)
        .collect();

    let missing_zones: BTreeSet<LogZone> = required
        .iter()
        .copied()
        .filter(|zone| !satisfied.contains(zone))
        .collect();

    let eol = line_ending(content);
    let mut rewritten_content = content.to_string();
    for zone in &missing_zones {
        append_section(&mut rewritten_content, *zone, eol);
    }

    let changed = !missing_zones.is_empty();
    Reconciliation {
        missing_zones,
        rewritten_content,
        changed,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Write `contents` to a sibling temp file, then rename it over `path`
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {}", parent.display()))?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, contents)
        .context(format!("Failed to write temp file {}", tmp.display()))?;

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).context(format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

/// Reconcile the file at `path` in place
///
/// I/O failures are logged and never propagated. A file that exists but
/// cannot be read is left untouched.
pub fn reconcile_file(path: &Path, required: &[LogZone]) -> ReconcileOutcome {
    let existing = match fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "log.config does not exist yet");
            None
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read log.config, continuing without new zones");
            return ReconcileOutcome::default();
        }
    };

    let result = reconcile(existing.as_deref(), required);
    debug!(missing = ?result.missing_zones, "Missing zones");
    if !result.changed {
        return ReconcileOutcome::default();
    }

    let written = match write_atomic(path, &result.rewritten_content) {
        Ok(()) => {
            info!(
                path = %path.display(),
                added = result.missing_zones.len(),
                "Enabled missing log zones in log.config"
            );
            true
        }
        Err(e) => {
            error!(path = %path.display(), error = ?e, "Failed to write log.config, continuing without new zones");
            false
        }
    };

    ReconcileOutcome {
        missing_zones: result.missing_zones,
        written,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SATISFIED_NET: &str = "[Net]\nLogLevel=1\nFilePrinting=true\nConsolePrinting=false\nScreenPrinting=false\n";

    fn satisfied_zones(content: &str) -> BTreeSet<LogZone> {
        parse_blocks(content)
            .into_iter()
            .filter(|b| b.file_printing_enabled)
            .map(|b| b.zone)
            .collect()
    }

    #[test]
    fn test_empty_file_gets_all_required_sections() {
        let required = [LogZone::Net, LogZone::Power, LogZone::Arena];
        let result = reconcile(Some(""), &required);

        assert!(result.changed);
        assert_eq!(result.missing_zones.len(), 3);
        assert_eq!(result.rewritten_content.matches(FILE_PRINTING_ENABLED).count(), 3);
        for zone in required {
            assert!(result.rewritten_content.contains(&format!("[{zone}]\nLogLevel=1\nFilePrinting=true\n")));
        }
    }

    #[test]
    fn test_missing_file_same_as_empty() {
        let required = [LogZone::Power];
        let missing = reconcile(None, &required);
        let empty = reconcile(Some(""), &required);
        assert_eq!(missing, empty);
        assert_eq!(
            missing.rewritten_content,
            "[Power]\nLogLevel=1\nFilePrinting=true\nConsolePrinting=false\nScreenPrinting=false\n"
        );
    }

    #[test]
    fn test_satisfied_file_is_untouched() {
        let result = reconcile(Some(SATISFIED_NET), &[LogZone::Net]);
        assert!(!result.changed);
        assert!(result.missing_zones.is_empty());
        assert_eq!(result.rewritten_content, SATISFIED_NET);
    }

    #[test]
    fn test_disabled_section_counts_as_missing() {
        let content = "[Power]\nLogLevel=1\nFilePrinting=false\n";
        let result = reconcile(Some(content), &[LogZone::Power]);
        assert!(result.changed);
        assert_eq!(result.missing_zones, BTreeSet::from([LogZone::Power]));
        // Appended, not edited in place
        assert!(result.rewritten_content.starts_with(content));
        assert_eq!(satisfied_zones(&result.rewritten_content), BTreeSet::from([LogZone::Power]));
    }

    #[test]
    fn test_file_printing_match_is_exact() {
        for line in ["FilePrinting = true", " FilePrinting=true", "FilePrinting=True", "FilePrinting=true "] {
            let content = format!("[Net]\n{line}\n");
            let result = reconcile(Some(&content), &[LogZone::Net]);
            assert!(result.changed, "'{line}' must not satisfy the zone");
        }
    }

    #[test]
    fn test_unknown_sections_are_ignored() {
        let content = "[Foo]\nFilePrinting=true\n[Net]\nFilePrinting=true\n";
        let blocks = parse_blocks(content);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].zone, LogZone::Net);

        // FilePrinting under an unknown header must not leak into the next zone
        let content = "[Foo]\nFilePrinting=true\n[Power]\nLogLevel=1\n";
        assert!(satisfied_zones(content).is_empty());
    }

    #[test]
    fn test_lines_before_first_header_are_ignored() {
        let content = "FilePrinting=true\n[Arena]\nLogLevel=1\n";
        let result = reconcile(Some(content), &[LogZone::Arena]);
        assert!(result.changed);
    }

    #[test]
    fn test_parse_keeps_raw_lines() {
        let content = "[Power]\nLogLevel=1\nFilePrinting=true\nVerbose=true\n";
        let blocks = parse_blocks(content);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].file_printing_enabled);
        assert_eq!(blocks[0].raw_lines, vec!["LogLevel=1", "FilePrinting=true", "Verbose=true"]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let inputs: [Option<&str>; 5] = [
            None,
            Some(""),
            Some(SATISFIED_NET),
            Some("[Power]\nFilePrinting=false"),
            Some("; user comment\n[Bogus]\nx=y\n[Zone]\r\nFilePrinting=true\r\n"),
        ];
        for input in inputs {
            let first = reconcile(input, &LogZone::ALL);
            let second = reconcile(Some(&first.rewritten_content), &LogZone::ALL);
            assert!(!second.changed, "second pass changed input {input:?}");
            assert_eq!(second.rewritten_content, first.rewritten_content);
            assert_eq!(satisfied_zones(&first.rewritten_content), BTreeSet::from(LogZone::ALL));
        }
    }

    #[test]
    fn test_existing_bytes_preserved_without_trailing_newline() {
        let content = "[Net]\nLogLevel=1\nFilePrinting=true";
        let result = reconcile(Some(content), &[LogZone::Net, LogZone::Bob]);
        assert!(result.rewritten_content.starts_with(content));
        assert!(result.rewritten_content.contains("FilePrinting=true\n[Bob]\n"));
        assert_eq!(result.missing_zones, BTreeSet::from([LogZone::Bob]));
    }

    #[test]
    fn test_crlf_file_keeps_crlf_when_appending() {
        let content = "[Net]\r\nLogLevel=1\r\nFilePrinting=true\r\n";
        let result = reconcile(Some(content), &[LogZone::Net, LogZone::Power]);

        assert_eq!(result.missing_zones, BTreeSet::from([LogZone::Power]));
        assert_eq!(
            result.rewritten_content,
            format!("{content}[Power]\r\nLogLevel=1\r\nFilePrinting=true\r\nConsolePrinting=false\r\nScreenPrinting=false\r\n")
        );
        assert!(!result.rewritten_content.replace("\r\n", "").contains('\n'));
        assert!(!reconcile(Some(&result.rewritten_content), &[LogZone::Net, LogZone::Power]).changed);
    }

    #[test]
    fn test_crlf_file_without_trailing_newline() {
        let result = reconcile(Some("[Net]\r\nFilePrinting=false"), &[LogZone::Net]);
        assert!(result.rewritten_content.starts_with("[Net]\r\nFilePrinting=false\r\n[Net]\r\n"));
    }

    #[test]
    fn test_duplicate_required_zones_append_once() {
        let result = reconcile(None, &[LogZone::Net, LogZone::Net]);
        assert_eq!(result.rewritten_content.matches("[Net]").count(), 1);
    }

    #[test]
    fn test_zone_names_round_trip_through_from_str() {
        for zone in LogZone::ALL {
            assert_eq!(zone.as_str().parse::<LogZone>().ok(), Some(zone));
        }
        assert!("net".parse::<LogZone>().is_err());
    }

    #[test]
    fn test_reconcile_file_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Blizzard/Hearthstone/log.config");

        let outcome = reconcile_file(&path, &[LogZone::Power, LogZone::Net]);
        assert!(outcome.written);
        assert_eq!(outcome.missing_zones.len(), 2);

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(satisfied_zones(&written), BTreeSet::from([LogZone::Net, LogZone::Power]));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_reconcile_file_leaves_satisfied_file_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.config");
        fs::write(&path, SATISFIED_NET).unwrap();

        let outcome = reconcile_file(&path, &[LogZone::Net]);
        assert_eq!(outcome, ReconcileOutcome::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), SATISFIED_NET);
    }

    #[test]
    fn test_reconcile_file_unreadable_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file
        let outcome = reconcile_file(tmp.path(), &[LogZone::Net]);
        assert!(!outcome.written);
        assert!(outcome.missing_zones.is_empty());
    }

    #[test]
    fn test_write_atomic_replaces_existing_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.config");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!temp_path(&path).exists());
    }
}
