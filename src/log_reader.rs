//! Per-zone log file tailing
//!
//! With `FilePrinting=true` the client writes each zone to `<log_dir>/<Zone>.log`.
//! One reader thread per zone forwards complete lines to a callback; what the
//! lines mean is up to the consumer.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::constants::hearthstone::LOG_EXTENSION;
use crate::constants::runtime::{LOG_POLL_INTERVAL, LOG_WAIT_INTERVAL};
use crate::log_config::LogZone;
use crate::tracking::LogPipeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub zone: LogZone,
    pub text: String,
}

/// Callback invoked from reader threads for every complete line
pub type OnLineFn = Box<dyn Fn(LogLine) + Send + Sync + 'static>;

struct Readers {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

pub struct LogReaderManager {
    log_dir: PathBuf,
    zones: Vec<LogZone>,
    on_line: Arc<OnLineFn>,
    readers: Mutex<Option<Readers>>,
}

impl LogReaderManager {
    pub fn new(log_dir: PathBuf, zones: Vec<LogZone>, on_line: OnLineFn) -> Self {
        Self {
            log_dir,
            zones,
            on_line: Arc::new(on_line),
            readers: Mutex::new(None),
        }
    }

    pub fn log_path(&self, zone: LogZone) -> PathBuf {
        self.log_dir.join(zone.as_str()).with_extension(LOG_EXTENSION)
    }

    pub fn is_running(&self) -> bool {
        self.readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl LogPipeline for LogReaderManager {
    fn start(&self) {
        let mut readers = self.readers.lock().unwrap_or_else(PoisonError::into_inner);
        if readers.is_some() {
            debug!("Log readers already running");
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(self.zones.len());
        for &zone in &self.zones {
            let path = self.log_path(zone);
            // A file present now holds an earlier session; one that appears later is all new
            let from_start = !path.exists();
            let stop = Arc::clone(&stop);
            let on_line = Arc::clone(&self.on_line);
            let spawned = thread::Builder::new()
                .name(format!("log-{zone}"))
                .spawn(move || tail_zone(zone, &path, from_start, &stop, on_line.as_ref()));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!(zone = %zone, error = %e, "Failed to spawn log reader"),
            }
        }

        info!(
            log_dir = %self.log_dir.display(),
            readers = handles.len(),
            "Log readers started"
        );
        *readers = Some(Readers { stop, handles });
    }

    fn stop(&self) {
        let Some(readers) = self
            .readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        readers.stop.store(true, Ordering::Release);
        for handle in readers.handles {
            if handle.join().is_err() {
                error!("Log reader thread panicked");
            }
        }
        info!("Log readers stopped");
    }
}

/// Sleep for `duration` in poll-sized steps; returns false once stop is raised
fn sleep_unless_stopped(stop: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(LOG_POLL_INTERVAL.min(deadline - now));
    }
}

fn tail_zone(zone: LogZone, path: &Path, from_start: bool, stop: &AtomicBool, on_line: &OnLineFn) {
    let file = loop {
        match File::open(path) {
            Ok(file) => break file,
            Err(_) => {
                if !sleep_unless_stopped(stop, LOG_WAIT_INTERVAL) {
                    return;
                }
            }
        }
    };

    let mut reader = BufReader::new(file);
    if !from_start && let Err(e) = reader.seek(SeekFrom::End(0)) {
        warn!(zone = %zone, error = %e, "Failed to seek to end of log file");
    }
    debug!(zone = %zone, path = %path.display(), from_start, "Tailing log file");

    let mut pending = Vec::new();
    loop {
        if let Err(e) = rewind_if_truncated(&mut reader, &mut pending) {
            warn!(zone = %zone, error = %e, "Failed to check log file size");
        }
        match read_new_lines(&mut reader, &mut pending) {
            Ok(lines) => {
                for text in lines {
                    on_line(LogLine { zone, text });
                }
            }
            Err(e) => warn!(zone = %zone, error = %e, "Error reading log file"),
        }
        if !sleep_unless_stopped(stop, LOG_POLL_INTERVAL) {
            break;
        }
    }
    debug!(zone = %zone, "Log reader finished");
}

/// The client truncates zone logs on relaunch; start over when the file shrinks
fn rewind_if_truncated(reader: &mut BufReader<File>, pending: &mut Vec<u8>) -> io::Result<()> {
    let len = reader.get_ref().metadata()?.len();
    if len < reader.stream_position()? {
        reader.seek(SeekFrom::Start(0))?;
        pending.clear();
    }
    Ok(())
}

/// Read every complete line available; a trailing partial line stays in `pending`
///
/// Works on bytes so a write that ends inside a multi-byte character is
/// completed on the next poll. Lines are decoded once complete.
fn read_new_lines<R: BufRead>(reader: &mut R, pending: &mut Vec<u8>) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        if reader.read_until(b'\n', pending)? == 0 || pending.last() != Some(&b'\n') {
            break;
        }
        let text = String::from_utf8_lossy(pending);
        let text = text.trim_end_matches(['\r', '\n']);
        if !text.is_empty() {
            lines.push(text.to_string());
        }
        pending.clear();
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::sync::mpsc;

    fn collecting_manager(dir: &Path, zones: Vec<LogZone>) -> (LogReaderManager, mpsc::Receiver<LogLine>) {
        let (tx, rx) = mpsc::channel();
        let manager = LogReaderManager::new(
            dir.to_path_buf(),
            zones,
            Box::new(move |line| {
                let _ = tx.send(line);
            }),
        );
        (manager, rx)
    }

    fn append(path: &Path, text: &str) {
        append_bytes(path, text.as_bytes());
    }

    fn append_bytes(path: &Path, bytes: &[u8]) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn test_read_new_lines_keeps_partial_line() {
        let mut reader = Cursor::new(b"first\r\n\nsecond\nthi".to_vec());
        let mut pending = Vec::new();

        let lines = read_new_lines(&mut reader, &mut pending).unwrap();
        assert_eq!(lines, vec!["first", "second"]);
        assert_eq!(pending, b"thi");
    }

    #[test]
    fn test_line_split_inside_multibyte_character() {
        let mut data = b"Carte \xC3".to_vec();
        let mut reader = Cursor::new(data.clone());
        let mut pending = Vec::new();

        assert!(read_new_lines(&mut reader, &mut pending).unwrap().is_empty());
        assert_eq!(pending, b"Carte \xC3");

        // The writer finishes the character and the line
        let position = reader.position();
        data.extend_from_slice(b"\xA9 jou\xC3\xA9e\n");
        let mut reader = Cursor::new(data);
        reader.set_position(position);

        let lines = read_new_lines(&mut reader, &mut pending).unwrap();
        assert_eq!(lines, vec!["Carte \u{00E9} jou\u{00E9}e"]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_dropped() {
        let mut reader = Cursor::new(b"bad \xFF byte\nnext\n".to_vec());
        let mut pending = Vec::new();

        let lines = read_new_lines(&mut reader, &mut pending).unwrap();
        assert_eq!(lines, vec!["bad \u{FFFD} byte", "next"]);
    }

    #[test]
    fn test_log_path_per_zone() {
        let (manager, _rx) = collecting_manager(Path::new("/games/Hearthstone/Logs"), vec![]);
        assert_eq!(
            manager.log_path(LogZone::Power),
            PathBuf::from("/games/Hearthstone/Logs/Power.log")
        );
    }

    #[test]
    fn test_existing_content_skipped_new_lines_forwarded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Power.log");
        append(&path, "old line\n");

        let (manager, rx) = collecting_manager(tmp.path(), vec![LogZone::Power]);
        manager.start();
        assert!(manager.is_running());
        // Let the reader open the file and seek past the old content
        thread::sleep(Duration::from_millis(300));

        append(&path, "GameState.DebugPrintPower() - CREATE_GAME\n");
        let line = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(line.zone, LogZone::Power);
        assert_eq!(line.text, "GameState.DebugPrintPower() - CREATE_GAME");

        manager.stop();
        assert!(!manager.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_file_created_after_start_is_read_from_beginning() {
        let tmp = tempfile::tempdir().unwrap();
        let (manager, rx) = collecting_manager(tmp.path(), vec![LogZone::Net]);
        manager.start();

        append(&tmp.path().join("Net.log"), "ConnectAPI.GotoGameServer\n");
        let line = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(line.zone, LogZone::Net);
        assert_eq!(line.text, "ConnectAPI.GotoGameServer");

        manager.stop();
    }

    #[test]
    fn test_character_split_across_writes_is_forwarded_whole() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Power.log");
        let (manager, rx) = collecting_manager(tmp.path(), vec![LogZone::Power]);
        manager.start();

        append_bytes(&path, b"Carte \xC3");
        // Give the reader a poll that ends inside the character
        thread::sleep(Duration::from_millis(300));
        append_bytes(&path, b"\xA9 jou\xC3\xA9e\n");

        let line = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(line.text, "Carte \u{00E9} jou\u{00E9}e");
        manager.stop();
    }

    #[test]
    fn test_start_twice_and_stop_twice() {
        let tmp = tempfile::tempdir().unwrap();
        let (manager, _rx) = collecting_manager(tmp.path(), vec![LogZone::Arena, LogZone::Zone]);

        manager.start();
        manager.start();
        manager.stop();
        manager.stop();
        assert!(!manager.is_running());
    }
}
