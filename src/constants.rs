//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Target client identification
pub mod hearthstone {
    /// Display name the client reports in the process list
    pub const APPLICATION_NAME: &str = "Hearthstone";

    /// Executable inside the install directory
    pub const EXECUTABLE: &str = "Hearthstone.exe";

    /// Subdirectory of the install directory holding per-zone log files
    pub const LOGS_DIR: &str = "Logs";

    /// Extension of per-zone log files
    pub const LOG_EXTENSION: &str = "log";

    /// Message shown when the client must be relaunched to pick up new zones
    pub const RESTART_MESSAGE: &str = "You must restart Hearthstone for logs to be used";
}

/// Logging configuration file format (log.config)
pub mod log_config {
    /// Line that marks a zone section as writing to its log file
    pub const FILE_PRINTING_ENABLED: &str = "FilePrinting=true";

    /// Body lines appended after the `[Zone]` header of a new section
    pub const SECTION_BODY: [&str; 4] = [
        "LogLevel=1",
        FILE_PRINTING_ENABLED,
        "ConsolePrinting=false",
        "ScreenPrinting=false",
    ];

    /// Suffix appended to the scratch file used for atomic rewrites
    pub const TEMP_SUFFIX: &str = ".tmp";
}

/// Wine prefix layout
pub mod wine {
    /// Default prefix relative to the home directory
    pub const DEFAULT_PREFIX: &str = ".wine";

    /// Windows system drive inside a prefix
    pub const DRIVE_C: &str = "drive_c";

    /// Install locations probed (relative to drive_c)
    pub const INSTALL_CANDIDATES: [&str; 2] = [
        "Program Files (x86)/Hearthstone",
        "Program Files/Hearthstone",
    ];

    /// Preference directory of the client (relative to the user profile)
    pub const PREFERENCES_DIR: &str = "AppData/Local/Blizzard/Hearthstone";

    /// Log configuration file name inside the preference directory
    pub const LOG_CONFIG_FILENAME: &str = "log.config";

    /// Profile name used when $USER is not set
    pub const FALLBACK_USER: &str = "user";
}

/// Linux procfs layout
pub mod procfs {
    /// Root of the process filesystem
    pub const ROOT: &str = "/proc";

    /// Per-process command line (NUL separated)
    pub const CMDLINE: &str = "cmdline";

    /// Per-process short command name
    pub const COMM: &str = "comm";

    /// Windows executable suffix stripped from display names
    pub const EXE_SUFFIX: &str = ".exe";
}

/// Configuration file paths
pub mod config {
    /// Directory under the XDG config dir
    pub const APP_DIR: &str = "hearthwatch";

    /// Settings file name
    pub const FILENAME: &str = "config.json";
}

/// Environment variables consulted at startup
pub mod env {
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const TARGET: &str = "HEARTHWATCH_TARGET";
    pub const LOG_CONFIG: &str = "HEARTHWATCH_LOG_CONFIG";
    pub const LOG_DIR: &str = "HEARTHWATCH_LOG_DIR";
    pub const WINE_PREFIX: &str = "WINEPREFIX";
    pub const USER: &str = "USER";
}

/// Thread names and timing
pub mod runtime {
    use std::time::Duration;

    /// Name of the dedicated log pipeline worker
    pub const TRACKING_THREAD: &str = "hearthwatch-readers";

    /// Name of the X11 notification adapter thread
    pub const X11_THREAD: &str = "hearthwatch-x11";

    /// Name of the window geometry helper thread
    pub const GEOMETRY_THREAD: &str = "hearthwatch-geometry";

    /// How long the main loop waits for a notification before checking for shutdown
    pub const MAIN_LOOP_TICK: Duration = Duration::from_millis(250);

    /// Poll interval while a zone log file does not exist yet
    pub const LOG_WAIT_INTERVAL: Duration = Duration::from_secs(1);

    /// Poll interval for appended log lines
    pub const LOG_POLL_INTERVAL: Duration = Duration::from_millis(100);
}

/// X11 protocol constants
pub mod x11 {
    /// Size of a CARDINAL/WINDOW property value in bytes
    pub const CARDINAL_SIZE: usize = 4;

    /// Maximum property length requested for string properties (in 32-bit units)
    pub const MAX_STRING_PROPERTY: u32 = 1024;
}
