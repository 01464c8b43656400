//! Install, preference and log locations of the client inside a Wine prefix

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::hearthstone::{EXECUTABLE, LOGS_DIR};
use crate::constants::wine::{
    DEFAULT_PREFIX, DRIVE_C, FALLBACK_USER, INSTALL_CANDIDATES, LOG_CONFIG_FILENAME, PREFERENCES_DIR,
};

/// `~/.wine`, or `./.wine` when the home directory is unknown
pub fn default_wine_prefix() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_PREFIX)
}

/// True if `dir` contains the client executable
pub fn validate_install_dir(dir: &Path) -> bool {
    dir.join(EXECUTABLE).is_file()
}

/// First well-known install location in the prefix that holds the client
pub fn find_install_dir(wine_prefix: &Path) -> Option<PathBuf> {
    let drive_c = wine_prefix.join(DRIVE_C);
    let found = INSTALL_CANDIDATES
        .iter()
        .map(|candidate| drive_c.join(candidate))
        .find(|dir| validate_install_dir(dir));
    debug!(prefix = %wine_prefix.display(), found = ?found, "Searched for client install");
    found
}

/// `drive_c/users/<user>/AppData/Local/Blizzard/Hearthstone/log.config`
pub fn default_log_config_path(wine_prefix: &Path, user: Option<&str>) -> PathBuf {
    let user = user.filter(|u| !u.is_empty()).unwrap_or(FALLBACK_USER);
    wine_prefix
        .join(DRIVE_C)
        .join("users")
        .join(user)
        .join(PREFERENCES_DIR)
        .join(LOG_CONFIG_FILENAME)
}

/// Where the client writes per-zone logs when installed in `install_dir`
pub fn default_log_dir(install_dir: &Path) -> PathBuf {
    install_dir.join(LOGS_DIR)
}

/// Log directory of the first install candidate, used when nothing is installed yet
pub fn fallback_log_dir(wine_prefix: &Path) -> PathBuf {
    default_log_dir(&wine_prefix.join(DRIVE_C).join(INSTALL_CANDIDATES[0]))
}
