//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "hearthwatch",
    version,
    about = "Keeps Hearthstone's log zones enabled and tails them while the client runs"
)]
pub struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/hearthwatch/config.json)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Process display name of the client
    #[arg(long, value_name = "NAME")]
    pub target: Option<String>,

    /// Path of the client's log.config
    #[arg(long, value_name = "FILE")]
    pub log_config: Option<PathBuf>,

    /// Directory holding the per-zone log files
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log the restart notice instead of waiting for acknowledgement
    #[arg(long)]
    pub no_prompt: bool,

    /// Reconcile log.config and exit
    #[arg(long)]
    pub check: bool,

    /// Debug logging (overrides LOG_LEVEL)
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["hearthwatch"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.check);
        assert!(!cli.no_prompt);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_check_mode_with_paths() {
        let cli = Cli::try_parse_from(["hearthwatch", "--check", "-v", "--log-dir", "/hs/Logs"]).unwrap();
        assert!(cli.check);
        assert!(cli.verbose);
        assert_eq!(cli.log_dir, Some(PathBuf::from("/hs/Logs")));
    }

    #[test]
    fn test_rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["hearthwatch", "--frobnicate"]).is_err());
    }
}
