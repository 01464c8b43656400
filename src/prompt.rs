//! Restart prompts
//!
//! There is no windowing toolkit here, so the blocking acknowledgement is a
//! line on the controlling terminal. Without a terminal the message is only
//! logged.

use std::io::{self, BufRead, IsTerminal, Write};
use tracing::warn;

use crate::config::PromptMode;
use crate::coordinator::RestartPrompt;

/// Waits for Enter on the terminal
pub struct TerminalPrompt;

impl RestartPrompt for TerminalPrompt {
    fn show(&self, message: &str) {
        warn!(message = %message, "Restart required");
        if !io::stdin().is_terminal() {
            return;
        }

        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\n{message}\nPress Enter to continue... ");
        let _ = stderr.flush();
        drop(stderr);

        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            warn!(error = %e, "Failed to read acknowledgement");
        }
    }
}

/// Non-interactive: log and continue
pub struct LogPrompt;

impl RestartPrompt for LogPrompt {
    fn show(&self, message: &str) {
        warn!(message = %message, "Restart required");
    }
}

pub fn for_mode(mode: PromptMode) -> Box<dyn RestartPrompt> {
    match mode {
        PromptMode::Terminal => Box::new(TerminalPrompt),
        PromptMode::Log => Box::new(LogPrompt),
    }
}
