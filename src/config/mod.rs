//! Configuration for hearthwatch
//!
//! - **settings**: JSON settings file plus environment overrides
//! - **cli**: command-line flags layered on top

pub mod cli;
pub mod settings;

pub use cli::Cli;
pub use settings::{PromptMode, Settings};
