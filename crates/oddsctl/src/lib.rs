#![forbid(unsafe_code)]

//! Command-line front end for the odds controller.
//!
//! - [`cli`]: argument parsing and help text
//! - [`config`]: defaults, config file and environment layering
//! - [`logging`]: `tracing` subscriber setup
//! - [`input_hook`]: crossterm key hook feeding the command channel

pub mod cli;
pub mod config;
pub mod input_hook;
pub mod logging;

pub use cli::{CliAction, HELP_TEXT, VERSION, load};
pub use config::{Config, ConfigError};
pub use input_hook::{KeyTranslator, TerminalHook};
pub use logging::{CrlfWriter, init_logging};
