#![forbid(unsafe_code)]

//! Command-line argument parsing.
//!
//! Parses args manually (no external dependencies). Environment variables
//! with the `ODDSCTL_` prefix override defaults and the config file, and are
//! in turn overridden by explicit flags.

use std::path::PathBuf;

use crate::config::{Config, ConfigError, ENV_PREFIX, parse_positive};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
oddsctl: hotkey odds controller for a trading workbook

USAGE:
    oddsctl [OPTIONS]

OPTIONS:
    --workbook=PATH      Workbook document kept in sync by the bridge (default: workbook.json)
    --data-dir=DIR       Directory for template_sync.json, hotkey_status.json and
                         current_state.json (default: .)
    --config=PATH        JSON config file, applied before environment and flags
    --log=FILTER         Log filter directive (default: info)
    --log-file=PATH      Append logs to PATH instead of stderr
    --log-json           Emit logs as JSON lines
    --headless           Watch and publish only; no key hook
    --tick-ms=N          Loop tick in milliseconds (default: 50)
    --status-ms=N        Status heartbeat interval (default: 1000)
    --watch-ms=N         Cell watch interval (default: 100)
    --help, -h           Show this help message
    --version, -V        Show version

KEYBINDINGS:
    Keypad -  / F23      Home odds one rung down (held keys step once per change)
    Keypad +  / F24      Home odds one rung up
    Keypad 1  / F21      Toggle current map suspend, then Send Update
    Keypad 0  / F22      Send Update
    Ctrl+Esc, Ctrl+C     Quit

ENVIRONMENT VARIABLES:
    ODDSCTL_CONFIG        Config file (overridden by --config)
    ODDSCTL_WORKBOOK      Override --workbook default
    ODDSCTL_DATA_DIR      Override --data-dir default
    ODDSCTL_LOG           Override --log default
    ODDSCTL_LOG_FILE      Override --log-file default
    ODDSCTL_LOG_JSON      1/0: JSON log lines
    ODDSCTL_HEADLESS      1/0: run without the key hook
    ODDSCTL_TICK_MS       Override --tick-ms default
    ODDSCTL_STATUS_MS     Override --status-ms default
    ODDSCTL_WATCH_MS      Override --watch-ms default
    ODDSCTL_ADDIN_WINDOW  Title fragment of the add-in panel

EXIT STATUS:
    0  clean shutdown
    1  workbook unavailable at startup
    2  bad arguments, environment or config file";

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(Box<Config>),
    Help,
    Version,
}

/// Resolve the full configuration from args and environment.
///
/// `args` excludes the program name. `env` looks up a variable by its full
/// name.
///
/// # Errors
///
/// Any [`ConfigError`] from the file, environment or flags.
pub fn load(args: &[String], env: &dyn Fn(&str) -> Option<String>) -> Result<CliAction, ConfigError> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(CliAction::Help);
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        return Ok(CliAction::Version);
    }

    let config_path = args
        .iter()
        .rev()
        .find_map(|a| a.strip_prefix("--config="))
        .map(PathBuf::from)
        .or_else(|| env(&format!("{ENV_PREFIX}CONFIG")).map(PathBuf::from));

    let mut config = Config::default();
    if let Some(path) = &config_path {
        config.apply_file(path)?;
    }
    config.apply_env(env)?;
    apply_args(&mut config, args)?;
    Ok(CliAction::Run(Box::new(config)))
}

fn apply_args(config: &mut Config, args: &[String]) -> Result<(), ConfigError> {
    for arg in args {
        match arg.as_str() {
            "--log-json" => config.log_json = true,
            "--headless" => config.headless = true,
            other => {
                if other.starts_with("--config=") {
                    // Applied before the environment.
                } else if let Some(val) = other.strip_prefix("--workbook=") {
                    config.workbook = PathBuf::from(val);
                } else if let Some(val) = other.strip_prefix("--data-dir=") {
                    config.data_dir = PathBuf::from(val);
                } else if let Some(val) = other.strip_prefix("--log=") {
                    config.log_filter = val.to_string();
                } else if let Some(val) = other.strip_prefix("--log-file=") {
                    config.log_file = Some(PathBuf::from(val));
                } else if let Some(val) = other.strip_prefix("--tick-ms=") {
                    config.tick_ms =
                        parse_positive(val).ok_or_else(|| ConfigError::invalid("--tick-ms", val))?;
                } else if let Some(val) = other.strip_prefix("--status-ms=") {
                    config.status_ms = val
                        .parse()
                        .map_err(|_| ConfigError::invalid("--status-ms", val))?;
                } else if let Some(val) = other.strip_prefix("--watch-ms=") {
                    config.watch_ms = val
                        .parse()
                        .map_err(|_| ConfigError::invalid("--watch-ms", val))?;
                } else {
                    return Err(ConfigError::UnknownArgument(other.to_string()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn run(list: &[&str], env: &dyn Fn(&str) -> Option<String>) -> Config {
        match load(&args(list), env).unwrap() {
            CliAction::Run(config) => *config,
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn version_string_nonempty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn help_text_lists_keys_and_env() {
        assert!(HELP_TEXT.contains("Keypad -"));
        assert!(HELP_TEXT.contains("ODDSCTL_WORKBOOK"));
        assert!(HELP_TEXT.contains("--headless"));
    }

    #[test]
    fn help_and_version_win() {
        assert_eq!(
            load(&args(&["--bogus", "-h"]), &no_env).unwrap(),
            CliAction::Help
        );
        assert_eq!(load(&args(&["-V"]), &no_env).unwrap(), CliAction::Version);
    }

    #[test]
    fn no_args_is_defaults() {
        assert_eq!(run(&[], &no_env), Config::default());
    }

    #[test]
    fn flags_parse() {
        let config = run(
            &[
                "--workbook=/x/wb.json",
                "--data-dir=/x/ui",
                "--log=debug",
                "--log-json",
                "--headless",
                "--tick-ms=10",
            ],
            &no_env,
        );
        assert_eq!(config.workbook, PathBuf::from("/x/wb.json"));
        assert_eq!(config.data_dir, PathBuf::from("/x/ui"));
        assert_eq!(config.log_filter, "debug");
        assert!(config.log_json);
        assert!(config.headless);
        assert_eq!(config.tick_ms, 10);
    }

    #[test]
    fn bad_flags_are_errors() {
        assert!(matches!(
            load(&args(&["--frobnicate"]), &no_env),
            Err(ConfigError::UnknownArgument(_))
        ));
        assert!(matches!(
            load(&args(&["--tick-ms=fast"]), &no_env),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            load(&args(&["--tick-ms=0"]), &no_env),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn layering_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oddsctl.json");
        fs::write(&path, r#"{"tickMs": 30, "statusMs": 2000, "watchMs": 250}"#).unwrap();
        let path_str = path.to_string_lossy().to_string();

        let env = move |k: &str| match k {
            "ODDSCTL_CONFIG" => Some(path_str.clone()),
            "ODDSCTL_STATUS_MS" => Some("1500".to_string()),
            "ODDSCTL_WATCH_MS" => Some("200".to_string()),
            _ => None,
        };
        let config = run(&["--watch-ms=150"], &env);
        // file < env < flag
        assert_eq!(config.tick_ms, 30);
        assert_eq!(config.status_ms, 1500);
        assert_eq!(config.watch_ms, 150);
    }

    #[test]
    fn config_flag_beats_env_config() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        fs::write(&a, r#"{"tickMs": 11}"#).unwrap();
        fs::write(&b, r#"{"tickMs": 22}"#).unwrap();
        let a_str = a.to_string_lossy().to_string();
        let env = move |k: &str| (k == "ODDSCTL_CONFIG").then(|| a_str.clone());
        let flag = format!("--config={}", b.display());
        assert_eq!(run(&[flag.as_str()], &env).tick_ms, 22);
        assert_eq!(run(&[], &env).tick_ms, 11);
    }
}
