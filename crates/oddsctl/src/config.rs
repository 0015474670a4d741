#![forbid(unsafe_code)]

//! Controller configuration and its layering.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A JSON config file (`--config=PATH` or `ODDSCTL_CONFIG`).
//! 3. `ODDSCTL_*` environment variables.
//! 4. Command-line flags (see [`crate::cli`]).
//!
//! # Config File
//!
//! Every key is optional; unknown keys are rejected so typos surface.
//!
//! ```json
//! {
//!   "workbook": "C:/trading/workbook.json",
//!   "dataDir": "C:/trading/ui",
//!   "tickMs": 50,
//!   "mapRows": [44, 190, 336, 482, 628],
//!   "addinWindow": "ExcelTradingAddIn",
//!   "updateClick": [55, 280]
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use oddsctl_core::MapLayout;
use oddsctl_runtime::{ActionConfig, CellSchema, ProgramConfig};
use serde::Deserialize;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "ODDSCTL_";

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Bad configuration input. The binary exits with status 2.
#[derive(Debug)]
pub enum ConfigError {
    /// A flag the parser does not know.
    UnknownArgument(String),
    /// A flag or environment variable with an unparsable value.
    InvalidValue { origin: String, value: String },
    /// The config file could not be read or parsed.
    File { path: PathBuf, message: String },
    /// The log file could not be opened.
    LogFile { path: PathBuf, source: std::io::Error },
}

impl ConfigError {
    /// Process exit status for configuration failures.
    pub const EXIT_CODE: i32 = 2;

    pub(crate) fn invalid(origin: impl Into<String>, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            origin: origin.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownArgument(arg) => write!(f, "unknown argument: {arg}"),
            ConfigError::InvalidValue { origin, value } => {
                write!(f, "invalid {origin} value: {value:?}")
            }
            ConfigError::File { path, message } => {
                write!(f, "config file {}: {message}", path.display())
            }
            ConfigError::LogFile { path, source } => {
                write!(f, "log file {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::LogFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// Fully resolved controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Workbook document the bridge keeps in sync.
    pub workbook: PathBuf,
    /// Directory for the selection, status and state files.
    pub data_dir: PathBuf,
    /// `EnvFilter` directive.
    pub log_filter: String,
    /// Log to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    pub log_json: bool,
    /// Run without the key hook.
    pub headless: bool,
    pub tick_ms: u64,
    pub status_ms: u64,
    pub watch_ms: u64,
    pub follow_up_ms: u64,
    pub addin_window: String,
    pub update_click: (i32, i32),
    pub suspend_control: String,
    pub home_range: String,
    pub away_range: String,
    pub template_cell: String,
    pub status_cell: String,
    pub team1_cell: String,
    pub team2_cell: String,
    /// Winner rows for maps 1..=5, in order.
    pub map_rows: Vec<u32>,
    pub home_column: String,
    pub away_column: String,
}

impl Default for Config {
    fn default() -> Self {
        let program = ProgramConfig::default();
        let actions = ActionConfig::default();
        let schema = CellSchema::default();
        Self {
            workbook: PathBuf::from("workbook.json"),
            data_dir: PathBuf::from("."),
            log_filter: "info".into(),
            log_file: None,
            log_json: false,
            headless: false,
            tick_ms: millis(program.tick),
            status_ms: millis(program.status_interval),
            watch_ms: millis(program.watch_interval),
            follow_up_ms: millis(program.suspend_follow_up),
            addin_window: actions.addin_window,
            update_click: actions.update_click,
            suspend_control: actions.suspend_control,
            home_range: actions.home_range,
            away_range: actions.away_range,
            template_cell: schema.template_cell,
            status_cell: schema.status_cell,
            team1_cell: schema.team1_cell,
            team2_cell: schema.team2_cell,
            map_rows: schema.layout.rows().map(|r| r.row).collect(),
            home_column: "M".into(),
            away_column: "N".into(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// On-disk config file; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    workbook: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    log: Option<String>,
    log_file: Option<PathBuf>,
    log_json: Option<bool>,
    headless: Option<bool>,
    tick_ms: Option<u64>,
    status_ms: Option<u64>,
    watch_ms: Option<u64>,
    follow_up_ms: Option<u64>,
    addin_window: Option<String>,
    update_click: Option<(i32, i32)>,
    suspend_control: Option<String>,
    home_range: Option<String>,
    away_range: Option<String>,
    template_cell: Option<String>,
    status_cell: Option<String>,
    team1_cell: Option<String>,
    team2_cell: Option<String>,
    map_rows: Option<Vec<u32>>,
    home_column: Option<String>,
    away_column: Option<String>,
}

macro_rules! overlay {
    ($dst:expr, $src:expr, $($field:ident => $target:ident),* $(,)?) => {
        $(if let Some(v) = $src.$field { $dst.$target = v; })*
    };
}

impl Config {
    /// Overlay a JSON config file.
    ///
    /// # Errors
    ///
    /// `ConfigError::File` if the file is unreadable, not JSON, has unknown
    /// keys, or fails validation.
    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let file_error = |message: String| ConfigError::File {
            path: path.to_path_buf(),
            message,
        };
        let raw = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(|e| file_error(e.to_string()))?;

        if let Some(rows) = &file.map_rows {
            validate_rows(rows).map_err(file_error)?;
        }
        overlay!(self, file,
            workbook => workbook,
            data_dir => data_dir,
            log => log_filter,
            log_json => log_json,
            headless => headless,
            tick_ms => tick_ms,
            status_ms => status_ms,
            watch_ms => watch_ms,
            follow_up_ms => follow_up_ms,
            addin_window => addin_window,
            update_click => update_click,
            suspend_control => suspend_control,
            home_range => home_range,
            away_range => away_range,
            template_cell => template_cell,
            status_cell => status_cell,
            team1_cell => team1_cell,
            team2_cell => team2_cell,
            map_rows => map_rows,
            home_column => home_column,
            away_column => away_column,
        );
        if file.log_file.is_some() {
            self.log_file = file.log_file;
        }
        if self.tick_ms == 0 {
            return Err(file_error("tickMs must be positive".into()));
        }
        Ok(())
    }

    /// Overlay `ODDSCTL_*` environment variables read through `lookup`.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` naming the variable on a bad number or
    /// boolean.
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("WORKBOOK") {
            self.workbook = PathBuf::from(v);
        }
        if let Some(v) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("LOG") {
            self.log_filter = v;
        }
        if let Some(v) = var("LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = var("LOG_JSON") {
            self.log_json = parse_bool(&v).ok_or_else(|| env_invalid("LOG_JSON", &v))?;
        }
        if let Some(v) = var("HEADLESS") {
            self.headless = parse_bool(&v).ok_or_else(|| env_invalid("HEADLESS", &v))?;
        }
        if let Some(v) = var("TICK_MS") {
            self.tick_ms = parse_positive(&v).ok_or_else(|| env_invalid("TICK_MS", &v))?;
        }
        if let Some(v) = var("STATUS_MS") {
            self.status_ms = v.parse().map_err(|_| env_invalid("STATUS_MS", &v))?;
        }
        if let Some(v) = var("WATCH_MS") {
            self.watch_ms = v.parse().map_err(|_| env_invalid("WATCH_MS", &v))?;
        }
        if let Some(v) = var("ADDIN_WINDOW") {
            self.addin_window = v;
        }
        Ok(())
    }

    /// Runtime configuration derived from this config.
    #[must_use]
    pub fn program_config(&self) -> ProgramConfig {
        let layout = MapLayout::new(
            (1u8..).zip(self.map_rows.iter().copied()),
            self.home_column.clone(),
            self.away_column.clone(),
        );
        ProgramConfig::default()
            .with_tick(Duration::from_millis(self.tick_ms))
            .with_status_interval(Duration::from_millis(self.status_ms))
            .with_watch_interval(Duration::from_millis(self.watch_ms))
            .with_suspend_follow_up(Duration::from_millis(self.follow_up_ms))
            .with_data_dir(&self.data_dir)
            .with_schema(CellSchema {
                template_cell: self.template_cell.clone(),
                status_cell: self.status_cell.clone(),
                team1_cell: self.team1_cell.clone(),
                team2_cell: self.team2_cell.clone(),
                layout,
            })
            .with_actions(ActionConfig {
                home_range: self.home_range.clone(),
                away_range: self.away_range.clone(),
                suspend_control: self.suspend_control.clone(),
                addin_window: self.addin_window.clone(),
                update_click: self.update_click,
            })
    }
}

fn env_invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::invalid(format!("{ENV_PREFIX}{name}"), value)
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_positive(value: &str) -> Option<u64> {
    value.parse().ok().filter(|&n: &u64| n > 0)
}

fn validate_rows(rows: &[u32]) -> Result<(), String> {
    if rows.is_empty() || rows.len() > usize::from(oddsctl_core::MAX_MAPS) {
        return Err(format!(
            "mapRows needs 1 to {} rows, got {}",
            oddsctl_core::MAX_MAPS,
            rows.len()
        ));
    }
    if rows.contains(&0) {
        return Err("mapRows entries are 1-based".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_runtime() {
        let config = Config::default();
        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.status_ms, 1000);
        assert_eq!(config.watch_ms, 100);
        assert_eq!(config.map_rows, vec![44, 190, 336, 482, 628]);
        assert_eq!(config.update_click, (55, 280));
        assert!(!config.headless);
    }

    #[test]
    fn file_overlays_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oddsctl.json");
        fs::write(
            &path,
            r#"{"tickMs": 20, "mapRows": [10, 20, 30], "homeColumn": "B", "awayColumn": "C", "updateClick": [1, 2]}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_file(&path).unwrap();
        assert_eq!(config.tick_ms, 20);
        assert_eq!(config.update_click, (1, 2));

        let program = config.program_config();
        assert_eq!(program.tick, Duration::from_millis(20));
        let row = program.schema.layout.row(3).unwrap();
        assert_eq!(row.home_cell, "B30");
        assert!(program.schema.layout.row(4).is_none());
    }

    #[test]
    fn file_rejects_unknown_keys_and_bad_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        for body in [
            r#"{"tikMs": 20}"#,
            r#"{"mapRows": []}"#,
            r#"{"mapRows": [1, 2, 3, 4, 5, 6]}"#,
            r#"{"tickMs": 0}"#,
            "not json",
        ] {
            fs::write(&path, body).unwrap();
            let err = Config::default().apply_file(&path).unwrap_err();
            assert!(matches!(err, ConfigError::File { .. }), "{body}");
        }
        let missing = Config::default().apply_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::File { .. })));
    }

    #[test]
    fn env_overlays_and_validates() {
        let mut config = Config::default();
        config
            .apply_env(&env(&[
                ("ODDSCTL_WORKBOOK", "/wb.json"),
                ("ODDSCTL_HEADLESS", "yes"),
                ("ODDSCTL_TICK_MS", "25"),
                ("ODDSCTL_LOG", "oddsctl=debug"),
            ]))
            .unwrap();
        assert_eq!(config.workbook, PathBuf::from("/wb.json"));
        assert!(config.headless);
        assert_eq!(config.tick_ms, 25);
        assert_eq!(config.log_filter, "oddsctl=debug");

        let err = Config::default()
            .apply_env(&env(&[("ODDSCTL_TICK_MS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("ODDSCTL_TICK_MS"));
        assert!(
            Config::default()
                .apply_env(&env(&[("ODDSCTL_LOG_JSON", "maybe")]))
                .is_err()
        );
    }

    #[test]
    fn program_config_uses_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/srv/ui"),
            ..Config::default()
        };
        let program = config.program_config();
        assert_eq!(program.status_path, PathBuf::from("/srv/ui/hotkey_status.json"));
        assert_eq!(program.actions.addin_window, "ExcelTradingAddIn");
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
