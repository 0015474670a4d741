#![forbid(unsafe_code)]

//! Logging setup on `tracing` and `tracing-subscriber`.
//!
//! # Log Levels
//!
//! - `error`: the workbook went away, a publish could not be written
//! - `warn`: rejected steps, failed actions, selection fallbacks
//! - `info`: startup report, every applied step, suspend and update actions
//! - `debug`: debounce decisions, dropped commands
//! - `trace`: per-tick spans
//!
//! While the key hook is installed the terminal is in raw mode, where a bare
//! `\n` does not return the cursor. Stderr output therefore goes through
//! [`CrlfWriter`]. File output is written as-is, without ANSI colors.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Mutex;

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{Config, ConfigError};

/// Install the global subscriber described by `config`.
///
/// A second call leaves the first subscriber in place.
///
/// # Errors
///
/// `ConfigError::InvalidValue` for an unparsable filter,
/// `ConfigError::LogFile` if the log file cannot be opened.
pub fn init_logging(config: &Config) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|_| ConfigError::invalid("log filter", config.log_filter.as_str()))?;

    let (writer, ansi) = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ConfigError::LogFile {
                    path: path.clone(),
                    source,
                })?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(RawModeStderr), true),
    };

    let installed = if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(ansi).with_writer(writer))
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}

/// Stderr writer safe to use while the terminal is in raw mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawModeStderr;

impl<'a> MakeWriter<'a> for RawModeStderr {
    type Writer = CrlfWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        CrlfWriter::new(io::stderr())
    }
}

/// Rewrites bare `\n` as `\r\n`. Existing `\r\n` pairs pass through.
#[derive(Debug)]
pub struct CrlfWriter<W: Write> {
    inner: W,
    last_was_cr: bool,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            last_was_cr: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = Vec::with_capacity(buf.len() + 8);
        for &byte in buf {
            if byte == b'\n' && !self.last_was_cr {
                out.push(b'\r');
            }
            out.push(byte);
            self.last_was_cr = byte == b'\r';
        }
        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn convert(chunks: &[&str]) -> String {
        let mut writer = CrlfWriter::new(Vec::new());
        for chunk in chunks {
            assert_eq!(writer.write(chunk.as_bytes()).unwrap(), chunk.len());
        }
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn bare_newlines_gain_carriage_return() {
        assert_eq!(convert(&["a\nb\n"]), "a\r\nb\r\n");
    }

    #[test]
    fn existing_crlf_untouched() {
        assert_eq!(convert(&["a\r\nb"]), "a\r\nb");
    }

    #[test]
    fn crlf_split_across_writes() {
        assert_eq!(convert(&["line\r", "\nnext\n"]), "line\r\nnext\r\n");
    }

    #[test]
    fn bad_filter_is_config_error() {
        let config = Config {
            log_filter: "oddsctl=loud".into(),
            ..Config::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unopenable_log_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            log_file: Some(dir.path().join("missing").join("oddsctl.log")),
            ..Config::default()
        };
        match init_logging(&config) {
            Err(ConfigError::LogFile { path, .. }) => {
                assert!(path.ends_with(PathBuf::from("missing").join("oddsctl.log")));
            }
            other => panic!("expected LogFile error, got {other:?}"),
        }
    }
}
