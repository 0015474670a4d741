#![forbid(unsafe_code)]

//! oddsctl binary entry point.

use std::process::ExitCode;

use oddsctl::{CliAction, ConfigError, HELP_TEXT, TerminalHook, VERSION, init_logging};
use oddsctl_core::{HotkeyRouter, Keymap, command_channel};
use oddsctl_runtime::{
    CompanionStatus, FileWorkbook, Program, SharedCompanionStatus, ShutdownSignal,
};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match oddsctl::load(&args, &|name: &str| std::env::var(name).ok()) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{HELP_TEXT}");
            return ExitCode::SUCCESS;
        }
        Ok(CliAction::Version) => {
            println!("oddsctl {VERSION}");
            return ExitCode::SUCCESS;
        }
        Err(e) => return config_failure(&e),
    };
    if let Err(e) = init_logging(&config) {
        return config_failure(&e);
    }

    let workbook = match FileWorkbook::connect(&config.workbook) {
        Ok(workbook) => workbook,
        Err(e) => {
            tracing::error!(path = %config.workbook.display(), error = %e, "workbook unavailable");
            eprintln!("oddsctl: workbook unavailable: {e}");
            return ExitCode::from(1);
        }
    };

    let shutdown = ShutdownSignal::new();
    let _signals = match shutdown.install_os_handlers() {
        Ok(guard) => Some(guard),
        Err(e) => {
            tracing::warn!(error = %e, "signal handlers unavailable");
            None
        }
    };

    let (tx, rx) = command_channel();
    let companion = SharedCompanionStatus::default();
    let mut program = Program::new(workbook, rx, config.program_config())
        .with_shutdown(shutdown)
        .with_companion(companion.clone());
    program.startup();

    let hook = if config.headless {
        tracing::info!("headless: key hook not installed");
        drop(tx);
        None
    } else {
        match TerminalHook::install(HotkeyRouter::new(Keymap::standard(), tx), companion.clone()) {
            Ok(hook) => {
                if !hook.reports_releases() {
                    tracing::warn!("terminal reports no key releases; plain - + 0 1 act as keypad");
                }
                Some(hook)
            }
            Err(e) => {
                tracing::error!(error = %e, "key hook failed to install");
                companion.set(CompanionStatus::failed(e.to_string()));
                None
            }
        }
    };

    program.run();
    drop(hook);
    if let Err(e) = program.finish() {
        tracing::warn!(error = %e, "workbook restore failed");
    }
    tracing::info!("controller stopped");
    ExitCode::SUCCESS
}

fn config_failure(error: &ConfigError) -> ExitCode {
    eprintln!("oddsctl: {error}");
    eprintln!("Run with --help for usage.");
    ExitCode::from(ConfigError::EXIT_CODE as u8)
}
