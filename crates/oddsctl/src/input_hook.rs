#![forbid(unsafe_code)]

//! Terminal key hook.
//!
//! `TerminalHook` owns the terminal while the controller runs: raw mode, the
//! kitty keyboard protocol when the terminal supports it, and a reader
//! thread that turns crossterm key events into [`HookEvent`]s for a
//! [`HookHandler`]. The handler only enqueues commands; all workbook work
//! happens on the loop thread.
//!
//! # Guarantees
//!
//! | Trigger        | Terminal restored | Companion status |
//! |----------------|-------------------|------------------|
//! | Normal drop    | yes               | `running: false` |
//! | Panic          | yes (panic hook)  | unchanged        |
//! | Reader error   | on drop           | `failed(error)`  |
//!
//! # Failure Modes
//!
//! | Failure                         | Behavior                                          |
//! |---------------------------------|---------------------------------------------------|
//! | No kitty protocol               | No release events; plain `- + 0 1` act as keypad  |
//! | Raw mode unavailable (no tty)   | `install` returns the error, nothing to undo      |
//! | `crossterm::event::read` fails  | Reader thread exits and records the error         |
//!
//! A terminal cannot withhold a key from other applications, so
//! [`Propagation::Suppress`] has no effect here beyond a trace line.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEventKind, KeyEventState, KeyModifiers};
use oddsctl_core::{HookEvent, HookHandler, KeyAction, KeyId, Propagation};
use oddsctl_runtime::{CompanionStatus, SharedCompanionStatus};

const KITTY_KEYBOARD_ENABLE: &[u8] = b"\x1b[>15u";
const KITTY_KEYBOARD_DISABLE: &[u8] = b"\x1b[<u";

const READ_POLL: Duration = Duration::from_millis(50);

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

/// Maps crossterm events to hotkey events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyTranslator {
    /// Treat plain `- + 0 1` as keypad keys.
    pub plain_fallback: bool,
}

impl KeyTranslator {
    #[must_use]
    pub const fn new(plain_fallback: bool) -> Self {
        Self { plain_fallback }
    }

    /// Translate one terminal event. Unbound keys give `None`.
    #[must_use]
    pub fn translate(&self, event: &Event) -> Option<HookEvent> {
        let Event::Key(key) = event else {
            return None;
        };
        let action = match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => KeyAction::Press,
            KeyEventKind::Release => KeyAction::Release,
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let keypad = key.state.contains(KeyEventState::KEYPAD) || self.plain_fallback;

        let id = match key.code {
            KeyCode::Esc if ctrl => KeyId::CtrlEscape,
            KeyCode::Char('c' | 'C') if ctrl => KeyId::CtrlC,
            KeyCode::F(n) => KeyId::F(n),
            KeyCode::Char('-') if keypad && !ctrl => KeyId::NumpadMinus,
            KeyCode::Char('+') if keypad && !ctrl => KeyId::NumpadPlus,
            KeyCode::Char('0') if keypad && !ctrl => KeyId::Numpad0,
            KeyCode::Char('1') if keypad && !ctrl => KeyId::Numpad1,
            _ => return None,
        };
        Some(HookEvent { key: id, action })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook
// ─────────────────────────────────────────────────────────────────────────────

/// Installed key hook. Dropping it stops the reader and restores the
/// terminal.
#[derive(Debug)]
pub struct TerminalHook {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    kitty_keyboard: bool,
    companion: SharedCompanionStatus,
}

impl TerminalHook {
    /// Take over the terminal and start delivering events to `handler`.
    ///
    /// # Errors
    ///
    /// Raw mode or thread spawn failures. The terminal is left as it was.
    pub fn install<H>(handler: H, companion: SharedCompanionStatus) -> io::Result<Self>
    where
        H: HookHandler + 'static,
    {
        install_panic_hook();
        crossterm::terminal::enable_raw_mode()?;

        let kitty_keyboard = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false);
        if kitty_keyboard {
            let mut stdout = io::stdout();
            if let Err(err) = enable_kitty_keyboard(&mut stdout) {
                let _ = crossterm::terminal::disable_raw_mode();
                return Err(err);
            }
        }
        let translator = KeyTranslator::new(!kitty_keyboard);
        tracing::info!(kitty_keyboard, "key hook installed");

        companion.set(CompanionStatus::running_here());
        let stop = Arc::new(AtomicBool::new(false));
        let spawned = {
            let stop = Arc::clone(&stop);
            let companion = companion.clone();
            thread::Builder::new()
                .name("oddsctl-hook".into())
                .spawn(move || read_loop(&handler, translator, &stop, &companion))
        };
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                best_effort_cleanup();
                companion.set(CompanionStatus::failed(err.to_string()));
                return Err(err);
            }
        };

        Ok(Self {
            stop,
            thread: Some(thread),
            kitty_keyboard,
            companion,
        })
    }

    /// Whether release events are available.
    #[must_use]
    pub fn reports_releases(&self) -> bool {
        self.kitty_keyboard
    }
}

impl Drop for TerminalHook {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if self.kitty_keyboard {
            let _ = disable_kitty_keyboard(&mut io::stdout());
        }
        let _ = crossterm::terminal::disable_raw_mode();

        let mut status = self.companion.get();
        status.running = false;
        status.pid = None;
        self.companion.set(status);
        tracing::info!("key hook removed");
    }
}

fn read_loop<H: HookHandler>(
    handler: &H,
    translator: KeyTranslator,
    stop: &AtomicBool,
    companion: &SharedCompanionStatus,
) {
    while !stop.load(Ordering::SeqCst) {
        let event = match crossterm::event::poll(READ_POLL) {
            Ok(false) => continue,
            Ok(true) => crossterm::event::read(),
            Err(err) => Err(err),
        };
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(error = %err, "key hook stopped");
                companion.set(CompanionStatus::failed(err.to_string()));
                return;
            }
        };
        if let Some(hook_event) = translator.translate(&event)
            && handler.on_event(hook_event) == Propagation::Suppress
        {
            tracing::trace!(key = %hook_event.key, "suppress requested");
        }
    }
}

fn enable_kitty_keyboard(writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(KITTY_KEYBOARD_ENABLE)?;
    writer.flush()
}

fn disable_kitty_keyboard(writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(KITTY_KEYBOARD_DISABLE)?;
    writer.flush()
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_cleanup();
            previous(info);
        }));
    });
}

fn best_effort_cleanup() {
    let mut stdout = io::stdout();
    let _ = disable_kitty_keyboard(&mut stdout);
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}
