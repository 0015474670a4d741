#![forbid(unsafe_code)]

//! Hotkey bindings and the hook-side router.
//!
//! A [`Keymap`] says what each physical key does on press and on release,
//! and whether the hook should swallow it. [`HotkeyRouter`] is the
//! [`HookHandler`] registered with the input hook: it looks the event up,
//! enqueues the resulting command and returns. It does no I/O, so it is safe
//! to call at auto-repeat rates from the hook's own thread.
//!
//! # Default Bindings
//!
//! | Key        | Press                  | Release                   | Suppressed |
//! |------------|------------------------|---------------------------|------------|
//! | Keypad `-` | `StepPrev(num_minus)`  | `KeyReleased(num_minus)`  | yes        |
//! | Keypad `+` | `StepNext(num_plus)`   | `KeyReleased(num_plus)`   | yes        |
//! | Keypad `0` | `PublishNow`           |                           | yes        |
//! | Keypad `1` | `Suspend`              |                           | yes        |
//! | F21        | `Suspend`              |                           | no         |
//! | F22        | `PublishNow`           |                           | no         |
//! | F23        | `StepPrev(f23)`        | `KeyReleased(f23)`        | no         |
//! | F24        | `StepNext(f24)`        | `KeyReleased(f24)`        | no         |
//! | Ctrl+Esc   | `Exit`                 |                           | yes        |
//! | Ctrl+C     | `Exit`                 |                           | yes        |
//!
//! F21-F24 are meant for external automation (macro pads, other programs);
//! they carry no debounce key for F21/F22 because they are one-shot.

use std::collections::HashMap;

use crate::channel::CommandSender;
use crate::event::{Command, HookEvent, KeyAction, KeyId, Propagation};
use crate::ladder::Direction;

/// Callback interface implemented by the core and registered with the hook.
pub trait HookHandler: Send + Sync {
    /// Handle one event. Must return quickly and never block.
    fn on_event(&self, event: HookEvent) -> Propagation;
}

/// What one key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub on_press: Option<Command>,
    pub on_release: Option<Command>,
    pub suppress: bool,
}

impl Binding {
    /// Press-only binding.
    #[must_use]
    pub const fn press(command: Command, suppress: bool) -> Self {
        Self {
            on_press: Some(command),
            on_release: None,
            suppress,
        }
    }

    /// Debounce-tracked step binding: press steps, release clears the hold.
    #[must_use]
    pub const fn held_step(key: KeyId, direction: Direction, suppress: bool) -> Self {
        Self {
            on_press: Some(Command::step(direction, Some(key))),
            on_release: Some(Command::KeyReleased { key: Some(key) }),
            suppress,
        }
    }

    #[must_use]
    pub const fn command_for(&self, action: KeyAction) -> Option<Command> {
        match action {
            KeyAction::Press => self.on_press,
            KeyAction::Release => self.on_release,
        }
    }
}

/// Key → binding table.
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    bindings: HashMap<KeyId, Binding>,
}

impl Keymap {
    /// An empty keymap.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bind (or rebind) a key.
    #[must_use]
    pub fn bind(mut self, key: KeyId, binding: Binding) -> Self {
        self.bindings.insert(key, binding);
        self
    }

    #[must_use]
    pub fn binding(&self, key: KeyId) -> Option<&Binding> {
        self.bindings.get(&key)
    }

    /// Command for an event plus whether to suppress it.
    ///
    /// Unbound keys propagate and produce nothing.
    #[must_use]
    pub fn resolve(&self, event: HookEvent) -> (Option<Command>, Propagation) {
        match self.bindings.get(&event.key) {
            Some(binding) => {
                let propagation = if binding.suppress {
                    Propagation::Suppress
                } else {
                    Propagation::Continue
                };
                (binding.command_for(event.action), propagation)
            }
            None => (None, Propagation::Continue),
        }
    }

    /// The standard controller bindings (see module docs).
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .bind(
                KeyId::NumpadMinus,
                Binding::held_step(KeyId::NumpadMinus, Direction::Prev, true),
            )
            .bind(
                KeyId::NumpadPlus,
                Binding::held_step(KeyId::NumpadPlus, Direction::Next, true),
            )
            .bind(KeyId::Numpad0, Binding::press(Command::PublishNow, true))
            .bind(KeyId::Numpad1, Binding::press(Command::Suspend, true))
            .bind(KeyId::F(21), Binding::press(Command::Suspend, false))
            .bind(KeyId::F(22), Binding::press(Command::PublishNow, false))
            .bind(
                KeyId::F(23),
                Binding::held_step(KeyId::F(23), Direction::Prev, false),
            )
            .bind(
                KeyId::F(24),
                Binding::held_step(KeyId::F(24), Direction::Next, false),
            )
            .bind(KeyId::CtrlEscape, Binding::press(Command::Exit, true))
            .bind(KeyId::CtrlC, Binding::press(Command::Exit, true))
    }
}

/// Hook handler that routes events through a [`Keymap`] into the channel.
#[derive(Debug, Clone)]
pub struct HotkeyRouter {
    keymap: Keymap,
    sender: CommandSender,
}

impl HotkeyRouter {
    #[must_use]
    pub fn new(keymap: Keymap, sender: CommandSender) -> Self {
        Self { keymap, sender }
    }
}

impl HookHandler for HotkeyRouter {
    fn on_event(&self, event: HookEvent) -> Propagation {
        let (command, propagation) = self.keymap.resolve(event);
        if let Some(command) = command
            && !self.sender.send(command)
        {
            tracing::debug!(key = %event.key, cmd = command.name(), "loop gone, command dropped");
        }
        propagation
    }
}
