#![forbid(unsafe_code)]

//! Hook events and controller commands.
//!
//! The input hook reports [`HookEvent`]s: a physical key and whether it went
//! down or up. The [`crate::keymap`] turns those into [`Command`]s, which
//! are the only thing that crosses from the hook context to the owning
//! context.
//!
//! # Design Notes
//!
//! - Auto-repeat is reported as another [`KeyAction::Press`]; the debounce
//!   engine, not the hook, decides what a held key may do.
//! - A command's [`KeyId`] exists only for debounce grouping. Commands
//!   without one are never gated.

use std::fmt;

use crate::ladder::Direction;

/// Identity of a physical hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyId {
    /// Keypad minus.
    NumpadMinus,
    /// Keypad plus.
    NumpadPlus,
    /// Keypad zero.
    Numpad0,
    /// Keypad one.
    Numpad1,
    /// Function key (F1-F24).
    F(u8),
    /// Escape with Ctrl held.
    CtrlEscape,
    /// `c` with Ctrl held.
    CtrlC,
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumpadMinus => f.write_str("num_minus"),
            Self::NumpadPlus => f.write_str("num_plus"),
            Self::Numpad0 => f.write_str("numpad0"),
            Self::Numpad1 => f.write_str("numpad1"),
            Self::F(n) => write!(f, "f{n}"),
            Self::CtrlEscape => f.write_str("ctrl+esc"),
            Self::CtrlC => f.write_str("ctrl+c"),
        }
    }
}

/// Key transition reported by the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    /// Key went down, or auto-repeated while held.
    Press,
    /// Key went up.
    Release,
}

/// One event delivered by the input hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookEvent {
    pub key: KeyId,
    pub action: KeyAction,
}

impl HookEvent {
    #[must_use]
    pub const fn press(key: KeyId) -> Self {
        Self {
            key,
            action: KeyAction::Press,
        }
    }

    #[must_use]
    pub const fn release(key: KeyId) -> Self {
        Self {
            key,
            action: KeyAction::Release,
        }
    }
}

/// Whether the hook should let an event reach other applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Pass the event on.
    Continue,
    /// Swallow the event.
    Suppress,
}

/// A unit of work for the owning context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move the home value one rung down.
    StepPrev { key: Option<KeyId> },
    /// Move the home value one rung up.
    StepNext { key: Option<KeyId> },
    /// Toggle the current map's suspend control, then publish.
    Suspend,
    /// Click the add-in's send-update button.
    PublishNow,
    /// A debounce-tracked key went up.
    KeyReleased { key: Option<KeyId> },
    /// Stop the loop after the current drain.
    Exit,
}

impl Command {
    /// Step command for `direction`.
    #[must_use]
    pub const fn step(direction: Direction, key: Option<KeyId>) -> Self {
        match direction {
            Direction::Prev => Self::StepPrev { key },
            Direction::Next => Self::StepNext { key },
        }
    }

    /// Key used for debounce grouping, if any.
    #[must_use]
    pub const fn key(&self) -> Option<KeyId> {
        match self {
            Self::StepPrev { key } | Self::StepNext { key } | Self::KeyReleased { key } => *key,
            Self::Suspend | Self::PublishNow | Self::Exit => None,
        }
    }

    /// Step direction, for step commands.
    #[must_use]
    pub const fn direction(&self) -> Option<Direction> {
        match self {
            Self::StepPrev { .. } => Some(Direction::Prev),
            Self::StepNext { .. } => Some(Direction::Next),
            _ => None,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StepPrev { .. } => "prev",
            Self::StepNext { .. } => "next",
            Self::Suspend => "suspend",
            Self::PublishNow => "send_update",
            Self::KeyReleased { .. } => "key_up",
            Self::Exit => "exit",
        }
    }
}
