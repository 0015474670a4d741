#![forbid(unsafe_code)]

//! Core: odds ladder, sentinel guard, key-hold debounce, and command routing.
//!
//! Everything here is pure or channel-only. Nothing in this crate touches the
//! workbook; that happens in `oddsctl-runtime`, on the one thread that owns
//! it.

pub mod channel;
pub mod debounce;
pub mod event;
pub mod guard;
pub mod keymap;
pub mod ladder;
pub mod layout;
pub mod value;

pub use channel::{CommandReceiver, CommandSender, command_channel};
pub use debounce::{HoldDecision, KeyHoldState, KeyHoldTracker};
pub use event::{Command, HookEvent, KeyAction, KeyId, Propagation};
pub use guard::{is_locked, is_sentinel};
pub use keymap::{Binding, HookHandler, HotkeyRouter, Keymap};
pub use ladder::{Direction, OddsLadder, StepError, StepTarget};
pub use layout::{MAX_MAPS, MapLayout, MapRow, max_maps_for_template};
pub use value::{CellValue, OddsPair};
