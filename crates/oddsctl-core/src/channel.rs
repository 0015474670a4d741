#![forbid(unsafe_code)]

//! Command hand-off from hook contexts to the owning context.
//!
//! [`command_channel`] returns a cloneable [`CommandSender`] for the input
//! hook (and anything else that produces commands) and a single
//! [`CommandReceiver`] for the loop that owns the workbook.
//!
//! # Guarantees
//!
//! - `send` never blocks and never drops: the queue is unbounded.
//! - Order is FIFO per sender; nothing is coalesced or reordered.
//! - Draining never blocks: [`CommandReceiver::drain`] stops at the first
//!   empty read.
//!
//! The channel is the only synchronization point between the hook and the
//! workbook. Hook code must never touch the workbook directly.

use std::sync::mpsc;

use crate::event::Command;

/// Create a connected sender/receiver pair.
#[must_use]
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        CommandSender { tx },
        CommandReceiver {
            rx,
            disconnected: false,
        },
    )
}

/// Producer half. Cheap to clone; safe to use from any thread.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Enqueue a command.
    ///
    /// Returns `false` if the receiver is gone (the loop has shut down).
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Consumer half, owned by the loop.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
    disconnected: bool,
}

impl CommandReceiver {
    /// Take every command queued right now, oldest first.
    pub fn drain(&mut self) -> Vec<Command> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(cmd) => out.push(cmd),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        tracing::debug!("command channel disconnected");
                    }
                    self.disconnected = true;
                    break;
                }
            }
        }
        out
    }

    /// True once every sender has been dropped and the queue was drained.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}
