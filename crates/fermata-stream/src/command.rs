//! Control commands posted to the player thread.

use crossbeam_channel::{bounded, Receiver, Sender};

/// What the player should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandKind {
    /// Flush the queue, reset timing and silence the sink
    Stop,
    /// Freeze playback, remembering elapsed time
    Pause,
    /// Continue from the remembered elapsed time
    Resume,
    /// Set microseconds per quarter note
    SetTempo(u32),
    /// A buffer was queued
    Wake,
    /// Leave the player loop
    Quit,
}

/// A command plus the one-shot the caller may be blocked on.
pub(crate) struct Command {
    pub kind: CommandKind,
    pub ack: Option<Sender<()>>,
}

impl Command {
    /// Fire-and-forget command.
    pub fn post(kind: CommandKind) -> Self {
        Self { kind, ack: None }
    }

    /// Command with a one-shot acknowledgment to wait on.
    pub fn with_ack(kind: CommandKind) -> (Self, Receiver<()>) {
        let (tx, rx) = bounded(1);
        (
            Self {
                kind,
                ack: Some(tx),
            },
            rx,
        )
    }

    pub fn acknowledge(self) {
        if let Some(ack) = self.ack {
            // Caller may have given up waiting
            let _ = ack.send(());
        }
    }
}
