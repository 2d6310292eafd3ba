//! Application notifications.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::buffer::MidiBuffer;
use crate::stream::MidiStream;

#[derive(Debug, Clone)]
pub enum Notification {
    Opened,
    Closed,
    /// The buffer was played to the end or flushed. Sent exactly once per
    /// submission.
    BufferDone(Arc<MidiBuffer>),
    /// An event flagged for a callback was handled; `offset` is the byte
    /// offset just past it.
    PositionReached {
        buffer: Arc<MidiBuffer>,
        offset: usize,
    },
}

impl Notification {
    pub fn buffer(&self) -> Option<&Arc<MidiBuffer>> {
        match self {
            Notification::BufferDone(buffer) | Notification::PositionReached { buffer, .. } => {
                Some(buffer)
            }
            _ => None,
        }
    }
}

/// Receives stream notifications.
///
/// Called from the player thread for buffer notifications and from the
/// caller's thread for `Opened` and `Closed`. Implementations may call
/// back into the stream, including [`MidiStream::close`].
pub trait Notifier: Send + Sync {
    fn notify(&self, stream: MidiStream, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(MidiStream, Notification) + Send + Sync,
{
    fn notify(&self, stream: MidiStream, notification: Notification) {
        self(stream, notification)
    }
}

/// Notifier that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _stream: MidiStream, _notification: Notification) {}
}

/// Notifier forwarding every notification to a channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<(MidiStream, Notification)>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, Receiver<(MidiStream, Notification)>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, stream: MidiStream, notification: Notification) {
        // Receiver gone means nobody is listening
        let _ = self.tx.send((stream, notification));
    }
}
