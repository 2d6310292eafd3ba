use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::DeviceSink;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkMessageKind {
    Short(u32),
    Long(Vec<u8>),
    Reset,
}

/// A message the player dispatched, stamped with when it happened.
#[derive(Debug, Clone)]
pub struct SinkMessage {
    pub at: Instant,
    pub kind: SinkMessageKind,
}

/// Sink that forwards every dispatch over a channel.
///
/// Handy for monitoring and for measuring dispatch times.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<SinkMessage>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    fn forward(&self, kind: SinkMessageKind) -> Result<()> {
        self.tx
            .send(SinkMessage {
                at: Instant::now(),
                kind,
            })
            .map_err(|_| Error::Sink("sink receiver dropped".to_string()))
    }
}

impl DeviceSink for ChannelSink {
    fn send_short(&mut self, msg: u32) -> Result<()> {
        self.forward(SinkMessageKind::Short(msg))
    }

    fn send_long(&mut self, data: &[u8]) -> Result<()> {
        self.forward(SinkMessageKind::Long(data.to_vec()))
    }

    fn reset(&mut self) -> Result<()> {
        self.forward(SinkMessageKind::Reset)
    }
}
