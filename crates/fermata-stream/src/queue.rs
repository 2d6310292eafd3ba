//! FIFO of submitted buffers awaiting playback.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::MidiBuffer;
use crate::error::{Error, Result};

/// Submitted buffers in playback order.
///
/// `epoch` changes whenever the head is removed, letting the player tell a
/// head it is halfway through from a fresh one that happens to be the same
/// `Arc` (a buffer flushed by `stop` and resubmitted).
#[derive(Debug, Default)]
pub struct BufferQueue {
    buffers: VecDeque<Arc<MidiBuffer>>,
    closed: bool,
    epoch: u64,
}

impl BufferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a claimed buffer. Refused once the queue is closed.
    pub fn push(&mut self, buffer: Arc<MidiBuffer>) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidHandle);
        }
        self.buffers.push_back(buffer);
        Ok(())
    }

    /// Current head and the epoch it was observed in.
    pub fn front(&self) -> Option<(Arc<MidiBuffer>, u64)> {
        self.buffers.front().map(|b| (Arc::clone(b), self.epoch))
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn pop(&mut self) -> Option<Arc<MidiBuffer>> {
        let buffer = self.buffers.pop_front()?;
        self.epoch = self.epoch.wrapping_add(1);
        Some(buffer)
    }

    /// Remove everything, in submission order.
    pub fn drain(&mut self) -> Vec<Arc<MidiBuffer>> {
        self.epoch = self.epoch.wrapping_add(1);
        self.buffers.drain(..).collect()
    }

    /// Drain and refuse further pushes.
    pub fn close(&mut self) -> Vec<Arc<MidiBuffer>> {
        self.closed = true;
        self.drain()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(tag: u64) -> Arc<MidiBuffer> {
        Arc::new(MidiBuffer::empty().with_user_data(tag))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = BufferQueue::new();
        queue.push(buffer(1)).unwrap();
        queue.push(buffer(2)).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().user_data(), 1);
        assert_eq!(queue.pop().unwrap().user_data(), 2);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_epoch_changes_on_removal() {
        let mut queue = BufferQueue::new();
        let b = buffer(1);
        queue.push(Arc::clone(&b)).unwrap();
        let (_, first) = queue.front().unwrap();
        queue.drain();
        queue.push(b).unwrap();
        let (_, second) = queue.front().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_closed_queue_refuses_push() {
        let mut queue = BufferQueue::new();
        queue.push(buffer(1)).unwrap();
        let leftover = queue.close();
        assert_eq!(leftover.len(), 1);
        assert!(queue.is_empty());
        assert!(matches!(queue.push(buffer(2)), Err(Error::InvalidHandle)));
    }
}
