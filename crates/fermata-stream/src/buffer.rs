//! Application buffers and their playback lifecycle flags.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use fermata_midi::{codec, EventReader, MidiEvent};

use crate::error::{Error, Result};

const PREPARED: u32 = 1 << 0;
const DONE: u32 = 1 << 1;
const IN_QUEUE: u32 = 1 << 2;
const STREAM: u32 = 1 << 3;

/// A block of encoded stream events submitted for playback.
///
/// Shared as `Arc<MidiBuffer>` between the application and the player.
/// The payload is immutable; only the lifecycle flags and the callback
/// offset change, and only the player clears `in_queue` or sets `done`.
///
/// ```ignore
/// let buffer = Arc::new(MidiBuffer::from_events(&[
///     MidiEvent::note_on(0, 0, 60, 100),
///     MidiEvent::note_off(24, 0, 60),
/// ])?);
/// buffer.prepare();
/// stream.out(&buffer)?;
/// ```
pub struct MidiBuffer {
    data: Vec<u8>,
    bytes_recorded: usize,
    flags: AtomicU32,
    offset: AtomicUsize,
    user_data: u64,
}

impl MidiBuffer {
    /// Buffer whose whole payload is recorded.
    pub fn new(data: Vec<u8>) -> Self {
        let bytes_recorded = data.len();
        Self {
            data,
            bytes_recorded,
            flags: AtomicU32::new(0),
            offset: AtomicUsize::new(0),
            user_data: 0,
        }
    }

    /// Buffer where only the first `bytes_recorded` bytes hold events.
    pub fn with_recorded(data: Vec<u8>, bytes_recorded: usize) -> Result<Self> {
        if bytes_recorded > data.len() {
            return Err(fermata_midi::Error::RecordedOverrun {
                recorded: bytes_recorded,
                len: data.len(),
            }
            .into());
        }
        let mut buffer = Self::new(data);
        buffer.bytes_recorded = bytes_recorded;
        Ok(buffer)
    }

    pub fn from_events(events: &[MidiEvent]) -> Result<Self> {
        Ok(Self::new(codec::encode(events)?))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Attach an application tag, handed back untouched in notifications.
    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    /// The recorded part of the payload.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.bytes_recorded]
    }

    #[inline]
    pub fn bytes_recorded(&self) -> usize {
        self.bytes_recorded
    }

    pub fn events(&self) -> EventReader<'_> {
        EventReader::new(self.data())
    }

    /// Offset just past the last event that requested a position callback.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset.load(Ordering::Acquire)
    }

    pub fn prepare(&self) {
        self.flags.fetch_or(PREPARED, Ordering::AcqRel);
    }

    pub fn unprepare(&self) -> Result<()> {
        let result = self
            .flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
                (flags & IN_QUEUE == 0).then_some(flags & !PREPARED)
            });
        match result {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::StillPlaying),
        }
    }

    #[inline]
    pub fn is_prepared(&self) -> bool {
        self.flags.load(Ordering::Acquire) & PREPARED != 0
    }

    #[inline]
    pub fn is_in_queue(&self) -> bool {
        self.flags.load(Ordering::Acquire) & IN_QUEUE != 0
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.flags.load(Ordering::Acquire) & DONE != 0
    }

    /// Whether the first record is meant for stream `stream_id`. Records
    /// addressed to any stream, and buffers with no readable first record,
    /// qualify.
    pub fn is_addressed_to(&self, stream_id: u32) -> bool {
        match codec::decode_at(self.data(), 0) {
            Ok(Some(first)) => {
                codec::STREAM_ID_ANY.contains(&first.stream_id) || first.stream_id == stream_id
            }
            _ => true,
        }
    }

    /// Whether the buffer has ever been submitted to a stream.
    #[inline]
    pub fn is_stream_buffer(&self) -> bool {
        self.flags.load(Ordering::Acquire) & STREAM != 0
    }

    /// Atomically take the buffer for a queue.
    ///
    /// Fails with `Unprepared` or `StillPlaying`; on success `done` is
    /// cleared and `in_queue` set, so exactly one concurrent caller wins.
    pub(crate) fn claim_for_queue(&self) -> Result<()> {
        let mut flags = self.flags.load(Ordering::Acquire);
        loop {
            if flags & PREPARED == 0 {
                return Err(Error::Unprepared);
            }
            if flags & IN_QUEUE != 0 {
                return Err(Error::StillPlaying);
            }
            let next = (flags | IN_QUEUE | STREAM) & !DONE;
            match self
                .flags
                .compare_exchange_weak(flags, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    self.offset.store(0, Ordering::Release);
                    return Ok(());
                }
                Err(actual) => flags = actual,
            }
        }
    }

    /// Undo a claim whose push was refused.
    pub(crate) fn release_claim(&self) {
        self.flags.fetch_and(!IN_QUEUE, Ordering::AcqRel);
    }

    pub(crate) fn mark_done(&self) {
        let mut flags = self.flags.load(Ordering::Acquire);
        loop {
            let next = (flags | DONE) & !IN_QUEUE;
            match self
                .flags
                .compare_exchange_weak(flags, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => flags = actual,
            }
        }
    }

    pub(crate) fn set_offset(&self, offset: usize) {
        self.offset.store(offset, Ordering::Release);
    }
}

impl fmt::Debug for MidiBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiBuffer")
            .field("bytes_recorded", &self.bytes_recorded)
            .field("prepared", &self.is_prepared())
            .field("in_queue", &self.is_in_queue())
            .field("done", &self.is_done())
            .field("offset", &self.offset())
            .field("user_data", &self.user_data)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_unprepared() {
        let buffer = MidiBuffer::from_events(&[MidiEvent::note_on(0, 0, 60, 100)]).unwrap();
        assert!(!buffer.is_prepared());
        assert!(!buffer.is_in_queue());
        assert!(!buffer.is_done());
        assert_eq!(buffer.bytes_recorded(), 12);
        assert_eq!(buffer.events().count(), 1);
    }

    #[test]
    fn test_recorded_cannot_exceed_data() {
        assert!(MidiBuffer::with_recorded(vec![0; 8], 12).is_err());
        let buffer = MidiBuffer::with_recorded(vec![0; 24], 12).unwrap();
        assert_eq!(buffer.data().len(), 12);
    }

    #[test]
    fn test_addressed_stream() {
        let any = MidiBuffer::from_events(&[MidiEvent::nop(0)]).unwrap();
        assert!(any.is_addressed_to(3));

        let mut writer = codec::BufferWriter::with_stream_id(3);
        writer.push(&MidiEvent::nop(0)).unwrap();
        let tagged = MidiBuffer::new(writer.finish());
        assert!(tagged.is_addressed_to(3));
        assert!(!tagged.is_addressed_to(4));

        assert!(MidiBuffer::empty().is_addressed_to(4));
    }

    #[test]
    fn test_claim_requires_prepare() {
        let buffer = MidiBuffer::empty();
        assert!(matches!(buffer.claim_for_queue(), Err(Error::Unprepared)));
        buffer.prepare();
        buffer.claim_for_queue().unwrap();
        assert!(buffer.is_in_queue());
        assert!(buffer.is_stream_buffer());
    }

    #[test]
    fn test_second_claim_still_playing() {
        let buffer = MidiBuffer::empty();
        buffer.prepare();
        buffer.claim_for_queue().unwrap();
        assert!(matches!(buffer.claim_for_queue(), Err(Error::StillPlaying)));
        assert!(matches!(buffer.unprepare(), Err(Error::StillPlaying)));
    }

    #[test]
    fn test_done_clears_in_queue_and_allows_resubmit() {
        let buffer = MidiBuffer::empty();
        buffer.prepare();
        buffer.claim_for_queue().unwrap();
        buffer.set_offset(12);
        buffer.mark_done();
        assert!(buffer.is_done());
        assert!(!buffer.is_in_queue());

        buffer.claim_for_queue().unwrap();
        assert!(!buffer.is_done());
        assert_eq!(buffer.offset(), 0);
    }

    #[test]
    fn test_unprepare_after_done() {
        let buffer = MidiBuffer::empty().with_user_data(7);
        buffer.prepare();
        buffer.claim_for_queue().unwrap();
        buffer.mark_done();
        buffer.unprepare().unwrap();
        assert!(!buffer.is_prepared());
        assert_eq!(buffer.user_data(), 7);
    }
}
