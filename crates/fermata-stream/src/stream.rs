//! The application-facing stream handle.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};
use fermata_midi::codec::RECORD_ALIGN;
use fermata_midi::TimeDivision;
use thread_priority::ThreadPriority;
use tracing::{debug, trace, warn};

use crate::buffer::MidiBuffer;
use crate::builder::StreamBuilder;
use crate::command::CommandKind;
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::notify::{Notification, Notifier};
use crate::player;
use crate::registry::{self, StreamId};
use crate::shared::{StreamShared, StreamStatus};
use crate::sink::DeviceSink;

/// Unit a position is requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Millis,
    Samples,
    Bytes,
    Smpte,
    /// Sixteenth notes, as in a MIDI song position pointer
    SongPointer,
    Ticks,
}

impl TryFrom<u32> for TimeUnit {
    type Error = Error;

    /// Legacy time format codes.
    fn try_from(code: u32) -> Result<Self> {
        match code {
            0x01 => Ok(TimeUnit::Millis),
            0x02 => Ok(TimeUnit::Samples),
            0x04 => Ok(TimeUnit::Bytes),
            0x08 => Ok(TimeUnit::Smpte),
            0x10 => Ok(TimeUnit::SongPointer),
            0x20 => Ok(TimeUnit::Ticks),
            other => Err(Error::InvalidParameter(format!(
                "unknown time unit code {:#x}",
                other
            ))),
        }
    }
}

/// A playback position. The variant says which unit was produced, which
/// may differ from the one requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Millis(u64),
    Ticks(u64),
    SongPointer(u32),
}

/// Stream properties addressable by raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    /// Microseconds per quarter note
    Tempo,
    /// Packed 16-bit time division
    TimeDivision,
}

/// Handle to an open stream.
///
/// Cheap to copy. Every call looks the stream up again, so a handle to a
/// closed stream fails with [`Error::InvalidHandle`] instead of dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiStream {
    id: StreamId,
}

impl MidiStream {
    /// Start building a stream that plays into `sink`.
    pub fn builder<S: DeviceSink + 'static>(sink: S) -> StreamBuilder {
        StreamBuilder::new(sink)
    }

    /// Open a stream with the default configuration.
    pub fn open<S, N>(sink: S, notifier: N) -> Result<Self>
    where
        S: DeviceSink + 'static,
        N: Notifier + 'static,
    {
        Self::open_with(Box::new(sink), Arc::new(notifier), StreamConfig::default())
    }

    /// Open a stream: register it, start its player thread and wait until
    /// the player is running. The stream starts stopped.
    pub fn open_with(
        sink: Box<dyn DeviceSink>,
        notifier: Arc<dyn Notifier>,
        config: StreamConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !sink.is_ready() {
            return Err(Error::Sink("device is not ready".to_string()));
        }

        let (command_tx, command_rx) = unbounded();
        let (id, shared) = registry::streams().allocate_with(|id| {
            Arc::new(StreamShared::new(id, sink, notifier, &config, command_tx))
        })?;

        let (ready_tx, ready_rx) = bounded(1);
        let player_shared = Arc::clone(&shared);
        let realtime = config.realtime_priority;
        let spawned = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                if realtime {
                    if let Err(e) = thread_priority::set_current_thread_priority(ThreadPriority::Max)
                    {
                        warn!("Stream {}: could not raise player priority: {:?}", id, e);
                    }
                }
                player_shared.set_player_thread(thread::current().id());
                let _ = ready_tx.send(());
                player::run(player_shared, command_rx);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                registry::streams().release(id);
                return Err(Error::OutOfMemory(format!(
                    "failed to spawn player thread: {}",
                    e
                )));
            }
        };

        if ready_rx.recv().is_err() {
            registry::streams().release(id);
            let _ = handle.join();
            return Err(Error::Internal(
                "player thread exited before it was ready".to_string(),
            ));
        }
        *shared.thread.lock() = Some(handle);

        debug!("Opened MIDI stream {}", id);
        shared.notify(Notification::Opened);
        Ok(Self { id })
    }

    /// Handle for an id that is currently open.
    pub fn from_id(id: StreamId) -> Result<Self> {
        registry::resolve(id)?;
        Ok(Self { id })
    }

    pub(crate) fn from_stream_id(id: StreamId) -> Self {
        Self { id }
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    fn shared(&self) -> Result<Arc<StreamShared>> {
        registry::resolve(self.id)
    }

    /// Queue a buffer for playback. Returns without waiting for it to play.
    ///
    /// The buffer must be prepared, not already queued, and its recorded
    /// length a whole number of records. A buffer whose first record names
    /// another stream is returned done right away without playing.
    pub fn out(&self, buffer: &Arc<MidiBuffer>) -> Result<()> {
        if buffer.bytes_recorded() % RECORD_ALIGN != 0 {
            return Err(Error::InvalidParameter(format!(
                "recorded length {} is not a multiple of {}",
                buffer.bytes_recorded(),
                RECORD_ALIGN
            )));
        }
        if !buffer.is_prepared() {
            return Err(Error::Unprepared);
        }
        let shared = self.shared()?;
        buffer.claim_for_queue()?;

        if !buffer.is_addressed_to(self.id.get()) {
            warn!("Stream {}: buffer addressed to another stream, returning it", self.id);
            shared.return_buffers(vec![Arc::clone(buffer)]);
            return Ok(());
        }

        let pushed = shared.queue.lock().push(Arc::clone(buffer));
        if let Err(e) = pushed {
            buffer.release_claim();
            return Err(e);
        }
        trace!(
            "Stream {}: queued buffer ({} bytes)",
            self.id,
            buffer.bytes_recorded()
        );

        // Once queued the buffer is owned by the stream: an exiting player
        // hands it back from the closed queue.
        if let Err(e) = shared.post(CommandKind::Wake) {
            debug!("Stream {}: player gone after queueing: {}", self.id, e);
        }
        Ok(())
    }

    /// Freeze playback. A no-op unless playing.
    pub fn pause(&self) -> Result<()> {
        self.shared()?.post_and_wait(CommandKind::Pause)
    }

    /// Start or continue playback from where it was paused or stopped.
    pub fn restart(&self) -> Result<()> {
        self.shared()?.post_and_wait(CommandKind::Resume)
    }

    /// Stop playback: every queued buffer comes back done, positions reset
    /// to zero and the sink is silenced.
    pub fn stop(&self) -> Result<()> {
        self.shared()?.post_and_wait(CommandKind::Stop)
    }

    /// Stop, shut down the player thread and unregister the stream.
    ///
    /// Safe to call from inside this stream's own notifier; the player
    /// thread then finishes on its own once the callback returns.
    pub fn close(self) -> Result<()> {
        let shared = self.shared()?;
        if !shared.begin_close() {
            return Err(Error::InvalidHandle);
        }

        let stopped = shared.post_and_wait(CommandKind::Stop);
        let quit = shared.post(CommandKind::Quit);

        let handle = shared.thread.lock().take();
        let joined = match handle {
            Some(handle) if shared.is_player_thread() => {
                debug!("Stream {}: closed from its own player thread", self.id);
                drop(handle);
                Ok(())
            }
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Internal(format!("player thread of stream {} panicked", self.id))),
            None => Ok(()),
        };

        registry::streams().release(self.id);
        debug!("Closed MIDI stream {}", self.id);
        shared.notify(Notification::Closed);

        stopped.and(quit).and(joined)
    }

    /// Position now. Computed from a locked snapshot without involving the
    /// player thread.
    pub fn position(&self, unit: TimeUnit) -> Result<Position> {
        let shared = self.shared()?;
        let timing = shared.timing.lock();
        let now = Instant::now();
        let millis = || {
            let ms = timing.playing_position(now).as_millis();
            Position::Millis(u64::try_from(ms).unwrap_or(u64::MAX))
        };
        let position = match unit {
            TimeUnit::Ticks => Position::Ticks(timing.current_ticks(now)),
            TimeUnit::SongPointer => timing
                .converter()
                .song_pointer(timing.current_ticks(now), shared.song_pointer_min_division)
                .map(Position::SongPointer)
                .unwrap_or_else(millis),
            TimeUnit::Millis | TimeUnit::Samples | TimeUnit::Bytes | TimeUnit::Smpte => millis(),
        };
        Ok(position)
    }

    pub fn status(&self) -> Result<StreamStatus> {
        Ok(self.shared()?.timing.lock().status)
    }

    pub fn tempo(&self) -> Result<u32> {
        Ok(self.shared()?.timing.lock().tempo)
    }

    /// Change the tempo, also while playing. A pending rest is re-timed
    /// under the new tempo.
    pub fn set_tempo(&self, usec_per_quarter: u32) -> Result<()> {
        self.shared()?
            .post_and_wait(CommandKind::SetTempo(usec_per_quarter))
    }

    pub fn time_division(&self) -> Result<TimeDivision> {
        Ok(self.shared()?.timing.lock().division)
    }

    /// Change the time division. Refused while playing.
    pub fn set_time_division(&self, division: TimeDivision) -> Result<()> {
        let division = division.validate()?;
        let shared = self.shared()?;
        let mut timing = shared.timing.lock();
        if timing.status == StreamStatus::Playing {
            return Err(Error::InvalidParameter(
                "time division cannot change while playing".to_string(),
            ));
        }
        timing.division = division;
        Ok(())
    }

    pub fn property(&self, property: Property) -> Result<u32> {
        match property {
            Property::Tempo => self.tempo(),
            Property::TimeDivision => Ok(self.time_division()?.to_raw()),
        }
    }

    pub fn set_property(&self, property: Property, value: u32) -> Result<()> {
        match property {
            Property::Tempo => self.set_tempo(value),
            Property::TimeDivision => self.set_time_division(TimeDivision::from_raw(value)?),
        }
    }
}
