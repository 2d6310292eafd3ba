//! State shared between a stream's handle and its player thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use fermata_midi::{TimeConverter, TimeDivision};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::buffer::MidiBuffer;
use crate::command::{Command, CommandKind};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::notify::{Notification, Notifier};
use crate::queue::BufferQueue;
use crate::registry::StreamId;
use crate::sink::DeviceSink;
use crate::stream::MidiStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    #[default]
    Stopped,
    Paused,
    Playing,
}

/// Everything a position query needs, guarded as one unit.
#[derive(Debug, Clone)]
pub(crate) struct Timing {
    pub status: StreamStatus,
    pub tempo: u32,
    pub division: TimeDivision,
    /// Ticks whose wait has completed
    pub cumulative_ticks: u64,
    /// Playback time at which the last completed wait ended
    pub position_usec: u64,
    /// Wall time playback position zero maps to, while playing
    pub start: Instant,
    /// Playback position, while paused or stopped
    pub elapsed: Duration,
    /// Playback position when the last wait completed
    pub last_event: Duration,
    /// The queue ran dry while playing
    pub idle: bool,
}

impl Timing {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            status: StreamStatus::Stopped,
            tempo: config.tempo,
            division: config.time_division,
            cumulative_ticks: 0,
            position_usec: 0,
            start: Instant::now(),
            elapsed: Duration::ZERO,
            last_event: Duration::ZERO,
            idle: false,
        }
    }

    #[inline]
    pub fn converter(&self) -> TimeConverter {
        TimeConverter::new(self.tempo, self.division)
    }

    pub fn playing_position(&self, now: Instant) -> Duration {
        match self.status {
            StreamStatus::Playing => now.saturating_duration_since(self.start),
            StreamStatus::Paused | StreamStatus::Stopped => self.elapsed,
        }
    }

    /// Committed ticks plus the ticks the current tempo puts between the
    /// last completed wait and `now`.
    pub fn current_ticks(&self, now: Instant) -> u64 {
        let since = self.playing_position(now).saturating_sub(self.last_event);
        let micros = u64::try_from(since.as_micros()).unwrap_or(u64::MAX);
        self.cumulative_ticks
            .saturating_add(self.converter().usec_to_ticks(micros))
    }

    /// When an event `delta_ticks` after the last completed wait is due.
    pub fn deadline(&self, delta_ticks: u32) -> Due {
        if self.status != StreamStatus::Playing {
            return Due::NotPlaying;
        }
        let usec = self
            .position_usec
            .saturating_add(self.converter().ticks_to_usec(u64::from(delta_ticks)));
        match self.start.checked_add(Duration::from_micros(usec)) {
            Some(at) => Due::At(at),
            None => Due::Never,
        }
    }

    /// Record that the wait for `delta_ticks` has completed.
    pub fn commit(&mut self, delta_ticks: u32, now: Instant) {
        let usec = self.converter().ticks_to_usec(u64::from(delta_ticks));
        self.position_usec = self.position_usec.saturating_add(usec);
        self.cumulative_ticks = self.cumulative_ticks.saturating_add(u64::from(delta_ticks));
        self.last_event = self.playing_position(now);
    }

    /// Move the timeline up to `now`, so the next delta counts from here.
    /// The ticks the current tempo puts into the gap are committed too.
    pub fn catch_up(&mut self, now: Instant) {
        self.cumulative_ticks = self.current_ticks(now);
        let position = self.playing_position(now);
        self.position_usec = u64::try_from(position.as_micros()).unwrap_or(u64::MAX);
        self.last_event = position;
        self.idle = false;
    }

    fn reset(&mut self) {
        self.status = StreamStatus::Stopped;
        self.cumulative_ticks = 0;
        self.position_usec = 0;
        self.elapsed = Duration::ZERO;
        self.last_event = Duration::ZERO;
        self.idle = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Due {
    NotPlaying,
    At(Instant),
    /// Too far ahead for `Instant`
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(crate) struct StreamShared {
    pub id: StreamId,
    pub timing: Mutex<Timing>,
    pub queue: Mutex<BufferQueue>,
    pub sink: Mutex<Box<dyn DeviceSink>>,
    pub song_pointer_min_division: u16,
    notifier: Arc<dyn Notifier>,
    commands: Sender<Command>,
    player: OnceLock<ThreadId>,
    closing: AtomicBool,
    pub thread: Mutex<Option<JoinHandle<()>>>,
}

impl StreamShared {
    pub fn new(
        id: StreamId,
        sink: Box<dyn DeviceSink>,
        notifier: Arc<dyn Notifier>,
        config: &StreamConfig,
        commands: Sender<Command>,
    ) -> Self {
        Self {
            id,
            timing: Mutex::new(Timing::new(config)),
            queue: Mutex::new(BufferQueue::new()),
            sink: Mutex::new(sink),
            song_pointer_min_division: config.song_pointer_min_division,
            notifier,
            commands,
            player: OnceLock::new(),
            closing: AtomicBool::new(false),
            thread: Mutex::new(None),
        }
    }

    #[inline]
    pub fn handle(&self) -> MidiStream {
        MidiStream::from_stream_id(self.id)
    }

    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(self.handle(), notification);
    }

    pub fn set_player_thread(&self, thread: ThreadId) {
        let _ = self.player.set(thread);
    }

    pub fn is_player_thread(&self) -> bool {
        self.player.get() == Some(&thread::current().id())
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Mark the stream as closing. Returns `false` if it already was.
    pub fn begin_close(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }

    /// Post a command without waiting for it.
    pub fn post(&self, kind: CommandKind) -> Result<()> {
        self.commands
            .send(Command::post(kind))
            .map_err(|_| self.player_gone())
    }

    /// Have the player apply `kind` and wait until it has.
    ///
    /// On the player thread itself (a notifier calling back into the
    /// stream) the command is applied inline.
    pub fn post_and_wait(&self, kind: CommandKind) -> Result<()> {
        if self.is_player_thread() {
            trace!("Stream {}: applying {:?} inline", self.id, kind);
            self.apply(kind);
            return Ok(());
        }
        let (command, ack) = Command::with_ack(kind);
        self.commands.send(command).map_err(|_| self.player_gone())?;
        ack.recv().map_err(|_| self.player_gone())
    }

    fn player_gone(&self) -> Error {
        if self.is_closing() {
            Error::InvalidHandle
        } else {
            Error::Internal(format!("player thread of stream {} is gone", self.id))
        }
    }

    /// Apply a state transition. No lock is held while the sink resets or
    /// the notifier runs.
    pub fn apply(&self, kind: CommandKind) -> Flow {
        trace!("Stream {}: {:?}", self.id, kind);
        match kind {
            CommandKind::Stop => {
                self.timing.lock().reset();
                let reset = self.sink.lock().reset();
                if let Err(e) = reset {
                    warn!("Stream {}: sink reset failed: {}", self.id, e);
                }
                let flushed = self.queue.lock().drain();
                self.return_buffers(flushed);
            }
            CommandKind::Pause => {
                let mut timing = self.timing.lock();
                if timing.status == StreamStatus::Playing {
                    let now = Instant::now();
                    timing.elapsed = now.saturating_duration_since(timing.start);
                    timing.status = StreamStatus::Paused;
                }
            }
            CommandKind::Resume => {
                let mut timing = self.timing.lock();
                if timing.status != StreamStatus::Playing {
                    let now = Instant::now();
                    timing.start = now.checked_sub(timing.elapsed).unwrap_or(now);
                    timing.status = StreamStatus::Playing;
                }
            }
            CommandKind::SetTempo(tempo) => {
                self.timing.lock().tempo = tempo;
            }
            CommandKind::Wake => {}
            CommandKind::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Mark buffers done and hand each back to the application.
    pub fn return_buffers(&self, buffers: Vec<Arc<MidiBuffer>>) {
        for buffer in buffers {
            buffer.mark_done();
            trace!("Stream {}: buffer done ({} bytes)", self.id, buffer.bytes_recorded());
            self.notify(Notification::BufferDone(buffer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> Timing {
        Timing::new(&StreamConfig::default())
    }

    #[test]
    fn test_deadline_only_while_playing() {
        let mut t = timing();
        assert_eq!(t.deadline(24), Due::NotPlaying);
        t.status = StreamStatus::Playing;
        assert_eq!(t.deadline(24), Due::At(t.start + Duration::from_millis(500)));
    }

    #[test]
    fn test_deadline_follows_tempo() {
        let mut t = timing();
        t.status = StreamStatus::Playing;
        t.tempo = 1_000_000;
        assert_eq!(t.deadline(24), Due::At(t.start + Duration::from_secs(1)));
    }

    #[test]
    fn test_commit_is_incremental() {
        let mut t = timing();
        t.status = StreamStatus::Playing;
        let now = t.start + Duration::from_millis(500);
        t.commit(24, now);
        t.tempo = 250_000;
        assert_eq!(t.deadline(24), Due::At(t.start + Duration::from_millis(750)));
        assert_eq!(t.cumulative_ticks, 24);
    }

    #[test]
    fn test_catch_up_moves_deadline_past_idle_gap() {
        let mut t = timing();
        t.status = StreamStatus::Playing;
        t.idle = true;
        let now = t.start + Duration::from_secs(2);
        t.catch_up(now);

        assert!(!t.idle);
        assert_eq!(t.cumulative_ticks, 96);
        assert_eq!(t.current_ticks(now), 96);
        assert_eq!(t.deadline(24), Due::At(now + Duration::from_millis(500)));
        assert_eq!(t.deadline(48), Due::At(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_current_ticks_interpolates() {
        let mut t = timing();
        t.status = StreamStatus::Playing;
        let now = t.start + Duration::from_millis(250);
        assert_eq!(t.current_ticks(now), 12);
    }

    #[test]
    fn test_paused_position_is_frozen() {
        let mut t = timing();
        t.status = StreamStatus::Paused;
        t.elapsed = Duration::from_millis(200);
        let later = Instant::now() + Duration::from_secs(5);
        assert_eq!(t.playing_position(later), Duration::from_millis(200));
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut t = timing();
        t.status = StreamStatus::Playing;
        t.commit(48, t.start + Duration::from_secs(1));
        t.reset();
        assert_eq!(t.status, StreamStatus::Stopped);
        assert_eq!(t.cumulative_ticks, 0);
        assert_eq!(t.position_usec, 0);
        assert_eq!(t.current_ticks(Instant::now()), 0);
    }
}
