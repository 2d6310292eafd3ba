//! Stream events: a delta time in ticks plus what happens when it elapses.

use crate::short;

/// What a stream event does once its delta time has elapsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Packed channel or system message, status in the low byte.
    ShortMessage(u32),
    /// System exclusive or any other message sent verbatim.
    LongMessage(Vec<u8>),
    /// New tempo in microseconds per quarter note (24 bits).
    Tempo(u32),
    Comment(Vec<u8>),
    Nop,
    Version,
    /// Event type the scheduler does not understand. Skipped on playback.
    Unknown(u8),
}

/// One record of a stream buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    pub delta_ticks: u32,
    pub kind: EventKind,
    /// Ask the scheduler for a position callback once this event is handled.
    pub fires_callback: bool,
}

impl MidiEvent {
    #[inline]
    pub fn new(delta_ticks: u32, kind: EventKind) -> Self {
        Self {
            delta_ticks,
            kind,
            fires_callback: false,
        }
    }

    #[inline]
    pub fn short(delta_ticks: u32, msg: u32) -> Self {
        Self::new(delta_ticks, EventKind::ShortMessage(msg))
    }

    #[inline]
    pub fn long(delta_ticks: u32, data: impl Into<Vec<u8>>) -> Self {
        Self::new(delta_ticks, EventKind::LongMessage(data.into()))
    }

    #[inline]
    pub fn tempo(delta_ticks: u32, usec_per_quarter: u32) -> Self {
        Self::new(delta_ticks, EventKind::Tempo(usec_per_quarter))
    }

    #[inline]
    pub fn comment(delta_ticks: u32, text: impl Into<Vec<u8>>) -> Self {
        Self::new(delta_ticks, EventKind::Comment(text.into()))
    }

    #[inline]
    pub fn nop(delta_ticks: u32) -> Self {
        Self::new(delta_ticks, EventKind::Nop)
    }

    #[inline]
    pub fn version(delta_ticks: u32) -> Self {
        Self::new(delta_ticks, EventKind::Version)
    }

    #[inline]
    pub fn note_on(delta_ticks: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::short(delta_ticks, short::note_on(channel, note, velocity))
    }

    #[inline]
    pub fn note_off(delta_ticks: u32, channel: u8, note: u8) -> Self {
        Self::short(delta_ticks, short::note_off(channel, note, 0))
    }

    #[inline]
    pub fn note_on_builder(note: u8, velocity: u8) -> MidiEventBuilder {
        MidiEventBuilder::new(ShortKind::NoteOn { note, velocity })
    }

    #[inline]
    pub fn note_off_builder(note: u8) -> MidiEventBuilder {
        MidiEventBuilder::new(ShortKind::NoteOff { note })
    }

    #[inline]
    pub fn cc_builder(control: u8, value: u8) -> MidiEventBuilder {
        MidiEventBuilder::new(ShortKind::ControlChange { control, value })
    }

    #[inline]
    pub fn program_builder(program: u8) -> MidiEventBuilder {
        MidiEventBuilder::new(ShortKind::ProgramChange { program })
    }

    /// Request a position callback for this event.
    #[inline]
    pub fn with_callback(mut self) -> Self {
        self.fires_callback = true;
        self
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        matches!(
            self.kind,
            EventKind::LongMessage(_) | EventKind::Comment(_)
        )
    }
}

#[derive(Clone, Copy, Debug)]
enum ShortKind {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { control: u8, value: u8 },
    ProgramChange { program: u8 },
}

/// Fluent builder for channel-voice stream events.
///
/// ```ignore
/// let event = MidiEvent::note_on_builder(60, 100)
///     .channel(9)
///     .delta(24)
///     .callback()
///     .build();
/// ```
#[derive(Clone, Copy, Debug)]
pub struct MidiEventBuilder {
    kind: ShortKind,
    channel: u8,
    delta_ticks: u32,
    fires_callback: bool,
}

impl MidiEventBuilder {
    fn new(kind: ShortKind) -> Self {
        Self {
            kind,
            channel: 0,
            delta_ticks: 0,
            fires_callback: false,
        }
    }

    /// MIDI channel 0-15 (clamped).
    #[inline]
    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel.min(15);
        self
    }

    #[inline]
    pub fn delta(mut self, delta_ticks: u32) -> Self {
        self.delta_ticks = delta_ticks;
        self
    }

    #[inline]
    pub fn callback(mut self) -> Self {
        self.fires_callback = true;
        self
    }

    pub fn build(self) -> MidiEvent {
        let msg = match self.kind {
            ShortKind::NoteOn { note, velocity } => short::note_on(self.channel, note, velocity),
            ShortKind::NoteOff { note } => short::note_off(self.channel, note, 0),
            ShortKind::ControlChange { control, value } => {
                short::control_change(self.channel, control, value)
            }
            ShortKind::ProgramChange { program } => short::program_change(self.channel, program),
        };
        MidiEvent {
            delta_ticks: self.delta_ticks,
            kind: EventKind::ShortMessage(msg),
            fires_callback: self.fires_callback,
        }
    }
}
