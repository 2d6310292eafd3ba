//! MIDI stream types for the fermata playback scheduler.
//!
//! Pure data and math, no threads:
//!
//! - **Time**: [`TimeDivision`] (metrical or SMPTE) and [`TimeConverter`]
//! - **Events**: [`MidiEvent`] records with a delta time in ticks
//! - **Codec**: the packed stream-buffer record format ([`codec`])
//! - **Short messages**: packing helpers for 1-3 byte messages ([`short`])
//!
//! # Example
//!
//! ```ignore
//! use fermata_midi::{codec, MidiEvent, TimeConverter, TimeDivision};
//!
//! let bytes = codec::encode(&[
//!     MidiEvent::note_on(0, 0, 60, 100),
//!     MidiEvent::note_off(24, 0, 60),
//! ])?;
//!
//! let conv = TimeConverter::new(500_000, TimeDivision::TicksPerQuarter(24));
//! assert_eq!(conv.ticks_to_usec(24), 500_000);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod time;
pub use time::{
    TimeConverter, TimeDivision, DEFAULT_SONG_POINTER_MIN_DIVISION, DEFAULT_TEMPO,
    DEFAULT_TICKS_PER_QUARTER,
};

pub mod event;
pub use event::{EventKind, MidiEvent, MidiEventBuilder};

pub mod codec;
pub use codec::{BufferWriter, EventReader, RawEvent};

pub mod short;

pub use midi_msg::MidiMsg;
