//! # Fermata - MIDI stream playback
//!
//! Plays queued buffers of time-stamped MIDI events at the right wall-clock
//! time, with pause, resume, stop, tempo changes and position queries.
//!
//! ## Architecture
//!
//! Fermata is an umbrella crate over:
//! - **fermata-midi** - Stream types: time division, tick/time conversion, events, buffer codec
//! - **fermata-stream** - The scheduler: streams, player threads, sinks and notifications
//!
//! ## Quick Start
//!
//! ```ignore
//! use fermata::prelude::*;
//!
//! let (sink, _messages) = ChannelSink::new();
//! let stream = MidiStream::builder(sink).open()?;
//!
//! let buffer = Arc::new(MidiBuffer::from_events(&[
//!     MidiEvent::note_on(0, 0, 60, 100),
//!     MidiEvent::note_off(24, 0, 60),
//! ])?);
//! buffer.prepare();
//!
//! stream.out(&buffer)?;
//! stream.restart()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything below
//! - `midi-io` - Hardware output through midir

/// Re-export of fermata-midi for direct access
pub use fermata_midi as midi;
/// Re-export of fermata-stream for direct access
pub use fermata_stream as stream;

pub mod error;
pub use error::{Error, Result};

pub use fermata_midi::{EventKind, MidiEvent, TimeConverter, TimeDivision};
pub use fermata_stream::{
    DeviceSink, MidiBuffer, MidiStream, Notification, Notifier, Position, StreamConfig,
    StreamStatus, TimeUnit,
};

/// Everything needed to open a stream and play buffers.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{Error, Result};
    pub use fermata_midi::{EventKind, MidiEvent, MidiEventBuilder, TimeDivision};
    pub use fermata_stream::{
        ChannelNotifier, ChannelSink, DeviceSink, MidiBuffer, MidiStream, Notification, Notifier,
        NullSink, Position, Property, StreamBuilder, StreamConfig, StreamStatus, TimeUnit,
    };

    #[cfg(feature = "midi-io")]
    pub use fermata_stream::MidirSink;
}
