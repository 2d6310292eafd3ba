//! MIDI stream playback scheduler.
//!
//! Plays queued buffers of time-stamped events against a [`DeviceSink`] at
//! the right wall-clock time, with pause, resume, stop, tempo changes and
//! position queries from any thread. Each open stream owns one player
//! thread; control calls are synchronous and preempt any pending rest.
//!
//! Feature gates: `midi-io` (hardware output through midir).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fermata_stream::{ChannelSink, MidiBuffer, MidiEvent, MidiStream, Notification};
//!
//! let (sink, messages) = ChannelSink::new();
//! let stream = MidiStream::builder(sink)
//!     .notifier(|_stream: MidiStream, n: Notification| {
//!         if let Notification::BufferDone(buffer) = n {
//!             println!("done: {:?}", buffer);
//!         }
//!     })
//!     .open()?;
//!
//! let buffer = Arc::new(MidiBuffer::from_events(&[
//!     MidiEvent::note_on(0, 0, 60, 100),
//!     MidiEvent::note_off(24, 0, 60),
//! ])?);
//! buffer.prepare();
//! stream.out(&buffer)?;
//! stream.restart()?;
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::StreamConfig;

mod buffer;
pub use buffer::MidiBuffer;

mod queue;
pub use queue::BufferQueue;

mod command;
mod player;
mod shared;
pub use shared::StreamStatus;

mod registry;
pub use registry::{open_streams, StreamId, StreamRegistry};

mod notify;
pub use notify::{ChannelNotifier, NoopNotifier, Notification, Notifier};

pub mod sink;
pub use sink::{ChannelSink, DeviceSink, NullSink, SinkMessage, SinkMessageKind};

#[cfg(feature = "midi-io")]
pub use sink::{MidiOutputDevice, MidirSink};

mod builder;
pub use builder::StreamBuilder;

mod stream;
pub use stream::{MidiStream, Position, Property, TimeUnit};

pub use fermata_midi::{
    codec, short, EventKind, MidiEvent, MidiEventBuilder, TimeConverter, TimeDivision,
};
