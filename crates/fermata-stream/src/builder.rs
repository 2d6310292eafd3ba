//! Stream builder.

use std::sync::Arc;

use fermata_midi::TimeDivision;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::notify::{NoopNotifier, Notifier};
use crate::sink::DeviceSink;
use crate::stream::MidiStream;

/// Configures and opens a [`MidiStream`].
///
/// ```ignore
/// let (sink, messages) = ChannelSink::new();
/// let stream = MidiStream::builder(sink)
///     .notifier(|stream: MidiStream, n: Notification| println!("{}: {:?}", stream.id(), n))
///     .tempo(400_000)
///     .time_division(TimeDivision::TicksPerQuarter(96))
///     .open()?;
/// ```
pub struct StreamBuilder {
    sink: Box<dyn DeviceSink>,
    notifier: Arc<dyn Notifier>,
    config: StreamConfig,
}

impl StreamBuilder {
    pub fn new<S: DeviceSink + 'static>(sink: S) -> Self {
        Self {
            sink: Box::new(sink),
            notifier: Arc::new(NoopNotifier),
            config: StreamConfig::default(),
        }
    }

    pub fn notifier<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Share one notifier between several streams.
    pub fn shared_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tempo(mut self, usec_per_quarter: u32) -> Self {
        self.config.tempo = usec_per_quarter;
        self
    }

    pub fn time_division(mut self, division: TimeDivision) -> Self {
        self.config.time_division = division;
        self
    }

    pub fn song_pointer_min_division(mut self, ticks: u16) -> Self {
        self.config.song_pointer_min_division = ticks;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn realtime_priority(mut self, enabled: bool) -> Self {
        self.config.realtime_priority = enabled;
        self
    }

    pub fn open(self) -> Result<MidiStream> {
        MidiStream::open_with(self.sink, self.notifier, self.config)
    }
}
