//! Destination of resolved MIDI messages.
//!
//! The player thread owns all sink calls; a sink never sees two calls at
//! once and is never asked to schedule anything.

use fermata_midi::short::{self, CC_ALL_NOTES_OFF, CC_ALL_SOUND_OFF, CC_SUSTAIN};

use crate::error::Result;

mod channel;
pub use channel::{ChannelSink, SinkMessage, SinkMessageKind};

#[cfg(feature = "midi-io")]
mod output;
#[cfg(feature = "midi-io")]
pub use output::{MidiOutputDevice, MidirSink};

pub trait DeviceSink: Send {
    /// Send a packed short message (status in the low byte).
    fn send_short(&mut self, msg: u32) -> Result<()>;

    /// Send a system exclusive or other long message verbatim.
    fn send_long(&mut self, data: &[u8]) -> Result<()>;

    /// Silence everything: all sound off, sustain off and all notes off on
    /// every channel.
    fn reset(&mut self) -> Result<()> {
        for channel in 0..16 {
            self.send_short(short::control_change(channel, CC_ALL_SOUND_OFF, 0))?;
            self.send_short(short::control_change(channel, CC_SUSTAIN, 0))?;
            self.send_short(short::control_change(channel, CC_ALL_NOTES_OFF, 0))?;
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }
}

impl<S: DeviceSink + ?Sized> DeviceSink for Box<S> {
    fn send_short(&mut self, msg: u32) -> Result<()> {
        (**self).send_short(msg)
    }

    fn send_long(&mut self, data: &[u8]) -> Result<()> {
        (**self).send_long(data)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DeviceSink for NullSink {
    fn send_short(&mut self, _msg: u32) -> Result<()> {
        Ok(())
    }

    fn send_long(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        shorts: Vec<u32>,
    }

    impl DeviceSink for Recorder {
        fn send_short(&mut self, msg: u32) -> Result<()> {
            self.shorts.push(msg);
            Ok(())
        }

        fn send_long(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_reset_covers_all_channels() {
        let mut sink = Recorder::default();
        sink.reset().unwrap();
        assert_eq!(sink.shorts.len(), 48);
        assert_eq!(short::unpack(sink.shorts[0]), [0xB0, CC_ALL_SOUND_OFF, 0]);
        assert_eq!(short::unpack(sink.shorts[1]), [0xB0, CC_SUSTAIN, 0]);
        assert_eq!(short::unpack(sink.shorts[47]), [0xBF, CC_ALL_NOTES_OFF, 0]);
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let mut sink: Box<dyn DeviceSink> = Box::new(NullSink);
        assert!(sink.is_ready());
        sink.send_short(short::note_on(0, 60, 100)).unwrap();
        sink.send_long(&[0xF0, 0xF7]).unwrap();
        sink.reset().unwrap();
    }
}
