//! End-to-end playback through the umbrella crate.
//!
//! Run with:
//! ```bash
//! cargo test -p fermata --test playback
//! ```

use std::time::{Duration, Instant};

use fermata::prelude::*;

fn prepared(events: &[MidiEvent]) -> Result<Arc<MidiBuffer>> {
    let buffer = Arc::new(MidiBuffer::from_events(events)?);
    buffer.prepare();
    Ok(buffer)
}

#[test]
fn test_play_phrase_through_prelude() -> Result<()> {
    let (sink, messages) = ChannelSink::new();
    let (notifier, notifications) = ChannelNotifier::new();
    let stream = MidiStream::builder(sink)
        .notifier(notifier)
        .time_division(TimeDivision::TicksPerQuarter(96))
        .tempo(250_000)
        .realtime_priority(false)
        .open()?;

    let buffer = prepared(&[
        MidiEvent::note_on_builder(60, 100).channel(1).build(),
        MidiEvent::note_off(96, 1, 60),
        MidiEvent::note_on_builder(64, 90).channel(1).delta(48).callback().build(),
        MidiEvent::note_off(48, 1, 64),
    ])?;

    let t0 = Instant::now();
    stream.out(&buffer)?;
    stream.restart()?;

    let mut done = false;
    let mut positions = Vec::new();
    while !done {
        let (_, n) = notifications
            .recv_timeout(Duration::from_secs(5))
            .expect("notification timed out");
        match n {
            Notification::PositionReached { offset, .. } => positions.push(offset),
            Notification::BufferDone(b) => done = Arc::ptr_eq(&b, &buffer),
            _ => {}
        }
    }

    // 96 + 48 + 48 ticks at 96 ticks per 250 ms quarter
    assert!(t0.elapsed() >= Duration::from_millis(499));
    assert_eq!(positions, vec![36]);

    let shorts: Vec<u32> = messages
        .try_iter()
        .filter_map(|m| match m.kind {
            fermata::stream::SinkMessageKind::Short(msg) => Some(msg),
            _ => None,
        })
        .collect();
    assert_eq!(
        shorts,
        vec![
            fermata::midi::short::note_on(1, 60, 100),
            fermata::midi::short::note_off(1, 60, 0),
            fermata::midi::short::note_on(1, 64, 90),
            fermata::midi::short::note_off(1, 64, 0),
        ]
    );

    stream.close()?;
    Ok(())
}

#[test]
fn test_stream_errors_convert_to_umbrella_error() {
    let stream = MidiStream::open(NullSink, |_: MidiStream, _: Notification| {}).unwrap();
    stream.close().unwrap();

    let result: Result<()> = stream.stop().map_err(Error::from);
    assert!(matches!(
        result,
        Err(Error::Stream(fermata::stream::Error::InvalidHandle))
    ));
}
