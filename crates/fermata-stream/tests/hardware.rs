//! Hardware tests using a loopback MIDI port (macOS IAC Driver).
//!
//! Requires the IAC Driver to be online in Audio MIDI Setup.
//! All tests are `#[ignore]` so CI doesn't fail without hardware.
//!
//! Run with:
//!   cargo test -p fermata-stream --test hardware -- --ignored --test-threads=1

#![cfg(feature = "midi-io")]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use fermata_stream::{MidiBuffer, MidiEvent, MidiStream, MidirSink, NoopNotifier};
use midir::{Ignore, MidiInput, MidiInputConnection};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const LOOPBACK: &str = "IAC";
const IAC_SETTLE: Duration = Duration::from_millis(200);

/// Listen on the loopback input; every message arrives with its receive time.
fn listen() -> (MidiInputConnection<()>, Receiver<(Instant, Vec<u8>)>) {
    let mut input = MidiInput::new("fermata-hardware-test").unwrap();
    input.ignore(Ignore::None);
    let ports = input.ports();
    let port = ports
        .iter()
        .find(|p| {
            input
                .port_name(p)
                .map(|n| n.to_lowercase().contains(&LOOPBACK.to_lowercase()))
                .unwrap_or(false)
        })
        .expect("IAC Driver input not found")
        .clone();

    let (tx, rx) = unbounded();
    let connection = input
        .connect(
            &port,
            "fermata-loopback",
            move |_, bytes, _| {
                let _ = tx.send((Instant::now(), bytes.to_vec()));
            },
            (),
        )
        .unwrap();
    thread::sleep(IAC_SETTLE);
    while rx.try_recv().is_ok() {}
    (connection, rx)
}

fn open_loopback() -> MidiStream {
    let sink = MidirSink::connect_by_name(LOOPBACK).expect("IAC Driver output not found");
    MidiStream::open(sink, NoopNotifier).unwrap()
}

fn prepared(events: &[MidiEvent]) -> Arc<MidiBuffer> {
    let buffer = Arc::new(MidiBuffer::from_events(events).unwrap());
    buffer.prepare();
    buffer
}

// ===========================================================================
// Loopback playback
// ===========================================================================

#[test]
#[ignore]
fn test_scale_arrives_in_order() {
    let (_input, rx) = listen();
    let stream = open_loopback();

    let notes = [60u8, 62, 64, 65, 67];
    let events: Vec<MidiEvent> = notes
        .iter()
        .flat_map(|&n| [MidiEvent::note_on(0, 0, n, 100), MidiEvent::note_off(6, 0, n)])
        .collect();
    stream.out(&prepared(&events)).unwrap();
    stream.restart().unwrap();

    let received: Vec<Vec<u8>> = (0..notes.len() * 2)
        .map(|_| rx.recv_timeout(Duration::from_secs(3)).unwrap().1)
        .collect();
    for (i, &note) in notes.iter().enumerate() {
        assert_eq!(received[i * 2], vec![0x90, note, 100]);
        assert_eq!(received[i * 2 + 1], vec![0x80, note, 0]);
    }

    stream.close().unwrap();
}

#[test]
#[ignore]
fn test_loopback_timing() {
    let (_input, rx) = listen();
    let stream = open_loopback();

    stream
        .out(&prepared(&[MidiEvent::note_on(24, 0, 60, 100)]))
        .unwrap();
    let t0 = Instant::now();
    stream.restart().unwrap();

    let (at, bytes) = rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(bytes, vec![0x90, 60, 100]);
    let elapsed = at - t0;
    assert!(elapsed >= Duration::from_millis(499), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(600), "{:?}", elapsed);

    stream.close().unwrap();
}

#[test]
#[ignore]
fn test_stop_silences_device() {
    let (_input, rx) = listen();
    let stream = open_loopback();

    stream
        .out(&prepared(&[
            MidiEvent::note_on(0, 0, 60, 100),
            MidiEvent::note_off(480, 0, 60),
        ]))
        .unwrap();
    stream.restart().unwrap();
    let (_, first) = rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(first, vec![0x90, 60, 100]);

    stream.stop().unwrap();
    thread::sleep(IAC_SETTLE);
    let reset: Vec<Vec<u8>> = rx.try_iter().map(|(_, b)| b).collect();
    assert_eq!(reset.len(), 48);
    assert!(reset.contains(&vec![0xB0, 123, 0]));

    stream.close().unwrap();
}
