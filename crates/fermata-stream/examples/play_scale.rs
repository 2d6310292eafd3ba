//! List MIDI outputs and play a C major scale through the first one (or
//! the one whose name contains the first argument).
//!
//!   cargo run -p fermata-stream --example play_scale -- "IAC"

use std::sync::Arc;

use crossbeam_channel::bounded;
use fermata_stream::{MidiBuffer, MidiEvent, MidiStream, MidirSink, Notification, TimeDivision};

fn main() -> fermata_stream::Result<()> {
    tracing_subscriber::fmt().init();

    println!("=== MIDI Output Devices ===");
    let devices = MidirSink::list_devices();
    if devices.is_empty() {
        println!("  (none found)");
        return Ok(());
    }
    for dev in &devices {
        println!("  [{}] {}", dev.index, dev.name);
    }

    let sink = match std::env::args().nth(1) {
        Some(name) => MidirSink::connect_by_name(&name)?,
        None => MidirSink::connect(0)?,
    };
    println!("\nPlaying on {}", sink.port_name());

    let (done_tx, done_rx) = bounded(1);
    let stream = MidiStream::builder(sink)
        .time_division(TimeDivision::TicksPerQuarter(96))
        .tempo(400_000)
        .notifier(move |_stream: MidiStream, n: Notification| match n {
            Notification::PositionReached { offset, .. } => println!("  position {}", offset),
            Notification::BufferDone(_) => {
                let _ = done_tx.send(());
            }
            _ => {}
        })
        .open()?;

    let mut events = vec![MidiEvent::program_builder(0).build()];
    for note in [60u8, 62, 64, 65, 67, 69, 71, 72] {
        events.push(MidiEvent::note_on_builder(note, 100).callback().build());
        events.push(MidiEvent::note_off(48, 0, note));
        events.push(MidiEvent::nop(48));
    }
    let buffer = Arc::new(MidiBuffer::from_events(&events)?);
    buffer.prepare();

    stream.out(&buffer)?;
    stream.restart()?;
    let _ = done_rx.recv();

    stream.close()
}
