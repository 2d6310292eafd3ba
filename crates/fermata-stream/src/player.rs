//! The per-stream player thread.
//!
//! One loop consumes both the command channel and the buffer queue. While
//! playing, the wait for the next event is a `recv_deadline` on the command
//! channel, so a command always preempts a pending rest. The deadline is
//! recomputed from the shared timing after every command, which is what
//! makes pause/resume shift a pending event and a tempo change re-time it.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use fermata_midi::codec;
use fermata_midi::{short, EventKind, MidiEvent};
use tracing::{trace, warn};

use crate::buffer::MidiBuffer;
use crate::command::Command;
use crate::notify::Notification;
use crate::shared::{Due, Flow, StreamShared, StreamStatus};

/// Where the player is inside the queue head.
struct Cursor {
    buffer: Arc<MidiBuffer>,
    epoch: u64,
    offset: usize,
}

pub(crate) fn run(shared: Arc<StreamShared>, commands: Receiver<Command>) {
    let mut cursor: Option<Cursor> = None;

    'player: loop {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    if handle(&shared, command) == Flow::Quit {
                        break 'player;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'player,
            }
        }

        if step(&shared, &commands, &mut cursor) == Flow::Quit {
            break;
        }
    }

    let leftover = shared.queue.lock().close();
    shared.return_buffers(leftover);
    trace!("Stream {}: player exited", shared.id);
}

fn handle(shared: &StreamShared, command: Command) -> Flow {
    let flow = shared.apply(command.kind);
    command.acknowledge();
    flow
}

fn wait_for_command(shared: &StreamShared, commands: &Receiver<Command>) -> Flow {
    match commands.recv() {
        Ok(command) => handle(shared, command),
        Err(_) => Flow::Quit,
    }
}

/// Play at most one event, or block until something changes.
fn step(shared: &StreamShared, commands: &Receiver<Command>, cursor: &mut Option<Cursor>) -> Flow {
    if shared.timing.lock().status != StreamStatus::Playing {
        return wait_for_command(shared, commands);
    }

    let head = shared.queue.lock().front();
    let Some((buffer, epoch)) = head else {
        *cursor = None;
        shared.timing.lock().idle = true;
        return wait_for_command(shared, commands);
    };

    let resume_at = cursor
        .as_ref()
        .filter(|c| c.epoch == epoch && Arc::ptr_eq(&c.buffer, &buffer))
        .map(|c| c.offset);
    let offset = match resume_at {
        Some(offset) => offset,
        None => {
            trace!(
                "Stream {}: starting buffer ({} bytes)",
                shared.id,
                buffer.bytes_recorded()
            );
            *cursor = None;
            let mut timing = shared.timing.lock();
            if timing.idle {
                // Deltas of a buffer that arrives after the queue ran dry
                // count from its arrival
                timing.catch_up(Instant::now());
            }
            0
        }
    };

    let raw = match codec::decode_at(buffer.data(), offset) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            *cursor = None;
            finish(shared, &buffer, epoch);
            return Flow::Continue;
        }
        Err(e) => {
            warn!("Stream {}: dropping rest of buffer: {}", shared.id, e);
            *cursor = None;
            finish(shared, &buffer, epoch);
            return Flow::Continue;
        }
    };

    *cursor = Some(Cursor {
        buffer: Arc::clone(&buffer),
        epoch,
        offset,
    });

    let delta = raw.event.delta_ticks;
    if delta > 0 {
        let due = shared.timing.lock().deadline(delta);
        let waited = match due {
            Due::NotPlaying => return Flow::Continue,
            Due::At(deadline) => commands.recv_deadline(deadline),
            Due::Never => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match waited {
            // Re-evaluated on the next step; the event has not been played
            Ok(command) => return handle(shared, command),
            Err(RecvTimeoutError::Timeout) => {
                shared.timing.lock().commit(delta, Instant::now());
            }
            Err(RecvTimeoutError::Disconnected) => return Flow::Quit,
        }
    }

    dispatch(shared, &raw.event);

    if let Some(c) = cursor.as_mut() {
        c.offset = raw.next_offset;
    }

    if raw.event.fires_callback {
        buffer.set_offset(raw.next_offset);
        shared.notify(Notification::PositionReached {
            buffer,
            offset: raw.next_offset,
        });
    }

    Flow::Continue
}

fn dispatch(shared: &StreamShared, event: &MidiEvent) {
    match &event.kind {
        EventKind::ShortMessage(msg) => {
            trace!("Stream {}: {:?}", shared.id, short::to_midi_msg(*msg));
            let mut sink = shared.sink.lock();
            if !sink.is_ready() {
                warn!("Stream {}: sink not ready, dropping {:#08x}", shared.id, msg);
            } else if let Err(e) = sink.send_short(*msg) {
                warn!("Stream {}: short message failed: {}", shared.id, e);
            }
        }
        EventKind::LongMessage(data) => {
            let mut sink = shared.sink.lock();
            if !sink.is_ready() {
                warn!(
                    "Stream {}: sink not ready, dropping {} byte message",
                    shared.id,
                    data.len()
                );
            } else if let Err(e) = sink.send_long(data) {
                warn!("Stream {}: long message failed: {}", shared.id, e);
            }
        }
        EventKind::Tempo(tempo) => {
            trace!("Stream {}: tempo {}", shared.id, tempo);
            shared.timing.lock().tempo = *tempo;
        }
        EventKind::Comment(_) | EventKind::Nop | EventKind::Version => {}
        EventKind::Unknown(kind) => {
            warn!("Stream {}: unknown event type {:#04x}", shared.id, kind);
        }
    }
}

/// Retire the queue head, unless a stop already flushed it.
fn finish(shared: &StreamShared, buffer: &Arc<MidiBuffer>, epoch: u64) {
    let popped = {
        let mut queue = shared.queue.lock();
        let is_head = queue
            .front()
            .is_some_and(|(head, e)| e == epoch && Arc::ptr_eq(&head, buffer));
        if is_head {
            queue.pop()
        } else {
            None
        }
    };
    if let Some(buffer) = popped {
        shared.return_buffers(vec![buffer]);
    }
}
