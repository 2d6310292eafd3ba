//! Stream buffer wire format.
//!
//! A buffer is a run of little-endian records:
//!
//! ```text
//! +------------+-----------+-----------+----------------------------+
//! | delta: u32 | stream_id | event: u32| params (long events only)  |
//! +------------+-----------+-----------+----------------------------+
//! ```
//!
//! `event` carries the type in the high byte, the callback flag in bit 30
//! and a 24-bit parameter (message, tempo or payload length) in the low
//! bits. Long payloads are zero-padded to [`RECORD_ALIGN`].

use crate::error::{Error, Result};
use crate::event::{EventKind, MidiEvent};

pub const RECORD_ALIGN: usize = 4;
pub const EVENT_HEADER_LEN: usize = 12;

pub const EVENT_F_LONG: u32 = 0x8000_0000;
pub const EVENT_F_CALLBACK: u32 = 0x4000_0000;
const PARAM_MASK: u32 = 0x00FF_FFFF;

pub const TYPE_SHORT: u8 = 0x00;
pub const TYPE_TEMPO: u8 = 0x01;
pub const TYPE_NOP: u8 = 0x02;
pub const TYPE_LONG: u8 = 0x80;
pub const TYPE_COMMENT: u8 = 0x82;
pub const TYPE_VERSION: u8 = 0x84;

/// Stream ids in a record that match any stream.
pub const STREAM_ID_ANY: [u32; 2] = [0, 0xFFFF_FFFF];

/// A decoded record and where it sits in the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub offset: usize,
    pub stream_id: u32,
    pub event: MidiEvent,
    /// Offset of the record that follows this one.
    pub next_offset: usize,
}

#[inline]
pub const fn padded_len(len: usize) -> usize {
    (len + RECORD_ALIGN - 1) & !(RECORD_ALIGN - 1)
}

/// Decode the record at `offset`.
///
/// Returns `Ok(None)` when `offset` is exactly the end of the data and
/// [`Error::Truncated`] when a record would run past it.
pub fn decode_at(data: &[u8], offset: usize) -> Result<Option<RawEvent>> {
    if offset >= data.len() {
        return Ok(None);
    }
    let header_end = offset
        .checked_add(EVENT_HEADER_LEN)
        .filter(|end| *end <= data.len())
        .ok_or(Error::Truncated { offset })?;

    let delta_ticks = read_u32(data, offset);
    let stream_id = read_u32(data, offset + 4);
    let word = read_u32(data, offset + 8);

    let fires_callback = word & EVENT_F_CALLBACK != 0;
    let event_type = ((word & !EVENT_F_CALLBACK) >> 24) as u8;
    let param = word & PARAM_MASK;

    let (payload, next_offset) = if word & EVENT_F_LONG != 0 {
        let len = param as usize;
        let payload_end = header_end + len;
        if payload_end > data.len() {
            return Err(Error::Truncated { offset });
        }
        let next = (header_end + padded_len(len)).min(data.len());
        (&data[header_end..payload_end], next)
    } else {
        (&data[header_end..header_end], header_end)
    };

    let kind = match event_type {
        TYPE_SHORT => EventKind::ShortMessage(param),
        TYPE_TEMPO => EventKind::Tempo(param),
        TYPE_NOP => EventKind::Nop,
        TYPE_LONG => EventKind::LongMessage(payload.to_vec()),
        TYPE_COMMENT => EventKind::Comment(payload.to_vec()),
        TYPE_VERSION => EventKind::Version,
        other => EventKind::Unknown(other),
    };

    Ok(Some(RawEvent {
        offset,
        stream_id,
        event: MidiEvent {
            delta_ticks,
            kind,
            fires_callback,
        },
        next_offset,
    }))
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Iterates the records of a buffer in order.
///
/// Stops after the first [`Error::Truncated`], since nothing past a
/// broken record can be located.
pub struct EventReader<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> EventReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            offset,
            failed: false,
        }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for EventReader<'_> {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match decode_at(self.data, self.offset) {
            Ok(Some(raw)) => {
                self.offset = raw.next_offset;
                Some(Ok(raw))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Encodes events into stream buffer bytes.
#[derive(Debug, Default, Clone)]
pub struct BufferWriter {
    bytes: Vec<u8>,
    stream_id: u32,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every record with `stream_id` instead of the wildcard 0.
    pub fn with_stream_id(stream_id: u32) -> Self {
        Self {
            bytes: Vec::new(),
            stream_id,
        }
    }

    pub fn push(&mut self, event: &MidiEvent) -> Result<&mut Self> {
        let (event_type, param, payload): (u8, u32, &[u8]) = match &event.kind {
            EventKind::ShortMessage(msg) => (TYPE_SHORT, check_param(*msg)?, &[]),
            EventKind::Tempo(tempo) => (TYPE_TEMPO, check_param(*tempo)?, &[]),
            EventKind::Nop => (TYPE_NOP, 0, &[]),
            EventKind::Version => (TYPE_VERSION, 0, &[]),
            EventKind::LongMessage(data) => (TYPE_LONG, payload_len(data)?, data),
            EventKind::Comment(data) => (TYPE_COMMENT, payload_len(data)?, data),
            EventKind::Unknown(event_type) => (*event_type, 0, &[]),
        };

        let mut word = (u32::from(event_type) << 24) | param;
        if event.fires_callback {
            word |= EVENT_F_CALLBACK;
        }

        self.bytes.extend_from_slice(&event.delta_ticks.to_le_bytes());
        self.bytes.extend_from_slice(&self.stream_id.to_le_bytes());
        self.bytes.extend_from_slice(&word.to_le_bytes());
        if word & EVENT_F_LONG != 0 {
            self.bytes.extend_from_slice(payload);
            let padding = padded_len(payload.len()) - payload.len();
            self.bytes.extend(std::iter::repeat(0u8).take(padding));
        }
        Ok(self)
    }

    pub fn extend<'e>(&mut self, events: impl IntoIterator<Item = &'e MidiEvent>) -> Result<&mut Self> {
        for event in events {
            self.push(event)?;
        }
        Ok(self)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encode `events` with wildcard stream ids.
pub fn encode(events: &[MidiEvent]) -> Result<Vec<u8>> {
    let mut writer = BufferWriter::new();
    writer.extend(events)?;
    Ok(writer.finish())
}

#[inline]
fn check_param(value: u32) -> Result<u32> {
    if value > PARAM_MASK {
        Err(Error::ParameterOverflow(value))
    } else {
        Ok(value)
    }
}

#[inline]
fn payload_len(data: &[u8]) -> Result<u32> {
    u32::try_from(data.len())
        .ok()
        .filter(|len| *len <= PARAM_MASK)
        .ok_or(Error::PayloadTooLarge(data.len()))
}
