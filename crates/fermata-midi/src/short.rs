//! Packed short messages: status in the low byte, then up to two data bytes.

use midi_msg::MidiMsg;

#[inline]
pub fn pack(status: u8, data1: u8, data2: u8) -> u32 {
    u32::from(status) | (u32::from(data1 & 0x7F) << 8) | (u32::from(data2 & 0x7F) << 16)
}

#[inline]
pub fn unpack(msg: u32) -> [u8; 3] {
    [msg as u8, (msg >> 8) as u8, (msg >> 16) as u8]
}

/// Wire length of a message starting with `status`.
///
/// Data bytes (running status) report 3, the longest possible form.
pub fn message_len(status: u8) -> usize {
    match status {
        0x80..=0xBF | 0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        0xF1 | 0xF3 => 2,
        0xF2 => 3,
        0xF0 | 0xF4..=0xFF => 1,
        _ => 3,
    }
}

/// The exact bytes a wire transport must send for `msg`.
pub fn to_bytes(msg: u32) -> ([u8; 3], usize) {
    let bytes = unpack(msg);
    (bytes, message_len(bytes[0]))
}

/// Typed view of a packed message, `None` if it does not parse.
pub fn to_midi_msg(msg: u32) -> Option<MidiMsg> {
    let (bytes, len) = to_bytes(msg);
    MidiMsg::from_midi(&bytes[..len]).ok().map(|(msg, _)| msg)
}

#[inline]
pub fn note_on(channel: u8, note: u8, velocity: u8) -> u32 {
    pack(0x90 | channel.min(15), note, velocity)
}

#[inline]
pub fn note_off(channel: u8, note: u8, velocity: u8) -> u32 {
    pack(0x80 | channel.min(15), note, velocity)
}

#[inline]
pub fn control_change(channel: u8, control: u8, value: u8) -> u32 {
    pack(0xB0 | channel.min(15), control, value)
}

#[inline]
pub fn program_change(channel: u8, program: u8) -> u32 {
    pack(0xC0 | channel.min(15), program, 0)
}

pub const CC_SUSTAIN: u8 = 64;
pub const CC_ALL_SOUND_OFF: u8 = 120;
pub const CC_RESET_ALL_CONTROLLERS: u8 = 121;
pub const CC_ALL_NOTES_OFF: u8 = 123;
