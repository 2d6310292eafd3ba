//! Error types for MIDI stream types and the buffer codec.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid time division: {0:#06x}")]
    InvalidTimeDivision(u32),

    #[error("Truncated stream event at byte offset {offset}")]
    Truncated { offset: usize },

    #[error("Event parameter does not fit in 24 bits: {0:#x}")]
    ParameterOverflow(u32),

    #[error("Long event payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Recorded length {0} is not a multiple of the record alignment")]
    Misaligned(usize),

    #[error("Recorded length {recorded} exceeds buffer length {len}")]
    RecordedOverrun { recorded: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
