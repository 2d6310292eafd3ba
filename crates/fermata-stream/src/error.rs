//! Error types for the stream scheduler.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid stream handle")]
    InvalidHandle,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Buffer is not prepared")]
    Unprepared,

    #[error("Buffer is still queued for playback")]
    StillPlaying,

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("MIDI device error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<fermata_midi::Error> for Error {
    fn from(e: fermata_midi::Error) -> Self {
        Error::InvalidParameter(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Sink(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::Sink(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
