//! Stream configuration.

use fermata_midi::{
    TimeDivision, DEFAULT_SONG_POINTER_MIN_DIVISION, DEFAULT_TEMPO,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Initial timing and player thread settings for a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Microseconds per quarter note (default: 500000, 120 BPM)
    pub tempo: u32,
    /// Time base (default: 24 ticks per quarter note)
    pub time_division: TimeDivision,
    /// Divisions coarser than this are rounded up for song pointer
    /// positions (default: 24)
    pub song_pointer_min_division: u16,
    /// Player thread name (default: "fermata-player")
    pub thread_name: String,
    /// Raise the player thread to maximum priority (default: true).
    /// Failure to do so is logged, not fatal.
    pub realtime_priority: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            time_division: TimeDivision::default(),
            song_pointer_min_division: DEFAULT_SONG_POINTER_MIN_DIVISION,
            thread_name: "fermata-player".to_string(),
            realtime_priority: true,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        self.time_division.validate()?;
        Ok(())
    }
}
