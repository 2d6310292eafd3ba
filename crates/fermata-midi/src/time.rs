//! Tick <-> wall-clock conversion for metrical and SMPTE time divisions.
//!
//! [`TimeConverter`] is the single place where stream timing math happens.
//! The scheduler, position queries and tests all go through it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Microseconds per quarter note at 120 BPM.
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Ticks per quarter note a freshly opened stream starts with.
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 24;

/// Song pointer positions are never computed against a coarser division.
pub const DEFAULT_SONG_POINTER_MIN_DIVISION: u16 = 24;

const SMPTE_FLAG: u32 = 0x8000;
const USEC_PER_SEC: u128 = 1_000_000;

/// Stream time base: ticks per quarter note, or absolute SMPTE frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeDivision {
    /// Metrical time. Valid range is `1..0x8000`.
    TicksPerQuarter(u16),
    /// Absolute time. `frames_per_sec` is taken literally (29 is not drop-frame).
    Smpte { frames_per_sec: u8, subframes: u8 },
}

impl TimeDivision {
    pub fn ticks_per_quarter(ticks: u16) -> Result<Self> {
        Self::TicksPerQuarter(ticks).validate()
    }

    pub fn smpte(frames_per_sec: u8, subframes: u8) -> Result<Self> {
        Self::Smpte {
            frames_per_sec,
            subframes,
        }
        .validate()
    }

    /// Decode the packed 16-bit form used by stream property calls.
    ///
    /// Bit 15 clear: ticks per quarter note. Bit 15 set: the high byte holds
    /// the negated frame rate and the low byte the subframes per frame.
    pub fn from_raw(raw: u32) -> Result<Self> {
        if raw == 0 || raw > 0xFFFF {
            return Err(Error::InvalidTimeDivision(raw));
        }
        if raw >= SMPTE_FLAG {
            let high = (raw >> 8) & 0xFF;
            let frames_per_sec = (256 - high) as u8;
            let subframes = (raw & 0xFF) as u8;
            if subframes == 0 {
                return Err(Error::InvalidTimeDivision(raw));
            }
            Ok(Self::Smpte {
                frames_per_sec,
                subframes,
            })
        } else {
            Ok(Self::TicksPerQuarter(raw as u16))
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::TicksPerQuarter(ticks) => u32::from(ticks),
            Self::Smpte {
                frames_per_sec,
                subframes,
            } => ((256 - u32::from(frames_per_sec)) << 8) | u32::from(subframes),
        }
    }

    /// Reject values that would make tick conversion meaningless.
    pub fn validate(self) -> Result<Self> {
        let valid = match self {
            Self::TicksPerQuarter(ticks) => ticks != 0 && u32::from(ticks) < SMPTE_FLAG,
            Self::Smpte {
                frames_per_sec,
                subframes,
            } => (1..=128).contains(&frames_per_sec) && subframes != 0,
        };
        if valid {
            Ok(self)
        } else {
            Err(Error::InvalidTimeDivision(self.to_raw()))
        }
    }

    #[inline]
    pub fn is_smpte(&self) -> bool {
        matches!(self, Self::Smpte { .. })
    }
}

impl Default for TimeDivision {
    fn default() -> Self {
        Self::TicksPerQuarter(DEFAULT_TICKS_PER_QUARTER)
    }
}

/// Tempo + division pair that converts between ticks and microseconds.
///
/// Conversions use 128-bit intermediates and saturate, so no input panics.
/// A zero tempo or an invalid division converts everything to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeConverter {
    pub tempo: u32,
    pub division: TimeDivision,
}

impl TimeConverter {
    #[inline]
    pub fn new(tempo: u32, division: TimeDivision) -> Self {
        Self { tempo, division }
    }

    pub fn ticks_to_usec(&self, ticks: u64) -> u64 {
        let ticks = u128::from(ticks);
        let usec = match self.division {
            TimeDivision::TicksPerQuarter(0) => 0,
            TimeDivision::TicksPerQuarter(tpq) => ticks * u128::from(self.tempo) / u128::from(tpq),
            TimeDivision::Smpte {
                frames_per_sec,
                subframes,
            } => match u128::from(frames_per_sec) * u128::from(subframes) {
                0 => 0,
                rate => ticks * USEC_PER_SEC / rate,
            },
        };
        saturate(usec)
    }

    /// Inverse of [`ticks_to_usec`](Self::ticks_to_usec), rounding down.
    pub fn usec_to_ticks(&self, usec: u64) -> u64 {
        let usec = u128::from(usec);
        let ticks = match self.division {
            TimeDivision::TicksPerQuarter(tpq) => {
                if self.tempo == 0 {
                    0
                } else {
                    usec * u128::from(tpq) / u128::from(self.tempo)
                }
            }
            TimeDivision::Smpte {
                frames_per_sec,
                subframes,
            } => usec * u128::from(frames_per_sec) * u128::from(subframes) / USEC_PER_SEC,
        };
        saturate(ticks)
    }

    /// Song position in sixteenth notes, rounded to nearest.
    ///
    /// Divisions coarser than `min_division` are treated as `min_division`.
    /// A non-zero tick count never reports position 0. Returns `None` for
    /// SMPTE streams, which have no musical position.
    pub fn song_pointer(&self, ticks: u64, min_division: u16) -> Option<u32> {
        let TimeDivision::TicksPerQuarter(tpq) = self.division else {
            return None;
        };
        let tdiv = u64::from(tpq.max(min_division));
        let sixteenth = (tdiv / 4).max(1);
        let mut position = ticks.saturating_add(tdiv / 8) / sixteenth;
        if position == 0 && ticks > 0 {
            position = 1;
        }
        Some(u32::try_from(position).unwrap_or(u32::MAX))
    }
}

impl Default for TimeConverter {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO, TimeDivision::default())
    }
}

#[inline]
fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_division_is_24_ticks() {
        assert_eq!(TimeDivision::default(), TimeDivision::TicksPerQuarter(24));
        assert_eq!(TimeDivision::default().to_raw(), 24);
    }

    #[test]
    fn test_metrical_quarter_note_at_120_bpm() {
        let conv = TimeConverter::new(500_000, TimeDivision::TicksPerQuarter(24));
        assert_eq!(conv.ticks_to_usec(24), 500_000);
        assert_eq!(conv.ticks_to_usec(12), 250_000);
        assert_eq!(conv.ticks_to_usec(0), 0);
    }

    #[test]
    fn test_metrical_large_values_do_not_overflow() {
        let conv = TimeConverter::new(0x00FF_FFFF, TimeDivision::TicksPerQuarter(1));
        assert_eq!(
            conv.ticks_to_usec(u64::from(u32::MAX)),
            u64::from(u32::MAX) * 0x00FF_FFFF
        );
    }

    #[test]
    fn test_smpte_ignores_tempo() {
        // 25 fps, 40 subframes -> 1000 ticks per second
        let division = TimeDivision::smpte(25, 40).unwrap();
        let slow = TimeConverter::new(2_000_000, division);
        let fast = TimeConverter::new(100_000, division);
        assert_eq!(slow.ticks_to_usec(1000), 1_000_000);
        assert_eq!(fast.ticks_to_usec(1000), 1_000_000);
        assert_eq!(slow.usec_to_ticks(500_000), 500);
    }

    #[test]
    fn test_raw_smpte_packing() {
        // -25 in the high byte, 40 subframes
        let raw = 0xE728;
        let division = TimeDivision::from_raw(raw).unwrap();
        assert_eq!(
            division,
            TimeDivision::Smpte {
                frames_per_sec: 25,
                subframes: 40
            }
        );
        assert_eq!(division.to_raw(), raw);
        assert!(division.is_smpte());
    }

    #[test]
    fn test_raw_rejects_zero_and_out_of_range() {
        assert_eq!(
            TimeDivision::from_raw(0),
            Err(Error::InvalidTimeDivision(0))
        );
        assert!(TimeDivision::from_raw(0x1_0000).is_err());
        assert!(TimeDivision::from_raw(0xE700).is_err());
    }

    #[test]
    fn test_validate_rejects_degenerate_divisions() {
        assert!(TimeDivision::ticks_per_quarter(0).is_err());
        assert!(TimeDivision::ticks_per_quarter(0x8000).is_err());
        assert!(TimeDivision::smpte(0, 40).is_err());
        assert!(TimeDivision::smpte(30, 0).is_err());
        assert!(TimeDivision::smpte(200, 4).is_err());
        assert!(TimeDivision::ticks_per_quarter(480).is_ok());
    }

    #[test]
    fn test_zero_tempo_never_divides_by_zero() {
        let conv = TimeConverter::new(0, TimeDivision::TicksPerQuarter(96));
        assert_eq!(conv.ticks_to_usec(96), 0);
        assert_eq!(conv.usec_to_ticks(1_000_000), 0);
    }

    #[test]
    fn test_song_pointer_rounds_to_sixteenths() {
        let conv = TimeConverter::new(500_000, TimeDivision::TicksPerQuarter(24));
        assert_eq!(conv.song_pointer(0, 24), Some(0));
        assert_eq!(conv.song_pointer(1, 24), Some(1));
        assert_eq!(conv.song_pointer(6, 24), Some(1));
        assert_eq!(conv.song_pointer(9, 24), Some(2));
        assert_eq!(conv.song_pointer(24, 24), Some(4));
    }

    #[test]
    fn test_song_pointer_clamps_coarse_division() {
        let conv = TimeConverter::new(500_000, TimeDivision::TicksPerQuarter(4));
        // Treated as 24 ticks per quarter: 12 ticks round to 2 sixteenths.
        assert_eq!(conv.song_pointer(12, 24), Some(2));
        // With the clamp lowered the real division is used.
        assert_eq!(conv.song_pointer(12, 1), Some(12));
    }

    #[test]
    fn test_song_pointer_unavailable_for_smpte() {
        let conv = TimeConverter::new(500_000, TimeDivision::smpte(30, 4).unwrap());
        assert_eq!(conv.song_pointer(100, 24), None);
    }

    proptest! {
        #[test]
        fn prop_metrical_matches_formula(
            ticks in 0u32..=u32::MAX,
            tempo in 1u32..=0x00FF_FFFF,
            tpq in 1u16..0x8000,
        ) {
            let conv = TimeConverter::new(tempo, TimeDivision::TicksPerQuarter(tpq));
            let expected = u64::from(ticks) * u64::from(tempo) / u64::from(tpq);
            prop_assert_eq!(conv.ticks_to_usec(u64::from(ticks)), expected);
        }

        #[test]
        fn prop_inverse_never_overshoots(
            ticks in 0u64..1_000_000,
            tempo in 1u32..=0x00FF_FFFF,
            tpq in 1u16..0x8000,
        ) {
            let conv = TimeConverter::new(tempo, TimeDivision::TicksPerQuarter(tpq));
            let usec = conv.ticks_to_usec(ticks);
            prop_assert!(conv.usec_to_ticks(usec) <= ticks);
        }

        #[test]
        fn prop_raw_roundtrip(raw in 1u32..=0xFFFF) {
            if let Ok(division) = TimeDivision::from_raw(raw) {
                prop_assert_eq!(division.to_raw(), raw);
                prop_assert!(division.validate().is_ok());
            }
        }

        #[test]
        fn prop_deltas_accumulate_monotonically(
            deltas in proptest::collection::vec(0u32..10_000, 1..32),
            tempo in 1u32..=2_000_000,
        ) {
            let conv = TimeConverter::new(tempo, TimeDivision::TicksPerQuarter(96));
            let mut last = 0;
            let mut total = 0u64;
            for delta in deltas {
                total += u64::from(delta);
                let usec = conv.ticks_to_usec(total);
                prop_assert!(usec >= last);
                last = usec;
            }
        }
    }
}
