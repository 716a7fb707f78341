//! Timescales for trace timestamps.
//!
//! The recorder itself only sees host-supplied logical timestamps. A
//! [`Timescale`] says what one tick of that clock means, in the form trace
//! formats expect: a magnitude of 1, 10 or 100 times a power-of-1000 unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;

/// A base time unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Seconds.
    S,
    /// Milliseconds.
    Ms,
    /// Microseconds.
    Us,
    /// Nanoseconds.
    Ns,
    /// Picoseconds.
    Ps,
    /// Femtoseconds.
    Fs,
}

impl TimeUnit {
    /// Returns the power-of-ten exponent of this unit relative to one second.
    pub fn exponent(self) -> i8 {
        match self {
            TimeUnit::S => 0,
            TimeUnit::Ms => -3,
            TimeUnit::Us => -6,
            TimeUnit::Ns => -9,
            TimeUnit::Ps => -12,
            TimeUnit::Fs => -15,
        }
    }

    /// Returns the number of femtoseconds in one unit.
    pub fn fs(self) -> u64 {
        match self {
            TimeUnit::S => FS_PER_S,
            TimeUnit::Ms => FS_PER_MS,
            TimeUnit::Us => FS_PER_US,
            TimeUnit::Ns => FS_PER_NS,
            TimeUnit::Ps => FS_PER_PS,
            TimeUnit::Fs => 1,
        }
    }

    /// Returns the conventional suffix (`"ns"`, `"ps"`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
            TimeUnit::Ps => "ps",
            TimeUnit::Fs => "fs",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s" => Some(TimeUnit::S),
            "ms" => Some(TimeUnit::Ms),
            "us" => Some(TimeUnit::Us),
            "ns" => Some(TimeUnit::Ns),
            "ps" => Some(TimeUnit::Ps),
            "fs" => Some(TimeUnit::Fs),
            _ => None,
        }
    }
}

/// The duration of one timestamp tick, e.g. `1ns` or `10ps`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timescale {
    magnitude: u16,
    unit: TimeUnit,
}

impl Timescale {
    /// Creates a timescale. Returns `None` unless `magnitude` is 1, 10 or 100.
    pub fn new(magnitude: u16, unit: TimeUnit) -> Option<Self> {
        matches!(magnitude, 1 | 10 | 100).then_some(Self { magnitude, unit })
    }

    /// Returns the magnitude (1, 10 or 100).
    pub fn magnitude(&self) -> u16 {
        self.magnitude
    }

    /// Returns the base unit.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Returns the power-of-ten exponent of one tick relative to one second.
    ///
    /// `1ns` is `-9`, `10ns` is `-8`, `100ps` is `-10`.
    pub fn exponent(&self) -> i8 {
        let shift = match self.magnitude {
            100 => 2,
            10 => 1,
            _ => 0,
        };
        self.unit.exponent() + shift
    }

    /// Returns the number of femtoseconds in one tick.
    pub fn fs_per_tick(&self) -> u64 {
        self.magnitude as u64 * self.unit.fs()
    }
}

impl Default for Timescale {
    fn default() -> Self {
        Self {
            magnitude: 1,
            unit: TimeUnit::Ns,
        }
    }
}

impl fmt::Display for Timescale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

/// Error returned when a timescale string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timescale: '{input}'")]
pub struct ParseTimescaleError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for Timescale {
    type Err = ParseTimescaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseTimescaleError {
            input: s.to_string(),
        };

        let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (num, unit) = s.split_at(digit_end);
        let magnitude: u16 = if num.is_empty() {
            1
        } else {
            num.parse().map_err(|_| err())?
        };
        let unit = TimeUnit::from_suffix(unit.trim()).ok_or_else(err)?;
        Timescale::new(magnitude, unit).ok_or_else(err)
    }
}

impl TryFrom<String> for Timescale {
    type Error = ParseTimescaleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timescale> for String {
    fn from(ts: Timescale) -> Self {
        ts.to_string()
    }
}
