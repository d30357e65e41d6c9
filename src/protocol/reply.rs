//! Parsers for the pump's reply lines.
//!
//! Reply formats were established against the hardware; several are undocumented.
//! Anything that does not match is reported as [`PumpError::Parse`] with the raw line.

use super::command::Direction;
use super::units::{FlowRate, Volume};
use crate::error::PumpError;
use std::fmt;
use std::time::Duration;

/// Line prefixes the pump uses to reject a command.
const ERROR_MARKERS: [&str; 5] = [
    "command error",
    "argument error",
    "out of range",
    "unknown command",
    "too many arguments",
];

/// Return the line if it is a device error report.
pub fn device_error(line: &str) -> Option<&str> {
    let lower = line.trim().to_ascii_lowercase();
    let is_error = ERROR_MARKERS.iter().any(|m| lower.starts_with(m))
        || lower
            .split_whitespace()
            .any(|w| w.trim_end_matches(':') == "error");
    is_error.then(|| line.trim())
}

/// Text of the `n`-th whitespace separated token.
fn token<'a>(line: &'a str, n: usize, what: &'static str) -> Result<&'a str, PumpError> {
    line.split_whitespace()
        .nth(n)
        .ok_or_else(|| PumpError::parse(what, line))
}

/// `addr` reply, e.g. `"Pump address is 0"`; the address is the fourth token.
pub fn parse_address(line: &str) -> Result<String, PumpError> {
    token(line, 3, "address").map(str::to_string)
}

/// `force` reply, e.g. `"50%"`.
pub fn parse_force(line: &str) -> Result<u8, PumpError> {
    line.trim()
        .split('%')
        .next()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| PumpError::parse("force", line))
}

/// `load` reply, e.g. `"Quick start - Infuse only"`; direction is the fourth token.
pub fn parse_run_direction(line: &str) -> Result<Direction, PumpError> {
    match token(line, 3, "run direction")? {
        "Infuse" => Ok(Direction::Infuse),
        "Withdraw" => Ok(Direction::Withdraw),
        _ => Err(PumpError::parse("run direction", line)),
    }
}

/// Minimum and maximum flow rate for one direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimits {
    /// Slowest accepted rate
    pub min: FlowRate,
    /// Fastest accepted rate
    pub max: FlowRate,
}

impl RateLimits {
    /// Parse `"<v> <unit> to <v> <unit>"`.
    pub fn parse(line: &str) -> Result<Self, PumpError> {
        let (min, max) = line
            .trim()
            .split_once(" to ")
            .ok_or_else(|| PumpError::parse("rate limits", line))?;
        Ok(Self {
            min: min.parse()?,
            max: max.parse()?,
        })
    }

    /// Whether a rate in pL/s lies within the limits (inclusive).
    pub fn contains(&self, pl_per_s: i64) -> bool {
        (self.min.pl_per_s()..=self.max.pl_per_s()).contains(&pl_per_s)
    }
}

impl fmt::Display for RateLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.min, self.max)
    }
}

/// Target volume, which may be unset on a fresh pump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetVolume {
    /// Device reports `Target volume not set`
    NotSet,
    /// A target volume is programmed
    Set(Volume),
}

impl TargetVolume {
    /// Parse the `tvolume` reply.
    pub fn parse(line: &str) -> Result<Self, PumpError> {
        let line = line.trim();
        if line == "Target volume not set" {
            return Ok(TargetVolume::NotSet);
        }
        Ok(TargetVolume::Set(line.parse()?))
    }

    /// The volume, if set.
    pub fn volume(&self) -> Option<Volume> {
        match self {
            TargetVolume::NotSet => None,
            TargetVolume::Set(v) => Some(*v),
        }
    }
}

impl fmt::Display for TargetVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetVolume::NotSet => f.write_str("Target volume not set"),
            TargetVolume::Set(v) => v.fmt(f),
        }
    }
}

/// The six single-character flags closing a `status` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    /// `i`/`w`, upper case while moving
    pub motor_direction: char,
    /// Limit switch state
    pub limit_switch: char,
    /// Stall state
    pub stall: char,
    /// Trigger input level
    pub trigger_input: char,
    /// Direction port state
    pub direction_port: char,
    /// Target reached state
    pub target_reached: char,
}

impl StatusFlags {
    fn parse(word: &str) -> Option<Self> {
        let mut chars = word.chars();
        let flags = Self {
            motor_direction: chars.next()?,
            limit_switch: chars.next()?,
            stall: chars.next()?,
            trigger_input: chars.next()?,
            direction_port: chars.next()?,
            target_reached: chars.next()?,
        };
        chars.next().is_none().then_some(flags)
    }

    /// Motor direction, if the flag names one.
    pub fn direction(&self) -> Option<Direction> {
        match self.motor_direction.to_ascii_lowercase() {
            'i' => Some(Direction::Infuse),
            'w' => Some(Direction::Withdraw),
            _ => None,
        }
    }

    /// Motor stalled.
    pub fn is_stalled(&self) -> bool {
        self.stall.eq_ignore_ascii_case(&'s')
    }

    /// Target volume reached.
    pub fn target_reached(&self) -> bool {
        self.target_reached.eq_ignore_ascii_case(&'t')
    }
}

/// Parsed `status` reply: `<rate fL/s> <time ms> <volume fL> <flags>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpStatus {
    /// Current rate in femtolitres per second
    pub rate_fl_per_s: f64,
    /// Time spent in the current run
    pub elapsed: Duration,
    /// Volume moved in the current run, femtolitres
    pub volume_fl: f64,
    /// State flags
    pub flags: StatusFlags,
}

impl PumpStatus {
    /// Parse one `status` line.
    pub fn parse(line: &str) -> Result<Self, PumpError> {
        let err = || PumpError::parse("status", line);
        let mut parts = line.split_whitespace();
        let (Some(rate), Some(time), Some(volume), Some(flags), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(err());
        };
        Ok(Self {
            rate_fl_per_s: rate.parse().map_err(|_| err())?,
            elapsed: Duration::from_millis(time.parse().map_err(|_| err())?),
            volume_fl: volume.parse().map_err(|_| err())?,
            flags: StatusFlags::parse(flags).ok_or_else(err)?,
        })
    }

    /// Current rate in picolitres per second.
    pub fn rate_pl_per_s(&self) -> f64 {
        self.rate_fl_per_s / 1000.0
    }

    /// Moved volume in picolitres.
    pub fn volume_pl(&self) -> f64 {
        self.volume_fl / 1000.0
    }
}
