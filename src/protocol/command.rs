//! Pump commands and their wire rendering.
//!
//! Every command is a single ASCII line `"<verb>[ <args>]"` terminated by a carriage
//! return. The device answers with a line feed, a fixed number of reply lines and a
//! prompt (see [`Prompt`](super::Prompt)).

use super::units::{RateUnit, Volume};
use crate::error::PumpError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Command terminator expected by the pump.
pub const TERMINATOR: &str = "\r";

/// Motion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Push fluid out of the syringe
    Infuse,
    /// Pull fluid into the syringe
    Withdraw,
}

impl Direction {
    /// Rate verb for this direction (`irate` / `wrate`).
    pub fn rate_verb(self) -> &'static str {
        match self {
            Direction::Infuse => "irate",
            Direction::Withdraw => "wrate",
        }
    }

    /// Quick-start method letter used by `load qs`.
    fn quick_start(self) -> &'static str {
        match self {
            Direction::Infuse => "i",
            Direction::Withdraw => "w",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Infuse => "infuse",
            Direction::Withdraw => "withdraw",
        })
    }
}

impl FromStr for Direction {
    type Err = PumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "infuse" | "i" => Ok(Direction::Infuse),
            "withdraw" | "w" => Ok(Direction::Withdraw),
            _ => Err(PumpError::InvalidInput(format!(
                "unknown run direction '{}'",
                s
            ))),
        }
    }
}

/// Behaviour of the footswitch (TTL trigger) input.
///
/// With `FallingEdge` a 5 V pulse returning to 0 V starts the loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FootswitchMode {
    /// Runs while the input is held
    #[serde(rename = "mom")]
    Momentary,
    /// Active high
    #[serde(rename = "rise")]
    RisingEdge,
    /// Active low
    #[serde(rename = "fall")]
    FallingEdge,
}

impl FootswitchMode {
    /// Argument spelling for `ftswitch <mode>`.
    pub fn as_arg(self) -> &'static str {
        match self {
            FootswitchMode::Momentary => "mom",
            FootswitchMode::RisingEdge => "rise",
            FootswitchMode::FallingEdge => "fall",
        }
    }

    /// Parse the device's description of the mode.
    pub fn from_reply(reply: &str) -> Result<Self, PumpError> {
        match reply.trim() {
            "Momentary" => Ok(FootswitchMode::Momentary),
            "Active high" => Ok(FootswitchMode::RisingEdge),
            "Active low" => Ok(FootswitchMode::FallingEdge),
            other => Err(PumpError::parse("footswitch mode", other)),
        }
    }
}

impl fmt::Display for FootswitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for FootswitchMode {
    type Err = PumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mom" => Ok(FootswitchMode::Momentary),
            "rise" => Ok(FootswitchMode::RisingEdge),
            "fall" => Ok(FootswitchMode::FallingEdge),
            _ => Err(PumpError::InvalidInput(format!(
                "unexpected footswitch mode '{}' (mom, rise or fall)",
                s
            ))),
        }
    }
}

/// A single pump command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `echo`: query echo mode
    Echo,
    /// `poll`: query poll mode
    Poll,
    /// `addr`: query device address
    Address,
    /// `ver`: short firmware version
    Ver,
    /// `version`: long version report
    Version,
    /// `ftswitch`: query footswitch mode
    Footswitch,
    /// `ftswitch <mode>`
    SetFootswitch(FootswitchMode),
    /// `force`: query motor force
    Force,
    /// `force <pct>`
    SetForce(u8),
    /// `status`
    Status,
    /// `syrm`: syringe manufacturer and size
    SyringeModel,
    /// `wrate lim` / `irate lim`
    RateLimits(Direction),
    /// `wrate` / `irate`
    Rate(Direction),
    /// `wrate <n> <unit>` / `irate <n> <unit>`
    SetRate(Direction, u32, RateUnit),
    /// `tvolume`
    TargetVolume,
    /// `tvolume <v> <unit>`
    SetTargetVolume(Volume),
    /// `load`: query loaded method
    Load,
    /// `load qs <i|w>`: load quick-start method for one direction
    LoadQuickStart(Direction),
    /// `run`
    Run,
    /// `stop`
    Stop,
}

impl Command {
    /// Number of reply lines the device sends before its prompt.
    pub fn response_lines(&self) -> usize {
        match self {
            Command::Version => 3,
            Command::Echo
            | Command::Poll
            | Command::Address
            | Command::Ver
            | Command::Footswitch
            | Command::Force
            | Command::Status
            | Command::SyringeModel
            | Command::RateLimits(_)
            | Command::Rate(_)
            | Command::TargetVolume
            | Command::Load => 1,
            Command::SetFootswitch(_)
            | Command::SetForce(_)
            | Command::SetRate(..)
            | Command::SetTargetVolume(_)
            | Command::LoadQuickStart(_)
            | Command::Run
            | Command::Stop => 0,
        }
    }

    /// Bytes to put on the wire, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        format!("{}{}", self, TERMINATOR).into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Echo => f.write_str("echo"),
            Command::Poll => f.write_str("poll"),
            Command::Address => f.write_str("addr"),
            Command::Ver => f.write_str("ver"),
            Command::Version => f.write_str("version"),
            Command::Footswitch => f.write_str("ftswitch"),
            Command::SetFootswitch(mode) => write!(f, "ftswitch {}", mode.as_arg()),
            Command::Force => f.write_str("force"),
            Command::SetForce(pct) => write!(f, "force {}", pct),
            Command::Status => f.write_str("status"),
            Command::SyringeModel => f.write_str("syrm"),
            Command::RateLimits(dir) => write!(f, "{} lim", dir.rate_verb()),
            Command::Rate(dir) => f.write_str(dir.rate_verb()),
            Command::SetRate(dir, rate, unit) => write!(f, "{} {} {}", dir.rate_verb(), rate, unit),
            Command::TargetVolume => f.write_str("tvolume"),
            Command::SetTargetVolume(volume) => write!(f, "tvolume {}", volume),
            Command::Load => f.write_str("load"),
            Command::LoadQuickStart(dir) => write!(f, "load qs {}", dir.quick_start()),
            Command::Run => f.write_str("run"),
            Command::Stop => f.write_str("stop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::units::{TimeBase, VolumeUnit};

    #[test]
    fn test_rate_commands_render_exactly() {
        let ul_min = RateUnit::new(VolumeUnit::Ul, TimeBase::Minute);
        assert_eq!(
            Command::SetRate(Direction::Infuse, 9, ul_min).encode(),
            b"irate 9 ul/min\r"
        );
        let ml_hr = RateUnit::new(VolumeUnit::Ml, TimeBase::Hour);
        assert_eq!(
            Command::SetRate(Direction::Withdraw, 120, ml_hr).to_string(),
            "wrate 120 ml/hr"
        );
        assert_eq!(Command::RateLimits(Direction::Withdraw).to_string(), "wrate lim");
        assert_eq!(Command::Rate(Direction::Infuse).to_string(), "irate");
    }

    #[test]
    fn test_volume_and_setup_commands() {
        let vol = Volume::new(2.0, VolumeUnit::Nl);
        assert_eq!(Command::SetTargetVolume(vol).encode(), b"tvolume 2 nl\r");
        let vol = Volume::new(0.25, VolumeUnit::Ml);
        assert_eq!(Command::SetTargetVolume(vol).to_string(), "tvolume 0.25 ml");
        assert_eq!(Command::SetForce(50).to_string(), "force 50");
        assert_eq!(
            Command::SetFootswitch(FootswitchMode::FallingEdge).to_string(),
            "ftswitch fall"
        );
        assert_eq!(Command::LoadQuickStart(Direction::Withdraw).to_string(), "load qs w");
        assert_eq!(Command::Address.to_string(), "addr");
        assert_eq!(Command::SyringeModel.to_string(), "syrm");
    }

    #[test]
    fn test_response_line_counts() {
        assert_eq!(Command::Version.response_lines(), 3);
        assert_eq!(Command::Status.response_lines(), 1);
        assert_eq!(Command::Run.response_lines(), 0);
    }

    #[test]
    fn test_footswitch_reply_mapping() {
        assert_eq!(
            FootswitchMode::from_reply("Active low").unwrap(),
            FootswitchMode::FallingEdge
        );
        assert_eq!(
            FootswitchMode::from_reply("Momentary").unwrap(),
            FootswitchMode::Momentary
        );
        assert!(FootswitchMode::from_reply("Toggle").is_err());
        assert!("edge".parse::<FootswitchMode>().is_err());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("Infuse".parse::<Direction>().unwrap(), Direction::Infuse);
        assert_eq!("w".parse::<Direction>().unwrap(), Direction::Withdraw);
        assert!("both".parse::<Direction>().is_err());
    }
}
