//! KDS Legato 110 serial protocol.
//!
//! Pure encoding and decoding, no I/O:
//!
//! - [`command`]: the command set and its rendering to ASCII lines
//! - [`prompt`]: the state prompt closing every reply
//! - [`reply`]: parsers for reply lines, including device error detection
//! - [`units`]: volume and rate units with picolitre conversion

pub mod command;
pub mod prompt;
pub mod reply;
pub mod units;

pub use command::{Command, Direction, FootswitchMode, TERMINATOR};
pub use prompt::Prompt;
pub use reply::{PumpStatus, RateLimits, StatusFlags, TargetVolume};
pub use units::{FlowRate, RateUnit, TimeBase, Volume, VolumeUnit};
