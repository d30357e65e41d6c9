//! Core library for the legato_daq application.
//!
//! This library contains the serial protocol, transport adapters and driver for the
//! KDS Legato 110 syringe pump. It is used by both the command line tool and the
//! optional GUI.
//!
//! ```no_run
//! use legato_daq::config::Settings;
//! use legato_daq::instrument::Legato110;
//! use legato_daq::protocol::{Direction, RateUnit, TimeBase, VolumeUnit};
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let mut pump = Legato110::open(&settings.pump)?;
//!
//!     pump.set_rate(Direction::Infuse, 9, RateUnit::new(VolumeUnit::Ul, TimeBase::Minute))?;
//!     pump.set_target_volume(1.0, VolumeUnit::Ul)?;
//!     pump.set_run_direction(Direction::Infuse)?;
//!     pump.run(true)?;
//!
//!     println!("{:?}", pump.get_status()?);
//!     pump.close()?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
#[cfg(feature = "gui_egui")]
pub mod gui;
pub mod instrument;
pub mod logging;
pub mod protocol;

pub use error::{PumpError, PumpResult};
