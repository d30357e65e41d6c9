//! Instrument drivers.

pub mod legato110;
pub mod trigger;

pub use legato110::{Legato110, PerDirection, PumpInfo, RateRequest, RunTimes};
pub use trigger::TriggerPlan;
