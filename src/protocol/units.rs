//! Volume and flow-rate units understood by the pump.
//!
//! The pump accepts and reports rates as `<value> <vol>/<time>` (e.g. `100 ul/min`) and
//! volumes as `<value> <vol>` (e.g. `2 ml`). Internally everything is compared in
//! picolitres and picolitres per second.

use crate::error::PumpError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Volume unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnit {
    /// Millilitre
    Ml,
    /// Microlitre
    Ul,
    /// Nanolitre
    Nl,
    /// Picolitre
    Pl,
}

impl VolumeUnit {
    /// All units, largest first.
    pub const ALL: [VolumeUnit; 4] = [VolumeUnit::Ml, VolumeUnit::Ul, VolumeUnit::Nl, VolumeUnit::Pl];

    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            VolumeUnit::Ml => "ml",
            VolumeUnit::Ul => "ul",
            VolumeUnit::Nl => "nl",
            VolumeUnit::Pl => "pl",
        }
    }

    /// Picolitres in one of this unit.
    pub fn picoliters(self) -> f64 {
        match self {
            VolumeUnit::Ml => 1e9,
            VolumeUnit::Ul => 1e6,
            VolumeUnit::Nl => 1e3,
            VolumeUnit::Pl => 1.0,
        }
    }
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeUnit {
    type Err = PumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VolumeUnit::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| PumpError::parse("volume unit", s))
    }
}

/// Time base of a flow rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeBase {
    /// per hour
    Hour,
    /// per minute
    Minute,
    /// per second
    Second,
}

impl TimeBase {
    /// All time bases, slowest first.
    pub const ALL: [TimeBase; 3] = [TimeBase::Hour, TimeBase::Minute, TimeBase::Second];

    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            TimeBase::Hour => "hr",
            TimeBase::Minute => "min",
            TimeBase::Second => "sec",
        }
    }

    /// Length of the time base in seconds.
    pub fn seconds(self) -> f64 {
        match self {
            TimeBase::Hour => 3600.0,
            TimeBase::Minute => 60.0,
            TimeBase::Second => 1.0,
        }
    }
}

/// Flow-rate unit, e.g. `ul/min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateUnit {
    /// Volume part
    pub volume: VolumeUnit,
    /// Time part
    pub per: TimeBase,
}

impl RateUnit {
    /// Construct a rate unit.
    pub const fn new(volume: VolumeUnit, per: TimeBase) -> Self {
        Self { volume, per }
    }

    /// Every rate unit the pump knows (12 combinations).
    pub fn all() -> impl Iterator<Item = RateUnit> {
        VolumeUnit::ALL
            .into_iter()
            .flat_map(|v| TimeBase::ALL.into_iter().map(move |t| RateUnit::new(v, t)))
    }

    /// Picolitres per second for a rate of 1 in this unit.
    pub fn picoliters_per_second(self) -> f64 {
        self.volume.picoliters() / self.per.seconds()
    }
}

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.volume, self.per.as_str())
    }
}

impl FromStr for RateUnit {
    type Err = PumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (volume, per) = s
            .split_once('/')
            .ok_or_else(|| PumpError::parse("rate unit", s))?;
        let per = TimeBase::ALL
            .into_iter()
            .find(|t| t.as_str() == per)
            .ok_or_else(|| PumpError::parse("rate unit", s))?;
        Ok(RateUnit::new(volume.parse()?, per))
    }
}

/// A numeric flow rate with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowRate {
    /// Value in `unit`
    pub value: f64,
    /// Unit of `value`
    pub unit: RateUnit,
}

impl FlowRate {
    /// Construct a flow rate.
    pub fn new(value: f64, unit: RateUnit) -> Self {
        Self { value, unit }
    }

    /// Rate in picolitres per second, rounded to the nearest integer.
    ///
    /// Rounding keeps comparisons between differently-unitised rates stable.
    pub fn pl_per_s(&self) -> i64 {
        (self.value * self.unit.picoliters_per_second()).round() as i64
    }
}

impl fmt::Display for FlowRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl FromStr for FlowRate {
    type Err = PumpError;

    /// Parses `"<value> <unit>"`, e.g. `"1.2345 ml/min"`. Negative and non-finite
    /// values are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PumpError::parse("flow rate", s));
        };
        let value: f64 = value
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| PumpError::parse("flow rate", s))?;
        Ok(FlowRate::new(value, unit.parse()?))
    }
}

/// A numeric volume with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    /// Value in `unit`
    pub value: f64,
    /// Unit of `value`
    pub unit: VolumeUnit,
}

impl Volume {
    /// Construct a volume.
    pub fn new(value: f64, unit: VolumeUnit) -> Self {
        Self { value, unit }
    }

    /// Volume in picolitres.
    pub fn picoliters(&self) -> f64 {
        self.value * self.unit.picoliters()
    }

    /// Equal in picolitres to within one part per million.
    pub fn approx_eq(&self, other: &Volume) -> bool {
        let (a, b) = (self.picoliters(), other.picoliters());
        (a - b).abs() <= a.abs().max(b.abs()) * 1e-6
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl FromStr for Volume {
    type Err = PumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PumpError::parse("volume", s));
        };
        let value: f64 = value
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite() && *v > 0.0)
            .ok_or_else(|| PumpError::parse("volume", s))?;
        Ok(Volume::new(value, unit.parse()?))
    }
}
