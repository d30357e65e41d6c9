//! Timing for externally (TTL) triggered runs.
//!
//! The footswitch input on the pump's D-sub 15 connector (pin 3 input, pin 9 signal
//! return) starts the loaded program without any serial traffic. Software only arms
//! the input with [`Legato110::set_footswitch_mode`](super::Legato110::set_footswitch_mode)
//! and plans the trigger train so that every pulse lands after the previous run ended:
//!
//! ```text
//! |<- pulse ->|<-------- run time -------->|<- jitter ->|
//!  5 V ‾‾‾‾‾‾‾\______________________________________________ next pulse
//! ```

use crate::error::{PumpError, PumpResult};
use std::time::Duration;

/// Shortest pulse the footswitch input registers reliably.
pub const MIN_TRIGGER_PULSE: Duration = Duration::from_millis(100);

/// Default slack after each run before the next pulse.
pub const DEFAULT_JITTER: Duration = Duration::from_millis(200);

/// TTL high level.
pub const TRIGGER_HIGH_V: f64 = 5.0;

fn samples(duration: Duration, sample_rate_hz: f64) -> usize {
    (duration.as_secs_f64() * sample_rate_hz).round() as usize
}

/// Period of a train of trigger pulses for a given run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPlan {
    /// High time of each 5 V pulse
    pub pulse: Duration,
    /// Estimated run time for the loaded direction
    pub run_time: Duration,
    /// Slack after the run
    pub jitter: Duration,
}

impl TriggerPlan {
    /// Plan with the minimum pulse and default jitter.
    pub fn new(run_time: Duration) -> Self {
        Self {
            pulse: MIN_TRIGGER_PULSE,
            run_time,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Use a longer pulse. Pulses shorter than [`MIN_TRIGGER_PULSE`] are rejected.
    pub fn with_pulse(mut self, pulse: Duration) -> PumpResult<Self> {
        if pulse < MIN_TRIGGER_PULSE {
            return Err(PumpError::InvalidInput(format!(
                "trigger pulse {:?} shorter than {:?}",
                pulse, MIN_TRIGGER_PULSE
            )));
        }
        self.pulse = pulse;
        Ok(self)
    }

    /// Use a different jitter margin.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Time from one pulse to the next.
    pub fn period(&self) -> Duration {
        self.pulse + self.run_time + self.jitter
    }

    /// Length of a train of `triggers` pulses.
    pub fn total(&self, triggers: u32) -> Duration {
        self.period() * triggers
    }

    /// Achievable run rate for a train of `triggers` pulses.
    pub fn events_per_second(&self, triggers: u32) -> f64 {
        let total = self.total(triggers).as_secs_f64();
        if total == 0.0 {
            return 0.0;
        }
        f64::from(triggers) / total
    }

    /// Analog output samples for a train of `triggers` pulses at `sample_rate_hz`.
    ///
    /// Each period starts at [`TRIGGER_HIGH_V`] for the pulse width and then drops to
    /// 0 V, so the falling edge starts the run. Every part of the period is rounded
    /// to whole samples separately.
    pub fn voltages(&self, sample_rate_hz: f64, triggers: u32) -> PumpResult<Vec<f64>> {
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(PumpError::InvalidInput(format!(
                "sample rate must be positive, got {}",
                sample_rate_hz
            )));
        }
        let high = samples(self.pulse, sample_rate_hz);
        let period = high
            + samples(self.run_time, sample_rate_hz)
            + samples(self.jitter, sample_rate_hz);

        let mut voltages = Vec::with_capacity(period * triggers as usize);
        for _ in 0..triggers {
            voltages.extend(std::iter::repeat(TRIGGER_HIGH_V).take(high));
            voltages.extend(std::iter::repeat(0.0).take(period - high));
        }
        Ok(voltages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_adds_pulse_and_jitter() {
        let plan = TriggerPlan::new(Duration::from_millis(700));
        assert_eq!(plan.period(), Duration::from_secs(1));
        assert_eq!(plan.total(2), Duration::from_secs(2));
        assert!((plan.events_per_second(2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pulse_minimum() {
        let plan = TriggerPlan::new(Duration::from_secs(1));
        assert!(plan.with_pulse(Duration::from_millis(50)).is_err());
        let plan = plan.with_pulse(Duration::from_millis(500)).unwrap();
        assert_eq!(plan.period(), Duration::from_millis(1700));
        let plan = plan.with_jitter(Duration::ZERO);
        assert_eq!(plan.period(), Duration::from_millis(1500));
    }

    #[test]
    fn test_voltage_train() {
        let plan = TriggerPlan::new(Duration::from_millis(700));
        let v = plan.voltages(1000.0, 2).unwrap();
        assert_eq!(v.len(), 2000);
        assert_eq!(v.iter().filter(|&&x| x == TRIGGER_HIGH_V).count(), 200);
        assert_eq!(v[99], TRIGGER_HIGH_V);
        assert_eq!(v[100], 0.0);
        assert_eq!(v[1000], TRIGGER_HIGH_V);
        assert!(plan.voltages(0.0, 2).is_err());
    }
}
