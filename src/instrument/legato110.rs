//! KDS Legato 110 syringe pump driver
//!
//! Basic device adaptor for the KDS Legato 110 single syringe, programmable touch
//! screen infusion/withdrawal pump. Only the commands needed to load and run a
//! quick-start program are implemented; the pump knows many more.
//!
//! ## Protocol
//!
//! The pump must be in its factory communication mode: echo `OFF`, poll `OFF`,
//! address `0`. [`Legato110::connect`] checks this before anything else. Each
//! transaction then looks like:
//!
//! ```text
//! -> "irate\r"
//! <- "\r\n"                 leading line feed, discarded
//! <- "100 ul/min\r\n"       zero or more reply lines
//! <- ":"                    prompt (":", ">", "<", "*" or "T*")
//! ```
//!
//! When a run finishes the pump prints `"\r\nT*"` on its own. If that happens to
//! coincide with another command's reply the extra prompt is consumed and the run
//! is marked finished.
//!
//! ## Configuration
//!
//! ```toml
//! [pump]
//! port = "COM3"
//! footswitch_mode = "fall"   # a falling 5 V TTL edge runs the program
//! force_pct = 50             # safe for glass syringes
//! ```

#[cfg(feature = "instrument_serial")]
use crate::adapters::SerialAdapter;
use crate::{
    adapters::Adapter,
    config::PumpConfig,
    error::{PumpError, PumpResult},
    protocol::{
        reply, Command, Direction, FlowRate, FootswitchMode, Prompt, PumpStatus, RateLimits,
        RateUnit, TargetVolume, Volume, VolumeUnit,
    },
};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Start of the `ver` reply of a supported pump.
const DEVICE_ID: &str = "Legato 110";

/// A value held once per motion direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerDirection<T> {
    /// Withdraw value
    pub withdraw: T,
    /// Infuse value
    pub infuse: T,
}

impl<T: Copy> PerDirection<T> {
    /// Value for `direction`.
    pub fn get(&self, direction: Direction) -> T {
        match direction {
            Direction::Withdraw => self.withdraw,
            Direction::Infuse => self.infuse,
        }
    }
}

/// Estimated time to move the target volume in each direction.
pub type RunTimes = PerDirection<Duration>;

/// Requested flow rate.
///
/// Only integer values are accepted; fractional rates do not survive the round trip
/// through the pump's display formatting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateRequest {
    /// Slowest rate the loaded syringe allows
    Min,
    /// Fastest rate the loaded syringe allows
    Max,
    /// Explicit rate
    Value(u32, RateUnit),
}

impl RateRequest {
    /// Integer rate and unit to send. `Min` rounds the lower limit half to even,
    /// `Max` truncates the upper limit.
    fn resolve(self, limits: &RateLimits) -> (u32, RateUnit) {
        match self {
            RateRequest::Min => (limits.min.value.round_ties_even() as u32, limits.min.unit),
            RateRequest::Max => (limits.max.value.trunc() as u32, limits.max.unit),
            RateRequest::Value(rate, unit) => (rate, unit),
        }
    }
}

/// Settings read from the pump, refreshed by the corresponding getters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PumpInfo {
    /// `ver` reply
    pub firmware_version: String,
    /// `version` reply lines
    pub version_details: Vec<String>,
    /// `syrm` reply
    pub syringe_type: String,
    /// Footswitch mode
    pub footswitch_mode: Option<FootswitchMode>,
    /// Motor force, percent
    pub force_pct: Option<u8>,
    /// Rate limits for the loaded syringe
    pub rate_limits: Option<PerDirection<RateLimits>>,
    /// Programmed flow rates
    pub flow_rates: Option<PerDirection<FlowRate>>,
    /// Programmed target volume
    pub target_volume: Option<TargetVolume>,
    /// Loaded quick-start direction
    pub run_direction: Option<Direction>,
    /// Run time estimate from the values above
    pub run_times: Option<RunTimes>,
}

/// Driver for the KDS Legato 110.
///
/// Owns its adapter exclusively; every operation takes `&mut self`, so at most one
/// command is ever in flight. Operations block until the reply prompt is read or the
/// adapter's timeout elapses.
pub struct Legato110<A: Adapter> {
    name: String,
    adapter: A,
    running: bool,
    last_prompt: Option<Prompt>,
    direction_settle: Duration,
    run_margin: Duration,
    max_run_wait: Duration,
    info: PumpInfo,
}

#[cfg(feature = "instrument_serial")]
impl Legato110<SerialAdapter> {
    /// Open the configured serial port and [`connect`](Self::connect).
    pub fn open(config: &PumpConfig) -> PumpResult<Self> {
        info!(pump = %config.name, "opening {} at {} baud", config.port, config.baud_rate);
        let adapter = SerialAdapter::open(&config.port, config.baud_rate, config.timeout())?;
        Self::connect(adapter, config)
    }
}

impl<A: Adapter> Legato110<A> {
    /// Take over an adapter, verify the communication mode and apply the setup.
    ///
    /// Sequence: check echo/poll/address, read the firmware version, arm the
    /// footswitch mode and force from `config`, then read status, syringe type, rate
    /// limits, rates, target volume and run direction. A missing target volume or a
    /// zero rate only leaves the run time estimate empty.
    pub fn connect(adapter: A, config: &PumpConfig) -> PumpResult<Self> {
        let mut pump = Self {
            name: config.name.clone(),
            adapter,
            running: false,
            last_prompt: None,
            direction_settle: config.direction_settle(),
            run_margin: config.run_margin(),
            max_run_wait: config.max_run_wait(),
            info: PumpInfo::default(),
        };

        pump.check_communication_mode()?;
        let version = pump.firmware_version()?;
        if !version.starts_with(DEVICE_ID) {
            return Err(PumpError::UnexpectedResponse(format!(
                "unexpected device '{}', expected {}",
                version, DEVICE_ID
            )));
        }
        pump.version_details()?;

        pump.set_footswitch_mode(config.footswitch_mode)?;
        pump.set_force(config.force_pct)?;

        pump.status()?;
        pump.syringe_type()?;
        pump.flow_rate_limits()?;
        pump.flow_rates()?;
        pump.target_volume()?;
        pump.run_direction()?;
        match pump.compute_run_times() {
            Ok(times) => pump.info.run_times = Some(times),
            Err(PumpError::InvalidInput(reason)) => {
                warn!(pump = %pump.name, "no run time estimate: {}", reason);
            }
            Err(e) => return Err(e),
        }

        info!(
            pump = %pump.name,
            adapter = pump.adapter.name(),
            "connected ({})",
            pump.info.firmware_version
        );
        Ok(pump)
    }

    /// Name used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached device settings.
    pub fn info(&self) -> &PumpInfo {
        &self.info
    }

    /// Whether a `run` was started and its `T*` has not been read yet.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Prompt of the most recent reply.
    pub fn last_prompt(&self) -> Option<Prompt> {
        self.last_prompt
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The underlying adapter, mutably.
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Read one `\n` terminated line within `timeout`, trimmed.
    fn read_line(&mut self, timeout: Duration) -> PumpResult<String> {
        let deadline = Instant::now() + timeout;
        let mut bytes = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PumpError::Timeout(timeout));
            }
            let byte = self.adapter.read_byte(remaining).map_err(|e| match e {
                PumpError::Timeout(_) => PumpError::Timeout(timeout),
                other => other,
            })?;
            if byte == b'\n' {
                break;
            }
            bytes.push(byte);
        }
        if !bytes.is_ascii() {
            return Err(PumpError::UnexpectedResponse(
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }
        Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }

    /// Read and decode the prompt closing a reply.
    fn read_prompt(&mut self, command: &str, timeout: Duration) -> PumpResult<Prompt> {
        let first = self.adapter.read_byte(timeout)?;
        let mut token = String::from(first as char);
        if first == b'T' {
            // "T*" is the only two-character prompt
            token.push(self.adapter.read_byte(timeout)? as char);
        }

        let prompt = match Prompt::parse(&token) {
            Ok(prompt) => prompt,
            Err(_) => {
                let rest = self.read_line(timeout)?;
                let full = format!("{}{}", token, rest);
                self.discard_pending();
                if let Some(message) = reply::device_error(&full) {
                    return Err(PumpError::Device {
                        command: command.to_string(),
                        message: message.to_string(),
                    });
                }
                return Err(PumpError::UnexpectedPrompt { prompt: token, rest });
            }
        };

        debug!(pump = %self.name, "prompt = {} ({})", prompt, prompt.message());
        self.last_prompt = Some(prompt);
        Ok(prompt)
    }

    /// Drop whatever is still waiting in the receive buffer.
    fn discard_pending(&mut self) {
        let timeout = self.adapter.timeout();
        while matches!(self.adapter.bytes_to_read(), Ok(n) if n > 0) {
            if self.adapter.read_byte(timeout).is_err() {
                break;
            }
        }
    }

    /// Execute one command/reply transaction and return the reply lines.
    fn send(&mut self, command: &Command) -> PumpResult<Vec<String>> {
        let text = command.to_string();
        let timeout = self.adapter.timeout();
        debug!(pump = %self.name, "sending cmd = {:?}", text);

        self.adapter.write(&command.encode())?;
        self.read_line(timeout)?; // leading line feed

        let expected = command.response_lines();
        let mut responses = Vec::with_capacity(expected);
        for i in 0..expected {
            let line = self.read_line(timeout)?;
            trace!(pump = %self.name, "response ({}) = {}", i, line);
            if let Some(message) = reply::device_error(&line) {
                let message = message.to_string();
                self.discard_pending();
                return Err(PumpError::Device {
                    command: text,
                    message,
                });
            }
            responses.push(line);
        }

        let prompt = self.read_prompt(&text, timeout)?;

        if self.adapter.bytes_to_read()? != 0 {
            if self.running {
                // The run finished while this command was being answered.
                self.read_line(timeout)?;
                let finished = self.read_prompt(&text, timeout)?;
                if finished != Prompt::TargetReached {
                    return Err(PumpError::UnexpectedPrompt {
                        prompt: finished.to_string(),
                        rest: format!("expected T* after '{}'", text),
                    });
                }
                self.running = false;
                info!(pump = %self.name, " -> finished running");
            } else {
                let unexpected = self.read_line(timeout)?;
                return Err(PumpError::UnexpectedResponse(unexpected));
            }
        }

        if prompt.is_alarm() {
            return Err(PumpError::Alarm {
                command: text,
                alarm: prompt.message().to_string(),
            });
        }

        Ok(responses)
    }

    /// Send a query and return its single reply line.
    fn query(&mut self, command: Command) -> PumpResult<String> {
        let text = command.to_string();
        self.send(&command)?
            .into_iter()
            .next()
            .ok_or_else(|| PumpError::UnexpectedResponse(format!("no reply to '{}'", text)))
    }

    // ------------------------------------------------------------------------
    // Communication setup
    // ------------------------------------------------------------------------

    fn check_communication_mode(&mut self) -> PumpResult<()> {
        let echo = self.echo()?;
        if echo != "OFF" {
            return Err(PumpError::UnexpectedResponse(format!(
                "echo is '{}', expected OFF",
                echo
            )));
        }
        let poll = self.poll()?;
        if poll != "OFF" {
            return Err(PumpError::UnexpectedResponse(format!(
                "poll is '{}', expected OFF",
                poll
            )));
        }
        let address = self.address()?;
        if address != "0" {
            return Err(PumpError::UnexpectedResponse(format!(
                "address is '{}', expected 0",
                address
            )));
        }
        Ok(())
    }

    /// Echo mode (`ON`/`OFF`).
    pub fn echo(&mut self) -> PumpResult<String> {
        debug!(pump = %self.name, "getting echo");
        self.query(Command::Echo)
    }

    /// Poll mode (`ON`/`OFF`).
    pub fn poll(&mut self) -> PumpResult<String> {
        debug!(pump = %self.name, "getting poll");
        self.query(Command::Poll)
    }

    /// Device address.
    pub fn address(&mut self) -> PumpResult<String> {
        debug!(pump = %self.name, "getting address");
        let line = self.query(Command::Address)?;
        reply::parse_address(&line)
    }

    /// Short firmware version (`ver`).
    pub fn firmware_version(&mut self) -> PumpResult<String> {
        debug!(pump = %self.name, "getting ver");
        let version = self.query(Command::Ver)?;
        self.info.firmware_version = version.clone();
        Ok(version)
    }

    /// Long version report (`version`), three lines.
    pub fn version_details(&mut self) -> PumpResult<Vec<String>> {
        debug!(pump = %self.name, "getting version");
        let lines = self.send(&Command::Version)?;
        for line in &lines {
            debug!(pump = %self.name, " -> {}", line);
        }
        self.info.version_details = lines.clone();
        Ok(lines)
    }

    // ------------------------------------------------------------------------
    // Footswitch and force
    // ------------------------------------------------------------------------

    /// Current footswitch (TTL trigger input) mode.
    pub fn footswitch_mode(&mut self) -> PumpResult<FootswitchMode> {
        debug!(pump = %self.name, "getting footswitch mode");
        let line = self.query(Command::Footswitch)?;
        let mode = FootswitchMode::from_reply(&line)?;
        self.info.footswitch_mode = Some(mode);
        Ok(mode)
    }

    /// Arm the footswitch input. With [`FootswitchMode::FallingEdge`] a falling 5 V
    /// TTL edge on the footswitch pin starts the loaded program.
    pub fn set_footswitch_mode(&mut self, mode: FootswitchMode) -> PumpResult<()> {
        debug!(pump = %self.name, "setting footswitch mode = {}", mode);
        self.send(&Command::SetFootswitch(mode))?;
        let actual = self.footswitch_mode()?;
        if actual != mode {
            return Err(PumpError::Verification {
                requested: mode.to_string(),
                actual: actual.to_string(),
            });
        }
        debug!(pump = %self.name, " -> done setting footswitch mode");
        Ok(())
    }

    /// Motor force in percent.
    pub fn force(&mut self) -> PumpResult<u8> {
        debug!(pump = %self.name, "getting force");
        let line = self.query(Command::Force)?;
        let force = reply::parse_force(&line)?;
        self.info.force_pct = Some(force);
        Ok(force)
    }

    /// Set motor force, 1-100 %.
    pub fn set_force(&mut self, force_pct: u8) -> PumpResult<()> {
        if !(1..=100).contains(&force_pct) {
            return Err(PumpError::InvalidInput(format!(
                "force {}% out of range (1-100)",
                force_pct
            )));
        }
        debug!(pump = %self.name, "setting force = {}%", force_pct);
        self.send(&Command::SetForce(force_pct))?;
        let actual = self.force()?;
        if actual != force_pct {
            return Err(PumpError::Verification {
                requested: format!("{}%", force_pct),
                actual: format!("{}%", actual),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    /// Query the pump's status word.
    pub fn status(&mut self) -> PumpResult<PumpStatus> {
        debug!(pump = %self.name, "getting status");
        let line = self.query(Command::Status)?;
        let status = PumpStatus::parse(&line)?;
        debug!(
            pump = %self.name,
            rate_fl_per_s = status.rate_fl_per_s,
            elapsed_ms = status.elapsed.as_millis() as u64,
            volume_fl = status.volume_fl,
            flags = ?status.flags,
            "status"
        );
        Ok(status)
    }

    /// Alias of [`status`](Self::status).
    pub fn get_status(&mut self) -> PumpResult<PumpStatus> {
        self.status()
    }

    /// Syringe manufacturer and size (`syrm`).
    pub fn syringe_type(&mut self) -> PumpResult<String> {
        info!(pump = %self.name, "getting syringe type");
        let syringe = self.query(Command::SyringeModel)?;
        info!(pump = %self.name, " = {}", syringe);
        self.info.syringe_type = syringe.clone();
        Ok(syringe)
    }

    // ------------------------------------------------------------------------
    // Flow rate
    // ------------------------------------------------------------------------

    /// Rate limits for the loaded syringe.
    pub fn flow_rate_limits(&mut self) -> PumpResult<PerDirection<RateLimits>> {
        info!(pump = %self.name, "getting flow rate limits");
        let withdraw = RateLimits::parse(&self.query(Command::RateLimits(Direction::Withdraw))?)?;
        let infuse = RateLimits::parse(&self.query(Command::RateLimits(Direction::Infuse))?)?;
        info!(pump = %self.name, "withdraw rate limits = {}", withdraw);
        info!(pump = %self.name, "infuse rate   limits = {}", infuse);
        let limits = PerDirection { withdraw, infuse };
        self.info.rate_limits = Some(limits);
        Ok(limits)
    }

    /// Programmed withdraw and infuse rates.
    pub fn flow_rates(&mut self) -> PumpResult<PerDirection<FlowRate>> {
        info!(pump = %self.name, "getting flow rates");
        let withdraw: FlowRate = self.query(Command::Rate(Direction::Withdraw))?.parse()?;
        let infuse: FlowRate = self.query(Command::Rate(Direction::Infuse))?.parse()?;
        info!(pump = %self.name, "withdraw rate = {}", withdraw);
        info!(pump = %self.name, "infuse rate   = {}", infuse);
        let rates = PerDirection { withdraw, infuse };
        self.info.flow_rates = Some(rates);
        Ok(rates)
    }

    /// Set the flow rate for one direction.
    ///
    /// The request is checked against the syringe's limits in pL/s before anything is
    /// written; the new rate is read back and compared. Returns the rate sent.
    pub fn set_flow_rate(
        &mut self,
        direction: Direction,
        request: RateRequest,
    ) -> PumpResult<FlowRate> {
        info!(pump = %self.name, "setting flow rate = {} {:?}", direction, request);
        let limits = match self.info.rate_limits {
            Some(limits) => limits.get(direction),
            None => self.flow_rate_limits()?.get(direction),
        };

        let (rate, unit) = request.resolve(&limits);
        if rate == 0 {
            return Err(PumpError::InvalidInput("zero flow rate not allowed".into()));
        }

        let requested = FlowRate::new(f64::from(rate), unit);
        let pl_per_s = requested.pl_per_s();
        if !limits.contains(pl_per_s) {
            let bound = if pl_per_s < limits.min.pl_per_s() {
                format!("too low (min {})", limits.min)
            } else {
                format!("too high (max {})", limits.max)
            };
            return Err(PumpError::InvalidInput(format!(
                "{} flow rate ({}) {}",
                direction, requested, bound
            )));
        }

        self.send(&Command::SetRate(direction, rate, unit))?;
        let actual = self.flow_rates()?.get(direction);
        if actual.pl_per_s() != pl_per_s {
            return Err(PumpError::Verification {
                requested: format!("{} pl/sec", pl_per_s),
                actual: format!("{} pl/sec", actual.pl_per_s()),
            });
        }
        self.refresh_run_times();
        info!(pump = %self.name, " -> done setting flow rate");
        Ok(requested)
    }

    /// Set an explicit integer flow rate. Shorthand for
    /// [`set_flow_rate`](Self::set_flow_rate) with [`RateRequest::Value`].
    pub fn set_rate(
        &mut self,
        direction: Direction,
        rate: u32,
        unit: RateUnit,
    ) -> PumpResult<FlowRate> {
        self.set_flow_rate(direction, RateRequest::Value(rate, unit))
    }

    // ------------------------------------------------------------------------
    // Target volume
    // ------------------------------------------------------------------------

    /// Programmed target volume.
    pub fn target_volume(&mut self) -> PumpResult<TargetVolume> {
        info!(pump = %self.name, "getting target volume");
        let line = self.query(Command::TargetVolume)?;
        let target = TargetVolume::parse(&line)?;
        info!(pump = %self.name, " = {}", target);
        self.info.target_volume = Some(target);
        Ok(target)
    }

    /// Program the target volume. Zero, negative and non-finite values are rejected
    /// before any I/O.
    pub fn set_target_volume(&mut self, value: f64, unit: VolumeUnit) -> PumpResult<()> {
        info!(pump = %self.name, "setting target volume = {} {}", value, unit);
        if !value.is_finite() || value <= 0.0 {
            return Err(PumpError::InvalidInput(format!(
                "target volume must be positive, got {}",
                value
            )));
        }
        let requested = Volume::new(value, unit);
        self.send(&Command::SetTargetVolume(requested))?;
        match self.target_volume()? {
            TargetVolume::Set(actual) if actual.approx_eq(&requested) => {}
            other => {
                return Err(PumpError::Verification {
                    requested: requested.to_string(),
                    actual: other.to_string(),
                })
            }
        }
        self.refresh_run_times();
        info!(pump = %self.name, " -> done setting target volume");
        Ok(())
    }

    /// Alias of [`set_target_volume`](Self::set_target_volume).
    pub fn set_volume(&mut self, value: f64, unit: VolumeUnit) -> PumpResult<()> {
        self.set_target_volume(value, unit)
    }

    // ------------------------------------------------------------------------
    // Run direction
    // ------------------------------------------------------------------------

    /// Direction of the loaded quick-start program.
    pub fn run_direction(&mut self) -> PumpResult<Direction> {
        info!(pump = %self.name, "getting run direction");
        let line = self.query(Command::Load)?;
        let direction = reply::parse_run_direction(&line)?;
        info!(pump = %self.name, " = {}", direction);
        self.info.run_direction = Some(direction);
        Ok(direction)
    }

    /// Load the quick-start program for `direction`.
    pub fn set_run_direction(&mut self, direction: Direction) -> PumpResult<()> {
        info!(pump = %self.name, "setting run direction = {}", direction);
        self.send(&Command::LoadQuickStart(direction))?;
        let actual = self.run_direction()?;
        if actual != direction {
            return Err(PumpError::Verification {
                requested: direction.to_string(),
                actual: actual.to_string(),
            });
        }
        // The pump keeps working on the load after it has answered.
        std::thread::sleep(self.direction_settle);
        info!(pump = %self.name, " -> done setting run direction");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Run time
    // ------------------------------------------------------------------------

    fn compute_run_times(&self) -> PumpResult<RunTimes> {
        let volume = self
            .info
            .target_volume
            .and_then(|t| t.volume())
            .ok_or_else(|| PumpError::InvalidInput("please set a target volume".into()))?;
        let rates = self
            .info
            .flow_rates
            .ok_or_else(|| PumpError::InvalidInput("flow rates unknown".into()))?;

        let time_for = |direction: Direction| -> PumpResult<Duration> {
            let pl_per_s = rates.get(direction).pl_per_s();
            if pl_per_s == 0 {
                return Err(PumpError::InvalidInput(format!(
                    "please set a non zero {} rate",
                    direction
                )));
            }
            let seconds = volume.picoliters() / pl_per_s as f64;
            Duration::try_from_secs_f64((seconds * 1e6).round() / 1e6).map_err(|e| {
                PumpError::InvalidInput(format!(
                    "{} run time for {} at {} pl/sec: {}",
                    direction, volume, pl_per_s, e
                ))
            })
        };

        Ok(RunTimes {
            withdraw: time_for(Direction::Withdraw)?,
            infuse: time_for(Direction::Infuse)?,
        })
    }

    fn refresh_run_times(&mut self) {
        self.info.run_times = self.compute_run_times().ok();
    }

    /// Re-read target volume and rates and estimate the run time per direction.
    pub fn estimate_run_time(&mut self) -> PumpResult<RunTimes> {
        debug!(pump = %self.name, "estimating run time");
        self.target_volume()?;
        self.flow_rates()?;
        let times = self.compute_run_times()?;
        debug!(pump = %self.name, "withdraw run time = {:?}", times.withdraw);
        debug!(pump = %self.name, "infuse   run time = {:?}", times.infuse);
        self.info.run_times = Some(times);
        Ok(times)
    }

    /// Longest wait for the `T*` of the current run.
    fn run_wait(&self) -> Duration {
        match (self.info.run_times, self.info.run_direction) {
            (Some(times), Some(direction)) => times.get(direction) + self.run_margin,
            _ => self.max_run_wait,
        }
    }

    // ------------------------------------------------------------------------
    // Run / stop
    // ------------------------------------------------------------------------

    /// Run the loaded program.
    ///
    /// A previous run that has not been finished is waited for first. With
    /// `block = false` the call returns as soon as the pump acknowledges; call
    /// [`finish_running`](Self::finish_running) later.
    pub fn run(&mut self, block: bool) -> PumpResult<()> {
        if self.running {
            self.finish_running()?;
        }
        info!(pump = %self.name, "running");
        self.send(&Command::Run)?;
        self.running = true;
        if block {
            self.finish_running()?;
        }
        Ok(())
    }

    /// Wait for the current run to reach its target.
    ///
    /// Bounded by the estimated run time plus the configured margin, or by the
    /// configured maximum when no estimate is available.
    pub fn finish_running(&mut self) -> PumpResult<()> {
        if !self.running {
            return Err(PumpError::NotRunning);
        }
        let wait = self.run_wait();
        debug!(pump = %self.name, "waiting up to {:?} for the run to finish", wait);

        self.read_line(wait)?; // leading line feed
        let prompt = self.read_prompt("run", wait)?;
        if prompt.is_alarm() {
            self.running = false;
            return Err(PumpError::Alarm {
                command: "run".into(),
                alarm: prompt.message().to_string(),
            });
        }
        if prompt != Prompt::TargetReached {
            return Err(PumpError::UnexpectedPrompt {
                prompt: prompt.to_string(),
                rest: "expected T* at the end of a run".into(),
            });
        }
        if self.adapter.bytes_to_read()? != 0 {
            let unexpected = self.read_line(self.adapter.timeout())?;
            return Err(PumpError::UnexpectedResponse(unexpected));
        }

        self.running = false;
        info!(pump = %self.name, " -> finished running");
        Ok(())
    }

    /// Stop the pump.
    pub fn stop(&mut self) -> PumpResult<()> {
        info!(pump = %self.name, "stopping");
        self.send(&Command::Stop)?;
        self.running = false;
        Ok(())
    }

    /// Release the port.
    pub fn close(mut self) -> PumpResult<()> {
        info!(pump = %self.name, "closing...");
        self.adapter.disconnect()?;
        info!(pump = %self.name, "closed");
        Ok(())
    }
}
