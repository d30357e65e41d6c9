//! Command line control of a KDS Legato 110 syringe pump.
//!
//! ```bash
//! legato_daq --port /dev/ttyACM0 status
//! legato_daq set-rate infuse 9 ul/min
//! legato_daq set-rate withdraw max
//! legato_daq set-volume 1 ul
//! legato_daq direction withdraw
//! legato_daq run --repeat 2
//! legato_daq arm-trigger --mode fall --triggers 2
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use legato_daq::{
    config::{Settings, DEFAULT_CONFIG_PATH},
    instrument::{Legato110, RateRequest, TriggerPlan},
    logging,
    protocol::{Direction, FootswitchMode, RateUnit, VolumeUnit},
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "legato_daq", version, about = "KDS Legato 110 syringe pump control")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serial port, overrides the configuration
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overrides the configuration
    #[arg(short, long)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the pump's settings and status
    Status,
    /// Set the flow rate for one direction
    SetRate {
        /// infuse or withdraw
        #[arg(value_parser = parse_direction)]
        direction: Direction,
        /// Integer rate, or "min" / "max" for the syringe limits
        rate: String,
        /// Rate unit, e.g. ul/min (not used with min/max)
        #[arg(value_parser = parse_rate_unit)]
        unit: Option<RateUnit>,
    },
    /// Set the target volume
    SetVolume {
        /// Volume
        value: f64,
        /// ml, ul, nl or pl
        #[arg(value_parser = parse_volume_unit)]
        unit: VolumeUnit,
    },
    /// Show or load the run direction
    Direction {
        /// infuse or withdraw
        #[arg(value_parser = parse_direction)]
        direction: Option<Direction>,
    },
    /// Run the loaded program
    Run {
        /// Number of consecutive runs
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        /// Stop immediately after starting (run-and-stop check)
        #[arg(long)]
        stop_after_start: bool,
    },
    /// Stop the pump
    Stop,
    /// Arm the footswitch input for TTL triggered runs and print the trigger timing
    ArmTrigger {
        /// mom, rise or fall
        #[arg(long, default_value = "fall", value_parser = parse_footswitch_mode)]
        mode: FootswitchMode,
        /// Number of trigger pulses to plan for
        #[arg(long, default_value_t = 2)]
        triggers: u32,
        /// Pulse width in milliseconds (minimum 100)
        #[arg(long, default_value_t = 100)]
        pulse_ms: u64,
        /// Analog output sample rate (Hz) to size the voltage train for
        #[arg(long)]
        sample_rate: Option<f64>,
    },
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    s.parse().map_err(|e: legato_daq::PumpError| e.to_string())
}

fn parse_rate_unit(s: &str) -> Result<RateUnit, String> {
    s.parse().map_err(|e: legato_daq::PumpError| e.to_string())
}

fn parse_volume_unit(s: &str) -> Result<VolumeUnit, String> {
    s.parse().map_err(|e: legato_daq::PumpError| e.to_string())
}

fn parse_footswitch_mode(s: &str) -> Result<FootswitchMode, String> {
    s.parse().map_err(|e: legato_daq::PumpError| e.to_string())
}

fn rate_request(rate: &str, unit: Option<RateUnit>) -> Result<RateRequest> {
    match (rate, unit) {
        ("min", None) => Ok(RateRequest::Min),
        ("max", None) => Ok(RateRequest::Max),
        ("min" | "max", Some(_)) => Err(anyhow!("no unit allowed with '{}'", rate)),
        (value, Some(unit)) => {
            let value: u32 = value
                .parse()
                .with_context(|| format!("flow rate must be an integer, got '{}'", value))?;
            Ok(RateRequest::Value(value, unit))
        }
        (_, None) => Err(anyhow!("a rate unit is required, e.g. ul/min")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        settings.pump.port = port;
    }
    if let Some(baud) = cli.baud {
        settings.pump.baud_rate = baud;
    }
    logging::init(&settings.application.log_level)?;

    let mut pump = Legato110::open(&settings.pump)
        .with_context(|| format!("No connection to {} on port {}", settings.pump.name, settings.pump.port))?;

    match cli.command {
        Commands::Status => {
            let status = pump.get_status()?;
            let info = pump.info();
            println!("Firmware:        {}", info.firmware_version);
            println!("Syringe:         {}", info.syringe_type);
            if let Some(limits) = info.rate_limits {
                println!("Withdraw limits: {}", limits.withdraw);
                println!("Infuse limits:   {}", limits.infuse);
            }
            if let Some(rates) = info.flow_rates {
                println!("Withdraw rate:   {}", rates.withdraw);
                println!("Infuse rate:     {}", rates.infuse);
            }
            if let Some(target) = info.target_volume {
                println!("Target volume:   {}", target);
            }
            if let Some(direction) = info.run_direction {
                println!("Run direction:   {}", direction);
            }
            if let Some(times) = info.run_times {
                println!("Withdraw time:   {:.6} s", times.withdraw.as_secs_f64());
                println!("Infuse time:     {:.6} s", times.infuse.as_secs_f64());
            }
            println!("Rate:            {} pl/sec", status.rate_pl_per_s());
            println!("Elapsed:         {} ms", status.elapsed.as_millis());
            println!("Moved volume:    {} pl", status.volume_pl());
            println!("Flags:           {:?}", status.flags);
            if let Some(prompt) = pump.last_prompt() {
                println!("State:           {}", prompt.message());
            }
        }
        Commands::SetRate {
            direction,
            rate,
            unit,
        } => {
            let request = rate_request(&rate, unit)?;
            let applied = pump.set_flow_rate(direction, request)?;
            println!("{} rate set to {}", direction, applied);
        }
        Commands::SetVolume { value, unit } => {
            pump.set_target_volume(value, unit)?;
            println!("target volume set to {} {}", value, unit);
        }
        Commands::Direction { direction } => {
            if let Some(direction) = direction {
                pump.set_run_direction(direction)?;
            }
            println!("run direction: {}", pump.run_direction()?);
        }
        Commands::Run {
            repeat,
            stop_after_start,
        } => {
            for i in 0..repeat {
                if stop_after_start {
                    pump.run(false)?;
                    pump.stop()?;
                } else {
                    pump.run(true)?;
                }
                println!("run {} of {} done", i + 1, repeat);
            }
        }
        Commands::Stop => pump.stop()?,
        Commands::ArmTrigger {
            mode,
            triggers,
            pulse_ms,
            sample_rate,
        } => {
            pump.set_footswitch_mode(mode)?;
            let direction = pump.run_direction()?;
            let run_time = pump.estimate_run_time()?.get(direction);
            let plan = TriggerPlan::new(run_time).with_pulse(Duration::from_millis(pulse_ms))?;
            println!("footswitch armed: {}", mode);
            println!("run direction:    {}", direction);
            println!("run time:         {:.6} s", run_time.as_secs_f64());
            println!("trigger period:   {:.6} s", plan.period().as_secs_f64());
            println!(
                "{} triggers:      {:.6} s ({:.3} events/s)",
                triggers,
                plan.total(triggers).as_secs_f64(),
                plan.events_per_second(triggers)
            );
            if let Some(rate) = sample_rate {
                let voltages = plan.voltages(rate, triggers)?;
                println!("samples at {} Hz: {}", rate, voltages.len());
            }
        }
    }

    pump.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use legato_daq::protocol::TimeBase;

    #[test]
    fn test_rate_request_parsing() {
        assert_eq!(rate_request("min", None).unwrap(), RateRequest::Min);
        assert_eq!(rate_request("max", None).unwrap(), RateRequest::Max);
        let ul_min = RateUnit::new(VolumeUnit::Ul, TimeBase::Minute);
        assert_eq!(
            rate_request("9", Some(ul_min)).unwrap(),
            RateRequest::Value(9, ul_min)
        );
        assert!(rate_request("9.5", Some(ul_min)).is_err());
        assert!(rate_request("9", None).is_err());
        assert!(rate_request("max", Some(ul_min)).is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["legato_daq", "--port", "COM4", "set-rate", "withdraw", "max"]);
        assert_eq!(cli.port.as_deref(), Some("COM4"));
        assert!(matches!(
            cli.command,
            Commands::SetRate {
                direction: Direction::Withdraw,
                unit: None,
                ..
            }
        ));
        let cli = Cli::parse_from(["legato_daq", "arm-trigger", "--mode", "rise"]);
        assert!(matches!(
            cli.command,
            Commands::ArmTrigger {
                mode: FootswitchMode::RisingEdge,
                triggers: 2,
                ..
            }
        ));
    }
}
