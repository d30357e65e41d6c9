//! Configuration System using Figment
//!
//! Settings are loaded from, in increasing order of precedence:
//! 1. Built-in defaults
//! 2. A TOML file (default `config/legato.toml`, optional)
//! 3. Environment variables prefixed with `LEGATO_`
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! LEGATO_APPLICATION__LOG_LEVEL=debug
//! LEGATO_PUMP__PORT=/dev/ttyUSB0
//! LEGATO_PUMP__FORCE_PCT=30
//! ```
//!
//! # Example file
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [pump]
//! name = "Legato110"
//! port = "COM3"
//! baud_rate = 115200
//! timeout_ms = 1000
//! footswitch_mode = "fall"
//! force_pct = 50
//! ```

use crate::error::{PumpError, PumpResult};
use crate::protocol::FootswitchMode;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/legato.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Pump connection and setup
    #[serde(default)]
    pub pump: PumpConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Pump connection and the setup applied on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Name used in log output
    #[serde(default = "default_name")]
    pub name: String,
    /// Serial port (e.g., "/dev/ttyACM0", "COM3")
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Per-reply read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Footswitch mode armed on connect
    #[serde(default = "default_footswitch_mode")]
    pub footswitch_mode: FootswitchMode,
    /// Motor force applied on connect, percent (50 is safe for glass syringes)
    #[serde(default = "default_force_pct")]
    pub force_pct: u8,
    /// Pause after loading a new run direction, milliseconds
    #[serde(default = "default_direction_settle_ms")]
    pub direction_settle_ms: u64,
    /// Extra time allowed on top of the estimated run time, milliseconds
    #[serde(default = "default_run_margin_ms")]
    pub run_margin_ms: u64,
    /// Upper bound on waiting for a run whose duration is unknown, seconds
    #[serde(default = "default_max_run_wait_s")]
    pub max_run_wait_s: u64,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            port: default_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            footswitch_mode: default_footswitch_mode(),
            force_pct: default_force_pct(),
            direction_settle_ms: default_direction_settle_ms(),
            run_margin_ms: default_run_margin_ms(),
            max_run_wait_s: default_max_run_wait_s(),
        }
    }
}

impl PumpConfig {
    /// Read timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Direction settle time as a `Duration`.
    pub fn direction_settle(&self) -> Duration {
        Duration::from_millis(self.direction_settle_ms)
    }

    /// Run margin as a `Duration`.
    pub fn run_margin(&self) -> Duration {
        Duration::from_millis(self.run_margin_ms)
    }

    /// Maximum run wait as a `Duration`.
    pub fn max_run_wait(&self) -> Duration {
        Duration::from_secs(self.max_run_wait_s)
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_log_level() -> String {
    "info".to_string()
}

fn default_name() -> String {
    "Legato110".to_string()
}

fn default_port() -> String {
    if cfg!(windows) {
        "COM3".to_string()
    } else {
        "/dev/ttyACM0".to_string()
    }
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_footswitch_mode() -> FootswitchMode {
    FootswitchMode::FallingEdge
}

fn default_force_pct() -> u8 {
    50
}

fn default_direction_settle_ms() -> u64 {
    200
}

fn default_run_margin_ms() -> u64 {
    2000
}

fn default_max_run_wait_s() -> u64 {
    3600
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl Settings {
    /// Load configuration from [`DEFAULT_CONFIG_PATH`] and environment variables.
    pub fn load() -> PumpResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`PumpError::Config`] if the file or environment cannot be
    /// deserialised and [`PumpError::Configuration`] if validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> PumpResult<Self> {
        let settings: Self = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LEGATO_").split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Port and name are not empty
    /// - Baud rate and timeout are non-zero
    /// - Force is 1-100 %
    pub fn validate(&self) -> PumpResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(PumpError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let pump = &self.pump;
        if pump.name.is_empty() {
            return Err(PumpError::Configuration("pump 'name' cannot be empty".into()));
        }
        if pump.port.is_empty() {
            return Err(PumpError::Configuration("pump 'port' cannot be empty".into()));
        }
        if pump.baud_rate == 0 {
            return Err(PumpError::Configuration("pump 'baud_rate' must be non-zero".into()));
        }
        if pump.timeout_ms == 0 {
            return Err(PumpError::Configuration("pump 'timeout_ms' must be non-zero".into()));
        }
        if !(1..=100).contains(&pump.force_pct) {
            return Err(PumpError::Configuration(format!(
                "Invalid force_pct {}. Must be 1-100",
                pump.force_pct
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        let settings = Settings::load_from("does/not/exist.toml").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.pump.baud_rate, 115200);
        assert_eq!(settings.pump.footswitch_mode, FootswitchMode::FallingEdge);
        assert_eq!(settings.pump.timeout(), Duration::from_secs(1));
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[application]
log_level = "debug"

[pump]
port = "/dev/ttyUSB3"
footswitch_mode = "rise"
force_pct = 30
"#,
        );
        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.application.log_level, "debug");
        assert_eq!(settings.pump.port, "/dev/ttyUSB3");
        assert_eq!(settings.pump.footswitch_mode, FootswitchMode::RisingEdge);
        assert_eq!(settings.pump.force_pct, 30);
        assert_eq!(settings.pump.name, "Legato110");
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_config("[pump]\nport = \"/dev/ttyUSB3\"\n");
        std::env::set_var("LEGATO_PUMP__PORT", "/dev/ttyUSB9");
        let result = Settings::load_from(file.path());
        std::env::remove_var("LEGATO_PUMP__PORT");
        assert_eq!(result.unwrap().pump.port, "/dev/ttyUSB9");
    }

    #[test]
    #[serial]
    fn test_validation_rejects_bad_values() {
        let file = write_config("[pump]\nforce_pct = 0\n");
        assert!(matches!(
            Settings::load_from(file.path()),
            Err(PumpError::Configuration(_))
        ));

        let file = write_config("[application]\nlog_level = \"loud\"\n");
        assert!(matches!(
            Settings::load_from(file.path()),
            Err(PumpError::Configuration(_))
        ));

        let file = write_config("[pump]\nfootswitch_mode = \"toggle\"\n");
        assert!(matches!(
            Settings::load_from(file.path()),
            Err(PumpError::Config(_))
        ));
    }
}
