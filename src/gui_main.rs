//! Native egui/eframe window for a KDS Legato 110.
//!
//! ```bash
//! cargo run --features gui_egui --bin legato_daq_gui -- --port COM3
//! ```

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eframe::egui;
use legato_daq::{
    config::{Settings, DEFAULT_CONFIG_PATH},
    gui::PumpApp,
    instrument::Legato110,
    logging,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "legato_daq_gui", version, about = "Syringe pump GUI")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serial port, overrides the configuration
    #[arg(short, long)]
    port: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = Settings::load_from(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    if let Some(port) = args.port {
        settings.pump.port = port;
    }
    logging::init(&settings.application.log_level)?;

    let pump = Legato110::open(&settings.pump)
        .with_context(|| format!("No connection to {} on port {}", settings.pump.name, settings.pump.port))?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Syringe Pump GUI")
            .with_inner_size([360.0, 340.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Syringe Pump GUI",
        native_options,
        Box::new(|_cc| Ok(Box::new(PumpApp::new(pump)))),
    )
    .map_err(|e| anyhow!("GUI failed: {}", e))
}
