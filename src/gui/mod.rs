//! egui control panel for a single pump.
//!
//! Shows the settings read at connect time and offers `Run` / `Stop`. A run is
//! started without blocking; the panel keeps repainting and collects the pump's
//! `T*` once the estimated run time has passed, so the window stays responsive for
//! the whole run.

use crate::{
    adapters::Adapter,
    error::PumpResult,
    instrument::Legato110,
    protocol::Direction,
};
use eframe::egui;
use egui::{Color32, RichText};
use std::time::{Duration, Instant};
use tracing::error;

/// Repaint interval while a run is in progress.
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Values shown in the panel, refreshed from the driver cache when a run starts,
/// ends or is stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PumpSummary {
    /// Firmware version
    pub version: String,
    /// Syringe manufacturer and size
    pub syringe_type: String,
    /// Target volume, or "not set"
    pub target_volume: String,
    /// Loaded run direction
    pub run_direction: Option<Direction>,
    /// Flow rate for the run direction
    pub flow_rate: String,
    /// Estimated run time for the run direction
    pub run_time: Option<Duration>,
}

impl PumpSummary {
    /// Collect the cached settings of `pump`.
    pub fn from_pump<A: Adapter>(pump: &Legato110<A>) -> Self {
        let info = pump.info();
        let direction = info.run_direction;
        Self {
            version: info.firmware_version.clone(),
            syringe_type: info.syringe_type.clone(),
            target_volume: info
                .target_volume
                .map_or_else(|| "-".to_string(), |t| t.to_string()),
            run_direction: direction,
            flow_rate: match (info.flow_rates, direction) {
                (Some(rates), Some(d)) => rates.get(d).to_string(),
                _ => "-".to_string(),
            },
            run_time: match (info.run_times, direction) {
                (Some(times), Some(d)) => Some(times.get(d)),
                _ => None,
            },
        }
    }
}

/// The pump panel.
pub struct PumpApp<A: Adapter> {
    pump: Option<Legato110<A>>,
    summary: PumpSummary,
    run_started: Option<Instant>,
    last_error: Option<String>,
}

impl<A: Adapter> PumpApp<A> {
    /// Wrap a connected pump.
    pub fn new(pump: Legato110<A>) -> Self {
        let summary = PumpSummary::from_pump(&pump);
        Self {
            pump: Some(pump),
            summary,
            run_started: None,
            last_error: None,
        }
    }

    /// Settings currently displayed.
    pub fn summary(&self) -> &PumpSummary {
        &self.summary
    }

    /// Whether a run was started and not yet collected.
    pub fn is_running(&self) -> bool {
        self.run_started.is_some()
    }

    /// Most recent error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record(&mut self, result: PumpResult<()>) {
        if let Err(e) = result {
            error!("pump error: {}", e);
            self.last_error = Some(e.to_string());
        }
    }

    fn refresh(&mut self) {
        if let Some(pump) = self.pump.as_ref() {
            self.summary = PumpSummary::from_pump(pump);
        }
    }

    /// Start a non-blocking run.
    ///
    /// Refused without a run time estimate, since the panel could not tell when to
    /// collect the end of the run without blocking.
    pub fn start_run(&mut self) {
        self.refresh();
        if self.summary.run_time.is_none() {
            self.last_error =
                Some("no run time estimate: set a target volume and a non zero rate".into());
            return;
        }
        let Some(pump) = self.pump.as_mut() else {
            return;
        };
        let result = pump.run(false);
        if result.is_ok() {
            self.run_started = Some(Instant::now());
            self.last_error = None;
        }
        self.record(result);
    }

    /// Collect the end of the run once its estimated time has passed.
    ///
    /// Returns `true` when the run was collected in this call.
    pub fn poll_run(&mut self, now: Instant) -> bool {
        let Some(started) = self.run_started else {
            return false;
        };
        let Some(due) = self.summary.run_time else {
            return false;
        };
        if now.saturating_duration_since(started) < due {
            return false;
        }
        let Some(pump) = self.pump.as_mut() else {
            return false;
        };
        self.run_started = None;
        // a stop in between already cleared the run
        let result = if pump.is_running() {
            pump.finish_running()
        } else {
            Ok(())
        };
        self.record(result);
        self.refresh();
        true
    }

    /// Stop the pump and abandon the current run.
    pub fn stop(&mut self) {
        let Some(pump) = self.pump.as_mut() else {
            return;
        };
        let result = pump.stop();
        self.run_started = None;
        self.record(result);
        self.refresh();
    }

    /// Release the pump.
    pub fn close(&mut self) {
        if let Some(pump) = self.pump.take() {
            let result = pump.close();
            self.record(result);
        }
    }

    fn settings_grid(&self, ui: &mut egui::Ui) {
        let s = &self.summary;
        let direction = s
            .run_direction
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        let run_time = s
            .run_time
            .map_or_else(|| "-".to_string(), |t| format!("{:.3}", t.as_secs_f64()));

        egui::Grid::new("pump_settings")
            .num_columns(2)
            .spacing([20.0, 8.0])
            .show(ui, |ui| {
                for (key, value) in [
                    ("Syringe pump:", s.version.as_str()),
                    ("Syringe type:", s.syringe_type.as_str()),
                    ("Target volume:", s.target_volume.as_str()),
                    ("Run direction:", direction.as_str()),
                    ("Flow rate:", s.flow_rate.as_str()),
                    ("Estimated time (s):", run_time.as_str()),
                ] {
                    ui.label(key);
                    ui.label(value);
                    ui.end_row();
                }
            });
    }
}

impl<A: Adapter> eframe::App for PumpApp<A> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.is_running() {
            self.poll_run(Instant::now());
            ctx.request_repaint_after(RUN_POLL_INTERVAL);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("SYRINGE PUMP");
            ui.separator();

            if self.pump.is_none() {
                ui.colored_label(Color32::GRAY, "Pump closed");
                return;
            }

            self.settings_grid(ui);
            ui.add_space(10.0);

            let button_size = egui::vec2(160.0, 32.0);
            let running = self.is_running();
            let run_text = if running { "Running..." } else { "Run" };
            if ui
                .add_enabled(!running, egui::Button::new(run_text).min_size(button_size))
                .clicked()
            {
                self.start_run();
            }
            if ui
                .add(egui::Button::new("Stop").min_size(button_size))
                .clicked()
            {
                self.stop();
            }

            if let Some(err) = &self.last_error {
                ui.add_space(10.0);
                ui.label(RichText::new(err).color(Color32::RED));
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.close();
    }
}
