//! Hardware tests for the KDS Legato 110
//!
//! These tests require a pump connected to the system with a syringe loaded.
//! Run with: LEGATO_TEST_PORT=/dev/ttyACM0 cargo test --test legato110_hardware_test --features hardware_tests -- --ignored --nocapture
//!
//! Hardware Setup:
//! - Legato 110 connected via USB (virtual COM port)
//! - Communication mode: echo OFF, poll OFF, address 0
//! - A syringe that can safely move a few microlitres in both directions

#![cfg(all(feature = "hardware_tests", feature = "instrument_serial"))]

use legato_daq::config::PumpConfig;
use legato_daq::instrument::{Legato110, RateRequest};
use legato_daq::protocol::{Direction, RateUnit, TimeBase, VolumeUnit};
use serial_test::serial;

fn open() -> Legato110<legato_daq::adapters::SerialAdapter> {
    let port = std::env::var("LEGATO_TEST_PORT").unwrap_or_else(|_| PumpConfig::default().port);
    let config = PumpConfig {
        port,
        ..PumpConfig::default()
    };
    Legato110::open(&config).unwrap()
}

#[test]
#[ignore] // Hardware-only test
#[serial]
fn test_connect_and_status() {
    let mut pump = open();
    println!("{:#?}", pump.info());
    let status = pump.get_status().unwrap();
    println!("{:?}", status);
    pump.close().unwrap();
}

#[test]
#[ignore]
#[serial]
fn test_rate_limits_and_rates() {
    let mut pump = open();
    pump.set_flow_rate(Direction::Withdraw, RateRequest::Min).unwrap();
    pump.set_flow_rate(Direction::Infuse, RateRequest::Max).unwrap();
    let ul_min = RateUnit::new(VolumeUnit::Ul, TimeBase::Minute);
    pump.set_rate(Direction::Withdraw, 20, ul_min).unwrap();
    pump.set_rate(Direction::Infuse, 20, ul_min).unwrap();
    pump.close().unwrap();
}

#[test]
#[ignore]
#[serial]
fn test_run_both_directions() {
    let mut pump = open();
    pump.set_target_volume(1.0, VolumeUnit::Ul).unwrap();
    for direction in [Direction::Withdraw, Direction::Infuse] {
        pump.set_run_direction(direction).unwrap();
        pump.run(true).unwrap();
        println!("{} run done", direction);
    }
    pump.run(false).unwrap();
    pump.stop().unwrap();
    pump.close().unwrap();
}
