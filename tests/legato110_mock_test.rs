//! Driver behaviour against a scripted pump.
//!
//! Run with: cargo test --test legato110_mock_test

use legato_daq::adapters::MockAdapter;
use legato_daq::config::PumpConfig;
use legato_daq::instrument::{Legato110, RateRequest};
use legato_daq::protocol::{
    Direction, FootswitchMode, Prompt, RateUnit, TargetVolume, TimeBase, Volume, VolumeUnit,
};
use legato_daq::PumpError;
use std::time::Duration;

fn config() -> PumpConfig {
    PumpConfig {
        direction_settle_ms: 0,
        run_margin_ms: 100,
        ..PumpConfig::default()
    }
}

/// 10 ml syringe, 6 ul/min withdraw, 6 ul/sec infuse, 3 ul target, infuse loaded.
fn connected_mock() -> MockAdapter {
    MockAdapter::new()
        .expect("echo", "\r\nOFF\r\n:")
        .expect("poll", "\r\nOFF\r\n:")
        .expect("addr", "\r\nPump address is 0\r\n:")
        .expect("ver", "\r\nLegato 110 3.0.6\r\n:")
        .expect(
            "version",
            "\r\nFirmware: v3.0.6\r\nPump: Legato 110\r\nAddress: 0\r\n:",
        )
        .expect("ftswitch fall", "\r\n:")
        .expect("ftswitch", "\r\nActive low\r\n:")
        .expect("force 50", "\r\n:")
        .expect("force", "\r\n50%\r\n:")
        .expect("status", "\r\n0 0 0 i.....\r\n:")
        .expect("syrm", "\r\nbdp 10 ml\r\n:")
        .expect("wrate lim", "\r\n3.6669 nl/min to 3.8178 ml/min\r\n:")
        .expect("irate lim", "\r\n3.6669 nl/min to 3.8178 ml/min\r\n:")
        .expect("wrate", "\r\n6 ul/min\r\n:")
        .expect("irate", "\r\n6 ul/sec\r\n:")
        .expect("tvolume", "\r\n3 ul\r\n:")
        .expect("load", "\r\nQuick start - Infuse only\r\n:")
}

fn connect(mock: MockAdapter) -> Legato110<MockAdapter> {
    Legato110::connect(mock, &config()).unwrap()
}

#[test]
fn test_connect_estimates_run_times() {
    let pump = connect(connected_mock());
    let times = pump.info().run_times.unwrap();
    // 3 ul at 6 ul/sec and 6 ul/min
    assert_eq!(times.infuse, Duration::from_millis(500));
    assert_eq!(times.withdraw, Duration::from_secs(30));
    assert_eq!(
        pump.adapter().written()[..4],
        ["echo", "poll", "addr", "ver"]
    );
}

#[test]
fn test_connect_rejects_nonzero_address() {
    let mock = MockAdapter::new()
        .expect("echo", "\r\nOFF\r\n:")
        .expect("poll", "\r\nOFF\r\n:")
        .expect("addr", "\r\nPump address is 3\r\n:");
    let err = Legato110::connect(mock, &config()).err().unwrap();
    assert!(matches!(err, PumpError::UnexpectedResponse(_)));
}

#[test]
fn test_status_reply_is_parsed() {
    let mut pump = connect(connected_mock().expect("status", "\r\n6000000 1500 9000000 I....T\r\n:"));
    let status = pump.get_status().unwrap();
    assert_eq!(status.rate_pl_per_s(), 6000.0);
    assert_eq!(status.elapsed, Duration::from_millis(1500));
    assert_eq!(status.volume_pl(), 9000.0);
    assert_eq!(status.flags.direction(), Some(Direction::Infuse));
    assert!(status.flags.target_reached());
    assert!(!status.flags.is_stalled());
}

#[test]
fn test_device_error_line_in_reply() {
    let mut pump = connect(
        connected_mock()
            .expect("wrate", "\r\n6 ul/min\r\n:")
            .expect("irate", "\r\nCommand error\r\n:"),
    );
    let err = pump.flow_rates().unwrap_err();
    assert!(err.is_device_reported());
    assert!(matches!(err, PumpError::Device { ref command, .. } if command == "irate"));
}

#[test]
fn test_device_error_in_place_of_prompt() {
    let mut pump = connect(
        connected_mock().expect("tvolume 50 ml", "\r\nArgument error: 50 ml\r\n:"),
    );
    let err = pump.set_target_volume(50.0, VolumeUnit::Ml).unwrap_err();
    assert!(matches!(err, PumpError::Device { .. }), "{err:?}");
    assert!(pump.adapter_mut().is_exhausted());
}

#[test]
fn test_silent_pump_times_out() {
    let mut pump = connect(connected_mock().expect_silence("status"));
    let err = pump.status().unwrap_err();
    assert!(matches!(err, PumpError::Timeout(_)));
    assert!(err.is_communication());
}

#[test]
fn test_trailing_bytes_when_idle() {
    let mut pump = connect(connected_mock().expect("syrm", "\r\nbdp 10 ml\r\n:\r\nextra\r\n"));
    let err = pump.syringe_type().unwrap_err();
    assert!(err.is_protocol_mismatch());
}

#[test]
fn test_blocking_run() {
    let mut pump = connect(connected_mock().expect_then("run", "\r\n>", "\r\nT*"));
    pump.run(true).unwrap();
    assert!(!pump.is_running());
    assert_eq!(pump.last_prompt(), Some(Prompt::TargetReached));
}

#[test]
fn test_non_blocking_run_then_finish() {
    let mut pump = connect(connected_mock().expect_then("run", "\r\n>", "\r\nT*"));
    pump.run(false).unwrap();
    assert!(pump.is_running());
    assert_eq!(pump.last_prompt(), Some(Prompt::Infusing));
    pump.finish_running().unwrap();
    assert!(!pump.is_running());
    assert!(matches!(pump.finish_running(), Err(PumpError::NotRunning)));
}

#[test]
fn test_second_run_waits_for_first() {
    let mut pump = connect(
        connected_mock()
            .expect_then("run", "\r\n>", "\r\nT*")
            .expect_then("run", "\r\n>", "\r\nT*"),
    );
    pump.run(false).unwrap();
    pump.run(true).unwrap();
    assert!(!pump.is_running());
    assert!(pump.adapter().is_exhausted());
}

#[test]
fn test_run_finishing_during_another_command() {
    let mut pump = connect(
        connected_mock()
            .expect("run", "\r\n>")
            .expect("status", "\r\n6000000 500 3000000 I....T\r\n>\r\nT*"),
    );
    pump.run(false).unwrap();
    pump.status().unwrap();
    assert!(!pump.is_running());
    assert_eq!(pump.last_prompt(), Some(Prompt::TargetReached));
}

#[test]
fn test_stall_during_run_is_an_alarm() {
    let mut pump = connect(connected_mock().expect_then("run", "\r\n>", "\r\n*"));
    let err = pump.run(true).unwrap_err();
    assert!(matches!(err, PumpError::Alarm { .. }));
    assert!(!pump.is_running());
}

#[test]
fn test_run_and_stop() {
    let mut pump = connect(
        connected_mock()
            .expect("run", "\r\n>")
            .expect("stop", "\r\n:"),
    );
    pump.run(false).unwrap();
    pump.stop().unwrap();
    assert!(!pump.is_running());
    assert_eq!(pump.last_prompt(), Some(Prompt::Idle));
}

#[test]
fn test_set_rate_verifies_read_back() {
    let mut pump = connect(
        connected_mock()
            .expect("irate 9 ul/min", "\r\n:")
            .expect("wrate", "\r\n6 ul/min\r\n:")
            .expect("irate", "\r\n9 ul/min\r\n:"),
    );
    let unit = RateUnit::new(VolumeUnit::Ul, TimeBase::Minute);
    let applied = pump.set_rate(Direction::Infuse, 9, unit).unwrap();
    assert_eq!(applied.to_string(), "9 ul/min");
    // 3 ul at 150000 pl/sec
    assert_eq!(pump.info().run_times.unwrap().infuse, Duration::from_secs(20));
}

#[test]
fn test_set_rate_read_back_mismatch() {
    let mut pump = connect(
        connected_mock()
            .expect("wrate 9 ul/min", "\r\n:")
            .expect("wrate", "\r\n8 ul/min\r\n:")
            .expect("irate", "\r\n6 ul/sec\r\n:"),
    );
    let unit = RateUnit::new(VolumeUnit::Ul, TimeBase::Minute);
    let err = pump
        .set_flow_rate(Direction::Withdraw, RateRequest::Value(9, unit))
        .unwrap_err();
    assert!(matches!(err, PumpError::Verification { .. }));
}

#[test]
fn test_set_target_volume() {
    let mut pump = connect(
        connected_mock()
            .expect("tvolume 1 ul", "\r\n:")
            .expect("tvolume", "\r\n1 ul\r\n:"),
    );
    pump.set_volume(1.0, VolumeUnit::Ul).unwrap();
    assert_eq!(
        pump.info().target_volume,
        Some(TargetVolume::Set(Volume::new(1.0, VolumeUnit::Ul)))
    );
    assert_eq!(
        pump.info().run_times.unwrap().withdraw,
        Duration::from_secs(10)
    );
}

#[test]
fn test_set_run_direction() {
    let mut pump = connect(
        connected_mock()
            .expect("load qs w", "\r\n:")
            .expect("load", "\r\nQuick start - Withdraw only\r\n:"),
    );
    pump.set_run_direction(Direction::Withdraw).unwrap();
    assert_eq!(pump.info().run_direction, Some(Direction::Withdraw));
}

#[test]
fn test_footswitch_mode_round_trip() {
    let mut pump = connect(
        connected_mock()
            .expect("ftswitch rise", "\r\n:")
            .expect("ftswitch", "\r\nActive high\r\n:"),
    );
    pump.set_footswitch_mode(FootswitchMode::RisingEdge).unwrap();
    assert_eq!(pump.info().footswitch_mode, Some(FootswitchMode::RisingEdge));
}

#[test]
fn test_estimate_without_target_volume() {
    let mut pump = connect(
        connected_mock()
            .expect("tvolume", "\r\nTarget volume not set\r\n:")
            .expect("wrate", "\r\n6 ul/min\r\n:")
            .expect("irate", "\r\n6 ul/sec\r\n:"),
    );
    let err = pump.estimate_run_time().unwrap_err();
    assert!(matches!(err, PumpError::InvalidInput(_)));
}

#[test]
fn test_close_disconnects() {
    let pump = connect(connected_mock());
    pump.close().unwrap();
}
