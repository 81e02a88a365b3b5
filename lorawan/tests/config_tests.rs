use lorawan_device::{
    config::{
        device::{AESKey, ActivationState, DevAddr, DeviceConfig, SessionState},
        params::MacParams,
    },
    lorawan::region::{EU868, US915},
};

#[test]
fn test_device_config() {
    let config = DeviceConfig::new([0x01; 8], [0x02; 8], AESKey::new([0x03; 16]));

    assert_eq!(config.dev_eui, [0x01; 8]);
    assert_eq!(config.app_eui, [0x02; 8]);
    assert_eq!(config.app_key.as_bytes(), &[0x03; 16]);
}

#[test]
fn test_keys_are_not_printed() {
    let key = AESKey::new([0xAB; 16]);
    assert_eq!(format!("{:?}", key), "AESKey(..)");
}

#[test]
fn test_session_state() {
    let session = SessionState::new();
    assert!(!session.is_activated());

    let session = SessionState::new_abp(DevAddr::new(0x0102_0304), AESKey::new([1; 16]), AESKey::new([2; 16]));
    assert!(session.is_activated());
    assert_eq!(session.activation_state, ActivationState::ABPActivated);
    assert_eq!(session.dev_addr.to_le_bytes(), [0x04, 0x03, 0x02, 0x01]);
    assert_eq!((session.fcnt_up, session.fcnt_down), (0, 0));

    let session = SessionState::new_otaa(DevAddr::new(5), AESKey::default(), AESKey::default(), 0x1234);
    assert_eq!(session.activation_state, ActivationState::OTAAActivated);
    assert_eq!(session.dev_nonce, 0x1234);
}

#[test]
fn test_uplink_counter() {
    let mut session = SessionState::new();
    assert_eq!(session.increment_fcnt_up(), 0);
    assert_eq!(session.increment_fcnt_up(), 1);
    assert_eq!(session.fcnt_up, 2);

    session.fcnt_up = u16::MAX;
    assert_eq!(session.increment_fcnt_up(), u16::MAX);
    assert_eq!(session.fcnt_up, 0);
}

#[test]
fn test_downlink_counter_window() {
    let mut session = SessionState::new();

    assert!(session.receive_down(100, 16384));
    assert_eq!(session.fcnt_down(), 100);

    // only the upper bound is checked
    assert!(session.receive_down(50, 16384));
    assert_eq!(session.fcnt_down(), 50);

    assert!(!session.receive_down(50 + 16384, 16384));
    assert_eq!(session.fcnt_down(), 50);
    assert!(session.receive_down(50 + 16383, 16384));
}

#[test]
fn test_mac_params_defaults() {
    let eu = MacParams::defaults_for(&EU868::new());
    assert_eq!(eu.rx1_delay, 1);
    assert_eq!(eu.rx2_frequency, 869_525_000);
    assert_eq!(eu.rx2_rate, 0);
    assert_eq!(eu.aggregate_off_time_factor(), 0);

    let us = MacParams::defaults_for(&US915::new());
    assert_eq!(us.rx2_frequency, 923_300_000);
    assert_eq!(us.rx2_rate, 8);
}

#[test]
fn test_aggregate_off_time_factor() {
    let mut params = MacParams::defaults_for(&EU868::new());

    params.max_duty_cycle = 1;
    assert_eq!(params.aggregate_off_time_factor(), 2);
    params.max_duty_cycle = 15;
    assert_eq!(params.aggregate_off_time_factor(), 32768);
}
