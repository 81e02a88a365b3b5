use lorawan_device::{
    lorawan::{
        phy,
        region::{Region, EU868, US915},
    },
    radio::traits::{Bandwidth, CodingRate, ModulationParams, SpreadingFactor},
};

fn lora(spreading_factor: SpreadingFactor, bandwidth: Bandwidth) -> ModulationParams {
    ModulationParams {
        spreading_factor,
        bandwidth,
        coding_rate: CodingRate::CR4_5,
    }
}

#[test]
fn test_time_on_air() {
    // 45.25 symbols of 1.024 ms
    let sf7 = lora(SpreadingFactor::SF7, Bandwidth::BW125);
    assert_eq!(phy::time_on_air(&sf7, 13, 100_000), 4_634);
    assert_eq!(phy::time_on_air(&sf7, 13, 1_000_000), 46_336);

    let sf12 = lora(SpreadingFactor::SF12, Bandwidth::BW125);
    assert!(phy::time_on_air(&sf12, 13, 100_000) > 90_000);
    assert!(phy::time_on_air(&sf12, 51, 100_000) > phy::time_on_air(&sf12, 13, 100_000));
}

#[test]
fn test_low_data_rate_optimize() {
    assert!(phy::low_data_rate_optimize(&lora(SpreadingFactor::SF12, Bandwidth::BW125)));
    assert!(phy::low_data_rate_optimize(&lora(SpreadingFactor::SF11, Bandwidth::BW125)));
    assert!(!phy::low_data_rate_optimize(&lora(SpreadingFactor::SF10, Bandwidth::BW125)));
    assert!(!phy::low_data_rate_optimize(&lora(SpreadingFactor::SF12, Bandwidth::BW500)));
}

#[test]
fn test_radio_configs() {
    let rate = EU868::new().rate_parameters(5).unwrap();

    let tx = phy::tx_config(868_100_000, &rate, 14);
    assert_eq!(tx.frequency, 868_100_000);
    assert_eq!(tx.power, 14);
    assert_eq!(tx.preamble, phy::PREAMBLE_SYMBOLS);
    assert_eq!(tx.modulation, lora(SpreadingFactor::SF7, Bandwidth::BW125));

    let rx = phy::rx_config(869_525_000, &rate);
    assert_eq!(rx.timeout_symbols, phy::RX_TIMEOUT_SYMBOLS);
    assert_eq!(rx.modulation, tx.modulation);
}

#[test]
fn test_eu868_tables() {
    let eu = EU868::new();

    assert_eq!(eu.validate_frequency(868_100_000), Some(2));
    assert_eq!(eu.validate_frequency(869_525_000), Some(4));
    assert_eq!(eu.validate_frequency(862_000_000), None);
    assert_eq!(eu.off_time_factor(2), 100);
    assert_eq!(eu.off_time_factor(4), 10);

    assert_eq!(eu.rx1_rate(5, 2), Some(3));
    assert_eq!(eu.rx1_rate(1, 3), Some(0));
    assert_eq!(eu.rx1_rate(1, 6), None);
    assert_eq!(eu.rx1_frequency(1, 868_300_000), 868_300_000);

    assert_eq!(eu.tx_power(0), Some(16));
    assert_eq!(eu.tx_power(7), Some(2));
    assert_eq!(eu.tx_power(8), None);

    assert_eq!(eu.rate_parameters(0).unwrap().max_payload, 51);
    assert!(eu.rate_parameters(7).is_none());
    assert_eq!(eu.default_channels().count(), 3);
    assert!(eu.is_dynamic());
}

#[test]
fn test_us915_tables() {
    let us = US915::new();

    assert_eq!(us.validate_frequency(902_300_000), Some(0));
    assert_eq!(us.validate_frequency(903_900_000), Some(1));
    assert_eq!(us.validate_frequency(903_000_000), Some(8));
    assert_eq!(us.validate_frequency(902_400_000), None);

    assert!(us.validate_downlink_frequency(923_900_000));
    assert!(!us.validate_downlink_frequency(902_300_000));

    assert!(us.validate_rate(10, 3));
    assert!(!us.validate_rate(10, 4));
    assert!(us.validate_rate(65, 4));

    assert_eq!(us.rx1_rate(0, 0), Some(10));
    assert_eq!(us.rx1_rate(4, 3), Some(11));
    assert_eq!(us.rx1_frequency(9, 904_100_000), 923_900_000);

    assert!(us.rate_parameters(5).is_none());
    assert_eq!(us.tx_power(10), Some(10));
    assert_eq!(us.off_time_factor(0), 0);
    assert_eq!(us.default_channels().count(), 72);
    assert!(!us.is_dynamic());
}
