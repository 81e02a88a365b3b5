use super::region::RateParameters;
use crate::radio::traits::{CodingRate, ModulationParams, RxConfig, TxConfig};

/// Preamble length used for every LoRaWAN frame
pub const PREAMBLE_SYMBOLS: u16 = 8;

/// Receive window length in symbols
pub const RX_TIMEOUT_SYMBOLS: u16 = 8;

/// Symbol time above which low data rate optimisation is mandatory
const LDRO_SYMBOL_TIME_US: u64 = 16_000;

/// Modulation for a data rate (coding rate is always 4/5)
pub fn modulation(rate: &RateParameters) -> ModulationParams {
    ModulationParams {
        spreading_factor: rate.spreading_factor,
        bandwidth: rate.bandwidth,
        coding_rate: CodingRate::CR4_5,
    }
}

/// Settings for an uplink
pub fn tx_config(frequency: u32, rate: &RateParameters, power: i8) -> TxConfig {
    TxConfig {
        power,
        frequency,
        modulation: modulation(rate),
        preamble: PREAMBLE_SYMBOLS,
    }
}

/// Settings for a receive window
pub fn rx_config(frequency: u32, rate: &RateParameters) -> RxConfig {
    RxConfig {
        frequency,
        modulation: modulation(rate),
        preamble: PREAMBLE_SYMBOLS,
        timeout_symbols: RX_TIMEOUT_SYMBOLS,
    }
}

/// Duration of one symbol in microseconds
pub fn symbol_time_us(modulation: &ModulationParams) -> u64 {
    (1_000_000u64 << modulation.spreading_factor.value()) / u64::from(modulation.bandwidth.hz())
}

/// True when the symbol time requires low data rate optimisation
pub fn low_data_rate_optimize(modulation: &ModulationParams) -> bool {
    symbol_time_us(modulation) > LDRO_SYMBOL_TIME_US
}

/// Time on air of a `payload_len` byte frame, in ticks (rounded up)
///
/// Explicit header and payload CRC are assumed.
pub fn time_on_air(modulation: &ModulationParams, payload_len: usize, ticks_per_second: u64) -> u64 {
    let sf = i64::from(modulation.spreading_factor.value());
    let de = i64::from(low_data_rate_optimize(modulation));
    let cr = i64::from(modulation.coding_rate.denominator_offset());

    // 8PL - 4SF + 28 + 16 (CRC) - 0 (explicit header)
    let numerator = 8 * payload_len as i64 - 4 * sf + 44;
    let denominator = 4 * (sf - 2 * de);
    let blocks = if numerator > 0 {
        (numerator + denominator - 1) / denominator
    } else {
        0
    };
    let payload_symbols = 8 + blocks * (cr + 4);

    // preamble + 4.25 sync symbols, counted in quarter symbols
    let quarters = 4 * u64::from(PREAMBLE_SYMBOLS) + 17 + 4 * payload_symbols as u64;

    let numerator = (quarters << modulation.spreading_factor.value()) * ticks_per_second;
    let denominator = 4 * u64::from(modulation.bandwidth.hz());
    (numerator + denominator - 1) / denominator
}
