//! Regional parameters
//!
//! A [`Region`] is a read-only table set: channel plan, band plan with
//! duty-cycle off-time factors, data-rate definitions and receive window
//! defaults. Two plans are provided, [`EU868`] (dynamic) and [`US915`]
//! (fixed).

use crate::radio::traits::{Bandwidth, SpreadingFactor};

/// Radio parameters and payload limit for one data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateParameters {
    /// Spreading factor
    pub spreading_factor: SpreadingFactor,
    /// Bandwidth
    pub bandwidth: Bandwidth,
    /// Maximum application payload (N) in bytes
    pub max_payload: u8,
}

/// Channel installed when the region is (re)loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DefaultChannel {
    /// Channel index
    pub index: u8,
    /// Frequency in Hz
    pub frequency: u32,
    /// Lowest allowed data rate
    pub min_rate: u8,
    /// Highest allowed data rate
    pub max_rate: u8,
}

/// Default MAC settings of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionDefaults {
    /// RX1 delay in seconds
    pub rx1_delay: u8,
    /// Join accept delay 1 in seconds
    pub join_accept_delay1: u8,
    /// Largest accepted jump of the downlink counter
    pub max_fcnt_gap: u16,
    /// RX2 frequency in Hz
    pub rx2_frequency: u32,
    /// RX2 data rate
    pub rx2_rate: u8,
    /// Initial uplink data rate
    pub rate: u8,
    /// Initial TX power index
    pub power: u8,
}

/// Region table contract
pub trait Region {
    /// Number of channel slots the plan uses
    fn num_channels(&self) -> usize;

    /// Channels installed by default
    fn default_channels(&self) -> impl Iterator<Item = DefaultChannel>;

    /// Band containing `frequency`, or `None` if it may not be used
    fn validate_frequency(&self, frequency: u32) -> Option<u8>;

    /// True if the device may listen on `frequency`
    fn validate_downlink_frequency(&self, frequency: u32) -> bool {
        self.validate_frequency(frequency).is_some()
    }

    /// True if `rate` may be used on channel `ch_index`
    fn validate_rate(&self, ch_index: u8, rate: u8) -> bool;

    /// Radio parameters for an uplink or downlink data rate
    fn rate_parameters(&self, rate: u8) -> Option<RateParameters>;

    /// Downlink rate of RX1 for an uplink at `up_rate`
    fn rx1_rate(&self, up_rate: u8, offset: u8) -> Option<u8>;

    /// Downlink frequency of RX1 for an uplink on `ch_index`/`tx_frequency`
    fn rx1_frequency(&self, ch_index: u8, tx_frequency: u32) -> u32;

    /// Default MAC settings
    fn defaults(&self) -> RegionDefaults;

    /// Off-time factor of `band` (off-time = air time x factor)
    fn off_time_factor(&self, band: u8) -> u16;

    /// True for plans where the network may add channels
    fn is_dynamic(&self) -> bool;

    /// TX power in dBm for a power index
    fn tx_power(&self, index: u8) -> Option<i8>;

    /// Data rate range given to channels installed from a join accept CFList
    fn cf_list_rate_range(&self) -> (u8, u8) {
        (0, 5)
    }
}

const fn rate(spreading_factor: SpreadingFactor, bandwidth: Bandwidth, max_payload: u8) -> RateParameters {
    RateParameters {
        spreading_factor,
        bandwidth,
        max_payload,
    }
}

/// EU 863-870 MHz band plan
#[derive(Debug, Clone, Copy, Default)]
pub struct EU868;

impl EU868 {
    /// Create the EU868 table set
    pub fn new() -> Self {
        Self
    }
}

const EU868_RATES: [RateParameters; 7] = [
    rate(SpreadingFactor::SF12, Bandwidth::BW125, 51),
    rate(SpreadingFactor::SF11, Bandwidth::BW125, 51),
    rate(SpreadingFactor::SF10, Bandwidth::BW125, 51),
    rate(SpreadingFactor::SF9, Bandwidth::BW125, 115),
    rate(SpreadingFactor::SF8, Bandwidth::BW125, 222),
    rate(SpreadingFactor::SF7, Bandwidth::BW125, 222),
    rate(SpreadingFactor::SF7, Bandwidth::BW250, 222),
];

// (begin, end, off-time factor), band index is the position
const EU868_BANDS: [(u32, u32, u16); 6] = [
    (863_000_000, 865_000_000, 1000),
    (865_000_000, 868_000_000, 100),
    (868_000_000, 868_600_000, 100),
    (868_700_000, 869_200_000, 1000),
    (869_400_000, 869_650_000, 10),
    (869_700_000, 870_000_000, 100),
];

const EU868_DEFAULT_CHANNELS: [u32; 3] = [868_100_000, 868_300_000, 868_500_000];

impl Region for EU868 {
    fn num_channels(&self) -> usize {
        16
    }

    fn default_channels(&self) -> impl Iterator<Item = DefaultChannel> {
        EU868_DEFAULT_CHANNELS
            .into_iter()
            .enumerate()
            .map(|(i, frequency)| DefaultChannel {
                index: i as u8,
                frequency,
                min_rate: 0,
                max_rate: 5,
            })
    }

    fn validate_frequency(&self, frequency: u32) -> Option<u8> {
        EU868_BANDS
            .iter()
            .position(|&(begin, end, _)| frequency >= begin && frequency <= end)
            .map(|band| band as u8)
    }

    fn validate_rate(&self, ch_index: u8, rate: u8) -> bool {
        usize::from(ch_index) < self.num_channels() && usize::from(rate) < EU868_RATES.len()
    }

    fn rate_parameters(&self, rate: u8) -> Option<RateParameters> {
        EU868_RATES.get(usize::from(rate)).copied()
    }

    fn rx1_rate(&self, up_rate: u8, offset: u8) -> Option<u8> {
        if usize::from(up_rate) < EU868_RATES.len() && offset <= 5 {
            Some(up_rate.saturating_sub(offset))
        } else {
            None
        }
    }

    fn rx1_frequency(&self, _ch_index: u8, tx_frequency: u32) -> u32 {
        tx_frequency
    }

    fn defaults(&self) -> RegionDefaults {
        RegionDefaults {
            rx1_delay: 1,
            join_accept_delay1: 5,
            max_fcnt_gap: 16384,
            rx2_frequency: 869_525_000,
            rx2_rate: 0,
            rate: 0,
            power: 0,
        }
    }

    fn off_time_factor(&self, band: u8) -> u16 {
        EU868_BANDS
            .get(usize::from(band))
            .map(|&(_, _, factor)| factor)
            .unwrap_or(0)
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn tx_power(&self, index: u8) -> Option<i8> {
        // max EIRP 16 dBm, 2 dB steps
        if index <= 7 {
            Some(16 - 2 * index as i8)
        } else {
            None
        }
    }
}

/// US 902-928 MHz band plan
///
/// Channels 0-63 are the 125 kHz uplink channels, 64-71 the 500 kHz ones.
/// Every group of eight 125 kHz channels is a band of its own (sub-band),
/// the 500 kHz channels share band 8.
#[derive(Debug, Clone, Copy, Default)]
pub struct US915;

impl US915 {
    /// Create the US915 table set
    pub fn new() -> Self {
        Self
    }
}

const US915_RATES: [Option<RateParameters>; 14] = [
    Some(rate(SpreadingFactor::SF10, Bandwidth::BW125, 11)),
    Some(rate(SpreadingFactor::SF9, Bandwidth::BW125, 53)),
    Some(rate(SpreadingFactor::SF8, Bandwidth::BW125, 125)),
    Some(rate(SpreadingFactor::SF7, Bandwidth::BW125, 242)),
    Some(rate(SpreadingFactor::SF8, Bandwidth::BW500, 242)),
    None,
    None,
    None,
    Some(rate(SpreadingFactor::SF12, Bandwidth::BW500, 53)),
    Some(rate(SpreadingFactor::SF11, Bandwidth::BW500, 129)),
    Some(rate(SpreadingFactor::SF10, Bandwidth::BW500, 242)),
    Some(rate(SpreadingFactor::SF9, Bandwidth::BW500, 242)),
    Some(rate(SpreadingFactor::SF8, Bandwidth::BW500, 242)),
    Some(rate(SpreadingFactor::SF7, Bandwidth::BW500, 242)),
];

// [uplink DR][RX1DROffset]
const US915_RX1_RATES: [[u8; 4]; 5] = [
    [10, 9, 8, 8],
    [11, 10, 9, 8],
    [12, 11, 10, 9],
    [13, 12, 11, 10],
    [13, 13, 12, 11],
];

const US915_BW125_BASE: u32 = 902_300_000;
const US915_BW125_STEP: u32 = 200_000;
const US915_BW500_BASE: u32 = 903_000_000;
const US915_BW500_STEP: u32 = 1_600_000;
const US915_DOWNLINK_BASE: u32 = 923_300_000;
const US915_DOWNLINK_STEP: u32 = 600_000;

impl Region for US915 {
    fn num_channels(&self) -> usize {
        72
    }

    fn default_channels(&self) -> impl Iterator<Item = DefaultChannel> {
        (0u8..72).map(|index| {
            if index < 64 {
                DefaultChannel {
                    index,
                    frequency: US915_BW125_BASE + u32::from(index) * US915_BW125_STEP,
                    min_rate: 0,
                    max_rate: 3,
                }
            } else {
                DefaultChannel {
                    index,
                    frequency: US915_BW500_BASE + u32::from(index - 64) * US915_BW500_STEP,
                    min_rate: 4,
                    max_rate: 4,
                }
            }
        })
    }

    fn validate_frequency(&self, frequency: u32) -> Option<u8> {
        let offset125 = frequency.checked_sub(US915_BW125_BASE)?;
        if offset125 % US915_BW125_STEP == 0 && offset125 / US915_BW125_STEP < 64 {
            return Some((offset125 / US915_BW125_STEP / 8) as u8);
        }

        let offset500 = frequency.checked_sub(US915_BW500_BASE)?;
        if offset500 % US915_BW500_STEP == 0 && offset500 / US915_BW500_STEP < 8 {
            return Some(8);
        }

        None
    }

    fn validate_downlink_frequency(&self, frequency: u32) -> bool {
        frequency
            .checked_sub(US915_DOWNLINK_BASE)
            .map_or(false, |offset| {
                offset % US915_DOWNLINK_STEP == 0 && offset / US915_DOWNLINK_STEP < 8
            })
    }

    fn validate_rate(&self, ch_index: u8, rate: u8) -> bool {
        match ch_index {
            0..=63 => rate <= 3,
            64..=71 => rate == 4,
            _ => false,
        }
    }

    fn rate_parameters(&self, rate: u8) -> Option<RateParameters> {
        US915_RATES.get(usize::from(rate)).copied().flatten()
    }

    fn rx1_rate(&self, up_rate: u8, offset: u8) -> Option<u8> {
        US915_RX1_RATES
            .get(usize::from(up_rate))
            .and_then(|row| row.get(usize::from(offset)))
            .copied()
    }

    fn rx1_frequency(&self, ch_index: u8, _tx_frequency: u32) -> u32 {
        US915_DOWNLINK_BASE + u32::from(ch_index % 8) * US915_DOWNLINK_STEP
    }

    fn defaults(&self) -> RegionDefaults {
        RegionDefaults {
            rx1_delay: 1,
            join_accept_delay1: 5,
            max_fcnt_gap: 16384,
            rx2_frequency: 923_300_000,
            rx2_rate: 8,
            rate: 0,
            power: 0,
        }
    }

    fn off_time_factor(&self, _band: u8) -> u16 {
        0
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    fn tx_power(&self, index: u8) -> Option<i8> {
        // max conducted power 30 dBm, 2 dB steps
        if index <= 10 {
            Some(30 - 2 * index as i8)
        } else {
            None
        }
    }
}
