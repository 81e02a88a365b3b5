//! Channel and band scheduler
//!
//! Keeps the uplink channel table and one off-time record per regulatory
//! band. After every transmission the band used is blocked for
//! `air time x off-time factor` ticks. A cursor always points at the next
//! channel to use: the band that becomes ready first, and within that band
//! the channel after the one used last.

use heapless::Vec;
use log::debug;

use super::region::{DefaultChannel, Region};

/// Channel slots available to any region
pub const MAX_CHANNELS: usize = 72;

/// Bands available to any region
pub const MAX_BANDS: usize = 9;

/// Rate bounds of a channel that has not been constrained
const UNCONSTRAINED: (u8, u8) = (0, 15);

/// One uplink channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    /// Frequency in Hz, 0 when the slot is unused
    pub frequency: u32,
    /// Band assigned by the region
    pub band: u8,
    /// Excluded from selection
    pub masked: bool,
    /// Lowest allowed data rate
    pub min_rate: u8,
    /// Highest allowed data rate
    pub max_rate: u8,
    /// RX1 frequency set by the network, 0 to follow the region
    pub dl_frequency: u32,
}

impl Channel {
    fn is_unmasked(&self) -> bool {
        self.frequency != 0 && !self.masked
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Band {
    time_ready: u64,
    last_channel: Option<usize>,
    num_unmasked: usize,
}

/// Channel chosen for a transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxChannel {
    /// Channel index
    pub index: u8,
    /// Frequency in Hz
    pub frequency: u32,
    /// Band of the channel
    pub band: u8,
}

/// Channel table and band off-time bookkeeping
#[derive(Debug, Clone)]
pub struct ChannelList<REG: Region> {
    region: REG,
    channels: [Channel; MAX_CHANNELS],
    bands: [Band; MAX_BANDS],
    num_unmasked: usize,
    next_band: Option<usize>,
    next_channel: Option<usize>,
    aggregate_off_time: u16,
}

impl<REG: Region> ChannelList<REG> {
    /// Create a list holding the default channels of `region`
    pub fn new(region: REG) -> Self {
        let mut list = Self {
            region,
            channels: [Channel::default(); MAX_CHANNELS],
            bands: [Band::default(); MAX_BANDS],
            num_unmasked: 0,
            next_band: None,
            next_channel: None,
            aggregate_off_time: 0,
        };
        list.restore_defaults();
        list
    }

    /// Drop all channels and band state and reinstall the region defaults
    pub fn restore_defaults(&mut self) {
        self.channels = [Channel::default(); MAX_CHANNELS];
        self.bands = [Band::default(); MAX_BANDS];
        self.num_unmasked = 0;
        self.next_band = None;
        self.next_channel = None;
        self.aggregate_off_time = 0;

        let defaults: Vec<DefaultChannel, MAX_CHANNELS> =
            self.region.default_channels().take(MAX_CHANNELS).collect();

        for ch in defaults {
            if !self.add(ch.index, ch.frequency) || !self.constrain_rate(ch.index, ch.min_rate, ch.max_rate) {
                log::error!("could not add default channel {}", ch.index);
            }
        }
    }

    /// Region tables this list validates against
    pub fn region(&self) -> &REG {
        &self.region
    }

    /// Number of usable channel slots
    pub fn capacity(&self) -> usize {
        self.region.num_channels().min(MAX_CHANNELS)
    }

    /// Channel at `index`
    pub fn channel(&self, index: u8) -> Option<&Channel> {
        self.channels[..self.capacity()].get(usize::from(index))
    }

    /// Number of configured, unmasked channels
    pub fn num_unmasked(&self) -> usize {
        self.num_unmasked
    }

    /// Number of configured, unmasked channels in `band`
    pub fn band_unmasked(&self, band: u8) -> usize {
        self.bands.get(usize::from(band)).map_or(0, |b| b.num_unmasked)
    }

    /// Channel the cursor points at
    pub fn next_channel(&self) -> Option<u8> {
        self.next_channel.map(|i| i as u8)
    }

    /// Band the cursor points at
    pub fn next_band(&self) -> Option<u8> {
        self.next_band.map(|b| b as u8)
    }

    /// Install `frequency` at `index`
    ///
    /// A zero frequency removes the channel. Adding to an occupied slot
    /// replaces it. Fails if the index is out of range or the region rejects
    /// the frequency.
    pub fn add(&mut self, index: u8, frequency: u32) -> bool {
        let i = usize::from(index);
        if i >= self.capacity() {
            return false;
        }

        if frequency == 0 {
            self.remove(index);
            return true;
        }

        let band = match self.region.validate_frequency(frequency) {
            Some(band) if usize::from(band) < MAX_BANDS => band,
            _ => return false,
        };

        if self.channels[i].frequency != 0 {
            self.remove(index);
        }

        self.channels[i] = Channel {
            frequency,
            band,
            masked: false,
            min_rate: UNCONSTRAINED.0,
            max_rate: UNCONSTRAINED.1,
            dl_frequency: 0,
        };
        self.bands[usize::from(band)].num_unmasked += 1;
        self.num_unmasked += 1;

        if self.num_unmasked == 1 {
            self.cycle_channel();
        }

        true
    }

    /// Remove the channel at `index`
    pub fn remove(&mut self, index: u8) {
        let i = usize::from(index);
        if i >= self.capacity() || self.channels[i].frequency == 0 {
            return;
        }

        let channel = &mut self.channels[i];
        let was_unmasked = !channel.masked;
        channel.frequency = 0;
        channel.masked = false;

        if was_unmasked {
            self.bands[usize::from(channel.band)].num_unmasked -= 1;
            self.num_unmasked -= 1;
        }

        if self.next_channel == Some(i) {
            self.cycle_channel();
        }
    }

    /// Restrict the data rates usable on `index`
    pub fn constrain_rate(&mut self, index: u8, min_rate: u8, max_rate: u8) -> bool {
        let i = usize::from(index);
        if i >= self.capacity() || self.channels[i].frequency == 0 || min_rate > max_rate {
            return false;
        }

        if !self.region.validate_rate(index, min_rate) || !self.region.validate_rate(index, max_rate) {
            return false;
        }

        self.channels[i].min_rate = min_rate;
        self.channels[i].max_rate = max_rate;
        true
    }

    /// Listen on `frequency` in RX1 after transmitting on `index`
    pub fn set_dl_frequency(&mut self, index: u8, frequency: u32) -> bool {
        let i = usize::from(index);
        if i >= self.capacity() || self.channels[i].frequency == 0 {
            return false;
        }

        self.channels[i].dl_frequency = frequency;
        true
    }

    /// Exclude `index` from selection
    ///
    /// Fails if the slot holds no channel.
    pub fn mask(&mut self, index: u8) -> bool {
        let i = usize::from(index);
        if i >= self.capacity() || self.channels[i].frequency == 0 {
            return false;
        }

        if !self.channels[i].masked {
            self.channels[i].masked = true;
            self.bands[usize::from(self.channels[i].band)].num_unmasked -= 1;
            self.num_unmasked -= 1;

            if self.next_channel == Some(i) {
                self.cycle_channel();
            }
        }

        true
    }

    /// Make `index` selectable again
    ///
    /// Does not report failure; unmasking an empty or unmasked slot has no
    /// effect.
    pub fn unmask(&mut self, index: u8) {
        let i = usize::from(index);
        if i >= self.capacity() {
            return;
        }

        let channel = &mut self.channels[i];
        if channel.frequency == 0 || !channel.masked {
            return;
        }

        channel.masked = false;
        self.bands[usize::from(channel.band)].num_unmasked += 1;
        self.num_unmasked += 1;

        if self.num_unmasked == 1 {
            self.cycle_channel();
        }
    }

    /// Aggregated off-time factor applied on top of the band factors
    pub fn set_aggregate_off_time(&mut self, factor: u16) {
        self.aggregate_off_time = factor;
    }

    /// Ticks until the band under the cursor is ready
    ///
    /// Zero when ready or when no band is selected.
    pub fn wait_time(&self, now: u64) -> u64 {
        match self.next_band {
            Some(band) => self.bands[band].time_ready.saturating_sub(now),
            None => 0,
        }
    }

    /// Account a transmission of `air_time` ticks started at `now` against
    /// the band under the cursor
    pub fn register_transmission(&mut self, now: u64, air_time: u64) {
        if let Some(band) = self.next_band {
            self.register_band_transmission(band as u8, now, air_time);
        }
    }

    /// Account a transmission against a specific band
    pub fn register_band_transmission(&mut self, band: u8, now: u64, air_time: u64) {
        let Some(entry) = self.bands.get_mut(usize::from(band)) else {
            return;
        };

        let factor = self.region.off_time_factor(band).max(self.aggregate_off_time);
        entry.time_ready = now.saturating_add(air_time.saturating_mul(u64::from(factor)));

        debug!(
            "band {} off until {} (air time {}, factor {})",
            band, entry.time_ready, air_time, factor
        );

        self.cycle_channel();
    }

    /// Pick a channel at random among those usable at `now` with `rate`
    ///
    /// A channel is usable when it is configured, unmasked, its band is out
    /// of off-time and `rate` lies within its rate bounds.
    pub fn select(&self, now: u64, rate: u8, mut rand: impl FnMut() -> u8) -> Option<TxChannel> {
        let eligible = |(i, ch): &(usize, &Channel)| {
            ch.is_unmasked()
                && self.bands[usize::from(ch.band)].time_ready <= now
                && (ch.min_rate..=ch.max_rate).contains(&rate)
                && self.region.validate_rate(*i as u8, rate)
        };

        let candidates = || self.channels[..self.capacity()].iter().enumerate().filter(eligible);

        let count = candidates().count();
        if count == 0 {
            return None;
        }

        let pick = ((usize::from(rand()) << 8) | usize::from(rand())) % count;

        candidates().nth(pick).map(|(i, ch)| TxChannel {
            index: i as u8,
            frequency: ch.frequency,
            band: ch.band,
        })
    }

    /// Earliest time any unmasked channel becomes usable
    pub fn time_ready(&self) -> Option<u64> {
        self.next_band.map(|band| self.bands[band].time_ready)
    }

    fn cycle_channel(&mut self) {
        self.next_band = None;
        self.next_channel = None;

        let mut earliest = u64::MAX;
        for (i, band) in self.bands.iter().enumerate() {
            if band.num_unmasked > 0 && (self.next_band.is_none() || band.time_ready < earliest) {
                earliest = band.time_ready;
                self.next_band = Some(i);
            }
        }

        let Some(band) = self.next_band else {
            return;
        };

        let capacity = self.capacity();
        let start = self.bands[band].last_channel.map_or(0, |last| last + 1);

        let found = (0..capacity).map(|n| (start + n) % capacity).find(|&i| {
            let ch = &self.channels[i];
            ch.is_unmasked() && usize::from(ch.band) == band
        });

        match found {
            Some(i) => {
                self.bands[band].last_channel = Some(i);
                self.next_channel = Some(i);
            }
            None => {
                log::error!("band {} counts unmasked channels but none found", band);
                self.bands[band].last_channel = None;
                self.next_band = None;
            }
        }
    }
}
