use crate::lorawan::region::Region;

/// MAC settings that the network may change at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacParams {
    /// Uplink data rate
    pub rate: u8,
    /// TX power index
    pub power: u8,
    /// RX1 data rate offset
    pub rx1_dr_offset: u8,
    /// RX1 delay in seconds (RX2 opens one second later)
    pub rx1_delay: u8,
    /// RX2 frequency in Hz
    pub rx2_frequency: u32,
    /// RX2 data rate
    pub rx2_rate: u8,
    /// Aggregated duty cycle limit as a power of two (0 = no limit)
    pub max_duty_cycle: u8,
}

impl MacParams {
    /// Settings a device starts from in `region`
    pub fn defaults_for<REG: Region>(region: &REG) -> Self {
        let defaults = region.defaults();

        Self {
            rate: defaults.rate,
            power: defaults.power,
            rx1_dr_offset: 0,
            rx1_delay: defaults.rx1_delay,
            rx2_frequency: defaults.rx2_frequency,
            rx2_rate: defaults.rx2_rate,
            max_duty_cycle: 0,
        }
    }

    /// Aggregated off-time factor (2^max_duty_cycle, 0 when unlimited)
    pub fn aggregate_off_time_factor(&self) -> u16 {
        match self.max_duty_cycle {
            0 => 0,
            n if n < 16 => 1u16 << n,
            _ => u16::MAX,
        }
    }
}
