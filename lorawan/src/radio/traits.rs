/// LoRa spreading factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpreadingFactor {
    /// SF7
    SF7 = 7,
    /// SF8
    SF8 = 8,
    /// SF9
    SF9 = 9,
    /// SF10
    SF10 = 10,
    /// SF11
    SF11 = 11,
    /// SF12
    SF12 = 12,
}

impl SpreadingFactor {
    /// Numeric spreading factor (7-12)
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// LoRa bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bandwidth {
    /// 125 kHz
    BW125,
    /// 250 kHz
    BW250,
    /// 500 kHz
    BW500,
}

impl Bandwidth {
    /// Bandwidth in Hz
    pub fn hz(self) -> u32 {
        match self {
            Bandwidth::BW125 => 125_000,
            Bandwidth::BW250 => 250_000,
            Bandwidth::BW500 => 500_000,
        }
    }
}

/// LoRa coding rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodingRate {
    /// 4/5
    CR4_5,
    /// 4/6
    CR4_6,
    /// 4/7
    CR4_7,
    /// 4/8
    CR4_8,
}

impl CodingRate {
    /// Redundancy bits per four data bits (1-4)
    pub fn denominator_offset(self) -> u8 {
        match self {
            CodingRate::CR4_5 => 1,
            CodingRate::CR4_6 => 2,
            CodingRate::CR4_7 => 3,
            CodingRate::CR4_8 => 4,
        }
    }
}

/// Radio modulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModulationParams {
    /// Spreading factor
    pub spreading_factor: SpreadingFactor,
    /// Bandwidth
    pub bandwidth: Bandwidth,
    /// Coding rate
    pub coding_rate: CodingRate,
}

/// Radio transmission parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxConfig {
    /// Transmission power in dBm
    pub power: i8,
    /// Frequency in Hz
    pub frequency: u32,
    /// Modulation parameters
    pub modulation: ModulationParams,
    /// Preamble length in symbols
    pub preamble: u16,
}

/// Radio receive parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxConfig {
    /// Frequency in Hz
    pub frequency: u32,
    /// Modulation parameters
    pub modulation: ModulationParams,
    /// Preamble length in symbols
    pub preamble: u16,
    /// Receive timeout in symbols
    pub timeout_symbols: u16,
}

/// Interrupt sources the host forwards to the MAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// Transmission finished
    TxComplete,
    /// A frame is waiting to be collected
    RxReady,
    /// The receive window closed without a frame
    RxTimeout,
}

/// Radio driver interface
///
/// Completion is reported out of band: the host calls
/// `Mac::radio_event` from its interrupt handler.
pub trait Radio {
    /// Error type for radio operations
    type Error: core::fmt::Debug;

    /// Start transmitting `data` with the given settings
    fn transmit(&mut self, config: &TxConfig, data: &[u8]) -> Result<(), Self::Error>;

    /// Open a single receive window with the given settings
    fn receive(&mut self, config: &RxConfig) -> Result<(), Self::Error>;

    /// Copy the last received frame into `buffer`
    /// Returns the number of bytes written
    fn collect(&mut self, buffer: &mut [u8]) -> usize;

    /// Put the radio into sleep mode
    fn sleep(&mut self);
}
