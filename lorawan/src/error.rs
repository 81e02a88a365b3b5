//! Crate error types
//!
//! - [`FrameError`] covers encoding contract violations and the two decode
//!   outcomes (malformed input, MIC mismatch)
//! - [`MacError`] is returned when the MAC refuses to start a join or send

use core::fmt;

/// Frame codec error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// More than 15 bytes of FOpts
    OptsTooLong,
    /// Application data without a port
    MissingPort,
    /// Output buffer cannot hold the encoded frame
    BufferTooSmall,
    /// Payload exceeds what a PHY payload can carry
    PayloadTooLarge,
    /// Unknown type tag or bad length
    Malformed,
    /// Integrity check failed
    Mic,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::OptsTooLong => f.write_str("FOpts longer than 15 bytes"),
            FrameError::MissingPort => f.write_str("payload present without port"),
            FrameError::BufferTooSmall => f.write_str("buffer too small"),
            FrameError::PayloadTooLarge => f.write_str("payload too large"),
            FrameError::Malformed => f.write_str("malformed frame"),
            FrameError::Mic => f.write_str("MIC mismatch"),
        }
    }
}

/// Reasons a join or send request is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacError {
    /// Another operation is in progress
    Busy,
    /// Data service requested before activation
    NotJoined,
    /// Port outside 1..=223
    InvalidPort,
    /// Payload does not fit the current data rate
    PayloadTooLarge,
    /// No channel is available right now
    NoChannel,
    /// The event core could not take another timer
    EventPoolExhausted,
    /// Encoding failed
    Frame(FrameError),
}

impl From<FrameError> for MacError {
    fn from(err: FrameError) -> Self {
        MacError::Frame(err)
    }
}

impl fmt::Display for MacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacError::Busy => f.write_str("MAC busy"),
            MacError::NotJoined => f.write_str("not joined"),
            MacError::InvalidPort => f.write_str("invalid port"),
            MacError::PayloadTooLarge => f.write_str("payload too large for data rate"),
            MacError::NoChannel => f.write_str("no channel available"),
            MacError::EventPoolExhausted => f.write_str("event pool exhausted"),
            MacError::Frame(err) => write!(f, "frame: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

#[cfg(feature = "std")]
impl std::error::Error for MacError {}
