//! Device and network configuration
//!
//! This module contains types and functions for configuring LoRaWAN devices
//! and network parameters. It includes:
//! - Device identity (DevEUI, AppEUI, AppKey)
//! - Session state and frame counters
//! - MAC parameters negotiated with the network

/// Device identity and session state
pub mod device;

/// MAC parameters
pub mod params;

pub use device::{AESKey, DevAddr, DeviceConfig, SessionState, EUI64};
pub use params::MacParams;
