//! LoRaWAN protocol implementation
//!
//! This module contains the core LoRaWAN protocol implementation, including:
//! - Frame encoding and decoding
//! - Channel and band scheduling
//! - The event core driving the MAC
//! - MAC layer state machine and command handling
//! - Regional parameters and time on air

/// Channel table and band off-time
pub mod channel_list;

/// MAC command handling
pub mod commands;

/// Timers and radio inputs
pub mod event;

/// PHYPayload codec
pub mod frame;

/// MAC layer implementation
pub mod mac;

/// Radio settings and time on air
pub mod phy;

/// Regional parameters and configurations
pub mod region;

pub use channel_list::{ChannelList, TxChannel};
pub use event::{EventCore, EventHandle, Fired};
pub use frame::{DataFrame, FCtrl, Frame, JoinAccept, JoinRequest, Keys, MType};
pub use mac::{Mac, MacEvent, Operation, Response, ResponseHandler, State};
pub use region::{Region, EU868, US915};
