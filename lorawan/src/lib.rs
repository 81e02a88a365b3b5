//! LoRaWAN 1.0 end-device stack
//!
//! A `no_std` Class A implementation for a single device. It contains:
//! - AES-128 and AES-CMAC used for MICs, payload encryption and key derivation
//! - A PHYPayload codec for join and data frames
//! - A channel table that enforces per-band off-time
//! - A small event core that turns radio interrupts and timers into work for
//!   the main loop
//! - The MAC state machine running join and uplink/downlink exchanges
//! - EU868 and US915 regional parameters
//!
//! The host supplies a [`radio::Radio`] driver and a [`system::System`]
//! (ticks, random bytes, short delays) and calls [`lorawan::mac::Mac::tick`]
//! from its main loop.
//!
//! # Example
//! ```no_run
//! use lorawan_device::{
//!     config::device::{AESKey, DeviceConfig},
//!     lorawan::{
//!         mac::{Mac, Response},
//!         region::EU868,
//!     },
//!     radio::RadioEvent,
//! };
//! # use lorawan_device::radio::traits::{Radio, RxConfig, TxConfig};
//! # use lorawan_device::system::System;
//! # struct Board;
//! # impl Radio for Board {
//! #     type Error = ();
//! #     fn transmit(&mut self, _: &TxConfig, _: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn receive(&mut self, _: &RxConfig) -> Result<(), ()> { Ok(()) }
//! #     fn collect(&mut self, _: &mut [u8]) -> usize { 0 }
//! #     fn sleep(&mut self) {}
//! # }
//! # struct Clock;
//! # impl embedded_hal::blocking::delay::DelayUs<u32> for Clock { fn delay_us(&mut self, _: u32) {} }
//! # impl System for Clock {
//! #     fn time(&self) -> u64 { 0 }
//! #     fn rand(&mut self) -> u8 { 4 }
//! # }
//! # let (radio, system) = (Board, Clock);
//!
//! fn on_response(response: Response<'_>) {
//!     if let Response::Rx { port, data } = response {
//!         let _ = (port, data);
//!     }
//! }
//!
//! let identity = DeviceConfig::new([0x01; 8], [0x02; 8], AESKey::new([0x03; 16]));
//! let mut mac = Mac::new(radio, EU868::new(), system, identity, on_response);
//!
//! mac.join().unwrap();
//! loop {
//!     // the radio interrupt handler records its event with a timestamp
//!     mac.radio_event(RadioEvent::TxComplete, 0);
//!     mac.tick();
//! #   break;
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/// Device and network configuration
pub mod config;

/// Cryptographic functions
pub mod crypto;

/// Error types
pub mod error;

/// LoRaWAN protocol implementation
pub mod lorawan;

/// Radio hardware abstraction layer
pub mod radio;

/// Host services
pub mod system;

pub use error::{FrameError, MacError};
pub use lorawan::mac::{Mac, Response, ResponseHandler};
pub use system::System;
