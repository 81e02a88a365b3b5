//! Host services consumed by the MAC
//!
//! The host provides a monotonic tick counter, a byte-wise random source, a
//! short blocking delay and optionally somewhere to keep the session.

use embedded_hal::blocking::delay::DelayUs;

use crate::config::device::SessionState;

/// Tick rate used when the host does not override it (10 us per tick)
pub const DEFAULT_TICKS_PER_SECOND: u64 = 100_000;

/// System services
///
/// `delay_us` is only used to sleep out the last few milliseconds before a
/// receive window opens.
pub trait System: DelayUs<u32> {
    /// Current time in ticks
    fn time(&self) -> u64;

    /// One random byte
    fn rand(&mut self) -> u8;

    /// Time base
    fn ticks_per_second(&self) -> u64 {
        DEFAULT_TICKS_PER_SECOND
    }

    /// Called whenever keys, address or counters change
    fn save_session(&mut self, _session: &SessionState) {}
}
