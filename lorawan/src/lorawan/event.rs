//! Event and timer core
//!
//! A tiny cooperative scheduler. It has a fixed pool of one-shot timers and
//! one slot per radio input. Interrupt handlers only call [`EventCore::receive`],
//! which records a timestamp. Everything else happens when the owner polls
//! [`EventCore::next_due`] (or [`EventCore::tick`]) from its main loop.
//!
//! Within one poll, pending inputs are returned before timers and timers are
//! returned in deadline order. A timer is returned only once its deadline has
//! passed.
//!
//! Registrations are identified by an [`EventHandle`]. Handles carry a
//! generation so that cancelling a handle whose slot has since been reused
//! does nothing.

use heapless::Vec;
use log::error;

use crate::radio::traits::RadioEvent;

/// Number of timers that can be armed at once
pub const EVENT_TIMER_SLOTS: usize = 3;

const INPUT_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Slot {
    Timer(u8),
    Input(u8),
}

/// Opaque reference to an armed timer or input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventHandle {
    slot: Slot,
    generation: u16,
}

/// A timer or input that is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fired<T> {
    /// Token given at registration
    pub token: T,
    /// Deadline of a timer, or the time an input was received
    pub time: u64,
    /// How late the event is being serviced (`now - time`)
    pub error: u64,
}

#[derive(Debug, Clone, Copy)]
struct Timer<T> {
    token: Option<T>,
    deadline: u64,
    generation: u16,
}

#[derive(Debug, Clone, Copy)]
struct Input<T> {
    token: Option<T>,
    received: Option<u64>,
    generation: u16,
}

fn input_index(kind: RadioEvent) -> usize {
    match kind {
        RadioEvent::TxComplete => 0,
        RadioEvent::RxReady => 1,
        RadioEvent::RxTimeout => 2,
    }
}

/// Timer pool and input slots
#[derive(Debug, Clone)]
pub struct EventCore<T: Copy> {
    timers: [Timer<T>; EVENT_TIMER_SLOTS],
    // armed timer slots, ascending deadline
    order: Vec<u8, EVENT_TIMER_SLOTS>,
    inputs: [Input<T>; INPUT_SLOTS],
}

impl<T: Copy> Default for EventCore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> EventCore<T> {
    /// Empty scheduler
    pub const fn new() -> Self {
        Self {
            timers: [Timer {
                token: None,
                deadline: 0,
                generation: 0,
            }; EVENT_TIMER_SLOTS],
            order: Vec::new(),
            inputs: [Input {
                token: None,
                received: None,
                generation: 0,
            }; INPUT_SLOTS],
        }
    }

    /// Arm a timer that fires at the absolute time `deadline`
    ///
    /// Returns `None` if every timer slot is in use.
    pub fn on_timeout(&mut self, deadline: u64, token: T) -> Option<EventHandle> {
        let Some(index) = self.timers.iter().position(|t| t.token.is_none()) else {
            error!("timer pool exhausted");
            return None;
        };

        let timer = &mut self.timers[index];
        timer.token = Some(token);
        timer.deadline = deadline;
        timer.generation = timer.generation.wrapping_add(1);
        let generation = timer.generation;

        // equal deadlines keep registration order
        let at = self
            .order
            .iter()
            .position(|&i| self.timers[usize::from(i)].deadline > deadline)
            .unwrap_or(self.order.len());

        if self.order.insert(at, index as u8).is_err() {
            error!("timer order list full");
            self.timers[index].token = None;
            return None;
        }

        Some(EventHandle {
            slot: Slot::Timer(index as u8),
            generation,
        })
    }

    /// Wait for the input `kind`
    ///
    /// Any earlier, unserviced occurrence of `kind` is discarded. Returns
    /// `None` if the slot is already armed.
    pub fn on_input(&mut self, kind: RadioEvent, token: T) -> Option<EventHandle> {
        let index = input_index(kind);
        let input = &mut self.inputs[index];

        if input.token.is_some() {
            error!("input slot {:?} already armed", kind);
            return None;
        }

        input.token = Some(token);
        input.received = None;
        input.generation = input.generation.wrapping_add(1);

        Some(EventHandle {
            slot: Slot::Input(index as u8),
            generation: input.generation,
        })
    }

    /// Record that input `kind` happened at `time`
    ///
    /// Safe to call from interrupt context: it only stores the timestamp.
    /// Only the first occurrence before servicing is kept.
    pub fn receive(&mut self, kind: RadioEvent, time: u64) {
        let input = &mut self.inputs[input_index(kind)];
        if input.received.is_none() {
            input.received = Some(time);
        }
    }

    /// Disarm `handle` and clear it
    ///
    /// Cancelling a cleared, fired or stale handle is a no-op.
    pub fn cancel(&mut self, handle: &mut Option<EventHandle>) {
        let Some(h) = handle.take() else {
            return;
        };

        match h.slot {
            Slot::Timer(index) => {
                let timer = &mut self.timers[usize::from(index)];
                if timer.generation == h.generation && timer.token.is_some() {
                    timer.token = None;
                    self.order.retain(|&i| i != index);
                }
            }
            Slot::Input(index) => {
                let input = &mut self.inputs[usize::from(index)];
                if input.generation == h.generation {
                    input.token = None;
                    input.received = None;
                }
            }
        }
    }

    /// Disarm everything
    pub fn clear(&mut self) {
        for timer in self.timers.iter_mut() {
            timer.token = None;
        }
        self.order.clear();
        for input in self.inputs.iter_mut() {
            input.token = None;
            input.received = None;
        }
    }

    /// Take the next event that is due at `now`
    ///
    /// Armed inputs that have been received come first, then expired timers
    /// in deadline order. The returned registration is disarmed.
    pub fn next_due(&mut self, now: u64) -> Option<Fired<T>> {
        for input in self.inputs.iter_mut() {
            if let (Some(token), Some(time)) = (input.token, input.received) {
                input.token = None;
                input.received = None;
                return Some(Fired {
                    token,
                    time,
                    error: now.saturating_sub(time),
                });
            }
        }

        let &first = self.order.first()?;
        let timer = &mut self.timers[usize::from(first)];
        if timer.deadline > now {
            return None;
        }

        let token = timer.token.take()?;
        let deadline = timer.deadline;
        self.order.remove(0);

        Some(Fired {
            token,
            time: deadline,
            error: now - deadline,
        })
    }

    /// Service everything due at `now`, handing each event to `f`
    pub fn tick(&mut self, now: u64, mut f: impl FnMut(Fired<T>)) {
        while let Some(fired) = self.next_due(now) {
            f(fired);
        }
    }

    /// Ticks until the earliest timer, `Some(0)` if something is due now
    ///
    /// `None` means nothing is scheduled.
    pub fn time_until_next(&self, now: u64) -> Option<u64> {
        if self
            .inputs
            .iter()
            .any(|i| i.token.is_some() && i.received.is_some())
        {
            return Some(0);
        }

        self.order
            .first()
            .map(|&i| self.timers[usize::from(i)].deadline.saturating_sub(now))
    }

    /// True if no timer or input is armed
    pub fn is_idle(&self) -> bool {
        self.order.is_empty() && self.inputs.iter().all(|i| i.token.is_none())
    }
}
