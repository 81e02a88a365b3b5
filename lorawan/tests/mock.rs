#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayUs;
use lorawan_device::{
    config::device::SessionState,
    lorawan::mac::{Response, ResponseHandler},
    radio::traits::{Radio, RxConfig, TxConfig},
    system::System,
};

/// Mock radio error type
#[derive(Debug)]
pub enum MockError {
    /// Driver refused the request
    Rejected,
}

/// Everything the mock radio saw, shared with the test
#[derive(Debug, Default)]
pub struct RadioLog {
    pub transmitted: Vec<(TxConfig, Vec<u8>)>,
    pub listened: Vec<RxConfig>,
    pub sleeps: usize,
    pub rx_frames: VecDeque<Vec<u8>>,
    pub reject_tx: bool,
    pub reject_rx: bool,
}

/// Mock radio for testing
#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    pub log: Rc<RefCell<RadioLog>>,
}

impl MockRadio {
    /// Create new mock radio
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for the next collect call
    pub fn set_rx_data(&self, data: &[u8]) {
        self.log.borrow_mut().rx_frames.push_back(data.to_vec());
    }

    /// Get last transmitted data
    pub fn last_tx(&self) -> Option<Vec<u8>> {
        self.log.borrow().transmitted.last().map(|(_, data)| data.clone())
    }

    /// Get last transmit settings
    pub fn last_tx_config(&self) -> Option<TxConfig> {
        self.log.borrow().transmitted.last().map(|(config, _)| *config)
    }

    /// Get last receive settings
    pub fn last_rx_config(&self) -> Option<RxConfig> {
        self.log.borrow().listened.last().copied()
    }

    pub fn tx_count(&self) -> usize {
        self.log.borrow().transmitted.len()
    }

    pub fn rx_count(&self) -> usize {
        self.log.borrow().listened.len()
    }
}

impl Radio for MockRadio {
    type Error = MockError;

    fn transmit(&mut self, config: &TxConfig, data: &[u8]) -> Result<(), Self::Error> {
        let mut log = self.log.borrow_mut();
        if log.reject_tx {
            return Err(MockError::Rejected);
        }
        log.transmitted.push((*config, data.to_vec()));
        Ok(())
    }

    fn receive(&mut self, config: &RxConfig) -> Result<(), Self::Error> {
        let mut log = self.log.borrow_mut();
        if log.reject_rx {
            return Err(MockError::Rejected);
        }
        log.listened.push(*config);
        Ok(())
    }

    fn collect(&mut self, buffer: &mut [u8]) -> usize {
        match self.log.borrow_mut().rx_frames.pop_front() {
            Some(frame) => {
                let len = frame.len().min(buffer.len());
                buffer[..len].copy_from_slice(&frame[..len]);
                len
            }
            None => 0,
        }
    }

    fn sleep(&mut self) {
        self.log.borrow_mut().sleeps += 1;
    }
}

/// Mock host services with a clock the test moves by hand
#[derive(Debug, Clone, Default)]
pub struct MockSystem {
    pub clock: Rc<Cell<u64>>,
    pub next_rand: Rc<Cell<u8>>,
    pub delays: Rc<RefCell<Vec<u32>>>,
    pub saved: Rc<RefCell<Vec<SessionState>>>,
}

impl MockSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time(&self, time: u64) {
        self.clock.set(time);
    }

    pub fn advance(&self, ticks: u64) {
        self.clock.set(self.clock.get() + ticks);
    }

    pub fn now(&self) -> u64 {
        self.clock.get()
    }
}

impl DelayUs<u32> for MockSystem {
    fn delay_us(&mut self, us: u32) {
        self.delays.borrow_mut().push(us);
    }
}

impl System for MockSystem {
    fn time(&self) -> u64 {
        self.clock.get()
    }

    fn rand(&mut self) -> u8 {
        let value = self.next_rand.get();
        self.next_rand.set(value.wrapping_add(1));
        value
    }

    fn save_session(&mut self, session: &SessionState) {
        self.saved.borrow_mut().push(session.clone());
    }
}

/// Owned copy of a [`Response`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Ready,
    Timeout,
    Rx(u8, Vec<u8>),
}

/// Response handler that records everything it is given
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub responses: Rc<RefCell<Vec<Recorded>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Recorded> {
        self.responses.borrow_mut().drain(..).collect()
    }
}

impl ResponseHandler for Recorder {
    fn handle(&mut self, response: Response<'_>) {
        let recorded = match response {
            Response::Ready => Recorded::Ready,
            Response::Timeout => Recorded::Timeout,
            Response::Rx { port, data } => Recorded::Rx(port, data.to_vec()),
        };
        self.responses.borrow_mut().push(recorded);
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
