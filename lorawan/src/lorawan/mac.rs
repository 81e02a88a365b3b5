//! Class A MAC state machine
//!
//! A join or send runs as a sequence of steps driven by [`Mac::tick`]:
//!
//! 1. the frame is built and a transmit timer is armed for "now"
//! 2. the frame is handed to the radio and the band is charged for its air time
//! 3. on TX complete two timers are armed, one for RX1 and one for RX2
//! 4. each window is opened (or skipped if the timer fired too late)
//! 5. a received frame is decoded and processed, otherwise the sequence
//!    falls through to the next window or ends
//!
//! The outcome is reported through a [`ResponseHandler`].

use heapless::Vec;
use log::{debug, error, info, warn};

use super::channel_list::{ChannelList, TxChannel};
use super::commands::{Commands, LinkCheck, MacAnswer};
use super::event::{EventCore, EventHandle, Fired};
use super::frame::{self, DataFrame, FCtrl, Frame, JoinAccept, JoinRequest, Keys, MAX_FOPTS, MAX_PHY_PAYLOAD};
use super::phy;
use super::region::Region;
use crate::config::device::{AESKey, DevAddr, DeviceConfig, SessionState};
use crate::config::params::MacParams;
use crate::crypto;
use crate::error::MacError;
use crate::radio::traits::{Radio, RadioEvent};
use crate::system::System;

/// Highest application port
pub const MAX_PORT: u8 = 223;

/// Time the MAC waits after [`Mac::reset`] before accepting requests
const RESET_SETTLE_MS: u64 = 10;

/// MAC state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Ready for a new request
    Idle,
    /// Frame built, waiting for the transmit timer
    WaitTx,
    /// Transmitting
    Tx,
    /// Waiting for RX1 to open
    WaitRx1,
    /// RX1 open
    Rx1,
    /// Waiting for RX2 to open
    WaitRx2,
    /// RX2 open
    Rx2,
    /// Settling after a reset
    ResetWait,
    /// An event arrived that does not belong to the current state
    Error,
}

/// Operation in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// Nothing
    None,
    /// Join request sent
    Joining,
    /// Unconfirmed uplink sent
    SendUnconfirmed,
    /// Confirmed uplink sent
    SendConfirmed,
}

/// What the MAC tells the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response<'a> {
    /// The operation completed (join accepted, uplink sent or acknowledged)
    Ready,
    /// The operation completed without the expected answer
    Timeout,
    /// Application data received
    Rx {
        /// Port
        port: u8,
        /// Decrypted payload
        data: &'a [u8],
    },
}

/// Receiver of [`Response`]s
pub trait ResponseHandler {
    /// Handle one response
    fn handle(&mut self, response: Response<'_>);
}

impl<F> ResponseHandler for F
where
    F: FnMut(Response<'_>),
{
    fn handle(&mut self, response: Response<'_>) {
        self(response)
    }
}

/// Tokens for the event core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacEvent {
    /// Start transmitting
    Transmit,
    /// Open RX1
    Rx1Start,
    /// Open RX2
    Rx2Start,
    /// Radio finished transmitting
    TxComplete,
    /// Radio has a frame
    RxReady,
    /// Radio window closed empty
    RxTimeout,
    /// Reset settle time elapsed
    ResetDone,
}

/// LoRaWAN Class A MAC
pub struct Mac<R: Radio, REG: Region, S: System, H: ResponseHandler> {
    radio: R,
    system: S,
    handler: H,
    channels: ChannelList<REG>,
    events: EventCore<MacEvent>,
    state: State,
    op: Operation,
    identity: DeviceConfig,
    session: SessionState,
    params: MacParams,
    buffer: [u8; MAX_PHY_PAYLOAD],
    buffer_len: usize,
    tx_channel: Option<TxChannel>,
    tx_rate: u8,
    timer: Option<EventHandle>,
    rx2_timer: Option<EventHandle>,
    // RX2 deadline that passed while RX1 was still receiving
    rx2_deadline: Option<u64>,
    tx_complete: Option<EventHandle>,
    rx_ready: Option<EventHandle>,
    rx_timeout: Option<EventHandle>,
    // outcome of the sequence so far
    confirmed: bool,
    answers: Vec<u8, MAX_FOPTS>,
    link_check_pending: bool,
    link_check: Option<LinkCheck>,
    ack_pending: bool,
}

impl<R: Radio, REG: Region, S: System, H: ResponseHandler> Mac<R, REG, S, H> {
    /// Create an idle, unjoined MAC
    pub fn new(radio: R, region: REG, system: S, identity: DeviceConfig, handler: H) -> Self {
        let params = MacParams::defaults_for(&region);

        Self {
            radio,
            system,
            handler,
            channels: ChannelList::new(region),
            events: EventCore::new(),
            state: State::Idle,
            op: Operation::None,
            identity,
            session: SessionState::new(),
            params,
            buffer: [0; MAX_PHY_PAYLOAD],
            buffer_len: 0,
            tx_channel: None,
            tx_rate: 0,
            timer: None,
            rx2_timer: None,
            rx2_deadline: None,
            tx_complete: None,
            rx_ready: None,
            rx_timeout: None,
            confirmed: false,
            answers: Vec::new(),
            link_check_pending: false,
            link_check: None,
            ack_pending: false,
        }
    }

    /// Activate by personalization
    pub fn personalize(&mut self, dev_addr: DevAddr, nwk_skey: AESKey, app_skey: AESKey) -> Result<(), MacError> {
        if self.state != State::Idle {
            return Err(MacError::Busy);
        }

        self.session = SessionState::new_abp(dev_addr, nwk_skey, app_skey);
        self.system.save_session(&self.session);
        Ok(())
    }

    /// Restore a previously saved session
    pub fn restore_session(&mut self, session: SessionState) -> Result<(), MacError> {
        if self.state != State::Idle {
            return Err(MacError::Busy);
        }

        self.session = session;
        Ok(())
    }

    /// Start a join
    pub fn join(&mut self) -> Result<(), MacError> {
        if self.state != State::Idle {
            return Err(MacError::Busy);
        }

        let now = self.system.time();
        let channel = self.select_channel(now)?;

        let dev_nonce = u16::from_le_bytes([self.system.rand(), self.system.rand()]);
        let request = Frame::JoinRequest(JoinRequest {
            app_eui: self.identity.app_eui,
            dev_eui: self.identity.dev_eui,
            dev_nonce,
        });
        let keys = Keys {
            app_key: self.identity.app_key,
            ..Keys::default()
        };
        self.buffer_len = frame::encode(&keys, &request, &mut self.buffer)?;

        self.schedule_transmit(now)?;

        self.session = SessionState::new();
        self.session.dev_nonce = dev_nonce;
        self.start(Operation::Joining, channel);
        Ok(())
    }

    /// Send `data` on `port`
    pub fn send(&mut self, port: u8, data: &[u8], confirmed: bool) -> Result<(), MacError> {
        if self.state != State::Idle {
            return Err(MacError::Busy);
        }
        if !self.session.is_activated() {
            return Err(MacError::NotJoined);
        }
        if port == 0 || port > MAX_PORT {
            return Err(MacError::InvalidPort);
        }

        let max_payload = self
            .channels
            .region()
            .rate_parameters(self.params.rate)
            .map_or(0, |r| usize::from(r.max_payload));
        // FOpts share the rate's payload limit
        let opts_len = self.answers.len() + usize::from(self.link_check_pending);
        if data.len() > max_payload.saturating_sub(opts_len) {
            return Err(MacError::PayloadTooLarge);
        }

        let now = self.system.time();
        let channel = self.select_channel(now)?;

        let mut uplink = DataFrame {
            dev_addr: self.session.dev_addr,
            fctrl: FCtrl {
                ack: self.ack_pending,
                ..FCtrl::default()
            },
            fcnt: self.session.fcnt_up,
            opts: self.answers.clone(),
            port: Some(port),
            ..DataFrame::default()
        };
        let link_check_sent = self.link_check_pending && MacAnswer::LinkCheckReq.write(&mut uplink.opts);
        uplink
            .data
            .extend_from_slice(data)
            .map_err(|_| MacError::PayloadTooLarge)?;

        let keys = Keys {
            app_key: self.identity.app_key,
            nwk_skey: self.session.nwk_skey,
            app_skey: self.session.app_skey,
        };
        let (frame, op) = if confirmed {
            (Frame::ConfirmedUp(uplink), Operation::SendConfirmed)
        } else {
            (Frame::UnconfirmedUp(uplink), Operation::SendUnconfirmed)
        };
        self.buffer_len = frame::encode(&keys, &frame, &mut self.buffer)?;

        self.schedule_transmit(now)?;

        self.session.increment_fcnt_up();
        self.system.save_session(&self.session);
        self.answers.clear();
        self.ack_pending = false;
        if link_check_sent {
            self.link_check_pending = false;
        }

        self.start(op, channel);
        Ok(())
    }

    /// Record a radio interrupt
    ///
    /// Only stores the event and its timestamp; the work happens in
    /// [`Mac::tick`].
    pub fn radio_event(&mut self, event: RadioEvent, timestamp: u64) {
        self.events.receive(event, timestamp);
    }

    /// Service everything that is due
    pub fn tick(&mut self) {
        let now = self.system.time();
        while let Some(fired) = self.events.next_due(now) {
            self.dispatch(fired);
        }
    }

    /// Abandon any operation and put the radio to sleep
    ///
    /// The MAC accepts requests again once the settle time has passed.
    pub fn reset(&mut self) {
        self.cancel_all();
        self.radio.sleep();
        self.op = Operation::None;

        let now = self.system.time();
        let settle = self.system.ticks_per_second() * RESET_SETTLE_MS / 1000;
        self.timer = self.events.on_timeout(now + settle, MacEvent::ResetDone);
        self.set_state(if self.timer.is_some() { State::ResetWait } else { State::Idle });
    }

    /// True once a session is active
    pub fn joined(&self) -> bool {
        self.session.is_activated()
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Current operation
    pub fn operation(&self) -> Operation {
        self.op
    }

    /// Session keys and counters
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Current MAC settings
    pub fn params(&self) -> &MacParams {
        &self.params
    }

    /// Channel table
    pub fn channels(&self) -> &ChannelList<REG> {
        &self.channels
    }

    /// Radio driver
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Response handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Result of the last link check
    pub fn link_check(&self) -> Option<LinkCheck> {
        self.link_check
    }

    /// Ask the network for a link check on the next uplink
    pub fn request_link_check(&mut self) {
        self.link_check_pending = true;
    }

    /// Install a channel
    pub fn add_channel(&mut self, index: u8, frequency: u32) -> bool {
        self.channels.add(index, frequency)
    }

    /// Remove a channel
    pub fn remove_channel(&mut self, index: u8) {
        self.channels.remove(index)
    }

    /// Mask a channel
    pub fn mask_channel(&mut self, index: u8) -> bool {
        self.channels.mask(index)
    }

    /// Unmask a channel
    pub fn unmask_channel(&mut self, index: u8) {
        self.channels.unmask(index)
    }

    /// Restrict the data rates of a channel
    pub fn constrain_channel_rate(&mut self, index: u8, min_rate: u8, max_rate: u8) -> bool {
        self.channels.constrain_rate(index, min_rate, max_rate)
    }

    /// Go back to the region's channel plan and MAC settings
    pub fn restore_defaults(&mut self) {
        self.channels.restore_defaults();
        self.params = MacParams::defaults_for(self.channels.region());
    }

    /// Set the uplink data rate and TX power index
    pub fn set_rate_and_power(&mut self, rate: u8, power: u8) -> bool {
        let region = self.channels.region();
        let capacity = self.channels.capacity();

        let rate_ok = region.rate_parameters(rate).is_some()
            && (0..capacity).any(|i| region.validate_rate(i as u8, rate));
        let power_ok = region.tx_power(power).is_some();

        if rate_ok && power_ok {
            self.params.rate = rate;
            self.params.power = power;
        }

        rate_ok && power_ok
    }

    /// Ticks until some channel can be used, `None` if none ever can
    pub fn ticks_until_next_channel(&self) -> Option<u64> {
        let now = self.system.time();
        self.channels.time_ready().map(|t| t.saturating_sub(now))
    }

    /// Ticks until [`Mac::tick`] has work, `None` if nothing is scheduled
    pub fn ticks_until_next_event(&self) -> Option<u64> {
        self.events.time_until_next(self.system.time())
    }

    fn select_channel(&mut self, now: u64) -> Result<TxChannel, MacError> {
        let system = &mut self.system;
        self.channels
            .select(now, self.params.rate, || system.rand())
            .ok_or(MacError::NoChannel)
    }

    fn schedule_transmit(&mut self, now: u64) -> Result<(), MacError> {
        self.timer = self.events.on_timeout(now, MacEvent::Transmit);
        if self.timer.is_none() {
            return Err(MacError::EventPoolExhausted);
        }
        Ok(())
    }

    fn start(&mut self, op: Operation, channel: TxChannel) {
        self.op = op;
        self.tx_channel = Some(channel);
        self.tx_rate = self.params.rate;
        self.confirmed = false;
        debug!("{:?} on channel {} ({} Hz)", op, channel.index, channel.frequency);
        self.set_state(State::WaitTx);
    }

    fn set_state(&mut self, state: State) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn dispatch(&mut self, fired: Fired<MacEvent>) {
        match (self.state, fired.token) {
            (State::WaitTx, MacEvent::Transmit) => {
                self.timer = None;
                self.transmit();
            }
            (State::Tx, MacEvent::TxComplete) => {
                self.tx_complete = None;
                self.tx_done(fired.time);
            }
            (State::WaitRx1, MacEvent::Rx1Start) => {
                self.timer = None;
                self.rx_start(State::Rx1, fired.error);
            }
            (State::WaitRx2, MacEvent::Rx2Start) => {
                self.rx2_timer = None;
                self.rx_start(State::Rx2, fired.error);
            }
            (State::Rx1, MacEvent::Rx2Start) => {
                // a long downlink can still be arriving; RX1 decides
                debug!("RX2 deadline passed with RX1 open");
                self.rx2_timer = None;
                self.rx2_deadline = Some(fired.time);
            }
            (State::Rx1 | State::Rx2, MacEvent::RxReady) => {
                self.rx_ready = None;
                self.events.cancel(&mut self.rx_timeout);
                self.radio.sleep();
                self.rx_ready_event();
            }
            (State::Rx1 | State::Rx2, MacEvent::RxTimeout) => {
                self.rx_timeout = None;
                self.events.cancel(&mut self.rx_ready);
                self.radio.sleep();
                self.finish();
            }
            (State::ResetWait, MacEvent::ResetDone) => {
                self.timer = None;
                self.set_state(State::Idle);
            }
            (state, token) => {
                error!("{:?} in state {:?}", token, state);
                self.cancel_all();
                self.radio.sleep();
                let active = self.op != Operation::None;
                self.op = Operation::None;
                self.set_state(State::Error);
                if active {
                    self.handler.handle(Response::Timeout);
                }
            }
        }
    }

    fn transmit(&mut self) {
        let now = self.system.time();
        let region = self.channels.region();

        let (Some(channel), Some(rate), Some(power)) = (
            self.tx_channel,
            region.rate_parameters(self.tx_rate),
            region.tx_power(self.params.power),
        ) else {
            warn!("no radio settings for rate {}", self.tx_rate);
            self.abort();
            return;
        };

        let config = phy::tx_config(channel.frequency, &rate, power);
        if let Err(err) = self.radio.transmit(&config, &self.buffer[..self.buffer_len]) {
            warn!("transmit rejected: {:?}", err);
            self.abort();
            return;
        }

        let air_time = phy::time_on_air(&config.modulation, self.buffer_len, self.system.ticks_per_second());
        self.channels.register_band_transmission(channel.band, now, air_time);

        self.tx_complete = self.events.on_input(RadioEvent::TxComplete, MacEvent::TxComplete);
        if self.tx_complete.is_none() {
            self.abort();
            return;
        }

        self.set_state(State::Tx);
    }

    fn rx_margin(&self) -> u64 {
        self.system.ticks_per_second() / 200
    }

    fn tx_done(&mut self, tx_time: u64) {
        self.radio.sleep();

        let tps = self.system.ticks_per_second();
        let delay = match self.op {
            Operation::Joining => self.channels.region().defaults().join_accept_delay1,
            _ => self.params.rx1_delay,
        };

        let rx1 = (tx_time + u64::from(delay) * tps).saturating_sub(self.rx_margin());
        let rx2 = rx1 + tps;

        self.timer = self.events.on_timeout(rx1, MacEvent::Rx1Start);
        self.rx2_timer = self.events.on_timeout(rx2, MacEvent::Rx2Start);
        if self.timer.is_none() || self.rx2_timer.is_none() {
            self.abort();
            return;
        }

        self.set_state(State::WaitRx1);
    }

    fn rx_start(&mut self, window: State, lateness: u64) {
        let margin = self.rx_margin();
        if lateness > margin {
            warn!("{:?} missed by {} ticks", window, lateness);
            self.set_state(window);
            self.finish();
            return;
        }

        let Some((frequency, rate)) = self.window_settings(window) else {
            warn!("no radio settings for {:?}", window);
            self.abort();
            return;
        };
        let Some(rate) = self.channels.region().rate_parameters(rate) else {
            self.abort();
            return;
        };

        let remaining = margin - lateness;
        if remaining > 0 {
            let us = remaining * 1_000_000 / self.system.ticks_per_second();
            self.system.delay_us(us.min(u64::from(u32::MAX)) as u32);
        }

        let config = phy::rx_config(frequency, &rate);
        if let Err(err) = self.radio.receive(&config) {
            warn!("receive rejected: {:?}", err);
            self.abort();
            return;
        }

        self.rx_ready = self.events.on_input(RadioEvent::RxReady, MacEvent::RxReady);
        self.rx_timeout = self.events.on_input(RadioEvent::RxTimeout, MacEvent::RxTimeout);
        if self.rx_ready.is_none() || self.rx_timeout.is_none() {
            self.abort();
            return;
        }

        self.set_state(window);
    }

    fn window_settings(&self, window: State) -> Option<(u32, u8)> {
        if window == State::Rx2 {
            return Some((self.params.rx2_frequency, self.params.rx2_rate));
        }

        let channel = self.tx_channel?;
        let region = self.channels.region();
        let rate = region.rx1_rate(self.tx_rate, self.params.rx1_dr_offset)?;
        let frequency = match self.channels.channel(channel.index) {
            Some(ch) if ch.dl_frequency != 0 => ch.dl_frequency,
            _ => region.rx1_frequency(channel.index, channel.frequency),
        };

        Some((frequency, rate))
    }

    fn rx_ready_event(&mut self) {
        let len = self.radio.collect(&mut self.buffer);
        self.buffer_len = len.min(MAX_PHY_PAYLOAD);

        if self.process_downlink() {
            self.complete();
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        if self.state != State::Rx1 {
            self.complete();
            return;
        }

        self.set_state(State::WaitRx2);
        if let Some(deadline) = self.rx2_deadline.take() {
            let lateness = self.system.time().saturating_sub(deadline);
            self.rx_start(State::Rx2, lateness);
        }
    }

    fn complete(&mut self) {
        let response = match self.op {
            Operation::SendUnconfirmed => Response::Ready,
            Operation::Joining | Operation::SendConfirmed if self.confirmed => Response::Ready,
            _ => Response::Timeout,
        };

        debug!("{:?} finished: {:?}", self.op, response);
        self.cancel_all();
        self.op = Operation::None;
        self.set_state(State::Idle);
        self.handler.handle(response);
    }

    fn abort(&mut self) {
        warn!("{:?} abandoned in {:?}", self.op, self.state);
        self.cancel_all();
        self.radio.sleep();
        self.op = Operation::None;
        self.set_state(State::Idle);
        self.handler.handle(Response::Timeout);
    }

    fn cancel_all(&mut self) {
        self.events.cancel(&mut self.timer);
        self.events.cancel(&mut self.rx2_timer);
        self.events.cancel(&mut self.tx_complete);
        self.events.cancel(&mut self.rx_ready);
        self.events.cancel(&mut self.rx_timeout);
        self.rx2_deadline = None;
    }

    fn keys(&self) -> Keys {
        Keys {
            app_key: self.identity.app_key,
            nwk_skey: self.session.nwk_skey,
            app_skey: self.session.app_skey,
        }
    }

    /// True if the frame in the buffer ends the sequence
    fn process_downlink(&mut self) -> bool {
        let received = match frame::decode(&self.keys(), &self.buffer[..self.buffer_len]) {
            Ok(frame) => frame,
            Err(err) => {
                debug!("dropped downlink: {}", err);
                return false;
            }
        };

        match (self.op, received) {
            (Operation::Joining, Frame::JoinAccept(accept)) => {
                self.join_accept(&accept);
                true
            }
            (Operation::SendUnconfirmed | Operation::SendConfirmed, Frame::UnconfirmedDown(f)) => {
                self.data_down(&f, false)
            }
            (Operation::SendUnconfirmed | Operation::SendConfirmed, Frame::ConfirmedDown(f)) => {
                self.data_down(&f, true)
            }
            (op, other) => {
                debug!("unexpected {:?} during {:?}", other.mtype(), op);
                false
            }
        }
    }

    fn join_accept(&mut self, accept: &JoinAccept) {
        let dev_nonce = self.session.dev_nonce;
        let (nwk_skey, app_skey) =
            crypto::derive_session_keys(&self.identity.app_key, accept.app_nonce, accept.net_id, dev_nonce);

        self.session = SessionState::new_otaa(accept.dev_addr, nwk_skey, app_skey, dev_nonce);

        self.params = MacParams::defaults_for(self.channels.region());
        self.params.rx1_dr_offset = accept.rx1_dr_offset;
        self.params.rx2_rate = accept.rx2_rate;
        self.params.rx1_delay = accept.rx_delay.max(1);
        self.channels.set_aggregate_off_time(0);

        if let Some(cf_list) = accept.cf_list {
            if self.channels.region().is_dynamic() {
                let first = self.channels.region().default_channels().count();
                let (min_rate, max_rate) = self.channels.region().cf_list_rate_range();

                for (i, &frequency) in cf_list.iter().enumerate() {
                    let index = (first + i) as u8;
                    if frequency != 0 && self.channels.add(index, frequency) {
                        self.channels.constrain_rate(index, min_rate, max_rate);
                    }
                }
            }
        }

        self.confirmed = true;
        info!("joined as {:08x}", accept.dev_addr.as_u32());
        self.system.save_session(&self.session);
    }

    fn data_down(&mut self, f: &DataFrame, confirmed_down: bool) -> bool {
        if f.dev_addr != self.session.dev_addr {
            debug!("downlink for {:08x}", f.dev_addr.as_u32());
            return false;
        }

        let max_gap = self.channels.region().defaults().max_fcnt_gap;
        if !self.session.receive_down(f.fcnt, max_gap) {
            debug!("downlink counter {} rejected", f.fcnt);
            return false;
        }
        self.system.save_session(&self.session);

        if confirmed_down {
            self.ack_pending = true;
        }

        self.process_commands(&f.opts);
        if f.port == Some(0) {
            self.process_commands(&f.data);
        }

        if let Some(port) = f.port.filter(|&p| p > 0) {
            self.handler.handle(Response::Rx { port, data: &f.data });
        }

        self.confirmed = self.op == Operation::SendUnconfirmed || f.fctrl.ack;
        true
    }

    fn process_commands(&mut self, data: &[u8]) {
        for cmd in Commands::new(data) {
            debug!("{:?}", cmd);
            if let Some(answer) = cmd.process(&mut self.channels, &mut self.params, &mut self.link_check) {
                if !answer.write(&mut self.answers) {
                    warn!("no room for {:?}", answer);
                }
            }
        }
    }
}
