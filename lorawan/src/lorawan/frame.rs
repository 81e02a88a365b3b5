//! PHYPayload codec
//!
//! Stateless conversion between [`Frame`] values and their over-the-air
//! representation, including MIC generation/verification and payload
//! encryption. Decoding never panics on arbitrary input; anything that is not
//! a well formed frame is reported as [`FrameError::Malformed`] and a frame
//! whose integrity check fails as [`FrameError::Mic`].

use heapless::Vec;
use log::debug;

use crate::config::device::{AESKey, DevAddr, EUI64};
use crate::crypto::{self, Direction, MIC_SIZE};
use crate::error::FrameError;

/// Largest PHYPayload handled by the stack
pub const MAX_PHY_PAYLOAD: usize = 255;

/// Largest FOpts field
pub const MAX_FOPTS: usize = 15;

/// Largest FRMPayload that fits a PHYPayload
pub const MAX_DATA: usize = 242;

/// MHDR + FHDR (without FOpts) + MIC
pub const DATA_OVERHEAD: usize = 1 + 7 + MIC_SIZE;

const JOIN_REQUEST_LEN: usize = 23;
const JOIN_ACCEPT_LEN: usize = 17;
const JOIN_ACCEPT_CF_LIST_LEN: usize = 33;
const CF_LIST_CHANNELS: usize = 5;

/// MAC header types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MType {
    /// Join request
    JoinRequest = 0x00,
    /// Join accept
    JoinAccept = 0x20,
    /// Unconfirmed data uplink
    UnconfirmedDataUp = 0x40,
    /// Unconfirmed data downlink
    UnconfirmedDataDown = 0x60,
    /// Confirmed data uplink
    ConfirmedDataUp = 0x80,
    /// Confirmed data downlink
    ConfirmedDataDown = 0xA0,
}

impl MType {
    /// Parse an MHDR byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(MType::JoinRequest),
            0x20 => Some(MType::JoinAccept),
            0x40 => Some(MType::UnconfirmedDataUp),
            0x60 => Some(MType::UnconfirmedDataDown),
            0x80 => Some(MType::ConfirmedDataUp),
            0xA0 => Some(MType::ConfirmedDataDown),
            _ => None,
        }
    }

    /// True for frames sent by the device
    pub fn is_upstream(self) -> bool {
        match self {
            MType::JoinRequest | MType::UnconfirmedDataUp | MType::ConfirmedDataUp => true,
            MType::JoinAccept | MType::UnconfirmedDataDown | MType::ConfirmedDataDown => false,
        }
    }

    /// Direction used in MIC and cipher blocks
    pub fn direction(self) -> Direction {
        if self.is_upstream() {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// Frame control flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FCtrl {
    /// Adaptive data rate enabled
    pub adr: bool,
    /// ADR acknowledgement request
    pub adr_ack_req: bool,
    /// Acknowledges the last confirmed frame
    pub ack: bool,
    /// More downlink data pending
    pub f_pending: bool,
}

impl FCtrl {
    fn to_byte(self, f_opts_len: u8) -> u8 {
        let mut byte = f_opts_len & 0x0F;
        if self.adr {
            byte |= 0x80;
        }
        if self.adr_ack_req {
            byte |= 0x40;
        }
        if self.ack {
            byte |= 0x20;
        }
        if self.f_pending {
            byte |= 0x10;
        }
        byte
    }

    fn from_byte(byte: u8) -> (Self, u8) {
        let fctrl = Self {
            adr: (byte & 0x80) != 0,
            adr_ack_req: (byte & 0x40) != 0,
            ack: (byte & 0x20) != 0,
            f_pending: (byte & 0x10) != 0,
        };
        (fctrl, byte & 0x0F)
    }
}

/// Join request fields
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoinRequest {
    /// Application EUI (host order)
    pub app_eui: EUI64,
    /// Device EUI (host order)
    pub dev_eui: EUI64,
    /// Device nonce
    pub dev_nonce: u16,
}

/// Join accept fields
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoinAccept {
    /// Application nonce (24 bit)
    pub app_nonce: u32,
    /// Network identifier (24 bit)
    pub net_id: u32,
    /// Assigned device address
    pub dev_addr: DevAddr,
    /// RX1 data rate offset (3 bit)
    pub rx1_dr_offset: u8,
    /// RX2 data rate (4 bit)
    pub rx2_rate: u8,
    /// RX1 delay in seconds
    pub rx_delay: u8,
    /// Optional list of five extra channel frequencies in Hz
    pub cf_list: Option<[u32; CF_LIST_CHANNELS]>,
}

/// Data frame fields (any of the four data message types)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataFrame {
    /// Device address
    pub dev_addr: DevAddr,
    /// Frame control flags
    pub fctrl: FCtrl,
    /// Frame counter (16 bit)
    pub fcnt: u16,
    /// Plaintext MAC commands
    pub opts: Vec<u8, MAX_FOPTS>,
    /// Port, required when `data` is not empty
    pub port: Option<u8>,
    /// Plaintext application data (or MAC commands on port 0)
    pub data: Vec<u8, MAX_DATA>,
}

/// A decoded or to-be-encoded PHYPayload
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    /// Join request
    JoinRequest(JoinRequest),
    /// Join accept
    JoinAccept(JoinAccept),
    /// Unconfirmed data uplink
    UnconfirmedUp(DataFrame),
    /// Unconfirmed data downlink
    UnconfirmedDown(DataFrame),
    /// Confirmed data uplink
    ConfirmedUp(DataFrame),
    /// Confirmed data downlink
    ConfirmedDown(DataFrame),
}

impl Frame {
    /// Message type of this frame
    pub fn mtype(&self) -> MType {
        match self {
            Frame::JoinRequest(_) => MType::JoinRequest,
            Frame::JoinAccept(_) => MType::JoinAccept,
            Frame::UnconfirmedUp(_) => MType::UnconfirmedDataUp,
            Frame::UnconfirmedDown(_) => MType::UnconfirmedDataDown,
            Frame::ConfirmedUp(_) => MType::ConfirmedDataUp,
            Frame::ConfirmedDown(_) => MType::ConfirmedDataDown,
        }
    }

    /// Data frame fields, if this is a data frame
    pub fn data_frame(&self) -> Option<&DataFrame> {
        match self {
            Frame::UnconfirmedUp(f)
            | Frame::UnconfirmedDown(f)
            | Frame::ConfirmedUp(f)
            | Frame::ConfirmedDown(f) => Some(f),
            Frame::JoinRequest(_) | Frame::JoinAccept(_) => None,
        }
    }
}

/// Keys the codec may need
#[derive(Debug, Clone, Copy, Default)]
pub struct Keys {
    /// Application key (join frames)
    pub app_key: AESKey,
    /// Network session key (MIC, port 0 payload)
    pub nwk_skey: AESKey,
    /// Application session key (payload on ports 1..)
    pub app_skey: AESKey,
}

/// Reverse the byte order of an EUI (host order <-> wire order)
pub fn swap_eui(eui: EUI64) -> EUI64 {
    let mut out = eui;
    out.reverse();
    out
}

/// Size of a data PHYPayload carrying `opts_len` bytes of FOpts and
/// `data_len` bytes of application data
pub fn phy_payload_size(opts_len: usize, data_len: usize) -> usize {
    DATA_OVERHEAD + opts_len + if data_len > 0 { 1 + data_len } else { 0 }
}

/// Serialize `frame` into `out`, returning the number of bytes written
pub fn encode(keys: &Keys, frame: &Frame, out: &mut [u8]) -> Result<usize, FrameError> {
    match frame {
        Frame::JoinRequest(f) => encode_join_request(&keys.app_key, f, out),
        Frame::JoinAccept(f) => encode_join_accept(&keys.app_key, f, out),
        Frame::UnconfirmedUp(f)
        | Frame::UnconfirmedDown(f)
        | Frame::ConfirmedUp(f)
        | Frame::ConfirmedDown(f) => encode_data(keys, frame.mtype(), f, out),
    }
}

fn encode_join_request(app_key: &AESKey, f: &JoinRequest, out: &mut [u8]) -> Result<usize, FrameError> {
    let out = out
        .get_mut(..JOIN_REQUEST_LEN)
        .ok_or(FrameError::BufferTooSmall)?;

    out[0] = MType::JoinRequest as u8;
    out[1..9].copy_from_slice(&swap_eui(f.app_eui));
    out[9..17].copy_from_slice(&swap_eui(f.dev_eui));
    out[17..19].copy_from_slice(&f.dev_nonce.to_le_bytes());

    let mic = crypto::compute_join_mic(app_key, &out[..19]);
    out[19..23].copy_from_slice(&mic.to_le_bytes());

    Ok(JOIN_REQUEST_LEN)
}

fn encode_join_accept(app_key: &AESKey, f: &JoinAccept, out: &mut [u8]) -> Result<usize, FrameError> {
    let len = if f.cf_list.is_some() {
        JOIN_ACCEPT_CF_LIST_LEN
    } else {
        JOIN_ACCEPT_LEN
    };
    let out = out.get_mut(..len).ok_or(FrameError::BufferTooSmall)?;

    out[0] = MType::JoinAccept as u8;
    out[1..4].copy_from_slice(&f.app_nonce.to_le_bytes()[..3]);
    out[4..7].copy_from_slice(&f.net_id.to_le_bytes()[..3]);
    out[7..11].copy_from_slice(&f.dev_addr.to_le_bytes());
    out[11] = ((f.rx1_dr_offset & 0x07) << 4) | (f.rx2_rate & 0x0F);
    out[12] = f.rx_delay;

    let mut pos = 13;
    if let Some(cf_list) = &f.cf_list {
        for freq in cf_list {
            out[pos..pos + 3].copy_from_slice(&(freq / 100).to_le_bytes()[..3]);
            pos += 3;
        }
        // CFList type
        out[pos] = 0;
        pos += 1;
    }

    let mic = crypto::compute_join_mic(app_key, &out[..pos]);
    out[pos..pos + MIC_SIZE].copy_from_slice(&mic.to_le_bytes());

    crypto::encrypt_join_accept(app_key, &mut out[1..]);

    Ok(len)
}

fn encode_data(keys: &Keys, mtype: MType, f: &DataFrame, out: &mut [u8]) -> Result<usize, FrameError> {
    if f.opts.len() > MAX_FOPTS {
        return Err(FrameError::OptsTooLong);
    }
    if !f.data.is_empty() && f.port.is_none() {
        return Err(FrameError::MissingPort);
    }

    let len = phy_payload_size(f.opts.len(), f.data.len());
    if len > MAX_PHY_PAYLOAD {
        return Err(FrameError::PayloadTooLarge);
    }
    let out = out.get_mut(..len).ok_or(FrameError::BufferTooSmall)?;

    out[0] = mtype as u8;
    out[1..5].copy_from_slice(&f.dev_addr.to_le_bytes());
    out[5] = f.fctrl.to_byte(f.opts.len() as u8);
    out[6..8].copy_from_slice(&f.fcnt.to_le_bytes());

    let mut pos = 8;
    out[pos..pos + f.opts.len()].copy_from_slice(&f.opts);
    pos += f.opts.len();

    // FPort only goes out with a payload
    if let Some(port) = f.port.filter(|_| !f.data.is_empty()) {
        out[pos] = port;
        pos += 1;

        let payload = &mut out[pos..pos + f.data.len()];
        payload.copy_from_slice(&f.data);
        crypto::encrypt_payload(
            payload_key(keys, port),
            f.dev_addr,
            u32::from(f.fcnt),
            mtype.direction(),
            payload,
        );
        pos += f.data.len();
    }

    let mic = crypto::compute_mic(
        &keys.nwk_skey,
        &out[..pos],
        f.dev_addr,
        u32::from(f.fcnt),
        mtype.direction(),
    );
    out[pos..pos + MIC_SIZE].copy_from_slice(&mic.to_le_bytes());

    Ok(len)
}

fn payload_key(keys: &Keys, port: u8) -> &AESKey {
    if port == 0 {
        &keys.nwk_skey
    } else {
        &keys.app_skey
    }
}

fn read_mic(bytes: &[u8]) -> u32 {
    let mut mic = [0u8; MIC_SIZE];
    mic.copy_from_slice(&bytes[bytes.len() - MIC_SIZE..]);
    u32::from_le_bytes(mic)
}

/// Parse and verify a PHYPayload
pub fn decode(keys: &Keys, bytes: &[u8]) -> Result<Frame, FrameError> {
    let mtype = bytes
        .first()
        .copied()
        .and_then(MType::from_byte)
        .ok_or_else(|| {
            debug!("unknown frame type");
            FrameError::Malformed
        })?;

    match mtype {
        MType::JoinRequest => decode_join_request(&keys.app_key, bytes).map(Frame::JoinRequest),
        MType::JoinAccept => decode_join_accept(&keys.app_key, bytes).map(Frame::JoinAccept),
        MType::UnconfirmedDataUp => decode_data(keys, mtype, bytes).map(Frame::UnconfirmedUp),
        MType::UnconfirmedDataDown => decode_data(keys, mtype, bytes).map(Frame::UnconfirmedDown),
        MType::ConfirmedDataUp => decode_data(keys, mtype, bytes).map(Frame::ConfirmedUp),
        MType::ConfirmedDataDown => decode_data(keys, mtype, bytes).map(Frame::ConfirmedDown),
    }
}

fn decode_join_request(app_key: &AESKey, bytes: &[u8]) -> Result<JoinRequest, FrameError> {
    if bytes.len() != JOIN_REQUEST_LEN {
        debug!("join request length {}", bytes.len());
        return Err(FrameError::Malformed);
    }

    if crypto::compute_join_mic(app_key, &bytes[..19]) != read_mic(bytes) {
        debug!("join request MIC mismatch");
        return Err(FrameError::Mic);
    }

    let mut app_eui = [0u8; 8];
    let mut dev_eui = [0u8; 8];
    app_eui.copy_from_slice(&bytes[1..9]);
    dev_eui.copy_from_slice(&bytes[9..17]);

    Ok(JoinRequest {
        app_eui: swap_eui(app_eui),
        dev_eui: swap_eui(dev_eui),
        dev_nonce: u16::from_le_bytes([bytes[17], bytes[18]]),
    })
}

fn decode_join_accept(app_key: &AESKey, bytes: &[u8]) -> Result<JoinAccept, FrameError> {
    let len = bytes.len();
    if len != JOIN_ACCEPT_LEN && len != JOIN_ACCEPT_CF_LIST_LEN {
        debug!("join accept length {}", len);
        return Err(FrameError::Malformed);
    }

    let mut plain = [0u8; JOIN_ACCEPT_CF_LIST_LEN];
    let plain = &mut plain[..len];
    plain.copy_from_slice(bytes);
    crypto::decrypt_join_accept(app_key, &mut plain[1..]);

    if crypto::compute_join_mic(app_key, &plain[..len - MIC_SIZE]) != read_mic(plain) {
        debug!("join accept MIC mismatch");
        return Err(FrameError::Mic);
    }

    let u24 = |b: &[u8]| u32::from_le_bytes([b[0], b[1], b[2], 0]);

    let cf_list = if len == JOIN_ACCEPT_CF_LIST_LEN {
        let mut list = [0u32; CF_LIST_CHANNELS];
        for (i, freq) in list.iter_mut().enumerate() {
            let at = 13 + i * 3;
            *freq = u24(&plain[at..at + 3]) * 100;
        }
        Some(list)
    } else {
        None
    };

    Ok(JoinAccept {
        app_nonce: u24(&plain[1..4]),
        net_id: u24(&plain[4..7]),
        dev_addr: DevAddr::from_le_bytes([plain[7], plain[8], plain[9], plain[10]]),
        rx1_dr_offset: (plain[11] >> 4) & 0x07,
        rx2_rate: plain[11] & 0x0F,
        rx_delay: plain[12],
        cf_list,
    })
}

fn decode_data(keys: &Keys, mtype: MType, bytes: &[u8]) -> Result<DataFrame, FrameError> {
    if bytes.len() < DATA_OVERHEAD || bytes.len() > MAX_PHY_PAYLOAD {
        debug!("data frame length {}", bytes.len());
        return Err(FrameError::Malformed);
    }

    let dev_addr = DevAddr::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let (fctrl, opts_len) = FCtrl::from_byte(bytes[5]);
    let fcnt = u16::from_le_bytes([bytes[6], bytes[7]]);

    let mic_at = bytes.len() - MIC_SIZE;
    let opts_end = 8 + usize::from(opts_len);
    if opts_end > mic_at {
        debug!("FOpts overrun");
        return Err(FrameError::Malformed);
    }
    if mic_at - opts_end == 1 {
        debug!("FPort without payload");
        return Err(FrameError::Malformed);
    }

    let mic = crypto::compute_mic(
        &keys.nwk_skey,
        &bytes[..mic_at],
        dev_addr,
        u32::from(fcnt),
        mtype.direction(),
    );
    if mic != read_mic(bytes) {
        debug!("data frame MIC mismatch");
        return Err(FrameError::Mic);
    }

    let mut frame = DataFrame {
        dev_addr,
        fctrl,
        fcnt,
        ..DataFrame::default()
    };
    frame
        .opts
        .extend_from_slice(&bytes[8..opts_end])
        .map_err(|_| FrameError::Malformed)?;

    if opts_end < mic_at {
        let port = bytes[opts_end];
        frame.port = Some(port);
        frame
            .data
            .extend_from_slice(&bytes[opts_end + 1..mic_at])
            .map_err(|_| FrameError::Malformed)?;
        crypto::encrypt_payload(
            payload_key(keys, port),
            dev_addr,
            u32::from(fcnt),
            mtype.direction(),
            &mut frame.data,
        );
    }

    Ok(frame)
}
