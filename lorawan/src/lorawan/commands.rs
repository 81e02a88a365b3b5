use heapless::Vec;
use log::debug;

use super::channel_list::ChannelList;
use super::frame::MAX_FOPTS;
use super::region::Region;
use crate::config::params::MacParams;

/// MAC command identifiers (shared by a request and its answer)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandIdentifier {
    /// LinkCheckReq / LinkCheckAns
    LinkCheck = 0x02,
    /// LinkADRReq / LinkADRAns
    LinkADR = 0x03,
    /// DutyCycleReq / DutyCycleAns
    DutyCycle = 0x04,
    /// RXParamSetupReq / RXParamSetupAns
    RXParamSetup = 0x05,
    /// DevStatusReq / DevStatusAns
    DevStatus = 0x06,
    /// NewChannelReq / NewChannelAns
    NewChannel = 0x07,
    /// RXTimingSetupReq / RXTimingSetupAns
    RXTimingSetup = 0x08,
    /// TxParamSetupReq / TxParamSetupAns
    TxParamSetup = 0x09,
    /// DlChannelReq / DlChannelAns
    DlChannel = 0x0A,
}

impl CommandIdentifier {
    /// Parse a CID byte
    pub fn from_byte(cid: u8) -> Option<Self> {
        match cid {
            0x02 => Some(Self::LinkCheck),
            0x03 => Some(Self::LinkADR),
            0x04 => Some(Self::DutyCycle),
            0x05 => Some(Self::RXParamSetup),
            0x06 => Some(Self::DevStatus),
            0x07 => Some(Self::NewChannel),
            0x08 => Some(Self::RXTimingSetup),
            0x09 => Some(Self::TxParamSetup),
            0x0A => Some(Self::DlChannel),
            _ => None,
        }
    }

    /// Payload length of the network-to-device command
    pub fn downlink_len(self) -> usize {
        match self {
            Self::LinkCheck => 2,
            Self::LinkADR => 4,
            Self::DutyCycle => 1,
            Self::RXParamSetup => 4,
            Self::DevStatus => 0,
            Self::NewChannel => 5,
            Self::RXTimingSetup => 1,
            Self::TxParamSetup => 1,
            Self::DlChannel => 4,
        }
    }
}

/// Result of the last link check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkCheck {
    /// Link margin in dB
    pub margin: u8,
    /// Number of gateways that received the request
    pub gateway_count: u8,
}

/// Command sent by the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacCommand {
    /// Link check answer
    LinkCheckAns(LinkCheck),
    /// Link ADR request
    LinkADRReq {
        /// Data rate
        data_rate: u8,
        /// TX power
        tx_power: u8,
        /// Channel mask
        ch_mask: u16,
        /// Channel mask control
        ch_mask_cntl: u8,
        /// Number of transmissions
        nb_trans: u8,
    },
    /// Duty cycle request
    DutyCycleReq {
        /// Maximum duty cycle
        max_duty_cycle: u8,
    },
    /// RX parameter setup request
    RXParamSetupReq {
        /// RX1 data rate offset
        rx1_dr_offset: u8,
        /// RX2 data rate
        rx2_data_rate: u8,
        /// RX2 frequency in Hz
        freq: u32,
    },
    /// Device status request
    DevStatusReq,
    /// New channel request
    NewChannelReq {
        /// Channel index
        ch_index: u8,
        /// Frequency in Hz (0 removes the channel)
        freq: u32,
        /// Maximum data rate
        max_dr: u8,
        /// Minimum data rate
        min_dr: u8,
    },
    /// RX timing setup request
    RXTimingSetupReq {
        /// Delay in seconds (0 means 1)
        delay: u8,
    },
    /// TX parameter setup request
    TxParamSetupReq {
        /// Downlink dwell time
        downlink_dwell_time: bool,
        /// Uplink dwell time
        uplink_dwell_time: bool,
        /// Maximum EIRP
        max_eirp: u8,
    },
    /// Downlink channel request
    DlChannelReq {
        /// Channel index
        ch_index: u8,
        /// Downlink frequency in Hz
        freq: u32,
    },
}

/// Frequencies travel as 24 bit multiples of 100 Hz
fn frequency(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]) * 100
}

impl MacCommand {
    /// Parse one command from its CID and payload
    pub fn from_bytes(cid: CommandIdentifier, payload: &[u8]) -> Option<Self> {
        if payload.len() < cid.downlink_len() {
            return None;
        }

        let cmd = match cid {
            CommandIdentifier::LinkCheck => MacCommand::LinkCheckAns(LinkCheck {
                margin: payload[0],
                gateway_count: payload[1],
            }),
            CommandIdentifier::LinkADR => MacCommand::LinkADRReq {
                data_rate: payload[0] >> 4,
                tx_power: payload[0] & 0x0F,
                ch_mask: u16::from_le_bytes([payload[1], payload[2]]),
                ch_mask_cntl: (payload[3] >> 4) & 0x07,
                nb_trans: payload[3] & 0x0F,
            },
            CommandIdentifier::DutyCycle => MacCommand::DutyCycleReq {
                max_duty_cycle: payload[0] & 0x0F,
            },
            CommandIdentifier::RXParamSetup => MacCommand::RXParamSetupReq {
                rx1_dr_offset: (payload[0] >> 4) & 0x07,
                rx2_data_rate: payload[0] & 0x0F,
                freq: frequency(&payload[1..4]),
            },
            CommandIdentifier::DevStatus => MacCommand::DevStatusReq,
            CommandIdentifier::NewChannel => MacCommand::NewChannelReq {
                ch_index: payload[0],
                freq: frequency(&payload[1..4]),
                max_dr: payload[4] >> 4,
                min_dr: payload[4] & 0x0F,
            },
            CommandIdentifier::RXTimingSetup => MacCommand::RXTimingSetupReq {
                delay: payload[0] & 0x0F,
            },
            CommandIdentifier::TxParamSetup => MacCommand::TxParamSetupReq {
                downlink_dwell_time: (payload[0] & 0x20) != 0,
                uplink_dwell_time: (payload[0] & 0x10) != 0,
                max_eirp: payload[0] & 0x0F,
            },
            CommandIdentifier::DlChannel => MacCommand::DlChannelReq {
                ch_index: payload[0],
                freq: frequency(&payload[1..4]),
            },
        };

        Some(cmd)
    }

    /// Apply the command and produce the answer to send, if any
    pub fn process<REG: Region>(
        &self,
        channels: &mut ChannelList<REG>,
        params: &mut MacParams,
        link_check: &mut Option<LinkCheck>,
    ) -> Option<MacAnswer> {
        match *self {
            MacCommand::LinkCheckAns(result) => {
                *link_check = Some(result);
                None
            }
            // ADR is not implemented, every request is refused
            MacCommand::LinkADRReq { .. } => Some(MacAnswer::LinkADRAns {
                power_ack: false,
                data_rate_ack: false,
                channel_mask_ack: false,
            }),
            MacCommand::DutyCycleReq { max_duty_cycle } => {
                params.max_duty_cycle = max_duty_cycle;
                channels.set_aggregate_off_time(params.aggregate_off_time_factor());
                Some(MacAnswer::DutyCycleAns)
            }
            MacCommand::RXParamSetupReq {
                rx1_dr_offset,
                rx2_data_rate,
                freq,
            } => {
                let region = channels.region();
                let rx1_dr_offset_ack = region.rx1_rate(params.rate, rx1_dr_offset).is_some();
                let rx2_data_rate_ack = region.rate_parameters(rx2_data_rate).is_some();
                let channel_ack = region.validate_downlink_frequency(freq);

                if rx1_dr_offset_ack && rx2_data_rate_ack && channel_ack {
                    params.rx1_dr_offset = rx1_dr_offset;
                    params.rx2_rate = rx2_data_rate;
                    params.rx2_frequency = freq;
                }

                Some(MacAnswer::RXParamSetupAns {
                    rx1_dr_offset_ack,
                    rx2_data_rate_ack,
                    channel_ack,
                })
            }
            MacCommand::DevStatusReq => Some(MacAnswer::DevStatusAns {
                battery: 255,
                margin: 0,
            }),
            MacCommand::NewChannelReq {
                ch_index,
                freq,
                max_dr,
                min_dr,
            } => {
                let region = channels.region();
                let dynamic = region.is_dynamic() && usize::from(ch_index) < channels.capacity();
                let channel_freq_ok = dynamic && (freq == 0 || region.validate_frequency(freq).is_some());
                let data_rate_ok = dynamic
                    && min_dr <= max_dr
                    && region.validate_rate(ch_index, min_dr)
                    && region.validate_rate(ch_index, max_dr);

                if channel_freq_ok && data_rate_ok {
                    channels.add(ch_index, freq);
                    if freq != 0 {
                        channels.constrain_rate(ch_index, min_dr, max_dr);
                    }
                }

                Some(MacAnswer::NewChannelAns {
                    channel_freq_ok,
                    data_rate_ok,
                })
            }
            MacCommand::RXTimingSetupReq { delay } => {
                params.rx1_delay = delay.max(1);
                Some(MacAnswer::RXTimingSetupAns)
            }
            MacCommand::TxParamSetupReq { .. } => {
                debug!("TxParamSetupReq ignored");
                None
            }
            MacCommand::DlChannelReq { ch_index, freq } => {
                let channel_freq_ok =
                    channels.region().is_dynamic() && channels.region().validate_downlink_frequency(freq);
                let uplink_freq_exists = channels
                    .channel(ch_index)
                    .map_or(false, |ch| ch.frequency != 0);

                if channel_freq_ok && uplink_freq_exists {
                    channels.set_dl_frequency(ch_index, freq);
                }

                Some(MacAnswer::DlChannelAns {
                    channel_freq_ok,
                    uplink_freq_exists,
                })
            }
        }
    }
}

/// Iterator over the commands in an FOpts field or port 0 payload
///
/// Stops at the first unknown CID or truncated command.
#[derive(Debug, Clone)]
pub struct Commands<'a> {
    data: &'a [u8],
}

impl<'a> Commands<'a> {
    /// Iterate over `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl Iterator for Commands<'_> {
    type Item = MacCommand;

    fn next(&mut self) -> Option<MacCommand> {
        let (&cid, rest) = self.data.split_first()?;

        let parsed = CommandIdentifier::from_byte(cid)
            .and_then(|cid| MacCommand::from_bytes(cid, rest).map(|cmd| (cmd, cid.downlink_len())));

        match parsed {
            Some((cmd, len)) => {
                self.data = &rest[len..];
                Some(cmd)
            }
            None => {
                debug!("stopped parsing MAC commands at CID {:#04x}", cid);
                self.data = &[];
                None
            }
        }
    }
}

/// Command sent by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacAnswer {
    /// Link check request
    LinkCheckReq,
    /// Link ADR answer
    LinkADRAns {
        /// Power ACK
        power_ack: bool,
        /// Data rate ACK
        data_rate_ack: bool,
        /// Channel mask ACK
        channel_mask_ack: bool,
    },
    /// Duty cycle answer
    DutyCycleAns,
    /// RX parameter setup answer
    RXParamSetupAns {
        /// RX1 data rate offset ACK
        rx1_dr_offset_ack: bool,
        /// RX2 data rate ACK
        rx2_data_rate_ack: bool,
        /// Channel ACK
        channel_ack: bool,
    },
    /// Device status answer
    DevStatusAns {
        /// Battery level (0 = external power, 1-254 = level, 255 = unknown)
        battery: u8,
        /// Radio status (margin in dB)
        margin: i8,
    },
    /// New channel answer
    NewChannelAns {
        /// Channel frequency OK
        channel_freq_ok: bool,
        /// Data rate OK
        data_rate_ok: bool,
    },
    /// RX timing setup answer
    RXTimingSetupAns,
    /// Downlink channel answer
    DlChannelAns {
        /// Channel frequency OK
        channel_freq_ok: bool,
        /// Uplink frequency exists
        uplink_freq_exists: bool,
    },
}

impl MacAnswer {
    /// Command identifier
    pub fn cid(&self) -> CommandIdentifier {
        match self {
            MacAnswer::LinkCheckReq => CommandIdentifier::LinkCheck,
            MacAnswer::LinkADRAns { .. } => CommandIdentifier::LinkADR,
            MacAnswer::DutyCycleAns => CommandIdentifier::DutyCycle,
            MacAnswer::RXParamSetupAns { .. } => CommandIdentifier::RXParamSetup,
            MacAnswer::DevStatusAns { .. } => CommandIdentifier::DevStatus,
            MacAnswer::NewChannelAns { .. } => CommandIdentifier::NewChannel,
            MacAnswer::RXTimingSetupAns => CommandIdentifier::RXTimingSetup,
            MacAnswer::DlChannelAns { .. } => CommandIdentifier::DlChannel,
        }
    }

    /// Append CID and payload to `out`
    ///
    /// Returns false, leaving `out` unchanged, if it does not fit.
    pub fn write(&self, out: &mut Vec<u8, MAX_FOPTS>) -> bool {
        let mut buf = [0u8; 3];
        buf[0] = self.cid() as u8;

        let len = match *self {
            MacAnswer::LinkCheckReq | MacAnswer::DutyCycleAns | MacAnswer::RXTimingSetupAns => 1,
            MacAnswer::LinkADRAns {
                power_ack,
                data_rate_ack,
                channel_mask_ack,
            } => {
                buf[1] = bits(power_ack, data_rate_ack, channel_mask_ack);
                2
            }
            MacAnswer::RXParamSetupAns {
                rx1_dr_offset_ack,
                rx2_data_rate_ack,
                channel_ack,
            } => {
                buf[1] = bits(rx1_dr_offset_ack, rx2_data_rate_ack, channel_ack);
                2
            }
            MacAnswer::DevStatusAns { battery, margin } => {
                buf[1] = battery;
                buf[2] = (margin as u8) & 0x3F;
                3
            }
            MacAnswer::NewChannelAns {
                channel_freq_ok,
                data_rate_ok,
            } => {
                buf[1] = bits(false, data_rate_ok, channel_freq_ok);
                2
            }
            MacAnswer::DlChannelAns {
                channel_freq_ok,
                uplink_freq_exists,
            } => {
                buf[1] = bits(false, uplink_freq_exists, channel_freq_ok);
                2
            }
        };

        out.extend_from_slice(&buf[..len]).is_ok()
    }
}

fn bits(b2: bool, b1: bool, b0: bool) -> u8 {
    (u8::from(b2) << 2) | (u8::from(b1) << 1) | u8::from(b0)
}
