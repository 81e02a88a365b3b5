/// EUI-64 in host order (most significant byte first, as printed on labels)
pub type EUI64 = [u8; 8];

/// AES-128 key (16 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct AESKey([u8; 16]);

impl AESKey {
    /// Wrap raw key bytes
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<[u8; 16]> for AESKey {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

// keys never end up in logs
impl core::fmt::Debug for AESKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AESKey(..)")
    }
}

/// Device address (32 bit, assigned at join or personalization)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DevAddr(u32);

impl DevAddr {
    /// Create from a host integer
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Host integer value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Wire representation
    pub const fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Parse the wire representation
    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

/// Device activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivationState {
    /// Device is not activated
    Idle,
    /// Device is activated through OTAA
    OTAAActivated,
    /// Device is activated through ABP
    ABPActivated,
}

/// Permanent device identity used for OTAA
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device EUI (unique device identifier)
    pub dev_eui: EUI64,
    /// Application EUI
    pub app_eui: EUI64,
    /// Application key (only used for joining)
    pub app_key: AESKey,
}

impl DeviceConfig {
    /// Create a new device configuration
    pub fn new(dev_eui: EUI64, app_eui: EUI64, app_key: AESKey) -> Self {
        Self {
            dev_eui,
            app_eui,
            app_key,
        }
    }
}

/// Session state for an activated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Current activation state
    pub activation_state: ActivationState,
    /// Device address (assigned during activation)
    pub dev_addr: DevAddr,
    /// Network session key
    pub nwk_skey: AESKey,
    /// Application session key
    pub app_skey: AESKey,
    /// Uplink frame counter (next value to send)
    pub fcnt_up: u16,
    /// Downlink frame counter (last accepted value)
    pub fcnt_down: u16,
    /// Device nonce of the most recent join request
    pub dev_nonce: u16,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Session of a device that has not been activated
    pub fn new() -> Self {
        Self {
            activation_state: ActivationState::Idle,
            dev_addr: DevAddr::default(),
            nwk_skey: AESKey::default(),
            app_skey: AESKey::default(),
            fcnt_up: 0,
            fcnt_down: 0,
            dev_nonce: 0,
        }
    }

    /// Create a new session state for ABP activation
    pub fn new_abp(dev_addr: DevAddr, nwk_skey: AESKey, app_skey: AESKey) -> Self {
        Self {
            activation_state: ActivationState::ABPActivated,
            dev_addr,
            nwk_skey,
            app_skey,
            ..Self::new()
        }
    }

    /// Create a new session state after a successful join
    pub fn new_otaa(dev_addr: DevAddr, nwk_skey: AESKey, app_skey: AESKey, dev_nonce: u16) -> Self {
        Self {
            activation_state: ActivationState::OTAAActivated,
            dev_addr,
            nwk_skey,
            app_skey,
            dev_nonce,
            ..Self::new()
        }
    }

    /// True once the session keys are usable
    pub fn is_activated(&self) -> bool {
        self.activation_state != ActivationState::Idle
    }

    /// Take the next uplink counter value
    ///
    /// Returns the value to put into the frame and advances the stored one.
    pub fn increment_fcnt_up(&mut self) -> u16 {
        let value = self.fcnt_up;
        self.fcnt_up = self.fcnt_up.wrapping_add(1);
        value
    }

    /// Check `counter` against the replay window and store it on success
    ///
    /// Only the upper bound is enforced: a counter below the stored value is
    /// accepted and moves the stored value backwards.
    pub fn receive_down(&mut self, counter: u16, max_gap: u16) -> bool {
        if u32::from(counter) < u32::from(self.fcnt_down) + u32::from(max_gap) {
            self.fcnt_down = counter;
            true
        } else {
            false
        }
    }

    /// Last accepted downlink counter
    pub fn fcnt_down(&self) -> u16 {
        self.fcnt_down
    }
}
