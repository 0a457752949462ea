use std::fmt;

/// Use category whose routing can be overridden by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForceUse {
    /// Telephony and VoIP.
    Communication,
    /// Media playback.
    Media,
    /// Capture.
    Record,
    /// Docking station behavior.
    Dock,
}

impl ForceUse {
    /// Number of use categories.
    pub const COUNT: usize = 4;

    /// Every use category, in table order.
    pub const ALL: [ForceUse; Self::COUNT] =
        [Self::Communication, Self::Media, Self::Record, Self::Dock];

    /// Position in [`Self::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns true if `config` may be forced for this use category.
    pub fn accepts(self, config: ForcedConfig) -> bool {
        use ForcedConfig::*;
        match self {
            Self::Communication => matches!(config, None | Speaker | BtSco),
            Self::Media => matches!(config, None | Headphones | BtA2dp | WiredAccessory),
            Self::Record => matches!(config, None | BtSco | WiredAccessory),
            Self::Dock => matches!(config, None | BtCarDock | BtDeskDock | WiredAccessory),
        }
    }
}

impl fmt::Display for ForceUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Communication => "communication",
            Self::Media => "media",
            Self::Record => "record",
            Self::Dock => "dock",
        };
        f.write_str(name)
    }
}

/// Configuration a use category is forced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForcedConfig {
    #[default]
    None,
    Speaker,
    Headphones,
    BtSco,
    BtA2dp,
    WiredAccessory,
    BtCarDock,
    BtDeskDock,
}

impl fmt::Display for ForcedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Speaker => "speaker",
            Self::Headphones => "headphones",
            Self::BtSco => "bt_sco",
            Self::BtA2dp => "bt_a2dp",
            Self::WiredAccessory => "wired_accessory",
            Self::BtCarDock => "bt_car_dock",
            Self::BtDeskDock => "bt_desk_dock",
        };
        f.write_str(name)
    }
}

/// Forced configuration of every use category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForcedUses([ForcedConfig; ForceUse::COUNT]);

impl ForcedUses {
    /// Configuration forced for `usage`.
    pub fn get(&self, usage: ForceUse) -> ForcedConfig {
        self.0[usage.index()]
    }

    /// Stores `config` for `usage`, returning the previous configuration.
    pub fn set(&mut self, usage: ForceUse, config: ForcedConfig) -> ForcedConfig {
        std::mem::replace(&mut self.0[usage.index()], config)
    }

    /// Iterates over `(usage, config)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (ForceUse, ForcedConfig)> + '_ {
        ForceUse::ALL.into_iter().zip(self.0.iter().copied())
    }
}

/// Telephony state of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PhoneState {
    /// No call and no ringing.
    #[default]
    Normal,
    /// An incoming call is ringing.
    Ringtone,
    /// A call is established.
    InCall,
}

impl PhoneState {
    /// Returns true while a call is established.
    pub fn is_in_call(&self) -> bool {
        matches!(self, Self::InCall)
    }

    /// Returns true outside ringing and calls.
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }
}

impl fmt::Display for PhoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Ringtone => "ringtone",
            Self::InCall => "in_call",
        };
        f.write_str(name)
    }
}

/// Tone generated by the driver on request of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    /// Replaces sonification which would otherwise be heard through the call path.
    CallWaiting,
}
