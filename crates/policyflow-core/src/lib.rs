/// Driver handles and stream configurations.
pub mod device;
/// Telephony state and forced use.
pub mod policy;
/// Stream types and routing strategies.
pub mod stream;
/// Driver collaborator trait.
pub mod traits;

use std::fmt;

use bitflags::bitflags;

pub use policy::{ForceUse, ForcedConfig, ForcedUses, PhoneState, Tone};
pub use stream::{strategy_for, Strategy, StreamTable, StreamType};
pub use traits::{ClientError, Parameter, PolicyClient};

bitflags! {
    /// Set of physical output devices (sinks). Each bit is one device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputDevices: u32 {
        /// Handset earpiece.
        const EARPIECE = 1 << 0;
        /// Loudspeaker.
        const SPEAKER = 1 << 1;
        /// Wired headset (with microphone).
        const WIRED_HEADSET = 1 << 2;
        /// Wired headphone (no microphone).
        const WIRED_HEADPHONE = 1 << 3;
        /// Generic bluetooth SCO link.
        const BLUETOOTH_SCO = 1 << 4;
        /// Bluetooth SCO headset.
        const BLUETOOTH_SCO_HEADSET = 1 << 5;
        /// Bluetooth SCO car kit.
        const BLUETOOTH_SCO_CARKIT = 1 << 6;
        /// Generic bluetooth A2DP sink.
        const BLUETOOTH_A2DP = 1 << 7;
        /// Bluetooth A2DP headphones.
        const BLUETOOTH_A2DP_HEADPHONES = 1 << 8;
        /// Bluetooth A2DP speaker.
        const BLUETOOTH_A2DP_SPEAKER = 1 << 9;
        /// Auxiliary digital output (HDMI, dock).
        const AUX_DIGITAL = 1 << 10;

        /// All bluetooth SCO variants.
        const ALL_SCO = Self::BLUETOOTH_SCO.bits()
            | Self::BLUETOOTH_SCO_HEADSET.bits()
            | Self::BLUETOOTH_SCO_CARKIT.bits();
        /// All bluetooth A2DP variants.
        const ALL_A2DP = Self::BLUETOOTH_A2DP.bits()
            | Self::BLUETOOTH_A2DP_HEADPHONES.bits()
            | Self::BLUETOOTH_A2DP_SPEAKER.bits();
        /// Devices worn on or in the ear, for which sonification is attenuated.
        const HEADSET_CLASS = Self::BLUETOOTH_A2DP.bits()
            | Self::BLUETOOTH_A2DP_HEADPHONES.bits()
            | Self::WIRED_HEADSET.bits()
            | Self::WIRED_HEADPHONE.bits();
    }
}

bitflags! {
    /// Set of physical input devices (sources). Distinct namespace from [`OutputDevices`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputDevices: u32 {
        /// Communication microphone.
        const COMMUNICATION = 1 << 0;
        /// Ambient microphone.
        const AMBIENT = 1 << 1;
        /// Built-in microphone.
        const BUILTIN_MIC = 1 << 2;
        /// Bluetooth SCO headset microphone.
        const BLUETOOTH_SCO_HEADSET = 1 << 3;
        /// Wired headset microphone.
        const WIRED_HEADSET = 1 << 4;
        /// Auxiliary digital input.
        const AUX_DIGITAL = 1 << 5;
        /// Voice call uplink/downlink tap.
        const VOICE_CALL = 1 << 6;
        /// Back microphone.
        const BACK_MIC = 1 << 7;
    }
}

#[duplicate::duplicate_item(
    ty;
    [OutputDevices];
    [InputDevices];
)]
impl ty {
    /// Returns true if exactly one device bit is set.
    pub fn is_single(&self) -> bool {
        self.bits().count_ones() == 1
    }

    /// Number of devices in this set.
    pub fn count(&self) -> usize {
        self.bits().count_ones() as usize
    }
}

#[duplicate::duplicate_item(
    ty;
    [OutputDevices];
    [InputDevices];
)]
impl fmt::Display for ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.bits())
    }
}

impl OutputDevices {
    /// Speaker combined with a wired headset.
    pub const SPEAKER_AND_HEADSET: Self = Self::SPEAKER.union(Self::WIRED_HEADSET);
    /// Speaker combined with a wired headphone.
    pub const SPEAKER_AND_HEADPHONE: Self = Self::SPEAKER.union(Self::WIRED_HEADPHONE);

    /// Returns true if this is a non-empty set made only of A2DP devices.
    pub fn is_a2dp(&self) -> bool {
        !self.is_empty() && Self::ALL_A2DP.contains(*self)
    }

    /// Returns true if this is a non-empty set made only of SCO devices.
    pub fn is_sco(&self) -> bool {
        !self.is_empty() && Self::ALL_SCO.contains(*self)
    }

    /// Returns true for the two speaker + wired routes the hardware sink can render at once.
    pub fn is_combined_route(&self) -> bool {
        *self == Self::SPEAKER_AND_HEADSET || *self == Self::SPEAKER_AND_HEADPHONE
    }

    /// Input device that appears together with this output device, if any.
    pub fn input_counterpart(&self) -> InputDevices {
        if *self == Self::WIRED_HEADSET {
            InputDevices::WIRED_HEADSET
        } else if self.is_sco() {
            InputDevices::BLUETOOTH_SCO_HEADSET
        } else {
            InputDevices::empty()
        }
    }
}

/// A single physical device, tagged with its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioDevice {
    /// Output device; should hold exactly one bit.
    Output(OutputDevices),
    /// Input device; should hold exactly one bit.
    Input(InputDevices),
}

impl AudioDevice {
    /// Returns true if the wrapped set holds exactly one device.
    pub fn is_single(&self) -> bool {
        match self {
            Self::Output(device) => device.is_single(),
            Self::Input(device) => device.is_single(),
        }
    }
}

impl From<OutputDevices> for AudioDevice {
    fn from(value: OutputDevices) -> Self {
        Self::Output(value)
    }
}

impl From<InputDevices> for AudioDevice {
    fn from(value: InputDevices) -> Self {
        Self::Input(value)
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(device) => write!(f, "output {device}"),
            Self::Input(device) => write!(f, "input {device}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_a2dp_and_sco_classes() {
        assert!(OutputDevices::BLUETOOTH_A2DP_HEADPHONES.is_a2dp());
        assert!(!(OutputDevices::SPEAKER | OutputDevices::BLUETOOTH_A2DP).is_a2dp());
        assert!(!OutputDevices::empty().is_a2dp());
        assert!(OutputDevices::BLUETOOTH_SCO_CARKIT.is_sco());
        assert!(!OutputDevices::EARPIECE.is_sco());
    }

    #[test]
    fn test_combined_route() {
        assert!((OutputDevices::SPEAKER | OutputDevices::WIRED_HEADSET).is_combined_route());
        assert!((OutputDevices::WIRED_HEADPHONE | OutputDevices::SPEAKER).is_combined_route());
        assert!(!(OutputDevices::SPEAKER | OutputDevices::EARPIECE).is_combined_route());
        assert!(!OutputDevices::SPEAKER.is_combined_route());
    }

    #[test]
    fn test_input_counterpart() {
        assert_eq!(
            InputDevices::WIRED_HEADSET,
            OutputDevices::WIRED_HEADSET.input_counterpart()
        );
        assert_eq!(
            InputDevices::BLUETOOTH_SCO_HEADSET,
            OutputDevices::BLUETOOTH_SCO.input_counterpart()
        );
        assert!(OutputDevices::WIRED_HEADPHONE.input_counterpart().is_empty());
    }

    #[test]
    fn test_single_and_display() {
        assert!(AudioDevice::from(OutputDevices::SPEAKER).is_single());
        assert!(!AudioDevice::from(OutputDevices::SPEAKER_AND_HEADSET).is_single());
        assert_eq!("0x00000006", OutputDevices::SPEAKER_AND_HEADSET.to_string());
    }
}
