use std::fmt;

use bitflags::bitflags;

/// Opaque I/O handle issued by the driver for an opened sink or source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IoHandle(pub u32);

impl fmt::Display for IoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io#{}", self.0)
    }
}

/// Sample format of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// Signed 16-bit linear PCM.
    Pcm16Bit,
    /// Unsigned 8-bit linear PCM.
    Pcm8Bit,
    /// MP3 bitstream.
    Mp3,
    /// AMR narrow band bitstream.
    AmrNb,
    /// AMR wide band bitstream.
    AmrWb,
    /// AAC bitstream.
    Aac,
}

impl AudioFormat {
    /// Returns true for uncompressed formats which can go through the mixer.
    pub fn is_linear_pcm(&self) -> bool {
        matches!(self, Self::Pcm16Bit | Self::Pcm8Bit)
    }
}

bitflags! {
    /// Channel positions of an output stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputChannels: u32 {
        const FRONT_LEFT = 1 << 0;
        const FRONT_RIGHT = 1 << 1;
        const FRONT_CENTER = 1 << 2;
        const LOW_FREQUENCY = 1 << 3;
        const BACK_LEFT = 1 << 4;
        const BACK_RIGHT = 1 << 5;

        const MONO = Self::FRONT_LEFT.bits();
        const STEREO = Self::FRONT_LEFT.bits() | Self::FRONT_RIGHT.bits();
    }
}

bitflags! {
    /// Channel positions of an input stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputChannels: u32 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const VOICE_UPLINK = 1 << 2;
        const VOICE_DNLINK = 1 << 3;

        const MONO = Self::LEFT.bits();
        const STEREO = Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

bitflags! {
    /// Flags requested when opening an output.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputFlags: u32 {
        /// The output bypasses the software mixer and is dedicated to one stream.
        const DIRECT = 1 << 0;
    }
}

/// Capture use case requested by a recording client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// Let the policy pick.
    Default,
    /// Microphone.
    Mic,
    /// Uplink side of the call.
    VoiceUplink,
    /// Downlink side of the call.
    VoiceDownlink,
    /// Both sides of the call.
    VoiceCall,
    /// Microphone tuned for video recording.
    Camcorder,
    /// Microphone tuned for speech recognition.
    VoiceRecognition,
}

impl InputSource {
    /// Channel mask imposed by the source, overriding what the client asked for.
    pub fn forced_channels(&self) -> Option<InputChannels> {
        match self {
            Self::VoiceUplink => Some(InputChannels::VOICE_UPLINK),
            Self::VoiceDownlink => Some(InputChannels::VOICE_DNLINK),
            Self::VoiceCall => Some(InputChannels::VOICE_UPLINK | InputChannels::VOICE_DNLINK),
            _ => None,
        }
    }

    /// Use case the driver tunes capture for when this source starts. Plain microphone
    /// capture is announced as [`Self::Default`], call taps are not announced.
    pub fn tuning(&self) -> Option<InputSource> {
        match self {
            Self::Default | Self::Mic => Some(Self::Default),
            Self::VoiceRecognition | Self::Camcorder => Some(*self),
            Self::VoiceUplink | Self::VoiceDownlink | Self::VoiceCall => None,
        }
    }
}

/// Output configuration requested from the driver. `None` fields let the driver choose.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OutputConfig {
    /// Requested sample rate in Hz.
    pub sampling_rate: Option<u32>,
    /// Requested sample format.
    pub format: Option<AudioFormat>,
    /// Requested channel mask.
    pub channels: Option<OutputChannels>,
    /// Opening flags.
    pub flags: OutputFlags,
}

impl OutputConfig {
    /// Returns true if the output should be dedicated to a single stream.
    pub fn is_direct(&self) -> bool {
        self.flags.contains(OutputFlags::DIRECT)
            || self.format.is_some_and(|format| !format.is_linear_pcm())
    }

    /// Returns true if every parameter the configuration pins down is honored by `opened`.
    pub fn is_satisfied_by(&self, opened: &OpenedOutput) -> bool {
        self.sampling_rate.is_none_or(|rate| rate == opened.sampling_rate)
            && self.format.is_none_or(|format| format == opened.format)
            && self.channels.is_none_or(|channels| channels == opened.channels)
    }
}

impl Default for OutputFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Output configuration as actually opened by the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenedOutput {
    /// Driver handle of the output.
    pub io: IoHandle,
    /// Negotiated sample rate in Hz.
    pub sampling_rate: u32,
    /// Negotiated sample format.
    pub format: AudioFormat,
    /// Negotiated channel mask.
    pub channels: OutputChannels,
    /// Measured output latency in milliseconds.
    pub latency_ms: u32,
}

/// Input configuration requested from the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputConfig {
    /// Requested sample rate in Hz.
    pub sampling_rate: u32,
    /// Requested sample format.
    pub format: AudioFormat,
    /// Requested channel mask.
    pub channels: InputChannels,
}

impl InputConfig {
    /// Inputs are only accepted with the exact parameters requested.
    pub fn is_satisfied_by(&self, opened: &OpenedInput) -> bool {
        self.sampling_rate == opened.sampling_rate
            && self.format == opened.format
            && self.channels == opened.channels
    }
}

/// Input configuration as actually opened by the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenedInput {
    /// Driver handle of the input.
    pub io: IoHandle,
    /// Negotiated sample rate in Hz.
    pub sampling_rate: u32,
    /// Negotiated sample format.
    pub format: AudioFormat,
    /// Negotiated channel mask.
    pub channels: InputChannels,
}
