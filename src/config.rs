use std::time::Duration;

use policyflow_core::device::OutputConfig;
use policyflow_core::{InputDevices, OutputDevices, StreamTable, StreamType, Tone};

/// Volume index range and initial state of one stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamVolumeConfig {
    /// Lowest volume index.
    pub index_min: u32,
    /// Highest volume index.
    pub index_max: u32,
    /// Index the stream starts at, clamped into the range.
    pub index_cur: u32,
    /// When false, mute requests are counted but the stream is never silenced.
    pub can_be_muted: bool,
}

impl Default for StreamVolumeConfig {
    fn default() -> Self {
        Self {
            index_min: 0,
            index_max: 1,
            index_cur: 1,
            can_be_muted: true,
        }
    }
}

/// Tunables and initial state of the policy engine.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Output devices present before any connection event.
    pub available_outputs: OutputDevices,
    /// Input devices present before any connection event.
    pub available_inputs: InputDevices,
    /// Device the primary output is opened on and routed to at startup.
    pub primary_device: OutputDevices,
    /// Configuration requested when opening the primary output.
    pub primary_output: OutputConfig,
    /// Attenuation of one volume percent step, in dB.
    pub db_per_step: f32,
    /// Gain factor applied to sonification on headset class devices.
    pub sonification_headset_factor: f32,
    /// Lowest gain sonification is limited to on headsets while music plays.
    pub sonification_headset_floor: f32,
    /// How long after the last music stop sonification stays limited on headsets.
    pub music_grace_period: Duration,
    /// Media stays muted on the primary output this long after an A2DP sink disconnects.
    pub a2dp_disconnect_mute_ms: u32,
    /// Tone played in call in place of audible sonification.
    pub call_waiting_tone: Tone,
    /// Returns true for sonification stream types which are muted rather than replaced by
    /// a tone during a call.
    pub low_visibility: fn(StreamType) -> bool,
    /// Volume range of every stream type.
    pub streams: StreamTable<StreamVolumeConfig>,
}

/// Treats every stream type as low visibility.
pub fn all_low_visibility(_stream: StreamType) -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            available_outputs: OutputDevices::EARPIECE | OutputDevices::SPEAKER,
            available_inputs: InputDevices::BUILTIN_MIC,
            primary_device: OutputDevices::SPEAKER,
            primary_output: OutputConfig::default(),
            db_per_step: 0.5,
            sonification_headset_factor: 0.5,
            sonification_headset_floor: 0.016,
            music_grace_period: Duration::from_secs(5),
            a2dp_disconnect_mute_ms: 2000,
            call_waiting_tone: Tone::CallWaiting,
            low_visibility: all_low_visibility,
            streams: StreamTable::filled(StreamVolumeConfig::default()),
        }
    }
}

impl PolicyConfig {
    /// Sets the output devices present at startup.
    pub fn with_available_outputs(mut self, devices: OutputDevices) -> Self {
        self.available_outputs = devices;
        self
    }

    /// Sets the input devices present at startup.
    pub fn with_available_inputs(mut self, devices: InputDevices) -> Self {
        self.available_inputs = devices;
        self
    }

    /// Sets the device the primary output opens on.
    pub fn with_primary_device(mut self, device: OutputDevices) -> Self {
        self.primary_device = device;
        self
    }

    /// Sets the configuration requested for the primary output.
    pub fn with_primary_output(mut self, config: OutputConfig) -> Self {
        self.primary_output = config;
        self
    }

    /// Sets the attenuation of one volume percent step.
    pub fn with_db_per_step(mut self, db: f32) -> Self {
        self.db_per_step = db;
        self
    }

    /// Sets the sonification gain factor on headsets.
    pub fn with_sonification_headset_factor(mut self, factor: f32) -> Self {
        self.sonification_headset_factor = factor;
        self
    }

    /// Sets the lowest gain sonification is limited to on headsets.
    pub fn with_sonification_headset_floor(mut self, floor: f32) -> Self {
        self.sonification_headset_floor = floor;
        self
    }

    /// Sets how long sonification stays limited after music stops.
    pub fn with_music_grace_period(mut self, period: Duration) -> Self {
        self.music_grace_period = period;
        self
    }

    /// Sets how long media stays muted after an A2DP sink disconnects.
    pub fn with_a2dp_disconnect_mute_ms(mut self, delay_ms: u32) -> Self {
        self.a2dp_disconnect_mute_ms = delay_ms;
        self
    }

    /// Sets the tone replacing sonification in call.
    pub fn with_call_waiting_tone(mut self, tone: Tone) -> Self {
        self.call_waiting_tone = tone;
        self
    }

    /// Sets the classifier of low visibility stream types.
    pub fn with_low_visibility(mut self, classifier: fn(StreamType) -> bool) -> Self {
        self.low_visibility = classifier;
        self
    }

    /// Overrides the volume configuration of a single stream type.
    pub fn with_stream(mut self, stream: StreamType, config: StreamVolumeConfig) -> Self {
        self.streams[stream] = config;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PolicyConfig::default();
        assert_eq!(
            OutputDevices::EARPIECE | OutputDevices::SPEAKER,
            config.available_outputs
        );
        assert_eq!(InputDevices::BUILTIN_MIC, config.available_inputs);
        assert_eq!(Duration::from_secs(5), config.music_grace_period);
        assert_eq!(2000, config.a2dp_disconnect_mute_ms);
        assert!((config.low_visibility)(StreamType::Ring));
        assert_eq!(1, config.streams[StreamType::Music].index_max);
    }

    #[test]
    fn test_builders() {
        let ring = StreamVolumeConfig {
            index_max: 7,
            index_cur: 5,
            ..StreamVolumeConfig::default()
        };
        let config = PolicyConfig::default()
            .with_stream(StreamType::Ring, ring)
            .with_low_visibility(|stream| stream != StreamType::Ring)
            .with_a2dp_disconnect_mute_ms(500);
        assert_eq!(7, config.streams[StreamType::Ring].index_max);
        assert_eq!(1, config.streams[StreamType::Alarm].index_max);
        assert!(!(config.low_visibility)(StreamType::Ring));
        assert_eq!(500, config.a2dp_disconnect_mute_ms);
    }
}
