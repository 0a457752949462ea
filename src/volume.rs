use std::f32::consts::LN_10;

use policyflow_core::{
    ForceUse, ForcedConfig, OutputDevices, PolicyClient, Strategy, StreamType,
};

use crate::config::StreamVolumeConfig;
use crate::engine::Engine;
use crate::error::{Inconsistency, PolicyError, Result};
use crate::outputs::OutputHandle;

/// Process-wide volume state of one stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamDescriptor {
    pub(crate) index_min: u32,
    pub(crate) index_max: u32,
    pub(crate) index_cur: u32,
    pub(crate) can_be_muted: bool,
}

impl StreamDescriptor {
    /// Lowest volume index.
    pub fn index_min(&self) -> u32 {
        self.index_min
    }

    /// Highest volume index.
    pub fn index_max(&self) -> u32 {
        self.index_max
    }

    /// Current volume index.
    pub fn index_cur(&self) -> u32 {
        self.index_cur
    }

    /// Returns false if mutes are only counted.
    pub fn can_be_muted(&self) -> bool {
        self.can_be_muted
    }
}

impl From<StreamVolumeConfig> for StreamDescriptor {
    fn from(config: StreamVolumeConfig) -> Self {
        Self {
            index_min: config.index_min,
            index_max: config.index_max,
            index_cur: config.index_cur.clamp(config.index_min, config.index_max),
            can_be_muted: config.can_be_muted,
        }
    }
}

/// Position of `index` in `[min, max]`, as an integer percentage.
pub fn volume_percent(index: u32, min: u32, max: u32) -> u32 {
    if max <= min {
        return 0;
    }
    let span = u64::from(max - min);
    let offset = u64::from(index.clamp(min, max) - min);
    (100 * offset / span) as u32
}

/// Logarithmic volume curve: each percent below 100 attenuates by `db_per_step`, 0% is silence.
pub fn linear_to_log(percent: u32, db_per_step: f32) -> f32 {
    if percent == 0 {
        return 0.0;
    }
    let db_convert = -db_per_step * LN_10 / 20.0;
    ((100.0 - percent.min(100) as f32) * db_convert).exp()
}

impl<C: PolicyClient> Engine<C> {
    /// Sets the index range of `stream`. The current index is clamped into the new range.
    pub fn init_stream_volume(&mut self, stream: StreamType, index_min: u32, index_max: u32) -> Result<()> {
        if index_min >= index_max {
            log::warn!(index_min, index_max; "Invalid volume range for {stream}");
            return Err(PolicyError::invalid(format!(
                "volume range [{index_min}, {index_max}] for {stream} is empty"
            )));
        }
        let descriptor = &mut self.streams[stream];
        descriptor.index_min = index_min;
        descriptor.index_max = index_max;
        descriptor.index_cur = descriptor.index_cur.clamp(index_min, index_max);
        Ok(())
    }

    /// Stores a new volume index for `stream` and pushes the resulting gain to every output.
    /// Streams which cannot be muted always get their maximum index.
    pub fn set_stream_volume_index(&mut self, stream: StreamType, index: u32) -> Result<()> {
        let descriptor = self.streams[stream];
        if index < descriptor.index_min || index > descriptor.index_max {
            log::warn!(index; "Volume index out of range for {stream}");
            return Err(PolicyError::invalid(format!(
                "index {index} outside [{}, {}] for {stream}",
                descriptor.index_min, descriptor.index_max
            )));
        }
        let index = if descriptor.can_be_muted {
            index
        } else {
            descriptor.index_max
        };
        log::debug!(index; "Volume index set for {stream}");
        self.streams[stream].index_cur = index;
        for handle in self.outputs.handles() {
            let device = self.outputs.device_of(handle);
            self.check_and_set_volume(stream, index, handle, device, 0, false);
        }
        Ok(())
    }

    /// Current volume index of `stream`.
    pub fn stream_volume_index(&self, stream: StreamType) -> u32 {
        self.streams[stream].index_cur
    }

    /// Marks `stream` as mutable or not. Muting a stream which cannot be muted only counts.
    pub fn set_stream_can_be_muted(&mut self, stream: StreamType, can_be_muted: bool) {
        log::debug!(can_be_muted; "Mute policy changed for {stream}");
        self.streams[stream].can_be_muted = can_be_muted;
    }

    /// Total mute nesting of `stream` across every output.
    pub fn mute_count(&self, stream: StreamType) -> u32 {
        self.outputs
            .iter()
            .map(|(_, output)| output.mute_count(stream))
            .sum()
    }

    /// Gain in `[0, 1]` of `stream` at `index` on output `sink` rendering to `device`. An empty
    /// `device` means the current device of `sink`.
    pub fn compute_gain(
        &self,
        stream: StreamType,
        index: u32,
        sink: OutputHandle,
        device: OutputDevices,
    ) -> f32 {
        let descriptor = &self.streams[stream];
        let device = if device.is_empty() {
            self.outputs.device_of(sink)
        } else {
            device
        };
        let percent = volume_percent(index, descriptor.index_min, descriptor.index_max);
        let mut gain = linear_to_log(percent, self.config.db_per_step);

        if stream.strategy() == Strategy::Sonification && device.intersects(OutputDevices::HEADSET_CLASS) {
            gain *= self.config.sonification_headset_factor;
            if self.outputs.is_used_by_stream(sink, StreamType::Music)
                || self.music_recently_stopped()
                || self.limit_ringtone_volume
            {
                let music = self.compute_gain(
                    StreamType::Music,
                    self.streams[StreamType::Music].index_cur,
                    sink,
                    device,
                );
                let limit = music.max(self.config.sonification_headset_floor);
                if gain > limit {
                    log::trace!("Limiting {stream} gain {gain} to {limit}, music at {music}");
                    gain = limit;
                }
            }
        }
        gain
    }

    /// Pushes the gain of `stream` on `sink` if it changed, or unconditionally with `force`.
    /// Does nothing while the stream is muted on `sink`.
    pub(crate) fn check_and_set_volume(
        &mut self,
        stream: StreamType,
        index: u32,
        sink: OutputHandle,
        device: OutputDevices,
        delay_ms: u32,
        force: bool,
    ) {
        let Some(output) = self.outputs.get(sink) else {
            return;
        };
        if output.mute_count(stream) != 0 {
            log::trace!(mute_count = output.mute_count(stream); "Not changing volume of muted {stream}");
            return;
        }
        let sco_forced = self.forced.get(ForceUse::Communication) == ForcedConfig::BtSco;
        if (stream == StreamType::VoiceCall && sco_forced)
            || (stream == StreamType::BluetoothSco && !sco_forced)
        {
            log::trace!("Call path owns the {stream} gain");
            return;
        }

        let gain = self.compute_gain(stream, index, sink, device);
        if output.current_volume(stream) == Some(gain) && !force {
            return;
        }
        let io = output.io();
        if let Some(output) = self.outputs.get_mut(sink) {
            output.cur_volume[stream] = Some(gain);
        }

        let mut pushed = gain;
        if stream.is_call_adjacent() {
            // The hardware call path never goes fully silent.
            pushed = 0.01 + 0.99 * gain;
            let voice = match stream {
                StreamType::VoiceCall => Some(index as f32 / self.streams[stream].index_max as f32),
                StreamType::BluetoothSco => Some(1.0),
                _ => None,
            };
            if let Some(voice) = voice {
                if sink == self.primary {
                    self.notify("voice volume", |client| client.set_voice_volume(voice, delay_ms));
                }
            }
        }
        log::trace!(io = io.0, delay_ms; "Volume of {stream} set to {pushed}");
        self.notify("stream volume", |client| {
            client.set_stream_volume(stream, pushed, io, delay_ms)
        });
    }

    /// Pushes the gain of every stream type on `sink`, as rendered to `device`.
    pub(crate) fn apply_stream_volumes(&mut self, sink: OutputHandle, device: OutputDevices, delay_ms: u32) {
        for stream in StreamType::ALL {
            let index = self.streams[stream].index_cur;
            self.check_and_set_volume(stream, index, sink, device, delay_ms, false);
        }
    }

    pub(crate) fn set_strategy_mute(&mut self, strategy: Strategy, on: bool, sink: OutputHandle, delay_ms: u32) {
        log::debug!(on, delay_ms; "Mute {strategy} strategy");
        for stream in strategy.streams() {
            self.set_stream_mute(stream, on, sink, delay_ms);
        }
    }

    /// Nested mute of `stream` on `sink`. Only the first mute silences and only the last unmute
    /// restores the gain.
    pub(crate) fn set_stream_mute(&mut self, stream: StreamType, on: bool, sink: OutputHandle, delay_ms: u32) {
        let Some(output) = self.outputs.get(sink) else {
            return;
        };
        let count = output.mute_count(stream);
        let device = self.outputs.device_of(sink);
        let descriptor = self.streams[stream];

        if on {
            if count == 0 && descriptor.can_be_muted {
                self.check_and_set_volume(stream, descriptor.index_min, sink, device, delay_ms, false);
            }
            if let Some(output) = self.outputs.get_mut(sink) {
                output.mute_counts[stream] += 1;
            }
        } else {
            if count == 0 {
                self.report(Inconsistency::MuteUnderflow(stream));
                return;
            }
            if let Some(output) = self.outputs.get_mut(sink) {
                output.mute_counts[stream] -= 1;
            }
            if count == 1 {
                self.check_and_set_volume(stream, descriptor.index_cur, sink, device, delay_ms, true);
            }
        }
    }
}
