//! Human readable snapshot of the engine state.

use std::fmt;

use policyflow_core::{ForceUse, PolicyClient, StreamType};

use crate::engine::Engine;
use crate::outputs::OutputKind;

/// Display adapter over an [`Engine`].
struct Dump<'a, C: PolicyClient>(&'a Engine<C>);

impl<C: PolicyClient> Engine<C> {
    /// Text dump of the global state, every output and input, and the stream table.
    pub fn dump(&self) -> String {
        Dump(self).to_string()
    }
}

impl<C: PolicyClient> fmt::Display for Dump<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.0;
        let io_of = |handle| {
            engine
                .io_of(handle)
                .map_or_else(|| "-".to_string(), |io| io.to_string())
        };
        writeln!(f, "Policy engine")?;
        writeln!(f, " Primary output: {}", io_of(engine.primary))?;
        match engine.a2dp {
            Some(a2dp) => {
                writeln!(f, " A2DP output: {}", io_of(a2dp.sink))?;
                writeln!(f, " Duplicated output: {}", io_of(a2dp.duplicated))?;
            }
            None => writeln!(f, " A2DP output: -")?,
        }
        writeln!(f, " Output devices: {}", engine.devices.available_outputs())?;
        writeln!(f, " Input devices: {}", engine.devices.available_inputs())?;
        writeln!(f, " A2DP device address: {}", engine.devices.a2dp_address())?;
        writeln!(f, " SCO device address: {}", engine.devices.sco_address())?;
        writeln!(f, " Phone state: {}", engine.phone_state)?;
        writeln!(f, " Ringer mode: {}", engine.ringer_mode)?;
        for usage in ForceUse::ALL {
            writeln!(f, " Force use for {usage}: {}", engine.forced.get(usage))?;
        }
        writeln!(f, " Ringtone volume limited: {}", engine.limit_ringtone_volume)?;
        writeln!(f, " Inconsistencies: {}", engine.inconsistencies)?;

        writeln!(f, "\nOutputs:")?;
        for (handle, output) in engine.outputs.iter() {
            writeln!(f, "- Output {}", output.io)?;
            if let OutputKind::Duplicated { first, second } = output.kind {
                writeln!(f, "  Duplicates: {} {}", io_of(first), io_of(second))?;
            }
            writeln!(f, "  Sampling rate: {}", output.sampling_rate)?;
            writeln!(f, "  Format: {:?}", output.format)?;
            writeln!(f, "  Channels: {:#010x}", output.channels.bits())?;
            writeln!(f, "  Latency: {} ms", output.latency_ms)?;
            writeln!(f, "  Flags: {:#010x}", output.flags.bits())?;
            writeln!(f, "  Devices: {}", engine.outputs.device_of(handle))?;
            writeln!(f, "  Stream           Volume  RefCount  MuteCount")?;
            for stream in StreamType::ALL {
                let volume = output
                    .current_volume(stream)
                    .map_or_else(|| "-".to_string(), |gain| format!("{gain:.3}"));
                writeln!(
                    f,
                    "  {:<16} {volume:>6}  {:>8}  {:>9}",
                    stream.to_string(),
                    output.ref_count(stream),
                    output.mute_count(stream)
                )?;
            }
        }

        writeln!(f, "\nInputs:")?;
        for (_, input) in engine.inputs.iter() {
            writeln!(f, "- Input {}", input.io)?;
            writeln!(f, "  Source: {:?}", input.source)?;
            writeln!(f, "  Sampling rate: {}", input.sampling_rate)?;
            writeln!(f, "  Format: {:?}", input.format)?;
            writeln!(f, "  Channels: {:#010x}", input.channels.bits())?;
            writeln!(f, "  Devices: {}", input.device)?;
            writeln!(f, "  Active: {}", input.active)?;
        }

        writeln!(f, "\nStreams:")?;
        writeln!(f, " Stream           Min  Max  Cur  MuteCount  CanBeMuted")?;
        for stream in StreamType::ALL {
            let descriptor = &engine.streams[stream];
            writeln!(
                f,
                " {:<16} {:>3}  {:>3}  {:>3}  {:>9}  {}",
                stream.to_string(),
                descriptor.index_min,
                descriptor.index_max,
                descriptor.index_cur,
                engine.mute_count(stream),
                descriptor.can_be_muted
            )?;
        }
        Ok(())
    }
}
