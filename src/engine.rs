use std::sync::Arc;
use std::time::Duration;

use policyflow_core::device::OutputFlags;
use policyflow_core::{
    ForceUse, ForcedConfig, ForcedUses, OutputDevices, PhoneState, PolicyClient, Strategy,
    StreamTable, StreamType,
};

use crate::clock::{Clock, MonotonicClock};
use crate::config::PolicyConfig;
use crate::error::{Inconsistency, PolicyError, Result};
use crate::inputs::InputRegistry;
use crate::outputs::{OutputDescriptor, OutputHandle, OutputRegistry};
use crate::registry::DeviceRegistry;
use crate::selector::{self, SelectionContext};
use crate::volume::StreamDescriptor;

/// Outputs opened while an A2DP device is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A2dpOutputs {
    /// Output rendering to the A2DP device.
    pub sink: OutputHandle,
    /// Output mirroring onto the primary output and the A2DP sink.
    pub duplicated: OutputHandle,
}

/// The routing policy engine. Not thread-safe by itself, see [`crate::AudioPolicy`].
pub struct Engine<C: PolicyClient> {
    pub(crate) client: C,
    pub(crate) config: PolicyConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) devices: DeviceRegistry,
    pub(crate) forced: ForcedUses,
    pub(crate) phone_state: PhoneState,
    pub(crate) ringer_mode: u32,
    pub(crate) outputs: OutputRegistry,
    pub(crate) inputs: InputRegistry,
    pub(crate) streams: StreamTable<StreamDescriptor>,
    pub(crate) primary: OutputHandle,
    pub(crate) a2dp: Option<A2dpOutputs>,
    pub(crate) limit_ringtone_volume: bool,
    pub(crate) music_stopped_at: Option<Duration>,
    pub(crate) inconsistencies: usize,
}

impl<C: PolicyClient> Engine<C> {
    /// Opens the primary output through `client` and routes it to the configured device.
    pub fn new(client: C, config: PolicyConfig) -> Result<Self> {
        Self::with_clock(client, config, Arc::new(MonotonicClock::new()))
    }

    /// Same as [`Self::new`], reading time from `clock`.
    /// Fails with `InvalidArgument` before touching the driver when a configured volume range
    /// is empty.
    pub fn with_clock(mut client: C, config: PolicyConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        for (stream, volume) in config.streams.iter() {
            if volume.index_min >= volume.index_max {
                log::error!(index_min = volume.index_min, index_max = volume.index_max; "Invalid volume range for {stream}");
                return Err(PolicyError::invalid(format!(
                    "volume range [{}, {}] for {stream} is empty",
                    volume.index_min, volume.index_max
                )));
            }
        }
        let device = config.primary_device;
        let opened = client
            .open_output(device, &config.primary_output)
            .map_err(|err| {
                log::error!(device = device.bits(); "Cannot open primary output: {err}");
                PolicyError::unavailable(err)
            })?;
        log::info!(io = opened.io.0, latency_ms = opened.latency_ms; "Primary output opened on {device}");

        let mut outputs = OutputRegistry::new();
        let primary = outputs.insert(OutputDescriptor::standalone(
            &opened,
            device,
            OutputFlags::empty(),
        ));
        let mut streams = StreamTable::default();
        for (stream, volume) in config.streams.iter() {
            streams[stream] = StreamDescriptor::from(*volume);
        }

        let mut engine = Self {
            client,
            devices: DeviceRegistry::new(config.available_outputs, config.available_inputs),
            config,
            clock,
            forced: ForcedUses::default(),
            phone_state: PhoneState::Normal,
            ringer_mode: 0,
            outputs,
            inputs: InputRegistry::new(),
            streams,
            primary,
            a2dp: None,
            limit_ringtone_volume: false,
            music_stopped_at: None,
            inconsistencies: 0,
        };
        engine.apply_route(primary, device, true, 0);
        Ok(engine)
    }

    /// Driver the engine issues commands to.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Mutable access to the driver.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Available devices and bluetooth addresses.
    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Every open output.
    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    /// Every open input.
    pub fn inputs(&self) -> &InputRegistry {
        &self.inputs
    }

    /// The output opened at startup, always present.
    pub fn primary_output(&self) -> OutputHandle {
        self.primary
    }

    /// The A2DP sink and duplicated output, while an A2DP device is connected.
    pub fn a2dp_outputs(&self) -> Option<A2dpOutputs> {
        self.a2dp
    }

    /// Current telephony state.
    pub fn phone_state(&self) -> PhoneState {
        self.phone_state
    }

    /// Volume state of `stream`.
    pub fn stream(&self, stream: StreamType) -> &StreamDescriptor {
        &self.streams[stream]
    }

    /// Devices `handle` renders to, empty for unknown handles.
    pub fn device_of(&self, handle: OutputHandle) -> OutputDevices {
        self.outputs.device_of(handle)
    }

    /// Number of inconsistencies detected and recovered from so far.
    pub fn inconsistencies(&self) -> usize {
        self.inconsistencies
    }

    /// True while sonification is held to the music volume on headsets during ringing.
    pub fn is_ringtone_volume_limited(&self) -> bool {
        self.limit_ringtone_volume
    }

    /// Last ringer mode set.
    pub fn ringer_mode(&self) -> u32 {
        self.ringer_mode
    }

    /// Stored as is for diagnostics.
    pub fn set_ringer_mode(&mut self, mode: u32, mask: u32) {
        log::debug!(mode, mask; "Ringer mode changed");
        self.ringer_mode = mode;
    }

    /// Configuration currently forced for `usage`.
    pub fn force_use(&self, usage: ForceUse) -> ForcedConfig {
        self.forced.get(usage)
    }

    /// Forces `usage` to `config`. Switching communication routing while a call is up, or while
    /// voice call audio plays on the primary output, re-routes it immediately. Switching record
    /// routing re-routes the active input.
    pub fn set_force_use(&mut self, usage: ForceUse, config: ForcedConfig) -> Result<()> {
        if !usage.accepts(config) {
            log::warn!("Rejected forced configuration {config} for {usage}");
            return Err(PolicyError::invalid(format!(
                "{config} cannot be forced for {usage}"
            )));
        }
        let previous = self.forced.set(usage, config);
        log::debug!("Force use for {usage}: {previous} -> {config}");
        if usage == ForceUse::Communication
            && (self.phone_state.is_in_call()
                || self
                    .outputs
                    .is_used_by_stream(self.primary, StreamType::VoiceCall))
        {
            let device = self.device_for_strategy(Strategy::Phone);
            self.apply_route(self.primary, device, false, 0);
        }
        if usage == ForceUse::Record {
            self.reroute_active_input();
        }
        Ok(())
    }

    pub(crate) fn selection(&self) -> SelectionContext {
        SelectionContext {
            phone_state: self.phone_state,
            available_outputs: self.devices.available_outputs(),
            forced: self.forced,
        }
    }

    /// Devices `strategy` resolves to in the current state.
    pub fn device_for_strategy(&self, strategy: Strategy) -> OutputDevices {
        selector::device_for_strategy(strategy, &self.selection())
    }

    pub(crate) fn report(&mut self, inconsistency: Inconsistency) {
        self.inconsistencies += 1;
        log::warn!(total = self.inconsistencies; "Inconsistent state: {inconsistency}");
    }

    /// Issues a fire-and-forget driver command, logging a failure.
    pub(crate) fn notify(
        &mut self,
        command: &'static str,
        send: impl FnOnce(&mut C) -> std::result::Result<(), C::Error>,
    ) {
        if let Err(err) = send(&mut self.client) {
            log::error!("Driver rejected {command}: {err}");
        }
    }

    pub(crate) fn a2dp_shares_sco_link(&self) -> bool {
        self.a2dp.is_some() && self.devices.bluetooth_addresses_match()
    }

    pub(crate) fn music_recently_stopped(&self) -> bool {
        self.music_stopped_at.is_some_and(|stopped| {
            self.clock.now().saturating_sub(stopped) < self.config.music_grace_period
        })
    }
}

impl<C: PolicyClient> Drop for Engine<C> {
    fn drop(&mut self) {
        let mut handles = self.outputs.handles();
        // Duplicated outputs go first, they reference the others.
        handles.sort_by_key(|handle| {
            !self
                .outputs
                .get(*handle)
                .is_some_and(OutputDescriptor::is_duplicated)
        });
        for handle in handles {
            if let Some(descriptor) = self.outputs.remove(handle) {
                let io = descriptor.io;
                self.notify("output close", |client| client.close_output(io));
            }
        }
        let inputs: Vec<_> = self.inputs.drain().map(|(_, input)| input.io).collect();
        for io in inputs {
            self.notify("input close", |client| client.close_input(io));
        }
    }
}
