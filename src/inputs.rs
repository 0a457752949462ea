use policyflow_core::device::{
    AudioFormat, InputChannels, InputConfig, InputSource, IoHandle, OpenedInput,
};
use policyflow_core::{InputDevices, Parameter, PolicyClient};
use slotmap::SlotMap;

use crate::engine::Engine;
use crate::error::{Inconsistency, PolicyError, Result};
use crate::selector;

slotmap::new_key_type! {
    /// Handle of an input known to the engine.
    pub struct InputHandle;
}

/// One open capture source.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDescriptor {
    pub(crate) io: IoHandle,
    pub(crate) source: InputSource,
    pub(crate) device: InputDevices,
    pub(crate) sampling_rate: u32,
    pub(crate) format: AudioFormat,
    pub(crate) channels: InputChannels,
    pub(crate) active: bool,
}

impl InputDescriptor {
    pub(crate) fn new(opened: &OpenedInput, source: InputSource, device: InputDevices) -> Self {
        Self {
            io: opened.io,
            source,
            device,
            sampling_rate: opened.sampling_rate,
            format: opened.format,
            channels: opened.channels,
            active: false,
        }
    }

    /// Driver handle of the input.
    pub fn io(&self) -> IoHandle {
        self.io
    }

    /// Capture use case the input was opened for.
    pub fn source(&self) -> InputSource {
        self.source
    }

    /// Device the input captures from.
    pub fn device(&self) -> InputDevices {
        self.device
    }

    /// Sample rate in Hz.
    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    /// Sample format.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Channel mask.
    pub fn channels(&self) -> InputChannels {
        self.channels
    }

    /// Returns true while the input captures.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Arena of every open input. At most one of them captures at any time.
#[derive(Debug, Default)]
pub struct InputRegistry {
    map: SlotMap<InputHandle, InputDescriptor>,
}

impl InputRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, descriptor: InputDescriptor) -> InputHandle {
        self.map.insert(descriptor)
    }

    pub(crate) fn remove(&mut self, handle: InputHandle) -> Option<InputDescriptor> {
        self.map.remove(handle)
    }

    /// Looks up an input.
    pub fn get(&self, handle: InputHandle) -> Option<&InputDescriptor> {
        self.map.get(handle)
    }

    pub(crate) fn get_mut(&mut self, handle: InputHandle) -> Option<&mut InputDescriptor> {
        self.map.get_mut(handle)
    }

    /// Iterates over every input.
    pub fn iter(&self) -> impl Iterator<Item = (InputHandle, &InputDescriptor)> {
        self.map.iter()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (InputHandle, InputDescriptor)> + '_ {
        self.map.drain()
    }

    /// Number of open inputs.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no input is open.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The input currently capturing, if any.
    pub fn active(&self) -> Option<InputHandle> {
        self.map
            .iter()
            .find(|(_, descriptor)| descriptor.active)
            .map(|(handle, _)| handle)
    }
}

impl<C: PolicyClient> Engine<C> {
    /// Opens a capture input for `source`. Voice sources always capture their own channels,
    /// whatever `config` asks for. The driver must honour the request exactly.
    pub fn get_input(&mut self, source: InputSource, config: InputConfig) -> Result<InputHandle> {
        let device = self.device_for_input_source(source);
        if device.is_empty() {
            return Err(PolicyError::unavailable(format!("no input device for {source:?}")));
        }
        let config = InputConfig {
            channels: source.forced_channels().unwrap_or(config.channels),
            ..config
        };
        let opened = self.client.open_input(device, &config).map_err(|err| {
            log::error!("Cannot open input for {source:?}: {err}");
            PolicyError::unavailable(err)
        })?;
        if !config.is_satisfied_by(&opened) {
            log::warn!(io = opened.io.0; "Input does not match the request for {source:?}");
            let io = opened.io;
            self.notify("input close", |client| client.close_input(io));
            return Err(PolicyError::unavailable(format!(
                "input {io} opened with {} Hz {:?} {:#x}",
                opened.sampling_rate,
                opened.format,
                opened.channels.bits()
            )));
        }
        log::info!(io = opened.io.0; "Input opened for {source:?} on {device}");
        Ok(self
            .inputs
            .insert(InputDescriptor::new(&opened, source, device)))
    }

    /// Starts capturing on `handle`, telling the driver the capture use case. Only one input
    /// captures at a time.
    pub fn start_input(&mut self, handle: InputHandle) -> Result<()> {
        let Some(input) = self.inputs.get(handle) else {
            log::warn!("Starting unknown input");
            return Err(PolicyError::NotFound);
        };
        let (io, device, source) = (input.io, input.device, input.source);
        if self.inputs.active().is_some() {
            log::warn!(io = io.0; "Another input is already capturing");
            return Err(PolicyError::Busy);
        }
        self.notify("input routing", |client| {
            client.set_parameters(io, &Parameter::InputRouting(device), 0)
        });
        if let Some(tuning) = source.tuning() {
            self.notify("input source", |client| {
                client.set_parameters(io, &Parameter::InputSource(tuning), 0)
            });
        }
        if let Some(input) = self.inputs.get_mut(handle) {
            input.active = true;
        }
        log::debug!(io = io.0; "Input started on {device}");
        Ok(())
    }

    /// Stops capturing on `handle`.
    pub fn stop_input(&mut self, handle: InputHandle) -> Result<()> {
        let Some(input) = self.inputs.get(handle) else {
            log::warn!("Stopping unknown input");
            return Err(PolicyError::NotFound);
        };
        if !input.active {
            self.report(Inconsistency::InputAlreadyStopped);
            return Ok(());
        }
        let io = input.io;
        self.notify("input routing", |client| {
            client.set_parameters(io, &Parameter::InputRouting(InputDevices::empty()), 0)
        });
        if let Some(input) = self.inputs.get_mut(handle) {
            input.active = false;
        }
        log::debug!(io = io.0; "Input stopped");
        Ok(())
    }

    /// Closes the input.
    pub fn release_input(&mut self, handle: InputHandle) -> Result<()> {
        let Some(input) = self.inputs.remove(handle) else {
            log::warn!("Releasing unknown input");
            return Err(PolicyError::NotFound);
        };
        log::info!(io = input.io.0; "Input released");
        self.notify("input close", |client| client.close_input(input.io));
        Ok(())
    }

    /// Input device `source` resolves to in the current state.
    pub fn device_for_input_source(&self, source: InputSource) -> InputDevices {
        selector::device_for_input_source(source, self.devices.available_inputs(), &self.forced)
    }

    /// Moves the capturing input to the device its source now resolves to.
    pub(crate) fn reroute_active_input(&mut self) {
        let Some(handle) = self.inputs.active() else {
            return;
        };
        let Some(input) = self.inputs.get(handle) else {
            return;
        };
        let (io, current) = (input.io, input.device);
        let device = self.device_for_input_source(input.source);
        if device == current {
            return;
        }
        log::debug!(io = io.0; "Active input moves from {current} to {device}");
        if let Some(input) = self.inputs.get_mut(handle) {
            input.device = device;
        }
        self.notify("input routing", |client| {
            client.set_parameters(io, &Parameter::InputRouting(device), 0)
        });
    }
}
