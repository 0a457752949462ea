#![warn(missing_docs)]
//! Audio routing policy engine.
//!
//! The engine decides which physical device every logical stream renders to or captures from,
//! and at what gain, as devices come and go, calls start and end, and users force routes.
//! It owns no audio: every decision is issued as a command to a [`PolicyClient`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use policyflow_core::device::{InputConfig, InputSource, OutputConfig};

/// Time sources.
pub mod clock;
/// Engine configuration.
pub mod config;
mod dump;
/// The policy engine.
pub mod engine;
/// Errors and inconsistencies.
pub mod error;
/// Open inputs and capture control.
pub mod inputs;
/// Open outputs and usage counters.
pub mod outputs;
mod phone;
/// Star-import surface.
pub mod prelude;
#[cfg(any(test, feature = "test-util"))]
/// In-memory driver double for tests.
pub mod recording;
/// Device availability.
pub mod registry;
mod routing;
/// Device selection rules.
pub mod selector;
/// Volume curve and gain computation.
pub mod volume;

pub use policyflow_core::device;
pub use policyflow_core::{
    strategy_for, AudioDevice, ClientError, ForceUse, ForcedConfig, InputDevices, OutputDevices,
    Parameter, PhoneState, PolicyClient, Strategy, StreamType, Tone,
};

pub use clock::Clock;
pub use config::{PolicyConfig, StreamVolumeConfig};
pub use engine::{A2dpOutputs, Engine};
pub use error::{Inconsistency, PolicyError, Result};
pub use inputs::InputHandle;
pub use outputs::OutputHandle;

/// Thread-safe entry point. Every operation holds the engine lock for its whole duration, so
/// callers never observe a partially applied decision.
pub struct AudioPolicy<C: PolicyClient> {
    engine: Mutex<Engine<C>>,
}

impl<C: PolicyClient> AudioPolicy<C> {
    /// Opens the primary output through `client` and starts the engine.
    pub fn new(client: C, config: PolicyConfig) -> Result<Self> {
        Engine::new(client, config).map(Self::from_engine)
    }

    /// Same as [`Self::new`], reading time from `clock`.
    pub fn with_clock(client: C, config: PolicyConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Engine::with_clock(client, config, clock).map(Self::from_engine)
    }

    /// Wraps an existing engine.
    pub fn from_engine(engine: Engine<C>) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    /// Unwraps the engine.
    pub fn into_inner(self) -> Engine<C> {
        self.engine.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Engine<C>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the engine, for inspection or batched operations.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<C>) -> R) -> R {
        f(&mut self.lock())
    }

    /// See [`Engine::set_device_connection`].
    pub fn set_device_connection(
        &self,
        device: AudioDevice,
        connected: bool,
        address: &str,
    ) -> Result<()> {
        self.lock().set_device_connection(device, connected, address)
    }

    /// See [`Engine::is_device_connected`].
    pub fn is_device_connected(&self, device: AudioDevice, address: &str) -> bool {
        self.lock().is_device_connected(device, address)
    }

    /// See [`Engine::set_phone_state`].
    pub fn set_phone_state(&self, state: PhoneState) {
        self.lock().set_phone_state(state)
    }

    /// Current telephony state.
    pub fn phone_state(&self) -> PhoneState {
        self.lock().phone_state()
    }

    /// See [`Engine::set_ringer_mode`].
    pub fn set_ringer_mode(&self, mode: u32, mask: u32) {
        self.lock().set_ringer_mode(mode, mask)
    }

    /// See [`Engine::set_force_use`].
    pub fn set_force_use(&self, usage: ForceUse, config: ForcedConfig) -> Result<()> {
        self.lock().set_force_use(usage, config)
    }

    /// Configuration currently forced for `usage`.
    pub fn force_use(&self, usage: ForceUse) -> ForcedConfig {
        self.lock().force_use(usage)
    }

    /// See [`Engine::init_stream_volume`].
    pub fn init_stream_volume(&self, stream: StreamType, index_min: u32, index_max: u32) -> Result<()> {
        self.lock().init_stream_volume(stream, index_min, index_max)
    }

    /// See [`Engine::set_stream_volume_index`].
    pub fn set_stream_volume_index(&self, stream: StreamType, index: u32) -> Result<()> {
        self.lock().set_stream_volume_index(stream, index)
    }

    /// Current volume index of `stream`.
    pub fn stream_volume_index(&self, stream: StreamType) -> u32 {
        self.lock().stream_volume_index(stream)
    }

    /// See [`Engine::get_output`].
    pub fn get_output(&self, stream: StreamType, config: OutputConfig) -> Result<OutputHandle> {
        self.lock().get_output(stream, config)
    }

    /// See [`Engine::start_output`].
    pub fn start_output(&self, output: OutputHandle, stream: StreamType) -> Result<()> {
        self.lock().start_output(output, stream)
    }

    /// See [`Engine::stop_output`].
    pub fn stop_output(&self, output: OutputHandle, stream: StreamType) -> Result<()> {
        self.lock().stop_output(output, stream)
    }

    /// See [`Engine::release_output`].
    pub fn release_output(&self, output: OutputHandle) -> Result<()> {
        self.lock().release_output(output)
    }

    /// See [`Engine::get_input`].
    pub fn get_input(&self, source: InputSource, config: InputConfig) -> Result<InputHandle> {
        self.lock().get_input(source, config)
    }

    /// See [`Engine::start_input`].
    pub fn start_input(&self, input: InputHandle) -> Result<()> {
        self.lock().start_input(input)
    }

    /// See [`Engine::stop_input`].
    pub fn stop_input(&self, input: InputHandle) -> Result<()> {
        self.lock().stop_input(input)
    }

    /// See [`Engine::release_input`].
    pub fn release_input(&self, input: InputHandle) -> Result<()> {
        self.lock().release_input(input)
    }

    /// See [`Engine::dump`].
    pub fn dump(&self) -> String {
        self.lock().dump()
    }
}
