use policyflow_core::device::{
    InputConfig, IoHandle, OpenedInput, OpenedOutput, OutputConfig,
};
use policyflow_core::{InputDevices, OutputDevices, Parameter, PolicyClient, StreamType, Tone};

use crate::codec::encode;

/// Driver speaking the string parameter protocol. Everything but parameters is typed, as in
/// [`PolicyClient`].
pub trait ParameterDriver {
    type Error: std::error::Error + Send + Sync + 'static;

    fn open_output(
        &mut self,
        device: OutputDevices,
        config: &OutputConfig,
    ) -> Result<OpenedOutput, Self::Error>;

    fn open_duplicate_output(
        &mut self,
        first: IoHandle,
        second: IoHandle,
    ) -> Result<IoHandle, Self::Error>;

    fn close_output(&mut self, io: IoHandle) -> Result<(), Self::Error>;

    fn open_input(
        &mut self,
        device: InputDevices,
        config: &InputConfig,
    ) -> Result<OpenedInput, Self::Error>;

    fn close_input(&mut self, io: IoHandle) -> Result<(), Self::Error>;

    /// Receives `key=value;key=value` pairs for handle `io`.
    fn set_parameters(
        &mut self,
        io: IoHandle,
        key_values: &str,
        delay_ms: u32,
    ) -> Result<(), Self::Error>;

    fn set_stream_volume(
        &mut self,
        stream: StreamType,
        gain: f32,
        io: IoHandle,
        delay_ms: u32,
    ) -> Result<(), Self::Error>;

    fn set_voice_volume(&mut self, gain: f32, delay_ms: u32) -> Result<(), Self::Error>;

    fn set_stream_output(&mut self, stream: StreamType, io: IoHandle) -> Result<(), Self::Error>;

    fn suspend_output(&mut self, io: IoHandle) -> Result<(), Self::Error>;

    fn restore_output(&mut self, io: IoHandle) -> Result<(), Self::Error>;

    fn start_tone(&mut self, tone: Tone, stream: StreamType) -> Result<(), Self::Error>;

    fn stop_tone(&mut self) -> Result<(), Self::Error>;
}

/// [`PolicyClient`] over a [`ParameterDriver`], encoding typed parameters on the way out.
#[derive(Debug, Default)]
pub struct ParameterClient<D> {
    driver: D,
}

impl<D: ParameterDriver> ParameterClient<D> {
    /// Wraps `driver`.
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the wrapped driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Unwraps the driver.
    pub fn into_inner(self) -> D {
        self.driver
    }
}

impl<D: ParameterDriver> PolicyClient for ParameterClient<D> {
    type Error = D::Error;

    fn open_output(
        &mut self,
        device: OutputDevices,
        config: &OutputConfig,
    ) -> Result<OpenedOutput, Self::Error> {
        self.driver.open_output(device, config)
    }

    fn open_duplicate_output(
        &mut self,
        first: IoHandle,
        second: IoHandle,
    ) -> Result<IoHandle, Self::Error> {
        self.driver.open_duplicate_output(first, second)
    }

    fn close_output(&mut self, io: IoHandle) -> Result<(), Self::Error> {
        self.driver.close_output(io)
    }

    fn open_input(
        &mut self,
        device: InputDevices,
        config: &InputConfig,
    ) -> Result<OpenedInput, Self::Error> {
        self.driver.open_input(device, config)
    }

    fn close_input(&mut self, io: IoHandle) -> Result<(), Self::Error> {
        self.driver.close_input(io)
    }

    fn set_parameters(
        &mut self,
        io: IoHandle,
        parameter: &Parameter,
        delay_ms: u32,
    ) -> Result<(), Self::Error> {
        let key_values = encode(parameter);
        log::trace!(io = io.0, delay_ms; "Sending parameters {key_values:?}");
        self.driver.set_parameters(io, &key_values, delay_ms)
    }

    fn set_stream_volume(
        &mut self,
        stream: StreamType,
        gain: f32,
        io: IoHandle,
        delay_ms: u32,
    ) -> Result<(), Self::Error> {
        self.driver.set_stream_volume(stream, gain, io, delay_ms)
    }

    fn set_voice_volume(&mut self, gain: f32, delay_ms: u32) -> Result<(), Self::Error> {
        self.driver.set_voice_volume(gain, delay_ms)
    }

    fn set_stream_output(&mut self, stream: StreamType, io: IoHandle) -> Result<(), Self::Error> {
        self.driver.set_stream_output(stream, io)
    }

    fn suspend_output(&mut self, io: IoHandle) -> Result<(), Self::Error> {
        self.driver.suspend_output(io)
    }

    fn restore_output(&mut self, io: IoHandle) -> Result<(), Self::Error> {
        self.driver.restore_output(io)
    }

    fn start_tone(&mut self, tone: Tone, stream: StreamType) -> Result<(), Self::Error> {
        self.driver.start_tone(tone, stream)
    }

    fn stop_tone(&mut self) -> Result<(), Self::Error> {
        self.driver.stop_tone()
    }
}
