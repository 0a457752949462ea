use std::fmt;

use crate::device::{InputConfig, InputSource, IoHandle, OpenedInput, OpenedOutput, OutputConfig};
use crate::policy::Tone;
use crate::{InputDevices, OutputDevices, StreamType};

/// Typed driver parameter. String encodings only exist at the driver boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// Render the output to this device set.
    Routing(OutputDevices),
    /// Capture the input from this device set. An empty set stops capture routing.
    InputRouting(InputDevices),
    /// Capture use case the input is tuned for.
    InputSource(InputSource),
    /// Address of the bluetooth A2DP sink the output talks to.
    A2dpSinkAddress(String),
    /// The output is about to be closed.
    Closing,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Routing(device) => write!(f, "routing {device}"),
            Self::InputRouting(device) => write!(f, "input routing {device}"),
            Self::InputSource(source) => write!(f, "input source {source:?}"),
            Self::A2dpSinkAddress(address) => write!(f, "a2dp sink address {address:?}"),
            Self::Closing => f.write_str("closing"),
        }
    }
}

/// Driver collaborator receiving every command the policy engine issues.
///
/// Commands carrying a `delay_ms` are requests for the driver to apply them later. The engine
/// never waits for them.
pub trait PolicyClient {
    /// Error reported by the driver.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a mixed or direct output rendering to `device`. The driver may resolve `None`
    /// configuration fields freely.
    fn open_output(
        &mut self,
        device: OutputDevices,
        config: &OutputConfig,
    ) -> Result<OpenedOutput, Self::Error>;

    /// Opens an output mirroring everything written to it onto both `first` and `second`.
    fn open_duplicate_output(
        &mut self,
        first: IoHandle,
        second: IoHandle,
    ) -> Result<IoHandle, Self::Error>;

    /// Closes an output opened by this driver.
    fn close_output(&mut self, io: IoHandle) -> Result<(), Self::Error>;

    /// Opens an input. The engine rejects inputs not opened with the exact requested parameters.
    fn open_input(
        &mut self,
        device: InputDevices,
        config: &InputConfig,
    ) -> Result<OpenedInput, Self::Error>;

    /// Closes an input opened by this driver.
    fn close_input(&mut self, io: IoHandle) -> Result<(), Self::Error>;

    /// Sends `parameter` to output or input `io`.
    fn set_parameters(
        &mut self,
        io: IoHandle,
        parameter: &Parameter,
        delay_ms: u32,
    ) -> Result<(), Self::Error>;

    /// Sets the gain, in `[0, 1]`, of every track of `stream` on output `io`.
    fn set_stream_volume(
        &mut self,
        stream: StreamType,
        gain: f32,
        io: IoHandle,
        delay_ms: u32,
    ) -> Result<(), Self::Error>;

    /// Sets the gain, in `[0, 1]`, of the call audio path.
    fn set_voice_volume(&mut self, gain: f32, delay_ms: u32) -> Result<(), Self::Error>;

    /// Moves every track of `stream` to output `io`.
    fn set_stream_output(&mut self, stream: StreamType, io: IoHandle) -> Result<(), Self::Error>;

    /// Stops output `io` from rendering, keeping it open.
    fn suspend_output(&mut self, io: IoHandle) -> Result<(), Self::Error>;

    /// Resumes an output suspended by [`Self::suspend_output`].
    fn restore_output(&mut self, io: IoHandle) -> Result<(), Self::Error>;

    /// Starts playing `tone` on `stream`.
    fn start_tone(&mut self, tone: Tone, stream: StreamType) -> Result<(), Self::Error>;

    /// Stops the tone started last.
    fn stop_tone(&mut self) -> Result<(), Self::Error>;
}

/// Generic driver error carrying a message, for drivers with no richer error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Driver error: {0}")]
pub struct ClientError(pub String);

impl ClientError {
    /// Creates an error carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
