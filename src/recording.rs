//! Driver double recording every command the engine issues.
//!
//! [`RecordingClient`] implements [`PolicyClient`] without touching any hardware. Commands are
//! appended to a log shared with a [`Recorder`] handle, which stays usable after the client has
//! been moved into an engine. The handle can also make the next opens fail.
//!
//! ```
//! use policyflow::recording::{Command, RecordingClient};
//! use policyflow::{AudioPolicy, PolicyConfig};
//!
//! let client = RecordingClient::new();
//! let recorder = client.recorder();
//! let _policy = AudioPolicy::new(client, PolicyConfig::default()).unwrap();
//! assert!(matches!(recorder.commands()[0], Command::OpenOutput { .. }));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use policyflow_core::device::{
    AudioFormat, InputChannels, InputConfig, IoHandle, OpenedInput, OpenedOutput,
    OutputChannels, OutputConfig,
};
use policyflow_core::{
    ClientError, InputDevices, OutputDevices, Parameter, PolicyClient, StreamType, Tone,
};

/// Sample rate of outputs opened without an explicit request.
pub const DEFAULT_SAMPLING_RATE: u32 = 44100;
/// Latency reported for every output.
pub const DEFAULT_LATENCY_MS: u32 = 20;

/// One driver command, as received.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// [`PolicyClient::open_output`], with the handle handed out.
    OpenOutput {
        /// Handle handed out.
        io: IoHandle,
        /// Requested device.
        device: OutputDevices,
        /// Requested configuration.
        config: OutputConfig,
    },
    /// [`PolicyClient::open_duplicate_output`].
    OpenDuplicateOutput {
        /// Handle handed out.
        io: IoHandle,
        /// First mirrored output.
        first: IoHandle,
        /// Second mirrored output.
        second: IoHandle,
    },
    /// [`PolicyClient::close_output`].
    CloseOutput(IoHandle),
    /// [`PolicyClient::open_input`], with the handle handed out.
    OpenInput {
        /// Handle handed out.
        io: IoHandle,
        /// Requested device.
        device: InputDevices,
        /// Requested configuration.
        config: InputConfig,
    },
    /// [`PolicyClient::close_input`].
    CloseInput(IoHandle),
    /// [`PolicyClient::set_parameters`].
    SetParameters {
        /// Target output or input.
        io: IoHandle,
        /// Parameter sent.
        parameter: Parameter,
        /// Requested delay.
        delay_ms: u32,
    },
    /// [`PolicyClient::set_stream_volume`].
    SetStreamVolume {
        /// Stream type the gain applies to.
        stream: StreamType,
        /// Gain in `[0, 1]`.
        gain: f32,
        /// Target output.
        io: IoHandle,
        /// Requested delay.
        delay_ms: u32,
    },
    /// [`PolicyClient::set_voice_volume`].
    SetVoiceVolume {
        /// Gain in `[0, 1]`.
        gain: f32,
        /// Requested delay.
        delay_ms: u32,
    },
    /// [`PolicyClient::set_stream_output`].
    SetStreamOutput {
        /// Stream type moved.
        stream: StreamType,
        /// Destination output.
        io: IoHandle,
    },
    /// [`PolicyClient::suspend_output`].
    SuspendOutput(IoHandle),
    /// [`PolicyClient::restore_output`].
    RestoreOutput(IoHandle),
    /// [`PolicyClient::start_tone`].
    StartTone {
        /// Tone played.
        tone: Tone,
        /// Stream type the tone plays on.
        stream: StreamType,
    },
    /// [`PolicyClient::stop_tone`].
    StopTone,
}

#[derive(Debug, Default)]
struct Faults {
    reject_output: bool,
    reject_duplicate: bool,
    reject_input: bool,
    mismatch_output: bool,
    mismatch_input: bool,
}

#[derive(Debug, Default)]
struct Shared {
    commands: Vec<Command>,
    faults: Faults,
    next_io: u32,
}

impl Shared {
    fn allocate_io(&mut self) -> IoHandle {
        self.next_io += 1;
        IoHandle(self.next_io)
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle on the command log and fault switches of a [`RecordingClient`].
#[derive(Debug, Clone)]
pub struct Recorder {
    shared: Arc<Mutex<Shared>>,
}

impl Recorder {
    /// Copy of every command recorded so far.
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.shared).commands.clone()
    }

    /// Returns the recorded commands and clears the log.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut lock(&self.shared).commands)
    }

    /// Forgets every recorded command.
    pub fn clear(&self) {
        lock(&self.shared).commands.clear();
    }

    /// Makes the next output open fail.
    pub fn reject_next_output(&self) {
        lock(&self.shared).faults.reject_output = true;
    }

    /// Makes the next duplicated output open fail.
    pub fn reject_next_duplicate(&self) {
        lock(&self.shared).faults.reject_duplicate = true;
    }

    /// Makes the next input open fail.
    pub fn reject_next_input(&self) {
        lock(&self.shared).faults.reject_input = true;
    }

    /// Makes the next output open succeed with parameters other than the requested ones.
    pub fn mismatch_next_output(&self) {
        lock(&self.shared).faults.mismatch_output = true;
    }

    /// Makes the next input open succeed with parameters other than the requested ones.
    pub fn mismatch_next_input(&self) {
        lock(&self.shared).faults.mismatch_input = true;
    }
}

/// In-memory [`PolicyClient`]. Outputs are opened with the requested parameters, or
/// [`DEFAULT_SAMPLING_RATE`], 16 bit PCM and stereo where the request leaves them open.
#[derive(Debug, Default)]
pub struct RecordingClient {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingClient {
    /// Creates a client with an empty command log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle sharing this client's log.
    pub fn recorder(&self) -> Recorder {
        Recorder {
            shared: self.shared.clone(),
        }
    }

    fn record(&mut self, command: Command) -> Result<(), ClientError> {
        lock(&self.shared).commands.push(command);
        Ok(())
    }
}

fn other_rate(rate: u32) -> u32 {
    if rate == 8000 {
        16000
    } else {
        8000
    }
}

fn other_format(format: AudioFormat) -> AudioFormat {
    if format == AudioFormat::Pcm16Bit {
        AudioFormat::Pcm8Bit
    } else {
        AudioFormat::Pcm16Bit
    }
}

impl PolicyClient for RecordingClient {
    type Error = ClientError;

    fn open_output(
        &mut self,
        device: OutputDevices,
        config: &OutputConfig,
    ) -> Result<OpenedOutput, Self::Error> {
        let mut shared = lock(&self.shared);
        if std::mem::take(&mut shared.faults.reject_output) {
            return Err(ClientError::new(format!("output on {device} rejected")));
        }
        let io = shared.allocate_io();
        let mut opened = OpenedOutput {
            io,
            sampling_rate: config.sampling_rate.unwrap_or(DEFAULT_SAMPLING_RATE),
            format: config.format.unwrap_or(AudioFormat::Pcm16Bit),
            channels: config.channels.unwrap_or(OutputChannels::STEREO),
            latency_ms: DEFAULT_LATENCY_MS,
        };
        if std::mem::take(&mut shared.faults.mismatch_output) {
            opened.sampling_rate = other_rate(opened.sampling_rate);
            opened.format = other_format(opened.format);
            opened.channels = if opened.channels == OutputChannels::STEREO {
                OutputChannels::MONO
            } else {
                OutputChannels::STEREO
            };
        }
        shared.commands.push(Command::OpenOutput {
            io,
            device,
            config: *config,
        });
        Ok(opened)
    }

    fn open_duplicate_output(
        &mut self,
        first: IoHandle,
        second: IoHandle,
    ) -> Result<IoHandle, Self::Error> {
        let mut shared = lock(&self.shared);
        if std::mem::take(&mut shared.faults.reject_duplicate) {
            return Err(ClientError::new(format!(
                "duplicating {first} and {second} rejected"
            )));
        }
        let io = shared.allocate_io();
        shared.commands.push(Command::OpenDuplicateOutput { io, first, second });
        Ok(io)
    }

    fn close_output(&mut self, io: IoHandle) -> Result<(), Self::Error> {
        self.record(Command::CloseOutput(io))
    }

    fn open_input(
        &mut self,
        device: InputDevices,
        config: &InputConfig,
    ) -> Result<OpenedInput, Self::Error> {
        let mut shared = lock(&self.shared);
        if std::mem::take(&mut shared.faults.reject_input) {
            return Err(ClientError::new(format!("input on {device} rejected")));
        }
        let io = shared.allocate_io();
        let mut opened = OpenedInput {
            io,
            sampling_rate: config.sampling_rate,
            format: config.format,
            channels: config.channels,
        };
        if std::mem::take(&mut shared.faults.mismatch_input) {
            opened.sampling_rate = other_rate(opened.sampling_rate);
            opened.channels = if opened.channels == InputChannels::MONO {
                InputChannels::STEREO
            } else {
                InputChannels::MONO
            };
        }
        shared.commands.push(Command::OpenInput {
            io,
            device,
            config: *config,
        });
        Ok(opened)
    }

    fn close_input(&mut self, io: IoHandle) -> Result<(), Self::Error> {
        self.record(Command::CloseInput(io))
    }

    fn set_parameters(
        &mut self,
        io: IoHandle,
        parameter: &Parameter,
        delay_ms: u32,
    ) -> Result<(), Self::Error> {
        self.record(Command::SetParameters {
            io,
            parameter: parameter.clone(),
            delay_ms,
        })
    }

    fn set_stream_volume(
        &mut self,
        stream: StreamType,
        gain: f32,
        io: IoHandle,
        delay_ms: u32,
    ) -> Result<(), Self::Error> {
        self.record(Command::SetStreamVolume {
            stream,
            gain,
            io,
            delay_ms,
        })
    }

    fn set_voice_volume(&mut self, gain: f32, delay_ms: u32) -> Result<(), Self::Error> {
        self.record(Command::SetVoiceVolume { gain, delay_ms })
    }

    fn set_stream_output(&mut self, stream: StreamType, io: IoHandle) -> Result<(), Self::Error> {
        self.record(Command::SetStreamOutput { stream, io })
    }

    fn suspend_output(&mut self, io: IoHandle) -> Result<(), Self::Error> {
        self.record(Command::SuspendOutput(io))
    }

    fn restore_output(&mut self, io: IoHandle) -> Result<(), Self::Error> {
        self.record(Command::RestoreOutput(io))
    }

    fn start_tone(&mut self, tone: Tone, stream: StreamType) -> Result<(), Self::Error> {
        self.record(Command::StartTone { tone, stream })
    }

    fn stop_tone(&mut self) -> Result<(), Self::Error> {
        self.record(Command::StopTone)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_opens_with_defaults() {
        let mut client = RecordingClient::new();
        let recorder = client.recorder();
        let opened = client
            .open_output(OutputDevices::SPEAKER, &OutputConfig::default())
            .unwrap();
        assert_eq!(DEFAULT_SAMPLING_RATE, opened.sampling_rate);
        assert_eq!(OutputChannels::STEREO, opened.channels);
        assert_eq!(1, recorder.commands().len());
        assert_eq!(1, recorder.take().len());
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn test_faults_apply_once() {
        let mut client = RecordingClient::new();
        let recorder = client.recorder();
        recorder.reject_next_output();
        assert!(client
            .open_output(OutputDevices::SPEAKER, &OutputConfig::default())
            .is_err());
        assert!(client
            .open_output(OutputDevices::SPEAKER, &OutputConfig::default())
            .is_ok());

        let config = InputConfig {
            sampling_rate: 8000,
            format: AudioFormat::Pcm16Bit,
            channels: InputChannels::MONO,
        };
        recorder.mismatch_next_input();
        let opened = client.open_input(InputDevices::BUILTIN_MIC, &config).unwrap();
        assert!(!config.is_satisfied_by(&opened));
        let opened = client.open_input(InputDevices::BUILTIN_MIC, &config).unwrap();
        assert!(config.is_satisfied_by(&opened));
        assert_ne!(IoHandle(0), opened.io);
    }
}
