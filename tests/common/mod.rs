#![allow(dead_code)]

use std::sync::Arc;

use policyflow::clock::ManualClock;
use policyflow::device::IoHandle;
use policyflow::recording::{Command, Recorder, RecordingClient};
use policyflow::{AudioPolicy, InputDevices, OutputDevices, OutputHandle, Parameter, PolicyConfig};

pub type Policy = AudioPolicy<RecordingClient>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn policy(config: PolicyConfig) -> (Policy, Recorder) {
    init_logging();
    let client = RecordingClient::new();
    let recorder = client.recorder();
    let policy = AudioPolicy::new(client, config).expect("primary output opens");
    (policy, recorder)
}

pub fn policy_with_clock(config: PolicyConfig) -> (Policy, Recorder, ManualClock) {
    init_logging();
    let clock = ManualClock::new();
    let client = RecordingClient::new();
    let recorder = client.recorder();
    let policy = AudioPolicy::with_clock(client, config, Arc::new(clock.clone()))
        .expect("primary output opens");
    (policy, recorder, clock)
}

pub fn primary(policy: &Policy) -> OutputHandle {
    policy.with_engine(|engine| engine.primary_output())
}

pub fn io_of(policy: &Policy, handle: OutputHandle) -> IoHandle {
    policy
        .with_engine(|engine| engine.outputs().get(handle).map(|output| output.io()))
        .expect("output is open")
}

/// Output routing commands, in order.
pub fn routes(commands: &[Command]) -> Vec<(IoHandle, OutputDevices)> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::SetParameters {
                io,
                parameter: Parameter::Routing(device),
                ..
            } => Some((*io, *device)),
            _ => None,
        })
        .collect()
}

/// Input routing commands, in order.
pub fn input_routes(commands: &[Command]) -> Vec<(IoHandle, InputDevices)> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::SetParameters {
                io,
                parameter: Parameter::InputRouting(device),
                ..
            } => Some((*io, *device)),
            _ => None,
        })
        .collect()
}

pub fn count(commands: &[Command], predicate: impl Fn(&Command) -> bool) -> usize {
    commands.iter().filter(|command| predicate(command)).count()
}
