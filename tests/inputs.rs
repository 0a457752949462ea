mod common;

use common::*;
use policyflow::device::{AudioFormat, InputChannels, InputConfig, InputSource, IoHandle};
use policyflow::recording::Command;
use policyflow::{
    ForceUse, ForcedConfig, InputDevices, InputHandle, OutputDevices, Parameter, PolicyConfig,
    PolicyError,
};

fn voice_config() -> InputConfig {
    InputConfig {
        sampling_rate: 8000,
        format: AudioFormat::Pcm16Bit,
        channels: InputChannels::MONO,
    }
}

fn input_io(policy: &Policy, handle: InputHandle) -> IoHandle {
    policy
        .with_engine(|engine| engine.inputs().get(handle).map(|input| input.io()))
        .expect("input is open")
}

fn input_device(policy: &Policy, handle: InputHandle) -> InputDevices {
    policy
        .with_engine(|engine| engine.inputs().get(handle).map(|input| input.device()))
        .expect("input is open")
}

fn announced_sources(commands: &[Command]) -> Vec<(IoHandle, InputSource)> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::SetParameters {
                io,
                parameter: Parameter::InputSource(source),
                ..
            } => Some((*io, *source)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_single_active_input() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let mic = policy.get_input(InputSource::Mic, voice_config()).unwrap();
    let camcorder = policy
        .get_input(InputSource::Camcorder, voice_config())
        .unwrap();
    let io = input_io(&policy, mic);
    recorder.clear();

    policy.start_input(mic).unwrap();
    assert_eq!(
        vec![(io, InputDevices::BUILTIN_MIC)],
        input_routes(&recorder.take())
    );
    assert_eq!(Err(PolicyError::Busy), policy.start_input(camcorder));

    policy.stop_input(mic).unwrap();
    assert_eq!(
        vec![(io, InputDevices::empty())],
        input_routes(&recorder.take())
    );
    policy.start_input(camcorder).unwrap();
    policy.stop_input(camcorder).unwrap();
    assert_eq!(0, policy.with_engine(|engine| engine.inconsistencies()));
}

#[test]
fn test_start_announces_capture_use_case() {
    let (policy, recorder) = policy(PolicyConfig::default());
    for (source, announced) in [
        (InputSource::VoiceRecognition, Some(InputSource::VoiceRecognition)),
        (InputSource::Camcorder, Some(InputSource::Camcorder)),
        (InputSource::Mic, Some(InputSource::Default)),
        (InputSource::VoiceCall, None),
    ] {
        let input = policy.get_input(source, voice_config()).unwrap();
        let io = input_io(&policy, input);
        recorder.clear();

        policy.start_input(input).unwrap();
        let commands = recorder.take();
        assert_eq!(
            announced.map(|announced| (io, announced)).into_iter().collect::<Vec<_>>(),
            announced_sources(&commands)
        );
        // The use case follows the routing.
        if announced.is_some() {
            assert!(matches!(
                commands.as_slice(),
                [
                    Command::SetParameters {
                        parameter: Parameter::InputRouting(_),
                        ..
                    },
                    Command::SetParameters {
                        parameter: Parameter::InputSource(_),
                        ..
                    }
                ]
            ));
        }

        policy.stop_input(input).unwrap();
        assert!(announced_sources(&recorder.take()).is_empty());
        policy.release_input(input).unwrap();
    }
}

#[test]
fn test_stopping_twice_is_recovered() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let mic = policy.get_input(InputSource::Mic, voice_config()).unwrap();
    policy.start_input(mic).unwrap();
    policy.stop_input(mic).unwrap();
    recorder.clear();
    policy.stop_input(mic).unwrap();
    assert!(recorder.commands().is_empty());
    assert_eq!(1, policy.with_engine(|engine| engine.inconsistencies()));
}

#[test]
fn test_release_closes_input() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let mic = policy.get_input(InputSource::Mic, voice_config()).unwrap();
    let io = input_io(&policy, mic);
    policy.release_input(mic).unwrap();
    assert!(recorder.commands().contains(&Command::CloseInput(io)));
    assert_eq!(Err(PolicyError::NotFound), policy.release_input(mic));
    assert_eq!(Err(PolicyError::NotFound), policy.start_input(mic));
    assert_eq!(Err(PolicyError::NotFound), policy.stop_input(mic));
}

#[test]
fn test_voice_sources_capture_call_channels() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let call = policy
        .get_input(InputSource::VoiceCall, voice_config())
        .unwrap();
    assert_eq!(InputDevices::VOICE_CALL, input_device(&policy, call));
    assert!(recorder.commands().iter().any(|command| matches!(
        command,
        Command::OpenInput { config, .. }
            if config.channels == InputChannels::VOICE_UPLINK | InputChannels::VOICE_DNLINK
    )));
}

#[test]
fn test_mismatched_input_is_closed() {
    let (policy, recorder) = policy(PolicyConfig::default());
    recorder.mismatch_next_input();
    assert!(matches!(
        policy.get_input(InputSource::Mic, voice_config()),
        Err(PolicyError::Unavailable { .. })
    ));
    assert!(matches!(
        recorder.commands().last(),
        Some(Command::CloseInput(_))
    ));
    assert!(policy.with_engine(|engine| engine.inputs().is_empty()));

    recorder.reject_next_input();
    assert!(matches!(
        policy.get_input(InputSource::Mic, voice_config()),
        Err(PolicyError::Unavailable { .. })
    ));
}

#[test]
fn test_active_input_follows_headset() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let mic = policy.get_input(InputSource::Mic, voice_config()).unwrap();
    let io = input_io(&policy, mic);
    policy.start_input(mic).unwrap();
    recorder.clear();

    policy
        .set_device_connection(OutputDevices::WIRED_HEADSET.into(), true, "")
        .unwrap();
    assert!(policy.is_device_connected(InputDevices::WIRED_HEADSET.into(), ""));
    assert_eq!(
        vec![(io, InputDevices::WIRED_HEADSET)],
        input_routes(&recorder.take())
    );
    assert_eq!(InputDevices::WIRED_HEADSET, input_device(&policy, mic));

    policy
        .set_device_connection(OutputDevices::WIRED_HEADSET.into(), false, "")
        .unwrap();
    assert_eq!(
        vec![(io, InputDevices::BUILTIN_MIC)],
        input_routes(&recorder.take())
    );
}

#[test]
fn test_forced_record_route() {
    let (policy, recorder) = policy(PolicyConfig::default());
    policy
        .set_device_connection(OutputDevices::BLUETOOTH_SCO_HEADSET.into(), true, "")
        .unwrap();
    let mic = policy.get_input(InputSource::Mic, voice_config()).unwrap();
    let io = input_io(&policy, mic);
    policy.start_input(mic).unwrap();
    assert_eq!(InputDevices::BUILTIN_MIC, input_device(&policy, mic));
    recorder.clear();

    policy
        .set_force_use(ForceUse::Record, ForcedConfig::BtSco)
        .unwrap();
    assert_eq!(
        vec![(io, InputDevices::BLUETOOTH_SCO_HEADSET)],
        input_routes(&recorder.take())
    );
}

#[test]
fn test_input_device_events() {
    let (policy, _recorder) = policy(PolicyConfig::default());
    policy
        .set_device_connection(InputDevices::BACK_MIC.into(), true, "")
        .unwrap();
    assert!(policy.is_device_connected(InputDevices::BACK_MIC.into(), ""));
    assert!(matches!(
        policy.set_device_connection(InputDevices::BACK_MIC.into(), true, ""),
        Err(PolicyError::AlreadyConnected(_))
    ));
    policy
        .set_device_connection(InputDevices::BACK_MIC.into(), false, "")
        .unwrap();
    assert!(matches!(
        policy.set_device_connection(InputDevices::BACK_MIC.into(), false, ""),
        Err(PolicyError::NotConnected(_))
    ));
}
