mod common;

use common::*;
use policyflow::device::OutputConfig;
use policyflow::recording::Command;
use policyflow::{
    ForceUse, ForcedConfig, OutputDevices, PhoneState, PolicyConfig, StreamType, Tone,
};

fn is_tone(command: &Command) -> bool {
    matches!(command, Command::StartTone { .. })
}

#[test]
fn test_low_visibility_ring_is_muted_in_call() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let output = policy
        .get_output(StreamType::Ring, OutputConfig::default())
        .unwrap();
    policy.start_output(output, StreamType::Ring).unwrap();
    let io = io_of(&policy, output);
    recorder.clear();

    policy.set_phone_state(PhoneState::InCall);
    let commands = recorder.take();
    assert_eq!(1, policy.with_engine(|engine| engine.mute_count(StreamType::Ring)));
    assert_eq!(0, count(&commands, is_tone));
    assert_eq!(vec![(io, OutputDevices::EARPIECE)], routes(&commands));

    policy.set_phone_state(PhoneState::Normal);
    let commands = recorder.take();
    assert_eq!(0, policy.with_engine(|engine| engine.mute_count(StreamType::Ring)));
    assert_eq!(vec![(io, OutputDevices::SPEAKER)], routes(&commands));
    assert_eq!(0, policy.with_engine(|engine| engine.inconsistencies()));
}

#[test]
fn test_same_state_is_noop() {
    let (policy, recorder) = policy(PolicyConfig::default());
    recorder.clear();
    policy.set_phone_state(PhoneState::Normal);
    assert!(recorder.commands().is_empty());
}

#[test]
fn test_call_is_always_routed() {
    let (policy, recorder) = policy(PolicyConfig::default().with_primary_device(OutputDevices::EARPIECE));
    let io = io_of(&policy, primary(&policy));
    recorder.clear();
    policy.set_phone_state(PhoneState::InCall);
    assert_eq!(vec![(io, OutputDevices::EARPIECE)], routes(&recorder.take()));
    policy.set_phone_state(PhoneState::Normal);
    assert_eq!(vec![(io, OutputDevices::EARPIECE)], routes(&recorder.take()));
}

#[test]
fn test_high_visibility_ring_plays_a_tone() {
    let config = PolicyConfig::default().with_low_visibility(|stream| stream != StreamType::Ring);
    let (policy, recorder) = policy(config);
    policy
        .set_device_connection(OutputDevices::WIRED_HEADSET.into(), true, "")
        .unwrap();
    let output = primary(&policy);
    policy.start_output(output, StreamType::Ring).unwrap();
    assert_eq!(
        OutputDevices::SPEAKER_AND_HEADSET,
        policy.with_engine(|engine| engine.device_of(output))
    );
    recorder.clear();

    // The ring shares the headset with the call, so it is muted as well.
    policy.set_phone_state(PhoneState::InCall);
    let commands = recorder.take();
    assert!(commands.contains(&Command::StartTone {
        tone: Tone::CallWaiting,
        stream: StreamType::VoiceCall,
    }));
    assert_eq!(1, policy.with_engine(|engine| engine.mute_count(StreamType::Ring)));
    assert_eq!(
        OutputDevices::WIRED_HEADSET,
        policy.with_engine(|engine| engine.device_of(output))
    );

    policy.stop_output(output, StreamType::Ring).unwrap();
    assert!(recorder.take().contains(&Command::StopTone));
    policy.with_engine(|engine| {
        assert_eq!(0, engine.mute_count(StreamType::Ring));
        assert_eq!(0, engine.inconsistencies());
    });
}

#[test]
fn test_sonification_started_in_call() {
    let (policy, recorder) = policy(PolicyConfig::default());
    policy.set_phone_state(PhoneState::InCall);
    let output = policy
        .get_output(StreamType::Notification, OutputConfig::default())
        .unwrap();
    policy.start_output(output, StreamType::Notification).unwrap();
    policy.start_output(output, StreamType::Notification).unwrap();
    assert_eq!(
        2,
        policy.with_engine(|engine| engine.mute_count(StreamType::Notification))
    );

    policy.stop_output(output, StreamType::Notification).unwrap();
    assert_eq!(
        1,
        policy.with_engine(|engine| engine.mute_count(StreamType::Notification))
    );
    // Leaving the call unmutes every remaining track at once.
    policy.set_phone_state(PhoneState::Normal);
    assert_eq!(
        0,
        policy.with_engine(|engine| engine.mute_count(StreamType::Notification))
    );
    assert_eq!(0, count(&recorder.commands(), is_tone));
}

#[test]
fn test_forced_speaker_during_call() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let io = io_of(&policy, primary(&policy));
    policy.set_phone_state(PhoneState::InCall);
    recorder.clear();

    policy
        .set_force_use(ForceUse::Communication, ForcedConfig::Speaker)
        .unwrap();
    assert_eq!(vec![(io, OutputDevices::SPEAKER)], routes(&recorder.take()));
    assert_eq!(
        ForcedConfig::Speaker,
        policy.force_use(ForceUse::Communication)
    );

    policy
        .set_force_use(ForceUse::Communication, ForcedConfig::None)
        .unwrap();
    assert_eq!(vec![(io, OutputDevices::EARPIECE)], routes(&recorder.take()));
}

#[test]
fn test_forced_speaker_outside_call_waits() {
    let (policy, recorder) = policy(PolicyConfig::default());
    recorder.clear();
    policy
        .set_force_use(ForceUse::Communication, ForcedConfig::Speaker)
        .unwrap();
    assert!(routes(&recorder.take()).is_empty());
}

#[test]
fn test_call_overrides_media_routing() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let output = primary(&policy);
    let io = io_of(&policy, output);
    policy.start_output(output, StreamType::Music).unwrap();
    recorder.clear();

    policy.set_phone_state(PhoneState::InCall);
    assert_eq!(vec![(io, OutputDevices::EARPIECE)], routes(&recorder.take()));
    policy.set_phone_state(PhoneState::Normal);
    assert_eq!(vec![(io, OutputDevices::SPEAKER)], routes(&recorder.take()));
}

#[test]
fn test_ringtone_volume_limited_while_music_plays() {
    let (policy, _recorder) = policy(PolicyConfig::default());
    let output = primary(&policy);
    policy.start_output(output, StreamType::Music).unwrap();
    policy.set_phone_state(PhoneState::Ringtone);
    assert!(policy.with_engine(|engine| engine.is_ringtone_volume_limited()));
    policy.set_phone_state(PhoneState::Normal);
    assert!(!policy.with_engine(|engine| engine.is_ringtone_volume_limited()));
}

#[test]
fn test_ringtone_volume_not_limited_in_silence() {
    let (policy, _recorder) = policy(PolicyConfig::default());
    policy.set_phone_state(PhoneState::Ringtone);
    assert!(!policy.with_engine(|engine| engine.is_ringtone_volume_limited()));
    assert_eq!(PhoneState::Ringtone, policy.phone_state());
}
