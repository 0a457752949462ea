mod common;

use std::time::Duration;

use common::*;
use policyflow::recording::{Command, RecordingClient};
use policyflow::volume::{linear_to_log, volume_percent};
use policyflow::{
    AudioPolicy, ForceUse, ForcedConfig, OutputDevices, PolicyConfig, PolicyError, StreamType,
    StreamVolumeConfig,
};

fn ranged(index_max: u32, index_cur: u32) -> StreamVolumeConfig {
    StreamVolumeConfig {
        index_min: 0,
        index_max,
        index_cur,
        can_be_muted: true,
    }
}

fn headset_config() -> PolicyConfig {
    PolicyConfig::default()
        .with_stream(StreamType::Music, ranged(10, 5))
        .with_stream(StreamType::Ring, ranged(10, 10))
}

fn ring_gain(policy: &Policy) -> f32 {
    policy.with_engine(|engine| {
        engine.compute_gain(
            StreamType::Ring,
            10,
            engine.primary_output(),
            OutputDevices::WIRED_HEADSET,
        )
    })
}

#[test]
fn test_sonification_on_headset_follows_music() {
    let (policy, _recorder, clock) = policy_with_clock(headset_config());
    clock.set(Duration::from_secs(1));
    policy
        .set_device_connection(OutputDevices::WIRED_HEADSET.into(), true, "")
        .unwrap();
    assert!((ring_gain(&policy) - 0.5).abs() < 1e-6);

    let output = primary(&policy);
    policy.start_output(output, StreamType::Music).unwrap();
    let music = linear_to_log(50, 0.5);
    assert!(ring_gain(&policy) <= music.max(0.016) + 1e-6);
    assert!((ring_gain(&policy) - music).abs() < 1e-6);

    policy.set_stream_volume_index(StreamType::Music, 0).unwrap();
    assert!((ring_gain(&policy) - 0.016).abs() < 1e-6);
    policy.set_stream_volume_index(StreamType::Music, 5).unwrap();

    policy.stop_output(output, StreamType::Music).unwrap();
    clock.advance(Duration::from_secs(4));
    assert!((ring_gain(&policy) - music).abs() < 1e-6);
    clock.advance(Duration::from_secs(2));
    assert!((ring_gain(&policy) - 0.5).abs() < 1e-6);
}

#[test]
fn test_speaker_gain_is_not_attenuated() {
    let (policy, _recorder) = policy(headset_config());
    let gain = policy.with_engine(|engine| {
        engine.compute_gain(
            StreamType::Ring,
            10,
            engine.primary_output(),
            OutputDevices::empty(),
        )
    });
    assert!((gain - 1.0).abs() < 1e-6);
}

#[test]
fn test_index_is_pushed_to_outputs() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let io = io_of(&policy, primary(&policy));
    policy.init_stream_volume(StreamType::Music, 0, 15).unwrap();
    recorder.clear();

    policy.set_stream_volume_index(StreamType::Music, 7).unwrap();
    assert_eq!(7, policy.stream_volume_index(StreamType::Music));
    let expected = linear_to_log(volume_percent(7, 0, 15), 0.5);
    let commands = recorder.take();
    assert!(commands.iter().any(|command| matches!(
        command,
        Command::SetStreamVolume { stream: StreamType::Music, gain, io: pushed, .. }
            if *pushed == io && (gain - expected).abs() < 1e-6
    )));

    // Unchanged gains are not pushed again.
    policy.set_stream_volume_index(StreamType::Music, 7).unwrap();
    assert!(recorder.take().is_empty());
}

#[test]
fn test_invalid_indices() {
    let (policy, _recorder) = policy(PolicyConfig::default());
    assert!(matches!(
        policy.set_stream_volume_index(StreamType::Music, 2),
        Err(PolicyError::InvalidArgument(_))
    ));
    assert!(matches!(
        policy.init_stream_volume(StreamType::Music, 5, 5),
        Err(PolicyError::InvalidArgument(_))
    ));
    assert_eq!(1, policy.stream_volume_index(StreamType::Music));
}

#[test]
fn test_empty_configured_range_is_rejected() {
    init_logging();
    for volume in [ranged(0, 0), StreamVolumeConfig { index_min: 4, ..ranged(2, 2) }] {
        let client = RecordingClient::new();
        let recorder = client.recorder();
        let config = PolicyConfig::default().with_stream(StreamType::VoiceCall, volume);
        assert!(matches!(
            AudioPolicy::new(client, config),
            Err(PolicyError::InvalidArgument(_))
        ));
        assert!(recorder.commands().is_empty());
    }
}

#[test]
fn test_range_change_clamps_index() {
    let (policy, _recorder) = policy(PolicyConfig::default().with_stream(StreamType::Alarm, ranged(7, 7)));
    policy.init_stream_volume(StreamType::Alarm, 1, 4).unwrap();
    assert_eq!(4, policy.stream_volume_index(StreamType::Alarm));
}

#[test]
fn test_unmutable_stream_stays_at_max() {
    let config = PolicyConfig::default().with_stream(
        StreamType::EnforcedAudible,
        StreamVolumeConfig {
            can_be_muted: false,
            ..ranged(7, 7)
        },
    );
    let (policy, _recorder) = policy(config);
    policy
        .set_stream_volume_index(StreamType::EnforcedAudible, 0)
        .unwrap();
    assert_eq!(7, policy.stream_volume_index(StreamType::EnforcedAudible));
}

#[test]
fn test_voice_call_path_never_silent() {
    let (policy, recorder) = policy(PolicyConfig::default());
    let io = io_of(&policy, primary(&policy));
    recorder.clear();
    policy.set_stream_volume_index(StreamType::VoiceCall, 0).unwrap();
    let commands = recorder.take();
    assert!(commands.contains(&Command::SetVoiceVolume {
        gain: 0.0,
        delay_ms: 0,
    }));
    assert!(commands.iter().any(|command| matches!(
        command,
        Command::SetStreamVolume { stream: StreamType::VoiceCall, gain, io: pushed, .. }
            if *pushed == io && (gain - 0.01).abs() < 1e-6
    )));
}

#[test]
fn test_sco_owns_call_gain_when_forced() {
    let (policy, recorder) = policy(PolicyConfig::default());
    policy
        .set_force_use(ForceUse::Communication, ForcedConfig::BtSco)
        .unwrap();
    recorder.clear();

    policy.set_stream_volume_index(StreamType::VoiceCall, 0).unwrap();
    assert!(recorder.take().is_empty());

    policy
        .set_stream_volume_index(StreamType::BluetoothSco, 0)
        .unwrap();
    assert!(recorder.take().contains(&Command::SetVoiceVolume {
        gain: 1.0,
        delay_ms: 0,
    }));
}

#[test]
fn test_muted_stream_keeps_index() {
    let (policy, recorder) = policy(PolicyConfig::default().with_stream(StreamType::Ring, ranged(7, 3)));
    policy
        .set_device_connection(OutputDevices::WIRED_HEADSET.into(), true, "")
        .unwrap();
    let output = primary(&policy);
    // The combined route mutes media on the primary output.
    policy.start_output(output, StreamType::Ring).unwrap();
    assert_eq!(1, policy.with_engine(|engine| engine.mute_count(StreamType::Music)));
    recorder.clear();

    policy.set_stream_volume_index(StreamType::Music, 0).unwrap();
    assert_eq!(0, policy.stream_volume_index(StreamType::Music));
    assert!(!recorder.take().iter().any(|command| matches!(
        command,
        Command::SetStreamVolume {
            stream: StreamType::Music,
            ..
        }
    )));
}
