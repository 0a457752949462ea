use anyhow::Result;
use policyflow::prelude::*;
use policyflow::recording::{Command, Recorder, RecordingClient};

fn print_commands(step: &str, recorder: &Recorder) {
    println!("== {step}");
    for command in recorder.take() {
        match command {
            Command::SetParameters {
                io,
                parameter,
                delay_ms,
            } => println!(
                "\t{io}: {} (after {delay_ms} ms)",
                policyflow_params::encode(&parameter)
            ),
            command => println!("\t{command:?}"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let client = RecordingClient::new();
    let recorder = client.recorder();
    let policy = AudioPolicy::new(client, PolicyConfig::default())?;
    print_commands("startup", &recorder);

    let music = policy.get_output(StreamType::Music, OutputConfig::default())?;
    policy.start_output(music, StreamType::Music)?;
    print_commands("music starts", &recorder);

    policy.set_device_connection(OutputDevices::WIRED_HEADSET.into(), true, "")?;
    print_commands("wired headset plugged", &recorder);

    let ring = policy.get_output(StreamType::Ring, OutputConfig::default())?;
    policy.start_output(ring, StreamType::Ring)?;
    print_commands("ring starts", &recorder);

    policy.set_phone_state(PhoneState::InCall);
    print_commands("call answered", &recorder);
    policy.stop_output(ring, StreamType::Ring)?;
    policy.set_phone_state(PhoneState::Normal);
    print_commands("call ended", &recorder);

    policy.set_device_connection(OutputDevices::WIRED_HEADSET.into(), false, "")?;
    policy.stop_output(music, StreamType::Music)?;
    print_commands("wired headset unplugged", &recorder);

    let address = "00:1A:7D:DA:71:13";
    policy.set_device_connection(OutputDevices::BLUETOOTH_A2DP.into(), true, address)?;
    print_commands("A2DP headset connected", &recorder);

    let music = policy.get_output(StreamType::Music, OutputConfig::default())?;
    policy.start_output(music, StreamType::Music)?;
    policy.set_device_connection(OutputDevices::BLUETOOTH_SCO_HEADSET.into(), true, address)?;
    policy.set_phone_state(PhoneState::InCall);
    print_commands("call over SCO on the same headset", &recorder);

    policy.set_phone_state(PhoneState::Normal);
    policy.set_device_connection(OutputDevices::BLUETOOTH_SCO_HEADSET.into(), false, address)?;
    policy.set_device_connection(OutputDevices::BLUETOOTH_A2DP.into(), false, address)?;
    print_commands("headset disconnected", &recorder);

    println!("{}", policy.dump());
    Ok(())
}
