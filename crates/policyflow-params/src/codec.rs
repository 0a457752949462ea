use policyflow_core::device::InputSource;
use policyflow_core::{InputDevices, OutputDevices, Parameter};
use thiserror::Error;

/// Key carrying a device mask, on outputs and inputs alike.
pub const KEY_ROUTING: &str = "routing";
/// Key carrying the address of an A2DP sink.
pub const KEY_A2DP_SINK_ADDRESS: &str = "a2dp_sink_address";
/// Key announcing an output is about to close.
pub const KEY_CLOSING: &str = "closing";
/// Key carrying the capture use case of an input.
pub const KEY_INPUT_SOURCE: &str = "Input Source";

const INPUT_SOURCE_NAMES: [(InputSource, &str); 7] = [
    (InputSource::Default, "Default"),
    (InputSource::Mic, "Mic"),
    (InputSource::VoiceUplink, "Voice Uplink"),
    (InputSource::VoiceDownlink, "Voice Downlink"),
    (InputSource::VoiceCall, "Voice Call"),
    (InputSource::Camcorder, "Camcorder"),
    (InputSource::VoiceRecognition, "Voice Recognition"),
];

fn input_source_name(source: InputSource) -> &'static str {
    INPUT_SOURCE_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == source)
        .map_or("Default", |(_, name)| *name)
}

/// Side of the driver a parameter string is addressed to. Routing keys are shared, the handle
/// they are sent to decides which device namespace they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Output handles, routing masks are output devices.
    Output,
    /// Input handles, routing masks are input devices.
    Input,
}

/// Malformed parameter string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A pair without `=`.
    #[error("Missing value in {0:?}")]
    MissingValue(String),
    /// A key no parameter uses.
    #[error("Unknown key {0:?}")]
    UnknownKey(String),
    /// A known key with a value it does not accept.
    #[error("Invalid value {value:?} for key {key:?}")]
    InvalidValue {
        /// Key of the pair.
        key: String,
        /// Rejected value.
        value: String,
    },
    /// The mask sets bits no device is assigned to.
    #[error("Unknown device bits {0:#x}")]
    UnknownDevices(u32),
}

/// Encodes one parameter as a `key=value` pair.
pub fn encode(parameter: &Parameter) -> String {
    match parameter {
        Parameter::Routing(device) => format!("{KEY_ROUTING}={}", device.bits()),
        Parameter::InputRouting(device) => format!("{KEY_ROUTING}={}", device.bits()),
        Parameter::InputSource(source) => {
            format!("{KEY_INPUT_SOURCE}={}", input_source_name(*source))
        }
        Parameter::A2dpSinkAddress(address) => format!("{KEY_A2DP_SINK_ADDRESS}={address}"),
        Parameter::Closing => format!("{KEY_CLOSING}=true"),
    }
}

/// Encodes parameters as `key=value` pairs joined by `;`.
pub fn encode_all<'a>(parameters: impl IntoIterator<Item = &'a Parameter>) -> String {
    parameters
        .into_iter()
        .map(encode)
        .collect::<Vec<_>>()
        .join(";")
}

/// Decodes a `key=value;key=value` string addressed to a handle of the given direction.
/// Empty pairs are skipped.
pub fn decode_parameters(input: &str, direction: Direction) -> Result<Vec<Parameter>, ParseError> {
    input
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| decode_pair(pair, direction))
        .collect()
}

fn decode_pair(pair: &str, direction: Direction) -> Result<Parameter, ParseError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| ParseError::MissingValue(pair.to_string()))?;
    let invalid = || ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    match key {
        KEY_ROUTING => {
            let bits: u32 = value.parse().map_err(|_| invalid())?;
            match direction {
                Direction::Output => OutputDevices::from_bits(bits)
                    .map(Parameter::Routing)
                    .ok_or(ParseError::UnknownDevices(bits)),
                Direction::Input => InputDevices::from_bits(bits)
                    .map(Parameter::InputRouting)
                    .ok_or(ParseError::UnknownDevices(bits)),
            }
        }
        KEY_INPUT_SOURCE => INPUT_SOURCE_NAMES
            .iter()
            .find(|(_, name)| *name == value)
            .map(|(source, _)| Parameter::InputSource(*source))
            .ok_or_else(invalid),
        KEY_A2DP_SINK_ADDRESS => Ok(Parameter::A2dpSinkAddress(value.to_string())),
        KEY_CLOSING if value == "true" => Ok(Parameter::Closing),
        KEY_CLOSING => Err(invalid()),
        _ => Err(ParseError::UnknownKey(key.to_string())),
    }
}
