//! Device selection for routing strategies and capture sources.
//!
//! Each strategy resolves through an ordered table of `(condition, candidate)` rules. The first
//! rule whose condition holds and whose candidate is available wins.

use policyflow_core::device::InputSource;
use policyflow_core::{
    ForceUse, ForcedConfig, ForcedUses, InputDevices, OutputDevices, PhoneState, Strategy,
};

/// State the selection depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionContext {
    /// Current telephony state.
    pub phone_state: PhoneState,
    /// Output devices currently available.
    pub available_outputs: OutputDevices,
    /// Forced configuration of every use category.
    pub forced: ForcedUses,
}

#[derive(Debug, Clone, Copy)]
enum When {
    Always,
    Forced(ForcedConfig),
    NotForced(ForcedConfig),
    /// Forced, unless the table is evaluated for dial tones during a call.
    ForcedUnlessInCallDtmf(ForcedConfig),
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    when: When,
    device: OutputDevices,
}

const fn rule(when: When, device: OutputDevices) -> Rule {
    Rule { when, device }
}

const PHONE_RULES: [Rule; 8] = [
    rule(
        When::ForcedUnlessInCallDtmf(ForcedConfig::BtSco),
        OutputDevices::BLUETOOTH_SCO_CARKIT,
    ),
    rule(
        When::Forced(ForcedConfig::BtSco),
        OutputDevices::BLUETOOTH_SCO_HEADSET,
    ),
    rule(When::Forced(ForcedConfig::BtSco), OutputDevices::BLUETOOTH_SCO),
    rule(
        When::ForcedUnlessInCallDtmf(ForcedConfig::Speaker),
        OutputDevices::BLUETOOTH_SCO_CARKIT,
    ),
    rule(When::Forced(ForcedConfig::Speaker), OutputDevices::SPEAKER),
    rule(
        When::NotForced(ForcedConfig::Speaker),
        OutputDevices::WIRED_HEADPHONE,
    ),
    rule(
        When::NotForced(ForcedConfig::Speaker),
        OutputDevices::WIRED_HEADSET,
    ),
    rule(When::NotForced(ForcedConfig::Speaker), OutputDevices::EARPIECE),
];

const MEDIA_RULES: [Rule; 7] = [
    rule(When::Always, OutputDevices::AUX_DIGITAL),
    rule(When::Always, OutputDevices::BLUETOOTH_A2DP),
    rule(When::Always, OutputDevices::BLUETOOTH_A2DP_HEADPHONES),
    rule(When::Always, OutputDevices::BLUETOOTH_A2DP_SPEAKER),
    rule(When::Always, OutputDevices::WIRED_HEADPHONE),
    rule(When::Always, OutputDevices::WIRED_HEADSET),
    rule(When::Always, OutputDevices::SPEAKER),
];

impl SelectionContext {
    fn holds(&self, when: When, in_call_dtmf: bool) -> bool {
        let communication = self.forced.get(ForceUse::Communication);
        match when {
            When::Always => true,
            When::Forced(config) => communication == config,
            When::NotForced(config) => communication != config,
            When::ForcedUnlessInCallDtmf(config) => communication == config && !in_call_dtmf,
        }
    }

    fn first_match(&self, rules: &[Rule], in_call_dtmf: bool) -> OutputDevices {
        rules
            .iter()
            .filter(|rule| self.holds(rule.when, in_call_dtmf))
            .map(|rule| rule.device & self.available_outputs)
            .find(|device| !device.is_empty())
            .unwrap_or(OutputDevices::empty())
    }

    fn phone_device(&self, in_call_dtmf: bool) -> OutputDevices {
        self.first_match(&PHONE_RULES, in_call_dtmf)
    }

    fn media_device(&self, extra: OutputDevices) -> OutputDevices {
        let device = (extra & self.available_outputs) | self.first_match(&MEDIA_RULES, false);
        if self.phone_state.is_in_call() && !device.is_a2dp() && device != self.phone_device(false)
        {
            log::trace!("Media device {device} incompatible with the call route");
            return OutputDevices::empty();
        }
        device
    }
}

/// Resolves the output devices `strategy` should render to. Never returns an unavailable device.
pub fn device_for_strategy(strategy: Strategy, context: &SelectionContext) -> OutputDevices {
    let in_call = context.phone_state.is_in_call();
    match strategy {
        Strategy::Phone => context.phone_device(false),
        Strategy::Dtmf if in_call => context.phone_device(true),
        Strategy::Sonification if in_call => context.phone_device(false),
        Strategy::Dtmf | Strategy::Media => context.media_device(OutputDevices::empty()),
        Strategy::Sonification => context.media_device(OutputDevices::SPEAKER),
    }
}

/// Resolves the input device a capture `source` should record from.
pub fn device_for_input_source(
    source: InputSource,
    available_inputs: InputDevices,
    forced: &ForcedUses,
) -> InputDevices {
    match source {
        InputSource::Default | InputSource::Mic | InputSource::VoiceRecognition => {
            if forced.get(ForceUse::Record) == ForcedConfig::BtSco
                && available_inputs.contains(InputDevices::BLUETOOTH_SCO_HEADSET)
            {
                InputDevices::BLUETOOTH_SCO_HEADSET
            } else if available_inputs.contains(InputDevices::WIRED_HEADSET) {
                InputDevices::WIRED_HEADSET
            } else {
                InputDevices::BUILTIN_MIC
            }
        }
        InputSource::Camcorder => InputDevices::BUILTIN_MIC,
        InputSource::VoiceUplink | InputSource::VoiceDownlink | InputSource::VoiceCall => {
            InputDevices::VOICE_CALL
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn context(available: OutputDevices) -> SelectionContext {
        SelectionContext {
            phone_state: PhoneState::Normal,
            available_outputs: available,
            forced: ForcedUses::default(),
        }
    }

    const DEFAULT_OUTPUTS: OutputDevices = OutputDevices::EARPIECE.union(OutputDevices::SPEAKER);

    #[test]
    fn test_defaults() {
        let ctx = context(DEFAULT_OUTPUTS);
        assert_eq!(
            OutputDevices::EARPIECE,
            device_for_strategy(Strategy::Phone, &ctx)
        );
        assert_eq!(
            OutputDevices::SPEAKER,
            device_for_strategy(Strategy::Media, &ctx)
        );
        assert_eq!(
            OutputDevices::SPEAKER,
            device_for_strategy(Strategy::Sonification, &ctx)
        );
        assert_eq!(
            OutputDevices::SPEAKER,
            device_for_strategy(Strategy::Dtmf, &ctx)
        );
    }

    #[test]
    fn test_wired_headset() {
        let ctx = context(DEFAULT_OUTPUTS | OutputDevices::WIRED_HEADSET);
        assert_eq!(
            OutputDevices::WIRED_HEADSET,
            device_for_strategy(Strategy::Phone, &ctx)
        );
        assert_eq!(
            OutputDevices::WIRED_HEADSET,
            device_for_strategy(Strategy::Media, &ctx)
        );
        assert_eq!(
            OutputDevices::SPEAKER_AND_HEADSET,
            device_for_strategy(Strategy::Sonification, &ctx)
        );
    }

    #[test]
    fn test_headphone_wins_over_headset() {
        let ctx = context(
            DEFAULT_OUTPUTS | OutputDevices::WIRED_HEADSET | OutputDevices::WIRED_HEADPHONE,
        );
        assert_eq!(
            OutputDevices::WIRED_HEADPHONE,
            device_for_strategy(Strategy::Phone, &ctx)
        );
        assert_eq!(
            OutputDevices::WIRED_HEADPHONE,
            device_for_strategy(Strategy::Media, &ctx)
        );
    }

    #[test]
    fn test_media_priority() {
        let ctx = context(
            DEFAULT_OUTPUTS
                | OutputDevices::WIRED_HEADSET
                | OutputDevices::BLUETOOTH_A2DP_HEADPHONES,
        );
        assert_eq!(
            OutputDevices::BLUETOOTH_A2DP_HEADPHONES,
            device_for_strategy(Strategy::Media, &ctx)
        );
        let ctx = context(ctx.available_outputs | OutputDevices::AUX_DIGITAL);
        assert_eq!(
            OutputDevices::AUX_DIGITAL,
            device_for_strategy(Strategy::Media, &ctx)
        );
    }

    #[test]
    fn test_forced_sco() {
        let mut ctx = context(
            DEFAULT_OUTPUTS
                | OutputDevices::BLUETOOTH_SCO_HEADSET
                | OutputDevices::BLUETOOTH_SCO_CARKIT,
        );
        ctx.forced
            .set(ForceUse::Communication, ForcedConfig::BtSco);
        assert_eq!(
            OutputDevices::BLUETOOTH_SCO_CARKIT,
            device_for_strategy(Strategy::Phone, &ctx)
        );

        ctx.phone_state = PhoneState::InCall;
        assert_eq!(
            OutputDevices::BLUETOOTH_SCO_HEADSET,
            device_for_strategy(Strategy::Dtmf, &ctx)
        );
    }

    #[test]
    fn test_forced_sco_falls_back_when_missing() {
        let mut ctx = context(DEFAULT_OUTPUTS | OutputDevices::WIRED_HEADPHONE);
        ctx.forced
            .set(ForceUse::Communication, ForcedConfig::BtSco);
        assert_eq!(
            OutputDevices::WIRED_HEADPHONE,
            device_for_strategy(Strategy::Phone, &ctx)
        );
    }

    #[test]
    fn test_forced_speaker_does_not_fall_back() {
        let mut ctx = context(OutputDevices::EARPIECE);
        ctx.forced
            .set(ForceUse::Communication, ForcedConfig::Speaker);
        assert!(device_for_strategy(Strategy::Phone, &ctx).is_empty());

        let ctx = SelectionContext {
            available_outputs: DEFAULT_OUTPUTS,
            ..ctx
        };
        assert_eq!(
            OutputDevices::SPEAKER,
            device_for_strategy(Strategy::Phone, &ctx)
        );
    }

    #[test]
    fn test_in_call() {
        let mut ctx = context(DEFAULT_OUTPUTS);
        ctx.phone_state = PhoneState::InCall;
        assert_eq!(
            OutputDevices::EARPIECE,
            device_for_strategy(Strategy::Sonification, &ctx)
        );
        assert_eq!(
            OutputDevices::EARPIECE,
            device_for_strategy(Strategy::Dtmf, &ctx)
        );
        // Media would move the call to the speaker.
        assert!(device_for_strategy(Strategy::Media, &ctx).is_empty());

        let ctx = SelectionContext {
            available_outputs: DEFAULT_OUTPUTS | OutputDevices::BLUETOOTH_A2DP,
            ..ctx
        };
        assert_eq!(
            OutputDevices::BLUETOOTH_A2DP,
            device_for_strategy(Strategy::Media, &ctx)
        );
    }

    #[test]
    fn test_in_call_media_on_call_device() {
        let mut ctx = context(DEFAULT_OUTPUTS | OutputDevices::WIRED_HEADSET);
        ctx.phone_state = PhoneState::InCall;
        assert_eq!(
            OutputDevices::WIRED_HEADSET,
            device_for_strategy(Strategy::Media, &ctx)
        );
    }

    #[test]
    fn test_never_selects_unavailable_devices() {
        let strategies = [
            Strategy::Phone,
            Strategy::Media,
            Strategy::Sonification,
            Strategy::Dtmf,
        ];
        let configs = [
            ForcedConfig::None,
            ForcedConfig::Speaker,
            ForcedConfig::BtSco,
        ];
        let states = [PhoneState::Normal, PhoneState::Ringtone, PhoneState::InCall];
        for bits in 0..(1u32 << 11) {
            let available = OutputDevices::from_bits_truncate(bits);
            for config in configs {
                for phone_state in states {
                    let mut forced = ForcedUses::default();
                    forced.set(ForceUse::Communication, config);
                    let ctx = SelectionContext {
                        phone_state,
                        available_outputs: available,
                        forced,
                    };
                    for strategy in strategies {
                        let device = device_for_strategy(strategy, &ctx);
                        assert!(
                            available.contains(device),
                            "{strategy} picked {device} out of {available}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_input_sources() {
        let mut forced = ForcedUses::default();
        let inputs = InputDevices::BUILTIN_MIC | InputDevices::BLUETOOTH_SCO_HEADSET;
        assert_eq!(
            InputDevices::BUILTIN_MIC,
            device_for_input_source(InputSource::Mic, inputs, &forced)
        );
        forced.set(ForceUse::Record, ForcedConfig::BtSco);
        assert_eq!(
            InputDevices::BLUETOOTH_SCO_HEADSET,
            device_for_input_source(InputSource::VoiceRecognition, inputs, &forced)
        );
        assert_eq!(
            InputDevices::BUILTIN_MIC,
            device_for_input_source(InputSource::Camcorder, inputs, &forced)
        );
        assert_eq!(
            InputDevices::VOICE_CALL,
            device_for_input_source(InputSource::VoiceDownlink, inputs, &forced)
        );
        let inputs = InputDevices::BUILTIN_MIC | InputDevices::WIRED_HEADSET;
        assert_eq!(
            InputDevices::WIRED_HEADSET,
            device_for_input_source(InputSource::Default, inputs, &forced)
        );
    }
}
