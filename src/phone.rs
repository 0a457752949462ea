use policyflow_core::{OutputDevices, PhoneState, PolicyClient, Strategy, StreamType};

use crate::engine::Engine;

impl<C: PolicyClient> Engine<C> {
    /// Moves to telephony state `state`.
    ///
    /// Crossing the call boundary moves dial tones and sonification between the A2DP outputs and
    /// the primary output, updates the in-call handling of active sonification streams and
    /// re-applies routing on the primary output unconditionally.
    pub fn set_phone_state(&mut self, state: PhoneState) {
        let old_state = self.phone_state;
        if state == old_state {
            log::debug!("Phone state already {state}");
            return;
        }
        log::info!("Phone state {old_state} -> {state}");

        if old_state.is_in_call() {
            for stream in StreamType::ALL {
                self.handle_incall_sonification(stream, false, true);
            }
        }

        let old_dtmf = self.device_for_strategy(Strategy::Dtmf);
        let old_sonification =
            self.device_for_strategy(Strategy::Sonification) - OutputDevices::SPEAKER;
        self.phone_state = state;

        if let Some(a2dp) = self.a2dp {
            let new_dtmf = self.device_for_strategy(Strategy::Dtmf);
            let new_sonification =
                self.device_for_strategy(Strategy::Sonification) - OutputDevices::SPEAKER;
            if state.is_in_call() {
                if old_dtmf.is_a2dp() && !new_dtmf.is_a2dp() {
                    self.migrate(Strategy::Dtmf, a2dp.sink, self.primary);
                }
                if old_sonification.is_a2dp() && !new_sonification.is_a2dp() {
                    self.migrate(Strategy::Sonification, a2dp.duplicated, self.primary);
                }
            } else if old_state.is_in_call() {
                if !old_dtmf.is_a2dp() && new_dtmf.is_a2dp() {
                    self.migrate(Strategy::Dtmf, self.primary, a2dp.sink);
                }
                if !old_sonification.is_a2dp() && new_sonification.is_a2dp() {
                    self.migrate(Strategy::Sonification, self.primary, a2dp.duplicated);
                }
            }

            if self.devices.bluetooth_addresses_match() {
                if let Some(io) = self.io_of(a2dp.sink) {
                    if old_state.is_normal() {
                        self.notify("suspend", |client| client.suspend_output(io));
                    } else if state.is_normal() {
                        self.notify("restore", |client| client.restore_output(io));
                    }
                }
            }
        }

        if state.is_in_call() {
            for stream in StreamType::ALL {
                self.handle_incall_sonification(stream, true, true);
            }
            let device = self.device_for_strategy(Strategy::Phone);
            self.apply_route(self.primary, device, true, 0);
        } else if old_state.is_in_call() {
            let mut device = self.new_device(self.primary);
            if device.is_empty() {
                device = self.outputs.device_of(self.primary);
            }
            self.apply_route(self.primary, device, true, 0);
        } else {
            let device = self.new_device(self.primary);
            self.apply_route(self.primary, device, false, 0);
        }

        self.limit_ringtone_volume = state == PhoneState::Ringtone
            && (self
                .outputs
                .is_used_by_stream(self.primary, StreamType::Music)
                || self.music_recently_stopped());
        if self.limit_ringtone_volume {
            log::debug!("Ringtone volume limited to music volume");
        }
    }

    /// Keeps sonification from being heard through the call path. Low visibility streams are
    /// muted, the others are replaced by a tone on the call path, and also muted when the
    /// primary output shares a device with the call.
    ///
    /// On a phone state change every active track of `stream` is handled at once.
    pub(crate) fn handle_incall_sonification(
        &mut self,
        stream: StreamType,
        starting: bool,
        state_change: bool,
    ) {
        if stream.strategy() != Strategy::Sonification {
            return;
        }
        let Some(output) = self.outputs.get(self.primary) else {
            return;
        };
        if !output.is_used_by_stream(stream) {
            return;
        }
        let tracks = if state_change {
            output.ref_count(stream)
        } else {
            1
        };
        let device = self.outputs.device_of(self.primary);
        log::debug!(starting, state_change, tracks; "In-call handling of {stream}");

        if (self.config.low_visibility)(stream) {
            for _ in 0..tracks {
                self.set_stream_mute(stream, starting, self.primary, 0);
            }
            return;
        }
        if device.intersects(self.device_for_strategy(Strategy::Phone)) {
            for _ in 0..tracks {
                self.set_stream_mute(stream, starting, self.primary, 0);
            }
        }
        if starting {
            let tone = self.config.call_waiting_tone;
            self.notify("tone start", |client| {
                client.start_tone(tone, StreamType::VoiceCall)
            });
        } else {
            self.notify("tone stop", |client| client.stop_tone());
        }
    }
}
