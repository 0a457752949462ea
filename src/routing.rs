//! Routing of outputs to devices: stream start and stop arbitration, output acquisition and
//! device connection handling.

use policyflow_core::device::{IoHandle, OutputChannels, OutputConfig, OutputFlags};
use policyflow_core::{
    AudioDevice, OutputDevices, Parameter, PolicyClient, Strategy, StreamType,
};

use crate::engine::{A2dpOutputs, Engine};
use crate::error::{Inconsistency, PolicyError, Result};
use crate::outputs::{OutputDescriptor, OutputHandle};
use crate::registry::DeviceRegistry;

impl<C: PolicyClient> Engine<C> {
    /// Routes `sink` to `target`, returning true if a routing command was sent.
    ///
    /// The primary output never renders to A2DP devices and the A2DP sink renders to nothing
    /// else, so the matching bits are stripped first. Without `force`, routing to the current
    /// device does nothing.
    pub fn apply_route(
        &mut self,
        sink: OutputHandle,
        target: OutputDevices,
        force: bool,
        delay_ms: u32,
    ) -> bool {
        let Some(output) = self.outputs.get(sink) else {
            log::warn!("Routing unknown output");
            return false;
        };
        if output.is_duplicated() {
            return false;
        }
        let io = output.io();
        let latency_ms = output.latency_ms();

        let mut device = target;
        if sink == self.primary {
            device -= OutputDevices::ALL_A2DP;
        } else if self.a2dp.is_some_and(|a2dp| a2dp.sink == sink) {
            device &= OutputDevices::ALL_A2DP;
        }
        if device.is_empty() {
            return false;
        }
        let old = self.outputs.device_of(sink);
        if device == old && !force {
            log::trace!(io = io.0; "Output already routed to {device}");
            return false;
        }

        log::debug!(io = io.0, force, delay_ms; "Routing output from {old} to {device}");
        self.outputs.set_device(sink, device);
        let mut delay_ms = delay_ms;
        if device.is_combined_route() {
            self.set_strategy_mute(Strategy::Media, true, sink, 0);
            // Buffered media drains before both transducers engage.
            delay_ms = delay_ms.max(2 * latency_ms);
        }
        if device.is_sco() {
            self.suspend_a2dp_for_sco();
        }
        self.notify("routing", |client| {
            client.set_parameters(io, &Parameter::Routing(device), delay_ms)
        });
        self.apply_stream_volumes(sink, device, delay_ms);
        if old.is_sco() {
            self.restore_a2dp_for_sco();
        }
        if old.is_combined_route() {
            self.set_strategy_mute(Strategy::Media, false, sink, delay_ms);
        }
        true
    }

    /// Device the primary output should follow given the strategies active on `sink`, in
    /// priority order. An ongoing call ranks right after sonification.
    pub(crate) fn new_device(&self, sink: OutputHandle) -> OutputDevices {
        let used = |strategy| self.outputs.is_used_by_strategy(sink, strategy);
        let strategy = if used(Strategy::Phone) {
            Strategy::Phone
        } else if used(Strategy::Sonification) {
            Strategy::Sonification
        } else if self.phone_state.is_in_call() {
            Strategy::Phone
        } else if used(Strategy::Media) {
            Strategy::Media
        } else if used(Strategy::Dtmf) {
            Strategy::Dtmf
        } else {
            return OutputDevices::empty();
        };
        self.device_for_strategy(strategy)
    }

    pub(crate) fn io_of(&self, handle: OutputHandle) -> Option<IoHandle> {
        self.outputs.get(handle).map(OutputDescriptor::io)
    }

    fn suspend_a2dp_for_sco(&mut self) {
        if !self.a2dp_shares_sco_link() {
            return;
        }
        if let Some(io) = self.a2dp.and_then(|a2dp| self.io_of(a2dp.sink)) {
            log::debug!(io = io.0; "Suspending A2DP output for SCO");
            self.notify("suspend", |client| client.suspend_output(io));
        }
    }

    fn restore_a2dp_for_sco(&mut self) {
        if !self.a2dp_shares_sco_link() {
            return;
        }
        if let Some(io) = self.a2dp.and_then(|a2dp| self.io_of(a2dp.sink)) {
            log::debug!(io = io.0; "Restoring A2DP output after SCO");
            self.notify("restore", |client| client.restore_output(io));
        }
    }

    /// Picks the output `stream` should play on. Direct and compressed requests get a dedicated
    /// output, everything else shares the primary, A2DP or duplicated output.
    pub fn get_output(&mut self, stream: StreamType, config: OutputConfig) -> Result<OutputHandle> {
        let strategy = stream.strategy();
        let device = self.device_for_strategy(strategy);
        log::debug!("Output requested for {stream} on {device}");

        if config.is_direct() {
            return self.open_direct_output(stream, device, config);
        }
        if let Some(channels) = config.channels {
            if channels != OutputChannels::MONO && channels != OutputChannels::STEREO {
                log::warn!(channels = channels.bits(); "Rejected channel mask for {stream}");
                return Err(PolicyError::invalid(format!(
                    "channel mask {:#x} needs a direct output",
                    channels.bits()
                )));
            }
        }

        let others = device - OutputDevices::SPEAKER;
        let handle = if device.count() == 2 && others.is_a2dp() {
            self.a2dp.map(|a2dp| a2dp.duplicated)
        } else if others.is_a2dp() {
            self.a2dp.map(|a2dp| a2dp.sink)
        } else {
            Some(self.primary)
        };
        handle.ok_or_else(|| {
            log::warn!("No A2DP output open for {stream} on {device}");
            PolicyError::unavailable(format!("no A2DP output open for {device}"))
        })
    }

    fn open_direct_output(
        &mut self,
        stream: StreamType,
        device: OutputDevices,
        config: OutputConfig,
    ) -> Result<OutputHandle> {
        if device.is_empty() {
            return Err(PolicyError::unavailable(format!("no device for {stream}")));
        }
        let config = OutputConfig {
            flags: config.flags | OutputFlags::DIRECT,
            ..config
        };
        let opened = self.client.open_output(device, &config).map_err(|err| {
            log::error!("Cannot open direct output for {stream}: {err}");
            PolicyError::unavailable(err)
        })?;
        if !config.is_satisfied_by(&opened) {
            log::warn!(io = opened.io.0; "Direct output does not match the request for {stream}");
            let io = opened.io;
            self.notify("output close", |client| client.close_output(io));
            return Err(PolicyError::unavailable(format!(
                "direct output {io} opened with {} Hz {:?} {:#x}",
                opened.sampling_rate,
                opened.format,
                opened.channels.bits()
            )));
        }
        log::info!(io = opened.io.0; "Direct output opened for {stream} on {device}");
        Ok(self
            .outputs
            .insert(OutputDescriptor::standalone(&opened, device, config.flags)))
    }

    /// Closes `handle` if it is a direct output. Shared outputs stay open.
    pub fn release_output(&mut self, handle: OutputHandle) -> Result<()> {
        let Some(output) = self.outputs.get(handle) else {
            log::warn!("Releasing unknown output");
            return Err(PolicyError::NotFound);
        };
        if !output.is_direct() {
            return Ok(());
        }
        if let Some(output) = self.outputs.remove(handle) {
            log::info!(io = output.io.0; "Direct output released");
            self.notify("output close", |client| client.close_output(output.io));
        }
        Ok(())
    }

    /// Counts one more active `stream` on `sink`. When its strategy becomes active and wins over
    /// the strategies already active on the primary output, the primary output follows it.
    pub fn start_output(&mut self, sink: OutputHandle, stream: StreamType) -> Result<()> {
        if !self.outputs.contains(sink) {
            log::warn!("Starting {stream} on unknown output");
            return Err(PolicyError::NotFound);
        }
        let strategy = stream.strategy();
        log::debug!("Starting {stream} ({strategy})");

        if !self.outputs.is_used_by_strategy(sink, strategy) {
            let mut device = self.device_for_strategy(strategy);
            if device.count() == 2 {
                let others = device - OutputDevices::SPEAKER;
                if others.is_a2dp() {
                    device -= others;
                } else if !device.is_combined_route() {
                    device = OutputDevices::SPEAKER;
                }
            }
            let winner = Strategy::PRIORITY.into_iter().find(|candidate| {
                *candidate == strategy || self.outputs.is_used_by_strategy(self.primary, *candidate)
            });
            if winner == Some(strategy) {
                self.apply_route(self.primary, device, false, 0);
            }
        }

        if let Err(inconsistency) = self.outputs.change_ref_count(sink, stream, 1) {
            self.report(inconsistency);
        }
        if self.phone_state.is_in_call() {
            self.handle_incall_sonification(stream, true, false);
        }
        let index = self.streams[stream].index_cur;
        let device = self.outputs.device_of(sink);
        self.check_and_set_volume(stream, index, sink, device, 0, false);
        Ok(())
    }

    /// Counts one less active `stream` on `sink`. When its strategy goes idle the primary output
    /// follows the next active strategy, delayed so buffered audio drains first.
    pub fn stop_output(&mut self, sink: OutputHandle, stream: StreamType) -> Result<()> {
        if !self.outputs.contains(sink) {
            log::warn!("Stopping {stream} on unknown output");
            return Err(PolicyError::NotFound);
        }
        let strategy = stream.strategy();
        log::debug!("Stopping {stream} ({strategy})");

        if self.phone_state.is_in_call() {
            self.handle_incall_sonification(stream, false, false);
        }
        if !self.outputs.is_used_by_strategy(sink, strategy) {
            self.report(Inconsistency::StreamNotActive(stream));
            return Ok(());
        }
        if let Err(inconsistency) = self.outputs.change_ref_count(sink, stream, -1) {
            self.report(inconsistency);
        }
        if !self.outputs.is_used_by_strategy(sink, strategy) {
            let device = self.new_device(self.primary);
            let latency_ms = self
                .outputs
                .get(self.primary)
                .map_or(0, OutputDescriptor::latency_ms);
            self.apply_route(self.primary, device, false, 2 * latency_ms);
        }
        if stream == StreamType::Music {
            self.music_stopped_at = Some(self.clock.now());
        }
        Ok(())
    }

    /// Returns true if `device` is available, see [`DeviceRegistry::is_connected`].
    pub fn is_device_connected(&self, device: AudioDevice, address: &str) -> bool {
        self.devices.is_connected(device, address)
    }

    /// Handles a device appearing or disappearing. Outputs follow the change, then the input
    /// side is updated and the active input re-routed if its device changed.
    pub fn set_device_connection(
        &mut self,
        device: AudioDevice,
        connected: bool,
        address: &str,
    ) -> Result<()> {
        DeviceRegistry::validate(device, address).inspect_err(|err| {
            log::warn!(connected; "Rejected connection event: {err}");
        })?;
        log::info!(connected; "Device {device} connection changed, address {address:?}");
        match device {
            AudioDevice::Output(device) => {
                let result = if connected {
                    self.connect_output_device(device, address)
                } else {
                    self.disconnect_output_device(device, address)
                };
                result.inspect_err(|err| log::warn!("Connection event not applied: {err}"))?;
                let input = device.input_counterpart();
                if !input.is_empty() {
                    self.devices.mirror_input(input, connected);
                }
            }
            AudioDevice::Input(device) => {
                let result = if connected {
                    self.devices.connect_input(device)
                } else {
                    self.devices.disconnect_input(device)
                };
                result.inspect_err(|err| log::warn!("Connection event not applied: {err}"))?;
            }
        }
        self.reroute_active_input();
        Ok(())
    }

    fn connect_output_device(&mut self, device: OutputDevices, address: &str) -> Result<()> {
        if self.devices.available_outputs().intersects(device) {
            return Err(PolicyError::AlreadyConnected(device.into()));
        }
        if self.outputs.mixed_output_for_device(device).is_some() {
            log::warn!("An output is already routed to unconnected device {device}");
        }
        if device.is_a2dp() {
            return self.connect_a2dp(device, address);
        }

        self.devices.connect_output(device, address)?;
        if device.is_sco() && !self.phone_state.is_normal() {
            self.suspend_a2dp_for_sco();
        }
        let strategy = self
            .strategies_following(device)
            .find(|strategy| self.device_for_strategy(*strategy).contains(device));
        if let Some(strategy) = strategy {
            let target = self.device_for_strategy(strategy);
            log::debug!("{strategy} follows new device {device}");
            self.apply_route(self.primary, target, false, 0);
        }
        Ok(())
    }

    fn disconnect_output_device(&mut self, device: OutputDevices, address: &str) -> Result<()> {
        self.devices.ensure_output_connected(device)?;
        if device.is_a2dp() {
            return self.disconnect_a2dp(device, address);
        }

        let strategy = self
            .strategies_following(device)
            .find(|strategy| self.device_for_strategy(*strategy).intersects(device));
        if device.is_sco() && !self.phone_state.is_normal() {
            self.restore_a2dp_for_sco();
        }
        self.devices.disconnect_output(device)?;

        let target = match strategy {
            Some(strategy) => {
                log::debug!("{strategy} leaves removed device {device}");
                self.device_for_strategy(strategy)
            }
            None if self.outputs.device_of(self.primary).intersects(device) => {
                let target = self.new_device(self.primary);
                if target.is_empty() {
                    self.device_for_strategy(Strategy::Media)
                } else {
                    target
                }
            }
            None => return Ok(()),
        };
        self.apply_route(self.primary, target, false, 0);
        Ok(())
    }

    /// Strategies of the primary output which may follow a change of `device`, in priority
    /// order. Only calls and dial tones move on SCO changes.
    fn strategies_following(&self, device: OutputDevices) -> impl Iterator<Item = Strategy> + '_ {
        let sco = device.is_sco();
        Strategy::PRIORITY.into_iter().filter(move |strategy| {
            let used = self.outputs.is_used_by_strategy(self.primary, *strategy);
            match strategy {
                Strategy::Phone if sco => self.phone_state.is_in_call(),
                Strategy::Phone => self.phone_state.is_in_call() || used,
                Strategy::Dtmf => used,
                _ => !sco && used,
            }
        })
    }

    fn connect_a2dp(&mut self, device: OutputDevices, address: &str) -> Result<()> {
        if self.a2dp.is_some() {
            return Err(PolicyError::AlreadyExists(format!(
                "A2DP outputs already open for {}",
                self.devices.a2dp_address()
            )));
        }
        let primary_io = self.io_of(self.primary).ok_or(PolicyError::NotFound)?;
        let opened = self
            .client
            .open_output(device, &OutputConfig::default())
            .map_err(|err| {
                log::error!("Cannot open A2DP output: {err}");
                PolicyError::unavailable(err)
            })?;
        let sink = self.outputs.insert(OutputDescriptor::standalone(
            &opened,
            device,
            OutputFlags::empty(),
        ));
        log::info!(io = opened.io.0; "A2DP output opened for {address}");
        self.apply_stream_volumes(sink, device, 0);

        let duplicated_io = match self.client.open_duplicate_output(primary_io, opened.io) {
            Ok(io) => io,
            Err(err) => {
                log::error!("Cannot open duplicated output: {err}");
                self.outputs.remove(sink);
                self.notify("output close", |client| client.close_output(opened.io));
                return Err(PolicyError::unavailable(err));
            }
        };
        let Some(template) = self.outputs.get(sink).cloned() else {
            return Err(PolicyError::NotFound);
        };
        let duplicated = self.outputs.insert(OutputDescriptor::duplicated(
            duplicated_io,
            self.primary,
            sink,
            &template,
        ));
        log::info!(io = duplicated_io.0; "Duplicated output opened");
        self.a2dp = Some(A2dpOutputs { sink, duplicated });
        self.apply_stream_volumes(duplicated, device, 0);

        let parameter = Parameter::A2dpSinkAddress(address.to_string());
        self.notify("A2DP address", |client| {
            client.set_parameters(opened.io, &parameter, 0)
        });
        self.devices.connect_output(device, address)?;

        if self.devices.bluetooth_addresses_match() {
            // A call and a primary output on SCO each hold one suspension.
            if !self.phone_state.is_normal() {
                self.notify("suspend", |client| client.suspend_output(opened.io));
            }
            if self.outputs.device_of(self.primary).is_sco() {
                self.notify("suspend", |client| client.suspend_output(opened.io));
            }
        }

        for (strategy, target) in [
            (Strategy::Media, sink),
            (Strategy::Dtmf, sink),
            (Strategy::Sonification, duplicated),
        ] {
            if self.device_for_strategy(strategy).contains(device) {
                self.migrate(strategy, self.primary, target);
            }
        }
        Ok(())
    }

    fn disconnect_a2dp(&mut self, device: OutputDevices, address: &str) -> Result<()> {
        if address != self.devices.a2dp_address() {
            log::warn!("Disconnecting unknown A2DP address {address:?}");
            return Err(PolicyError::NotConnected(device.into()));
        }
        let Some(a2dp) = self.a2dp else {
            return self.devices.disconnect_output(device);
        };
        let moved: Vec<_> = [
            (Strategy::Dtmf, a2dp.sink),
            (Strategy::Media, a2dp.sink),
            (Strategy::Sonification, a2dp.duplicated),
        ]
        .into_iter()
        .filter(|(strategy, from)| {
            self.device_for_strategy(*strategy).intersects(device)
                || self.outputs.is_used_by_strategy(*from, *strategy)
        })
        .collect();
        self.devices.disconnect_output(device)?;

        // Media would leak to the primary output until players pause.
        self.set_strategy_mute(Strategy::Media, true, self.primary, 0);
        let unmute_delay_ms = self.config.a2dp_disconnect_mute_ms;
        self.set_strategy_mute(Strategy::Media, false, self.primary, unmute_delay_ms);

        for (strategy, from) in moved {
            self.migrate(strategy, from, self.primary);
        }

        if let Some(io) = self.io_of(a2dp.sink) {
            self.notify("closing", |client| {
                client.set_parameters(io, &Parameter::Closing, 0)
            });
        }
        for handle in [a2dp.duplicated, a2dp.sink] {
            if let Some(output) = self.outputs.remove(handle) {
                log::info!(io = output.io.0; "Output closed after A2DP disconnection");
                self.notify("output close", |client| client.close_output(output.io));
            }
        }
        self.a2dp = None;

        let target = self.new_device(self.primary);
        self.apply_route(self.primary, target, false, 0);
        Ok(())
    }

    /// Retargets every stream type of `strategy` to `to` and moves their usage counters.
    pub(crate) fn migrate(&mut self, strategy: Strategy, from: OutputHandle, to: OutputHandle) {
        let Some(io) = self.io_of(to) else {
            return;
        };
        log::debug!(io = io.0; "Moving {strategy} streams");
        for stream in strategy.streams() {
            self.notify("stream output", |client| client.set_stream_output(stream, io));
        }
        if let Err(inconsistency) = self.outputs.transfer_usage(from, to, strategy) {
            self.report(inconsistency);
        }
    }
}
