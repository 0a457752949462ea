use policyflow_core::device::{AudioFormat, IoHandle, OpenedOutput, OutputChannels, OutputFlags};
use policyflow_core::{OutputDevices, Strategy, StreamTable, StreamType};
use slotmap::SlotMap;

use crate::error::Inconsistency;

slotmap::new_key_type! {
    /// Handle of an output known to the engine.
    pub struct OutputHandle;
}

/// What an output renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Renders to its own device set.
    Standalone {
        /// Current device set.
        device: OutputDevices,
    },
    /// Mirrors everything onto two other outputs. The links do not own their targets.
    Duplicated {
        /// Primary side of the mirror.
        first: OutputHandle,
        /// A2DP side of the mirror.
        second: OutputHandle,
    },
}

/// One open rendering sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDescriptor {
    pub(crate) io: IoHandle,
    pub(crate) kind: OutputKind,
    pub(crate) sampling_rate: u32,
    pub(crate) format: AudioFormat,
    pub(crate) channels: OutputChannels,
    pub(crate) latency_ms: u32,
    pub(crate) flags: OutputFlags,
    pub(crate) ref_counts: StreamTable<u32>,
    /// Last gain pushed to the driver per stream type, `None` before the first push.
    pub(crate) cur_volume: StreamTable<Option<f32>>,
    pub(crate) mute_counts: StreamTable<u32>,
}

impl OutputDescriptor {
    pub(crate) fn standalone(opened: &OpenedOutput, device: OutputDevices, flags: OutputFlags) -> Self {
        Self {
            io: opened.io,
            kind: OutputKind::Standalone { device },
            sampling_rate: opened.sampling_rate,
            format: opened.format,
            channels: opened.channels,
            latency_ms: opened.latency_ms,
            flags,
            ref_counts: StreamTable::filled(0),
            cur_volume: StreamTable::filled(None),
            mute_counts: StreamTable::filled(0),
        }
    }

    /// Duplicated output carrying the stream parameters of `template`.
    pub(crate) fn duplicated(
        io: IoHandle,
        first: OutputHandle,
        second: OutputHandle,
        template: &OutputDescriptor,
    ) -> Self {
        Self {
            io,
            kind: OutputKind::Duplicated { first, second },
            flags: OutputFlags::empty(),
            ref_counts: StreamTable::filled(0),
            cur_volume: StreamTable::filled(None),
            mute_counts: StreamTable::filled(0),
            ..template.clone()
        }
    }

    /// Driver handle of the output.
    pub fn io(&self) -> IoHandle {
        self.io
    }

    /// Standalone or duplicated.
    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    /// Sample rate in Hz.
    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    /// Sample format.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Channel mask.
    pub fn channels(&self) -> OutputChannels {
        self.channels
    }

    /// Output latency in milliseconds.
    pub fn latency_ms(&self) -> u32 {
        self.latency_ms
    }

    /// Returns true for outputs dedicated to a single stream.
    pub fn is_direct(&self) -> bool {
        self.flags.contains(OutputFlags::DIRECT)
    }

    /// Returns true for outputs mirroring onto two others.
    pub fn is_duplicated(&self) -> bool {
        matches!(self.kind, OutputKind::Duplicated { .. })
    }

    /// Active-use counter of `stream` on this output.
    pub fn ref_count(&self, stream: StreamType) -> u32 {
        self.ref_counts[stream]
    }

    /// Mute nesting counter of `stream` on this output.
    pub fn mute_count(&self, stream: StreamType) -> u32 {
        self.mute_counts[stream]
    }

    /// Last gain pushed for `stream`, if any.
    pub fn current_volume(&self, stream: StreamType) -> Option<f32> {
        self.cur_volume[stream]
    }

    /// Returns true if `stream` is active on this output.
    pub fn is_used_by_stream(&self, stream: StreamType) -> bool {
        self.ref_counts[stream] > 0
    }

    /// Returns true if any stream of `strategy` is active on this output.
    pub fn is_used_by_strategy(&self, strategy: Strategy) -> bool {
        strategy.streams().any(|stream| self.is_used_by_stream(stream))
    }

    fn own_device(&self) -> OutputDevices {
        match self.kind {
            OutputKind::Standalone { device } => device,
            OutputKind::Duplicated { .. } => OutputDevices::empty(),
        }
    }
}

/// Arena of every open output.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    map: SlotMap<OutputHandle, OutputDescriptor>,
}

impl OutputRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, descriptor: OutputDescriptor) -> OutputHandle {
        self.map.insert(descriptor)
    }

    pub(crate) fn remove(&mut self, handle: OutputHandle) -> Option<OutputDescriptor> {
        self.map.remove(handle)
    }

    /// Looks up an output.
    pub fn get(&self, handle: OutputHandle) -> Option<&OutputDescriptor> {
        self.map.get(handle)
    }

    pub(crate) fn get_mut(&mut self, handle: OutputHandle) -> Option<&mut OutputDescriptor> {
        self.map.get_mut(handle)
    }

    /// Returns true if `handle` refers to an open output.
    pub fn contains(&self, handle: OutputHandle) -> bool {
        self.map.contains_key(handle)
    }

    /// Iterates over every output.
    pub fn iter(&self) -> impl Iterator<Item = (OutputHandle, &OutputDescriptor)> {
        self.map.iter()
    }

    /// Handles of every output, in arena order.
    pub fn handles(&self) -> Vec<OutputHandle> {
        self.map.keys().collect()
    }

    /// Number of open outputs.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no output is open.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Devices an output renders to. For a duplicated output, the union of both linked outputs.
    pub fn device_of(&self, handle: OutputHandle) -> OutputDevices {
        let Some(descriptor) = self.map.get(handle) else {
            return OutputDevices::empty();
        };
        match descriptor.kind {
            OutputKind::Standalone { device } => device,
            OutputKind::Duplicated { first, second } => {
                let first = self.map.get(first).map(OutputDescriptor::own_device);
                let second = self.map.get(second).map(OutputDescriptor::own_device);
                first.unwrap_or(OutputDevices::empty()) | second.unwrap_or(OutputDevices::empty())
            }
        }
    }

    pub(crate) fn set_device(&mut self, handle: OutputHandle, device: OutputDevices) {
        if let Some(descriptor) = self.map.get_mut(handle) {
            if let OutputKind::Standalone { device: current } = &mut descriptor.kind {
                *current = device;
            }
        }
    }

    /// Returns true if `stream` is active on `handle`.
    pub fn is_used_by_stream(&self, handle: OutputHandle, stream: StreamType) -> bool {
        self.map
            .get(handle)
            .is_some_and(|descriptor| descriptor.is_used_by_stream(stream))
    }

    /// Returns true if any stream of `strategy` is active on `handle`.
    pub fn is_used_by_strategy(&self, handle: OutputHandle, strategy: Strategy) -> bool {
        self.map
            .get(handle)
            .is_some_and(|descriptor| descriptor.is_used_by_strategy(strategy))
    }

    /// Active count of `stream` on `handle`, 0 for unknown handles.
    pub fn ref_count(&self, handle: OutputHandle, stream: StreamType) -> u32 {
        self.map
            .get(handle)
            .map_or(0, |descriptor| descriptor.ref_count(stream))
    }

    /// Adds `delta` to the usage counter of `stream` on `handle`, and on both linked outputs when
    /// `handle` is duplicated. Returns the counter of `handle` after the change.
    ///
    /// A counter that would go negative is clamped to zero and reported.
    pub(crate) fn change_ref_count(
        &mut self,
        handle: OutputHandle,
        stream: StreamType,
        delta: i64,
    ) -> Result<u32, Inconsistency> {
        let Some(kind) = self.map.get(handle).map(OutputDescriptor::kind) else {
            return Ok(0);
        };
        let mut result = Ok(());
        if let OutputKind::Duplicated { first, second } = kind {
            for link in [first, second] {
                if let Err(err) = self.change_ref_count(link, stream, delta) {
                    result = Err(err);
                }
            }
        }
        let Some(descriptor) = self.map.get_mut(handle) else {
            return Ok(0);
        };
        let count = &mut descriptor.ref_counts[stream];
        let next = i64::from(*count) + delta;
        if next < 0 {
            *count = 0;
            return Err(Inconsistency::UsageUnderflow(stream));
        }
        *count = next as u32;
        log::debug!(stream = stream.index(), count = *count; "Usage count changed for {stream}");
        result.map(|()| *count)
    }

    /// Moves the usage counters of every stream of `strategy` from `from` to `to`, following the
    /// same propagation rules as [`Self::change_ref_count`].
    pub(crate) fn transfer_usage(
        &mut self,
        from: OutputHandle,
        to: OutputHandle,
        strategy: Strategy,
    ) -> Result<(), Inconsistency> {
        let mut result = Ok(());
        for stream in strategy.streams() {
            let count = i64::from(self.ref_count(from, stream));
            if count == 0 {
                continue;
            }
            if let Err(err) = self
                .change_ref_count(to, stream, count)
                .and_then(|_| self.change_ref_count(from, stream, -count))
            {
                result = Err(err);
            }
        }
        result
    }

    /// Mixed (non-direct) output currently rendering exactly to `device`.
    pub fn mixed_output_for_device(&self, device: OutputDevices) -> Option<OutputHandle> {
        self.map
            .iter()
            .filter(|(_, descriptor)| !descriptor.is_direct())
            .find(|(handle, _)| self.device_of(*handle) == device)
            .map(|(handle, _)| handle)
    }
}
