use policyflow_core::{AudioDevice, InputDevices, OutputDevices};

use crate::error::{PolicyError, Result};

/// Longest accepted bluetooth device address, in bytes.
pub const MAX_ADDRESS_LEN: usize = 19;

/// Devices currently present, and the addresses of connected bluetooth links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistry {
    outputs: OutputDevices,
    inputs: InputDevices,
    a2dp_address: String,
    sco_address: String,
}

impl DeviceRegistry {
    /// Starts with the given devices available.
    pub fn new(outputs: OutputDevices, inputs: InputDevices) -> Self {
        Self {
            outputs,
            inputs,
            a2dp_address: String::new(),
            sco_address: String::new(),
        }
    }

    /// Output devices currently available.
    pub fn available_outputs(&self) -> OutputDevices {
        self.outputs
    }

    /// Input devices currently available.
    pub fn available_inputs(&self) -> InputDevices {
        self.inputs
    }

    /// Address of the connected A2DP device, empty when none is connected.
    pub fn a2dp_address(&self) -> &str {
        &self.a2dp_address
    }

    /// Address of the connected SCO device, empty when none is connected.
    pub fn sco_address(&self) -> &str {
        &self.sco_address
    }

    /// Returns true when the A2DP and SCO links go to the same remote device.
    pub fn bluetooth_addresses_match(&self) -> bool {
        !self.a2dp_address.is_empty() && self.a2dp_address == self.sco_address
    }

    /// Rejects anything but a single device bit with an address of acceptable length.
    pub fn validate(device: AudioDevice, address: &str) -> Result<()> {
        if !device.is_single() {
            return Err(PolicyError::invalid(format!(
                "expected exactly one device, got {device}"
            )));
        }
        if address.len() > MAX_ADDRESS_LEN {
            return Err(PolicyError::invalid(format!(
                "device address is {} bytes long, at most {MAX_ADDRESS_LEN} are allowed",
                address.len()
            )));
        }
        Ok(())
    }

    /// Returns true if `device` is present. A non-empty address must also match the stored
    /// address for bluetooth devices.
    pub fn is_connected(&self, device: AudioDevice, address: &str) -> bool {
        match device {
            AudioDevice::Output(device) => {
                if device.is_empty() || !self.outputs.contains(device) {
                    return false;
                }
                if address.is_empty() {
                    true
                } else if device.is_a2dp() {
                    self.a2dp_address == address
                } else if device.is_sco() {
                    self.sco_address == address
                } else {
                    true
                }
            }
            AudioDevice::Input(device) => !device.is_empty() && self.inputs.contains(device),
        }
    }

    pub(crate) fn connect_output(&mut self, device: OutputDevices, address: &str) -> Result<()> {
        if self.outputs.intersects(device) {
            return Err(PolicyError::AlreadyConnected(device.into()));
        }
        self.outputs.insert(device);
        if device.is_a2dp() {
            self.a2dp_address = address.to_string();
        } else if device.is_sco() {
            self.sco_address = address.to_string();
        }
        Ok(())
    }

    pub(crate) fn ensure_output_connected(&self, device: OutputDevices) -> Result<()> {
        if self.outputs.contains(device) {
            Ok(())
        } else {
            Err(PolicyError::NotConnected(device.into()))
        }
    }

    pub(crate) fn disconnect_output(&mut self, device: OutputDevices) -> Result<()> {
        self.ensure_output_connected(device)?;
        self.outputs.remove(device);
        if device.is_a2dp() {
            self.a2dp_address.clear();
        } else if device.is_sco() {
            self.sco_address.clear();
        }
        Ok(())
    }

    pub(crate) fn connect_input(&mut self, device: InputDevices) -> Result<()> {
        if self.inputs.intersects(device) {
            return Err(PolicyError::AlreadyConnected(device.into()));
        }
        self.inputs.insert(device);
        Ok(())
    }

    pub(crate) fn disconnect_input(&mut self, device: InputDevices) -> Result<()> {
        if !self.inputs.contains(device) {
            return Err(PolicyError::NotConnected(device.into()));
        }
        self.inputs.remove(device);
        Ok(())
    }

    /// Sets or clears input bits which follow an output device. Repeated calls are harmless.
    pub(crate) fn mirror_input(&mut self, device: InputDevices, connected: bool) {
        self.inputs.set(device, connected);
    }
}
