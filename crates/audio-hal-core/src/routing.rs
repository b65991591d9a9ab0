//! Routing switch orchestration
//!
//! [`RoutingController`] owns the authoritative record of which physical
//! sound devices are enabled. Given a new selection it tears down usecase
//! routes on the old devices, disables them, enables the new devices and
//! re-binds every active usecase, in that order. During a voice call both
//! paths are cycled together because the modem rebuilds its voice devices as
//! a pair.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::call::CallState;
use crate::capabilities::{Capabilities, degrade};
use crate::error::{HalError, Result};
use crate::mixer::MixerPathEngine;
use crate::registry::UsecaseRegistry;
use crate::selector::{DeviceSelector, SelectionInput};
use crate::sound_device::SoundDevice;
use crate::usecase::{UseCase, UsecaseKind};

/// Which physical devices are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeviceState {
    pub current_output: SoundDevice,
    pub output_active: bool,
    pub current_input: SoundDevice,
    pub input_active: bool,
}

impl DeviceState {
    /// Device a usecase of `kind` binds to
    pub fn device_for(&self, kind: UsecaseKind) -> SoundDevice {
        if kind.binds_output() {
            self.current_output
        } else {
            self.current_input
        }
    }

    fn path_active(&self, kind: UsecaseKind) -> bool {
        if kind.binds_output() {
            self.output_active
        } else {
            self.input_active
        }
    }

    /// Nothing to do for this path if it already matches the target
    fn settled(current: SoundDevice, active: bool, target: SoundDevice) -> bool {
        if active {
            current == target
        } else {
            target.is_none()
        }
    }
}

#[derive(Debug)]
pub struct RoutingController {
    selector: DeviceSelector,
    capabilities: Arc<Capabilities>,
    state: DeviceState,
}

impl RoutingController {
    pub fn new(capabilities: Arc<Capabilities>) -> Self {
        Self {
            selector: DeviceSelector::new(&capabilities),
            capabilities,
            state: DeviceState::default(),
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn selector(&self) -> &DeviceSelector {
        &self.selector
    }

    /// Select devices for `selection` and switch the hardware to them
    pub fn select_devices(
        &mut self,
        selection: &SelectionInput,
        call: &CallState,
        registry: &UsecaseRegistry,
        mixer: &mut dyn MixerPathEngine,
    ) -> Result<()> {
        let (output, input) = self.selector.select(selection);
        self.switch_devices(output, input, call, registry, mixer)
    }

    /// Move the hardware to the given output and input devices
    pub fn switch_devices(
        &mut self,
        output: SoundDevice,
        input: SoundDevice,
        call: &CallState,
        registry: &UsecaseRegistry,
        mixer: &mut dyn MixerPathEngine,
    ) -> Result<()> {
        let state = self.state;
        if DeviceState::settled(state.current_output, state.output_active, output)
            && DeviceState::settled(state.current_input, state.input_active, input)
        {
            debug!("Sound devices {} and {} already in place", output, input);
            return Ok(());
        }

        info!("Switching sound devices: out {} in {}", output, input);

        let in_call_switch = call.in_call && self.capabilities.voice_channel;
        if in_call_switch {
            // Must precede any mixer change on the application side
            if let Err(e) = degrade(self.capabilities.gateway.disable_voice_device()) {
                error!("Disabling voice devices failed: {}", e);
            }
        }

        if (output != state.current_output || in_call_switch) && state.output_active {
            self.teardown(registry, mixer, UsecaseKind::binds_output, state.current_output)?;
            self.state.output_active = false;
        }

        if (input != state.current_input || in_call_switch) && state.input_active {
            self.teardown(registry, mixer, |k| !k.binds_output(), state.current_input)?;
            self.state.input_active = false;
        }

        if !output.is_none() && !self.state.output_active {
            self.enable_device(output, mixer).inspect_err(|e| {
                error!("Failed to enable output device {}: {}", output, e);
            })?;
            self.state.output_active = true;
            self.state.current_output = output;
        }

        if !input.is_none() && !self.state.input_active {
            self.enable_device(input, mixer).inspect_err(|e| {
                error!("Failed to enable input device {}: {}", input, e);
            })?;
            self.state.input_active = true;
            self.state.current_input = input;
        }

        mixer.commit()?;
        for entry in registry.iter() {
            if self.state.path_active(entry.kind) {
                let path = entry.id.mixer_path(self.state.device_for(entry.kind));
                mixer.apply_path(&path)?;
            } else {
                debug!("No active device for usecase {}", entry.id);
            }
        }
        mixer.commit()?;

        if call.in_call_mode() && self.capabilities.voice_channel {
            self.enable_voice_devices(output, input, call.settings);
        }

        Ok(())
    }

    /// Reset every matching usecase route on `device`, then the device itself
    fn teardown(
        &self,
        registry: &UsecaseRegistry,
        mixer: &mut dyn MixerPathEngine,
        kinds: impl Fn(UsecaseKind) -> bool,
        device: SoundDevice,
    ) -> Result<()> {
        for entry in registry.iter().filter(|e| kinds(e.kind)) {
            mixer.reset_path(&entry.id.mixer_path(device))?;
        }
        mixer.commit()?;
        self.disable_device(device, mixer)
    }

    fn enable_device(&self, device: SoundDevice, mixer: &mut dyn MixerPathEngine) -> Result<()> {
        let (cal_id, direction) = match (device.calibration_id(), device.direction()) {
            (Some(id), Some(direction)) => (id, direction),
            _ => return Err(HalError::invalid_device(device)),
        };
        debug!("Enabling sound device {} (calibration {})", device, cal_id);

        if let Err(e) = degrade(self.capabilities.gateway.send_audio_cal(cal_id, direction)) {
            warn!("Audio calibration for {} failed: {}", device, e);
        }
        mixer.apply_path(device.name())
    }

    fn disable_device(&self, device: SoundDevice, mixer: &mut dyn MixerPathEngine) -> Result<()> {
        if device.is_none() {
            return Err(HalError::invalid_device(device));
        }
        debug!("Disabling sound device {}", device);
        mixer.reset_path(device.name())
    }

    fn enable_voice_devices(&self, output: SoundDevice, input: SoundDevice, settings: u32) {
        let (Some(rx), Some(tx)) = (output.calibration_id(), input.calibration_id()) else {
            error!("No voice calibration for devices {} and {}", output, input);
            return;
        };
        let result = self.capabilities.gateway.enable_voice_device(rx, tx, settings);
        if let Err(e) = degrade(result) {
            error!("Enabling voice devices failed: {}", e);
        }
    }

    /// Apply the route of `usecase` on the device its kind is bound to
    pub fn enable_route(&self, usecase: UseCase, mixer: &mut dyn MixerPathEngine) -> Result<()> {
        let device = self.state.device_for(usecase.kind());
        debug!("Enabling route for {} on {}", usecase, device);
        mixer.apply_path(&usecase.mixer_path(device))
    }

    /// Reset the route of `usecase` on the device its kind is bound to
    pub fn disable_route(&self, usecase: UseCase, mixer: &mut dyn MixerPathEngine) -> Result<()> {
        let device = self.state.device_for(usecase.kind());
        debug!("Disabling route for {} on {}", usecase, device);
        mixer.reset_path(&usecase.mixer_path(device))
    }
}
