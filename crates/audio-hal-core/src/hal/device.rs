//! Device-global state and the stream lifecycle flows
//!
//! Everything shared between streams lives in [`DeviceInner`] behind a single
//! lock owned by [`DeviceCore`]. Streams never touch that lock directly: they
//! call the synchronized operations here while holding their own stream lock,
//! which fixes the lock order to stream first, device second.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::call::{CallState, voice_volume_index};
use crate::capabilities::{Capabilities, degrade};
use crate::devices::{ChannelMask, OutputDevices};
use crate::error::{HalError, Result};
use crate::hdmi::{self, EdidReader};
use crate::mixer::MixerPathEngine;
use crate::pcm::{PcmConfig, PcmHandle, SOUND_CARD, TransferEndpoint};
use crate::registry::{UsecaseEntry, UsecaseRegistry};
use crate::routing::{DeviceState, RoutingController};
use crate::selector::{InputRequest, SelectionInput};
use crate::sound_device::Direction;
use crate::types::{AudioMode, TtyMode};
use crate::usecase::{UseCase, UsecaseKind};

pub(crate) struct DeviceInner {
    call: CallState,
    registry: UsecaseRegistry,
    routing: RoutingController,
    mixer: Box<dyn MixerPathEngine>,
    /// Aggregate output devices requested by active usecases
    out_devices: OutputDevices,
    active_input: Option<InputRequest>,
    voice_rx: Option<Box<dyn PcmHandle>>,
    voice_tx: Option<Box<dyn PcmHandle>>,
}

impl DeviceInner {
    fn select_devices(&mut self) -> Result<()> {
        let selection = SelectionInput::from_state(&self.call, self.out_devices, self.active_input);
        self.routing
            .select_devices(&selection, &self.call, &self.registry, self.mixer.as_mut())
    }

    /// Requested output of every other playback usecase plus the voice call
    fn remaining_out_devices(&self, usecase: UseCase) -> OutputDevices {
        self.registry.union_output_devices(usecase, UsecaseKind::Playback)
            | self.registry.voice_call_devices()
    }

    /// Switch back to whatever the restored request selects after a failed start
    fn reselect_after_failure(&mut self) {
        if let Err(e) = self.select_devices() {
            warn!("Restoring sound devices failed: {}", e);
        }
    }

    fn selection(&self) -> SelectionInput {
        SelectionInput::from_state(&self.call, self.out_devices, self.active_input)
    }

    fn enable_route(&mut self, usecase: UseCase) -> Result<()> {
        self.routing.enable_route(usecase, self.mixer.as_mut())?;
        self.mixer.commit()
    }

    fn disable_route(&mut self, usecase: UseCase) -> Result<()> {
        self.routing.disable_route(usecase, self.mixer.as_mut())?;
        self.mixer.commit()
    }
}

pub(crate) struct DeviceCore {
    inner: Mutex<DeviceInner>,
    capabilities: Arc<Capabilities>,
    pcm: Arc<dyn TransferEndpoint>,
    edid: Arc<dyn EdidReader>,
}

/// Open an endpoint and check that it came up
fn open_endpoint(
    pcm: &dyn TransferEndpoint,
    device: u32,
    direction: Direction,
    config: &PcmConfig,
) -> Result<Box<dyn PcmHandle>> {
    debug!(
        "Opening PCM card {} device {} {:?} channels {}",
        SOUND_CARD, device, direction, config.channels
    );
    let mut handle = pcm.open(SOUND_CARD, device, direction, config)?;
    if !handle.is_ready() {
        let reason = handle.last_error();
        error!("PCM device {} not ready: {}", device, reason);
        handle.close();
        return Err(HalError::io(reason));
    }
    Ok(handle)
}

impl DeviceCore {
    pub(crate) fn new(
        call: CallState,
        capabilities: Arc<Capabilities>,
        mixer: Box<dyn MixerPathEngine>,
        pcm: Arc<dyn TransferEndpoint>,
        edid: Arc<dyn EdidReader>,
    ) -> Self {
        let inner = DeviceInner {
            call,
            registry: UsecaseRegistry::new(),
            routing: RoutingController::new(Arc::clone(&capabilities)),
            mixer,
            out_devices: OutputDevices::empty(),
            active_input: None,
            voice_rx: None,
            voice_tx: None,
        };
        Self {
            inner: Mutex::new(inner),
            capabilities,
            pcm,
            edid,
        }
    }

    pub(crate) fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub(crate) fn is_registered(&self, usecase: UseCase) -> bool {
        self.inner.lock().registry.contains(usecase)
    }

    pub(crate) fn device_state(&self) -> DeviceState {
        self.inner.lock().routing.state()
    }

    pub(crate) fn call_state(&self) -> CallState {
        self.inner.lock().call.clone()
    }

    pub(crate) fn active_usecases(&self) -> Vec<UsecaseEntry> {
        self.inner.lock().registry.iter().copied().collect()
    }

    pub(crate) fn requested_output(&self) -> OutputDevices {
        self.inner.lock().out_devices
    }

    pub(crate) fn mic_muted(&self) -> bool {
        self.inner.lock().call.mic_muted
    }

    // Output streams

    pub(crate) fn start_output_stream(
        &self,
        usecase: UseCase,
        devices: OutputDevices,
        config: &PcmConfig,
    ) -> Result<Box<dyn PcmHandle>> {
        let mut inner = self.inner.lock();
        info!("Starting output usecase {} devices {:?}", usecase, devices);

        if inner.registry.contains(usecase) {
            return Err(HalError::AlreadyExists { usecase });
        }

        inner.out_devices |= devices;
        let selection = inner.selection();
        if inner.routing.selector().output_device(&selection).is_none() {
            error!("Could not get a valid output sound device");
            inner.out_devices = inner.remaining_out_devices(usecase);
            return Err(HalError::unresolvable(format!("output {:?}", devices)));
        }

        if let Err(e) = inner.select_devices() {
            error!("Failed to enable output devices {:?}: {}", inner.out_devices, e);
            inner.out_devices = inner.remaining_out_devices(usecase);
            inner.reselect_after_failure();
            return Err(e);
        }

        inner.registry.insert(UsecaseEntry::new(usecase, devices))?;
        let opened = inner
            .enable_route(usecase)
            .and_then(|_| open_endpoint(self.pcm.as_ref(), usecase.pcm_device(Direction::Rx), Direction::Rx, config));

        match opened {
            Ok(handle) => {
                debug!("Output usecase {} started", usecase);
                Ok(handle)
            }
            Err(e) => {
                if let Err(stop_err) = Self::stop_output_locked(&mut inner, usecase) {
                    warn!("Unwinding {} failed: {}", usecase, stop_err);
                }
                inner.out_devices = inner.remaining_out_devices(usecase);
                Err(e)
            }
        }
    }

    pub(crate) fn stop_output_stream(&self, usecase: UseCase) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::stop_output_locked(&mut inner, usecase)
    }

    fn stop_output_locked(inner: &mut DeviceInner, usecase: UseCase) -> Result<()> {
        info!("Stopping output usecase {}", usecase);
        if !inner.registry.contains(usecase) {
            error!("Usecase {} is not in the list", usecase);
            return Err(HalError::NotFound { usecase });
        }

        inner.disable_route(usecase)?;
        inner.registry.remove(usecase);

        inner.out_devices = inner.remaining_out_devices(usecase);
        let result = inner.select_devices();
        debug!("Output devices now {:?}", inner.out_devices);
        result
    }

    /// Apply a routing request from an output stream
    pub(crate) fn route_output(
        &self,
        usecase: UseCase,
        stream_devices: &mut OutputDevices,
        requested: OutputDevices,
        standby: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        debug!("Routing request for {}: {:?}", usecase, requested);
        let in_call_mode = inner.call.in_call_mode();

        if in_call_mode && !inner.call.in_call && !requested.is_empty() {
            Self::retarget_stream(&mut inner, usecase, stream_devices, requested);
            self.start_voice_locked(&mut inner)
        } else if !in_call_mode && inner.call.in_call {
            if !requested.is_empty() {
                Self::retarget_stream(&mut inner, usecase, stream_devices, requested);
            }
            self.stop_voice_locked(&mut inner)
        } else if *stream_devices != requested && !requested.is_empty() {
            if !standby || inner.call.in_call {
                Self::retarget_stream(&mut inner, usecase, stream_devices, requested);
                inner.select_devices()
            } else {
                *stream_devices = requested;
                Ok(())
            }
        } else {
            Ok(())
        }
    }

    fn retarget_stream(
        inner: &mut DeviceInner,
        usecase: UseCase,
        stream_devices: &mut OutputDevices,
        requested: OutputDevices,
    ) {
        *stream_devices = requested;
        inner.registry.set_devices(usecase, requested);
        if inner.call.in_call {
            // The call follows the routed device
            inner.registry.set_devices(UseCase::VoiceCall, requested);
        }
        inner.out_devices =
            inner.registry.union_output_devices(usecase, UsecaseKind::Playback) | requested;
    }

    // Input streams

    pub(crate) fn start_input_stream(
        &self,
        usecase: UseCase,
        request: InputRequest,
        config: &PcmConfig,
    ) -> Result<Box<dyn PcmHandle>> {
        let mut inner = self.inner.lock();
        info!("Starting input usecase {} request {:?}", usecase, request);

        if inner.registry.contains(usecase) {
            return Err(HalError::AlreadyExists { usecase });
        }

        let previous = inner.active_input.replace(request);
        let selection = inner.selection();
        if inner.routing.selector().input_device(&selection).is_none() {
            error!("Could not get a valid input sound device");
            inner.active_input = previous;
            return Err(HalError::unresolvable(format!("input {:?}", request.devices)));
        }

        if let Err(e) = inner.select_devices() {
            error!("Failed to enable input device {:?}: {}", request.devices, e);
            inner.active_input = previous;
            inner.reselect_after_failure();
            return Err(e);
        }

        inner.registry.insert(UsecaseEntry::new(usecase, OutputDevices::empty()))?;
        let opened = inner
            .enable_route(usecase)
            .and_then(|_| open_endpoint(self.pcm.as_ref(), usecase.pcm_device(Direction::Tx), Direction::Tx, config));

        match opened {
            Ok(handle) => Ok(handle),
            Err(e) => {
                if let Err(stop_err) = Self::stop_input_locked(&mut inner, usecase) {
                    warn!("Unwinding {} failed: {}", usecase, stop_err);
                }
                Err(e)
            }
        }
    }

    pub(crate) fn stop_input_stream(&self, usecase: UseCase) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::stop_input_locked(&mut inner, usecase)
    }

    fn stop_input_locked(inner: &mut DeviceInner, usecase: UseCase) -> Result<()> {
        info!("Stopping input usecase {}", usecase);
        inner.active_input = None;
        if !inner.registry.contains(usecase) {
            error!("Usecase {} is not in the list", usecase);
            return Err(HalError::NotFound { usecase });
        }

        inner.disable_route(usecase)?;
        inner.registry.remove(usecase);
        inner.select_devices()
    }

    /// Refresh the active input snapshot, re-selecting devices if asked
    pub(crate) fn update_active_input(&self, request: InputRequest, reselect: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.active_input = Some(request);
        if reselect { inner.select_devices() } else { Ok(()) }
    }

    // Voice call

    pub(crate) fn start_voice_call(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.start_voice_locked(&mut inner)
    }

    pub(crate) fn stop_voice_call(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.stop_voice_locked(&mut inner)
    }

    fn start_voice_locked(&self, inner: &mut DeviceInner) -> Result<()> {
        info!("Starting voice call on {:?}", inner.out_devices);
        if inner.registry.contains(UseCase::VoiceCall) {
            return Err(HalError::AlreadyExists { usecase: UseCase::VoiceCall });
        }

        inner.call.in_call = true;
        if let Err(e) = inner.select_devices() {
            error!("Failed to select voice call devices: {}", e);
            inner.call.in_call = false;
            inner.reselect_after_failure();
            return Err(e);
        }

        let entry = UsecaseEntry::new(UseCase::VoiceCall, inner.out_devices);
        inner.registry.insert(entry)?;

        match self.bring_up_voice(inner) {
            Ok(()) => {
                info!("Voice call started");
                Ok(())
            }
            Err(e) => {
                error!("Voice call start failed: {}", e);
                if let Err(stop_err) = self.stop_voice_locked(inner) {
                    warn!("Unwinding voice call failed: {}", stop_err);
                }
                Err(e)
            }
        }
    }

    fn bring_up_voice(&self, inner: &mut DeviceInner) -> Result<()> {
        inner.enable_route(UseCase::VoiceCall)?;

        let config = PcmConfig::voice_call();
        let rx_device = UseCase::VoiceCall.pcm_device(Direction::Rx);
        let tx_device = UseCase::VoiceCall.pcm_device(Direction::Tx);

        let rx = inner
            .voice_rx
            .insert(open_endpoint(self.pcm.as_ref(), rx_device, Direction::Rx, &config)?);
        rx.start()?;
        let tx = inner
            .voice_tx
            .insert(open_endpoint(self.pcm.as_ref(), tx_device, Direction::Tx, &config)?);
        tx.start()?;

        if self.capabilities.voice_channel {
            degrade(self.capabilities.gateway.start_voice_call())?;
        }
        Ok(())
    }

    fn stop_voice_locked(&self, inner: &mut DeviceInner) -> Result<()> {
        info!("Stopping voice call");
        inner.call.in_call = false;

        if self.capabilities.voice_channel {
            if let Err(e) = degrade(self.capabilities.gateway.stop_voice_call()) {
                error!("Stopping modem voice failed: {}", e);
            }
        }

        for mut handle in [inner.voice_rx.take(), inner.voice_tx.take()].into_iter().flatten() {
            handle.close();
        }

        if !inner.registry.contains(UseCase::VoiceCall) {
            error!("Usecase {} is not in the list", UseCase::VoiceCall);
            return Err(HalError::NotFound { usecase: UseCase::VoiceCall });
        }

        inner.disable_route(UseCase::VoiceCall)?;
        inner.registry.remove(UseCase::VoiceCall);
        inner.select_devices()
    }

    // Device controls

    pub(crate) fn set_mode(&self, mode: AudioMode) {
        let mut inner = self.inner.lock();
        if inner.call.mode != mode {
            info!("Audio mode {:?} -> {:?}", inner.call.mode, mode);
            inner.call.mode = mode;
        }
    }

    pub(crate) fn set_tty_mode(&self, tty: TtyMode) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.call.update_tty(tty) {
            return Ok(());
        }
        info!("TTY mode {:?}, settings {:#x}", tty, inner.call.settings);
        if inner.call.in_call {
            inner.select_devices()
        } else {
            Ok(())
        }
    }

    pub(crate) fn set_bt_nrec(&self, enabled: bool) {
        // Echo cancellation and noise suppression cannot be turned off yet
        self.inner.lock().call.bt_nrec = enabled;
    }

    pub(crate) fn set_screen_state(&self, on: bool) {
        self.inner.lock().call.screen_off = !on;
    }

    pub(crate) fn set_voice_volume(&self, volume: f32) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.call.voice_volume = volume;
        if !inner.call.in_call_mode() {
            return Ok(());
        }
        if !self.capabilities.voice_channel {
            error!("No voice channel present for volume");
            return Ok(());
        }
        let index = voice_volume_index(volume);
        debug!("Voice volume {} -> index {}", volume, index);
        degrade(self.capabilities.gateway.set_voice_volume_index(index))
            .inspect_err(|e| error!("Setting voice volume failed: {}", e))
    }

    pub(crate) fn set_mic_mute(&self, muted: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.call.mic_muted = muted;
        if !inner.call.in_call_mode() {
            return Ok(());
        }
        if !self.capabilities.voice_channel {
            error!("No voice channel present for mic mute");
            return Ok(());
        }
        degrade(self.capabilities.gateway.set_mic_mute(muted))
            .inspect_err(|e| error!("Setting mic mute failed: {}", e))
    }

    // HDMI

    pub(crate) fn negotiate_hdmi(&self) -> Vec<ChannelMask> {
        let _inner = self.inner.lock();
        hdmi::supported_channel_masks(self.edid.max_channels())
    }

    pub(crate) fn set_hdmi_channels(&self, channels: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        hdmi::set_hdmi_channels(inner.mixer.as_mut(), channels)
    }
}

impl Drop for DeviceCore {
    fn drop(&mut self) {
        info!("Closing audio device");
        self.capabilities.release_vendor();
    }
}
