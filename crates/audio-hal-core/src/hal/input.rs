//! Capture streams

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::device::DeviceCore;
use super::pace_failed_transfer;
use crate::devices::{ChannelMask, InputDevices, InputFlags};
use crate::error::{HalError, Result};
use crate::pcm::{PcmConfig, PcmHandle};
use crate::selector::InputRequest;
use crate::types::{AudioSource, SampleFormat};
use crate::usecase::UseCase;

struct InputState {
    standby: bool,
    request: InputRequest,
    pcm: Option<Box<dyn PcmHandle>>,
}

/// A capture stream
pub struct InputStream {
    core: Arc<DeviceCore>,
    usecase: UseCase,
    flags: InputFlags,
    config: PcmConfig,
    state: Mutex<InputState>,
}

impl InputStream {
    pub(crate) fn new(
        core: Arc<DeviceCore>,
        usecase: UseCase,
        flags: InputFlags,
        config: PcmConfig,
        request: InputRequest,
    ) -> Self {
        Self {
            core,
            usecase,
            flags,
            config,
            state: Mutex::new(InputState {
                standby: true,
                request,
                pcm: None,
            }),
        }
    }

    pub fn usecase(&self) -> UseCase {
        self.usecase
    }

    pub fn flags(&self) -> InputFlags {
        self.flags
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.rate
    }

    pub fn channels(&self) -> ChannelMask {
        self.state.lock().request.channel_mask
    }

    pub fn format(&self) -> SampleFormat {
        self.config.format
    }

    pub fn pcm_config(&self) -> PcmConfig {
        self.config
    }

    pub fn source(&self) -> AudioSource {
        self.state.lock().request.source
    }

    pub fn devices(&self) -> InputDevices {
        self.state.lock().request.devices
    }

    pub fn is_standby(&self) -> bool {
        self.state.lock().standby
    }

    pub fn buffer_size(&self) -> usize {
        self.config.period_size as usize * self.config.frame_size()
    }

    /// Fill `buffer` with captured data.
    ///
    /// Returns the buffer length. The buffer is zeroed while the mic is
    /// muted. A failed read puts the stream in standby and sleeps for the
    /// buffer's capture time.
    pub fn read(&self, buffer: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        match self.read_locked(&mut state, buffer) {
            Ok(()) => {
                if self.core.mic_muted() {
                    buffer.fill(0);
                }
            }
            Err(e) => {
                error!("Read on {} failed: {}", self.usecase, e);
                self.standby_locked(&mut state);
                drop(state);
                pace_failed_transfer(buffer.len(), self.config.frame_size(), self.config.rate);
            }
        }
        buffer.len()
    }

    fn read_locked(&self, state: &mut InputState, buffer: &mut [u8]) -> Result<()> {
        if state.standby {
            let handle = self
                .core
                .start_input_stream(self.usecase, state.request, &self.config)?;
            state.pcm = Some(handle);
            state.standby = false;
        }
        match state.pcm.as_mut() {
            Some(pcm) => pcm.read(buffer),
            None => Err(HalError::io("no transfer endpoint")),
        }
    }

    pub fn standby(&self) {
        let mut state = self.state.lock();
        self.standby_locked(&mut state);
    }

    fn standby_locked(&self, state: &mut InputState) {
        if state.standby {
            return;
        }
        debug!("Input {} entering standby", self.usecase);
        state.standby = true;
        if let Some(mut pcm) = state.pcm.take() {
            pcm.close();
        }
        if let Err(e) = self.core.stop_input_stream(self.usecase) {
            error!("Stopping {} failed: {}", self.usecase, e);
        }
    }

    /// Change the capture source; an active stream refreshes its request
    pub fn set_input_source(&self, source: AudioSource) -> Result<()> {
        let mut state = self.state.lock();
        if state.request.source == source {
            return Ok(());
        }
        state.request.source = source;
        if state.standby {
            Ok(())
        } else {
            self.core.update_active_input(state.request, false)
        }
    }

    /// Route the stream to new input devices, re-selecting when active
    pub fn set_routing(&self, devices: InputDevices) -> Result<()> {
        let mut state = self.state.lock();
        if devices.is_empty() || state.request.devices == devices {
            return Ok(());
        }
        debug!("Input {} routing {:?} -> {:?}", self.usecase, state.request.devices, devices);
        state.request.devices = devices;
        if state.standby {
            Ok(())
        } else {
            self.core.update_active_input(state.request, true)
        }
    }

    pub fn close(self) {
        info!("Closing input stream {}", self.usecase);
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        self.standby_locked(&mut state);
    }
}
