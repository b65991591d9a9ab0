//! Playback streams

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::device::DeviceCore;
use super::pace_failed_transfer;
use crate::devices::{ChannelMask, OutputDevices, OutputFlags};
use crate::error::{HalError, Result};
use crate::pcm::{PcmConfig, PcmHandle};
use crate::types::SampleFormat;
use crate::usecase::UseCase;

struct OutputState {
    standby: bool,
    devices: OutputDevices,
    pcm: Option<Box<dyn PcmHandle>>,
}

/// A playback stream bound to one usecase.
///
/// Streams open in standby and start lazily on the first write.
pub struct OutputStream {
    core: Arc<DeviceCore>,
    usecase: UseCase,
    flags: OutputFlags,
    config: PcmConfig,
    channel_mask: ChannelMask,
    supported_masks: Vec<ChannelMask>,
    state: Mutex<OutputState>,
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("usecase", &self.usecase)
            .field("flags", &self.flags)
            .field("config", &self.config)
            .field("channel_mask", &self.channel_mask)
            .finish_non_exhaustive()
    }
}

impl OutputStream {
    pub(crate) fn new(
        core: Arc<DeviceCore>,
        usecase: UseCase,
        devices: OutputDevices,
        flags: OutputFlags,
        config: PcmConfig,
        channel_mask: ChannelMask,
        supported_masks: Vec<ChannelMask>,
    ) -> Self {
        Self {
            core,
            usecase,
            flags,
            config,
            channel_mask,
            supported_masks,
            state: Mutex::new(OutputState {
                standby: true,
                devices,
                pcm: None,
            }),
        }
    }

    pub fn usecase(&self) -> UseCase {
        self.usecase
    }

    pub fn flags(&self) -> OutputFlags {
        self.flags
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.rate
    }

    pub fn channels(&self) -> ChannelMask {
        self.channel_mask
    }

    pub fn format(&self) -> SampleFormat {
        self.config.format
    }

    pub fn pcm_config(&self) -> PcmConfig {
        self.config
    }

    pub fn devices(&self) -> OutputDevices {
        self.state.lock().devices
    }

    pub fn is_standby(&self) -> bool {
        self.state.lock().standby
    }

    /// Bytes in one period
    pub fn buffer_size(&self) -> usize {
        self.config.period_size as usize * self.config.frame_size()
    }

    pub fn latency_ms(&self) -> u32 {
        self.config.period_count * self.config.period_size * 1000 / self.config.rate
    }

    /// Supported channel masks joined with `|`
    pub fn supported_channels(&self) -> String {
        self.supported_masks
            .iter()
            .filter_map(|mask| mask.output_name())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Setting the sample rate after open is not supported
    pub fn set_sample_rate(&self, _rate: u32) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "out_set_sample_rate" })
    }

    /// Write a buffer, starting the stream if needed.
    ///
    /// Always reports the whole buffer as consumed. On failure the stream is
    /// put in standby and the call sleeps for the buffer's play time.
    pub fn write(&self, buffer: &[u8]) -> usize {
        let mut state = self.state.lock();
        if let Err(e) = self.write_locked(&mut state, buffer) {
            error!("Write on {} failed: {}", self.usecase, e);
            self.standby_locked(&mut state);
            drop(state);
            pace_failed_transfer(buffer.len(), self.config.frame_size(), self.config.rate);
        }
        buffer.len()
    }

    fn write_locked(&self, state: &mut OutputState, buffer: &[u8]) -> Result<()> {
        if state.standby {
            let handle = self
                .core
                .start_output_stream(self.usecase, state.devices, &self.config)?;
            state.pcm = Some(handle);
            state.standby = false;
        }
        match state.pcm.as_mut() {
            Some(pcm) => pcm.write(buffer),
            None => Err(HalError::io("no transfer endpoint")),
        }
    }

    /// Stop the stream and release its path
    pub fn standby(&self) {
        let mut state = self.state.lock();
        self.standby_locked(&mut state);
    }

    fn standby_locked(&self, state: &mut OutputState) {
        if state.standby {
            return;
        }
        debug!("Output {} entering standby", self.usecase);
        state.standby = true;
        if let Some(mut pcm) = state.pcm.take() {
            pcm.close();
        }
        if let Err(e) = self.core.stop_output_stream(self.usecase) {
            error!("Stopping {} failed: {}", self.usecase, e);
        }
    }

    /// Route the stream to new devices.
    ///
    /// Entering call mode starts the voice call and leaving it stops the call.
    pub fn set_routing(&self, devices: OutputDevices) -> Result<()> {
        let mut state = self.state.lock();
        let standby = state.standby;
        self.core
            .route_output(self.usecase, &mut state.devices, devices, standby)
    }

    /// Close the stream; an active stream is put in standby first
    pub fn close(self) {
        info!("Closing output stream {}", self.usecase);
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        self.standby_locked(&mut state);
    }
}
