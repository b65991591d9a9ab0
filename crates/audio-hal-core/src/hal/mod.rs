//! The audio device and its streams
//!
//! [`AudioHal`] is the device handle. It owns the device-global state through
//! a shared core and hands out [`OutputStream`] and [`InputStream`] values,
//! each with its own lock.

mod device;
mod input;
mod output;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use self::input::InputStream;
pub use self::output::OutputStream;

use self::device::DeviceCore;
use crate::call::CallState;
use crate::capabilities::{Capabilities, CalibrationGateway};
use crate::config::PlatformConfig;
use crate::devices::{ChannelMask, InputDevices, InputFlags, OutputDevices, OutputFlags};
use crate::error::{HalError, Result};
use crate::hdmi::EdidReader;
use crate::mixer::MixerPathEngine;
use crate::pcm::{self, DEFAULT_OUTPUT_SAMPLING_RATE, PcmConfig, TransferEndpoint};
use crate::registry::UsecaseEntry;
use crate::routing::DeviceState;
use crate::selector::InputRequest;
use crate::types::{AudioMode, AudioSource, SampleFormat, TtyMode};
use crate::usecase::UseCase;

/// External collaborators the device drives
pub struct HalBackends {
    pub mixer: Box<dyn MixerPathEngine>,
    pub pcm: Arc<dyn TransferEndpoint>,
    /// Vendor calibration library; `None` selects the no-op fallback
    pub gateway: Option<Arc<dyn CalibrationGateway>>,
    pub edid: Arc<dyn EdidReader>,
}

/// Stream parameters requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 0 selects the stream's default rate
    pub sample_rate: u32,
    /// Empty selects the stream's default mask
    pub channel_mask: ChannelMask,
    pub format: SampleFormat,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 0,
            channel_mask: ChannelMask::empty(),
            format: SampleFormat::Pcm16Bit,
        }
    }
}

impl StreamConfig {
    pub fn new(sample_rate: u32, channel_mask: ChannelMask) -> Self {
        Self {
            sample_rate,
            channel_mask,
            ..Default::default()
        }
    }
}

/// Sleep for the time `bytes` would take to play or record
pub(crate) fn pace_failed_transfer(bytes: usize, frame_size: usize, rate: u32) {
    if frame_size == 0 || rate == 0 {
        return;
    }
    let micros = bytes as u64 * 1_000_000 / frame_size as u64 / u64::from(rate);
    std::thread::sleep(Duration::from_micros(micros));
}

/// The primary audio device
#[derive(Clone)]
pub struct AudioHal {
    core: Arc<DeviceCore>,
}

impl AudioHal {
    pub fn open(config: PlatformConfig, backends: HalBackends) -> Self {
        info!(
            "Opening audio device on {} ({})",
            config.board_platform, config.baseband
        );
        let capabilities = Arc::new(Capabilities::new(&config, backends.gateway));
        capabilities.init_vendor();
        let call = CallState::new(&config);
        let core = DeviceCore::new(call, capabilities, backends.mixer, backends.pcm, backends.edid);
        Self {
            core: Arc::new(core),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.core.capabilities()
    }

    pub fn set_mode(&self, mode: AudioMode) {
        self.core.set_mode(mode);
    }

    pub fn set_tty_mode(&self, tty: TtyMode) -> Result<()> {
        self.core.set_tty_mode(tty)
    }

    pub fn set_bt_nrec(&self, enabled: bool) {
        self.core.set_bt_nrec(enabled);
    }

    pub fn set_screen_state(&self, on: bool) {
        self.core.set_screen_state(on);
    }

    /// Set the in-call volume, clamped to [0, 1]
    pub fn set_voice_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            warn!("Voice volume {} out of range, clamping", volume);
        }
        self.core.set_voice_volume(volume.clamp(0.0, 1.0))
    }

    pub fn set_mic_mute(&self, muted: bool) -> Result<()> {
        self.core.set_mic_mute(muted)
    }

    pub fn mic_mute(&self) -> bool {
        self.core.mic_muted()
    }

    /// Capture buffer size in bytes, or 0 for unsupported parameters
    pub fn input_buffer_size(&self, rate: u32, format: SampleFormat, channels: u32) -> usize {
        pcm::input_buffer_size(rate, format, channels)
    }

    pub fn start_voice_call(&self) -> Result<()> {
        self.core.start_voice_call()
    }

    pub fn stop_voice_call(&self) -> Result<()> {
        self.core.stop_voice_call()
    }

    pub fn device_state(&self) -> DeviceState {
        self.core.device_state()
    }

    pub fn call_state(&self) -> CallState {
        self.core.call_state()
    }

    /// Registered usecases in start order
    pub fn active_usecases(&self) -> Vec<UsecaseEntry> {
        self.core.active_usecases()
    }

    /// Aggregate output devices requested by active usecases
    pub fn requested_output(&self) -> OutputDevices {
        self.core.requested_output()
    }

    /// Open a playback stream in standby
    pub fn open_output_stream(
        &self,
        devices: OutputDevices,
        flags: OutputFlags,
        config: StreamConfig,
    ) -> Result<OutputStream> {
        let devices = if devices.is_empty() {
            OutputDevices::SPEAKER
        } else {
            devices
        };
        debug!("Open output stream devices {:?} flags {:?}", devices, flags);
        pcm::check_format(config.format)?;
        if config.sample_rate != 0 {
            pcm::check_sample_rate(config.sample_rate)?;
        }

        let multichannel =
            flags.contains(OutputFlags::DIRECT) && devices.intersects(OutputDevices::AUX_DIGITAL);
        let usecase = if multichannel {
            UseCase::PlaybackMultiChannel
        } else if flags.contains(OutputFlags::DEEP_BUFFER) {
            UseCase::PlaybackDeepBuffer
        } else {
            UseCase::PlaybackLowLatency
        };

        if self.core.is_registered(usecase) {
            return Err(HalError::AlreadyExists { usecase });
        }

        let (pcm_config, channel_mask, supported) = if multichannel {
            self.multichannel_config(config)?
        } else {
            (
                usecase.default_pcm_config(),
                ChannelMask::OUT_STEREO,
                vec![ChannelMask::OUT_STEREO],
            )
        };

        info!(
            "Opened output stream {} rate {} channels {}",
            usecase, pcm_config.rate, pcm_config.channels
        );
        Ok(OutputStream::new(
            Arc::clone(&self.core),
            usecase,
            devices,
            flags,
            pcm_config,
            channel_mask,
            supported,
        ))
    }

    fn multichannel_config(
        &self,
        config: StreamConfig,
    ) -> Result<(PcmConfig, ChannelMask, Vec<ChannelMask>)> {
        let negotiated = self.core.negotiate_hdmi();
        let channel_mask = if config.channel_mask.is_empty() {
            ChannelMask::OUT_5POINT1
        } else {
            config.channel_mask
        };

        if negotiated.is_empty() {
            warn!("HDMI sink reported no multichannel support, using {:?}", channel_mask);
        } else if !negotiated.contains(&channel_mask) {
            return Err(HalError::invalid_argument(format!(
                "channel mask {:?} not supported by HDMI sink",
                channel_mask
            )));
        }

        let channels = channel_mask.channel_count();
        let mut pcm_config = PcmConfig::hdmi_multi();
        pcm_config.channels = channels;
        pcm_config.rate = if config.sample_rate == 0 {
            DEFAULT_OUTPUT_SAMPLING_RATE
        } else {
            config.sample_rate
        };
        pcm_config.period_size = PcmConfig::hdmi_period_size(channels);
        self.core.set_hdmi_channels(channels)?;

        let supported = if negotiated.is_empty() {
            vec![ChannelMask::OUT_STEREO]
        } else {
            negotiated
        };
        Ok((pcm_config, channel_mask, supported))
    }

    /// Open a capture stream in standby
    pub fn open_input_stream(
        &self,
        devices: InputDevices,
        config: StreamConfig,
        flags: InputFlags,
    ) -> Result<InputStream> {
        let channels = config.channel_mask.channel_count();
        debug!(
            "Open input stream devices {:?} rate {} channels {}",
            devices, config.sample_rate, channels
        );
        pcm::check_input_parameters(config.sample_rate, config.format, channels)?;

        let usecase = if flags.contains(InputFlags::FAST) {
            UseCase::RecordLowLatency
        } else {
            UseCase::Record
        };
        if self.core.is_registered(usecase) {
            return Err(HalError::AlreadyExists { usecase });
        }

        let mut pcm_config = usecase.default_pcm_config();
        pcm_config.channels = channels;
        pcm_config.rate = config.sample_rate;
        let buffer_size = pcm::input_buffer_size(config.sample_rate, config.format, channels);
        pcm_config.period_size = (buffer_size / pcm_config.frame_size()) as u32;

        let request = InputRequest::new(AudioSource::Default, devices, config.channel_mask);
        info!(
            "Opened input stream {} rate {} channels {}",
            usecase, pcm_config.rate, channels
        );
        Ok(InputStream::new(
            Arc::clone(&self.core),
            usecase,
            flags,
            pcm_config,
            request,
        ))
    }
}

impl std::fmt::Debug for AudioHal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioHal")
            .field("capabilities", self.core.capabilities())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FixedEdid, MixerOp, MockGateway, MockPcm, PcmEvent, RecordingMixer};
    use crate::sound_device::{Direction, SoundDevice};

    struct Rig {
        hal: AudioHal,
        mixer: RecordingMixer,
        pcm: MockPcm,
    }

    fn rig(edid_channels: u32) -> Rig {
        let mixer = RecordingMixer::new();
        let pcm = MockPcm::new();
        let backends = HalBackends {
            mixer: Box::new(mixer.clone()),
            pcm: Arc::new(pcm.clone()),
            gateway: Some(Arc::new(MockGateway::new())),
            edid: Arc::new(FixedEdid(edid_channels)),
        };
        Rig {
            hal: AudioHal::open(PlatformConfig::default(), backends),
            mixer,
            pcm,
        }
    }

    #[test]
    fn test_output_defaults_to_speaker_low_latency() {
        let rig = rig(0);
        let out = rig
            .hal
            .open_output_stream(OutputDevices::empty(), OutputFlags::PRIMARY, StreamConfig::default())
            .unwrap();

        assert_eq!(out.usecase(), UseCase::PlaybackLowLatency);
        assert_eq!(out.devices(), OutputDevices::SPEAKER);
        assert!(out.is_standby());
        assert_eq!(out.sample_rate(), 48000);
        assert_eq!(out.buffer_size(), 240 * 4);
        assert_eq!(out.latency_ms(), 10);
        assert_eq!(out.supported_channels(), "AUDIO_CHANNEL_OUT_STEREO");
        assert!(rig.pcm.events().is_empty());
    }

    #[test]
    fn test_output_rejects_bad_format_and_rate() {
        let rig = rig(0);
        let mut config = StreamConfig::default();
        config.format = SampleFormat::Pcm8Bit;
        assert!(matches!(
            rig.hal.open_output_stream(OutputDevices::SPEAKER, OutputFlags::empty(), config),
            Err(HalError::InvalidArgument { .. })
        ));

        let config = StreamConfig::new(44000, ChannelMask::empty());
        assert!(matches!(
            rig.hal.open_output_stream(OutputDevices::SPEAKER, OutputFlags::empty(), config),
            Err(HalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_write_starts_and_standby_stops() {
        let rig = rig(0);
        let out = rig
            .hal
            .open_output_stream(OutputDevices::SPEAKER, OutputFlags::DEEP_BUFFER, StreamConfig::default())
            .unwrap();

        assert_eq!(out.write(&[0u8; 3840]), 3840);
        assert!(!out.is_standby());
        assert_eq!(rig.hal.device_state().current_output, SoundDevice::Speaker);
        assert_eq!(rig.mixer.applied("speaker"), 1);
        assert_eq!(rig.mixer.applied("deep-buffer-playback"), 1);
        assert_eq!(rig.pcm.open_endpoints(), vec![(0, Direction::Rx)]);

        out.standby();
        assert!(out.is_standby());
        assert!(rig.hal.active_usecases().is_empty());
        assert!(rig.pcm.open_endpoints().is_empty());
        assert_eq!(rig.mixer.reset("speaker"), 1);
        assert!(!rig.hal.device_state().output_active);
    }

    #[test]
    fn test_failed_write_forces_standby() {
        let rig = rig(0);
        let out = rig
            .hal
            .open_output_stream(OutputDevices::SPEAKER, OutputFlags::empty(), StreamConfig::default())
            .unwrap();
        rig.pcm.fail_io(true);

        // 192 bytes of stereo 16-bit at 48 kHz is one millisecond
        assert_eq!(out.write(&[0u8; 192]), 192);
        assert!(out.is_standby());
        assert!(rig.hal.active_usecases().is_empty());
    }

    #[test]
    fn test_hdmi_output_sets_channels() {
        let rig = rig(8);
        let config = StreamConfig::new(0, ChannelMask::OUT_7POINT1);
        let out = rig
            .hal
            .open_output_stream(OutputDevices::AUX_DIGITAL, OutputFlags::DIRECT, config)
            .unwrap();

        assert_eq!(out.usecase(), UseCase::PlaybackMultiChannel);
        assert_eq!(out.pcm_config().channels, 8);
        assert_eq!(out.pcm_config().period_size, 252);
        assert_eq!(
            out.supported_channels(),
            "AUDIO_CHANNEL_OUT_5POINT1|AUDIO_CHANNEL_OUT_7POINT1"
        );
        assert!(rig.mixer.ops().contains(&MixerOp::SetEnum(
            "HDMI_RX Channels".to_string(),
            "Eight".to_string()
        )));
    }

    #[test]
    fn test_direct_stream_including_hdmi_is_multichannel() {
        let rig = rig(6);
        let out = rig
            .hal
            .open_output_stream(
                OutputDevices::AUX_DIGITAL | OutputDevices::SPEAKER,
                OutputFlags::DIRECT,
                StreamConfig::default(),
            )
            .unwrap();
        assert_eq!(out.usecase(), UseCase::PlaybackMultiChannel);
        assert_eq!(out.devices(), OutputDevices::AUX_DIGITAL | OutputDevices::SPEAKER);

        let low = rig
            .hal
            .open_output_stream(OutputDevices::SPEAKER, OutputFlags::DIRECT, StreamConfig::default())
            .unwrap();
        assert_eq!(low.usecase(), UseCase::PlaybackLowLatency);
    }

    #[test]
    fn test_hdmi_output_rejects_unsupported_mask() {
        let rig = rig(6);
        let config = StreamConfig::new(0, ChannelMask::OUT_7POINT1);
        let err = rig
            .hal
            .open_output_stream(OutputDevices::AUX_DIGITAL, OutputFlags::DIRECT, config)
            .unwrap_err();
        assert!(matches!(err, HalError::InvalidArgument { .. }));
    }

    #[test]
    fn test_input_open_and_read() {
        let rig = rig(0);
        let config = StreamConfig::new(16000, ChannelMask::IN_MONO);
        let input = rig
            .hal
            .open_input_stream(InputDevices::BUILTIN_MIC, config, InputFlags::empty())
            .unwrap();

        assert_eq!(input.usecase(), UseCase::Record);
        assert_eq!(input.buffer_size(), 640);
        assert_eq!(input.pcm_config().period_size, 320);

        let mut buffer = [0u8; 640];
        assert_eq!(input.read(&mut buffer), 640);
        assert!(!input.is_standby());
        assert_eq!(rig.hal.device_state().current_input, SoundDevice::HandsetMic);
        assert!(rig.pcm.events().iter().any(|e| matches!(
            e,
            PcmEvent::Open { device: 0, direction: Direction::Tx, .. }
        )));
    }

    #[test]
    fn test_input_rejects_three_channels() {
        let rig = rig(0);
        let config = StreamConfig::new(48000, ChannelMask::from_bits(0x1C));
        assert!(rig
            .hal
            .open_input_stream(InputDevices::BUILTIN_MIC, config, InputFlags::empty())
            .is_err());
    }

    #[test]
    fn test_fast_input_uses_low_latency_record() {
        let rig = rig(0);
        let config = StreamConfig::new(48000, ChannelMask::IN_STEREO);
        let input = rig
            .hal
            .open_input_stream(InputDevices::BUILTIN_MIC, config, InputFlags::FAST)
            .unwrap();
        assert_eq!(input.usecase(), UseCase::RecordLowLatency);
    }
}
