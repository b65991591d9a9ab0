//! Transfer endpoint abstraction
//!
//! The engine never moves samples itself. It opens, starts and closes PCM
//! endpoints through [`TransferEndpoint`] and hands the resulting
//! [`PcmHandle`] to the owning stream.

use serde::{Deserialize, Serialize};

use crate::error::{HalError, Result};
use crate::sound_device::Direction;
use crate::types::SampleFormat;

/// Sound card hosting every transfer endpoint
pub const SOUND_CARD: u32 = 0;

pub const DEFAULT_OUTPUT_SAMPLING_RATE: u32 = 48000;

const LOW_LATENCY_OUTPUT_PERIOD_SIZE: u32 = 240;
const LOW_LATENCY_OUTPUT_PERIOD_COUNT: u32 = 2;
const DEEP_BUFFER_OUTPUT_PERIOD_SIZE: u32 = 960;
const DEEP_BUFFER_OUTPUT_PERIOD_COUNT: u32 = 8;

const HDMI_MULTI_PERIOD_SIZE: u32 = 336;
const HDMI_MULTI_PERIOD_COUNT: u32 = 8;
pub const HDMI_MULTI_DEFAULT_CHANNEL_COUNT: u32 = 6;
/// Byte size of one multichannel period; the frame count is derived from it
pub const HDMI_MULTI_PERIOD_BYTES: u32 = HDMI_MULTI_PERIOD_SIZE * HDMI_MULTI_DEFAULT_CHANNEL_COUNT * 2;

const AUDIO_CAPTURE_PERIOD_COUNT: u32 = 2;

const VOICE_CALL_SAMPLING_RATE: u32 = 8000;
const VOICE_CALL_PERIOD_SIZE: u32 = 160;
const VOICE_CALL_PERIOD_COUNT: u32 = 2;

/// Configuration handed to the transfer endpoint on open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmConfig {
    pub channels: u32,
    pub rate: u32,
    pub period_size: u32,
    pub period_count: u32,
    pub format: SampleFormat,
}

impl PcmConfig {
    pub const fn deep_buffer() -> Self {
        Self {
            channels: 2,
            rate: DEFAULT_OUTPUT_SAMPLING_RATE,
            period_size: DEEP_BUFFER_OUTPUT_PERIOD_SIZE,
            period_count: DEEP_BUFFER_OUTPUT_PERIOD_COUNT,
            format: SampleFormat::Pcm16Bit,
        }
    }

    pub const fn low_latency() -> Self {
        Self {
            channels: 2,
            rate: DEFAULT_OUTPUT_SAMPLING_RATE,
            period_size: LOW_LATENCY_OUTPUT_PERIOD_SIZE,
            period_count: LOW_LATENCY_OUTPUT_PERIOD_COUNT,
            format: SampleFormat::Pcm16Bit,
        }
    }

    pub const fn hdmi_multi() -> Self {
        Self {
            channels: HDMI_MULTI_DEFAULT_CHANNEL_COUNT,
            rate: DEFAULT_OUTPUT_SAMPLING_RATE,
            period_size: HDMI_MULTI_PERIOD_SIZE,
            period_count: HDMI_MULTI_PERIOD_COUNT,
            format: SampleFormat::Pcm16Bit,
        }
    }

    /// Capture defaults; rate, channels and period size are filled in per stream
    pub const fn audio_capture() -> Self {
        Self {
            channels: 2,
            rate: 0,
            period_size: 0,
            period_count: AUDIO_CAPTURE_PERIOD_COUNT,
            format: SampleFormat::Pcm16Bit,
        }
    }

    pub const fn voice_call() -> Self {
        Self {
            channels: 1,
            rate: VOICE_CALL_SAMPLING_RATE,
            period_size: VOICE_CALL_PERIOD_SIZE,
            period_count: VOICE_CALL_PERIOD_COUNT,
            format: SampleFormat::Pcm16Bit,
        }
    }

    /// Period size for a multichannel stream with `channels` channels
    pub const fn hdmi_period_size(channels: u32) -> u32 {
        HDMI_MULTI_PERIOD_BYTES / (channels * 2)
    }

    pub const fn frame_size(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }
}

/// Sample rates accepted from stream clients
pub const SUPPORTED_SAMPLE_RATES: [u32; 9] =
    [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];

pub fn check_sample_rate(rate: u32) -> Result<()> {
    if SUPPORTED_SAMPLE_RATES.contains(&rate) {
        Ok(())
    } else {
        Err(HalError::invalid_argument(format!("unsupported sample rate {}", rate)))
    }
}

pub fn check_format(format: SampleFormat) -> Result<()> {
    match format {
        SampleFormat::Pcm16Bit => Ok(()),
        other => Err(HalError::invalid_argument(format!("unsupported format {}", other))),
    }
}

/// Validate capture parameters
pub fn check_input_parameters(rate: u32, format: SampleFormat, channels: u32) -> Result<()> {
    check_format(format)?;
    if !(1..=2).contains(&channels) {
        return Err(HalError::invalid_argument(format!(
            "unsupported capture channel count {}",
            channels
        )));
    }
    check_sample_rate(rate)
}

/// Capture buffer size in bytes, or 0 for unsupported parameters
pub fn input_buffer_size(rate: u32, format: SampleFormat, channels: u32) -> usize {
    if check_input_parameters(rate, format, channels).is_err() {
        return 0;
    }

    let frames = match rate {
        8000 | 16000 | 32000 => rate as usize * 20 / 1000,
        11025 | 12000 => 256,
        22050 | 24000 => 512,
        _ => 1024,
    };
    frames * std::mem::size_of::<i16>() * channels as usize
}

/// An open transfer endpoint
pub trait PcmHandle: Send {
    /// Whether the endpoint finished opening
    fn is_ready(&self) -> bool;

    /// Driver error text for the last failure
    fn last_error(&self) -> String;

    fn start(&mut self) -> Result<()>;

    fn write(&mut self, data: &[u8]) -> Result<()>;

    fn read(&mut self, data: &mut [u8]) -> Result<()>;

    fn close(&mut self);
}

/// Opens transfer endpoints on the sound card
pub trait TransferEndpoint: Send + Sync {
    fn open(
        &self,
        card: u32,
        device: u32,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn PcmHandle>>;
}
