//! Logical usecases and their fixed routing tables

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pcm::PcmConfig;
use crate::sound_device::{Direction, SoundDevice};

/// A logical audio activity that needs a routing path while active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    PlaybackDeepBuffer,
    PlaybackLowLatency,
    PlaybackMultiChannel,
    Record,
    RecordLowLatency,
    VoiceCall,
}

/// Which physical side a usecase binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsecaseKind {
    Playback,
    Capture,
    VoiceCall,
}

impl UsecaseKind {
    /// Playback and voice-call usecases share the output device
    pub const fn binds_output(self) -> bool {
        matches!(self, Self::Playback | Self::VoiceCall)
    }
}

impl UseCase {
    pub const ALL: [UseCase; 6] = [
        Self::PlaybackDeepBuffer,
        Self::PlaybackLowLatency,
        Self::PlaybackMultiChannel,
        Self::Record,
        Self::RecordLowLatency,
        Self::VoiceCall,
    ];

    /// Base mixer path name
    pub const fn path_name(self) -> &'static str {
        match self {
            Self::PlaybackDeepBuffer => "deep-buffer-playback",
            Self::PlaybackLowLatency => "low-latency-playback",
            Self::PlaybackMultiChannel => "multi-channel-playback",
            Self::Record => "audio-record",
            Self::RecordLowLatency => "low-latency-record",
            Self::VoiceCall => "voice-call",
        }
    }

    /// Transfer-endpoint index for the given direction
    pub const fn pcm_device(self, direction: Direction) -> u32 {
        let (playback, capture) = match self {
            Self::PlaybackDeepBuffer => (0, 0),
            Self::PlaybackLowLatency => (14, 14),
            Self::PlaybackMultiChannel => (1, 1),
            Self::Record => (0, 0),
            Self::RecordLowLatency => (14, 14),
            Self::VoiceCall => (12, 12),
        };
        match direction {
            Direction::Rx => playback,
            Direction::Tx => capture,
        }
    }

    pub const fn kind(self) -> UsecaseKind {
        match self {
            Self::PlaybackDeepBuffer | Self::PlaybackLowLatency | Self::PlaybackMultiChannel => {
                UsecaseKind::Playback
            }
            Self::Record | Self::RecordLowLatency => UsecaseKind::Capture,
            Self::VoiceCall => UsecaseKind::VoiceCall,
        }
    }

    /// Default transfer configuration for the usecase category
    pub fn default_pcm_config(self) -> PcmConfig {
        match self {
            Self::PlaybackDeepBuffer => PcmConfig::deep_buffer(),
            Self::PlaybackLowLatency => PcmConfig::low_latency(),
            Self::PlaybackMultiChannel => PcmConfig::hdmi_multi(),
            Self::Record | Self::RecordLowLatency => PcmConfig::audio_capture(),
            Self::VoiceCall => PcmConfig::voice_call(),
        }
    }

    /// Mixer path for this usecase routed to `device`
    pub fn mixer_path(self, device: SoundDevice) -> String {
        match device.backend_suffix() {
            Some(suffix) => format!("{} {}", self.path_name(), suffix),
            None => self.path_name().to_string(),
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_name())
    }
}
