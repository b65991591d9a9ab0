//! Small value types shared by the selector, the call state and the streams

use std::fmt;

use serde::{Deserialize, Serialize};

/// Telephony mode of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    #[default]
    Normal,
    Ringtone,
    /// Circuit-switched call in progress
    InCall,
    /// VoIP or other communication session
    InCommunication,
}

/// Capture source requested by the active input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    #[default]
    Default,
    Mic,
    VoiceUplink,
    VoiceDownlink,
    VoiceCall,
    Camcorder,
    VoiceRecognition,
    VoiceCommunication,
}

impl AudioSource {
    /// Map the platform's numeric source id
    pub fn from_raw(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Default,
            1 => Self::Mic,
            2 => Self::VoiceUplink,
            3 => Self::VoiceDownlink,
            4 => Self::VoiceCall,
            5 => Self::Camcorder,
            6 => Self::VoiceRecognition,
            7 => Self::VoiceCommunication,
            _ => return None,
        })
    }
}

/// TTY accessibility submode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtyMode {
    #[default]
    Off,
    Full,
    /// Voice carry-over
    Vco,
    /// Hearing carry-over
    Hco,
}

impl TtyMode {
    /// Calibration settings bits that clear the TTY field
    pub const SETTINGS_CLEAR: u32 = 0xFFFF_FF0F;

    /// Bits carried in the calibration settings word
    pub const fn settings_bits(self) -> u32 {
        match self {
            Self::Off => 0x10,
            Self::Full => 0x20,
            Self::Vco => 0x40,
            Self::Hco => 0x80,
        }
    }

    /// Parse the control-message value (`tty_off`, `tty_full`, ...)
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "tty_off" => Some(Self::Off),
            "tty_full" => Some(Self::Full),
            "tty_vco" => Some(Self::Vco),
            "tty_hco" => Some(Self::Hco),
            _ => None,
        }
    }
}

/// Physical geometry of a dual-microphone array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DualMicConfig {
    #[default]
    None,
    Endfire,
    Broadside,
}

impl DualMicConfig {
    /// Calibration settings flag for any dual-mic configuration
    pub const SETTINGS_FLAG: u32 = 0x2;

    pub const fn is_dual(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Sample format of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    #[default]
    Pcm16Bit,
    Pcm8Bit,
    Pcm24Bit,
    Pcm32Bit,
    PcmFloat,
}

impl SampleFormat {
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::Pcm8Bit => 1,
            Self::Pcm16Bit => 2,
            Self::Pcm24Bit => 3,
            Self::Pcm32Bit | Self::PcmFloat => 4,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pcm16Bit => "pcm16",
            Self::Pcm8Bit => "pcm8",
            Self::Pcm24Bit => "pcm24",
            Self::Pcm32Bit => "pcm32",
            Self::PcmFloat => "pcm-float",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tty_settings_bits() {
        let settings = 0x12u32;
        let updated = (settings & TtyMode::SETTINGS_CLEAR) | TtyMode::Full.settings_bits();
        assert_eq!(updated, 0x22);
        assert_eq!(TtyMode::from_param("tty_hco"), Some(TtyMode::Hco));
        assert_eq!(TtyMode::from_param("tty_loud"), None);
    }

    #[test]
    fn test_source_from_raw() {
        assert_eq!(AudioSource::from_raw(6), Some(AudioSource::VoiceRecognition));
        assert_eq!(AudioSource::from_raw(42), None);
    }
}
