//! Physical sound devices
//!
//! A [`SoundDevice`] names one physical signal path. Each device has a mixer
//! path of the same name and a vendor calibration id. Both tables are written
//! as exhaustive matches so a new variant cannot be added without its entries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a calibration or transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Playback (receive side of the device)
    Rx,
    /// Capture (transmit side of the device)
    Tx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundDevice {
    #[default]
    None,

    // Playback
    Handset,
    Speaker,
    Headphones,
    SpeakerAndHeadphones,
    VoiceSpeaker,
    VoiceHeadphones,
    Hdmi,
    SpeakerAndHdmi,
    BtSco,
    VoiceHandsetTmus,
    VoiceTtyFullHeadphones,
    VoiceTtyVcoHeadphones,
    VoiceTtyHcoHandset,

    // Capture
    HandsetMic,
    SpeakerMic,
    HeadsetMic,
    VoiceSpeakerMic,
    VoiceHeadsetMic,
    HdmiMic,
    BtScoMic,
    CamcorderMic,
    VoiceDmicEf,
    VoiceDmicBs,
    VoiceDmicEfTmus,
    VoiceSpeakerDmicEf,
    VoiceSpeakerDmicBs,
    VoiceTtyFullHeadsetMic,
    VoiceTtyVcoHandsetMic,
    VoiceTtyHcoHeadsetMic,
    VoiceRecMic,
    VoiceRecDmicEf,
    VoiceRecDmicBs,
    VoiceRecDmicEfFluence,
    VoiceRecDmicBsFluence,
}

impl SoundDevice {
    /// Every device, sentinel first, then playback, then capture
    pub const ALL: [SoundDevice; 35] = [
        Self::None,
        Self::Handset,
        Self::Speaker,
        Self::Headphones,
        Self::SpeakerAndHeadphones,
        Self::VoiceSpeaker,
        Self::VoiceHeadphones,
        Self::Hdmi,
        Self::SpeakerAndHdmi,
        Self::BtSco,
        Self::VoiceHandsetTmus,
        Self::VoiceTtyFullHeadphones,
        Self::VoiceTtyVcoHeadphones,
        Self::VoiceTtyHcoHandset,
        Self::HandsetMic,
        Self::SpeakerMic,
        Self::HeadsetMic,
        Self::VoiceSpeakerMic,
        Self::VoiceHeadsetMic,
        Self::HdmiMic,
        Self::BtScoMic,
        Self::CamcorderMic,
        Self::VoiceDmicEf,
        Self::VoiceDmicBs,
        Self::VoiceDmicEfTmus,
        Self::VoiceSpeakerDmicEf,
        Self::VoiceSpeakerDmicBs,
        Self::VoiceTtyFullHeadsetMic,
        Self::VoiceTtyVcoHandsetMic,
        Self::VoiceTtyHcoHeadsetMic,
        Self::VoiceRecMic,
        Self::VoiceRecDmicEf,
        Self::VoiceRecDmicBs,
        Self::VoiceRecDmicEfFluence,
        Self::VoiceRecDmicBsFluence,
    ];

    /// Mixer path name of the device
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Handset => "handset",
            Self::Speaker => "speaker",
            Self::Headphones => "headphones",
            Self::SpeakerAndHeadphones => "speaker-and-headphones",
            Self::VoiceSpeaker => "voice-speaker",
            Self::VoiceHeadphones => "voice-headphones",
            Self::Hdmi => "hdmi",
            Self::SpeakerAndHdmi => "speaker-and-hdmi",
            Self::BtSco => "bt-sco-headset",
            Self::VoiceHandsetTmus => "voice-handset-tmus",
            Self::VoiceTtyFullHeadphones => "voice-tty-full-headphones",
            Self::VoiceTtyVcoHeadphones => "voice-tty-vco-headphones",
            Self::VoiceTtyHcoHandset => "voice-tty-hco-handset",
            Self::HandsetMic => "handset-mic",
            Self::SpeakerMic => "speaker-mic",
            Self::HeadsetMic => "headset-mic",
            Self::VoiceSpeakerMic => "voice-speaker-mic",
            Self::VoiceHeadsetMic => "voice-headset-mic",
            Self::HdmiMic => "hdmi-mic",
            Self::BtScoMic => "bt-sco-mic",
            Self::CamcorderMic => "camcorder-mic",
            Self::VoiceDmicEf => "voice-dmic-ef",
            Self::VoiceDmicBs => "voice-dmic-bs",
            Self::VoiceDmicEfTmus => "voice-dmic-ef-tmus",
            Self::VoiceSpeakerDmicEf => "voice-speaker-dmic-ef",
            Self::VoiceSpeakerDmicBs => "voice-speaker-dmic-bs",
            Self::VoiceTtyFullHeadsetMic => "voice-tty-full-headset-mic",
            Self::VoiceTtyVcoHandsetMic => "voice-tty-vco-handset-mic",
            Self::VoiceTtyHcoHeadsetMic => "voice-tty-hco-headset-mic",
            Self::VoiceRecMic => "voice-rec-mic",
            Self::VoiceRecDmicEf => "voice-rec-dmic-ef",
            Self::VoiceRecDmicBs => "voice-rec-dmic-bs",
            Self::VoiceRecDmicEfFluence => "voice-rec-dmic-ef-fluence",
            Self::VoiceRecDmicBsFluence => "voice-rec-dmic-bs-fluence",
        }
    }

    /// Vendor calibration id; the sentinel has none
    pub const fn calibration_id(self) -> Option<i32> {
        let id = match self {
            Self::None => return None,
            Self::Handset => 7,
            Self::Speaker => 14,
            Self::Headphones => 10,
            Self::SpeakerAndHeadphones => 10,
            Self::VoiceSpeaker => 14,
            Self::VoiceHeadphones => 10,
            Self::Hdmi => 18,
            Self::SpeakerAndHdmi => 14,
            Self::BtSco => 22,
            Self::VoiceHandsetTmus => 81,
            Self::VoiceTtyFullHeadphones => 17,
            Self::VoiceTtyVcoHeadphones => 17,
            Self::VoiceTtyHcoHandset => 37,
            Self::HandsetMic => 4,
            Self::SpeakerMic => 4,
            Self::HeadsetMic => 8,
            Self::VoiceSpeakerMic => 11,
            Self::VoiceHeadsetMic => 8,
            Self::HdmiMic => 4,
            Self::BtScoMic => 21,
            Self::CamcorderMic => 61,
            Self::VoiceDmicEf => 6,
            Self::VoiceDmicBs => 5,
            Self::VoiceDmicEfTmus => 91,
            Self::VoiceSpeakerDmicEf => 13,
            Self::VoiceSpeakerDmicBs => 12,
            Self::VoiceTtyFullHeadsetMic => 16,
            Self::VoiceTtyVcoHandsetMic => 36,
            Self::VoiceTtyHcoHeadsetMic => 16,
            Self::VoiceRecMic => 62,
            Self::VoiceRecDmicEf => 62,
            Self::VoiceRecDmicBs => 62,
            // TODO: dedicated fluence profiles once the vendor publishes ids for them
            Self::VoiceRecDmicEfFluence => 62,
            Self::VoiceRecDmicBsFluence => 62,
        };
        Some(id)
    }

    /// Direction of the device; `None` for the sentinel
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::None => None,
            Self::Handset
            | Self::Speaker
            | Self::Headphones
            | Self::SpeakerAndHeadphones
            | Self::VoiceSpeaker
            | Self::VoiceHeadphones
            | Self::Hdmi
            | Self::SpeakerAndHdmi
            | Self::BtSco
            | Self::VoiceHandsetTmus
            | Self::VoiceTtyFullHeadphones
            | Self::VoiceTtyVcoHeadphones
            | Self::VoiceTtyHcoHandset => Some(Direction::Rx),
            _ => Some(Direction::Tx),
        }
    }

    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    pub const fn is_output(self) -> bool {
        matches!(self.direction(), Some(Direction::Rx))
    }

    pub const fn is_input(self) -> bool {
        matches!(self.direction(), Some(Direction::Tx))
    }

    /// Suffix selecting an alternate backend in usecase mixer paths
    pub const fn backend_suffix(self) -> Option<&'static str> {
        match self {
            Self::Hdmi | Self::HdmiMic => Some("hdmi"),
            Self::BtSco | Self::BtScoMic => Some("bt-sco"),
            Self::SpeakerAndHdmi => Some("speaker-and-hdmi"),
            _ => None,
        }
    }
}

impl fmt::Display for SoundDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_complete_and_unique() {
        let names: HashSet<_> = SoundDevice::ALL.iter().map(|d| d.name()).collect();
        assert_eq!(names.len(), SoundDevice::ALL.len());

        for device in SoundDevice::ALL.iter().skip(1) {
            assert!(device.calibration_id().is_some(), "{} has no calibration id", device);
            assert!(device.direction().is_some());
        }
        assert_eq!(SoundDevice::None.calibration_id(), None);
    }

    #[test]
    fn test_partitions() {
        let outputs = SoundDevice::ALL.iter().filter(|d| d.is_output()).count();
        let inputs = SoundDevice::ALL.iter().filter(|d| d.is_input()).count();
        assert_eq!(outputs, 13);
        assert_eq!(inputs, 21);
        assert!(!SoundDevice::None.is_output() && !SoundDevice::None.is_input());
    }

    #[test]
    fn test_backend_suffix() {
        assert_eq!(SoundDevice::Hdmi.backend_suffix(), Some("hdmi"));
        assert_eq!(SoundDevice::BtScoMic.backend_suffix(), Some("bt-sco"));
        assert_eq!(SoundDevice::SpeakerAndHdmi.backend_suffix(), Some("speaker-and-hdmi"));
        assert_eq!(SoundDevice::Speaker.backend_suffix(), None);
    }
}
