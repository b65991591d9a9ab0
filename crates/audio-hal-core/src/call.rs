//! Telephony state of the audio device

use serde::Serialize;

use crate::config::PlatformConfig;
use crate::types::{AudioMode, DualMicConfig, TtyMode};

/// Call and accessory state owned by the device for its whole lifetime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallState {
    pub mode: AudioMode,
    /// Voice call usecase is running
    pub in_call: bool,
    pub tty_mode: TtyMode,
    pub dual_mic: DualMicConfig,
    pub fluence_in_call: bool,
    pub fluence_in_record: bool,
    pub mic_type_analog: bool,
    /// Calibration settings word pushed with the voice devices
    pub settings: u32,
    pub voice_volume: f32,
    pub mic_muted: bool,
    pub bt_nrec: bool,
    pub screen_off: bool,
}

impl CallState {
    pub fn new(config: &PlatformConfig) -> Self {
        let mut settings = TtyMode::Off.settings_bits();
        if config.dual_mic.is_dual() {
            settings |= DualMicConfig::SETTINGS_FLAG;
        }

        Self {
            mode: AudioMode::Normal,
            in_call: false,
            tty_mode: TtyMode::Off,
            dual_mic: config.dual_mic,
            fluence_in_call: config.fluence_in_voice_call,
            fluence_in_record: config.fluence_in_voice_rec,
            mic_type_analog: config.mic_type_analog,
            settings,
            voice_volume: 1.0,
            mic_muted: false,
            bt_nrec: true,
            screen_off: false,
        }
    }

    /// Store a new TTY mode; returns false if it was already set
    pub fn update_tty(&mut self, tty: TtyMode) -> bool {
        if self.tty_mode == tty {
            return false;
        }
        self.tty_mode = tty;
        self.settings = (self.settings & TtyMode::SETTINGS_CLEAR) | tty.settings_bits();
        true
    }

    pub fn in_call_mode(&self) -> bool {
        self.mode == AudioMode::InCall
    }
}

/// Modem volume index for a voice volume; 0 is the loudest step
pub fn voice_volume_index(volume: f32) -> i32 {
    let clamped = volume.clamp(0.0, 1.0);
    100 - (clamped * 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_settings() {
        let state = CallState::new(&PlatformConfig::default());
        assert_eq!(state.settings, 0x10);
        assert_eq!(state.voice_volume, 1.0);
        assert!(state.bt_nrec);

        let dual = PlatformConfig {
            dual_mic: DualMicConfig::Endfire,
            ..Default::default()
        };
        assert_eq!(CallState::new(&dual).settings, 0x12);
    }

    #[test]
    fn test_update_tty_keeps_other_bits() {
        let mut state = CallState::new(&PlatformConfig {
            dual_mic: DualMicConfig::Broadside,
            ..Default::default()
        });
        assert!(state.update_tty(TtyMode::Vco));
        assert_eq!(state.settings, 0x42);
        assert!(!state.update_tty(TtyMode::Vco));
        assert!(state.update_tty(TtyMode::Off));
        assert_eq!(state.settings, 0x12);
    }

    #[test]
    fn test_voice_volume_index() {
        assert_eq!(voice_volume_index(1.0), 0);
        assert_eq!(voice_volume_index(0.0), 100);
        assert_eq!(voice_volume_index(0.4), 60);
        assert_eq!(voice_volume_index(1.7), 0);
        assert_eq!(voice_volume_index(-0.3), 100);
    }
}
