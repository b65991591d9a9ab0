#![allow(dead_code)]

use std::sync::Arc;

use audio_hal_core::mock::{FixedEdid, MockGateway, MockPcm, RecordingMixer};
use audio_hal_core::{AudioHal, HalBackends, PlatformConfig};

/// A device wired to in-memory collaborators
pub struct Rig {
    pub hal: AudioHal,
    pub mixer: RecordingMixer,
    pub pcm: MockPcm,
    pub gateway: MockGateway,
}

impl Rig {
    pub fn new(config: PlatformConfig, edid_channels: u32) -> Self {
        let mixer = RecordingMixer::new();
        let pcm = MockPcm::new();
        let gateway = MockGateway::new();
        let backends = HalBackends {
            mixer: Box::new(mixer.clone()),
            pcm: Arc::new(pcm.clone()),
            gateway: Some(Arc::new(gateway.clone())),
            edid: Arc::new(FixedEdid(edid_channels)),
        };
        let hal = AudioHal::open(config, backends);
        // Vendor library init at open is asserted on its own
        gateway.clear();
        Self {
            hal,
            mixer,
            pcm,
            gateway,
        }
    }

    /// Plain device without a voice channel
    pub fn basic() -> Self {
        Self::new(PlatformConfig::default(), 2)
    }

    /// Device on a platform with a modem voice channel
    pub fn voice() -> Self {
        Self::new(voice_platform(), 2)
    }
}

pub fn voice_platform() -> PlatformConfig {
    PlatformConfig {
        board_platform: "msm8960".to_string(),
        baseband: "mdm".to_string(),
        ..Default::default()
    }
}

/// One period of stereo 16-bit silence at 48 kHz
pub fn period() -> Vec<u8> {
    vec![0u8; 240 * 4]
}
