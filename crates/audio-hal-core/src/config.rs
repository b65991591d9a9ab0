//! Platform configuration
//!
//! The board's audio characteristics are read once at device open, either from
//! the system property store or from a JSON document.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HalError, Result};
use crate::types::DualMicConfig;

pub const PROP_HANDSET_MIC_TYPE: &str = "persist.audio.handset.mic.type";
pub const PROP_DUALMIC_CONFIG: &str = "persist.audio.dualmic.config";
pub const PROP_FLUENCE_VOICECALL: &str = "persist.audio.fluence.voicecall";
pub const PROP_FLUENCE_VOICEREC: &str = "persist.audio.fluence.voicerec";
pub const PROP_BOARD_PLATFORM: &str = "ro.board.platform";
pub const PROP_BASEBAND: &str = "ro.baseband";
pub const PROP_SIM_OPERATOR: &str = "gsm.sim.operator.numeric";

/// Platform whose voice calls run on an external modem
const VOICE_CHANNEL_PLATFORM: &str = "msm8960";
const VOICE_CHANNEL_BASEBAND: &str = "mdm";

/// Read access to the system property store
pub trait PropertySource {
    fn property(&self, key: &str) -> Option<String>;
}

impl PropertySource for HashMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Audio characteristics of the board
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Handset microphone is analog
    pub mic_type_analog: bool,
    pub dual_mic: DualMicConfig,
    /// Fluence noise suppression during voice calls
    pub fluence_in_voice_call: bool,
    /// Fluence noise suppression during voice recognition
    pub fluence_in_voice_rec: bool,
    pub board_platform: String,
    pub baseband: String,
    /// SIM operator MCC+MNC code
    pub sim_operator: String,
}

impl PlatformConfig {
    /// Build the configuration from the property store
    pub fn from_properties(props: &dyn PropertySource) -> Self {
        let get = |key: &str| props.property(key).unwrap_or_default();

        let dual_mic = match get(PROP_DUALMIC_CONFIG).as_str() {
            v if v.starts_with("broadside") => DualMicConfig::Broadside,
            v if v.starts_with("endfire") => DualMicConfig::Endfire,
            _ => DualMicConfig::None,
        };

        let config = Self {
            mic_type_analog: get(PROP_HANDSET_MIC_TYPE).starts_with("analog"),
            dual_mic,
            fluence_in_voice_call: get(PROP_FLUENCE_VOICECALL).starts_with("true"),
            fluence_in_voice_rec: get(PROP_FLUENCE_VOICEREC).starts_with("true"),
            board_platform: get(PROP_BOARD_PLATFORM),
            baseband: get(PROP_BASEBAND),
            sim_operator: get(PROP_SIM_OPERATOR),
        }
        .normalized();

        debug!("Platform config from properties: {:?}", config);
        config
    }

    /// Parse the configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| HalError::invalid_argument(format!("platform config: {}", e)))?;
        Ok(config.normalized())
    }

    /// Fluence is only honoured with a dual-mic array
    fn normalized(mut self) -> Self {
        if !self.dual_mic.is_dual() && (self.fluence_in_voice_call || self.fluence_in_voice_rec) {
            warn!("Fluence requested without a dual-mic configuration, ignoring");
            self.fluence_in_voice_call = false;
            self.fluence_in_voice_rec = false;
        }
        self
    }

    /// Whether the board routes voice calls through an external modem
    pub fn has_voice_channel_platform(&self) -> bool {
        self.board_platform == VOICE_CHANNEL_PLATFORM && self.baseband == VOICE_CHANNEL_BASEBAND
    }
}
