//! Vendor capabilities resolved once at device open
//!
//! [`Capabilities`] is built a single time and is immutable afterwards. The
//! selector and the routing controller read it by reference; nothing in the
//! engine re-derives carrier or vendor state on its own.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::PlatformConfig;
use crate::error::{HalError, Result};
use crate::sound_device::Direction;

/// Operator codes (MCC+MNC) that use the carrier-specific handset tuning
pub const CARRIER_VARIANT_OPERATORS: [u32; 3] = [310490, 310260, 310026];

/// Vendor calibration and voice-signaling entry points.
///
/// Every method defaults to [`HalError::MissingCapability`]; an implementation
/// overrides only the entry points its vendor libraries provide.
pub trait CalibrationGateway: Send + Sync {
    /// Load the calibration database
    fn init_calibration(&self) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "acdb_loader_init_ACDB" })
    }

    fn deinit_calibration(&self) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "acdb_loader_deallocate_ACDB" })
    }

    /// Connect to the modem voice client
    fn init_voice_client(&self) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "csd_client_init" })
    }

    fn deinit_voice_client(&self) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "csd_client_deinit" })
    }

    /// Push the audio calibration profile for a device
    fn send_audio_cal(&self, _cal_id: i32, _direction: Direction) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "acdb_loader_send_audio_cal" })
    }

    fn enable_voice_device(&self, _rx_cal_id: i32, _tx_cal_id: i32, _settings: u32) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "csd_client_enable_device" })
    }

    fn disable_voice_device(&self) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "csd_client_disable_device" })
    }

    fn start_voice_call(&self) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "csd_client_start_voice" })
    }

    fn stop_voice_call(&self) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "csd_client_stop_voice" })
    }

    /// Set the modem voice volume; 0 is loudest
    fn set_voice_volume_index(&self, _index: i32) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "csd_client_volume" })
    }

    fn set_mic_mute(&self, _muted: bool) -> Result<()> {
        Err(HalError::MissingCapability { entry_point: "csd_client_mic_mute" })
    }
}

/// Gateway used when no vendor library is available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGateway;

impl CalibrationGateway for NoopGateway {}

/// Downgrade a missing entry point to a logged no-op
pub fn degrade(result: Result<()>) -> Result<()> {
    match result {
        Err(HalError::MissingCapability { entry_point }) => {
            warn!("Vendor entry point {} unavailable, skipping", entry_point);
            Ok(())
        }
        other => other,
    }
}

/// Whether the SIM operator code selects the carrier-specific devices
pub fn is_carrier_variant(operator_numeric: &str) -> bool {
    let digits: String = operator_numeric
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse::<u32>()
        .map(|code| CARRIER_VARIANT_OPERATORS.contains(&code))
        .unwrap_or(false)
}

/// Immutable vendor and carrier state
#[derive(Clone)]
pub struct Capabilities {
    pub carrier_variant: bool,
    pub gateway: Arc<dyn CalibrationGateway>,
    /// A voice-signaling channel to the modem is present
    pub voice_channel: bool,
}

impl Capabilities {
    pub fn new(config: &PlatformConfig, gateway: Option<Arc<dyn CalibrationGateway>>) -> Self {
        let carrier_variant = is_carrier_variant(&config.sim_operator);
        let voice_channel = gateway.is_some() && config.has_voice_channel_platform();

        let gateway = gateway.unwrap_or_else(|| {
            warn!("No calibration gateway supplied, vendor calls are no-ops");
            Arc::new(NoopGateway)
        });

        info!(
            "Capabilities: carrier_variant={} voice_channel={}",
            carrier_variant, voice_channel
        );

        Self {
            carrier_variant,
            gateway,
            voice_channel,
        }
    }
}

impl Capabilities {
    /// Bring up the vendor libraries; failures only disable what they back
    pub fn init_vendor(&self) {
        if let Err(e) = degrade(self.gateway.init_calibration()) {
            error!("Calibration database init failed: {}", e);
        }
        if self.voice_channel {
            if let Err(e) = degrade(self.gateway.init_voice_client()) {
                error!("Voice client init failed: {}", e);
            }
        }
    }

    /// Release the vendor libraries in reverse order of [`Self::init_vendor`]
    pub fn release_vendor(&self) {
        if self.voice_channel {
            if let Err(e) = degrade(self.gateway.deinit_voice_client()) {
                error!("Voice client deinit failed: {}", e);
            }
        }
        if let Err(e) = degrade(self.gateway.deinit_calibration()) {
            error!("Calibration database release failed: {}", e);
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("carrier_variant", &self.carrier_variant)
            .field("voice_channel", &self.voice_channel)
            .finish_non_exhaustive()
    }
}
