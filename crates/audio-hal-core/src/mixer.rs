//! Mixer path engine abstraction
//!
//! Mixer paths are named groups of mixer controls applied or reset as a unit.
//! Changes are staged and only reach the hardware on [`MixerPathEngine::commit`].

use crate::error::Result;

/// Mixer control carrying the HDMI channel count
pub const HDMI_RX_CHANNELS_CTL: &str = "HDMI_RX Channels";

/// Applies and resets named mixer paths
pub trait MixerPathEngine: Send {
    /// Stage every control of the named path
    fn apply_path(&mut self, name: &str) -> Result<()>;

    /// Stage the reset of every control of the named path
    fn reset_path(&mut self, name: &str) -> Result<()>;

    /// Push staged changes to the hardware
    fn commit(&mut self) -> Result<()>;

    /// Set an enumerated control by its string value
    fn set_enum(&mut self, control: &str, value: &str) -> Result<()>;
}
