//! HDMI multichannel capability negotiation

use tracing::{debug, error};

use crate::devices::ChannelMask;
use crate::error::Result;
use crate::mixer::{HDMI_RX_CHANNELS_CTL, MixerPathEngine};

/// Source of the sink's EDID channel capability
pub trait EdidReader: Send + Sync {
    /// Maximum channel count advertised by the connected sink
    fn max_channels(&self) -> u32;
}

/// Multichannel masks supported for a reported channel capability.
///
/// Stereo is left to the regular playback paths, so only 5.1 and 7.1 appear.
pub fn supported_channel_masks(max_channels: u32) -> Vec<ChannelMask> {
    match max_channels {
        6 => {
            debug!("HDMI supports 5.1");
            vec![ChannelMask::OUT_5POINT1]
        }
        8 => {
            debug!("HDMI supports 5.1 and 7.1");
            vec![ChannelMask::OUT_5POINT1, ChannelMask::OUT_7POINT1]
        }
        other => {
            error!("Unsupported number of HDMI channels ({})", other);
            Vec::new()
        }
    }
}

/// Driver string for a channel count; anything outside 3..=8 is stereo
pub const fn channel_count_name(channels: u32) -> &'static str {
    match channels {
        8 => "Eight",
        7 => "Seven",
        6 => "Six",
        5 => "Five",
        4 => "Four",
        3 => "Three",
        _ => "Two",
    }
}

/// Program the HDMI receiver channel count
pub fn set_hdmi_channels(mixer: &mut dyn MixerPathEngine, channels: u32) -> Result<()> {
    let name = channel_count_name(channels);
    debug!("HDMI channel count: {}", name);
    mixer.set_enum(HDMI_RX_CHANNELS_CTL, name)
}
