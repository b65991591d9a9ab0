//! Device, channel and stream-flag bitmasks
//!
//! These mirror the platform's `audio_devices_t`, `audio_channel_mask_t` and
//! stream flag words. Bits outside the named constants are kept so that a
//! selector can reject combinations it does not recognise.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

macro_rules! bitmask {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$cmeta:meta])* const $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $( $(#[$cmeta])* pub const $flag: Self = Self($value); )*

            /// Every named bit
            const NAMED: &'static [(&'static str, Self)] = &[ $( (stringify!($flag), Self::$flag) ),* ];

            /// The empty set
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Build from raw bits, keeping unknown bits
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True if any bit of `other` is set
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// True if every bit of `other` is set
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Number of bits set
            pub const fn count(self) -> u32 {
                self.0.count_ones()
            }

            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            pub const fn difference(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut rest = self.0;
                let mut parts = Vec::new();
                for (name, flag) in Self::NAMED {
                    if flag.0 != 0 && self.0 & flag.0 == flag.0 && rest & flag.0 != 0 {
                        parts.push(*name);
                        rest &= !flag.0;
                    }
                }
                if parts.is_empty() && rest == 0 {
                    return write!(f, "{}(NONE)", stringify!($name));
                }
                write!(f, "{}(", stringify!($name))?;
                write!(f, "{}", parts.join(" | "))?;
                if rest != 0 {
                    if !parts.is_empty() {
                        write!(f, " | ")?;
                    }
                    write!(f, "{:#x}", rest)?;
                }
                write!(f, ")")
            }
        }
    };
}

bitmask! {
    /// Requested output device bits
    pub struct OutputDevices {
        const EARPIECE = 0x1;
        const SPEAKER = 0x2;
        const WIRED_HEADSET = 0x4;
        const WIRED_HEADPHONE = 0x8;
        const BLUETOOTH_SCO = 0x10;
        const BLUETOOTH_SCO_HEADSET = 0x20;
        const BLUETOOTH_SCO_CARKIT = 0x40;
        const BLUETOOTH_A2DP = 0x80;
        const AUX_DIGITAL = 0x400;
        /// Any SCO flavour
        const ALL_SCO = 0x70;
    }
}

impl OutputDevices {
    /// Wired headphone or headset
    pub const fn is_wired(self) -> bool {
        self.intersects(Self::WIRED_HEADPHONE.union(Self::WIRED_HEADSET))
    }

    pub const fn is_sco(self) -> bool {
        self.intersects(Self::ALL_SCO)
    }
}

bitmask! {
    /// Requested input device bits, without the platform's input marker bit
    pub struct InputDevices {
        const COMMUNICATION = 0x1;
        const AMBIENT = 0x2;
        const BUILTIN_MIC = 0x4;
        const BLUETOOTH_SCO_HEADSET = 0x8;
        const WIRED_HEADSET = 0x10;
        const AUX_DIGITAL = 0x20;
        const VOICE_CALL = 0x40;
        const BACK_MIC = 0x80;
    }
}

bitmask! {
    /// Channel position bits; the channel count is the number of bits set
    pub struct ChannelMask {
        const IN_LEFT = 0x4;
        const IN_RIGHT = 0x8;
        const IN_FRONT = 0x10;
        const IN_BACK = 0x20;
        const IN_MONO = 0x10;
        const IN_STEREO = 0xC;
        const IN_FRONT_BACK = 0x30;
        const OUT_STEREO = 0x3;
        const OUT_5POINT1 = 0x3F;
        const OUT_7POINT1 = 0x63F;
    }
}

impl ChannelMask {
    /// Number of channels in the mask
    pub const fn channel_count(self) -> u32 {
        self.count()
    }

    /// Platform name of a known output mask
    pub fn output_name(self) -> Option<&'static str> {
        match self {
            Self::OUT_STEREO => Some("AUDIO_CHANNEL_OUT_STEREO"),
            Self::OUT_5POINT1 => Some("AUDIO_CHANNEL_OUT_5POINT1"),
            Self::OUT_7POINT1 => Some("AUDIO_CHANNEL_OUT_7POINT1"),
            _ => None,
        }
    }

    /// Default input mask for a channel count
    pub const fn input_for_count(count: u32) -> Self {
        if count >= 2 { Self::IN_STEREO } else { Self::IN_MONO }
    }
}

bitmask! {
    /// Output stream flags
    pub struct OutputFlags {
        const DIRECT = 0x1;
        const PRIMARY = 0x2;
        const FAST = 0x4;
        const DEEP_BUFFER = 0x8;
    }
}

bitmask! {
    /// Input stream flags
    pub struct InputFlags {
        const FAST = 0x1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_contains() {
        let devices = OutputDevices::SPEAKER | OutputDevices::WIRED_HEADSET;
        assert_eq!(devices.count(), 2);
        assert!(devices.contains(OutputDevices::SPEAKER));
        assert!(devices.is_wired());
        assert!(!devices.is_sco());
        assert_eq!(devices.difference(OutputDevices::SPEAKER), OutputDevices::WIRED_HEADSET);
    }

    #[test]
    fn test_channel_counts() {
        assert_eq!(ChannelMask::OUT_5POINT1.channel_count(), 6);
        assert_eq!(ChannelMask::OUT_7POINT1.channel_count(), 8);
        assert_eq!(ChannelMask::IN_FRONT_BACK.channel_count(), 2);
        assert_eq!(ChannelMask::input_for_count(1), ChannelMask::IN_MONO);
    }

    #[test]
    fn test_debug_keeps_unknown_bits() {
        let devices = OutputDevices::from_bits(0x2 | 0x1000);
        assert_eq!(format!("{:?}", devices), "OutputDevices(SPEAKER | 0x1000)");
        assert_eq!(format!("{:?}", OutputDevices::empty()), "OutputDevices(NONE)");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&InputDevices::BUILTIN_MIC).unwrap();
        assert_eq!(json, "4");
        let back: InputDevices = serde_json::from_str("128").unwrap();
        assert_eq!(back, InputDevices::BACK_MIC);
    }
}
