//! Channel and keyframe-format bit tables.
//!
//! A track's composite id packs three things: bit 31 is always set, bits
//! 16..24 hold the keyframe format code and the low 16 bits select the
//! animated channel.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const TRACK_FLAG: u32 = 0x8000_0000;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    ScaleX,
    ScaleY,
    ScaleZ,
    RotX,
    RotY,
    RotZ,
    LocX,
    LocY,
    LocZ,
}

impl Channel {
    /// Every channel in on-disk order.
    pub const ALL: [Channel; 9] = [
        Channel::ScaleX,
        Channel::ScaleY,
        Channel::ScaleZ,
        Channel::RotX,
        Channel::RotY,
        Channel::RotZ,
        Channel::LocX,
        Channel::LocY,
        Channel::LocZ,
    ];

    /// Bit written by the encoder.
    pub fn bit(self) -> u16 {
        use Channel::*;
        match self {
            ScaleX => 0x0001,
            ScaleY => 0x0002,
            ScaleZ => 0x0004,
            RotX => 0x0008,
            RotY => 0x0010,
            RotZ => 0x0020,
            LocX => 0x0040,
            LocY => 0x0080,
            LocZ => 0x0100,
        }
    }

    pub fn is_rotation(self) -> bool {
        matches!(self, Channel::RotX | Channel::RotY | Channel::RotZ)
    }

    pub fn is_location(self) -> bool {
        matches!(self, Channel::LocX | Channel::LocY | Channel::LocZ)
    }

    pub fn is_scale(self) -> bool {
        matches!(self, Channel::ScaleX | Channel::ScaleY | Channel::ScaleZ)
    }

    pub fn label(self) -> &'static str {
        use Channel::*;
        match self {
            ScaleX => "SCL_X",
            ScaleY => "SCL_Y",
            ScaleZ => "SCL_Z",
            RotX => "ROT_X",
            RotY => "ROT_Y",
            RotZ => "ROT_Z",
            LocX => "LOC_X",
            LocY => "LOC_Y",
            LocZ => "LOC_Z",
        }
    }
}

/// Which bit table to read channel bits with.
///
/// Older exports put rotation on the three lowest bits and scale up at
/// 0x400..0x1000; current ones moved rotation to 0x008..0x020 and scale to
/// the bottom.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// Reads bits 0x001..0x004 as scale. Rotation in legacy files comes out
    /// as scale under this layout; decode those with `Legacy`.
    Canonical,
    Legacy,
}

impl Default for ChannelLayout {
    fn default() -> Self {
        ChannelLayout::Canonical
    }
}

impl ChannelLayout {
    pub fn channel(self, bits: u16) -> Option<Channel> {
        use Channel::*;
        match (self, bits) {
            (_, 0x0040) => Some(LocX),
            (_, 0x0080) => Some(LocY),
            (_, 0x0100) => Some(LocZ),
            (_, 0x0400) => Some(ScaleX),
            (_, 0x0800) => Some(ScaleY),
            (_, 0x1000) => Some(ScaleZ),
            (_, 0x0008) => Some(RotX),
            (_, 0x0010) => Some(RotY),
            (_, 0x0020) => Some(RotZ),
            (ChannelLayout::Canonical, 0x0001) => Some(ScaleX),
            (ChannelLayout::Canonical, 0x0002) => Some(ScaleY),
            (ChannelLayout::Canonical, 0x0004) => Some(ScaleZ),
            (ChannelLayout::Legacy, 0x0001) => Some(RotX),
            (ChannelLayout::Legacy, 0x0002) => Some(RotY),
            (ChannelLayout::Legacy, 0x0004) => Some(RotZ),
            _ => None,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyframeFormat {
    /// `(i16 value, i16 frame)`
    Linear16,
    /// `(i16 value, i16 frame, i16 tangent_in, i16 tangent_out)`
    Hermite16,
    /// `(f32 value, f32 frame, f32 tangent_in, f32 tangent_out)`, unscaled.
    Hermite32,
}

impl Default for KeyframeFormat {
    fn default() -> Self {
        KeyframeFormat::Hermite16
    }
}

impl KeyframeFormat {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x11 => Some(KeyframeFormat::Linear16),
            0x12 => Some(KeyframeFormat::Hermite16),
            0x22 => Some(KeyframeFormat::Hermite32),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            KeyframeFormat::Linear16 => 0x11,
            KeyframeFormat::Hermite16 => 0x12,
            KeyframeFormat::Hermite32 => 0x22,
        }
    }

    /// Bytes per keyframe record.
    pub fn width(self) -> usize {
        match self {
            KeyframeFormat::Linear16 => 4,
            KeyframeFormat::Hermite16 => 8,
            KeyframeFormat::Hermite32 => 16,
        }
    }

    pub fn is_fixed_point(self) -> bool {
        self != KeyframeFormat::Hermite32
    }
}

pub fn format_code(composite_id: u32) -> u8 {
    (composite_id >> 16) as u8
}

pub fn channel_bits(composite_id: u32) -> u16 {
    composite_id as u16
}

pub fn composite_id(bits: u16, format: KeyframeFormat) -> u32 {
    TRACK_FLAG | ((format.code() as u32) << 16) | bits as u32
}
