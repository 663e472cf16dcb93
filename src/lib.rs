pub mod archive;
pub mod channel;
mod error;
pub mod policy;
pub mod precision;
pub mod read;
pub mod write;

use std::ops::RangeInclusive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use archive::{depack, ClipBytes};
pub use channel::{Channel, ChannelLayout, KeyframeFormat};
pub use error::{Error, Result};
pub use policy::{EncodePolicy, StoredTracks, TangentMode, TrackPlan, TrackSource};
pub use read::{DecodeOptions, Decoded};

/// Node indices whose location channels use the facial precision.
pub const FACIAL_NODES: RangeInclusive<u32> = 23..=26;

pub const SECTION_HEADER_LEN: usize = 20;
pub const NODE_HEADER_LEN: usize = 12;
pub const INERT_NODE_LEN: usize = 4;
pub const TRACK_HEADER_LEN: usize = 12;

/// Loop frame written when a section does not loop.
pub const NO_LOOP_FRAME: f32 = -1.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRegion {
    Lower,
    Upper,
    Face,
    Unknown,
}

impl BodyRegion {
    pub fn from_selector(byte: u8) -> Self {
        match byte {
            0x0A => BodyRegion::Lower,
            0x0C => BodyRegion::Upper,
            0x06 => BodyRegion::Face,
            _ => BodyRegion::Unknown,
        }
    }

    /// Selector byte stored in the low byte of `node_count`. It doubles as
    /// the number of nodes in the region.
    pub fn selector(self) -> Option<u8> {
        match self {
            BodyRegion::Lower => Some(0x0A),
            BodyRegion::Upper => Some(0x0C),
            BodyRegion::Face => Some(0x06),
            BodyRegion::Unknown => None,
        }
    }

    pub fn first_node(self) -> Option<u32> {
        match self {
            BodyRegion::Lower => Some(0),
            BodyRegion::Upper => Some(10),
            BodyRegion::Face => Some(22),
            BodyRegion::Unknown => None,
        }
    }

    pub fn nodes(self) -> Option<std::ops::Range<u32>> {
        let first = self.first_node()?;
        let count = self.selector()? as u32;
        Some(first..first + count)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AnimationClip {
    pub sections: Vec<Section>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub region: BodyRegion,
    /// Header word as stored; written back unchanged.
    pub type_word: u32,
    /// Raw node count field; its low byte selects the region.
    pub node_count: u32,
    pub byte_size: u32,
    pub loop_enabled: bool,
    /// Loop word as stored. Any non-zero value enables the loop.
    pub loop_flag: u32,
    pub loop_frame: f32,
    pub nodes: Vec<Node>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub global_index: u32,
    pub active: bool,
    pub channel_mask: u32,
    pub tracks: Vec<Track>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub channel: Channel,
    pub format: KeyframeFormat,
    /// Channel bits as stored, when they are not the channel's own bit
    /// (legacy rotation and high scale bits).
    pub wire_bits: Option<u16>,
    pub keyframes: Vec<Keyframe>,
}

/// Format independent keyframe. `value` is in channel units; tangents stay
/// in the scaled units they are stored with.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
pub struct Keyframe {
    pub frame: f64,
    pub value: f64,
    pub tangent_in: f64,
    pub tangent_out: f64,
}

impl AnimationClip {
    /// Empty sections for the given regions, every node active and
    /// trackless, ready to be filled through an [`EncodePolicy`].
    pub fn layout(regions: &[BodyRegion], loop_frame: Option<f32>) -> Self {
        let sections = regions
            .iter()
            .filter_map(|&region| {
                let nodes = region.nodes()?.map(|i| Node::new(i, vec![])).collect();
                Some(Section::new(region, nodes, loop_frame))
            })
            .collect();
        AnimationClip { sections }
    }

    pub fn set_loop(&mut self, loop_frame: Option<f32>) {
        for section in &mut self.sections {
            section.set_loop(loop_frame);
        }
    }

    pub fn node(&self, global_index: u32) -> Option<&Node> {
        self.sections
            .iter()
            .flat_map(|s| s.nodes.iter())
            .find(|n| n.global_index == global_index)
    }

    pub fn track_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| s.nodes.iter())
            .map(|n| n.tracks.len())
            .sum()
    }
}

impl Section {
    pub fn new(region: BodyRegion, nodes: Vec<Node>, loop_frame: Option<f32>) -> Self {
        let mut section = Section {
            region,
            type_word: write::SECTION_MARKER,
            node_count: nodes.len() as u32,
            byte_size: 0,
            loop_enabled: false,
            loop_flag: 0,
            loop_frame: NO_LOOP_FRAME,
            nodes,
        };
        section.set_loop(loop_frame);
        section.refresh_size();
        section
    }

    pub fn set_loop(&mut self, loop_frame: Option<f32>) {
        self.loop_enabled = loop_frame.is_some();
        self.loop_flag = self.loop_enabled as u32;
        self.loop_frame = loop_frame.unwrap_or(NO_LOOP_FRAME);
    }

    pub fn refresh_size(&mut self) {
        self.byte_size =
            SECTION_HEADER_LEN as u32 + self.nodes.iter().map(Node::on_disk_size).sum::<u32>();
    }
}

impl Node {
    pub fn new(global_index: u32, tracks: Vec<Track>) -> Self {
        let channel_mask = tracks
            .iter()
            .fold(0, |mask, t| mask | t.channel.bit() as u32);
        Node {
            global_index,
            active: true,
            channel_mask,
            tracks,
        }
    }

    pub fn inert(global_index: u32) -> Self {
        Node {
            global_index,
            active: false,
            channel_mask: 0,
            tracks: vec![],
        }
    }

    pub fn track(&self, channel: Channel) -> Option<&Track> {
        self.tracks.iter().find(|t| t.channel == channel)
    }

    pub fn on_disk_size(&self) -> u32 {
        if self.active {
            NODE_HEADER_LEN as u32 + self.tracks.iter().map(Track::on_disk_size).sum::<u32>()
        } else {
            INERT_NODE_LEN as u32
        }
    }
}

impl Track {
    pub fn new(channel: Channel, format: KeyframeFormat, keyframes: Vec<Keyframe>) -> Self {
        Track {
            channel,
            format,
            wire_bits: None,
            keyframes,
        }
    }

    /// Channel bits this track is written with.
    pub fn bits(&self) -> u16 {
        self.wire_bits.unwrap_or_else(|| self.channel.bit())
    }

    pub fn on_disk_size(&self) -> u32 {
        (TRACK_HEADER_LEN + self.keyframes.len() * self.format.width()) as u32
    }

    pub fn frame_range(&self) -> Option<(f64, f64)> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        Some((first.frame, last.frame))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Linear16Key {
    pub value: i16,
    pub frame: i16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Hermite16Key {
    pub value: i16,
    pub frame: i16,
    pub tangent_in: i16,
    pub tangent_out: i16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Hermite32Key {
    pub value: f32,
    pub frame: f32,
    pub tangent_in: f32,
    pub tangent_out: f32,
}

/// Keyframes exactly as laid out on disk, one variant per format.
#[derive(Debug, Clone, PartialEq)]
pub enum RawKeys {
    Linear16(Vec<Linear16Key>),
    Hermite16(Vec<Hermite16Key>),
    Hermite32(Vec<Hermite32Key>),
}

impl RawKeys {
    pub fn format(&self) -> KeyframeFormat {
        match self {
            RawKeys::Linear16(_) => KeyframeFormat::Linear16,
            RawKeys::Hermite16(_) => KeyframeFormat::Hermite16,
            RawKeys::Hermite32(_) => KeyframeFormat::Hermite32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawKeys::Linear16(k) => k.len(),
            RawKeys::Hermite16(k) => k.len(),
            RawKeys::Hermite32(k) => k.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode a standalone clip with the default options.
pub fn decode_clip(bytes: &[u8]) -> Result<AnimationClip> {
    read::decode_clip(bytes)
}

/// Split an archive into its clip byte streams.
pub fn decode_archive(bytes: &[u8]) -> Result<Vec<ClipBytes>> {
    archive::depack(bytes)
}

pub fn encode_clip<P: EncodePolicy + ?Sized>(clip: &AnimationClip, policy: &P) -> Result<Vec<u8>> {
    write::encode_clip(clip, policy)
}
