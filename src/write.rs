use cookie_factory::bytes::*;
use cookie_factory::multi::all;
use cookie_factory::sequence::tuple;
use cookie_factory::{gen_simple, SerializeFn, WriteContext};
use log::{debug, warn};

use super::*;
use crate::channel::{composite_id, TRACK_FLAG};
use crate::precision::{clamp_i16, Precision};

use std::io;

pub const SECTION_MARKER: u32 = 0x8000_0002;

/// Frames outside the `i16` range saturate.
fn frame16(frame: f64) -> i16 {
    if frame < i16::MIN as f64 || frame > i16::MAX as f64 {
        warn!("frame {} does not fit a 16-bit key, clamping", frame);
    }
    frame as i16
}

impl RawKeys {
    /// `precision` must already be adjusted for `format`.
    pub fn from_keyframes(format: KeyframeFormat, keys: &[Keyframe], precision: Precision) -> Self {
        let tangent16 = |t: f64| clamp_i16(t.round_ties_even()) as i16;
        match format {
            KeyframeFormat::Linear16 => RawKeys::Linear16(
                keys.iter()
                    .map(|k| Linear16Key {
                        value: precision.scale(k.value),
                        frame: frame16(k.frame),
                    })
                    .collect(),
            ),
            KeyframeFormat::Hermite16 => RawKeys::Hermite16(
                keys.iter()
                    .map(|k| Hermite16Key {
                        value: precision.scale(k.value),
                        frame: frame16(k.frame),
                        tangent_in: tangent16(k.tangent_in),
                        tangent_out: tangent16(k.tangent_out),
                    })
                    .collect(),
            ),
            KeyframeFormat::Hermite32 => RawKeys::Hermite32(
                keys.iter()
                    .map(|k| Hermite32Key {
                        value: (k.value * precision.divisor * precision.sign) as f32,
                        frame: k.frame as f32,
                        tangent_in: k.tangent_in as f32,
                        tangent_out: k.tangent_out as f32,
                    })
                    .collect(),
            ),
        }
    }

    fn write<'a, W: io::Write + 'a>(&'a self) -> impl SerializeFn<W> + 'a {
        move |out: WriteContext<W>| match self {
            RawKeys::Linear16(keys) => {
                all(keys.iter().map(|k| tuple((le_i16(k.value), le_i16(k.frame)))))(out)
            }
            RawKeys::Hermite16(keys) => all(keys.iter().map(|k| {
                tuple((
                    le_i16(k.value),
                    le_i16(k.frame),
                    le_i16(k.tangent_in),
                    le_i16(k.tangent_out),
                ))
            }))(out),
            RawKeys::Hermite32(keys) => all(keys.iter().map(|k| {
                tuple((
                    le_f32(k.value),
                    le_f32(k.frame),
                    le_f32(k.tangent_in),
                    le_f32(k.tangent_out),
                ))
            }))(out),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTrack {
    pub channel: Channel,
    /// Low half of the composite id; the channel's own bit unless a
    /// template track said otherwise.
    pub bits: u16,
    pub keys: RawKeys,
}

impl EncodedTrack {
    /// Sorts by frame and scales values. An empty key list is refused:
    /// callers leave the channel out instead.
    pub fn from_keyframes(
        channel: Channel,
        format: KeyframeFormat,
        precision: Precision,
        keys: &[Keyframe],
    ) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::EmptyTrack { channel });
        }
        let mut keys = keys.to_vec();
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        let keys = RawKeys::from_keyframes(format, &keys, precision.for_format(format));
        Ok(EncodedTrack {
            channel,
            bits: channel.bit(),
            keys,
        })
    }

    /// Two flat keys at `start` and `end`.
    pub fn default_span(channel: Channel, format: KeyframeFormat, start: i32, end: i32) -> Self {
        let key = |frame: i32| Keyframe {
            frame: frame as f64,
            ..Default::default()
        };
        let keys = RawKeys::from_keyframes(format, &[key(start), key(end)], Precision::UNIT);
        EncodedTrack {
            channel,
            bits: channel.bit(),
            keys,
        }
    }

    pub fn format(&self) -> KeyframeFormat {
        self.keys.format()
    }

    pub fn composite_id(&self) -> u32 {
        composite_id(self.bits, self.format())
    }

    pub fn key_count(&self) -> u32 {
        self.keys.len() as u32
    }

    pub fn byte_size(&self) -> u32 {
        (TRACK_HEADER_LEN + self.keys.len() * self.format().width()) as u32
    }

    pub fn write<'a, W: io::Write + 'a>(&'a self) -> impl SerializeFn<W> + 'a {
        tuple((
            le_u32(self.composite_id()),
            le_u32(self.key_count()),
            le_u32(self.byte_size()),
            self.keys.write(),
        ))
    }
}

/// A node always goes out with the full 12-byte header; a node without
/// tracks becomes `(0x80000000, 0, 12)`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EncodedNode {
    /// Stored channel mask to write instead of the one the tracks imply.
    pub mask: Option<u32>,
    pub tracks: Vec<EncodedTrack>,
}

impl EncodedNode {
    pub fn new(tracks: Vec<EncodedTrack>) -> Self {
        EncodedNode { mask: None, tracks }
    }

    fn track_bits(&self) -> u32 {
        self.tracks.iter().fold(0, |bits, t| bits | t.bits as u32)
    }

    /// Keeps `node`'s mask when the tracks going out use exactly the bits
    /// its decoded tracks had.
    pub fn keep_mask(&mut self, node: &Node) {
        let stored = node.tracks.iter().fold(0, |bits, t| bits | t.bits() as u32);
        if node.active && stored == self.track_bits() {
            self.mask = Some(node.channel_mask);
        }
    }

    pub fn type_word(&self) -> u32 {
        TRACK_FLAG | self.mask.unwrap_or_else(|| self.track_bits())
    }

    pub fn byte_size(&self) -> u32 {
        NODE_HEADER_LEN as u32 + self.tracks.iter().map(EncodedTrack::byte_size).sum::<u32>()
    }

    pub fn write<'a, W: io::Write + 'a>(&'a self) -> impl SerializeFn<W> + 'a {
        tuple((
            le_u32(self.type_word()),
            le_u32(self.tracks.len() as u32),
            le_u32(self.byte_size()),
            all(self.tracks.iter().map(|t| t.write::<W>())),
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSection {
    pub region: BodyRegion,
    pub type_word: u32,
    pub node_count: u32,
    pub loop_flag: u32,
    pub loop_frame: f32,
    pub nodes: Vec<EncodedNode>,
}

impl EncodedSection {
    /// Builds one node per index in `indices`, asking `supply` for its
    /// tracks.
    pub fn build<I, F>(region: BodyRegion, indices: I, loop_frame: Option<f32>, mut supply: F) -> Self
    where
        I: IntoIterator<Item = u32>,
        F: FnMut(u32) -> Vec<EncodedTrack>,
    {
        let nodes: Vec<EncodedNode> = indices
            .into_iter()
            .map(|index| EncodedNode::new(supply(index)))
            .collect();
        EncodedSection {
            region,
            type_word: SECTION_MARKER,
            node_count: region_count(region, nodes.len()),
            loop_flag: loop_frame.is_some() as u32,
            loop_frame: loop_frame.unwrap_or(NO_LOOP_FRAME),
            nodes,
        }
    }

    pub fn byte_size(&self) -> u32 {
        SECTION_HEADER_LEN as u32 + self.nodes.iter().map(EncodedNode::byte_size).sum::<u32>()
    }

    pub fn write<'a, W: io::Write + 'a>(&'a self) -> impl SerializeFn<W> + 'a {
        tuple((
            le_u32(self.type_word),
            le_u32(self.node_count),
            le_u32(self.byte_size()),
            le_u32(self.loop_flag),
            le_f32(self.loop_frame),
            all(self.nodes.iter().map(|n| n.write::<W>())),
        ))
    }
}

/// Known regions write their selector byte; anything else writes the
/// plain node count.
fn region_count(region: BodyRegion, nodes: usize) -> u32 {
    match region.selector() {
        Some(selector) => {
            if nodes != selector as usize {
                warn!("{:?} section expects {} nodes, writing {}", region, selector, nodes);
            }
            selector as u32
        }
        None => nodes as u32,
    }
}

/// Tracks for one node: channels the node already has keep their order,
/// the rest follow in on-disk channel order. A channel the node already
/// holds keeps its stored bits.
fn plan_node<P: EncodePolicy + ?Sized>(policy: &P, index: u32, node: Option<&Node>) -> Vec<EncodedTrack> {
    let existing = node.map(|n| n.tracks.as_slice()).unwrap_or(&[]);
    let mut channels: Vec<Channel> = Vec::with_capacity(Channel::ALL.len());
    for channel in existing.iter().map(|t| t.channel).chain(Channel::ALL.iter().copied()) {
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }

    let facial = policy.is_facial(index);
    channels
        .into_iter()
        .filter_map(|channel| {
            let existing = node.and_then(|n| n.track(channel));
            let plan = policy.plan(index, channel, existing)?;
            match plan.encode(channel, Precision::for_channel(channel, facial)) {
                Ok(mut track) => {
                    if let Some(stored) = existing {
                        track.bits = stored.bits();
                    }
                    Some(track)
                }
                Err(err) => {
                    warn!("node {}: skipping track: {}", index, err);
                    None
                }
            }
        })
        .collect()
}

pub fn encode_sections(sections: &[EncodedSection]) -> Result<Vec<u8>> {
    let bytes = gen_simple(all(sections.iter().map(|s| s.write::<Vec<u8>>())), Vec::new())?;
    Ok(bytes)
}

/// Encodes every section of `clip` in order, asking `policy` for each
/// node's tracks.
pub fn encode_clip<P: EncodePolicy + ?Sized>(clip: &AnimationClip, policy: &P) -> Result<Vec<u8>> {
    let sections: Vec<EncodedSection> = clip
        .sections
        .iter()
        .map(|section| {
            let loop_frame = if section.loop_enabled {
                Some(section.loop_frame)
            } else {
                None
            };
            let mut encoded = EncodedSection::build(
                section.region,
                section.nodes.iter().map(|n| n.global_index),
                loop_frame,
                |index| {
                    let node = section.nodes.iter().find(|n| n.global_index == index);
                    plan_node(policy, index, node)
                },
            );
            // Header words the section was read with go back out as they were.
            encoded.type_word = section.type_word;
            let region_matches = BodyRegion::from_selector(section.node_count as u8) == section.region;
            let count_matches =
                section.region.selector().is_some() || section.node_count as usize == encoded.nodes.len();
            if region_matches && count_matches {
                encoded.node_count = section.node_count;
            }
            if (section.loop_flag != 0) == section.loop_enabled {
                encoded.loop_flag = section.loop_flag;
            }
            for (out, node) in encoded.nodes.iter_mut().zip(&section.nodes) {
                out.keep_mask(node);
            }
            debug!(
                "encoded {:?} section: {} nodes, {} bytes",
                section.region,
                encoded.nodes.len(),
                encoded.byte_size()
            );
            encoded
        })
        .collect();
    encode_sections(&sections)
}
