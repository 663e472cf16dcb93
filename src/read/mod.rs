use std::ops::RangeInclusive;

use log::{debug, trace, warn};
use nom::combinator::map;
use nom::multi::count;
use nom::number::complete::*;
use nom::sequence::tuple;
use nom::IResult;

use super::*;
use crate::channel::{channel_bits, format_code, TRACK_FLAG};
use crate::precision::Precision;

pub(crate) mod utilities;

use utilities::read_at;

pub trait DeserializeContext: Sized {
    type Context;

    fn parse_ctx(i: &[u8], ctx: Self::Context) -> IResult<&[u8], Self>;
}

pub trait Deserialize: Sized {
    fn parse(i: &[u8]) -> IResult<&[u8], Self>;
}

impl<D: Default, T: DeserializeContext<Context = D>> Deserialize for T {
    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        Self::parse_ctx(i, D::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionHeader {
    pub type_word: u32,
    pub node_count: u32,
    pub byte_size: u32,
    pub loop_flag: u32,
    pub loop_frame: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub type_word: u32,
    pub sub_count: u32,
    pub byte_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackHeader {
    pub composite_id: u32,
    pub key_count: u32,
    pub byte_size: u32,
}

impl DeserializeContext for SectionHeader {
    type Context = ();

    fn parse_ctx(i: &[u8], _: ()) -> IResult<&[u8], Self> {
        map(
            tuple((le_u32, le_u32, le_u32, le_u32, le_f32)),
            |(type_word, node_count, byte_size, loop_flag, loop_frame)| SectionHeader {
                type_word,
                node_count,
                byte_size,
                loop_flag,
                loop_frame,
            },
        )(i)
    }
}

impl DeserializeContext for NodeHeader {
    type Context = ();

    fn parse_ctx(i: &[u8], _: ()) -> IResult<&[u8], Self> {
        map(
            tuple((le_u32, le_u32, le_u32)),
            |(type_word, sub_count, byte_size)| NodeHeader {
                type_word,
                sub_count,
                byte_size,
            },
        )(i)
    }
}

impl DeserializeContext for TrackHeader {
    type Context = ();

    fn parse_ctx(i: &[u8], _: ()) -> IResult<&[u8], Self> {
        map(
            tuple((le_u32, le_u32, le_u32)),
            |(composite_id, key_count, byte_size)| TrackHeader {
                composite_id,
                key_count,
                byte_size,
            },
        )(i)
    }
}

impl DeserializeContext for RawKeys {
    type Context = (KeyframeFormat, usize);

    fn parse_ctx(i: &[u8], (format, n): Self::Context) -> IResult<&[u8], Self> {
        match format {
            KeyframeFormat::Linear16 => map(
                count(
                    map(tuple((le_i16, le_i16)), |(value, frame)| Linear16Key {
                        value,
                        frame,
                    }),
                    n,
                ),
                RawKeys::Linear16,
            )(i),
            KeyframeFormat::Hermite16 => map(
                count(
                    map(
                        tuple((le_i16, le_i16, le_i16, le_i16)),
                        |(value, frame, tangent_in, tangent_out)| Hermite16Key {
                            value,
                            frame,
                            tangent_in,
                            tangent_out,
                        },
                    ),
                    n,
                ),
                RawKeys::Hermite16,
            )(i),
            KeyframeFormat::Hermite32 => map(
                count(
                    map(
                        tuple((le_f32, le_f32, le_f32, le_f32)),
                        |(value, frame, tangent_in, tangent_out)| Hermite32Key {
                            value,
                            frame,
                            tangent_in,
                            tangent_out,
                        },
                    ),
                    n,
                ),
                RawKeys::Hermite32,
            )(i),
        }
    }
}

impl RawKeys {
    /// `precision` must already be adjusted for the format.
    pub fn to_keyframes(&self, precision: Precision) -> Vec<Keyframe> {
        match self {
            RawKeys::Linear16(keys) => keys
                .iter()
                .map(|k| Keyframe {
                    frame: k.frame as f64,
                    value: precision.unscale(k.value as f64),
                    ..Default::default()
                })
                .collect(),
            RawKeys::Hermite16(keys) => keys
                .iter()
                .map(|k| Keyframe {
                    frame: k.frame as f64,
                    value: precision.unscale(k.value as f64),
                    tangent_in: k.tangent_in as f64,
                    tangent_out: k.tangent_out as f64,
                })
                .collect(),
            RawKeys::Hermite32(keys) => keys
                .iter()
                .map(|k| Keyframe {
                    frame: (k.frame as f64).trunc(),
                    value: precision.unscale(k.value as f64),
                    tangent_in: k.tangent_in as f64,
                    tangent_out: k.tangent_out as f64,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    pub channel_layout: ChannelLayout,
    pub facial_nodes: RangeInclusive<u32>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            channel_layout: ChannelLayout::default(),
            facial_nodes: FACIAL_NODES,
        }
    }
}

#[derive(Debug)]
pub struct Decoded {
    pub clip: AnimationClip,
    /// Non-fatal problems met on the way, in buffer order.
    pub diagnostics: Vec<Error>,
}

/// Global node index handed from one section to the next.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NodeCursor(pub u32);

pub struct Decoder<'a> {
    buf: &'a [u8],
    options: &'a DecodeOptions,
    diagnostics: Vec<Error>,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8], options: &'a DecodeOptions) -> Self {
        Decoder {
            buf,
            options,
            diagnostics: vec![],
        }
    }

    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    fn note(&mut self, err: Error) {
        warn!("{}", err);
        self.diagnostics.push(err);
    }

    /// Reads sections back to back until the buffer runs out or a section
    /// header is rejected.
    pub fn clip(mut self) -> Result<Decoded> {
        let len = self.buf.len();
        if len < SECTION_HEADER_LEN {
            return Err(Error::truncated(0, SECTION_HEADER_LEN, len));
        }
        let mut sections = vec![];
        let mut offset = 0;
        let mut cursor = NodeCursor::default();
        while offset + SECTION_HEADER_LEN <= len {
            match self.section(offset, cursor) {
                Ok((section, next)) => {
                    offset += section.byte_size as usize;
                    cursor = next;
                    sections.push(section);
                }
                Err(err) => {
                    self.note(err);
                    break;
                }
            }
        }
        Ok(Decoded {
            clip: AnimationClip { sections },
            diagnostics: self.diagnostics,
        })
    }

    /// Decodes the section at `offset`. Node problems are recorded and end
    /// the node loop early; the caller always moves on by `byte_size`.
    pub fn section(&mut self, offset: usize, cursor: NodeCursor) -> Result<(Section, NodeCursor)> {
        let len = self.buf.len();
        let header: SectionHeader =
            read_at(self.buf, offset, len, SECTION_HEADER_LEN, SectionHeader::parse)?;
        let remaining = len - offset;
        if header.byte_size == 0 || header.byte_size as usize > remaining {
            return Err(Error::InvalidSize {
                offset,
                size: header.byte_size,
                remaining,
            });
        }

        let region = BodyRegion::from_selector(header.node_count as u8);
        let mut index = region.first_node().unwrap_or(cursor.0);
        debug!(
            "section at {:#x}: {:?} type={:#x} nodes={} size={} loop={} loop_frame={}",
            offset,
            region,
            header.type_word,
            header.node_count,
            header.byte_size,
            header.loop_flag,
            header.loop_frame
        );

        let end = offset + header.byte_size as usize;
        let mut node_offset = offset + SECTION_HEADER_LEN;
        let mut nodes = vec![];
        for _ in 0..header.node_count {
            match self.node(node_offset, end, index) {
                Ok((node, advance)) => {
                    node_offset += advance;
                    nodes.push(node);
                    index += 1;
                }
                Err(err) => {
                    self.note(err);
                    break;
                }
            }
        }

        let section = Section {
            region,
            type_word: header.type_word,
            node_count: header.node_count,
            byte_size: header.byte_size,
            loop_enabled: header.loop_flag != 0,
            loop_flag: header.loop_flag,
            loop_frame: header.loop_frame,
            nodes,
        };
        Ok((section, NodeCursor(index)))
    }

    /// Returns the node and how far to move past it. Inert nodes only
    /// account for their type word, whatever the next two words hold.
    pub fn node(&mut self, offset: usize, limit: usize, global_index: u32) -> Result<(Node, usize)> {
        let type_word = read_at(self.buf, offset, limit, INERT_NODE_LEN, le_u32)?;
        if type_word & TRACK_FLAG == 0 {
            debug!("  node {} at {:#x}: inert", global_index, offset);
            return Ok((Node::inert(global_index), INERT_NODE_LEN));
        }
        let header: NodeHeader = read_at(self.buf, offset, limit, NODE_HEADER_LEN, NodeHeader::parse)?;
        if (header.byte_size as usize) < NODE_HEADER_LEN {
            return Err(Error::InvalidSize {
                offset,
                size: header.byte_size,
                remaining: limit.saturating_sub(offset),
            });
        }
        debug!(
            "  node {} at {:#x}: type={:#x} tracks={} size={}",
            global_index, offset, header.type_word, header.sub_count, header.byte_size
        );

        let mut tracks = vec![];
        let mut track_offset = offset + NODE_HEADER_LEN;
        for _ in 0..header.sub_count {
            match self.track(track_offset, limit, global_index) {
                Ok((track, advance)) => {
                    tracks.extend(track);
                    track_offset += advance;
                }
                Err(err) => {
                    self.note(err);
                    break;
                }
            }
        }

        let node = Node {
            global_index,
            active: true,
            channel_mask: header.type_word & !TRACK_FLAG,
            tracks,
        };
        Ok((node, header.byte_size as usize))
    }

    /// Returns the track, or `None` when its channel is unknown, and how far
    /// to move past it. The header's `byte_size` decides the advance.
    pub fn track(
        &mut self,
        offset: usize,
        limit: usize,
        global_index: u32,
    ) -> Result<(Option<Track>, usize)> {
        let header: TrackHeader =
            read_at(self.buf, offset, limit, TRACK_HEADER_LEN, TrackHeader::parse)?;
        let advance = header.byte_size as usize;
        if advance < TRACK_HEADER_LEN {
            return Err(Error::InvalidSize {
                offset,
                size: header.byte_size,
                remaining: limit.saturating_sub(offset),
            });
        }

        let code = format_code(header.composite_id);
        let format = match KeyframeFormat::from_code(code) {
            Some(format) => format,
            None => {
                self.note(Error::UnknownFormat { offset, code });
                KeyframeFormat::Linear16
            }
        };
        let bits = channel_bits(header.composite_id);
        let channel = match self.options.channel_layout.channel(bits) {
            Some(channel) => channel,
            None => {
                self.note(Error::UnknownChannel { offset, bits });
                return Ok((None, advance));
            }
        };

        let n = header.key_count as usize;
        let keys_offset = offset + TRACK_HEADER_LEN;
        let raw = read_at(
            self.buf,
            keys_offset,
            limit,
            n.saturating_mul(format.width()),
            |i| RawKeys::parse_ctx(i, (format, n)),
        )?;
        let facial = self.options.facial_nodes.contains(&global_index);
        let precision = Precision::for_channel(channel, facial).for_format(format);
        let keyframes = raw.to_keyframes(precision);
        trace!(
            "    {} {:?} keys={} size={} div={}",
            channel.label(),
            format,
            n,
            header.byte_size,
            precision.divisor
        );

        let track = Track {
            channel,
            format,
            wire_bits: Some(bits).filter(|&b| b != channel.bit()),
            keyframes,
        };
        Ok((Some(track), advance))
    }
}

pub fn decode_clip(buf: &[u8]) -> Result<AnimationClip> {
    decode_clip_with(buf, &DecodeOptions::default()).map(|d| d.clip)
}

pub fn decode_clip_with(buf: &[u8], options: &DecodeOptions) -> Result<Decoded> {
    Decoder::new(buf, options).clip()
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Little-endian byte builder for hand-made fixtures.
    #[derive(Default)]
    pub(crate) struct Bytes(pub Vec<u8>);

    impl Bytes {
        pub fn u32(mut self, v: u32) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        pub fn i16(mut self, v: i16) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        pub fn f32(mut self, v: f32) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        pub fn raw(mut self, v: &[u8]) -> Self {
            self.0.extend_from_slice(v);
            self
        }
    }

    fn section(selector: u32, body: &[u8]) -> Vec<u8> {
        Bytes::default()
            .u32(0x8000_0002)
            .u32(selector)
            .u32(20 + body.len() as u32)
            .u32(0)
            .f32(-1.0)
            .raw(body)
            .0
    }

    fn empty_nodes(n: usize) -> Vec<u8> {
        let mut b = Bytes::default();
        for _ in 0..n {
            b = b.u32(0x8000_0000).u32(0).u32(12);
        }
        b.0
    }

    /// One Hermite16 rotation track with two keys.
    fn rot_node() -> Vec<u8> {
        Bytes::default()
            .u32(0x8000_0008)
            .u32(1)
            .u32(12 + 12 + 16)
            .u32(0x8012_0008)
            .u32(2)
            .u32(12 + 16)
            .i16(2608)
            .i16(0)
            .i16(5)
            .i16(-5)
            .i16(-2608)
            .i16(30)
            .i16(0)
            .i16(0)
            .0
    }

    #[test]
    fn region_sets_first_index() {
        let mut buf = section(0x0C, &empty_nodes(12));
        buf.extend(section(0x06, &empty_nodes(6)));
        let clip = decode_clip(&buf).unwrap();
        assert_eq!(clip.sections.len(), 2);
        assert_eq!(clip.sections[0].region, BodyRegion::Upper);
        assert_eq!(clip.sections[0].nodes[0].global_index, 10);
        assert_eq!(clip.sections[0].nodes[11].global_index, 21);
        assert_eq!(clip.sections[1].region, BodyRegion::Face);
        assert_eq!(clip.sections[1].nodes[0].global_index, 22);
    }

    #[test]
    fn unknown_region_keeps_cursor() {
        let mut buf = section(0x0A, &empty_nodes(10));
        buf.extend(section(0x02, &empty_nodes(2)));
        let clip = decode_clip(&buf).unwrap();
        assert_eq!(clip.sections[1].region, BodyRegion::Unknown);
        assert_eq!(clip.sections[1].nodes[0].global_index, 10);
        assert_eq!(clip.sections[1].nodes[1].global_index, 11);
    }

    #[test]
    fn inert_node_is_four_bytes() {
        // The two words after the inert type word are garbage; the next
        // node starts right after the type word anyway.
        let body = Bytes::default()
            .u32(0x0000_0001)
            .raw(&rot_node())
            .0;
        let buf = section(0x02, &body);
        let opts = DecodeOptions::default();
        let mut decoder = Decoder::new(&buf, &opts);
        let (node, advance) = decoder.node(20, buf.len(), 7).unwrap();
        assert_eq!(advance, INERT_NODE_LEN);
        assert!(!node.active);
        assert!(node.tracks.is_empty());

        let clip = decode_clip(&buf).unwrap();
        let nodes = &clip.sections[0].nodes;
        assert_eq!(nodes.len(), 2);
        assert!(!nodes[0].active);
        assert!(nodes[1].active);
        assert_eq!(nodes[1].global_index, nodes[0].global_index + 1);
        assert_eq!(nodes[1].tracks.len(), 1);
    }

    #[test]
    fn inert_node_may_end_the_section() {
        let mut body = empty_nodes(1);
        body.extend(Bytes::default().u32(0).0);
        let decoded = decode_clip_with(&section(0x02, &body), &DecodeOptions::default()).unwrap();
        assert!(decoded.diagnostics.is_empty());
        let nodes = &decoded.clip.sections[0].nodes;
        assert_eq!(nodes.len(), 2);
        assert!(!nodes[1].active);
    }

    #[test]
    fn hermite16_values_and_tangents() {
        let clip = decode_clip(&section(0x01, &rot_node())).unwrap();
        let node = &clip.sections[0].nodes[0];
        assert_eq!(node.channel_mask, 0x0008);
        let track = node.track(Channel::RotX).unwrap();
        assert_eq!(track.format, KeyframeFormat::Hermite16);
        let k = track.keyframes[0];
        assert!((k.value - 2608.0 / crate::precision::ROTATION_DIVISOR).abs() < 1e-12);
        assert_eq!((k.frame, k.tangent_in, k.tangent_out), (0.0, 5.0, -5.0));
        assert_eq!(track.keyframes[1].frame, 30.0);
    }

    #[test]
    fn facial_location_uses_fine_precision() {
        let node = Bytes::default()
            .u32(0x8000_0080)
            .u32(1)
            .u32(12 + 12 + 4)
            .u32(0x8011_0080)
            .u32(1)
            .u32(12 + 4)
            .i16(512)
            .i16(4)
            .0;
        // Face starts at 22, so the second node is index 23.
        let mut body = empty_nodes(1);
        body.extend(node);
        body.extend(empty_nodes(4));
        let clip = decode_clip(&section(0x06, &body)).unwrap();
        let track = &clip.sections[0].nodes[1].tracks[0];
        assert_eq!(track.channel, Channel::LocY);
        assert_eq!(track.keyframes[0].value, -2.0);
    }

    #[test]
    fn hermite32_truncates_frame() {
        let node = Bytes::default()
            .u32(0x8000_0001)
            .u32(1)
            .u32(12 + 12 + 16)
            .u32(0x8022_0001)
            .u32(1)
            .u32(12 + 16)
            .f32(1.25)
            .f32(7.9)
            .f32(0.5)
            .f32(-0.5)
            .0;
        let clip = decode_clip(&section(0x01, &node)).unwrap();
        let k = clip.sections[0].nodes[0].tracks[0].keyframes[0];
        assert_eq!(k.frame, 7.0);
        assert_eq!(k.value, 1.25);
        assert_eq!((k.tangent_in, k.tangent_out), (0.5, -0.5));
    }

    #[test]
    fn unknown_format_reads_as_linear() {
        let node = Bytes::default()
            .u32(0x8000_0040)
            .u32(1)
            .u32(12 + 12 + 4)
            .u32(0x8033_0040)
            .u32(1)
            .u32(12 + 4)
            .i16(32)
            .i16(1)
            .0;
        let decoded = decode_clip_with(&section(0x01, &node), &DecodeOptions::default()).unwrap();
        let track = &decoded.clip.sections[0].nodes[0].tracks[0];
        assert_eq!(track.format, KeyframeFormat::Linear16);
        assert_eq!(track.keyframes[0].value, 2.0);
        match decoded.diagnostics.as_slice() {
            [Error::UnknownFormat { code: 0x33, .. }] => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_channel_is_skipped_but_consumed() {
        let node = Bytes::default()
            .u32(0x8000_0240)
            .u32(2)
            .u32(12 + 2 * (12 + 4))
            .u32(0x8011_0200)
            .u32(1)
            .u32(12 + 4)
            .i16(99)
            .i16(0)
            .u32(0x8011_0040)
            .u32(1)
            .u32(12 + 4)
            .i16(16)
            .i16(3)
            .0;
        let decoded = decode_clip_with(&section(0x01, &node), &DecodeOptions::default()).unwrap();
        let node = &decoded.clip.sections[0].nodes[0];
        assert_eq!(node.tracks.len(), 1);
        assert_eq!(node.tracks[0].channel, Channel::LocX);
        assert_eq!(node.tracks[0].keyframes[0].value, 1.0);
        assert!(matches!(decoded.diagnostics[0], Error::UnknownChannel { bits: 0x0200, .. }));
    }

    #[test]
    fn legacy_layout_reads_low_bits_as_rotation() {
        let node = Bytes::default()
            .u32(0x8000_0001)
            .u32(1)
            .u32(12 + 12 + 4)
            .u32(0x8011_0001)
            .u32(1)
            .u32(12 + 4)
            .i16(0)
            .i16(0)
            .0;
        let buf = section(0x01, &node);
        let opts = DecodeOptions {
            channel_layout: ChannelLayout::Legacy,
            ..Default::default()
        };
        let clip = decode_clip_with(&buf, &opts).unwrap().clip;
        assert_eq!(clip.sections[0].nodes[0].tracks[0].channel, Channel::RotX);
        let clip = decode_clip(&buf).unwrap();
        assert_eq!(clip.sections[0].nodes[0].tracks[0].channel, Channel::ScaleX);
    }

    #[test]
    fn track_size_drives_the_cursor() {
        // First track declares 4 bytes of padding beyond its single key.
        let node = Bytes::default()
            .u32(0x8000_00C0)
            .u32(2)
            .u32(12 + (12 + 8) + (12 + 4))
            .u32(0x8011_0040)
            .u32(1)
            .u32(12 + 8)
            .i16(16)
            .i16(0)
            .u32(0xDEAD_BEEF)
            .u32(0x8011_0080)
            .u32(1)
            .u32(12 + 4)
            .i16(32)
            .i16(0)
            .0;
        let clip = decode_clip(&section(0x01, &node)).unwrap();
        let tracks = &clip.sections[0].nodes[0].tracks;
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].channel, Channel::LocY);
        assert_eq!(tracks[1].keyframes[0].value, 2.0);
    }

    #[test]
    fn invalid_size_stops_the_scan() {
        let mut buf = section(0x0A, &empty_nodes(10));
        buf.extend(Bytes::default().u32(0x8000_0002).u32(0x0C).u32(0).u32(0).f32(0.0).0);
        let decoded = decode_clip_with(&buf, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.clip.sections.len(), 1);
        assert!(matches!(decoded.diagnostics[0], Error::InvalidSize { size: 0, .. }));

        let mut oversized = section(0x0A, &empty_nodes(10));
        oversized[8..12].copy_from_slice(&1000u32.to_le_bytes());
        let decoded = decode_clip_with(&oversized, &DecodeOptions::default()).unwrap();
        assert!(decoded.clip.sections.is_empty());
        assert_eq!(decoded.diagnostics.len(), 1);
    }

    #[test]
    fn section_size_skips_trailing_padding() {
        let mut body = empty_nodes(2);
        body.extend(Bytes::default().u32(0x8000_0040).u32(0xFFFF_FFFF).0);
        let mut buf = section(0x02, &body);
        buf.extend(section(0x0C, &empty_nodes(12)));
        let decoded = decode_clip_with(&buf, &DecodeOptions::default()).unwrap();
        assert!(decoded.diagnostics.is_empty());
        assert_eq!(decoded.clip.sections.len(), 2);
        assert_eq!(decoded.clip.sections[0].nodes.len(), 2);
        assert_eq!(decoded.clip.sections[0].byte_size, 20 + 24 + 8);
        assert_eq!(decoded.clip.sections[1].region, BodyRegion::Upper);
        assert_eq!(decoded.clip.sections[1].nodes.len(), 12);
    }

    #[test]
    fn node_size_skips_trailing_padding() {
        // One LOC_X key, then 8 bytes the node size still covers.
        let padded = Bytes::default()
            .u32(0x8000_0040)
            .u32(1)
            .u32(12 + (12 + 4) + 8)
            .u32(0x8011_0040)
            .u32(1)
            .u32(12 + 4)
            .i16(16)
            .i16(0)
            .u32(0x8011_0080)
            .u32(0xFFFF_FFFF)
            .0;
        let mut body = padded;
        body.extend(rot_node());
        let buf = section(0x02, &body);

        let opts = DecodeOptions::default();
        let mut decoder = Decoder::new(&buf, &opts);
        let (_, advance) = decoder.node(20, buf.len(), 0).unwrap();
        assert_eq!(advance, 12 + 16 + 8);

        let decoded = decode_clip_with(&buf, &opts).unwrap();
        assert!(decoded.diagnostics.is_empty());
        let nodes = &decoded.clip.sections[0].nodes;
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].tracks.len(), 1);
        assert_eq!(nodes[0].tracks[0].keyframes[0].value, 1.0);
        assert_eq!(nodes[1].tracks[0].channel, Channel::RotX);
        assert_eq!(nodes[1].tracks[0].keyframes[1].frame, 30.0);
    }

    #[test]
    fn off_canonical_bits_are_kept() {
        let node = Bytes::default()
            .u32(0x8000_0401)
            .u32(2)
            .u32(12 + 2 * (12 + 4))
            .u32(0x8011_0400)
            .u32(1)
            .u32(12 + 4)
            .i16(16)
            .i16(0)
            .u32(0x8011_0001)
            .u32(1)
            .u32(12 + 4)
            .i16(16)
            .i16(0)
            .0;
        let clip = decode_clip(&section(0x01, &node)).unwrap();
        let tracks = &clip.sections[0].nodes[0].tracks;
        assert_eq!(tracks[0].channel, Channel::ScaleX);
        assert_eq!(tracks[0].wire_bits, Some(0x0400));
        assert_eq!(tracks[1].channel, Channel::ScaleX);
        assert_eq!(tracks[1].wire_bits, None);
        assert_eq!(tracks[1].bits(), 0x0001);
    }

    #[test]
    fn short_buffer_is_fatal() {
        assert!(matches!(
            decode_clip(&[0u8; 12]),
            Err(Error::TruncatedBuffer { needed: 20, available: 12, .. })
        ));
    }

    #[test]
    fn node_header_past_section_end_is_truncated() {
        // Claims 3 nodes but only holds one.
        let mut buf = section(0x03, &empty_nodes(1));
        buf.extend(section(0x0C, &empty_nodes(12)));
        let decoded = decode_clip_with(&buf, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.clip.sections.len(), 2);
        assert_eq!(decoded.clip.sections[0].nodes.len(), 1);
        assert!(matches!(decoded.diagnostics[0], Error::TruncatedBuffer { .. }));
        assert_eq!(decoded.clip.sections[1].nodes.len(), 12);
    }

    #[test]
    fn loop_fields() {
        let mut buf = section(0x0A, &empty_nodes(10));
        buf[12..16].copy_from_slice(&1u32.to_le_bytes());
        buf[16..20].copy_from_slice(&12.0f32.to_le_bytes());
        buf[0..4].copy_from_slice(&2u32.to_le_bytes());
        let clip = decode_clip(&buf).unwrap();
        assert!(clip.sections[0].loop_enabled);
        assert_eq!(clip.sections[0].loop_flag, 1);
        assert_eq!(clip.sections[0].loop_frame, 12.0);
        assert_eq!(clip.sections[0].type_word, 2);
    }
}
