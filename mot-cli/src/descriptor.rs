use anyhow::{Context, Result};
use log::{error, info, warn};
use outbreak_mot::precision::Handles;
use outbreak_mot::*;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Inclusive node index range, written `[first, last]` in the config.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRange(pub u32, pub u32);

impl NodeRange {
    pub fn contains(self, index: u32) -> bool {
        self.0 <= index && index <= self.1
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tangents {
    Stored,
    CentralDifference,
    Handles,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub facial_nodes: NodeRange,
    pub channel_layout: ChannelLayout,
    pub format: KeyframeFormat,
    pub tangents: Tangents,
    pub frame_start: i32,
    pub frame_end: i32,
    pub default_rotation_nodes: NodeRange,
    pub loop_frame: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            facial_nodes: NodeRange(*FACIAL_NODES.start(), *FACIAL_NODES.end()),
            channel_layout: ChannelLayout::Canonical,
            format: KeyframeFormat::Hermite16,
            tangents: Tangents::CentralDifference,
            frame_start: 0,
            frame_end: 60,
            default_rotation_nodes: NodeRange(10, 21),
            loop_frame: None,
        }
    }
}

impl Config {
    /// A missing file gives the defaults; so does a broken one, after
    /// reporting it.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        Ok(match toml::from_str(&data) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to parse config file: {}", e);
                Config::default()
            }
        })
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            channel_layout: self.channel_layout,
            facial_nodes: self.facial_nodes.0..=self.facial_nodes.1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SheetKey {
    pub frame: f64,
    pub value: f64,
    #[serde(default)]
    pub handle_left: Option<[f64; 2]>,
    #[serde(default)]
    pub handle_right: Option<[f64; 2]>,
}

impl SheetKey {
    fn keyframe(&self) -> Keyframe {
        Keyframe {
            frame: self.frame,
            value: self.value,
            ..Default::default()
        }
    }

    /// A missing handle sits on the key itself, giving a flat tangent.
    fn handles(&self) -> Handles {
        let key = (self.frame, self.value);
        let point = |h: Option<[f64; 2]>| h.map(|[x, y]| (x, y)).unwrap_or(key);
        Handles::from_points(key, point(self.handle_left), point(self.handle_right))
    }
}

/// Per node, per channel keyframes from an external animation source.
/// Channels are named either `rot_x` or `ROT_X` style.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct KeySheet {
    #[serde(default)]
    pub nodes: BTreeMap<u32, BTreeMap<String, Vec<SheetKey>>>,
}

pub fn parse_channel(name: &str) -> Option<Channel> {
    let lower = name.to_ascii_lowercase();
    serde_json::from_value(serde_json::Value::String(lower))
        .ok()
        .or_else(|| {
            Channel::ALL
                .iter()
                .copied()
                .find(|c| c.label().eq_ignore_ascii_case(name))
        })
}

impl KeySheet {
    pub fn from_json(data: &str) -> Result<Self> {
        let sheet: KeySheet = serde_json::from_str(data)?;
        for (node, channels) in &sheet.nodes {
            for name in channels.keys().filter(|n| parse_channel(n).is_none()) {
                warn!("node {}: unknown channel `{}`, ignoring", node, name);
            }
        }
        Ok(sheet)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to open key sheet {}", path.display()))?;
        KeySheet::from_json(&data).with_context(|| format!("bad key sheet {}", path.display()))
    }

    pub fn keys(&self, node: u32, channel: Channel) -> Option<&[SheetKey]> {
        self.nodes
            .get(&node)?
            .iter()
            .find(|(name, _)| parse_channel(name) == Some(channel))
            .map(|(_, keys)| keys.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keep a template's tracks, replacing the channels the sheet covers.
    Rebuild,
    /// Everything comes from the sheet, plus flat rotation tracks where the
    /// sheet has none.
    Build,
}

pub struct SheetPolicy<'a> {
    pub sheet: &'a KeySheet,
    pub config: &'a Config,
    pub mode: Mode,
}

impl SheetPolicy<'_> {
    fn keyed(&self, index: u32, channel: Channel, format: KeyframeFormat) -> Option<TrackPlan> {
        let keys = self.sheet.keys(index, channel)?;
        let tangents = match self.config.tangents {
            Tangents::Stored => TangentMode::Stored,
            Tangents::CentralDifference => TangentMode::CentralDifference,
            Tangents::Handles => TangentMode::Handles(keys.iter().map(SheetKey::handles).collect()),
        };
        Some(TrackPlan {
            format,
            source: TrackSource::Keys {
                keys: keys.iter().map(SheetKey::keyframe).collect(),
                tangents,
            },
        })
    }
}

impl EncodePolicy for SheetPolicy<'_> {
    fn plan(&self, index: u32, channel: Channel, existing: Option<&Track>) -> Option<TrackPlan> {
        match (self.mode, existing) {
            (Mode::Rebuild, Some(track)) => self
                .keyed(index, channel, track.format)
                .or_else(|| Some(TrackPlan::stored(track))),
            (Mode::Rebuild, None) => None,
            (Mode::Build, _) => self.keyed(index, channel, self.config.format).or_else(|| {
                if channel.is_rotation() && self.config.default_rotation_nodes.contains(index) {
                    Some(TrackPlan::default_span(
                        self.config.format,
                        self.config.frame_start,
                        self.config.frame_end,
                    ))
                } else {
                    None
                }
            }),
        }
    }

    fn is_facial(&self, index: u32) -> bool {
        self.config.facial_nodes.contains(index)
    }
}
