//! What to write for each `(node, channel)` pair on encode.
//!
//! The codec never decides which bone a node index drives or where its
//! keyframes come from. An [`EncodePolicy`] answers that per channel, and
//! picks how Hermite tangents are produced.

use std::ops::RangeInclusive;

use crate::precision::{self, Handles, Precision};
use crate::write::EncodedTrack;
use crate::{Channel, Keyframe, KeyframeFormat, Result, Track, FACIAL_NODES};

#[derive(Debug, Clone, PartialEq)]
pub enum TangentMode {
    /// Keep `tangent_in`/`tangent_out` as given, already in wire units.
    Stored,
    /// Slope between the two neighbours of every interior key.
    CentralDifference,
    /// One handle pair per key, in the same order as the keys.
    Handles(Vec<Handles>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackSource {
    /// Two flat keys at `start` and `end`, value and tangents zero.
    Default { start: i32, end: i32 },
    Keys {
        keys: Vec<Keyframe>,
        tangents: TangentMode,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackPlan {
    pub format: KeyframeFormat,
    pub source: TrackSource,
}

impl TrackPlan {
    /// Re-emit an existing track untouched.
    pub fn stored(track: &Track) -> Self {
        TrackPlan {
            format: track.format,
            source: TrackSource::Keys {
                keys: track.keyframes.clone(),
                tangents: TangentMode::Stored,
            },
        }
    }

    pub fn default_span(format: KeyframeFormat, start: i32, end: i32) -> Self {
        TrackPlan {
            format,
            source: TrackSource::Default { start, end },
        }
    }

    pub fn encode(&self, channel: Channel, precision: Precision) -> Result<EncodedTrack> {
        match &self.source {
            TrackSource::Default { start, end } => {
                Ok(EncodedTrack::default_span(channel, self.format, *start, *end))
            }
            TrackSource::Keys { keys, tangents } => {
                let keys = resolve_tangents(keys, tangents, precision, self.format);
                EncodedTrack::from_keyframes(channel, self.format, precision, &keys)
            }
        }
    }
}

/// Sorts keys by frame and fills in their tangents for `mode`.
pub fn resolve_tangents(
    keys: &[Keyframe],
    mode: &TangentMode,
    precision: Precision,
    format: KeyframeFormat,
) -> Vec<Keyframe> {
    let mut paired: Vec<(Keyframe, Handles)> = match mode {
        TangentMode::Handles(handles) => keys
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, handles.get(i).copied().unwrap_or_default()))
            .collect(),
        _ => keys.iter().map(|k| (*k, Handles::default())).collect(),
    };
    paired.sort_by(|a, b| a.0.frame.total_cmp(&b.0.frame));

    match mode {
        TangentMode::Stored => paired.into_iter().map(|(k, _)| k).collect(),
        TangentMode::CentralDifference => {
            let keys: Vec<Keyframe> = paired.into_iter().map(|(k, _)| k).collect();
            let tangents = precision::central_difference(&keys, precision, format);
            keys.into_iter()
                .zip(tangents)
                .map(|(k, t)| Keyframe {
                    tangent_in: t.incoming,
                    tangent_out: t.outgoing,
                    ..k
                })
                .collect()
        }
        TangentMode::Handles(_) => paired
            .into_iter()
            .map(|(k, h)| {
                let t = precision::handle_tangent(&h, precision, format);
                Keyframe {
                    tangent_in: t.incoming,
                    tangent_out: t.outgoing,
                    ..k
                }
            })
            .collect(),
    }
}

pub trait EncodePolicy {
    /// `existing` is the track the clip being encoded already holds for this
    /// channel, if any. `None` leaves the channel out of the node.
    fn plan(&self, global_index: u32, channel: Channel, existing: Option<&Track>) -> Option<TrackPlan>;

    /// Facial nodes store location at 1/256 and mirrored.
    fn is_facial(&self, global_index: u32) -> bool {
        FACIAL_NODES.contains(&global_index)
    }
}

/// Writes back whatever tracks the clip holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTracks {
    pub facial_nodes: RangeInclusive<u32>,
}

impl Default for StoredTracks {
    fn default() -> Self {
        StoredTracks {
            facial_nodes: FACIAL_NODES,
        }
    }
}

impl EncodePolicy for StoredTracks {
    fn plan(&self, _: u32, _: Channel, existing: Option<&Track>) -> Option<TrackPlan> {
        existing.map(TrackPlan::stored)
    }

    fn is_facial(&self, global_index: u32) -> bool {
        self.facial_nodes.contains(&global_index)
    }
}

impl<F> EncodePolicy for F
where
    F: Fn(u32, Channel, Option<&Track>) -> Option<TrackPlan>,
{
    fn plan(&self, global_index: u32, channel: Channel, existing: Option<&Track>) -> Option<TrackPlan> {
        self(global_index, channel, existing)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(frame: f64, value: f64) -> Keyframe {
        Keyframe {
            frame,
            value,
            ..Default::default()
        }
    }

    const P16: Precision = Precision {
        divisor: 16.0,
        sign: 1.0,
    };

    #[test]
    fn keys_are_sorted_before_tangents() {
        let keys = [key(30.0, 320.0), key(0.0, 0.0), key(10.0, 160.0)];
        let out = resolve_tangents(&keys, &TangentMode::CentralDifference, P16, KeyframeFormat::Hermite16);
        let frames: Vec<f64> = out.iter().map(|k| k.frame).collect();
        assert_eq!(frames, vec![0.0, 10.0, 30.0]);
        assert_eq!(out[1].tangent_in, 171.0);
        assert_eq!(out[1].tangent_out, 171.0);
        assert_eq!(out[0].tangent_out, 0.0);
    }

    #[test]
    fn handles_follow_their_keys_through_sorting() {
        let keys = [key(10.0, 1.0), key(0.0, 0.0)];
        let handles = vec![
            Handles {
                left: (2.0, 1.0),
                right: (2.0, -1.0),
            },
            Handles::default(),
        ];
        let out = resolve_tangents(&keys, &TangentMode::Handles(handles), P16, KeyframeFormat::Hermite16);
        assert_eq!(out[0].frame, 0.0);
        assert_eq!((out[0].tangent_in, out[0].tangent_out), (0.0, 0.0));
        assert_eq!((out[1].tangent_in, out[1].tangent_out), (8.0, -8.0));
    }

    #[test]
    fn stored_tangents_untouched() {
        let keys = [Keyframe {
            frame: 2.0,
            value: 1.0,
            tangent_in: 12.0,
            tangent_out: -3.0,
        }];
        let out = resolve_tangents(&keys, &TangentMode::Stored, P16, KeyframeFormat::Hermite16);
        assert_eq!(out, keys.to_vec());
    }

    #[test]
    fn closures_are_policies() {
        let policy = |index: u32, channel: Channel, _: Option<&Track>| {
            if index == 3 && channel.is_rotation() {
                Some(TrackPlan::default_span(KeyframeFormat::Hermite16, 0, 60))
            } else {
                None
            }
        };
        assert!(policy.plan(3, Channel::RotY, None).is_some());
        assert!(policy.plan(3, Channel::LocY, None).is_none());
        assert!(policy.is_facial(24));
        assert!(!policy.is_facial(22));
    }

    #[test]
    fn stored_policy_uses_its_own_facial_range() {
        let policy = StoredTracks {
            facial_nodes: 1..=2,
        };
        assert!(policy.is_facial(2));
        assert!(!policy.is_facial(23));
        assert!(policy.plan(0, Channel::RotX, None).is_none());
    }
}
