//! Fixed-point scaling and Hermite tangent math.
//!
//! Values on disk are 16-bit integers equal to `value * divisor * sign`,
//! rounded half-to-even and clamped to the `i16` range. Tangents are slopes
//! of that stored curve, so they live in the same scaled units and are never
//! unscaled on decode.

use crate::{Channel, Keyframe, KeyframeFormat};

pub const ROTATION_DIVISOR: f64 = 2607.5945876;
pub const LOCATION_DIVISOR: f64 = 16.0;
pub const SCALE_DIVISOR: f64 = 16.0;
pub const FACIAL_LOCATION_DIVISOR: f64 = 256.0;

const I16_MIN: f64 = i16::MIN as f64;
const I16_MAX: f64 = i16::MAX as f64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Precision {
    pub divisor: f64,
    pub sign: f64,
}

impl Precision {
    pub const UNIT: Precision = Precision {
        divisor: 1.0,
        sign: 1.0,
    };

    /// Facial nodes store location at a finer step and mirrored.
    pub fn for_channel(channel: Channel, facial: bool) -> Self {
        if channel.is_rotation() {
            Precision {
                divisor: ROTATION_DIVISOR,
                sign: 1.0,
            }
        } else if channel.is_location() && facial {
            Precision {
                divisor: FACIAL_LOCATION_DIVISOR,
                sign: -1.0,
            }
        } else if channel.is_location() {
            Precision {
                divisor: LOCATION_DIVISOR,
                sign: 1.0,
            }
        } else {
            Precision {
                divisor: SCALE_DIVISOR,
                sign: 1.0,
            }
        }
    }

    /// Float keyframes are stored unscaled but keep the sign.
    pub fn for_format(self, format: KeyframeFormat) -> Self {
        match format {
            KeyframeFormat::Hermite32 => Precision {
                divisor: 1.0,
                sign: self.sign,
            },
            _ => self,
        }
    }

    pub fn scale(self, value: f64) -> i16 {
        scale(value, self.divisor, self.sign) as i16
    }

    pub fn unscale(self, stored: f64) -> f64 {
        unscale(stored, self.divisor, self.sign)
    }
}

pub fn clamp_i16(value: f64) -> i32 {
    value.clamp(I16_MIN, I16_MAX) as i32
}

pub fn scale(value: f64, divisor: f64, sign: f64) -> i32 {
    clamp_i16((value * divisor * sign).round_ties_even())
}

pub fn unscale(stored: f64, divisor: f64, sign: f64) -> f64 {
    (stored / divisor) * sign
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Tangent {
    pub incoming: f64,
    pub outgoing: f64,
}

/// Control-handle offsets around one keyframe, as `(dx, dy)` pairs in
/// frame/value units. `left` is measured from the left handle to the key,
/// `right` from the key to the right handle, so both point forward in time.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Handles {
    pub left: (f64, f64),
    pub right: (f64, f64),
}

impl Handles {
    /// Offsets from absolute handle positions.
    pub fn from_points(key: (f64, f64), left: (f64, f64), right: (f64, f64)) -> Self {
        Handles {
            left: (key.0 - left.0, key.1 - left.1),
            right: (right.0 - key.0, right.1 - key.1),
        }
    }
}

fn quantize(slope: f64, format: KeyframeFormat) -> f64 {
    if format.is_fixed_point() {
        clamp_i16(slope.round_ties_even()) as f64
    } else {
        slope
    }
}

fn slope(dy: f64, dx: f64, gain: f64) -> f64 {
    if dx == 0.0 {
        0.0
    } else {
        gain * dy / dx
    }
}

/// One slope per interior key from its two neighbours; endpoints stay flat.
/// `keys` must already be sorted by frame. Only fixed-point slopes are
/// mirrored along with the values; float tangents never carry the sign.
pub fn central_difference(
    keys: &[Keyframe],
    precision: Precision,
    format: KeyframeFormat,
) -> Vec<Tangent> {
    let precision = precision.for_format(format);
    let gain = if format.is_fixed_point() {
        precision.divisor * precision.sign
    } else {
        precision.divisor
    };
    (0..keys.len())
        .map(|i| {
            if i == 0 || i + 1 >= keys.len() {
                return Tangent::default();
            }
            let (prev, next) = (&keys[i - 1], &keys[i + 1]);
            let m = quantize(
                slope(next.value - prev.value, next.frame - prev.frame, gain),
                format,
            );
            Tangent {
                incoming: m,
                outgoing: m,
            }
        })
        .collect()
}

/// Handle slopes are scaled by the divisor alone, whatever the sign.
pub fn handle_tangent(handles: &Handles, precision: Precision, format: KeyframeFormat) -> Tangent {
    let gain = precision.for_format(format).divisor;
    let (dx_in, dy_in) = handles.left;
    let (dx_out, dy_out) = handles.right;
    Tangent {
        incoming: quantize(slope(dy_in, dx_in, gain), format),
        outgoing: quantize(slope(dy_out, dx_out, gain), format),
    }
}
