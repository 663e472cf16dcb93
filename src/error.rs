//! Error types for the `.mot` codec.
//!
//! Most decode conditions are not fatal: the walkers record them as
//! diagnostics and keep going. Only a top-level call that cannot read a
//! single header returns one of these as an `Err`.

use cookie_factory::GenError;
use thiserror::Error;

use crate::Channel;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Fewer bytes remain than a header or record needs.
    #[error("truncated buffer at {offset:#x}: needed {needed} bytes, {available} available")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A section declared a size of zero or one that runs past the buffer.
    #[error("invalid section size {size} at {offset:#x} ({remaining} bytes remaining)")]
    InvalidSize {
        offset: usize,
        size: u32,
        remaining: usize,
    },

    /// Track format byte is none of the known keyframe layouts.
    #[error("unknown keyframe format {code:#04x} in track at {offset:#x}")]
    UnknownFormat { offset: usize, code: u8 },

    /// Composite id carries channel bits with no channel mapping.
    #[error("unknown channel bits {bits:#06x} in track at {offset:#x}")]
    UnknownChannel { offset: usize, bits: u16 },

    /// A track with real keyframes was requested but none were supplied.
    #[error("{channel:?} track has no keyframes")]
    EmptyTrack { channel: Channel },

    #[error("serialization failed: {0:?}")]
    Serialize(GenError),
}

impl From<GenError> for Error {
    fn from(err: GenError) -> Self {
        Error::Serialize(err)
    }
}

impl Error {
    pub(crate) fn truncated(offset: usize, needed: usize, limit: usize) -> Self {
        Error::TruncatedBuffer {
            offset,
            needed,
            available: limit.saturating_sub(offset),
        }
    }
}
