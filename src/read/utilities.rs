use nom::combinator::map;
use nom::number::complete::le_u32;
use nom::IResult;

use crate::{Error, Result};

pub(crate) fn u32_usize(i: &[u8]) -> IResult<&[u8], usize> {
    map(le_u32, |n| n as usize)(i)
}

/// Runs `f` on `buf[offset..limit]`, turning a short read into
/// [`Error::TruncatedBuffer`]. `needed` is checked up front so the error
/// carries the real requirement instead of nom's.
pub(crate) fn read_at<'a, O, F>(
    buf: &'a [u8],
    offset: usize,
    limit: usize,
    needed: usize,
    f: F,
) -> Result<O>
where
    F: Fn(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let limit = limit.min(buf.len());
    match offset.checked_add(needed) {
        Some(end) if end <= limit => {}
        _ => return Err(Error::truncated(offset, needed, limit)),
    }
    f(&buf[offset..limit])
        .map(|(_, v)| v)
        .map_err(|_| Error::truncated(offset, needed, limit))
}

pub(crate) fn usize_at(buf: &[u8], offset: usize) -> Result<usize> {
    read_at(buf, offset, buf.len(), 4, u32_usize)
}
