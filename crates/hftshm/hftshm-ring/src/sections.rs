use crate::error::RingError;
use hftshm_layout::{Metadata, consumer_offset, consumer_section_size, producer_section_size};
use std::ops::Range;
use std::ptr::NonNull;
use std::slice;

pub(crate) fn producer_range(meta: &Metadata) -> Range<usize> {
    let start = meta.producer_offset as usize;
    start..start + producer_section_size(meta) as usize
}

pub(crate) fn consumer_range(meta: &Metadata, n: u8) -> Result<Range<usize>, RingError> {
    let start = consumer_offset(meta, n)? as usize;
    Ok(start..start + consumer_section_size(meta) as usize)
}

/// Shared view of `range` inside the header mapping at `base`.
///
/// # Safety
/// `base` must point to a live mapping at least `range.end` bytes long, and
/// `range` must not be borrowed mutably for `'a`.
pub(crate) unsafe fn section<'a>(base: NonNull<u8>, range: Range<usize>) -> &'a [u8] {
    unsafe { slice::from_raw_parts(base.as_ptr().add(range.start), range.len()) }
}

/// Exclusive view of `range` inside the header mapping at `base`.
///
/// Ranges from [`producer_range`] and [`consumer_range`] never cover the
/// metadata record, so this never aliases the `&Metadata` derived from `base`.
///
/// # Safety
/// As [`section`], and `range` must not be borrowed at all for `'a`.
pub(crate) unsafe fn section_mut<'a>(base: NonNull<u8>, range: Range<usize>) -> &'a mut [u8] {
    unsafe { slice::from_raw_parts_mut(base.as_ptr().add(range.start), range.len()) }
}

pub(crate) fn check_header_len(ring: &str, meta: &Metadata, len: usize) -> Result<(), RingError> {
    if (len as u64) < meta.header_size as u64 {
        return Err(RingError::HeaderTooSmall {
            ring: ring.to_string(),
            needed: meta.header_size as u64,
            actual: len as u64,
        });
    }
    Ok(())
}

pub(crate) fn check_data_len(ring: &str, meta: &Metadata, len: usize) -> Result<(), RingError> {
    if (len as u64) < meta.buffer_size as u64 {
        return Err(RingError::DataTooSmall {
            ring: ring.to_string(),
            needed: meta.buffer_size as u64,
            actual: len as u64,
        });
    }
    Ok(())
}
