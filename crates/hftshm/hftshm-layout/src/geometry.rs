//! Size and offset arithmetic for ring buffer segments.
//!
//! Everything here is pure: no I/O, no state. The provider and the codec call
//! into these functions for every size they need, so the same numbers come
//! out regardless of which process does the computing.
//!
//! # Header segment
//!
//! ```text
//! offset 0                 CACHE_LINE        consumer_0_offset
//! ┌────────────────────────┬─────────────────┬────────────┬─────┬──────────────┬─────────┐
//! │ Metadata (1 line)      │ producer section│ consumer 0 │ ... │ consumer N-1 │ padding │
//! └────────────────────────┴─────────────────┴────────────┴─────┴──────────────┴─────────┘
//!                                                                  rounded up to PAGE_SIZE
//! ```

use crate::consts::{CACHE_LINE, DEFAULT_CONSUMER_SECTION_SIZE, DEFAULT_PRODUCER_SECTION_SIZE, PAGE_SIZE};
use crate::error::LayoutError;

/// True iff `x` is non-zero and has exactly one bit set.
#[inline(always)]
pub const fn is_power_of_two(x: u32) -> bool {
    x != 0 && (x & (x - 1)) == 0
}

/// Exponent `e` such that `2^e == size`.
///
/// Only powers of two have an exact answer; anything else is rejected.
pub fn log2_of(size: u32) -> Result<u8, LayoutError> {
    if !is_power_of_two(size) {
        return Err(LayoutError::NotPowerOfTwo {
            field: "size",
            value: size,
        });
    }
    Ok(size.trailing_zeros() as u8)
}

/// Smallest `e` with `2^e >= size`. Returns 0 for 0 and 1.
///
/// Used for `header_size_log2`, since a page-rounded header is not always a
/// power of two.
pub const fn ceil_log2(size: u32) -> u8 {
    if size <= 1 {
        0
    } else {
        (u32::BITS - (size - 1).leading_zeros()) as u8
    }
}

/// Producer section starts right after the metadata record.
#[inline]
pub const fn default_producer_offset() -> u32 {
    CACHE_LINE as u32
}

/// Consumer 0 starts right after the producer section.
#[inline]
pub const fn default_consumer_0_offset(producer_section_size: u32) -> u32 {
    CACHE_LINE as u32 + producer_section_size
}

/// Metadata record + producer section + one section per consumer.
pub fn raw_header_size(
    max_consumers: u8,
    producer_section_size: u32,
    consumer_section_size: u32,
) -> Result<u32, LayoutError> {
    (max_consumers as u32)
        .checked_mul(consumer_section_size)
        .and_then(|consumers| consumers.checked_add(producer_section_size))
        .and_then(|sections| sections.checked_add(CACHE_LINE as u32))
        .ok_or(LayoutError::Overflow)
}

/// [`raw_header_size`] rounded up to a whole number of pages.
pub fn header_segment_size(
    max_consumers: u8,
    producer_section_size: u32,
    consumer_section_size: u32,
) -> Result<u32, LayoutError> {
    let raw = raw_header_size(max_consumers, producer_section_size, consumer_section_size)?;
    raw.div_ceil(PAGE_SIZE)
        .checked_mul(PAGE_SIZE)
        .ok_or(LayoutError::Overflow)
}

/// Bytes to reserve for the data segment.
///
/// With regular pages the buffer size is used as is (a power of two is
/// already page-aligned). With hugepages it is rounded up to a whole number
/// of hugepages, since the kernel cannot map a partial one.
pub fn data_segment_size(buffer_size: u32, hugepage_size: u64) -> u64 {
    let buffer_size = buffer_size as u64;
    if hugepage_size == 0 {
        return buffer_size;
    }
    buffer_size.div_ceil(hugepage_size) * hugepage_size
}

/// Sizes and offsets of a ring buffer with the default section sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLayout {
    pub max_consumers: u8,
    pub event_size: u16,
    pub buffer_size: u32,
    pub hugepage_size: u64,
    pub producer_offset: u32,
    pub consumer_0_offset: u32,
    pub header_size: u32,
    pub data_size: u64,
}

impl RingLayout {
    /// Computes the layout of a new ring buffer.
    ///
    /// # Errors
    /// - `buffer_size` is not a power of two
    /// - `event_size` is non-zero and not a power of two
    /// - the header size does not fit in 32 bits
    pub fn new(
        max_consumers: u8,
        event_size: u16,
        buffer_size: u32,
        hugepage_size: u64,
    ) -> Result<Self, LayoutError> {
        if !is_power_of_two(buffer_size) {
            return Err(LayoutError::NotPowerOfTwo {
                field: "buffer_size",
                value: buffer_size,
            });
        }
        if event_size != 0 && !is_power_of_two(event_size as u32) {
            return Err(LayoutError::NotPowerOfTwo {
                field: "event_size",
                value: event_size as u32,
            });
        }

        let header_size = header_segment_size(
            max_consumers,
            DEFAULT_PRODUCER_SECTION_SIZE,
            DEFAULT_CONSUMER_SECTION_SIZE,
        )?;

        Ok(Self {
            max_consumers,
            event_size,
            buffer_size,
            hugepage_size,
            producer_offset: default_producer_offset(),
            consumer_0_offset: default_consumer_0_offset(DEFAULT_PRODUCER_SECTION_SIZE),
            header_size,
            data_size: data_segment_size(buffer_size, hugepage_size),
        })
    }
}
