//! Binary layout of the header record and the codec that reads and writes it.
//!
//! # Memory Layout
//!
//! ```text
//! 0x00 ┌──────────────────────────────────────────────┐
//!      │ magic: u64                                   │
//! 0x08 ├──────────┬───────────────┬──────────────────┤
//!      │ version  │ max_consumers │ event_size: u16  │
//! 0x0C ├──────────┴───────────────┴──────────────────┤
//!      │ producer_pid: u32 (atomic)                   │
//! 0x10 ├──────────────────────────────────────────────┤
//!      │ buffer_size, producer_offset,                │
//!      │ consumer_0_offset, header_size, index_mask   │
//! 0x24 ├──────────────────────────────────────────────┤
//!      │ event/buffer/header size log2 (u8 each)      │
//! 0x27 ├──────────────────────────────────────────────┤
//!      │ zero padding up to CACHE_LINE                │
//!      └──────────────────────────────────────────────┘
//! ```
//!
//! All fields are little-endian. Everything but `producer_pid` is written once
//! by [`metadata_init`] and never touched again, so a reader that sees a valid
//! magic and version can trust the rest without further synchronization.

use crate::consts::{
    CACHE_LINE, DEFAULT_CONSUMER_SECTION_SIZE, METADATA_FIXED_SIZE, METADATA_MAGIC,
    METADATA_VERSION, PAGE_SIZE,
};
use crate::error::LayoutError;
use crate::geometry::{ceil_log2, is_power_of_two};
use serde::Serialize;
use std::mem::{align_of, offset_of, size_of};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Header record stored at offset 0 of every `.hdr` segment.
///
/// Exactly one cache line long and cache-line aligned, so the producer's
/// attach/detach writes never share a line with the control sections.
#[cfg_attr(
    all(target_arch = "aarch64", target_vendor = "apple"),
    repr(C, align(128))
)]
#[cfg_attr(
    not(all(target_arch = "aarch64", target_vendor = "apple")),
    repr(C, align(64))
)]
#[derive(Debug)]
pub struct Metadata {
    /// Must equal [`METADATA_MAGIC`].
    pub magic: u64,
    /// Must equal [`METADATA_VERSION`].
    pub version: u8,
    /// Number of consumer sections reserved at creation.
    pub max_consumers: u8,
    /// Event size in bytes, 0 for variable-length events.
    pub event_size: u16,
    /// Pid of the attached producer, 0 when none. Advisory only.
    producer_pid: AtomicU32,
    /// Power of two.
    pub buffer_size: u32,
    pub producer_offset: u32,
    pub consumer_0_offset: u32,
    /// Page-aligned size of the whole header segment.
    pub header_size: u32,
    /// `buffer_size - 1`.
    pub index_mask: u32,
    pub event_size_log2: u8,
    pub buffer_size_log2: u8,
    /// Ceiling log2, since `header_size` is page-rounded rather than a power of two.
    pub header_size_log2: u8,
    padding: [u8; CACHE_LINE - METADATA_FIXED_SIZE],
}

const _: () = assert!(size_of::<Metadata>() == CACHE_LINE);
const _: () = assert!(align_of::<Metadata>() == CACHE_LINE);
const _: () = assert!(offset_of!(Metadata, version) == 0x08);
const _: () = assert!(offset_of!(Metadata, event_size) == 0x0A);
const _: () = assert!(offset_of!(Metadata, producer_pid) == 0x0C);
const _: () = assert!(offset_of!(Metadata, buffer_size) == 0x10);
const _: () = assert!(offset_of!(Metadata, index_mask) == 0x20);
const _: () = assert!(offset_of!(Metadata, header_size_log2) == 0x26);
const _: () = assert!(offset_of!(Metadata, padding) == METADATA_FIXED_SIZE);

/// Plain copy of every metadata field, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetadataSnapshot {
    pub magic: u64,
    pub version: u8,
    pub max_consumers: u8,
    pub event_size: u16,
    pub producer_pid: u32,
    pub buffer_size: u32,
    pub producer_offset: u32,
    pub consumer_0_offset: u32,
    pub header_size: u32,
    pub index_mask: u32,
    pub event_size_log2: u8,
    pub buffer_size_log2: u8,
    pub header_size_log2: u8,
}

impl Metadata {
    /// Current producer pid (0 = no producer attached).
    #[inline]
    pub fn producer_pid(&self) -> u32 {
        self.producer_pid.load(Ordering::Acquire)
    }

    /// Records `pid` as the attached producer and returns the previous value.
    ///
    /// A single aligned 32-bit atomic write: readers may see a stale pid but
    /// never a torn one. Nothing stops two producers from both attaching.
    #[inline]
    pub fn set_producer_pid(&self, pid: u32) -> u32 {
        self.producer_pid.swap(pid, Ordering::AcqRel)
    }

    /// Clears the producer pid if it still equals `pid`.
    ///
    /// Returns `false` when another process has taken over since.
    #[inline]
    pub fn clear_producer_pid(&self, pid: u32) -> bool {
        self.producer_pid
            .compare_exchange(pid, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn snapshot(&self) -> MetadataSnapshot {
        MetadataSnapshot {
            magic: self.magic,
            version: self.version,
            max_consumers: self.max_consumers,
            event_size: self.event_size,
            producer_pid: self.producer_pid(),
            buffer_size: self.buffer_size,
            producer_offset: self.producer_offset,
            consumer_0_offset: self.consumer_0_offset,
            header_size: self.header_size,
            index_mask: self.index_mask,
            event_size_log2: self.event_size_log2,
            buffer_size_log2: self.buffer_size_log2,
            header_size_log2: self.header_size_log2,
        }
    }

    /// Checks the full invariant set, not just magic and version.
    ///
    /// # Returns
    /// - `Ok(())` if every invariant holds
    /// - `Err(LayoutError)` describing the first one that does not
    pub fn check(&self) -> Result<(), LayoutError> {
        if self.magic != METADATA_MAGIC {
            return Err(LayoutError::BadMagic { found: self.magic });
        }
        if self.version != METADATA_VERSION {
            return Err(LayoutError::VersionMismatch {
                found: self.version,
                expected: METADATA_VERSION,
            });
        }
        if !is_power_of_two(self.buffer_size) {
            return Err(LayoutError::NotPowerOfTwo {
                field: "buffer_size",
                value: self.buffer_size,
            });
        }
        if self.index_mask != self.buffer_size - 1 {
            return Err(LayoutError::Inconsistent("index_mask != buffer_size - 1"));
        }
        if self.buffer_size_log2 as u32 != self.buffer_size.trailing_zeros() {
            return Err(LayoutError::Inconsistent("buffer_size_log2"));
        }
        if self.event_size != 0 && !is_power_of_two(self.event_size as u32) {
            return Err(LayoutError::NotPowerOfTwo {
                field: "event_size",
                value: self.event_size as u32,
            });
        }
        if self.event_size_log2 as u32 != (self.event_size as u32).trailing_zeros() % 32 {
            return Err(LayoutError::Inconsistent("event_size_log2"));
        }
        if self.header_size_log2 != ceil_log2(self.header_size) {
            return Err(LayoutError::Inconsistent("header_size_log2"));
        }
        if (self.producer_offset as usize) < size_of::<Metadata>() {
            return Err(LayoutError::Inconsistent("producer section overlaps metadata"));
        }
        if self.consumer_0_offset <= self.producer_offset {
            return Err(LayoutError::Inconsistent(
                "consumer_0_offset must follow producer_offset",
            ));
        }
        if self.header_size == 0 || self.header_size % PAGE_SIZE != 0 {
            return Err(LayoutError::Inconsistent("header_size is not page-aligned"));
        }
        let sections_end = self.consumer_0_offset as u64
            + self.max_consumers as u64 * DEFAULT_CONSUMER_SECTION_SIZE as u64;
        if (self.header_size as u64) < sections_end {
            return Err(LayoutError::Inconsistent(
                "header_size too small for consumer sections",
            ));
        }
        Ok(())
    }
}

fn check_view(len: usize, addr: usize) -> Result<(), LayoutError> {
    if len < size_of::<Metadata>() {
        return Err(LayoutError::BufferTooSmall {
            needed: size_of::<Metadata>(),
            actual: len,
        });
    }
    if addr % align_of::<Metadata>() != 0 {
        return Err(LayoutError::Misaligned {
            align: align_of::<Metadata>(),
        });
    }
    Ok(())
}

/// Writes a fresh header record at the start of `buf`.
///
/// `index_mask` and the log2 fields are derived here; `producer_pid` starts
/// at 0 and the padding is zeroed.
///
/// # Errors
/// - `buffer_size` is not a power of two, or `event_size` is non-zero and not
///   a power of two
/// - the offsets and header size break the metadata invariants
/// - `buf` is shorter than one record or not cache-line aligned
///
/// Nothing is written when an error is returned.
pub fn metadata_init(
    buf: &mut [u8],
    max_consumers: u8,
    event_size: u16,
    buffer_size: u32,
    producer_offset: u32,
    consumer_0_offset: u32,
    header_size: u32,
) -> Result<&Metadata, LayoutError> {
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
    check_view(buf.len(), buf.as_ptr() as usize)?;

    let meta = Metadata {
        magic: METADATA_MAGIC,
        version: METADATA_VERSION,
        max_consumers,
        event_size,
        producer_pid: AtomicU32::new(0),
        buffer_size,
        producer_offset,
        consumer_0_offset,
        header_size,
        index_mask: buffer_size - 1,
        event_size_log2: if event_size == 0 {
            0
        } else {
            event_size.trailing_zeros() as u8
        },
        buffer_size_log2: buffer_size.trailing_zeros() as u8,
        header_size_log2: ceil_log2(header_size),
        padding: [0; CACHE_LINE - METADATA_FIXED_SIZE],
    };
    meta.check()?;

    let dst = buf.as_mut_ptr() as *mut Metadata;
    // SAFETY: length and alignment were checked above and `buf` is borrowed
    // mutably for as long as the returned reference lives.
    unsafe {
        ptr::write(dst, meta);
        Ok(&*dst)
    }
}

/// True iff `buf` starts with this format's magic and version.
///
/// This is the only gate before trusting any other field. A zero-filled
/// (freshly created) segment fails it.
pub fn metadata_validate(buf: &[u8]) -> bool {
    if buf.len() < size_of::<Metadata>() {
        return false;
    }
    let mut magic = [0u8; 8];
    magic.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(magic) == METADATA_MAGIC && buf[offset_of!(Metadata, version)] == METADATA_VERSION
}

/// Zero-copy view of the record at the start of `buf`.
///
/// Does not look at magic or version; call [`metadata_validate`] first.
pub fn metadata_get(buf: &[u8]) -> Result<&Metadata, LayoutError> {
    check_view(buf.len(), buf.as_ptr() as usize)?;
    // SAFETY: size and alignment checked; every bit pattern is a valid
    // `Metadata` (integers, an atomic integer and a byte array).
    Ok(unsafe { &*(buf.as_ptr() as *const Metadata) })
}

/// Bytes between the producer section and consumer 0.
#[inline]
pub fn producer_section_size(meta: &Metadata) -> u32 {
    meta.consumer_0_offset.saturating_sub(meta.producer_offset)
}

/// Size of each consumer section (0 when the ring has no consumers).
#[inline]
pub fn consumer_section_size(meta: &Metadata) -> u32 {
    if meta.max_consumers == 0 {
        0
    } else {
        DEFAULT_CONSUMER_SECTION_SIZE
    }
}

/// Absolute header offset of consumer section `n`.
pub fn consumer_offset(meta: &Metadata, n: u8) -> Result<u32, LayoutError> {
    if n >= meta.max_consumers {
        return Err(LayoutError::ConsumerOutOfRange {
            index: n,
            max: meta.max_consumers,
        });
    }
    Ok(meta.consumer_0_offset + n as u32 * consumer_section_size(meta))
}

/// Byte offset of slot `index` in the data segment: `index * event_size`.
#[inline(always)]
pub fn event_offset(meta: &Metadata, index: u32) -> u32 {
    index << meta.event_size_log2
}

/// Physical slot for a monotonically increasing sequence number.
#[inline(always)]
pub fn buffer_index(meta: &Metadata, sequence: u64) -> u32 {
    (sequence as u32) & meta.index_mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RingLayout;

    #[repr(C, align(128))]
    struct Page([u8; 4096]);

    impl Page {
        fn zeroed() -> Box<Self> {
            Box::new(Page([0; 4096]))
        }
    }

    fn init_default(buf: &mut [u8], max_consumers: u8, event_size: u16, buffer_size: u32) -> &Metadata {
        let layout = RingLayout::new(max_consumers, event_size, buffer_size, 0).unwrap();
        metadata_init(
            buf,
            max_consumers,
            event_size,
            buffer_size,
            layout.producer_offset,
            layout.consumer_0_offset,
            layout.header_size,
        )
        .unwrap()
    }

    /// Byte offsets are the cross-process contract; pin them.
    #[test]
    fn field_offsets_are_stable() {
        assert_eq!(offset_of!(Metadata, magic), 0x00);
        assert_eq!(offset_of!(Metadata, max_consumers), 0x09);
        assert_eq!(offset_of!(Metadata, producer_offset), 0x14);
        assert_eq!(offset_of!(Metadata, consumer_0_offset), 0x18);
        assert_eq!(offset_of!(Metadata, header_size), 0x1C);
        assert_eq!(offset_of!(Metadata, event_size_log2), 0x24);
        assert_eq!(offset_of!(Metadata, buffer_size_log2), 0x25);
        assert_eq!(size_of::<Metadata>(), CACHE_LINE);
    }

    #[test]
    fn test1_geometry() {
        let mut page = Page::zeroed();
        let meta = init_default(&mut page.0, 4, 64, 1024);
        assert_eq!(meta.index_mask, 1023);
        assert_eq!(meta.buffer_size_log2, 10);
        assert_eq!(meta.event_size_log2, 6);
        assert_eq!(meta.header_size, 4096);
        assert_eq!(meta.header_size_log2, 12);
        assert_eq!(meta.producer_pid(), 0);
        assert!(metadata_validate(&page.0));
    }

    #[test]
    fn bytes_are_little_endian() {
        let mut page = Page::zeroed();
        init_default(&mut page.0, 2, 8, 256);
        assert_eq!(&page.0[..8], b"HFTSHM\x02\x00");
        assert_eq!(page.0[8], METADATA_VERSION);
        assert_eq!(page.0[9], 2);
        assert_eq!(&page.0[0x10..0x14], &256u32.to_le_bytes());
        assert!(page.0[METADATA_FIXED_SIZE..CACHE_LINE].iter().all(|&b| b == 0));
    }

    #[test]
    fn zeroed_buffer_is_not_valid() {
        let page = Page::zeroed();
        assert!(!metadata_validate(&page.0));
        let meta = metadata_get(&page.0).unwrap();
        assert_eq!(meta.check(), Err(LayoutError::BadMagic { found: 0 }));
    }

    #[test]
    fn short_buffer_is_not_valid() {
        let page = Page::zeroed();
        assert!(!metadata_validate(&page.0[..16]));
        assert!(matches!(
            metadata_get(&page.0[..16]),
            Err(LayoutError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        let mut page = Page::zeroed();
        assert_eq!(
            metadata_init(&mut page.0[8..], 1, 0, 64, 64, 192, 4096).unwrap_err(),
            LayoutError::Misaligned {
                align: CACHE_LINE
            }
        );
    }

    #[test]
    fn init_rejects_without_writing() {
        let mut page = Page::zeroed();
        let err = metadata_init(&mut page.0, 4, 64, 1000, 64, 192, 4096).unwrap_err();
        assert!(matches!(err, LayoutError::NotPowerOfTwo { field: "buffer_size", .. }));
        let err = metadata_init(&mut page.0, 4, 24, 1024, 64, 192, 4096).unwrap_err();
        assert!(matches!(err, LayoutError::NotPowerOfTwo { field: "event_size", .. }));
        assert!(page.0.iter().all(|&b| b == 0));
    }

    #[test]
    fn init_rejects_inconsistent_offsets() {
        let mut page = Page::zeroed();
        let p = CACHE_LINE as u32;
        let err = metadata_init(&mut page.0, 4, 64, 1024, p, p, 4096).unwrap_err();
        assert!(matches!(err, LayoutError::Inconsistent(_)));
        let err = metadata_init(&mut page.0, 4, 64, 1024, p, 3 * p, 4000).unwrap_err();
        assert!(matches!(err, LayoutError::Inconsistent(_)));
        let err = metadata_init(&mut page.0, 4, 64, 1024, 0, 3 * p, 4096).unwrap_err();
        assert!(matches!(err, LayoutError::Inconsistent(_)));
    }

    #[test]
    fn check_detects_wrong_version() {
        let mut page = Page::zeroed();
        init_default(&mut page.0, 1, 0, 64);
        page.0[8] = METADATA_VERSION + 1;
        assert!(!metadata_validate(&page.0));
        assert_eq!(
            metadata_get(&page.0).unwrap().check(),
            Err(LayoutError::VersionMismatch {
                found: METADATA_VERSION + 1,
                expected: METADATA_VERSION
            })
        );
    }

    #[test]
    fn check_detects_corrupted_mask() {
        let mut page = Page::zeroed();
        init_default(&mut page.0, 1, 0, 64);
        page.0[0x20] = 0x0F;
        assert!(metadata_validate(&page.0));
        assert!(matches!(
            metadata_get(&page.0).unwrap().check(),
            Err(LayoutError::Inconsistent(_))
        ));
    }

    #[test]
    fn variable_size_events_use_zero_log2() {
        let mut page = Page::zeroed();
        let meta = init_default(&mut page.0, 2, 0, 1 << 20);
        assert_eq!(meta.event_size_log2, 0);
        assert_eq!(event_offset(meta, 17), 17);
        assert!(meta.check().is_ok());
    }

    #[test]
    fn consumer_sections_are_contiguous() {
        let mut page = Page::zeroed();
        let meta = init_default(&mut page.0, 4, 64, 1024);
        let size = consumer_section_size(meta);
        assert_eq!(size, DEFAULT_CONSUMER_SECTION_SIZE);
        assert_eq!(producer_section_size(meta), 2 * CACHE_LINE as u32);
        assert_eq!(consumer_offset(meta, 0), Ok(meta.consumer_0_offset));
        assert_eq!(consumer_offset(meta, 3), Ok(meta.consumer_0_offset + 3 * size));
        assert_eq!(
            consumer_offset(meta, 4),
            Err(LayoutError::ConsumerOutOfRange { index: 4, max: 4 })
        );
    }

    #[test]
    fn hot_path_helpers() {
        let mut page = Page::zeroed();
        let meta = init_default(&mut page.0, 1, 64, 8);
        assert_eq!(buffer_index(meta, 15), 7);
        assert_eq!(buffer_index(meta, 16), 0);
        assert_eq!(buffer_index(meta, u64::MAX), 7);
        assert_eq!(event_offset(meta, 3), 192);
    }

    #[test]
    fn producer_pid_is_advisory() {
        let mut page = Page::zeroed();
        let meta = init_default(&mut page.0, 1, 0, 64);
        assert_eq!(meta.set_producer_pid(42), 0);
        assert_eq!(meta.producer_pid(), 42);
        assert!(!meta.clear_producer_pid(7));
        assert_eq!(meta.set_producer_pid(7), 42);
        assert!(meta.clear_producer_pid(7));
        assert_eq!(meta.producer_pid(), 0);
        assert_eq!(meta.snapshot().producer_pid, 0);
    }
}
