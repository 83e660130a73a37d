//! Format constants shared by every process that maps a ring buffer.
//!
//! These values are part of the binary contract: two independently built
//! binaries agree on a segment only if they agree on every constant here.

/// Size of the false-sharing boundary on the target.
///
/// Apple Silicon uses 128-byte cache lines; every other supported target is
/// treated as 64 bytes. All alignment and padding derives from this constant.
#[cfg(all(target_arch = "aarch64", target_vendor = "apple"))]
pub const CACHE_LINE: usize = 128;

#[cfg(not(all(target_arch = "aarch64", target_vendor = "apple")))]
pub const CACHE_LINE: usize = 64;

const _: () = assert!(CACHE_LINE == 64 || CACHE_LINE == 128);

/// Header segments are rounded up to this many bytes.
pub const PAGE_SIZE: u32 = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SIZE_LOG2: u8 = 12;

/// Magic number identifying a ring buffer header.
///
/// Little-endian bytes spell `"HFTSHM\x02\x00"`; the trailing `\x02` mirrors
/// the layout version so a glance at a hex dump tells the two apart.
pub const METADATA_MAGIC: u64 = 0x0002_4D48_5354_4648;

/// Layout version. Version 2 keeps header and data in separate segments.
///
/// Readers reject any other value instead of trying to interpret it.
pub const METADATA_VERSION: u8 = 2;

/// Bytes used by the fixed metadata fields, before padding.
pub const METADATA_FIXED_SIZE: usize = 39;

/// Producer control section size used by [`crate::RingLayout`].
pub const DEFAULT_PRODUCER_SECTION_SIZE: u32 = 2 * CACHE_LINE as u32;

/// Consumer control section size.
///
/// The header does not record this value, so it is fixed by the format.
pub const DEFAULT_CONSUMER_SECTION_SIZE: u32 = 2 * CACHE_LINE as u32;

/// 2 MiB hugepages.
pub const HUGEPAGE_2MB: u64 = 2 * 1024 * 1024;

/// 1 GiB hugepages.
pub const HUGEPAGE_1GB: u64 = 1024 * 1024 * 1024;
