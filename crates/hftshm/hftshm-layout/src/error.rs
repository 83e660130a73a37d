/// Format errors and rejected arguments.
///
/// Anything reported here means the bytes (or the requested geometry) must not
/// be interpreted any further.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("{field} must be a power of two (got {value})")]
    NotPowerOfTwo { field: &'static str, value: u32 },

    #[error("bad magic {found:#018x}")]
    BadMagic { found: u64 },

    #[error("layout version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u8, expected: u8 },

    #[error("buffer holds {actual} bytes, need at least {needed}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("buffer is not aligned to {align} bytes")]
    Misaligned { align: usize },

    #[error("size computation overflowed")]
    Overflow,

    #[error("consumer {index} out of range (max_consumers = {max})")]
    ConsumerOutOfRange { index: u8, max: u8 },

    #[error("inconsistent metadata: {0}")]
    Inconsistent(&'static str),
}
