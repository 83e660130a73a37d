use hftshm_layout::LayoutError;
use hftshm_mmap::SegmentError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error("'{}' is not a ring buffer header of this format", .path.display())]
    NotRingBuffer { path: PathBuf },

    #[error("ring '{ring}' has {field} = {found}, requested {expected}")]
    FormatMismatch {
        ring: String,
        field: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("header segment of '{ring}' is {actual} bytes, metadata says {needed}")]
    HeaderTooSmall { ring: String, needed: u64, actual: u64 },

    #[error("data segment of '{ring}' is {actual} bytes, need at least {needed}")]
    DataTooSmall { ring: String, needed: u64, actual: u64 },
}

impl RingError {
    /// True for failures reported by the operating system, which may be
    /// worth retrying. Everything else is a format or argument problem.
    pub fn is_os_error(&self) -> bool {
        matches!(self, RingError::Segment(_))
    }
}
