use crate::error::SegmentError;
use crate::mapping::Mapping;
use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One open, mapped segment owned by this process.
///
/// Valid only while both the descriptor is open and the mapping is active.
/// Release operations are idempotent; accessors that need the mapping fail
/// with [`SegmentError::InvalidHandle`] once either side is gone.
#[derive(Debug, Default)]
pub struct SegmentHandle {
    path: PathBuf,
    file: Option<File>,
    map: Option<Mapping>,
}

impl SegmentHandle {
    pub fn new(path: PathBuf, file: File, map: Mapping) -> Self {
        Self {
            path,
            file: Some(file),
            map: Some(map),
        }
    }

    /// Path the segment was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw descriptor, or -1 once closed.
    pub fn fd(&self) -> RawFd {
        self.file.as_ref().map_or(-1, |f| f.as_raw_fd())
    }

    /// Base address of the mapping, or null once unmapped.
    pub fn as_ptr(&self) -> *const u8 {
        self.map.as_ref().map_or(std::ptr::null(), |m| m.as_ptr())
    }

    /// Writable base address of the mapping, or null once unmapped.
    ///
    /// For callers that carve the mapping into disjoint regions themselves
    /// instead of borrowing it whole through [`as_mut_slice`](Self::as_mut_slice).
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.map
            .as_mut()
            .map_or(std::ptr::null_mut(), |m| m.as_mut_ptr())
    }

    /// Mapped length in bytes, 0 once unmapped.
    pub fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_valid(&self) -> bool {
        self.fd() >= 0 && !self.as_ptr().is_null() && self.len() > 0
    }

    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn as_slice(&self) -> Result<&[u8], SegmentError> {
        if !self.is_valid() {
            return Err(SegmentError::InvalidHandle);
        }
        self.map.as_deref().ok_or(SegmentError::InvalidHandle)
    }

    pub fn as_mut_slice(&mut self) -> Result<&mut [u8], SegmentError> {
        if !self.is_valid() {
            return Err(SegmentError::InvalidHandle);
        }
        self.map.as_deref_mut().ok_or(SegmentError::InvalidHandle)
    }

    /// Drops the mapping. A no-op when already unmapped.
    ///
    /// Only this process's view goes away; other processes keep theirs.
    pub fn unmap(&mut self) {
        if let Some(map) = self.map.take() {
            debug!(path = %self.path.display(), len = map.len(), "unmapped segment");
        }
    }

    /// Closes the descriptor. A no-op when already closed.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "closed segment");
        }
    }
}
