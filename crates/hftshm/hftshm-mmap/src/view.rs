use crate::error::SegmentError;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Read-only mapping of a segment, for diagnostics.
///
/// The descriptor is closed as soon as the map exists; the view stays valid
/// until dropped even if the segment is unlinked meanwhile.
#[derive(Debug)]
pub struct SegmentView {
    path: PathBuf,
    map: Mmap,
}

impl SegmentView {
    pub(crate) fn map(path: PathBuf, file: &File, size: u64) -> Result<Self, SegmentError> {
        let len = usize::try_from(size).map_err(|_| SegmentError::InvalidHandle)?;
        if len == 0 {
            return Err(SegmentError::InvalidHandle);
        }
        // SAFETY: other processes may write the segment while it is mapped;
        // callers only ever get plain bytes out of it.
        let map = unsafe { MmapOptions::new().len(len).map(file) }
            .map_err(|source| SegmentError::Map { size, source })?;
        Ok(Self { path, map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
