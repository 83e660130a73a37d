use crate::error::SegmentError;
use crate::info::SegmentInfo;
use crate::mapping::Mapping;
use crate::posix;
use crate::provider::SegmentProvider;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Portable unix policy: plain files under `/tmp/hft`, regular pages only.
#[derive(Debug, Clone)]
pub struct TmpShm {
    base: PathBuf,
}

impl TmpShm {
    pub const BASE_PATH: &'static str = "/tmp/hft";

    pub fn new() -> Self {
        Self::with_base(Self::BASE_PATH)
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl Default for TmpShm {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentProvider for TmpShm {
    fn base_dir(&self) -> &Path {
        &self.base
    }

    fn create_or_open(
        &self,
        name: &str,
        size: u64,
        _hugepage_size: u64,
    ) -> Result<File, SegmentError> {
        let path = self.path(name)?;
        posix::ensure_dir(&self.base)?;
        posix::create_or_open(&path, size)
    }

    fn map(&self, file: &File, size: u64, hugepage_size: u64) -> Result<Mapping, SegmentError> {
        let len = usize::try_from(size).map_err(|_| SegmentError::InvalidHandle)?;
        if len == 0 {
            return Err(SegmentError::InvalidHandle);
        }
        if hugepage_size > 0 {
            debug!(hugepage_size, "hugepages unsupported here, using regular pages");
        }
        Mapping::pages(file, len).map_err(|source| SegmentError::Map { size, source })
    }

    fn open_existing(&self, name: &str) -> Result<File, SegmentError> {
        posix::open_existing(&self.path(name)?)
    }

    fn size_of(&self, file: &File) -> u64 {
        posix::file_len(file)
    }

    fn unlink(&self, name: &str) -> Result<(), SegmentError> {
        posix::unlink(&self.path(name)?)
    }

    fn inspect(&self, name: &str) -> SegmentInfo {
        match self.path(name) {
            Ok(path) => posix::inspect(&path, |_| 0),
            Err(_) => SegmentInfo::missing(PathBuf::from(name)),
        }
    }
}
