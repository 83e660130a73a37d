use crate::error::SegmentError;
use crate::info::SegmentInfo;
use crate::mapping::Mapping;
use crate::posix;
use crate::provider::SegmentProvider;
use std::ffi::CString;
use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// `HUGETLBFS_MAGIC` from `<linux/magic.h>`.
const HUGETLBFS_MAGIC: u64 = 0x9584_58f6;

/// Linux policy: files under `/dev/shm/hft` (tmpfs), hugepages via `MAP_HUGETLB`.
#[derive(Debug, Clone)]
pub struct LinuxShm {
    base: PathBuf,
}

impl LinuxShm {
    pub const BASE_PATH: &'static str = "/dev/shm/hft";

    pub fn new() -> Self {
        Self::with_base(Self::BASE_PATH)
    }

    /// Same policy rooted somewhere else, e.g. a hugetlbfs mount or a test directory.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl Default for LinuxShm {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentProvider for LinuxShm {
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
            match Mapping::huge(file, len, hugepage_size) {
                Ok(map) => {
                    debug!(size, hugepage_size, "mapped segment with hugepages");
                    return Ok(map);
                }
                Err(err) => {
                    warn!(size, hugepage_size, error = %err, "hugepage mapping rejected, using regular pages");
                }
            }
        }

        let map = Mapping::pages(file, len).map_err(|source| SegmentError::Map { size, source })?;
        debug!(size, "mapped segment");
        Ok(map)
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
            Ok(path) => posix::inspect(&path, hugetlbfs_page_size),
            Err(_) => SegmentInfo::missing(PathBuf::from(name)),
        }
    }
}

/// Block size of the filesystem holding `path` when it is hugetlbfs, else 0.
fn hugetlbfs_page_size(path: &Path) -> u64 {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return 0;
    };
    // SAFETY: statfs only writes into the zeroed struct we pass.
    let mut st: libc::statfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statfs(c_path.as_ptr(), &mut st) } != 0 {
        return 0;
    }
    if (st.f_type as u64 & 0xFFFF_FFFF) == HUGETLBFS_MAGIC {
        st.f_bsize as u64
    } else {
        0
    }
}
