use crate::error::SegmentError;
use crate::handle::SegmentHandle;
use crate::info::SegmentInfo;
use crate::mapping::Mapping;
use crate::posix;
use crate::view::SegmentView;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const HEADER_SUFFIX: &str = ".hdr";
pub const DATA_SUFFIX: &str = ".dat";

/// Segment name of a ring's header object: `<ring>.hdr`.
pub fn header_name(ring: &str) -> String {
    format!("{ring}{HEADER_SUFFIX}")
}

/// Segment name of a ring's data object: `<ring>.dat`.
pub fn data_name(ring: &str) -> String {
    format!("{ring}{DATA_SUFFIX}")
}

/// Rejects names that would escape the base directory.
pub fn validate_name(name: &str) -> Result<(), SegmentError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(SegmentError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Platform policy for named shared-memory segments.
///
/// Every implementation keeps the same external semantics; only the OS
/// primitive and the base directory differ. Callers should depend on this
/// trait (or [`crate::DefaultProvider`]) rather than a concrete variant.
///
/// Release is handled by [`SegmentHandle::unmap`] / [`SegmentHandle::close`]
/// (or by dropping the handle or the raw `File`/[`Mapping`]).
pub trait SegmentProvider {
    /// Directory holding every segment of this provider.
    fn base_dir(&self) -> &Path;

    /// Creates `name` exclusively, or opens it when it already exists, and
    /// resizes it to `size` if needed.
    ///
    /// Concurrent callers are not serialized: the last resize wins.
    fn create_or_open(&self, name: &str, size: u64, hugepage_size: u64)
    -> Result<File, SegmentError>;

    /// Maps `size` bytes of `file` shared and read-write.
    ///
    /// A hugepage request that the OS rejects falls back once to regular
    /// pages; success says nothing about which page size was used.
    fn map(&self, file: &File, size: u64, hugepage_size: u64) -> Result<Mapping, SegmentError>;

    /// Opens an existing segment read-write without creating it.
    fn open_existing(&self, name: &str) -> Result<File, SegmentError>;

    /// Current backing size, 0 when it cannot be queried.
    fn size_of(&self, file: &File) -> u64;

    /// Removes `name` from the namespace. Existing mappings stay valid.
    fn unlink(&self, name: &str) -> Result<(), SegmentError>;

    /// Filesystem snapshot of `name`; never opens or maps it.
    fn inspect(&self, name: &str) -> SegmentInfo;

    /// `<base>/<name>`, after checking the name stays inside the base directory.
    fn path(&self, name: &str) -> Result<PathBuf, SegmentError> {
        validate_name(name)?;
        Ok(self.base_dir().join(name))
    }

    /// [`create_or_open`](Self::create_or_open) followed by [`map`](Self::map).
    fn create_segment(
        &self,
        name: &str,
        size: u64,
        hugepage_size: u64,
    ) -> Result<SegmentHandle, SegmentError> {
        let path = self.path(name)?;
        let file = self.create_or_open(name, size, hugepage_size)?;
        let map = self.map(&file, size, hugepage_size)?;
        Ok(SegmentHandle::new(path, file, map))
    }

    /// [`open_existing`](Self::open_existing) and map the whole current size.
    fn attach_segment(&self, name: &str) -> Result<SegmentHandle, SegmentError> {
        let path = self.path(name)?;
        let file = self.open_existing(name)?;
        let size = self.size_of(&file);
        let map = self.map(&file, size, 0)?;
        Ok(SegmentHandle::new(path, file, map))
    }

    /// Opens and maps `name` read-only at its current size.
    ///
    /// Needs only read permission and can never change the segment.
    fn peek_segment(&self, name: &str) -> Result<SegmentView, SegmentError> {
        let path = self.path(name)?;
        let file = posix::open_read_only(&path)?;
        SegmentView::map(path, &file, self.size_of(&file))
    }

    /// Names of every ring with a header segment in the base directory, sorted.
    fn list_rings(&self) -> Result<Vec<String>, SegmentError> {
        let dir = self.base_dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SegmentError::List {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut rings: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let ring = name.strip_suffix(HEADER_SUFFIX)?;
                (!ring.is_empty()).then(|| ring.to_string())
            })
            .collect();
        rings.sort();
        Ok(rings)
    }
}
