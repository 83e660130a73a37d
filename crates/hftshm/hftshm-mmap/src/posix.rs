//! File-backed operations shared by every unix provider.

use crate::error::SegmentError;
use crate::info::{SegmentInfo, permission_string};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tracing::debug;

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), SegmentError> {
    fs::create_dir_all(dir).map_err(|source| SegmentError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

pub(crate) fn file_len(file: &File) -> u64 {
    file.metadata().map(|m| m.len()).unwrap_or(0)
}

/// Exclusive create, falling back to opening the existing file.
///
/// Either way the file ends up `size` bytes long; when several processes race
/// the last resize wins.
pub(crate) fn create_or_open(path: &Path, size: u64) -> Result<File, SegmentError> {
    let created = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .mode(0o666)
        .open(path);

    match created {
        Ok(file) => {
            if let Err(source) = file.set_len(size) {
                drop(file);
                let _ = fs::remove_file(path);
                return Err(SegmentError::Create {
                    path: path.to_path_buf(),
                    source,
                });
            }
            debug!(path = %path.display(), size, "created segment");
            Ok(file)
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|source| SegmentError::Create {
                    path: path.to_path_buf(),
                    source,
                })?;
            let current = file_len(&file);
            if current != size {
                file.set_len(size).map_err(|source| SegmentError::Create {
                    path: path.to_path_buf(),
                    source,
                })?;
                debug!(path = %path.display(), from = current, to = size, "resized existing segment");
            } else {
                debug!(path = %path.display(), size, "opened existing segment");
            }
            Ok(file)
        }
        Err(source) => Err(SegmentError::Create {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub(crate) fn open_existing(path: &Path) -> Result<File, SegmentError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| match source.kind() {
            ErrorKind::NotFound => SegmentError::NotFound {
                path: path.to_path_buf(),
            },
            _ => SegmentError::Open {
                path: path.to_path_buf(),
                source,
            },
        })
}

pub(crate) fn open_read_only(path: &Path) -> Result<File, SegmentError> {
    File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => SegmentError::NotFound {
            path: path.to_path_buf(),
        },
        _ => SegmentError::Open {
            path: path.to_path_buf(),
            source,
        },
    })
}

pub(crate) fn unlink(path: &Path) -> Result<(), SegmentError> {
    fs::remove_file(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => SegmentError::NotFound {
            path: path.to_path_buf(),
        },
        _ => SegmentError::Unlink {
            path: path.to_path_buf(),
            source,
        },
    })?;
    debug!(path = %path.display(), "unlinked segment");
    Ok(())
}

/// `stat` snapshot; never opens the file.
pub(crate) fn inspect(path: &Path, hugepage_size: impl FnOnce(&Path) -> u64) -> SegmentInfo {
    match fs::metadata(path) {
        Ok(meta) => SegmentInfo {
            path: path.to_path_buf(),
            exists: true,
            size: meta.len(),
            permissions: permission_string(meta.permissions().mode()),
            hugepage_size: hugepage_size(path),
            modified: meta.modified().ok(),
        },
        Err(_) => SegmentInfo::missing(path.to_path_buf()),
    }
}
