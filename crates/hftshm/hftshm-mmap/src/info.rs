use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Point-in-time filesystem snapshot of a segment.
///
/// Carries no ownership and is never used to decide anything about an
/// already-open handle; it exists for listing and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub size: u64,
    /// `ls -l` style, e.g. `rw-rw-r--`. Empty when the segment does not exist.
    pub permissions: String,
    /// Page size of the backing hugetlbfs mount, 0 when not on hugetlbfs.
    pub hugepage_size: u64,
    pub modified: Option<SystemTime>,
}

impl SegmentInfo {
    pub fn missing(path: PathBuf) -> Self {
        Self {
            path,
            exists: false,
            size: 0,
            permissions: String::new(),
            hugepage_size: 0,
            modified: None,
        }
    }

    /// RFC 3339 rendering of the modification time.
    pub fn last_modified(&self) -> Option<String> {
        let modified = self.modified?;
        OffsetDateTime::from(modified).format(&Rfc3339).ok()
    }
}

/// Renders the nine permission bits of `mode`.
pub fn permission_string(mode: u32) -> String {
    const BITS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    BITS.iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn permission_bits() {
        assert_eq!(permission_string(0o100644), "rw-r--r--");
        assert_eq!(permission_string(0o666), "rw-rw-rw-");
        assert_eq!(permission_string(0o750), "rwxr-x---");
        assert_eq!(permission_string(0), "---------");
    }

    #[test]
    fn modified_is_rfc3339() {
        let mut info = SegmentInfo::missing(PathBuf::from("/nowhere"));
        assert_eq!(info.last_modified(), None);
        info.modified = Some(UNIX_EPOCH + Duration::from_secs(86_400));
        assert_eq!(info.last_modified().as_deref(), Some("1970-01-02T00:00:00Z"));
    }
}
