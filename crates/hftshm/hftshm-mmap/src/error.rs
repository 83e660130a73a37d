use std::io;
use std::path::PathBuf;

/// OS-level failures and handle misuse from the segment provider.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("invalid segment name '{0}'")]
    InvalidName(String),

    #[error("failed to create directory '{}'", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create segment '{}'", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open segment '{}'", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("segment '{}' not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to map {size} bytes")]
    Map {
        size: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to unlink '{}'", .path.display())]
    Unlink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to list '{}'", .path.display())]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("operation needs an open, mapped, non-empty segment")]
    InvalidHandle,
}
