use crate::error::RingError;
use hftshm_layout::{MetadataSnapshot, metadata_get, metadata_validate};
use hftshm_mmap::{SegmentError, SegmentInfo, SegmentProvider, data_name, header_name};
use serde::Serialize;
use tracing::{info, warn};

/// Removes both segments of `name` from the namespace.
///
/// Processes that still have the ring mapped keep using it until they drop
/// their handles. Both unlinks are always attempted. A half-removed ring
/// (only one segment left) counts as removed once the survivor is gone;
/// `NotFound` is returned only when neither segment existed.
pub fn remove<P: SegmentProvider>(provider: &P, name: &str) -> Result<(), RingError> {
    let results = [
        provider.unlink(&header_name(name)),
        provider.unlink(&data_name(name)),
    ];

    let mut removed = false;
    let mut missing = None;
    for result in results {
        match result {
            Ok(()) => removed = true,
            Err(err @ SegmentError::NotFound { .. }) => {
                missing.get_or_insert(err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    match missing {
        Some(err) if !removed => return Err(err.into()),
        Some(SegmentError::NotFound { path }) => {
            warn!(ring = name, missing = %path.display(), "ring was only partially present");
        }
        _ => {}
    }
    info!(ring = name, "ring removed");
    Ok(())
}

/// Diagnostics for one ring: both filesystem snapshots plus the header
/// contents when they form valid metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RingReport {
    pub name: String,
    pub header: SegmentInfo,
    pub data: SegmentInfo,
    pub metadata: Option<MetadataSnapshot>,
}

/// Builds a [`RingReport`]. Never creates or modifies anything, and only
/// needs read permission on the segments.
pub fn describe<P: SegmentProvider>(provider: &P, name: &str) -> RingReport {
    let header = provider.inspect(&header_name(name));
    let data = provider.inspect(&data_name(name));

    let metadata = if header.exists {
        provider
            .peek_segment(&header_name(name))
            .ok()
            .and_then(|view| {
                let bytes = view.as_slice();
                if !metadata_validate(bytes) {
                    return None;
                }
                metadata_get(bytes).ok().map(|meta| meta.snapshot())
            })
    } else {
        None
    };

    RingReport {
        name: name.to_string(),
        header,
        data,
        metadata,
    }
}
