use crate::error::RingError;
use crate::sections::{
    check_data_len, check_header_len, consumer_range, producer_range, section, section_mut,
};
use hftshm_layout::{Metadata, metadata_get, metadata_validate};
use hftshm_mmap::{SegmentError, SegmentHandle, SegmentProvider, data_name, header_name};
use std::ptr::NonNull;
use tracing::info;

/// A reader attached to an existing ring buffer.
///
/// Never writes the metadata record. It may write its own consumer section,
/// which is where a dequeue algorithm keeps its cursor.
pub struct Consumer {
    name: String,
    header: SegmentHandle,
    data: SegmentHandle,
    /// Base of `header`'s mapping; the record and the sections hang off it.
    base: NonNull<u8>,
    meta: NonNull<Metadata>,
}

impl Consumer {
    /// Opens both segments of `name` and validates the header.
    ///
    /// # Errors
    /// - `RingError::Segment` with `SegmentError::NotFound` if the ring does not exist
    /// - `RingError::NotRingBuffer` if magic or version do not match
    /// - `RingError::Layout` if the metadata breaks its invariants
    /// - `RingError::HeaderTooSmall` / `RingError::DataTooSmall` if a segment
    ///   is shorter than the metadata says
    pub fn attach<P: SegmentProvider>(provider: &P, name: &str) -> Result<Self, RingError> {
        let mut header = provider.attach_segment(&header_name(name))?;
        let bytes = header.as_slice()?;
        if !metadata_validate(bytes) {
            return Err(RingError::NotRingBuffer {
                path: header.path().to_path_buf(),
            });
        }
        let meta = metadata_get(bytes)?;
        meta.check()?;
        check_header_len(name, meta, bytes.len())?;

        let data = provider.attach_segment(&data_name(name))?;
        check_data_len(name, meta, data.len())?;

        info!(
            ring = name,
            buffer_size = meta.buffer_size,
            event_size = meta.event_size,
            producer_pid = meta.producer_pid(),
            "consumer attached"
        );

        let base = NonNull::new(header.as_mut_ptr()).ok_or(SegmentError::InvalidHandle)?;
        let meta = base.cast::<Metadata>();

        Ok(Self {
            name: name.to_string(),
            header,
            data,
            base,
            meta,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn metadata(&self) -> &Metadata {
        // SAFETY: validated in `attach`; the header mapping lives as long as `self`.
        unsafe { self.meta.as_ref() }
    }

    /// Pid of the attached producer, 0 when none. May be stale.
    pub fn producer_pid(&self) -> u32 {
        self.metadata().producer_pid()
    }

    pub fn producer_section(&self) -> &[u8] {
        let range = producer_range(self.metadata());
        // SAFETY: in bounds (checked in `attach`) and never borrowed mutably here.
        unsafe { section(self.base, range) }
    }

    pub fn consumer_section(&self, n: u8) -> Result<&[u8], RingError> {
        let range = consumer_range(self.metadata(), n)?;
        // SAFETY: in bounds; mutable borrows need `&mut self`.
        Ok(unsafe { section(self.base, range) })
    }

    pub fn consumer_section_mut(&mut self, n: u8) -> Result<&mut [u8], RingError> {
        let range = consumer_range(self.metadata(), n)?;
        // SAFETY: in bounds, disjoint from the record, exclusive through `&mut self`.
        Ok(unsafe { section_mut(self.base, range) })
    }

    pub fn data(&self) -> Result<&[u8], RingError> {
        Ok(self.data.as_slice()?)
    }

    pub fn header_segment(&self) -> &SegmentHandle {
        &self.header
    }

    pub fn data_segment(&self) -> &SegmentHandle {
        &self.data
    }
}
