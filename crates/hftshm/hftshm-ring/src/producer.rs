//! Producer side of the provisioning protocol.
//!
//! # Protocol
//!
//! 1. Compute the header and data sizes from the requested geometry.
//! 2. Open the `.hdr` segment at its current size. If it holds valid
//!    metadata, check it against the request and refuse on any disagreement
//!    before anything is resized.
//! 3. Otherwise (absent, empty or foreign) create-or-open it at the requested
//!    size; it gets initialized once the data segment is in place.
//! 4. Create-or-open and map the `.dat` segment.
//! 5. Record this process's pid in `producer_pid`.
//!
//! Nothing here is locked. Only one designated process should ever run this
//! for a given ring name; see [`Metadata::set_producer_pid`].

use crate::error::RingError;
use crate::params::RingParams;
use crate::sections::{
    check_data_len, check_header_len, consumer_range, producer_range, section, section_mut,
};
use hftshm_layout::{Metadata, RingLayout, metadata_get, metadata_init, metadata_validate};
use hftshm_mmap::{SegmentError, SegmentHandle, SegmentProvider, data_name, header_name};
use std::ptr::NonNull;
use std::slice;
use tracing::{info, warn};

/// The single writer of a ring buffer.
///
/// Holds both segments mapped for as long as it lives and clears its pid from
/// the header when dropped (unless another producer has taken over since).
pub struct Producer {
    name: String,
    header: SegmentHandle,
    data: SegmentHandle,
    /// Base of `header`'s mapping, which stays put while `header` is alive.
    /// The metadata record and every section are derived from it.
    base: NonNull<u8>,
    meta: NonNull<Metadata>,
    pid: u32,
    attached: bool,
}

impl Producer {
    /// Creates the ring (or reuses a compatible one) and attaches as producer.
    ///
    /// # Errors
    /// - `RingError::Layout`: the requested geometry is invalid, or the existing
    ///   header carries valid magic but breaks the metadata invariants
    /// - `RingError::FormatMismatch`: an existing ring was created with a
    ///   different geometry
    /// - `RingError::Segment`: creating or mapping a segment failed
    pub fn create<P: SegmentProvider>(provider: &P, params: &RingParams) -> Result<Self, RingError> {
        let layout = params.layout()?;
        let (mut header, existing) = open_header(provider, &params.name, &layout)?;

        let data =
            provider.create_segment(&data_name(&params.name), layout.data_size, params.hugepage_size)?;

        let header_len = header.len();
        let base = NonNull::new(header.as_mut_ptr()).ok_or(SegmentError::InvalidHandle)?;
        if existing {
            info!(ring = %params.name, "reusing existing ring metadata");
        } else {
            // SAFETY: `base` spans `header_len` mapped bytes and nothing else
            // in this process borrows them yet.
            let bytes = unsafe { slice::from_raw_parts_mut(base.as_ptr(), header_len) };
            metadata_init(
                bytes,
                layout.max_consumers,
                layout.event_size,
                layout.buffer_size,
                layout.producer_offset,
                layout.consumer_0_offset,
                layout.header_size,
            )?;
            info!(
                ring = %params.name,
                max_consumers = layout.max_consumers,
                event_size = layout.event_size,
                buffer_size = layout.buffer_size,
                header_size = layout.header_size,
                data_size = layout.data_size,
                "initialized ring metadata"
            );
        }

        let meta = base.cast::<Metadata>();
        // SAFETY: the record at `base` was just written or validated, and its
        // size and alignment were checked on the way.
        let record = unsafe { meta.as_ref() };
        check_header_len(&params.name, record, header_len)?;
        check_data_len(&params.name, record, data.len())?;

        let pid = std::process::id();
        let previous = record.set_producer_pid(pid);
        if previous != 0 && previous != pid {
            warn!(ring = %params.name, previous, pid, "replacing recorded producer");
        }
        info!(ring = %params.name, pid, "producer attached");

        Ok(Self {
            name: params.name.clone(),
            header,
            data,
            base,
            meta,
            pid,
            attached: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn metadata(&self) -> &Metadata {
        // SAFETY: `meta` was validated at creation and points into the header
        // mapping, which lives as long as `self`.
        unsafe { self.meta.as_ref() }
    }

    pub fn producer_section_mut(&mut self) -> &mut [u8] {
        let range = producer_range(self.metadata());
        // SAFETY: in bounds (checked in `create`), disjoint from the record,
        // and `&mut self` rules out any other borrow of it.
        unsafe { section_mut(self.base, range) }
    }

    pub fn consumer_section(&self, n: u8) -> Result<&[u8], RingError> {
        let range = consumer_range(self.metadata(), n)?;
        // SAFETY: in bounds (checked in `create`); mutable section borrows
        // need `&mut self`.
        Ok(unsafe { section(self.base, range) })
    }

    pub fn data_mut(&mut self) -> Result<&mut [u8], RingError> {
        Ok(self.data.as_mut_slice()?)
    }

    pub fn header_segment(&self) -> &SegmentHandle {
        &self.header
    }

    pub fn data_segment(&self) -> &SegmentHandle {
        &self.data
    }

    /// Clears `producer_pid` and releases both segments.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if self.metadata().clear_producer_pid(self.pid) {
            info!(ring = %self.name, pid = self.pid, "producer detached");
        } else {
            warn!(ring = %self.name, pid = self.pid, "producer pid was replaced while attached");
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens the header of an existing ring without resizing it.
///
/// Only when no valid ring lives under `name` is the segment created or
/// resized to the requested size. Returns whether valid metadata was found.
fn open_header<P: SegmentProvider>(
    provider: &P,
    name: &str,
    layout: &RingLayout,
) -> Result<(SegmentHandle, bool), RingError> {
    let segment = header_name(name);
    match provider.attach_segment(&segment) {
        Ok(header) => {
            let bytes = header.as_slice()?;
            if metadata_validate(bytes) {
                let meta = metadata_get(bytes)?;
                meta.check()?;
                ensure_matches(name, meta, layout)?;
                check_header_len(name, meta, bytes.len())?;
                return Ok((header, true));
            }
        }
        Err(SegmentError::NotFound { .. } | SegmentError::InvalidHandle) => {}
        Err(err) => return Err(err.into()),
    }
    let header = provider.create_segment(&segment, layout.header_size as u64, 0)?;
    Ok((header, false))
}

fn ensure_matches(ring: &str, meta: &Metadata, layout: &RingLayout) -> Result<(), RingError> {
    let fields = [
        ("max_consumers", layout.max_consumers as u64, meta.max_consumers as u64),
        ("event_size", layout.event_size as u64, meta.event_size as u64),
        ("buffer_size", layout.buffer_size as u64, meta.buffer_size as u64),
        ("header_size", layout.header_size as u64, meta.header_size as u64),
    ];
    for (field, expected, found) in fields {
        if expected != found {
            return Err(RingError::FormatMismatch {
                ring: ring.to_string(),
                field,
                expected,
                found,
            });
        }
    }
    Ok(())
}
