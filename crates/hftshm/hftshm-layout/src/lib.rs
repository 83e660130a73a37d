//! Binary contract of an SPMC shared-memory ring buffer.
//!
//! Pure and OS-independent: the header record, its codec and the size/offset
//! arithmetic every process must agree on byte for byte.

#[cfg(target_endian = "big")]
compile_error!("the ring buffer header format is little-endian only");

pub mod consts;
mod error;
pub mod geometry;
pub mod metadata;

pub use consts::*;
pub use error::LayoutError;
pub use geometry::{
    RingLayout, ceil_log2, data_segment_size, default_consumer_0_offset, default_producer_offset,
    header_segment_size, is_power_of_two, log2_of, raw_header_size,
};
pub use metadata::{
    Metadata, MetadataSnapshot, buffer_index, consumer_offset, consumer_section_size, event_offset,
    metadata_get, metadata_init, metadata_validate, producer_section_size,
};
