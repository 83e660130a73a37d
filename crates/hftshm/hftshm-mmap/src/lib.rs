//! Named shared-memory segments: create, open, map, inspect, unlink.
//!
//! This is the only crate in the workspace that talks to the operating
//! system. A segment named `x` lives at `<base>/x`; ring buffers use two of
//! them, `<ring>.hdr` and `<ring>.dat` (see [`header_name`] / [`data_name`]).

#[cfg(not(unix))]
compile_error!("hftshm-mmap supports unix targets only");

mod error;
mod handle;
mod info;
#[cfg(target_os = "linux")]
mod linux;
mod mapping;
mod posix;
mod provider;
#[cfg(not(target_os = "linux"))]
mod tmp;
mod view;

pub use error::SegmentError;
pub use handle::SegmentHandle;
pub use info::{SegmentInfo, permission_string};
#[cfg(target_os = "linux")]
pub use linux::LinuxShm;
pub use mapping::Mapping;
pub use provider::{
    DATA_SUFFIX, HEADER_SUFFIX, SegmentProvider, data_name, header_name, validate_name,
};
#[cfg(not(target_os = "linux"))]
pub use tmp::TmpShm;
pub use view::SegmentView;

/// Provider for the platform this crate was built for.
#[cfg(target_os = "linux")]
pub type DefaultProvider = LinuxShm;

#[cfg(not(target_os = "linux"))]
pub type DefaultProvider = TmpShm;
