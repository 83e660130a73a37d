use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::io;
use std::ops::{Deref, DerefMut};

/// A shared, read-write mapping of a segment file.
///
/// Regular-page mappings go through `memmap2`. Hugepage mappings of a named
/// file need `MAP_HUGETLB` on the file descriptor, which `memmap2` only
/// offers for anonymous maps, so those are made with `libc` directly.
pub struct Mapping {
    inner: Backing,
}

enum Backing {
    Pages(MmapMut),
    #[cfg(target_os = "linux")]
    Huge(huge::HugeMap),
}

impl Mapping {
    /// Maps `len` bytes of `file` with regular pages.
    pub(crate) fn pages(file: &File, len: usize) -> io::Result<Self> {
        // SAFETY: the segment is shared memory by contract; other processes
        // may write to it, which is why callers only get raw bytes.
        let mmap = unsafe { MmapOptions::new().len(len).map_mut(file)? };
        Ok(Self {
            inner: Backing::Pages(mmap),
        })
    }

    /// Maps `len` bytes of `file` with `MAP_HUGETLB` and the page size
    /// encoded from `hugepage_size`.
    #[cfg(target_os = "linux")]
    pub(crate) fn huge(file: &File, len: usize, hugepage_size: u64) -> io::Result<Self> {
        Ok(Self {
            inner: Backing::Huge(huge::HugeMap::new(file, len, hugepage_size)?),
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        match &self.inner {
            Backing::Pages(m) => m.as_ptr(),
            #[cfg(target_os = "linux")]
            Backing::Huge(m) => m.ptr.as_ptr(),
        }
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        match &mut self.inner {
            Backing::Pages(m) => m.as_mut_ptr(),
            #[cfg(target_os = "linux")]
            Backing::Huge(m) => m.ptr.as_ptr(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.inner {
            Backing::Pages(m) => m.len(),
            #[cfg(target_os = "linux")]
            Backing::Huge(m) => m.len,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Deref for Mapping {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: the pointer covers `len` mapped bytes for as long as `self` lives.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len()) }
    }
}

impl DerefMut for Mapping {
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        // SAFETY: as above, and `&mut self` gives exclusive access in this process.
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), len) }
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapping")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(target_os = "linux")]
mod huge {
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;
    use std::ptr::{self, NonNull};

    /// `MAP_HUGE_SHIFT` from `<linux/mman.h>`: the hugepage size log2 is
    /// encoded in the mmap flags starting at this bit.
    const MAP_HUGE_SHIFT: libc::c_int = 26;

    pub(super) struct HugeMap {
        pub(super) ptr: NonNull<u8>,
        pub(super) len: usize,
    }

    // SAFETY: the mapping is plain shared memory with no thread affinity,
    // the same reasoning `memmap2::MmapMut` relies on.
    unsafe impl Send for HugeMap {}
    unsafe impl Sync for HugeMap {}

    impl HugeMap {
        pub(super) fn new(file: &File, len: usize, hugepage_size: u64) -> io::Result<Self> {
            let mut flags = libc::MAP_SHARED | libc::MAP_HUGETLB;
            if hugepage_size.is_power_of_two() {
                flags |= (hugepage_size.trailing_zeros() as libc::c_int) << MAP_HUGE_SHIFT;
            }

            // SAFETY: a fresh mapping chosen by the kernel; the result is
            // checked before use.
            let addr = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    flags,
                    file.as_raw_fd(),
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }
            let ptr = NonNull::new(addr as *mut u8)
                .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;
            Ok(Self { ptr, len })
        }
    }

    impl Drop for HugeMap {
        fn drop(&mut self) {
            // SAFETY: ptr/len describe a mapping created in `new` and not yet unmapped.
            unsafe {
                libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
            }
        }
    }
}
