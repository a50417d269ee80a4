use std::{
    io,
    ops::{Deref, DerefMut},
    os::raw::c_void,
    ptr::NonNull,
    slice,
};

use crate::v4l2;

/// Memory-mapped region
///
/// The backing memory is a kernel capture buffer mapped into the process. The driver writes
/// frames into it between QBUF and DQBUF, so it must only be read while dequeued.
///
/// The destructor automatically unmaps the memory, which makes every early return during
/// ring setup release whatever was already mapped.
pub struct Mmap {
    ptr: NonNull<u8>,
    len: usize,
}

// The mapping is plain memory owned by this value alone.
unsafe impl Send for Mmap {}

impl Mmap {
    /// Maps `len` bytes of the device behind `fd` at `offset`
    pub fn new(fd: std::os::raw::c_int, offset: u32, len: usize) -> io::Result<Self> {
        let ptr = unsafe { v4l2::mmap(len, fd, offset as libc::off_t)? };
        let ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned NULL"))?;
        Ok(Mmap { ptr, len })
    }
}

impl Drop for Mmap {
    fn drop(&mut self) {
        unsafe {
            // ignore errors
            let _ = v4l2::munmap(self.ptr.as_ptr() as *mut c_void, self.len);
        }
    }
}

impl Deref for Mmap {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for Mmap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}
