//! Kernel ABI structures from `linux/videodev2.h`.
//!
//! Only the subset needed for single-planar video capture is carried here. The layouts must
//! match the kernel bit for bit, the tests at the bottom pin the sizes for 64-bit Linux.
#![allow(non_camel_case_types)]

use std::{fmt, mem};

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_MEMORY_MMAP: u32 = 1;
pub const V4L2_FIELD_ANY: u32 = 0;
pub const V4L2_FIELD_NONE: u32 = 1;

macro_rules! zeroed_default {
    ($($t:ty),*) => {
        $(
            impl Default for $t {
                fn default() -> Self {
                    // all of these are plain old data, the all-zero pattern is valid
                    unsafe { mem::zeroed() }
                }
            }
        )*
    };
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union v4l2_format_fmt {
    pub pix: v4l2_pix_format,
    pub raw_data: [u8; 200],
    // v4l2_window carries pointers, which forces 8 byte alignment on the kernel side
    _align: [u64; 25],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_format {
    pub type_: u32,
    pub fmt: v4l2_format_fmt,
}

impl v4l2_format {
    /// Returns a capture format request carrying `pix`
    pub fn capture(pix: v4l2_pix_format) -> Self {
        let mut fmt = v4l2_format {
            type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
            ..Default::default()
        };
        fmt.fmt.pix = pix;
        fmt
    }

    /// Single-planar pixel format member of the union
    pub fn pix(&self) -> v4l2_pix_format {
        // every bit pattern is a valid v4l2_pix_format
        unsafe { self.fmt.pix }
    }
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_fmtdesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub mbus_code: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union v4l2_buffer_m {
    pub offset: u32,
    pub userptr: std::os::raw::c_ulong,
    pub fd: i32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: libc::timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m: v4l2_buffer_m,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

impl v4l2_buffer {
    /// Returns a zeroed mmap capture descriptor for buffer `index`
    pub fn capture(index: u32) -> Self {
        v4l2_buffer {
            index,
            type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: V4L2_MEMORY_MMAP,
            ..Default::default()
        }
    }

    /// Offset to pass to mmap() for this buffer
    pub fn offset(&self) -> u32 {
        // only the mmap member is ever written by us or the driver
        unsafe { self.m.offset }
    }
}

impl fmt::Debug for v4l2_buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("v4l2_buffer")
            .field("index", &self.index)
            .field("type", &self.type_)
            .field("bytesused", &self.bytesused)
            .field("flags", &self.flags)
            .field("sequence", &self.sequence)
            .field("offset", &self.offset())
            .field("length", &self.length)
            .finish()
    }
}

zeroed_default!(
    v4l2_capability,
    v4l2_pix_format,
    v4l2_format,
    v4l2_fmtdesc,
    v4l2_requestbuffers,
    v4l2_timecode,
    v4l2_buffer
);

#[cfg(all(test, target_os = "linux", target_pointer_width = "64"))]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_kernel_abi() {
        assert_eq!(mem::size_of::<v4l2_capability>(), 104);
        assert_eq!(mem::size_of::<v4l2_pix_format>(), 48);
        assert_eq!(mem::size_of::<v4l2_format>(), 208);
        assert_eq!(mem::size_of::<v4l2_fmtdesc>(), 64);
        assert_eq!(mem::size_of::<v4l2_requestbuffers>(), 20);
        assert_eq!(mem::size_of::<v4l2_timecode>(), 16);
        assert_eq!(mem::size_of::<v4l2_buffer>(), 88);
    }

    #[test]
    fn format_union_round_trips_pix() {
        let pix = v4l2_pix_format {
            width: 640,
            height: 480,
            pixelformat: u32::from_le_bytes(*b"YUYV"),
            ..Default::default()
        };
        let fmt = v4l2_format::capture(pix);
        assert_eq!(fmt.type_, V4L2_BUF_TYPE_VIDEO_CAPTURE);
        assert_eq!(fmt.pix(), pix);
    }
}
