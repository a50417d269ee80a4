use std::ops::Deref;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::{fs, io};

use crate::memory::Mmap;
use crate::v4l2;
use crate::v4l2::videodev::*;

/// Poll events signalling a frame is ready to be dequeued or read
pub const POLL_READY: i16 = libc::POLLIN | libc::POLLPRI;

/// The ioctl contract a capture device has to honour
///
/// Every method maps onto exactly one syscall. The argument structures are passed through
/// unchanged, so implementations see the same in/out semantics as the kernel driver.
/// [`Handle`] is the real thing, tests plug in simulated devices.
pub trait Device: AsRawFd {
    /// Memory returned by [`Device::map`]
    type Mapping: Deref<Target = [u8]>;

    /// VIDIOC_QUERYCAP
    fn query_caps(&self) -> io::Result<v4l2_capability>;

    /// VIDIOC_ENUM_FMT, `desc.index` selects the entry
    fn enum_format(&self, desc: &mut v4l2_fmtdesc) -> io::Result<()>;

    /// VIDIOC_G_FMT
    fn get_format(&self, fmt: &mut v4l2_format) -> io::Result<()>;

    /// VIDIOC_S_FMT, the driver writes back what it actually applied
    fn set_format(&self, fmt: &mut v4l2_format) -> io::Result<()>;

    /// VIDIOC_REQBUFS, `req.count` is updated to the granted number
    fn request_buffers(&self, req: &mut v4l2_requestbuffers) -> io::Result<()>;

    /// VIDIOC_QUERYBUF
    fn query_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()>;

    /// VIDIOC_QBUF
    fn queue_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()>;

    /// VIDIOC_DQBUF, blocks until a filled buffer is available
    fn dequeue_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()>;

    /// VIDIOC_STREAMON for video capture
    fn stream_on(&self) -> io::Result<()>;

    /// VIDIOC_STREAMOFF for video capture
    fn stream_off(&self) -> io::Result<()>;

    /// Maps the buffer previously described by VIDIOC_QUERYBUF
    fn map(&self, buf: &v4l2_buffer) -> io::Result<Self::Mapping>;

    /// Blocking read(2) of one frame
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Waits until a frame is ready, returns false on timeout
    ///
    /// A negative `timeout` in milliseconds waits forever.
    fn poll(&self, timeout: i32) -> io::Result<bool> {
        let mut fds = [libc::pollfd {
            fd: self.as_raw_fd(),
            events: POLL_READY,
            revents: 0,
        }];
        Ok(v4l2::poll(&mut fds, timeout)? > 0)
    }
}

/// Whether `path` names a character device
pub fn is_char_device<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    Ok(fs::metadata(path)?.file_type().is_char_device())
}

/// Open video4linux device node
///
/// The descriptor is closed when the handle is dropped.
#[derive(Debug)]
pub struct Handle {
    fd: std::os::raw::c_int,
}

impl Handle {
    /// Opens the device node at `path` read-write
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wgcam::device::Handle;
    /// let handle = Handle::open("/dev/video0");
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let fd = v4l2::open(path, libc::O_RDWR)?;
        Ok(Handle { fd })
    }

    /// Returns the raw fd of the device
    pub fn fd(&self) -> std::os::raw::c_int {
        self.fd
    }

    fn ioctl<T>(&self, request: v4l2::vidioc::_IOC_TYPE, arg: &mut T) -> io::Result<()> {
        unsafe {
            v4l2::ioctl_restart(
                self.fd,
                request,
                arg as *mut T as *mut std::os::raw::c_void,
            )
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        // nothing sensible left to do if close fails
        let _ = v4l2::close(self.fd);
    }
}

impl AsRawFd for Handle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Device for Handle {
    type Mapping = Mmap;

    fn query_caps(&self) -> io::Result<v4l2_capability> {
        let mut caps = v4l2_capability::default();
        self.ioctl(v4l2::vidioc::VIDIOC_QUERYCAP, &mut caps)?;
        Ok(caps)
    }

    fn enum_format(&self, desc: &mut v4l2_fmtdesc) -> io::Result<()> {
        self.ioctl(v4l2::vidioc::VIDIOC_ENUM_FMT, desc)
    }

    fn get_format(&self, fmt: &mut v4l2_format) -> io::Result<()> {
        self.ioctl(v4l2::vidioc::VIDIOC_G_FMT, fmt)
    }

    fn set_format(&self, fmt: &mut v4l2_format) -> io::Result<()> {
        self.ioctl(v4l2::vidioc::VIDIOC_S_FMT, fmt)
    }

    fn request_buffers(&self, req: &mut v4l2_requestbuffers) -> io::Result<()> {
        self.ioctl(v4l2::vidioc::VIDIOC_REQBUFS, req)
    }

    fn query_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()> {
        self.ioctl(v4l2::vidioc::VIDIOC_QUERYBUF, buf)
    }

    fn queue_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()> {
        self.ioctl(v4l2::vidioc::VIDIOC_QBUF, buf)
    }

    fn dequeue_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()> {
        self.ioctl(v4l2::vidioc::VIDIOC_DQBUF, buf)
    }

    fn stream_on(&self) -> io::Result<()> {
        let mut typ = V4L2_BUF_TYPE_VIDEO_CAPTURE as std::os::raw::c_int;
        self.ioctl(v4l2::vidioc::VIDIOC_STREAMON, &mut typ)
    }

    fn stream_off(&self) -> io::Result<()> {
        let mut typ = V4L2_BUF_TYPE_VIDEO_CAPTURE as std::os::raw::c_int;
        self.ioctl(v4l2::vidioc::VIDIOC_STREAMOFF, &mut typ)
    }

    fn map(&self, buf: &v4l2_buffer) -> io::Result<Mmap> {
        Mmap::new(self.fd, buf.offset(), buf.length as usize)
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        v4l2::read(self.fd, buf)
    }
}
