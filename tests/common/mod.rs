//! Simulated capture device driving the camera without hardware

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::ops::Deref;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use wgcam::v4l2::videodev::*;
use wgcam::{Device, FourCC};

pub const CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
pub const CAP_READWRITE: u32 = 0x0100_0000;
pub const CAP_STREAMING: u32 = 0x0400_0000;

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

/// Driver side state, shared with the test so it can inspect and tweak it
pub struct SimState {
    pub caps: u32,
    pub formats: Vec<FourCC>,
    pub format: v4l2_pix_format,
    /// Requested pixelformat that makes the driver apply another one
    pub substitutes: Vec<(FourCC, FourCC)>,
    pub busy: bool,
    /// Bytes of padding the driver appends to every line
    pub padding: u32,
    /// Buffers granted at most by REQBUFS
    pub max_buffers: u32,
    pub requested: u32,
    pub queued: VecDeque<u32>,
    pub streaming: bool,
    pub sequence: u32,
    /// Index the next DQBUF reports without taking a buffer off the queue
    pub dequeue_index: Option<u32>,
    pub maps: usize,
    pub reads: usize,
    /// errno the next read(2) fails with
    pub read_errno: Option<i32>,
    /// Bytes read(2) repeats to fill a frame
    pub pattern: Vec<u8>,
    /// Frame returned by read(2) once `scene_after` reads were served
    pub scene: Option<Vec<u8>>,
    pub scene_after: usize,
    pub fd: RawFd,
}

impl SimState {
    fn apply(&mut self, requested: v4l2_pix_format) -> v4l2_pix_format {
        let requested_fourcc = FourCC::from(requested.pixelformat);
        let fourcc = self
            .substitutes
            .iter()
            .find(|(from, _)| *from == requested_fourcc)
            .map_or(requested_fourcc, |(_, to)| *to);

        let width = requested.width.clamp(2, 1280) & !1;
        let height = requested.height.clamp(1, 720);
        let applied = v4l2_pix_format {
            width,
            height,
            pixelformat: fourcc.into(),
            field: V4L2_FIELD_NONE,
            bytesperline: width * 2 + self.padding,
            sizeimage: (width * 2 + self.padding) * height,
            ..Default::default()
        };
        self.format = applied;
        applied
    }
}

#[derive(Clone)]
pub struct SimDevice {
    state: Arc<Mutex<SimState>>,
    unmaps: Arc<AtomicUsize>,
}

impl SimDevice {
    /// A 16x8 YUYV camera supporting the given capability flags
    pub fn new(caps: u32) -> Self {
        let state = SimState {
            caps: caps | CAP_VIDEO_CAPTURE,
            formats: vec![FourCC::YUYV, FourCC::MJPG],
            format: v4l2_pix_format {
                width: 16,
                height: 8,
                pixelformat: FourCC::YUYV.into(),
                field: V4L2_FIELD_NONE,
                bytesperline: 32,
                sizeimage: 16 * 8 * 2,
                ..Default::default()
            },
            substitutes: Vec::new(),
            busy: false,
            padding: 0,
            max_buffers: 5,
            requested: 0,
            queued: VecDeque::new(),
            streaming: false,
            sequence: 0,
            dequeue_index: None,
            maps: 0,
            reads: 0,
            read_errno: None,
            pattern: vec![128],
            scene: None,
            scene_after: 0,
            fd: -1,
        };
        SimDevice {
            state: Arc::new(Mutex::new(state)),
            unmaps: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    pub fn unmaps(&self) -> usize {
        self.unmaps.load(Ordering::SeqCst)
    }
}

impl AsRawFd for SimDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.state().fd
    }
}

/// Buffer handed out by [`SimDevice::map`], counts its unmapping
pub struct SimMapping {
    data: Vec<u8>,
    unmaps: Arc<AtomicUsize>,
}

impl Deref for SimMapping {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for SimMapping {
    fn drop(&mut self) {
        self.unmaps.fetch_add(1, Ordering::SeqCst);
    }
}

impl Device for SimDevice {
    type Mapping = SimMapping;

    fn query_caps(&self) -> io::Result<v4l2_capability> {
        let mut caps = v4l2_capability::default();
        caps.driver[..3].copy_from_slice(b"sim");
        caps.card[..10].copy_from_slice(b"Sim camera");
        caps.version = 0x0006_0100;
        caps.capabilities = self.state().caps;
        Ok(caps)
    }

    fn enum_format(&self, desc: &mut v4l2_fmtdesc) -> io::Result<()> {
        let state = self.state();
        let fourcc = state
            .formats
            .get(desc.index as usize)
            .ok_or_else(|| errno(libc::EINVAL))?;
        desc.pixelformat = (*fourcc).into();
        desc.description[..4].copy_from_slice(&fourcc.repr);
        Ok(())
    }

    fn get_format(&self, fmt: &mut v4l2_format) -> io::Result<()> {
        fmt.fmt.pix = self.state().format;
        Ok(())
    }

    fn set_format(&self, fmt: &mut v4l2_format) -> io::Result<()> {
        let mut state = self.state();
        if state.busy {
            return Err(errno(libc::EBUSY));
        }
        fmt.fmt.pix = state.apply(fmt.pix());
        Ok(())
    }

    fn request_buffers(&self, req: &mut v4l2_requestbuffers) -> io::Result<()> {
        let mut state = self.state();
        if state.caps & CAP_STREAMING == 0 || req.memory != V4L2_MEMORY_MMAP {
            return Err(errno(libc::EINVAL));
        }
        if state.streaming {
            return Err(errno(libc::EBUSY));
        }
        req.count = req.count.min(state.max_buffers);
        state.requested = req.count;
        state.queued.clear();
        Ok(())
    }

    fn query_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()> {
        let state = self.state();
        if buf.index >= state.requested {
            return Err(errno(libc::EINVAL));
        }
        buf.length = state.format.sizeimage;
        buf.m.offset = buf.index * 0x1000;
        Ok(())
    }

    fn queue_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()> {
        let mut state = self.state();
        if buf.index >= state.requested || state.queued.contains(&buf.index) {
            return Err(errno(libc::EINVAL));
        }
        state.queued.push_back(buf.index);
        Ok(())
    }

    fn dequeue_buffer(&self, buf: &mut v4l2_buffer) -> io::Result<()> {
        let mut state = self.state();
        if !state.streaming {
            return Err(errno(libc::EINVAL));
        }
        let index = match state.dequeue_index.take() {
            Some(index) => index,
            None => state.queued.pop_front().ok_or_else(|| errno(libc::EAGAIN))?,
        };
        state.sequence += 1;
        buf.index = index;
        buf.bytesused = state.format.sizeimage;
        buf.sequence = state.sequence;
        buf.m.offset = index * 0x1000;
        Ok(())
    }

    fn stream_on(&self) -> io::Result<()> {
        self.state().streaming = true;
        Ok(())
    }

    fn stream_off(&self) -> io::Result<()> {
        let mut state = self.state();
        state.streaming = false;
        state.queued.clear();
        Ok(())
    }

    fn map(&self, buf: &v4l2_buffer) -> io::Result<SimMapping> {
        self.state().maps += 1;
        let fill = (buf.offset() / 0x1000) as u8 + 1;
        Ok(SimMapping {
            data: vec![fill; buf.length as usize],
            unmaps: Arc::clone(&self.unmaps),
        })
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.caps & CAP_READWRITE == 0 {
            return Err(errno(libc::EINVAL));
        }
        if let Some(code) = state.read_errno.take() {
            return Err(errno(code));
        }
        state.reads += 1;
        match &state.scene {
            Some(scene) if state.reads > state.scene_after => {
                let len = scene.len().min(buf.len());
                buf[..len].copy_from_slice(&scene[..len]);
                Ok(len)
            }
            _ => {
                for (dst, src) in buf.iter_mut().zip(state.pattern.iter().cycle()) {
                    *dst = *src;
                }
                Ok(buf.len())
            }
        }
    }

    fn poll(&self, _timeout: i32) -> io::Result<bool> {
        Ok(true)
    }
}

/// Both ends of a pipe, closed on drop
pub struct Pipe {
    pub read: RawFd,
    pub write: RawFd,
}

impl Pipe {
    pub fn new() -> Self {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        Pipe {
            read: fds[0],
            write: fds[1],
        }
    }

    pub fn signal(&self) {
        let byte = [1u8];
        assert_eq!(
            unsafe { libc::write(self.write, byte.as_ptr() as *const libc::c_void, 1) },
            1
        );
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read);
            libc::close(self.write);
        }
    }
}
