//! The camera facade
//!
//! A [`Camera`] hides which capture strategy is bound and which decompressor turns frames
//! into images. Callers drive it through a fixed sequence:
//!
//! ```text
//! init -> open -> start -> (read -> discard)* -> stop -> close
//! ```

use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use tracing::{debug, error, info, warn};

use crate::capability::Capabilities;
use crate::capture::{Capture, Mode, Strategy};
use crate::device::{self, Device, Handle, POLL_READY};
use crate::error::{Error, Result};
use crate::format::{Description, Format, FourCC};
use crate::frame::{Frame, FrameState};
use crate::image::Image;
use crate::selector::{self, Decompressor};
use crate::v4l2;
use crate::v4l2::videodev::{
    v4l2_fmtdesc, v4l2_format, v4l2_pix_format, V4L2_BUF_TYPE_VIDEO_CAPTURE,
};

/// Longest accepted device path in bytes
pub const DEV_PATH_MAX: usize = 64;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpenFlags : u32 {
        /// Negotiate a pixelformat with a decompressor while opening
        const ENABLE_DECOMPRESSOR = 0x01;
    }
}

/// Lifecycle of a [`Camera`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Closed,
    /// Open, capture not running
    Stopped,
    Streaming,
}

/// One video capture device
///
/// The camera owns the device handle, the negotiated format, the bound capture strategy
/// and the decompressor paired with the format. It is meant to be driven from a single
/// thread, there is no internal locking.
pub struct Camera<D: Device = Handle> {
    path: PathBuf,
    state: CameraState,
    device: Option<D>,
    caps: Option<Capabilities>,
    format: Option<Format>,
    capture: Option<Capture<D>>,
    decompressor: Option<&'static Decompressor>,
}

impl<D: Device> Camera<D> {
    /// Returns a closed camera for the device node at `path`
    ///
    /// # Example
    ///
    /// ```
    /// use wgcam::Camera;
    /// let cam: Camera = Camera::init("/dev/video0").unwrap();
    /// assert!(cam.capabilities().is_err());
    /// ```
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().len() >= DEV_PATH_MAX {
            return Err(Error::PathTooLong { max: DEV_PATH_MAX });
        }

        Ok(Camera {
            path: path.to_path_buf(),
            state: CameraState::Closed,
            device: None,
            caps: None,
            format: None,
            capture: None,
            decompressor: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Working mode of the bound capture strategy, `Unset` while closed
    pub fn mode(&self) -> Mode {
        self.capture.as_ref().map_or(Mode::Unset, Capture::mode)
    }

    fn device(&self) -> Result<&D> {
        self.device.as_ref().ok_or(Error::State("camera is not open"))
    }

    fn require(&self, state: CameraState, what: &'static str) -> Result<()> {
        if self.state != state {
            return Err(Error::State(what));
        }
        Ok(())
    }

    /// Binds an already opened device
    ///
    /// Queries the capabilities and the current format, selects a capture strategy and,
    /// with [`OpenFlags::ENABLE_DECOMPRESSOR`], negotiates a decodable pixelformat. A
    /// strategy rejecting the device makes way for the next [`Mode::fallback`]. On error
    /// the device is dropped and the camera stays closed.
    pub fn open_with(&mut self, dev: D, mode: Mode, flags: OpenFlags) -> Result<()> {
        self.require(CameraState::Closed, "camera is already open")?;

        let caps = Capabilities::from(
            dev.query_caps()
                .map_err(|e| Error::from_errno("VIDIOC_QUERYCAP", e))?,
        );
        debug!("{}: {} ({})", self.path.display(), caps.card, caps.driver);

        let mut raw = v4l2_format::capture(v4l2_pix_format::default());
        dev.get_format(&mut raw)
            .map_err(|e| Error::from_errno("VIDIOC_G_FMT", e))?;
        let mut format = Format::from(raw.pix());

        let mut mode = Mode::select(mode, &caps.capabilities)?;
        let capture = loop {
            let mut capture = Capture::for_mode(mode)?;
            match capture.open(&caps.capabilities) {
                Ok(()) => break capture,
                Err(e) if e.is_retryable() => {
                    warn!("{} capture rejected: {}", mode, e);
                    mode = mode.fallback();
                }
                Err(e) => return Err(e),
            }
        };

        let decompressor = if flags.contains(OpenFlags::ENABLE_DECOMPRESSOR) {
            let (negotiated, decompressor) = selector::select(&dev, &format).map_err(|e| {
                error!("format negotiation failed: {}", e);
                e
            })?;
            format = negotiated;
            Some(decompressor)
        } else {
            selector::get_decompressor(format.fourcc).ok()
        };

        info!(
            "opened {} in {} mode, {}x{} {}",
            self.path.display(),
            mode,
            format.width,
            format.height,
            format.fourcc
        );
        self.device = Some(dev);
        self.caps = Some(caps);
        self.format = Some(format);
        self.capture = Some(capture);
        self.decompressor = decompressor;
        self.state = CameraState::Stopped;
        Ok(())
    }

    /// Starts capturing
    pub fn start(&mut self) -> Result<()> {
        self.require(CameraState::Stopped, "camera is not stopped")?;

        let (dev, format, capture) = self.parts()?;
        capture.start(dev, format)?;
        self.state = CameraState::Streaming;
        info!("{}: capture started", self.path.display());
        Ok(())
    }

    /// Stops capturing, the device stays open
    ///
    /// Frames still holding ring buffers lose them. Discarding or freeing such a frame
    /// later never hands the stale buffer to the driver.
    pub fn stop(&mut self) -> Result<()> {
        self.require(CameraState::Streaming, "camera is not streaming")?;

        let (dev, _, capture) = self.parts()?;
        let res = capture.stop(dev);
        self.state = CameraState::Stopped;
        info!("{}: capture stopped", self.path.display());
        res
    }

    /// Releases the device, stopping capture first if needed
    pub fn close(&mut self) -> Result<()> {
        if self.state == CameraState::Closed {
            return Err(Error::State("camera is not open"));
        }
        if self.state == CameraState::Streaming {
            if let Err(e) = self.stop() {
                warn!("stop on close: {}", e);
            }
        }

        if let Some(mut capture) = self.capture.take() {
            capture.close();
        }
        self.device = None;
        self.caps = None;
        self.format = None;
        self.decompressor = None;
        self.state = CameraState::Closed;
        info!("closed {}", self.path.display());
        Ok(())
    }

    fn parts(&mut self) -> Result<(&D, &Format, &mut Capture<D>)> {
        match (&self.device, &self.format, &mut self.capture) {
            (Some(dev), Some(format), Some(capture)) => Ok((dev, format, capture)),
            _ => Err(Error::State("camera is not open")),
        }
    }

    /// Blocks until the next frame is captured into `frame`
    ///
    /// The frame has to be invalid or empty. [`Error::Io`] leaves the frame untouched and
    /// the read may be retried, every other error is final.
    pub fn read(&mut self, frame: &mut Frame) -> Result<()> {
        self.require(CameraState::Streaming, "camera is not streaming")?;
        if frame.state == FrameState::Full {
            return Err(Error::State("frame still holds data, discard it first"));
        }

        let (dev, format, capture) = self.parts()?;
        if !dev.poll(-1).map_err(|e| Error::from_errno("poll", e))? {
            return Err(Error::Timeout);
        }
        capture.read(dev, format, frame)?;
        frame.state = FrameState::Full;
        Ok(())
    }

    /// Hands the frame bytes back to the capture strategy
    ///
    /// Valid for full and empty frames. In streaming mode the buffer is re-queued to the
    /// driver and the frame bytes must not be touched afterwards.
    pub fn discard_frame(&mut self, frame: &mut Frame) -> Result<()> {
        match frame.state {
            FrameState::Full => {
                let streaming = self.state == CameraState::Streaming;
                let (dev, _, capture) = self.parts()?;
                if streaming {
                    capture.mark_empty(dev, frame)?;
                } else {
                    debug!("capture stopped, frame buffer not handed back");
                }
                frame.state = FrameState::Empty;
                Ok(())
            }
            FrameState::Empty => Ok(()),
            FrameState::Invalid => Err(Error::State("cannot discard an invalid frame")),
        }
    }

    /// Discards the frame and releases everything it holds
    ///
    /// Frames outliving [`Camera::close`] are simply reset.
    pub fn free_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if frame.state == FrameState::Invalid {
            return Err(Error::State("cannot free an invalid frame"));
        }
        if self.capture.is_none() {
            frame.reset();
            return Ok(());
        }
        self.discard_frame(frame)?;

        let (_, _, capture) = self.parts()?;
        capture.cleanup_frame(frame);
        frame.state = FrameState::Invalid;
        Ok(())
    }

    /// Raw bytes of a full frame, borrowed from the ring buffer or the frame itself
    pub fn frame_data<'a>(&'a self, frame: &'a Frame) -> Result<&'a [u8]> {
        if frame.state != FrameState::Full {
            return Err(Error::State("frame holds no data"));
        }
        self.capture
            .as_ref()
            .ok_or(Error::State("camera is not open"))?
            .frame_data(frame)
    }

    /// Decodes a full frame with the bound decompressor
    pub fn decompress(&self, frame: &Frame) -> Result<Image> {
        let decompressor = self.get_decompressor()?;
        let data = self.frame_data(frame)?;
        decompressor.decompress(data, frame.width, frame.height, frame.stride as usize)
    }

    /// Decompressor bound at open time or by a later selection
    pub fn get_decompressor(&self) -> Result<&'static Decompressor> {
        self.decompressor
            .ok_or(Error::State("no decompressor bound"))
    }

    /// Negotiates the first pixelformat from the decompressor table the device accepts
    pub fn select_decompressor(&mut self) -> Result<&'static Decompressor> {
        self.require(CameraState::Stopped, "camera is not stopped")?;

        let (dev, format, _) = self.parts()?;
        let (format, decompressor) = selector::select(dev, format)?;
        self.format = Some(format);
        self.decompressor = Some(decompressor);
        Ok(decompressor)
    }

    /// Negotiates the caller's pixelformat, which needs a registered decompressor
    pub fn select_user_decompressor(&mut self, fourcc: FourCC) -> Result<&'static Decompressor> {
        self.require(CameraState::Stopped, "camera is not stopped")?;

        let (dev, format, _) = self.parts()?;
        let (format, decompressor) = selector::select_user(dev, format, fourcc)?;
        self.format = Some(format);
        self.decompressor = Some(decompressor);
        Ok(decompressor)
    }

    /// Requests a new frame size
    ///
    /// Drivers round to the closest size they support, the applied format is kept. If the
    /// driver also switched the pixelformat, the decompressor is rebound to match.
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        self.require(CameraState::Stopped, "camera is not stopped")?;

        let (dev, format, _) = self.parts()?;
        let mut raw = v4l2_format::capture(format.with_resolution(width, height).into());
        dev.set_format(&mut raw)
            .map_err(|e| Error::from_errno("VIDIOC_S_FMT", e))?;
        let applied = Format::from(raw.pix());

        if (applied.width, applied.height) != (width, height) {
            warn!(
                "requested {}x{}, driver applied {}x{}",
                width, height, applied.width, applied.height
            );
        }
        if self.decompressor.map(Decompressor::fourcc) != Some(applied.fourcc) {
            self.decompressor = selector::get_decompressor(applied.fourcc).ok();
        }
        self.format = Some(applied);
        Ok(())
    }

    /// Negotiated frame size
    pub fn resolution(&self) -> Result<(u32, u32)> {
        let format = self.format()?;
        Ok((format.width, format.height))
    }

    /// Negotiated capture format
    pub fn format(&self) -> Result<&Format> {
        self.format.as_ref().ok_or(Error::State("camera is not open"))
    }

    /// Capabilities queried at open time
    pub fn capabilities(&self) -> Result<&Capabilities> {
        self.caps.as_ref().ok_or(Error::State("camera is not open"))
    }

    /// Pixelformats the device can capture in
    pub fn formats(&self) -> Result<Vec<Description>> {
        let dev = self.device()?;
        let mut formats = Vec::new();

        for index in 0.. {
            let mut desc = v4l2_fmtdesc {
                index,
                type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
                ..Default::default()
            };
            match dev.enum_format(&mut desc) {
                Ok(()) => formats.push(Description::from(desc)),
                // EINVAL marks the end of the list
                Err(e) if e.raw_os_error() == Some(libc::EINVAL) => break,
                Err(e) => return Err(Error::from_errno("VIDIOC_ENUM_FMT", e)),
            }
        }
        Ok(formats)
    }
}

impl Camera<Handle> {
    /// Opens the device node given to [`Camera::init`]
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wgcam::{Camera, Mode, OpenFlags};
    /// let mut cam: Camera = Camera::init("/dev/video0").unwrap();
    /// cam.open(Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR).unwrap();
    /// ```
    pub fn open(&mut self, mode: Mode, flags: OpenFlags) -> Result<()> {
        self.require(CameraState::Closed, "camera is already open")?;

        match device::is_char_device(&self.path) {
            Ok(true) => {}
            Ok(false) => return Err(Error::NotADevice(self.path.clone())),
            Err(e) => {
                debug!("stat {}: {}", self.path.display(), e);
                return Err(Error::NotADevice(self.path.clone()));
            }
        }

        let handle = Handle::open(&self.path).map_err(|e| {
            error!("cannot open {}: {}", self.path.display(), e);
            Error::Io(e)
        })?;
        self.open_with(handle, mode, flags)
    }
}

impl<D: Device> Drop for Camera<D> {
    fn drop(&mut self) {
        if self.state != CameraState::Closed {
            let _ = self.close();
        }
    }
}

/// Waits until at least one of `cameras` has a frame ready
///
/// Returns one readiness flag per camera. A negative `timeout_ms` waits forever, expiry
/// yields [`Error::Timeout`].
pub fn select_frame<D: Device>(cameras: &[&Camera<D>], timeout_ms: i32) -> Result<Vec<bool>> {
    let mut fds = cameras
        .iter()
        .map(|cam| {
            Ok(libc::pollfd {
                fd: cam.device()?.as_raw_fd(),
                events: POLL_READY,
                revents: 0,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    match v4l2::poll(&mut fds, timeout_ms) {
        Ok(0) => Err(Error::Timeout),
        Ok(_) => Ok(fds.iter().map(|fd| fd.revents & POLL_READY != 0).collect()),
        Err(e) => Err(Error::from_errno("poll", e)),
    }
}
