//! Capture strategies
//!
//! A camera binds exactly one strategy at open time: the mmap'd streaming ring when the
//! device supports it, blocking read(2) otherwise. Both expose the same [`Strategy`]
//! contract, the facade never branches on which one is active.

use std::fmt;
use std::str::FromStr;

use crate::capability::DeviceCapabilities;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::frame::Frame;

pub mod readwrite;
pub use readwrite::ReadWriteCapture;

pub mod streaming;
pub use streaming::StreamingCapture;

/// Working mode of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No preference, streaming is picked when available
    #[default]
    Unset,
    /// mmap'd buffer ring
    Streaming,
    /// Blocking read(2)
    ReadWrite,
    /// No strategy left to try
    Unknown,
}

impl Mode {
    /// Mode to try after this one was rejected by the device
    pub fn fallback(self) -> Mode {
        match self {
            Mode::Unset | Mode::Streaming => Mode::ReadWrite,
            Mode::ReadWrite | Mode::Unknown => Mode::Unknown,
        }
    }

    /// Resolves a caller hint against what the device supports
    ///
    /// A hinted mode is honoured if supported, otherwise streaming is preferred over
    /// read/write.
    pub fn select(hint: Mode, caps: &DeviceCapabilities) -> Result<Mode> {
        match hint {
            Mode::Streaming if caps.streaming() => Ok(Mode::Streaming),
            Mode::ReadWrite if caps.read_write() => Ok(Mode::ReadWrite),
            _ if caps.streaming() => Ok(Mode::Streaming),
            _ if caps.read_write() => Ok(Mode::ReadWrite),
            _ => Err(Error::NotSupported(
                "neither streaming nor read/write i/o".to_string(),
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Unset => write!(f, "unset"),
            Mode::Streaming => write!(f, "streaming"),
            Mode::ReadWrite => write!(f, "readwrite"),
            Mode::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "unset" | "auto" => Ok(Mode::Unset),
            "streaming" | "mmap" => Ok(Mode::Streaming),
            "readwrite" | "read" => Ok(Mode::ReadWrite),
            other => Err(Error::Config(format!("unknown capture mode '{}'", other))),
        }
    }
}

/// Frame acquisition contract shared by both capture strategies
pub trait Strategy<D: Device> {
    /// Checks the device capabilities this strategy depends on
    fn open(&mut self, caps: &DeviceCapabilities) -> Result<()>;

    /// Prepares buffers and starts the device
    fn start(&mut self, dev: &D, format: &Format) -> Result<()>;

    /// Stops the device and releases everything acquired in start
    fn stop(&mut self, dev: &D) -> Result<()>;

    /// Fills `frame` with the next captured image, blocking until one is available
    fn read(&mut self, dev: &D, format: &Format, frame: &mut Frame) -> Result<()>;

    /// Hands the frame bytes back for reuse
    fn mark_empty(&mut self, dev: &D, frame: &mut Frame) -> Result<()>;

    /// Releases frame-local resources
    fn cleanup_frame(&mut self, frame: &mut Frame);

    /// Bytes of a full frame
    fn frame_data<'a>(&'a self, frame: &'a Frame) -> Result<&'a [u8]>;

    fn close(&mut self) {}
}

/// The strategy bound to an open camera
pub enum Capture<D: Device> {
    Streaming(StreamingCapture<D>),
    ReadWrite(ReadWriteCapture),
}

impl<D: Device> Capture<D> {
    /// Returns the strategy implementing `mode`
    pub fn for_mode(mode: Mode) -> Result<Self> {
        match mode {
            Mode::Streaming => Ok(Capture::Streaming(StreamingCapture::new())),
            Mode::ReadWrite => Ok(Capture::ReadWrite(ReadWriteCapture::new())),
            Mode::Unset | Mode::Unknown => Err(Error::NotSupported(format!(
                "no capture strategy for mode {}",
                mode
            ))),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Capture::Streaming(_) => Mode::Streaming,
            Capture::ReadWrite(_) => Mode::ReadWrite,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $call:expr) => {
        match $self {
            Capture::Streaming($inner) => $call,
            Capture::ReadWrite($inner) => $call,
        }
    };
}

impl<D: Device> Strategy<D> for Capture<D> {
    fn open(&mut self, caps: &DeviceCapabilities) -> Result<()> {
        delegate!(self, s => Strategy::<D>::open(s, caps))
    }

    fn start(&mut self, dev: &D, format: &Format) -> Result<()> {
        delegate!(self, s => s.start(dev, format))
    }

    fn stop(&mut self, dev: &D) -> Result<()> {
        delegate!(self, s => s.stop(dev))
    }

    fn read(&mut self, dev: &D, format: &Format, frame: &mut Frame) -> Result<()> {
        delegate!(self, s => s.read(dev, format, frame))
    }

    fn mark_empty(&mut self, dev: &D, frame: &mut Frame) -> Result<()> {
        delegate!(self, s => s.mark_empty(dev, frame))
    }

    fn cleanup_frame(&mut self, frame: &mut Frame) {
        delegate!(self, s => Strategy::<D>::cleanup_frame(s, frame))
    }

    fn frame_data<'a>(&'a self, frame: &'a Frame) -> Result<&'a [u8]> {
        delegate!(self, s => Strategy::<D>::frame_data(s, frame))
    }

    fn close(&mut self) {
        delegate!(self, s => Strategy::<D>::close(s))
    }
}
