use tracing::{debug, error};

use crate::capability::DeviceCapabilities;
use crate::capture::Strategy;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::frame::{Frame, Storage};

/// Blocking read(2) capture for devices without streaming support
///
/// Each frame owns a heap buffer sized from the negotiated format. Discarding a frame keeps
/// the buffer around for the next read, freeing it releases the memory.
#[derive(Debug, Default)]
pub struct ReadWriteCapture;

impl ReadWriteCapture {
    pub fn new() -> Self {
        ReadWriteCapture
    }
}

impl<D: Device> Strategy<D> for ReadWriteCapture {
    fn open(&mut self, caps: &DeviceCapabilities) -> Result<()> {
        if !caps.video_capture() {
            return Err(Error::NotSupported("video capture".to_string()));
        }
        if !caps.read_write() {
            return Err(Error::NotSupported("read/write i/o".to_string()));
        }
        Ok(())
    }

    fn start(&mut self, _dev: &D, _format: &Format) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self, _dev: &D) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, dev: &D, format: &Format, frame: &mut Frame) -> Result<()> {
        let size = format.frame_size();
        if size == 0 {
            return Err(Error::Invalid("negotiated frame size is zero".to_string()));
        }

        let mut buf = match std::mem::replace(&mut frame.storage, Storage::None) {
            Storage::Heap(buf) => buf,
            _ => vec![0u8; size],
        };
        if buf.len() < size {
            buf.resize(size, 0);
        }

        match dev.read(&mut buf[..size]) {
            Ok(count) => {
                debug!("read {} of {} bytes", count, size);
                frame.storage = Storage::Heap(buf);
                frame.bytesused = count;
                frame.describe(format);
                Ok(())
            }
            Err(e) => {
                error!("read: {}", e);
                if e.raw_os_error() == Some(libc::EIO) {
                    // keep the buffer, the caller may retry
                    frame.storage = Storage::Heap(buf);
                    frame.bytesused = 0;
                    return Err(Error::Io(e));
                }
                frame.bytesused = 0;
                Err(Error::Failure(format!("read: {}", e)))
            }
        }
    }

    fn mark_empty(&mut self, _dev: &D, _frame: &mut Frame) -> Result<()> {
        Ok(())
    }

    fn cleanup_frame(&mut self, frame: &mut Frame) {
        frame.reset();
    }

    fn frame_data<'a>(&'a self, frame: &'a Frame) -> Result<&'a [u8]> {
        match &frame.storage {
            Storage::Heap(buf) => Ok(&buf[..frame.bytesused.min(buf.len())]),
            _ => Err(Error::State("frame holds no read/write buffer")),
        }
    }
}
