use std::mem;

use tracing::{debug, info, warn};

use crate::capability::DeviceCapabilities;
use crate::capture::Strategy;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::frame::{Frame, Storage};
use crate::v4l2::videodev::*;

/// Number of buffers requested from the driver
pub const BUFFER_COUNT: u32 = 5;

/// Fewer buffers than this cannot pipeline capture and processing
pub const MIN_BUFFERS: u32 = 2;

/// Ring of driver buffers mapped into the process
///
/// The ring has no internal locking. Every dequeued buffer has to be handed back through
/// [`Strategy::mark_empty`] before the driver can fill it again. Frames still holding a
/// buffer when the ring is torn down are orphaned: discarding them drops the descriptor
/// without touching the driver.
pub struct StreamingCapture<D: Device> {
    ring: Vec<D::Mapping>,
    queued: Vec<bool>,
    /// Bumped every time the ring is torn down
    generation: u64,
}

impl<D: Device> StreamingCapture<D> {
    pub fn new() -> Self {
        StreamingCapture {
            ring: Vec::new(),
            queued: Vec::new(),
            generation: 0,
        }
    }

    /// Number of buffers currently mapped
    pub fn buffers(&self) -> usize {
        self.ring.len()
    }

    /// Number of buffers currently owned by the driver
    pub fn queued(&self) -> usize {
        self.queued.iter().filter(|q| **q).count()
    }

    fn request(dev: &D, count: u32) -> Result<u32> {
        let mut req = v4l2_requestbuffers {
            count,
            type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: V4L2_MEMORY_MMAP,
            ..Default::default()
        };
        dev.request_buffers(&mut req).map_err(|e| {
            if e.raw_os_error() == Some(libc::EINVAL) {
                Error::NotSupported("memory mapped streaming".to_string())
            } else {
                Error::from_errno("VIDIOC_REQBUFS", e)
            }
        })?;
        Ok(req.count)
    }

    /// Frees the driver side of the ring, mappings must be gone already
    fn release(dev: &D) {
        if let Err(e) = Self::request(dev, 0) {
            warn!("failed to release driver buffers: {}", e);
        }
    }

    fn map_ring(dev: &D, count: u32) -> Result<Vec<D::Mapping>> {
        let mut ring = Vec::with_capacity(count as usize);
        for index in 0..count {
            let mut buf = v4l2_buffer::capture(index);
            dev.query_buffer(&mut buf)
                .map_err(|e| Error::from_errno("VIDIOC_QUERYBUF", e))?;

            // dropping `ring` on the error path unmaps what was mapped so far
            let mapping = dev.map(&buf).map_err(|e| Error::from_errno("mmap", e))?;
            debug!(
                "mapped buffer {} ({} bytes at offset {:#x})",
                index,
                buf.length,
                buf.offset()
            );
            ring.push(mapping);
        }
        Ok(ring)
    }

    fn queue_all(dev: &D, count: u32) -> Result<()> {
        for index in 0..count {
            let mut buf = v4l2_buffer::capture(index);
            dev.queue_buffer(&mut buf)
                .map_err(|e| Error::from_errno("VIDIOC_QBUF", e))?;
        }
        Ok(())
    }
}

impl<D: Device> Default for StreamingCapture<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Device> Strategy<D> for StreamingCapture<D> {
    fn open(&mut self, caps: &DeviceCapabilities) -> Result<()> {
        if !caps.video_capture() {
            return Err(Error::NotSupported("video capture".to_string()));
        }
        if !caps.streaming() {
            return Err(Error::NotSupported("streaming i/o".to_string()));
        }
        Ok(())
    }

    fn start(&mut self, dev: &D, _format: &Format) -> Result<()> {
        if !self.ring.is_empty() {
            return Err(Error::State("buffer ring already allocated"));
        }

        let count = Self::request(dev, BUFFER_COUNT)?;
        if count < MIN_BUFFERS {
            Self::release(dev);
            return Err(Error::Failure(format!(
                "insufficient buffer memory, driver granted {} buffers",
                count
            )));
        }

        let ring = match Self::map_ring(dev, count) {
            Ok(ring) => ring,
            Err(e) => {
                Self::release(dev);
                return Err(e);
            }
        };

        if let Err(e) = Self::queue_all(dev, count).and_then(|_| {
            dev.stream_on()
                .map_err(|e| Error::from_errno("VIDIOC_STREAMON", e))
        }) {
            drop(ring);
            Self::release(dev);
            return Err(e);
        }

        info!("streaming with {} buffers", count);
        self.queued = vec![true; ring.len()];
        self.ring = ring;
        Ok(())
    }

    fn stop(&mut self, dev: &D) -> Result<()> {
        let res = dev
            .stream_off()
            .map_err(|e| Error::from_errno("VIDIOC_STREAMOFF", e));

        let count = self.ring.len();
        self.ring.clear();
        self.queued.clear();
        self.generation += 1;
        if count > 0 {
            Self::release(dev);
        }
        debug!("unmapped {} buffers", count);
        res
    }

    fn read(&mut self, dev: &D, format: &Format, frame: &mut Frame) -> Result<()> {
        if self.ring.is_empty() {
            return Err(Error::State("streaming not started"));
        }

        let mut buf = v4l2_buffer::capture(0);
        dev.dequeue_buffer(&mut buf)
            .map_err(|e| Error::from_errno("VIDIOC_DQBUF", e))?;

        let index = buf.index as usize;
        if index >= self.ring.len() {
            return Err(Error::Invalid(format!(
                "driver returned buffer {} of {}",
                index,
                self.ring.len()
            )));
        }
        if !mem::replace(&mut self.queued[index], false) {
            return Err(Error::Invalid(format!(
                "buffer {} dequeued twice without being re-queued",
                index
            )));
        }

        frame.bytesused = (buf.bytesused as usize).min(self.ring[index].len());
        frame.sequence = buf.sequence;
        frame.timestamp = buf.timestamp.into();
        frame.describe(format);
        frame.storage = Storage::Mapped {
            buf,
            generation: self.generation,
        };
        Ok(())
    }

    fn mark_empty(&mut self, dev: &D, frame: &mut Frame) -> Result<()> {
        let (mut buf, generation) = match mem::replace(&mut frame.storage, Storage::None) {
            Storage::Mapped { buf, generation } => (buf, generation),
            other => {
                frame.storage = other;
                return Err(Error::State("frame does not hold a ring buffer"));
            }
        };

        if generation != self.generation {
            debug!("dropping buffer {} of a released ring", buf.index);
            frame.bytesused = 0;
            return Ok(());
        }

        let index = buf.index as usize;
        if index >= self.ring.len() {
            return Err(Error::Invalid(format!("unknown buffer {}", index)));
        }

        // the stored descriptor carries the driver's bookkeeping, re-queue it as is
        buf.bytesused = 0;
        if let Err(e) = dev.queue_buffer(&mut buf) {
            frame.storage = Storage::Mapped { buf, generation };
            return Err(Error::from_errno("VIDIOC_QBUF", e));
        }
        self.queued[index] = true;
        frame.bytesused = 0;
        Ok(())
    }

    fn cleanup_frame(&mut self, frame: &mut Frame) {
        // the memory belongs to the ring
        frame.reset();
    }

    fn frame_data<'a>(&'a self, frame: &'a Frame) -> Result<&'a [u8]> {
        let index = match &frame.storage {
            Storage::Mapped { buf, generation } if *generation == self.generation => {
                buf.index as usize
            }
            Storage::Mapped { .. } => {
                return Err(Error::State("frame buffer belongs to a released ring"))
            }
            _ => return Err(Error::State("frame does not hold a ring buffer")),
        };
        let mapping = self
            .ring
            .get(index)
            .ok_or_else(|| Error::Invalid(format!("unknown buffer {}", index)))?;
        Ok(&mapping[..frame.bytesused.min(mapping.len())])
    }
}
