use std::fmt;

use crate::format::{Format, FourCC};
use crate::timestamp::Timestamp;
use crate::v4l2::videodev::v4l2_buffer;

/// Lifecycle state of a [`Frame`]
///
/// ```text
/// Invalid --read--> Full --discard--> Empty --read--> Full ...
///    ^                                  |
///    +-------------- free --------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Freshly initialised or freed, owns nothing
    Invalid,
    /// Bytes handed back to the capture strategy
    Empty,
    /// Holds a captured frame
    Full,
}

/// Where the bytes of a frame live
pub(crate) enum Storage {
    None,
    /// View into a buffer of the streaming ring, the descriptor is needed to re-queue it
    ///
    /// `generation` names the ring the buffer belongs to. Once that ring is torn down the
    /// descriptor is stale and must not reach the driver again.
    Mapped { buf: v4l2_buffer, generation: u64 },
    /// Heap buffer owned by the frame, reused across reads
    Heap(Vec<u8>),
}

/// One capture unit returned by [`crate::Camera::read`]
///
/// In streaming mode the bytes are a view into a kernel buffer that is handed back to the
/// driver on discard. In read/write mode the frame owns a heap buffer that is released by
/// [`crate::Camera::free_frame`].
pub struct Frame {
    pub(crate) state: FrameState,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) stride: u32,
    pub(crate) fourcc: FourCC,
    pub(crate) bytesused: usize,
    pub(crate) sequence: u32,
    pub(crate) timestamp: Timestamp,
    pub(crate) storage: Storage,
}

impl Frame {
    /// Returns an invalid frame, ready to be passed to [`crate::Camera::read`]
    pub fn new() -> Self {
        Frame {
            state: FrameState::Invalid,
            width: 0,
            height: 0,
            stride: 0,
            fourcc: FourCC::default(),
            bytesused: 0,
            sequence: 0,
            timestamp: Timestamp::default(),
            storage: Storage::None,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per line reported by the driver, zero for compressed formats
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Pixelformat the bytes are encoded in
    pub fn fourcc(&self) -> FourCC {
        self.fourcc
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.bytesused
    }

    pub fn is_empty(&self) -> bool {
        self.bytesused == 0
    }

    /// Whether the frame still references capture memory
    pub fn has_buffer(&self) -> bool {
        !matches!(self.storage, Storage::None)
    }

    /// Driver sequence number, zero in read/write mode
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Driver capture timestamp, zero in read/write mode
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub(crate) fn describe(&mut self, format: &Format) {
        self.width = format.width;
        self.height = format.height;
        self.stride = format.stride;
        self.fourcc = format.fourcc;
    }

    pub(crate) fn reset(&mut self) {
        *self = Frame::new();
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::new()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = match &self.storage {
            Storage::None => "none",
            Storage::Mapped { .. } => "mapped",
            Storage::Heap(_) => "heap",
        };
        f.debug_struct("Frame")
            .field("state", &self.state)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("fourcc", &self.fourcc)
            .field("bytesused", &self.bytesused)
            .field("sequence", &self.sequence)
            .field("storage", &storage)
            .finish()
    }
}
