use std::fmt;

use crate::v4l2::videodev::{v4l2_pix_format, V4L2_FIELD_ANY};

pub mod description;
pub use description::Description;

pub mod fourcc;
pub use fourcc::FourCC;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Negotiated single-planar capture format
pub struct Format {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// pixelformat code
    pub fourcc: FourCC,
    /// raw v4l2 field order
    pub field: u32,

    /// bytes per line
    pub stride: u32,
    /// maximum number of bytes required to store an image
    pub size: u32,

    /// raw v4l2 colorspace
    pub colorspace: u32,
    /// raw v4l2 format flags
    pub flags: u32,
}

impl Format {
    /// Returns a capture format
    ///
    /// # Arguments
    ///
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `fourcc` - Four character code (pixelformat)
    ///
    /// # Example
    ///
    /// ```
    /// use wgcam::{Format, FourCC};
    /// let fmt = Format::new(640, 480, FourCC::new(b"YUYV"));
    /// ```
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Format {
            width,
            height,
            fourcc,
            field: V4L2_FIELD_ANY,
            stride: 0,
            size: 0,
            colorspace: 0,
            flags: 0,
        }
    }

    /// Same format with a different pixelformat, size fields left for the driver to fill
    pub fn with_fourcc(&self, fourcc: FourCC) -> Self {
        Format {
            fourcc,
            stride: 0,
            size: 0,
            ..*self
        }
    }

    /// Same format with a different resolution, size fields left for the driver to fill
    pub fn with_resolution(&self, width: u32, height: u32) -> Self {
        Format {
            width,
            height,
            stride: 0,
            size: 0,
            ..*self
        }
    }

    /// Bytes a single frame occupies, falling back to stride * height
    pub fn frame_size(&self) -> usize {
        if self.size != 0 {
            self.size as usize
        } else {
            self.stride as usize * self.height as usize
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "width          : {}", self.width)?;
        writeln!(f, "height         : {}", self.height)?;
        writeln!(f, "fourcc         : {}", self.fourcc)?;
        writeln!(f, "stride         : {}", self.stride)?;
        writeln!(f, "size           : {}", self.size)?;
        Ok(())
    }
}

impl From<v4l2_pix_format> for Format {
    fn from(fmt: v4l2_pix_format) -> Self {
        Self {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.pixelformat),
            field: fmt.field,
            stride: fmt.bytesperline,
            size: fmt.sizeimage,
            colorspace: fmt.colorspace,
            flags: fmt.flags,
        }
    }
}

impl From<Format> for v4l2_pix_format {
    fn from(format: Format) -> Self {
        Self {
            width: format.width,
            height: format.height,
            pixelformat: format.fourcc.into(),
            field: format.field,
            bytesperline: format.stride,
            sizeimage: format.size,
            colorspace: format.colorspace,
            flags: format.flags,
            ..Default::default()
        }
    }
}
