//! Pixel format negotiation
//!
//! A static table pairs every pixelformat we can decode with its decompressor. Selection
//! walks the table in order and binds the first format the driver really applies.

use std::fmt;

use tracing::debug;

use crate::codec;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::format::{Format, FourCC};
use crate::image::Image;
use crate::v4l2::videodev::v4l2_format;

/// Converts `width` x `height` raw frame bytes into an image, rows `stride` bytes apart
pub type DecodeFn = fn(&[u8], u32, u32, usize) -> Result<Image>;

/// A pixelformat paired with the function decoding it
pub struct Decompressor {
    fourcc: FourCC,
    name: &'static str,
    decode: DecodeFn,
}

impl Decompressor {
    pub fn fourcc(&self) -> FourCC {
        self.fourcc
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Decodes one frame into a freshly allocated RGB image
    ///
    /// `stride` is the driver's bytes per line, zero means tightly packed rows.
    pub fn decompress(&self, data: &[u8], width: u32, height: u32, stride: usize) -> Result<Image> {
        (self.decode)(data, width, height, stride)
    }
}

impl fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decompressor")
            .field("fourcc", &self.fourcc)
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for Decompressor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Candidates in order of preference, YUYV needs no external codec
static DECOMPRESSORS: [Decompressor; 3] = [
    Decompressor {
        fourcc: FourCC::YUYV,
        name: "yuyv",
        decode: codec::yuyv::decompress_padded,
    },
    Decompressor {
        fourcc: FourCC::MJPG,
        name: "mjpeg",
        decode: jpeg,
    },
    Decompressor {
        fourcc: FourCC::JPEG,
        name: "jpeg",
        decode: jpeg,
    },
];

// compressed frames have no line layout
fn jpeg(data: &[u8], width: u32, height: u32, _stride: usize) -> Result<Image> {
    codec::jpeg::decompress(data, width, height)
}

/// All registered decompressors, in selection order
pub fn decompressors() -> &'static [Decompressor] {
    &DECOMPRESSORS
}

/// Looks up the decompressor registered for `fourcc`
pub fn get_decompressor(fourcc: FourCC) -> Result<&'static Decompressor> {
    DECOMPRESSORS
        .iter()
        .find(|d| d.fourcc == fourcc)
        .ok_or_else(|| Error::NotSupported(format!("no decompressor for {}", fourcc)))
}

/// Whether a decompressor is registered for `fourcc`
pub fn is_format_supported(fourcc: FourCC) -> bool {
    get_decompressor(fourcc).is_ok()
}

/// Asks the driver to switch `current` over to `fourcc`
///
/// The format written back by the driver decides, an echo of a different pixelformat is a
/// rejection even if the ioctl itself succeeded.
pub(crate) fn try_format<D: Device>(dev: &D, current: &Format, fourcc: FourCC) -> Result<Format> {
    let mut raw = v4l2_format::capture(current.with_fourcc(fourcc).into());
    dev.set_format(&mut raw)
        .map_err(|e| Error::from_errno("VIDIOC_S_FMT", e))?;

    let applied = Format::from(raw.pix());
    if applied.fourcc != fourcc {
        return Err(Error::Invalid(format!(
            "requested {}, driver applied {}",
            fourcc, applied.fourcc
        )));
    }
    Ok(applied)
}

/// Binds the first candidate format the device accepts
///
/// A busy device aborts the search, rejected candidates are skipped.
pub(crate) fn select<D: Device>(
    dev: &D,
    current: &Format,
) -> Result<(Format, &'static Decompressor)> {
    for decompressor in DECOMPRESSORS.iter() {
        match try_format(dev, current, decompressor.fourcc) {
            Ok(format) => {
                debug!("selected {} decompressor", decompressor.name);
                return Ok((format, decompressor));
            }
            Err(Error::Invalid(reason)) => {
                debug!("{} rejected: {}", decompressor.fourcc, reason);
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::NotSupported(
        "device accepts none of the supported pixel formats".to_string(),
    ))
}

/// Binds the caller's pixelformat, which has to be in the table
pub(crate) fn select_user<D: Device>(
    dev: &D,
    current: &Format,
    fourcc: FourCC,
) -> Result<(Format, &'static Decompressor)> {
    let decompressor = get_decompressor(fourcc)?;
    let format = try_format(dev, current, fourcc)?;
    Ok((format, decompressor))
}
