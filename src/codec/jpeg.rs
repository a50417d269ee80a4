//! MJPEG and JPEG decoding
//!
//! Frames are decoded straight from the capture buffer, no temporary files are involved.
//! Motion JPEG streams usually omit the Huffman tables, the decoder falls back to the
//! default ones from the JPEG standard.

use jpeg_decoder::{Decoder, PixelFormat};
use tracing::debug;

use crate::error::{Error, Result};
use crate::image::{Image, ImageType};

/// Decodes one compressed frame into RGB
///
/// The dimensions found in the frame header win over `width` and `height`, a mismatch is
/// only logged.
pub fn decompress(data: &[u8], width: u32, height: u32) -> Result<Image> {
    let mut decoder = Decoder::new(data);
    let pixels = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or_else(|| Error::Decode("jpeg header missing".to_string()))?;

    let (w, h) = (info.width as u32, info.height as u32);
    if (w, h) != (width, height) {
        debug!(
            "jpeg frame is {}x{}, negotiated format says {}x{}",
            w, h, width, height
        );
    }

    let rgb = match info.pixel_format {
        PixelFormat::RGB24 => pixels,
        PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l]).collect(),
        other => {
            return Err(Error::Decode(format!(
                "unsupported jpeg pixel format {:?}",
                other
            )))
        }
    };
    Image::from_buffer(w, h, ImageType::Rgb, rgb)
}
