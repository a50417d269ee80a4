//! YUV 4:2:2 to RGB
//!
//! Each 4 byte macropixel is laid out Y0 V Y1 U and yields two RGB pixels sharing the same
//! chroma. Integer BT.601 approximation with studio swing luma.

use crate::error::{Error, Result};
use crate::image::{Image, ImageType};

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Converts one macropixel into two RGB pixels
#[inline]
pub fn macropixel(y0: u8, v: u8, y1: u8, u: u8) -> [[u8; 3]; 2] {
    let c0 = y0 as i32 - 16;
    let c1 = y1 as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let red = 516 * d + 128;
    let green = -100 * d - 208 * e + 128;
    let blue = 409 * e + 128;

    let pixel = |c: i32| {
        [
            clamp((298 * c + red) >> 8),
            clamp((298 * c + green) >> 8),
            clamp((298 * c + blue) >> 8),
        ]
    };
    [pixel(c0), pixel(c1)]
}

/// Decodes a tightly packed YUYV frame of `width` x `height` pixels into RGB
pub fn decompress(data: &[u8], width: u32, height: u32) -> Result<Image> {
    decompress_padded(data, width, height, 0)
}

/// Decodes a YUYV frame whose rows start `stride` bytes apart
///
/// Drivers may pad lines past `width * 2` bytes, the padding is skipped. A zero stride
/// means packed rows.
pub fn decompress_padded(data: &[u8], width: u32, height: u32, stride: usize) -> Result<Image> {
    if width % 2 != 0 {
        return Err(Error::Decode(format!(
            "YUYV frame {}x{} has an odd width",
            width, height
        )));
    }
    let line = width as usize * 2;
    let stride = if stride == 0 { line } else { stride };
    if stride < line {
        return Err(Error::Decode(format!(
            "YUYV stride {} is shorter than a {} pixel line",
            stride, width
        )));
    }

    let needed = match height as usize {
        0 => 0,
        rows => (rows - 1) * stride + line,
    };
    if data.len() < needed {
        return Err(Error::Decode(format!(
            "YUYV frame {}x{} needs {} bytes, got {}",
            width,
            height,
            needed,
            data.len()
        )));
    }

    let mut img = Image::new(width, height, ImageType::Rgb);
    for (row, out) in img.rows_mut().enumerate() {
        let start = row * stride;
        for (src, dst) in data[start..start + line]
            .chunks_exact(4)
            .zip(out.chunks_exact_mut(6))
        {
            let [p0, p1] = macropixel(src[0], src[1], src[2], src[3]);
            dst[..3].copy_from_slice(&p0);
            dst[3..].copy_from_slice(&p1);
        }
    }
    Ok(img)
}

/// Converts a YUYV tagged image into RGB
pub fn to_rgb(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Yuyv)?;
    decompress(img.as_bytes(), img.width(), img.height())
}
