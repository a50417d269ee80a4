use crate::codec::median;
use crate::error::Result;
use crate::image::{read_u32, Image, ImageType};

/// Splits a packed `r << 16 | g << 8 | b` value
#[inline]
pub fn unpack(value: u32) -> [u8; 3] {
    [(value >> 16) as u8, (value >> 8) as u8, value as u8]
}

pub fn to_rgb(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Bgrx)?;

    let mut rgb = Image::new(img.width(), img.height(), ImageType::Rgb);
    for (src, dst) in img.pixels().zip(rgb.pixels_mut()) {
        dst.copy_from_slice(&unpack(read_u32(src)));
    }
    Ok(rgb)
}

/// 3x3 per channel median, the result is 2 pixels narrower and lower
pub fn median(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Bgrx)?;
    Ok(median::filter(img, 3))
}
