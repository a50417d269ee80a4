use crate::error::Result;
use crate::image::{Image, ImageType};

/// Gradient magnitude of a grayscale image
///
/// Uses a 3x3 Sobel pair anchored at the top left corner of each window and keeps the
/// larger of the horizontal and vertical response, saturated at 255. The result is 2
/// pixels narrower and lower.
pub fn detect_edges(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Grayscale)?;

    let width = img.width().saturating_sub(2);
    let height = img.height().saturating_sub(2);
    let mut out = Image::new(width, height, ImageType::Grayscale);

    let rd = img.row_distance();
    let src = img.as_bytes();
    for (row, dst) in out.rows_mut().enumerate() {
        for (col, px) in dst.iter_mut().enumerate() {
            let p = |offset: usize| src[row * rd + col + offset] as i32;
            let horizontal =
                (p(0) - p(2) + 2 * p(rd) - 2 * p(rd + 2) + p(2 * rd) - p(2 * rd + 2)).abs();
            let vertical =
                (p(0) + 2 * p(1) + p(2) - p(2 * rd) - 2 * p(2 * rd + 1) - p(2 * rd + 2)).abs();
            *px = horizontal.max(vertical).min(255) as u8;
        }
    }
    Ok(out)
}
