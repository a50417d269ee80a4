//! Markers painted onto grayscale images

use crate::error::Result;
use crate::image::{Image, ImageType};

/// Paints the full row and the full column through (`row`, `col`)
pub fn cross(img: &mut Image, row: u32, col: u32, value: u8) -> Result<()> {
    img.expect_type(ImageType::Grayscale)?;

    if let Some(line) = img.row_mut(row) {
        line.fill(value);
    }
    for r in 0..img.height() {
        img.set_gray(r, col, value);
    }
    Ok(())
}

/// Bresenham line between two (row, col) points, both end points included
///
/// Points outside the image are clipped.
pub fn line(img: &mut Image, from: (u32, u32), to: (u32, u32), value: u8) -> Result<()> {
    img.expect_type(ImageType::Grayscale)?;

    let (mut r, mut c) = (from.0 as i64, from.1 as i64);
    let (r1, c1) = (to.0 as i64, to.1 as i64);
    let dc = (c1 - c).abs();
    let dr = -(r1 - r).abs();
    let step_c = if c < c1 { 1 } else { -1 };
    let step_r = if r < r1 { 1 } else { -1 };
    let mut err = dc + dr;

    loop {
        if r >= 0 && c >= 0 {
            img.set_gray(r as u32, c as u32, value);
        }
        if r == r1 && c == c1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dr {
            err += dr;
            c += step_c;
        }
        if e2 <= dc {
            err += dc;
            r += step_r;
        }
    }
    Ok(())
}
