use crate::codec::median;
use crate::error::Result;
use crate::image::{Image, ImageType};

/// Luma weights in 16 bit fixed point, 0.3, 0.59 and 0.11 of 65535
const LUMA_R: u32 = 19660;
const LUMA_G: u32 = 38665;
const LUMA_B: u32 = 7208;

/// Fixed point luma of one pixel
#[inline]
pub fn luma([r, g, b]: [u8; 3]) -> u8 {
    ((LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32) >> 16) as u8
}

/// Packs one pixel as `r << 16 | g << 8 | b`
#[inline]
pub fn pack([r, g, b]: [u8; 3]) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

pub fn to_grayscale(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Rgb)?;

    let mut gray = Image::new(img.width(), img.height(), ImageType::Grayscale);
    for (src, dst) in img.pixels().zip(gray.as_bytes_mut()) {
        *dst = luma([src[0], src[1], src[2]]);
    }
    Ok(gray)
}

pub fn to_bgrx(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Rgb)?;

    let mut bgrx = Image::new(img.width(), img.height(), ImageType::Bgrx);
    for (src, dst) in img.pixels().zip(bgrx.pixels_mut()) {
        dst.copy_from_slice(&pack([src[0], src[1], src[2]]).to_ne_bytes());
    }
    Ok(bgrx)
}

/// 3x3 per channel median, the result is 2 pixels narrower and lower
pub fn median(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Rgb)?;
    Ok(median::filter(img, 3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_round_trip_within_one() {
        let data: Vec<u8> = (0..=255u8).flat_map(|v| [v, v, v]).collect();
        let rgb = Image::from_buffer(16, 16, ImageType::Rgb, data).unwrap();

        let back = crate::codec::gray::to_rgb(&to_grayscale(&rgb).unwrap()).unwrap();
        for (a, b) in rgb.as_bytes().iter().zip(back.as_bytes()) {
            assert!((*a as i32 - *b as i32).abs() <= 1, "{} vs {}", a, b);
        }
    }

    #[test]
    fn luma_weights() {
        assert_eq!(luma([0, 0, 0]), 0);
        assert_eq!(luma([255, 0, 0]), 76);
        assert_eq!(luma([0, 255, 0]), 150);
        assert_eq!(luma([0, 0, 255]), 28);
    }

    #[test]
    fn bgrx_packing() {
        let rgb = Image::from_buffer(1, 1, ImageType::Rgb, vec![0x12, 0x34, 0x56]).unwrap();
        let bgrx = to_bgrx(&rgb).unwrap();
        assert_eq!(bgrx.bgrx(0, 0), Some(0x0012_3456));
        assert_eq!(crate::codec::bgrx::to_rgb(&bgrx).unwrap(), rgb);
    }

    #[test]
    fn median_shrinks_and_picks_true_median() {
        // every channel holds a different permutation of 0..16
        let mut data = Vec::new();
        for i in 0..16u8 {
            data.extend_from_slice(&[i, 15 - i, (i * 7) % 16]);
        }
        let rgb = Image::from_buffer(4, 4, ImageType::Rgb, data).unwrap();
        let out = median(&rgb).unwrap();
        assert_eq!((out.width(), out.height()), (2, 2));

        for row in 0..2 {
            for col in 0..2 {
                for ch in 0..3 {
                    let mut window: Vec<u8> = (row..row + 3)
                        .flat_map(|r| (col..col + 3).map(move |c| (r, c)))
                        .map(|(r, c)| rgb.pixel(r, c).unwrap()[ch])
                        .collect();
                    window.sort_unstable();
                    assert_eq!(out.pixel(row, col).unwrap()[ch], window[4]);
                }
            }
        }
    }

    #[test]
    fn rejects_wrong_type() {
        let gray = Image::new(2, 2, ImageType::Grayscale);
        assert!(to_grayscale(&gray).is_err());
        assert!(median(&gray).is_err());
    }
}
