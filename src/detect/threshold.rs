use crate::error::Result;
use crate::image::{Image, ImageType};

/// Hysteresis thresholding of an edge image, in place
///
/// Pixels at or above `upper` become 255 and promote every 8-connected pixel at or above
/// `lower`, transitively. Weaker pixels are left untouched. A one pixel frame at the
/// top and left and a two pixel frame at the bottom and right are never visited.
pub fn hysteresis(img: &mut Image, upper: u8, lower: u8) -> Result<()> {
    img.expect_type(ImageType::Grayscale)?;

    let (width, height) = (img.width() as usize, img.height() as usize);
    if width < 4 || height < 4 {
        return Ok(());
    }
    let inside = |row: usize, col: usize| row >= 1 && row < height - 2 && col >= 1 && col < width - 2;

    let rd = img.row_distance();
    let data = img.as_bytes_mut();
    let mut pending = Vec::new();

    for row in 1..height - 2 {
        for col in 1..width - 2 {
            let pix = &mut data[row * rd + col];
            if *pix < upper || *pix == 255 {
                continue;
            }
            *pix = 255;
            pending.push((row, col));

            while let Some((r, c)) = pending.pop() {
                for nr in r - 1..=r + 1 {
                    for nc in c - 1..=c + 1 {
                        if !inside(nr, nc) {
                            continue;
                        }
                        let neighbour = &mut data[nr * rd + nc];
                        if *neighbour >= lower && *neighbour != 255 {
                            *neighbour = 255;
                            pending.push((nr, nc));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_pixels_follow_strong_ones() {
        #[rustfmt::skip]
        let data = vec![
            0, 0,   0,   0,  0,  0, 0,
            0, 200, 60,  0,  0,  0, 0,
            0, 0,   0,   60, 0,  0, 0,
            0, 0,   0,   0,  60, 0, 0,
            0, 60,  0,   0,  0,  0, 0,
            0, 0,   0,   0,  0,  0, 0,
            0, 0,   0,   0,  0,  0, 0,
        ];
        let mut img = Image::from_buffer(7, 7, ImageType::Grayscale, data).unwrap();
        hysteresis(&mut img, 150, 50).unwrap();

        assert_eq!(img.gray(1, 1), Some(255));
        assert_eq!(img.gray(1, 2), Some(255));
        assert_eq!(img.gray(2, 3), Some(255));
        assert_eq!(img.gray(3, 4), Some(255));
        // not connected to any strong pixel
        assert_eq!(img.gray(4, 1), Some(60));
    }

    #[test]
    fn long_chains_do_not_recurse() {
        let width = 2000;
        let mut img = Image::new(width, 4, ImageType::Grayscale);
        for col in 1..width - 2 {
            img.set_gray(1, col, 100);
        }
        img.set_gray(1, 1, 250);
        hysteresis(&mut img, 200, 90).unwrap();
        assert!((1..width - 2).all(|col| img.gray(1, col) == Some(255)));
    }
}
