//! Circle centre voting
//!
//! Any two edge pixels on a circle form a chord whose perpendicular bisector passes through
//! the centre. For every pair of edge pixels close to each other, but not too close, the
//! bisector is rasterised into a vote accumulator. The cell with the most votes is the
//! most likely centre.

use tracing::trace;

use crate::error::Result;
use crate::image::{read_u32, Image, ImageType};

/// Fixed point fraction bits
const FP_SHIFT: u32 = 8;
const FP_ONE: i32 = 1 << FP_SHIFT;
/// Divisor precision kept by [`fp_div`]
const FP_HALF: u32 = FP_SHIFT >> 1;

/// Half size of the partner search window
pub const WINDOW: i32 = 25;
/// Partners within this half size are too close to give a stable bisector
pub const INNER: i32 = 23;

const TABLE_SIZE: usize = 2 * WINDOW as usize + 1;

#[inline]
fn fp(value: i32) -> i32 {
    value << FP_SHIFT
}

#[inline]
fn fp_int(value: i32) -> i32 {
    value >> FP_SHIFT
}

#[inline]
fn fp_mul(a: i32, b: i32) -> i32 {
    ((a as i64 * b as i64) >> FP_SHIFT) as i32
}

#[inline]
fn fp_div(num: i32, den: i32) -> i32 {
    (num / (den >> FP_HALF)) << FP_HALF
}

/// Most voted accumulator cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Centre {
    pub row: u32,
    pub col: u32,
    pub votes: u32,
}

/// Bisector voting with a precomputed slope table
#[derive(Clone)]
pub struct CircleDetector {
    /// `dx / dy` in fixed point, indexed by `dx + WINDOW` and `dy + WINDOW`
    slopes: Box<[[i32; TABLE_SIZE]; TABLE_SIZE]>,
}

impl CircleDetector {
    pub fn new() -> Self {
        let mut slopes = Box::new([[0i32; TABLE_SIZE]; TABLE_SIZE]);
        for dx in -WINDOW..=WINDOW {
            for dy in -WINDOW..=WINDOW {
                slopes[(dx + WINDOW) as usize][(dy + WINDOW) as usize] = if dy != 0 {
                    (dx as f32 * FP_ONE as f32 / dy as f32) as i32
                } else {
                    fp(9999)
                };
            }
        }
        CircleDetector { slopes }
    }

    fn slope(&self, dx: i32, dy: i32) -> i32 {
        self.slopes[(dx + WINDOW) as usize][(dy + WINDOW) as usize]
    }

    /// Votes for circle centres, every pixel equal to 255 counts as an edge
    ///
    /// Returns an accumulator image of the same size as `img`.
    pub fn detect(&self, img: &Image) -> Result<Image> {
        img.expect_type(ImageType::Grayscale)?;

        let mut acc = Image::new(img.width(), img.height(), ImageType::Accumulator);
        let mut edges = 0usize;
        for row in 0..img.height() {
            for col in 0..img.width() {
                if img.gray(row, col) == Some(255) {
                    self.vote_pixel(img, &mut acc, row as i32, col as i32);
                    edges += 1;
                }
            }
        }
        trace!("voted for {} edge pixels", edges);
        Ok(acc)
    }

    fn vote_pixel(&self, img: &Image, acc: &mut Image, y1: i32, x1: i32) {
        let width = fp(img.width() as i32);
        let height = fp(img.height() as i32);
        let (x1, y1) = (fp(x1), fp(y1));

        for dx in -WINDOW..WINDOW {
            for dy in -WINDOW..WINDOW {
                if dx.abs() <= INNER && dy.abs() <= INNER {
                    continue;
                }
                let (x2, y2) = (x1 + fp(dx), y1 + fp(dy));
                if x2 <= 0 || y2 <= 0 || x2 >= width || y2 >= height {
                    continue;
                }
                if img.gray(fp_int(y2) as u32, fp_int(x2) as u32) != Some(255) {
                    continue;
                }

                let xm = (x1 + x2) >> 1;
                let ym = (y1 + y2) >> 1;
                let m = self.slope(dx, dy);

                if m > -FP_ONE && m < FP_ONE {
                    // shallow bisector, one vote per column
                    let mut x0 = 0;
                    while x0 < width {
                        let y0 = ym + fp_mul(m, xm - x0);
                        if y0 > 0 && y0 < height {
                            acc.vote(fp_int(y0) as u32, fp_int(x0) as u32);
                        }
                        x0 += FP_ONE;
                    }
                } else {
                    // steep bisector, one vote per row
                    let mut y0 = 0;
                    while y0 < height {
                        let x0 = xm + fp_div(ym - y0, m);
                        if x0 > 0 && x0 < width {
                            acc.vote(fp_int(y0) as u32, fp_int(x0) as u32);
                        }
                        y0 += FP_ONE;
                    }
                }
            }
        }
    }
}

impl Default for CircleDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Cell with the most votes, the first one in row major order on ties
pub fn acc_max(acc: &Image) -> Result<Centre> {
    acc.expect_type(ImageType::Accumulator)?;

    let mut best = Centre::default();
    for (row, line) in acc.rows().enumerate() {
        for (col, cell) in line.chunks_exact(4).enumerate() {
            let votes = read_u32(cell);
            if votes > best.votes {
                best = Centre {
                    row: row as u32,
                    col: col as u32,
                    votes,
                };
            }
        }
    }
    Ok(best)
}

/// Scales the votes into a grayscale image, the maximum maps to 255
pub fn acc_to_gray(acc: &Image) -> Result<Image> {
    acc.expect_type(ImageType::Accumulator)?;

    let mut gray = Image::new(acc.width(), acc.height(), ImageType::Grayscale);
    let max = acc.pixels().map(read_u32).max().unwrap_or(0);
    if max == 0 {
        return Ok(gray);
    }
    for (cell, px) in acc.pixels().zip(gray.as_bytes_mut()) {
        *px = (255 * read_u32(cell) as u64 / max as u64) as u8;
    }
    Ok(gray)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(size: u32, row: f32, col: f32, radius: f32) -> Image {
        let mut img = Image::new(size, size, ImageType::Grayscale);
        for step in 0..720 {
            let angle = step as f32 * std::f32::consts::PI / 360.0;
            let r = (row + radius * angle.sin()).round() as u32;
            let c = (col + radius * angle.cos()).round() as u32;
            img.set_gray(r, c, 255);
        }
        img
    }

    #[test]
    fn slope_table() {
        let det = CircleDetector::new();
        assert_eq!(det.slope(0, 5), 0);
        assert_eq!(det.slope(5, 5), FP_ONE);
        assert_eq!(det.slope(-1, 2), -FP_ONE / 2);
        assert_eq!(det.slope(3, 0), fp(9999));
    }

    #[test]
    fn fixed_point_division_keeps_four_bits() {
        assert_eq!(fp_div(fp(10), fp(2)), fp(5));
        assert_eq!(fp_div(-fp(10), fp(2)), -fp(5));
    }

    #[test]
    fn finds_ring_centre() {
        let img = ring(80, 40.0, 38.0, 15.0);
        let acc = CircleDetector::new().detect(&img).unwrap();
        assert_eq!((acc.width(), acc.height()), (80, 80));

        let centre = acc_max(&acc).unwrap();
        assert!(centre.votes > 0);
        assert!((centre.row as i32 - 40).abs() <= 2, "{:?}", centre);
        assert!((centre.col as i32 - 38).abs() <= 2, "{:?}", centre);
    }

    #[test]
    fn no_edges_no_votes() {
        let img = Image::new(30, 30, ImageType::Grayscale);
        let acc = CircleDetector::new().detect(&img).unwrap();
        assert_eq!(acc_max(&acc).unwrap(), Centre::default());
        assert!(acc_to_gray(&acc).unwrap().as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn accumulator_scaling() {
        let mut acc = Image::new(3, 1, ImageType::Accumulator);
        acc.vote(0, 1);
        acc.vote(0, 1);
        acc.vote(0, 2);
        let gray = acc_to_gray(&acc).unwrap();
        assert_eq!(gray.as_bytes(), &[0, 255, 127]);
        assert_eq!(
            acc_max(&acc).unwrap(),
            Centre {
                row: 0,
                col: 1,
                votes: 2
            }
        );
    }

    #[test]
    fn wrong_input_type() {
        let rgb = Image::new(2, 2, ImageType::Rgb);
        assert!(CircleDetector::new().detect(&rgb).is_err());
        assert!(acc_max(&rgb).is_err());
    }
}
