//! Single channel 8 bit operations
//!
//! Conversions and filters allocate their result. [`normalize`], [`difference`] and
//! [`threshold`] work in place on the image passed in.

use crate::codec::{median, rgb};
use crate::error::{Error, Result};
use crate::image::{Image, ImageType};

/// Window of the mean and median filters
const WINDOW: u32 = 5;

pub fn to_rgb(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Grayscale)?;

    let mut out = Image::new(img.width(), img.height(), ImageType::Rgb);
    for (&v, dst) in img.as_bytes().iter().zip(out.pixels_mut()) {
        dst.copy_from_slice(&[v, v, v]);
    }
    Ok(out)
}

pub fn to_bgrx(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Grayscale)?;

    let mut out = Image::new(img.width(), img.height(), ImageType::Bgrx);
    for (&v, dst) in img.as_bytes().iter().zip(out.pixels_mut()) {
        dst.copy_from_slice(&rgb::pack([v, v, v]).to_ne_bytes());
    }
    Ok(out)
}

/// Number of pixels for every gray level
pub fn histogram(img: &Image) -> Result<[u32; 256]> {
    img.expect_type(ImageType::Grayscale)?;

    let mut bins = [0u32; 256];
    for &v in img.as_bytes() {
        bins[v as usize] += 1;
    }
    Ok(bins)
}

/// Darkest and brightest level, `None` for an empty image
pub fn min_max(img: &Image) -> Result<Option<(u8, u8)>> {
    img.expect_type(ImageType::Grayscale)?;

    Ok(img.as_bytes().iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    }))
}

/// Stretches the levels in place so they span `new_min..=new_max`
///
/// Flat images are left alone.
pub fn normalize(img: &mut Image, new_min: u8, new_max: u8) -> Result<()> {
    let (min, max) = match min_max(img)? {
        Some(range) => range,
        None => return Ok(()),
    };

    let gs_range = ((max - min) as i64) << 8;
    if gs_range == 0 {
        return Ok(());
    }
    let new_range = (new_max as i64 - new_min as i64) << 8;

    for v in img.as_bytes_mut() {
        let scaled = ((((*v - min) as i64) << 8) * new_range / gs_range) >> 8;
        *v = (scaled + new_min as i64).clamp(0, 255) as u8;
    }
    Ok(())
}

/// Replaces every pixel of `img` by its absolute difference to `other`
pub fn difference(img: &mut Image, other: &Image) -> Result<()> {
    img.expect_type(ImageType::Grayscale)?;
    other.expect_type(ImageType::Grayscale)?;
    if (img.width(), img.height()) != (other.width(), other.height()) {
        return Err(Error::Invalid(format!(
            "cannot subtract {}x{} from {}x{}",
            other.width(),
            other.height(),
            img.width(),
            img.height()
        )));
    }

    for (a, &b) in img.as_bytes_mut().iter_mut().zip(other.as_bytes()) {
        *a = a.abs_diff(b);
    }
    Ok(())
}

/// Binarises in place, levels at or above `level` become 255, the rest 0
pub fn threshold(img: &mut Image, level: u8) -> Result<()> {
    img.expect_type(ImageType::Grayscale)?;

    for v in img.as_bytes_mut() {
        *v = if *v >= level { 255 } else { 0 };
    }
    Ok(())
}

/// 5x5 box filter, the result is 4 pixels narrower and lower
pub fn smooth(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Grayscale)?;

    let width = img.width().saturating_sub(WINDOW - 1);
    let height = img.height().saturating_sub(WINDOW - 1);
    let mut out = Image::new(width, height, ImageType::Grayscale);
    let stride = img.row_distance();
    let src = img.as_bytes();

    for (row, dst) in out.rows_mut().enumerate() {
        for (col, px) in dst.iter_mut().enumerate() {
            let mut sum = 0u32;
            for wr in row..row + WINDOW as usize {
                let line = &src[wr * stride + col..];
                sum += line[..WINDOW as usize].iter().map(|&v| v as u32).sum::<u32>();
            }
            *px = (sum / (WINDOW * WINDOW)) as u8;
        }
    }
    Ok(out)
}

/// 5x5 median, the result is 4 pixels narrower and lower
pub fn median(img: &Image) -> Result<Image> {
    img.expect_type(ImageType::Grayscale)?;
    Ok(median::filter(img, WINDOW))
}

/// Running per pixel sum used to build a background model
#[derive(Debug, Clone)]
pub struct Averager {
    width: u32,
    height: u32,
    sums: Vec<u32>,
    count: u32,
}

impl Averager {
    pub fn new(width: u32, height: u32) -> Self {
        Averager {
            width,
            height,
            sums: vec![0; width as usize * height as usize],
            count: 0,
        }
    }

    /// Number of frames added so far
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn add(&mut self, img: &Image) -> Result<()> {
        img.expect_type(ImageType::Grayscale)?;
        if (img.width(), img.height()) != (self.width, self.height) {
            return Err(Error::Invalid(format!(
                "frame is {}x{}, background is {}x{}",
                img.width(),
                img.height(),
                self.width,
                self.height
            )));
        }

        for (sum, &v) in self.sums.iter_mut().zip(img.as_bytes()) {
            *sum += v as u32;
        }
        self.count += 1;
        Ok(())
    }

    /// Mean of all added frames
    pub fn finish(&self) -> Result<Image> {
        if self.count == 0 {
            return Err(Error::State("no frames averaged"));
        }
        let data = self.sums.iter().map(|&s| (s / self.count) as u8).collect();
        Image::from_buffer(self.width, self.height, ImageType::Grayscale, data)
    }
}

/// Per pixel mean of equally sized grayscale frames
pub fn average(frames: &[Image]) -> Result<Image> {
    let first = frames
        .first()
        .ok_or_else(|| Error::Invalid("nothing to average".to_string()))?;

    let mut avg = Averager::new(first.width(), first.height());
    for frame in frames {
        avg.add(frame)?;
    }
    avg.finish()
}
