//! Format tagged raster buffers
//!
//! An [`Image`] owns one contiguous allocation. Row `r` starts at `r * row_distance`, so
//! every accessor is a bounds checked slice into that allocation.

use std::fmt;

use crate::codec::hsv::Hsv;
use crate::error::{Error, Result};

mod view;
pub use view::{Column, ImageView};

/// Pixel layout of an [`Image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// 3 bytes, R G B
    Rgb,
    /// 4 bytes, native endian u32 `r << 16 | g << 8 | b`
    Bgrx,
    /// 2 bytes per pixel, 4 byte macropixels
    Yuyv,
    /// 3 native endian f32, hue in degrees, saturation and value in [0, 1]
    Hsv,
    /// 1 byte luma
    Grayscale,
    /// native endian u32 vote counter
    Accumulator,
    /// Opaque pixels of the given size
    User { bytes_per_pixel: usize },
}

impl ImageType {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageType::Rgb => 3,
            ImageType::Bgrx => 4,
            ImageType::Yuyv => 2,
            ImageType::Hsv => 3 * std::mem::size_of::<f32>(),
            ImageType::Grayscale => 1,
            ImageType::Accumulator => std::mem::size_of::<u32>(),
            ImageType::User { bytes_per_pixel } => bytes_per_pixel,
        }
    }

    pub fn components_per_pixel(self) -> usize {
        match self {
            ImageType::Rgb | ImageType::Hsv => 3,
            ImageType::Bgrx => 4,
            ImageType::Yuyv => 2,
            ImageType::Grayscale | ImageType::Accumulator => 1,
            ImageType::User { bytes_per_pixel } => bytes_per_pixel,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageType::Rgb => write!(f, "rgb24"),
            ImageType::Bgrx => write!(f, "bgrx"),
            ImageType::Yuyv => write!(f, "yuyv"),
            ImageType::Hsv => write!(f, "hsv"),
            ImageType::Grayscale => write!(f, "grayscale"),
            ImageType::Accumulator => write!(f, "accumulator"),
            ImageType::User { bytes_per_pixel } => write!(f, "user({})", bytes_per_pixel),
        }
    }
}

/// Decoded raster, independent of camera buffers
#[derive(Clone, PartialEq)]
pub struct Image {
    typ: ImageType,
    width: u32,
    height: u32,
    row_distance: usize,
    data: Vec<u8>,
}

impl Image {
    /// Allocates a zero filled image
    ///
    /// # Example
    ///
    /// ```
    /// use wgcam::image::{Image, ImageType};
    /// let img = Image::new(4, 2, ImageType::Rgb);
    /// assert_eq!(img.row_distance(), 12);
    /// assert_eq!(img.size(), 24);
    /// ```
    pub fn new(width: u32, height: u32, typ: ImageType) -> Self {
        let row_distance = width as usize * typ.bytes_per_pixel();
        Image {
            typ,
            width,
            height,
            row_distance,
            data: vec![0; row_distance * height as usize],
        }
    }

    /// Wraps an existing buffer, which must hold exactly one image
    pub fn from_buffer(width: u32, height: u32, typ: ImageType, data: Vec<u8>) -> Result<Self> {
        let row_distance = width as usize * typ.bytes_per_pixel();
        let expected = row_distance * height as usize;
        if data.len() != expected {
            return Err(Error::Invalid(format!(
                "{}x{} {} image needs {} bytes, got {}",
                width,
                height,
                typ,
                expected,
                data.len()
            )));
        }
        Ok(Image {
            typ,
            width,
            height,
            row_distance,
            data,
        })
    }

    pub fn typ(&self) -> ImageType {
        self.typ
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the starts of two consecutive rows
    pub fn row_distance(&self) -> usize {
        self.row_distance
    }

    pub fn components_per_pixel(&self) -> usize {
        self.typ.components_per_pixel()
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.typ.bytes_per_pixel()
    }

    /// Total size of the pixel storage in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Hands the pixel storage over, e.g. to a GUI pixel buffer
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Fails unless the image carries pixels of type `typ`
    pub fn expect_type(&self, typ: ImageType) -> Result<()> {
        if self.typ != typ {
            return Err(Error::Invalid(format!(
                "expected {} image, got {}",
                typ, self.typ
            )));
        }
        Ok(())
    }

    pub fn row(&self, row: u32) -> Option<&[u8]> {
        if row >= self.height {
            return None;
        }
        let start = row as usize * self.row_distance;
        Some(&self.data[start..start + self.row_distance])
    }

    pub fn row_mut(&mut self, row: u32) -> Option<&mut [u8]> {
        if row >= self.height {
            return None;
        }
        let start = row as usize * self.row_distance;
        Some(&mut self.data[start..start + self.row_distance])
    }

    /// Bytes of the pixel at (`row`, `col`)
    pub fn pixel(&self, row: u32, col: u32) -> Option<&[u8]> {
        if col >= self.width {
            return None;
        }
        let bpp = self.bytes_per_pixel();
        let start = col as usize * bpp;
        self.row(row).map(|r| &r[start..start + bpp])
    }

    pub fn pixel_mut(&mut self, row: u32, col: u32) -> Option<&mut [u8]> {
        if col >= self.width {
            return None;
        }
        let bpp = self.bytes_per_pixel();
        let start = col as usize * bpp;
        self.row_mut(row).map(|r| &mut r[start..start + bpp])
    }

    /// Iterates over rows, top to bottom
    pub fn rows(&self) -> std::slice::ChunksExact<'_, u8> {
        self.data.chunks_exact(self.row_distance.max(1))
    }

    pub fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, u8> {
        self.data.chunks_exact_mut(self.row_distance.max(1))
    }

    /// Iterates over pixels in row major order
    pub fn pixels(&self) -> std::slice::ChunksExact<'_, u8> {
        self.data.chunks_exact(self.bytes_per_pixel().max(1))
    }

    pub fn pixels_mut(&mut self) -> std::slice::ChunksExactMut<'_, u8> {
        let bpp = self.bytes_per_pixel().max(1);
        self.data.chunks_exact_mut(bpp)
    }

    /// Iterates over the pixels of column `col`, top to bottom
    pub fn column(&self, col: u32) -> Column<'_> {
        Column::new(self.view_all(), col)
    }

    /// The whole image as a view
    pub fn view_all(&self) -> ImageView<'_> {
        ImageView::new(
            self.typ,
            self.width,
            self.height,
            self.row_distance,
            &self.data,
        )
    }

    /// Zero copy window of `width` x `height` pixels starting at (`row`, `col`)
    pub fn view(&self, row: u32, col: u32, width: u32, height: u32) -> Result<ImageView<'_>> {
        if row.checked_add(height).map_or(true, |r| r > self.height)
            || col.checked_add(width).map_or(true, |c| c > self.width)
        {
            return Err(Error::Invalid(format!(
                "{}x{}+{}+{} exceeds {}x{} image",
                width, height, col, row, self.width, self.height
            )));
        }

        let start = row as usize * self.row_distance + col as usize * self.bytes_per_pixel();
        let end = if height == 0 {
            start
        } else {
            start
                + (height as usize - 1) * self.row_distance
                + width as usize * self.bytes_per_pixel()
        };
        Ok(ImageView::new(
            self.typ,
            width,
            height,
            self.row_distance,
            &self.data[start..end],
        ))
    }

    /// Copies a window into a new image
    pub fn subimage(&self, row: u32, col: u32, width: u32, height: u32) -> Result<Image> {
        Ok(self.view(row, col, width, height)?.to_image())
    }

    pub fn gray(&self, row: u32, col: u32) -> Option<u8> {
        debug_assert_eq!(self.typ, ImageType::Grayscale);
        self.pixel(row, col).map(|p| p[0])
    }

    pub fn set_gray(&mut self, row: u32, col: u32, value: u8) -> bool {
        debug_assert_eq!(self.typ, ImageType::Grayscale);
        match self.pixel_mut(row, col) {
            Some(p) => {
                p[0] = value;
                true
            }
            None => false,
        }
    }

    pub fn rgb(&self, row: u32, col: u32) -> Option<[u8; 3]> {
        debug_assert_eq!(self.typ, ImageType::Rgb);
        self.pixel(row, col).map(|p| [p[0], p[1], p[2]])
    }

    pub fn set_rgb(&mut self, row: u32, col: u32, rgb: [u8; 3]) -> bool {
        debug_assert_eq!(self.typ, ImageType::Rgb);
        match self.pixel_mut(row, col) {
            Some(p) => {
                p.copy_from_slice(&rgb);
                true
            }
            None => false,
        }
    }

    pub fn hsv(&self, row: u32, col: u32) -> Option<Hsv> {
        debug_assert_eq!(self.typ, ImageType::Hsv);
        self.pixel(row, col).map(Hsv::from_ne_bytes)
    }

    pub fn set_hsv(&mut self, row: u32, col: u32, hsv: Hsv) -> bool {
        debug_assert_eq!(self.typ, ImageType::Hsv);
        match self.pixel_mut(row, col) {
            Some(p) => {
                hsv.write_ne_bytes(p);
                true
            }
            None => false,
        }
    }

    /// Vote count of an accumulator pixel
    pub fn votes(&self, row: u32, col: u32) -> Option<u32> {
        debug_assert_eq!(self.typ, ImageType::Accumulator);
        self.pixel(row, col).map(read_u32)
    }

    /// Adds one vote to an accumulator pixel, saturating
    pub fn vote(&mut self, row: u32, col: u32) -> bool {
        debug_assert_eq!(self.typ, ImageType::Accumulator);
        match self.pixel_mut(row, col) {
            Some(p) => {
                let votes = read_u32(p).saturating_add(1);
                p.copy_from_slice(&votes.to_ne_bytes());
                true
            }
            None => false,
        }
    }

    /// Packed BGRX value `r << 16 | g << 8 | b`
    pub fn bgrx(&self, row: u32, col: u32) -> Option<u32> {
        debug_assert_eq!(self.typ, ImageType::Bgrx);
        self.pixel(row, col).map(read_u32)
    }
}

pub(crate) fn read_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_ne_bytes(raw)
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("typ", &self.typ)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("row_distance", &self.row_distance)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: u32, height: u32) -> Image {
        let data = (0..width * height).map(|v| v as u8).collect();
        Image::from_buffer(width, height, ImageType::Grayscale, data).unwrap()
    }

    #[test]
    fn rows_are_spaced_by_row_distance() {
        let img = numbered(4, 3);
        assert_eq!(img.row(1).unwrap(), &[4, 5, 6, 7]);
        assert!(img.row(3).is_none());
        assert_eq!(img.rows().count(), 3);
        assert_eq!(img.gray(2, 3), Some(11));
        assert_eq!(img.pixel(0, 4), None);
    }

    #[test]
    fn column_iterator() {
        let img = numbered(4, 3);
        let col: Vec<u8> = img.column(2).map(|p| p[0]).collect();
        assert_eq!(col, vec![2, 6, 10]);
        assert_eq!(img.column(4).count(), 0);
    }

    #[test]
    fn subimage_is_a_window() {
        let img = numbered(4, 4);
        let view = img.view(1, 1, 2, 2).unwrap();
        assert_eq!(view.row(0).unwrap(), &[5, 6]);
        assert_eq!(view.row(1).unwrap(), &[9, 10]);

        let copy = img.subimage(1, 1, 2, 2).unwrap();
        assert_eq!(copy.as_bytes(), &[5, 6, 9, 10]);
        assert!(img.view(3, 3, 2, 2).is_err());
    }

    #[test]
    fn from_buffer_checks_size() {
        assert!(Image::from_buffer(2, 2, ImageType::Rgb, vec![0; 11]).is_err());
        let img = Image::from_buffer(2, 2, ImageType::Rgb, vec![0; 12]).unwrap();
        assert_eq!(img.components_per_pixel(), 3);
    }

    #[test]
    fn typed_accessors() {
        let mut acc = Image::new(2, 2, ImageType::Accumulator);
        assert!(acc.vote(1, 0));
        assert!(acc.vote(1, 0));
        assert!(!acc.vote(2, 0));
        assert_eq!(acc.votes(1, 0), Some(2));

        let mut hsv = Image::new(1, 1, ImageType::Hsv);
        let px = Hsv::new(120.0, 0.5, 0.25);
        assert!(hsv.set_hsv(0, 0, px));
        assert_eq!(hsv.hsv(0, 0), Some(px));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let img = Image::new(1, 1, ImageType::Rgb);
        assert!(img.expect_type(ImageType::Rgb).is_ok());
        assert!(matches!(
            img.expect_type(ImageType::Grayscale),
            Err(Error::Invalid(_))
        ));
    }
}
