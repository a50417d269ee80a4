use crate::image::{Image, ImageType};

/// Borrowed window into an [`Image`]
///
/// Rows keep the stride of the parent image, the view only narrows which bytes of each row
/// are visible.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    typ: ImageType,
    width: u32,
    height: u32,
    stride: usize,
    data: &'a [u8],
}

impl<'a> ImageView<'a> {
    pub(crate) fn new(
        typ: ImageType,
        width: u32,
        height: u32,
        stride: usize,
        data: &'a [u8],
    ) -> Self {
        ImageView {
            typ,
            width,
            height,
            stride,
            data,
        }
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

    fn row_len(&self) -> usize {
        self.width as usize * self.typ.bytes_per_pixel()
    }

    pub fn row(&self, row: u32) -> Option<&'a [u8]> {
        if row >= self.height {
            return None;
        }
        let start = row as usize * self.stride;
        self.data.get(start..start + self.row_len())
    }

    pub fn pixel(&self, row: u32, col: u32) -> Option<&'a [u8]> {
        if col >= self.width {
            return None;
        }
        let bpp = self.typ.bytes_per_pixel();
        let start = col as usize * bpp;
        self.row(row).map(|r| &r[start..start + bpp])
    }

    /// Iterates over the visible part of each row
    pub fn rows(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let view = *self;
        (0..view.height).filter_map(move |r| view.row(r))
    }

    /// Copies the window into a tightly packed image
    pub fn to_image(&self) -> Image {
        let mut img = Image::new(self.width, self.height, self.typ);
        for (dst, src) in img.rows_mut().zip(self.rows()) {
            dst.copy_from_slice(src);
        }
        img
    }
}

/// Iterator over the pixels of one column, top to bottom
pub struct Column<'a> {
    view: ImageView<'a>,
    col: u32,
    row: u32,
}

impl<'a> Column<'a> {
    pub(crate) fn new(view: ImageView<'a>, col: u32) -> Self {
        Column { view, col, row: 0 }
    }
}

impl<'a> Iterator for Column<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let pixel = self.view.pixel(self.row, self.col)?;
        self.row += 1;
        Some(pixel)
    }
}
