//! Order statistic over small fixed windows

use crate::image::Image;

/// Sorts `values` in place with insertion sort and returns the middle element
///
/// Windows are at most 25 samples, where insertion sort beats anything fancier.
pub fn median(values: &mut [u8]) -> u8 {
    for i in 1..values.len() {
        let key = values[i];
        let mut j = i;
        while j > 0 && values[j - 1] > key {
            values[j] = values[j - 1];
            j -= 1;
        }
        values[j] = key;
    }
    values.get(values.len() / 2).copied().unwrap_or(0)
}

/// Per byte median over a `size` x `size` window of an interleaved 8 bit image
///
/// The result shrinks by `size - 1` in both dimensions.
pub(crate) fn filter(src: &Image, size: u32) -> Image {
    let width = src.width().saturating_sub(size - 1);
    let height = src.height().saturating_sub(size - 1);
    let mut dst = Image::new(width, height, src.typ());
    if width == 0 || height == 0 {
        return dst;
    }

    let bpp = src.bytes_per_pixel();
    let stride = src.row_distance();
    let data = src.as_bytes();
    let mut window = vec![0u8; (size * size) as usize];

    for (row, out) in dst.rows_mut().enumerate() {
        for col in 0..width as usize {
            for ch in 0..bpp {
                let mut n = 0;
                for wr in row..row + size as usize {
                    for wc in col..col + size as usize {
                        window[n] = data[wr * stride + wc * bpp + ch];
                        n += 1;
                    }
                }
                out[col * bpp + ch] = median(&mut window);
            }
        }
    }
    dst
}
