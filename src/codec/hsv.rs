//! Hue, saturation and value
//!
//! Hue is in degrees `[0, 360)`, saturation and value in `[0, 1]`. Three conversions are
//! offered, they agree on the semantics and differ in speed and exactness.

use std::f32::consts::{FRAC_PI_4, PI};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::bgrx;
use crate::error::{Error, Result};
use crate::image::{read_u32, Image, ImageType};

const F32_SIZE: usize = std::mem::size_of::<f32>();

/// One HSV pixel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub hue: f32,
    pub sat: f32,
    pub val: f32,
}

impl Hsv {
    pub const fn new(hue: f32, sat: f32, val: f32) -> Self {
        Hsv { hue, sat, val }
    }

    /// Reads a pixel stored as three native endian f32
    pub fn from_ne_bytes(bytes: &[u8]) -> Self {
        let component = |i: usize| {
            let mut raw = [0u8; F32_SIZE];
            raw.copy_from_slice(&bytes[i * F32_SIZE..(i + 1) * F32_SIZE]);
            f32::from_ne_bytes(raw)
        };
        Hsv::new(component(0), component(1), component(2))
    }

    pub fn write_ne_bytes(&self, bytes: &mut [u8]) {
        for (i, c) in [self.hue, self.sat, self.val].iter().enumerate() {
            bytes[i * F32_SIZE..(i + 1) * F32_SIZE].copy_from_slice(&c.to_ne_bytes());
        }
    }

    /// Whether the pixel lies inside the box spanned by `bottom` and `top`
    ///
    /// A `bottom` hue above the `top` hue selects a range wrapping through 0 degrees.
    pub fn within(&self, bottom: &Hsv, top: &Hsv) -> bool {
        let hue = if bottom.hue <= top.hue {
            self.hue >= bottom.hue && self.hue <= top.hue
        } else {
            self.hue >= bottom.hue || self.hue <= top.hue
        };
        hue && (bottom.sat..=top.sat).contains(&self.sat)
            && (bottom.val..=top.val).contains(&self.val)
    }
}

/// Conversion algorithm for [`to_hsv`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HsvMethod {
    /// max/min/delta derivation in single precision
    Reference,
    /// hexcone model in double precision
    Hexcone,
    /// fixed point saturation and value, approximated hue
    #[default]
    Fast,
}

impl FromStr for HsvMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reference" => Ok(HsvMethod::Reference),
            "hexcone" => Ok(HsvMethod::Hexcone),
            "fast" => Ok(HsvMethod::Fast),
            _ => Err(Error::Config(format!("unknown hsv method: {}", s))),
        }
    }
}

/// Classic max/min/delta conversion
pub fn reference([r, g, b]: [u8; 3]) -> Hsv {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if max == 0.0 {
        return Hsv::new(0.0, 0.0, 0.0);
    }
    if delta == 0.0 {
        return Hsv::new(0.0, 0.0, max);
    }

    let sector = if max == r {
        (g - b) / delta
    } else if max == g {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };
    let mut hue = sector * 60.0;
    if hue < 0.0 {
        hue += 360.0;
    }
    Hsv::new(hue % 360.0, delta / max, max)
}

/// Hexcone model, hue computed as a fraction of a turn
pub fn hexcone([r, g, b]: [u8; 3]) -> Hsv {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let (max, min) = if r > g {
        (r.max(b), g.min(b))
    } else {
        (g.max(b), r.min(b))
    };

    let val = max;
    let sat = if max != 0.0 { (max - min) / max } else { 0.0 };
    if sat == 0.0 {
        return Hsv::new(0.0, 0.0, val as f32);
    }

    let delta = max - min;
    let mut turn = if r == max {
        (g - b) / delta
    } else if g == max {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    } / 6.0;
    if turn < 0.0 {
        turn += 1.0;
    }
    if turn >= 1.0 {
        turn -= 1.0;
    }
    Hsv::new((turn * 360.0) as f32, sat as f32, val as f32)
}

/// Approximated `atan2(y, x)` in radians, about 0.1 degree worst case
pub fn atan2_fast(y: f32, x: f32) -> f32 {
    // offset keeps 0/0 out of the ratio
    let abs_y = y.abs() + 1e-10;
    let (r, base) = if x >= 0.0 {
        ((x - abs_y) / (x + abs_y), FRAC_PI_4)
    } else {
        ((x + abs_y) / (abs_y - x), 3.0 * FRAC_PI_4)
    };
    let angle = 0.1963 * r * r * r - 0.9817 * r + base;
    if y < 0.0 {
        -angle
    } else {
        angle
    }
}

/// Fixed point saturation and value, hue from the chroma plane projection
///
/// The projected hue stays within two degrees of the hexcone hue.
pub fn fast([r, g, b]: [u8; 3]) -> Hsv {
    let (ri, gi, bi) = (r as i32, g as i32, b as i32);
    let max = ri.max(gi).max(bi);
    if max == 0 {
        return Hsv::new(0.0, 0.0, 0.0);
    }
    let min = ri.min(gi).min(bi);

    // 16 bit fractions
    let sat = ((max - min) << 16) / max;
    let val = (max << 16) / 255;
    let (sat, val) = (sat as f32 / 65536.0, val as f32 / 65536.0);
    if max == min {
        return Hsv::new(0.0, 0.0, val);
    }

    let alpha = ((ri << 1) - gi - bi) as f32 * 0.5;
    let beta = (gi - bi) as f32 * (3f32.sqrt() * 0.5);
    let mut hue = atan2_fast(beta, alpha) * 180.0 / PI;
    if hue < 0.0 {
        hue += 360.0;
    }
    if hue >= 360.0 {
        hue -= 360.0;
    }
    Hsv::new(hue, sat, val)
}

/// Converts an RGB or BGRX image into an HSV image
pub fn to_hsv(img: &Image, method: HsvMethod) -> Result<Image> {
    let convert = match method {
        HsvMethod::Reference => reference,
        HsvMethod::Hexcone => hexcone,
        HsvMethod::Fast => fast,
    };

    let mut out = Image::new(img.width(), img.height(), ImageType::Hsv);
    match img.typ() {
        ImageType::Rgb => {
            for (src, dst) in img.pixels().zip(out.pixels_mut()) {
                convert([src[0], src[1], src[2]]).write_ne_bytes(dst);
            }
        }
        ImageType::Bgrx => {
            for (src, dst) in img.pixels().zip(out.pixels_mut()) {
                convert(bgrx::unpack(read_u32(src))).write_ne_bytes(dst);
            }
        }
        other => {
            return Err(Error::Invalid(format!(
                "cannot convert {} image to hsv",
                other
            )))
        }
    }
    Ok(out)
}

/// Grayscale mask, 255 where the pixel lies within `bottom..=top`, 0 elsewhere
pub fn filter(img: &Image, bottom: &Hsv, top: &Hsv) -> Result<Image> {
    img.expect_type(ImageType::Hsv)?;

    let mut mask = Image::new(img.width(), img.height(), ImageType::Grayscale);
    for (src, dst) in img.pixels().zip(mask.as_bytes_mut()) {
        *dst = if Hsv::from_ne_bytes(src).within(bottom, top) {
            255
        } else {
            0
        };
    }
    Ok(mask)
}
