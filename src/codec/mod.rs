//! Pixel format converters
//!
//! Every converter validates the type tag of its source and allocates a fresh destination
//! image. Sources are never modified, except by the in-place grayscale helpers that say so.

pub mod bgrx;
pub mod gray;
pub mod hsv;
pub mod jpeg;
pub mod median;
pub mod rgb;
pub mod yuyv;
