//! Object detection on grayscale masks
//!
//! Typical flow: HSV range mask, [`edge::detect_edges`], optional
//! [`threshold::hysteresis`], then [`circle::CircleDetector`] voting for circle centres.

pub mod circle;
pub mod draw;
pub mod edge;
pub mod threshold;

pub use circle::{Centre, CircleDetector};
