//! Webcam capture and ball tracking on top of video4linux
//!
//! A [`Camera`] negotiates a pixelformat it can decode, binds either the mmap'd streaming
//! ring or blocking read(2) capture and hands out [`Frame`]s. Frames decode into
//! [`Image`]s, which the [`codec`] and [`detect`] modules convert and search for circles.
//! The [`sensor`] module runs that pipeline on a worker thread.
//!
//! ```no_run
//! use wgcam::{Camera, Frame, Mode, OpenFlags};
//!
//! let mut cam: Camera = Camera::init("/dev/video0").unwrap();
//! cam.open(Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR).unwrap();
//! cam.start().unwrap();
//!
//! let mut frame = Frame::new();
//! cam.read(&mut frame).unwrap();
//! let img = cam.decompress(&frame).unwrap();
//! cam.discard_frame(&mut frame).unwrap();
//! println!("{}x{} {}", img.width(), img.height(), img.typ());
//!
//! cam.free_frame(&mut frame).unwrap();
//! cam.close().unwrap();
//! ```

pub mod v4l2;

mod capability;
pub use capability::{Capabilities, Capability, DeviceCapabilities};

pub mod camera;
pub use camera::{select_frame, Camera, CameraState, OpenFlags, DEV_PATH_MAX};

pub mod capture;
pub use capture::Mode;

pub mod codec;
pub mod config;
pub mod detect;

pub mod device;
pub use device::{Device, Handle};

mod error;
pub use error::{Error, Result};

pub mod format;
pub use format::{Format, FourCC};

mod frame;
pub use frame::{Frame, FrameState};

pub mod image;
pub use image::{Image, ImageType};

pub mod logging;

mod memory;
pub use memory::Mmap;

pub mod selector;
pub use selector::Decompressor;

pub mod sensor;
pub use sensor::Sensor;

mod timestamp;
pub use timestamp::Timestamp;
