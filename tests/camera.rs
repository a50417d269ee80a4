mod common;

use common::*;
use wgcam::{select_frame, Camera, CameraState, Error, FourCC, Frame, FrameState, Mode, OpenFlags};

fn open(dev: &SimDevice, mode: Mode, flags: OpenFlags) -> Camera<SimDevice> {
    let mut cam = Camera::init("/dev/video7").unwrap();
    cam.open_with(dev.clone(), mode, flags).unwrap();
    cam
}

#[test]
fn init_rejects_long_paths() {
    let long = format!("/dev/{}", "v".repeat(wgcam::DEV_PATH_MAX));
    assert!(matches!(
        Camera::<SimDevice>::init(long),
        Err(Error::PathTooLong { .. })
    ));
}

#[test]
fn closed_camera_refuses_everything() {
    let mut cam: Camera<SimDevice> = Camera::init("/dev/video7").unwrap();
    let mut frame = Frame::new();

    assert_eq!(cam.state(), CameraState::Closed);
    assert!(matches!(cam.start(), Err(Error::State(_))));
    assert!(matches!(cam.stop(), Err(Error::State(_))));
    assert!(matches!(cam.close(), Err(Error::State(_))));
    assert!(matches!(cam.read(&mut frame), Err(Error::State(_))));
    assert!(matches!(cam.capabilities(), Err(Error::State(_))));
    assert!(matches!(cam.resolution(), Err(Error::State(_))));
    assert!(matches!(cam.set_resolution(320, 240), Err(Error::State(_))));
    assert!(matches!(cam.select_decompressor(), Err(Error::State(_))));
    assert!(matches!(select_frame(&[&cam], 0), Err(Error::State(_))));
    assert_eq!(cam.mode(), Mode::Unset);
}

#[test]
fn open_reports_device() {
    let dev = SimDevice::new(CAP_STREAMING | CAP_READWRITE);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::empty());

    assert_eq!(cam.state(), CameraState::Stopped);
    assert_eq!(cam.mode(), Mode::Streaming);
    assert_eq!(cam.capabilities().unwrap().card, "Sim camera");
    assert_eq!(cam.resolution().unwrap(), (16, 8));
    // the current format is paired without negotiation
    assert_eq!(cam.get_decompressor().unwrap().fourcc(), FourCC::YUYV);

    let formats: Vec<FourCC> = cam.formats().unwrap().iter().map(|d| d.fourcc).collect();
    assert_eq!(formats, vec![FourCC::YUYV, FourCC::MJPG]);

    let again = cam.open_with(dev.clone(), Mode::Unset, OpenFlags::empty());
    assert!(matches!(again, Err(Error::State(_))));

    cam.close().unwrap();
    assert_eq!(cam.state(), CameraState::Closed);
    assert!(cam.capabilities().is_err());
}

#[test]
fn rejected_format_falls_through_to_next_decompressor() {
    let dev = SimDevice::new(CAP_STREAMING);
    dev.state()
        .substitutes
        .push((FourCC::YUYV, FourCC::new(b"RGB3")));

    let cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);

    let decompressor = cam.get_decompressor().unwrap();
    assert_eq!(decompressor.fourcc(), FourCC::MJPG);
    assert_eq!(cam.format().unwrap().fourcc, FourCC::MJPG);
    assert_eq!(
        decompressor,
        wgcam::selector::get_decompressor(FourCC::MJPG).unwrap()
    );
}

#[test]
fn busy_device_aborts_negotiation() {
    let dev = SimDevice::new(CAP_STREAMING);
    dev.state().busy = true;

    let mut cam: Camera<SimDevice> = Camera::init("/dev/video7").unwrap();
    let res = cam.open_with(dev.clone(), Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    assert!(matches!(res, Err(Error::Busy)));
    assert_eq!(cam.state(), CameraState::Closed);
}

#[test]
fn user_decompressor_needs_registered_format() {
    let dev = SimDevice::new(CAP_STREAMING);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::empty());

    let res = cam.select_user_decompressor(FourCC::new(b"H264"));
    assert!(matches!(res, Err(Error::NotSupported(_))));

    let mjpeg = cam.select_user_decompressor(FourCC::MJPG).unwrap();
    assert_eq!(mjpeg.fourcc(), FourCC::MJPG);
    assert_eq!(cam.get_decompressor().unwrap(), mjpeg);
}

#[test]
fn set_resolution_keeps_driver_choice() {
    let dev = SimDevice::new(CAP_STREAMING);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);

    cam.set_resolution(321, 240).unwrap();
    assert_eq!(cam.resolution().unwrap(), (320, 240));
    assert_eq!(cam.format().unwrap().size, 320 * 240 * 2);

    cam.start().unwrap();
    assert!(matches!(cam.set_resolution(64, 48), Err(Error::State(_))));
}

#[test]
fn readwrite_device_never_maps() {
    let dev = SimDevice::new(CAP_READWRITE);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    assert_eq!(cam.mode(), Mode::ReadWrite);

    cam.start().unwrap();
    let mut frame = Frame::new();
    for _ in 0..3 {
        cam.read(&mut frame).unwrap();
        assert_eq!(frame.len(), 16 * 8 * 2);
        let img = cam.decompress(&frame).unwrap();
        assert_eq!((img.width(), img.height()), (16, 8));
        cam.discard_frame(&mut frame).unwrap();
    }
    cam.free_frame(&mut frame).unwrap();
    cam.close().unwrap();

    let state = dev.state();
    assert_eq!(state.reads, 3);
    assert_eq!(state.maps, 0);
    assert_eq!(state.requested, 0);
}

#[test]
fn streaming_hint_falls_back_to_readwrite() {
    let dev = SimDevice::new(CAP_READWRITE);
    let cam = open(&dev, Mode::Streaming, OpenFlags::empty());
    assert_eq!(cam.mode(), Mode::ReadWrite);
}

#[test]
fn readwrite_hint_is_honoured() {
    let dev = SimDevice::new(CAP_STREAMING | CAP_READWRITE);
    let cam = open(&dev, Mode::ReadWrite, OpenFlags::empty());
    assert_eq!(cam.mode(), Mode::ReadWrite);
}

#[test]
fn device_without_io_is_rejected() {
    let dev = SimDevice::new(0);
    let mut cam: Camera<SimDevice> = Camera::init("/dev/video7").unwrap();
    let res = cam.open_with(dev, Mode::Unset, OpenFlags::empty());
    assert!(matches!(res, Err(Error::NotSupported(_))));
    assert_eq!(cam.state(), CameraState::Closed);
}

#[test]
fn frame_state_machine() {
    let dev = SimDevice::new(CAP_STREAMING);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    let mut frame = Frame::new();

    assert!(matches!(cam.discard_frame(&mut frame), Err(Error::State(_))));
    assert!(matches!(cam.free_frame(&mut frame), Err(Error::State(_))));
    assert!(matches!(cam.read(&mut frame), Err(Error::State(_))));

    cam.start().unwrap();
    cam.read(&mut frame).unwrap();
    assert_eq!(frame.state(), FrameState::Full);
    assert_eq!(frame.sequence(), 1);
    assert!(cam.frame_data(&frame).unwrap().iter().all(|&b| b == 1));
    assert!(matches!(cam.read(&mut frame), Err(Error::State(_))));

    cam.discard_frame(&mut frame).unwrap();
    assert_eq!(frame.state(), FrameState::Empty);
    assert!(matches!(cam.frame_data(&frame), Err(Error::State(_))));
    // discarding twice is harmless
    cam.discard_frame(&mut frame).unwrap();

    cam.read(&mut frame).unwrap();
    assert!(cam.frame_data(&frame).unwrap().iter().all(|&b| b == 2));
    cam.free_frame(&mut frame).unwrap();
    assert_eq!(frame.state(), FrameState::Invalid);
    assert!(frame.is_empty());
}

#[test]
fn streaming_conserves_buffers() {
    let dev = SimDevice::new(CAP_STREAMING);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    cam.start().unwrap();
    assert_eq!(dev.state().maps, 5);
    assert_eq!(dev.state().queued.len(), 5);

    let mut a = Frame::new();
    let mut b = Frame::new();
    for _ in 0..7 {
        cam.read(&mut a).unwrap();
        cam.read(&mut b).unwrap();
        assert_eq!(dev.state().queued.len(), 3);
        cam.discard_frame(&mut a).unwrap();
        cam.discard_frame(&mut b).unwrap();
        assert_eq!(dev.state().queued.len(), 5);
    }

    // a frame still full when capture stops loses its buffer
    cam.read(&mut a).unwrap();
    cam.stop().unwrap();
    assert_eq!(dev.unmaps(), 5);
    assert_eq!(dev.state().requested, 0);
    cam.free_frame(&mut a).unwrap();
    cam.free_frame(&mut b).unwrap();

    // restarting maps a fresh ring
    cam.start().unwrap();
    assert_eq!(dev.state().maps, 10);
    cam.close().unwrap();
    assert_eq!(dev.unmaps(), 10);
}

#[test]
fn stingy_driver_fails_start() {
    let dev = SimDevice::new(CAP_STREAMING);
    dev.state().max_buffers = 1;
    let mut cam = open(&dev, Mode::Unset, OpenFlags::empty());

    assert!(matches!(cam.start(), Err(Error::Failure(_))));
    assert_eq!(cam.state(), CameraState::Stopped);
    assert_eq!(dev.state().maps, 0);
    assert_eq!(dev.state().requested, 0);
}

#[test]
fn select_frame_waits_for_readiness() {
    let pipe = Pipe::new();
    let dev = SimDevice::new(CAP_STREAMING);
    dev.state().fd = pipe.read;
    let cam = open(&dev, Mode::Unset, OpenFlags::empty());

    assert!(matches!(select_frame(&[&cam], 10), Err(Error::Timeout)));
    pipe.signal();
    assert_eq!(select_frame(&[&cam], 10).unwrap(), vec![true]);
}

#[test]
fn frame_outliving_the_ring_is_orphaned() {
    let dev = SimDevice::new(CAP_STREAMING);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    let mut frame = Frame::new();

    cam.start().unwrap();
    cam.read(&mut frame).unwrap();
    cam.stop().unwrap();
    assert!(matches!(cam.frame_data(&frame), Err(Error::State(_))));

    cam.start().unwrap();
    assert_eq!(dev.state().queued.len(), 5);
    // the old descriptor must not alias a buffer of the new ring
    assert!(matches!(cam.frame_data(&frame), Err(Error::State(_))));

    cam.free_frame(&mut frame).unwrap();
    assert_eq!(frame.state(), FrameState::Invalid);
    assert!(!frame.has_buffer());
    assert_eq!(dev.state().queued.len(), 5);

    cam.read(&mut frame).unwrap();
    assert_eq!(dev.state().queued.len(), 4);
    cam.discard_frame(&mut frame).unwrap();
    assert_eq!(dev.state().queued.len(), 5);
}

#[test]
fn stale_frame_discard_skips_the_driver() {
    let dev = SimDevice::new(CAP_STREAMING);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    let mut frame = Frame::new();

    cam.start().unwrap();
    cam.read(&mut frame).unwrap();
    cam.stop().unwrap();
    cam.start().unwrap();

    cam.discard_frame(&mut frame).unwrap();
    assert_eq!(frame.state(), FrameState::Empty);
    assert_eq!(dev.state().queued.len(), 5);

    cam.read(&mut frame).unwrap();
    assert_eq!(frame.state(), FrameState::Full);
    assert!(cam.frame_data(&frame).unwrap().iter().all(|&b| b == 1));
}

#[test]
fn readwrite_errors_are_classified() {
    let dev = SimDevice::new(CAP_READWRITE);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    cam.start().unwrap();

    let mut frame = Frame::new();
    cam.read(&mut frame).unwrap();
    cam.discard_frame(&mut frame).unwrap();

    // EIO may be retried, the heap buffer survives
    dev.state().read_errno = Some(libc::EIO);
    assert!(matches!(cam.read(&mut frame), Err(Error::Io(_))));
    assert_eq!(frame.state(), FrameState::Empty);
    assert!(frame.has_buffer());
    assert_eq!(frame.len(), 0);

    cam.read(&mut frame).unwrap();
    assert_eq!(frame.len(), 16 * 8 * 2);
    cam.discard_frame(&mut frame).unwrap();

    // anything else is final and drops the buffer
    dev.state().read_errno = Some(libc::ENODEV);
    assert!(matches!(cam.read(&mut frame), Err(Error::Failure(_))));
    assert_eq!(frame.state(), FrameState::Empty);
    assert!(!frame.has_buffer());
    assert_eq!(frame.len(), 0);

    cam.read(&mut frame).unwrap();
    assert_eq!(frame.len(), 16 * 8 * 2);
    assert_eq!(dev.state().reads, 3);
}

#[test]
fn bogus_dequeue_is_rejected() {
    let dev = SimDevice::new(CAP_STREAMING);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    cam.start().unwrap();

    let mut frame = Frame::new();
    dev.state().dequeue_index = Some(7);
    assert!(matches!(cam.read(&mut frame), Err(Error::Invalid(_))));
    assert_eq!(frame.state(), FrameState::Invalid);

    cam.read(&mut frame).unwrap();
    assert!(cam.frame_data(&frame).unwrap().iter().all(|&b| b == 1));

    // buffer 0 is still held by `frame`
    let mut other = Frame::new();
    dev.state().dequeue_index = Some(0);
    assert!(matches!(cam.read(&mut other), Err(Error::Invalid(_))));
    assert_eq!(other.state(), FrameState::Invalid);

    cam.discard_frame(&mut frame).unwrap();
    assert_eq!(dev.state().queued.len(), 5);
}

#[test]
fn frame_outliving_the_camera_can_be_freed() {
    let dev = SimDevice::new(CAP_READWRITE);
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    cam.start().unwrap();

    let mut frame = Frame::new();
    cam.read(&mut frame).unwrap();
    cam.discard_frame(&mut frame).unwrap();
    cam.close().unwrap();

    cam.free_frame(&mut frame).unwrap();
    assert_eq!(frame.state(), FrameState::Invalid);
    assert!(!frame.has_buffer());
    assert!(matches!(cam.free_frame(&mut frame), Err(Error::State(_))));
}

#[test]
fn padded_lines_decode_without_shear() {
    let dev = SimDevice::new(CAP_READWRITE);
    dev.state().padding = 8;
    let mut cam = open(&dev, Mode::Unset, OpenFlags::ENABLE_DECOMPRESSOR);
    cam.set_resolution(16, 8).unwrap();
    assert_eq!(cam.format().unwrap().stride, 40);

    // black lines, the padding holds white macropixels
    let mut scene = Vec::new();
    for _ in 0..8 {
        for _ in 0..8 {
            scene.extend_from_slice(&[16, 128, 16, 128]);
        }
        for _ in 0..2 {
            scene.extend_from_slice(&[235, 128, 235, 128]);
        }
    }
    dev.state().scene = Some(scene);

    cam.start().unwrap();
    let mut frame = Frame::new();
    cam.read(&mut frame).unwrap();
    assert_eq!(frame.stride(), 40);

    let img = cam.decompress(&frame).unwrap();
    assert_eq!((img.width(), img.height()), (16, 8));
    assert!(img.as_bytes().iter().all(|&v| v == 0));
}
