mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use wgcam::config::SensorOptions;
use wgcam::sensor::{Event, Payload, SensorState};
use wgcam::{Camera, CameraState, Error, FourCC, Mode, OpenFlags, Sensor};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

/// Black macropixel
const DARK: [u8; 4] = [16, 128, 16, 128];
/// Macropixel decoding to an orange red of about 15 degrees hue
const BALL: [u8; 4] = [82, 80, 82, 255];

fn scene(row: u32, col: u32, radius: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 2) as usize);
    for r in 0..HEIGHT {
        for c in (0..WIDTH).step_by(2) {
            let dr = r as f32 - row as f32;
            let dc = c as f32 + 0.5 - col as f32;
            let inside = dr * dr + dc * dc <= (radius * radius) as f32;
            data.extend_from_slice(if inside { &BALL } else { &DARK });
        }
    }
    data
}

fn camera(dev: &SimDevice) -> Camera<SimDevice> {
    let mut cam = Camera::init("/dev/video7").unwrap();
    cam.open_with(dev.clone(), Mode::ReadWrite, OpenFlags::ENABLE_DECOMPRESSOR)
        .unwrap();
    cam.set_resolution(WIDTH, HEIGHT).unwrap();
    cam
}

fn options() -> SensorOptions {
    SensorOptions {
        background_frames: 3,
        ..SensorOptions::default()
    }
}

type Log = Arc<Mutex<Vec<Event>>>;

fn record(sensor: &mut Sensor<SimDevice>, log: &Log, events: &[Event]) {
    for &event in events {
        let log = Arc::clone(log);
        sensor
            .set_callback(event, move |_| log.lock().unwrap().push(event))
            .unwrap();
    }
}

fn wait_for(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for the sensor");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn tracks_ball_against_background() {
    let dev = SimDevice::new(CAP_READWRITE);
    {
        let mut state = dev.state();
        state.pattern = DARK.to_vec();
        state.scene = Some(scene(24, 32, 12));
        state.scene_after = 3;
    }

    let mut sensor = Sensor::new(camera(&dev), options());
    let log: Log = Arc::default();
    record(
        &mut sensor,
        &log,
        &[
            Event::SetupStart,
            Event::SetupStop,
            Event::Enter,
            Event::Image,
            Event::Exit,
        ],
    );
    let positions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&positions);
    sensor
        .set_callback(Event::Position, move |payload| {
            if let Payload::Position { row, col, votes } = payload {
                sink.lock().unwrap().push((row, col, votes));
            }
        })
        .unwrap();

    sensor.start().unwrap();
    assert_eq!(sensor.state(), SensorState::Started);
    assert!(matches!(
        sensor.set_callback(Event::Image, |_| {}),
        Err(Error::State(_))
    ));
    wait_for(|| !positions.lock().unwrap().is_empty());
    sensor.stop().unwrap();
    assert_eq!(sensor.state(), SensorState::Stopped);

    let (row, col, votes) = positions.lock().unwrap()[0];
    assert!(votes >= options().min_votes);
    assert!((row as i32 - 24).abs() <= 2, "row {}", row);
    assert!((col as i32 - 32).abs() <= 2, "col {}", col);

    // the background is black, its luma is zero everywhere
    let background = sensor.background().unwrap();
    assert_eq!((background.width(), background.height()), (WIDTH, HEIGHT));
    assert!(background.as_bytes().iter().all(|&v| v == 0));

    let log = log.lock().unwrap();
    assert_eq!(
        &log[..3],
        &[Event::SetupStart, Event::SetupStop, Event::Enter]
    );
    assert_eq!(log.last(), Some(&Event::Exit));
    assert!(log.contains(&Event::Image));
    drop(log);

    let cam = sensor.into_camera().unwrap();
    assert_eq!(cam.state(), CameraState::Closed);
}

#[test]
fn static_scene_reports_nothing() {
    let dev = SimDevice::new(CAP_READWRITE);
    dev.state().pattern = DARK.to_vec();

    let mut sensor = Sensor::new(camera(&dev), options());
    let log: Log = Arc::default();
    record(&mut sensor, &log, &[Event::ImageAccumulator, Event::Position]);

    sensor.start().unwrap();
    wait_for(|| log.lock().unwrap().len() >= 5);
    sensor.stop().unwrap();

    assert!(!log.lock().unwrap().contains(&Event::Position));
}

#[test]
fn undecodable_setup_reports_error() {
    let dev = SimDevice::new(CAP_STREAMING);
    dev.state().format.pixelformat = FourCC::MJPG.into();
    let mut cam = Camera::init("/dev/video7").unwrap();
    cam.open_with(dev.clone(), Mode::Unset, OpenFlags::empty())
        .unwrap();
    assert_eq!(cam.get_decompressor().unwrap().fourcc(), FourCC::MJPG);

    let mut sensor = Sensor::new(cam, options());
    let log: Log = Arc::default();
    record(
        &mut sensor,
        &log,
        &[Event::SetupStart, Event::SetupError, Event::Enter],
    );

    sensor.start().unwrap();
    sensor.join().unwrap();
    assert_eq!(sensor.state(), SensorState::Stopped);
    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::SetupStart, Event::SetupError]
    );

    // every mapped ring buffer was released on the way out
    assert_eq!(dev.unmaps(), dev.state().maps);
    assert!(matches!(sensor.stop(), Err(Error::State(_))));
}

#[test]
fn stop_requires_running_sensor() {
    let dev = SimDevice::new(CAP_READWRITE);
    let mut sensor = Sensor::new(camera(&dev), options());
    assert!(matches!(sensor.stop(), Err(Error::State(_))));
    assert!(matches!(sensor.join(), Err(Error::State(_))));
    assert_eq!(sensor.into_camera().unwrap().state(), CameraState::Stopped);
}
