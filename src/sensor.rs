//! Capture and tracking loop on a worker thread
//!
//! The worker starts the camera, averages a number of frames into a background model and
//! then runs the detection pipeline on every captured frame. Results leave the thread
//! through per-event callbacks. Stopping is cooperative: the request is checked once per
//! frame, an in-flight read always completes first.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::camera::{Camera, CameraState};
use crate::codec::{gray, hsv, rgb};
use crate::config::SensorOptions;
use crate::detect::{circle, edge, CircleDetector};
use crate::device::{Device, Handle};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameState};
use crate::image::Image;

/// What a callback is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Decoded RGB frame
    Image,
    /// Grayscale difference to the background
    ImageGray,
    /// Colour mask after noise reduction
    ImageSmooth,
    /// Thresholded edge image
    ImageEdge,
    /// Circle vote accumulator
    ImageAccumulator,
    SetupStart,
    SetupStop,
    SetupError,
    /// Worker entered the capture loop
    Enter,
    /// Worker left the capture loop
    Exit,
    /// Tracked object centre in frame coordinates
    Position,
}

/// Data handed to a callback
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    None,
    Image(&'a Image),
    Position { row: u32, col: u32, votes: u32 },
}

pub type Callback = Box<dyn FnMut(Payload<'_>) + Send>;

/// Run state of a [`Sensor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Stopped,
    Started,
}

struct Control {
    state: SensorState,
    complete_request: bool,
}

/// Stop handshake between the owner and the worker
struct Shared {
    control: Mutex<Control>,
    done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        // a panicking callback must not wedge stop()
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn finish(&self) {
        let mut control = self.lock();
        control.complete_request = false;
        control.state = SensorState::Stopped;
        self.done.notify_all();
    }
}

struct Callbacks(HashMap<Event, Callback>);

impl Callbacks {
    fn emit(&mut self, event: Event, payload: Payload<'_>) {
        if let Some(cb) = self.0.get_mut(&event) {
            cb(payload);
        }
    }
}

/// Everything the worker thread owns
struct Worker<D: Device> {
    camera: Camera<D>,
    options: SensorOptions,
    callbacks: Callbacks,
    detector: CircleDetector,
    background: Option<Image>,
}

/// Tracks a coloured ball seen by one camera
pub struct Sensor<D: Device = Handle> {
    shared: Arc<Shared>,
    idle: Option<Worker<D>>,
    thread: Option<JoinHandle<Worker<D>>>,
}

impl<D> Sensor<D>
where
    D: Device + Send + 'static,
    D::Mapping: Send,
{
    /// Wraps an opened camera, see [`Camera::open`]
    pub fn new(camera: Camera<D>, options: SensorOptions) -> Self {
        Sensor {
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    state: SensorState::Stopped,
                    complete_request: false,
                }),
                done: Condvar::new(),
            }),
            idle: Some(Worker {
                camera,
                options,
                callbacks: Callbacks(HashMap::new()),
                detector: CircleDetector::new(),
                background: None,
            }),
            thread: None,
        }
    }

    /// Registers the callback for `event`, replacing any earlier one
    ///
    /// Only possible while the sensor is not running.
    pub fn set_callback<F>(&mut self, event: Event, callback: F) -> Result<()>
    where
        F: FnMut(Payload<'_>) + Send + 'static,
    {
        let worker = self
            .idle
            .as_mut()
            .ok_or(Error::State("sensor is running"))?;
        worker.callbacks.0.insert(event, Box::new(callback));
        Ok(())
    }

    pub fn state(&self) -> SensorState {
        self.shared.lock().state
    }

    /// Background model built during setup, if any
    pub fn background(&self) -> Option<&Image> {
        self.idle.as_ref().and_then(|w| w.background.as_ref())
    }

    /// Spawns the worker
    pub fn start(&mut self) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::State("sensor is already running"));
        }
        let mut worker = self
            .idle
            .take()
            .ok_or(Error::State("sensor has no camera"))?;

        {
            let mut control = self.shared.lock();
            control.state = SensorState::Started;
            control.complete_request = false;
        }
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("wgcam-sensor".to_string())
            .spawn(move || {
                worker.run(&shared);
                shared.finish();
                worker
            });

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.finish();
                Err(Error::Failure(format!("cannot spawn sensor thread: {}", e)))
            }
        }
    }

    /// Asks the worker to leave its loop and waits until it did
    ///
    /// Fails if the sensor is not running. Returns once the worker has stopped the camera
    /// and the thread has been joined.
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut control = self.shared.lock();
            if control.state == SensorState::Stopped && self.thread.is_none() {
                return Err(Error::State("sensor is not running"));
            }
            control.complete_request = true;
            while control.state == SensorState::Started {
                control = self
                    .shared
                    .done
                    .wait(control)
                    .unwrap_or_else(|e| e.into_inner());
            }
        }
        self.join()
    }

    /// Waits for a worker that ends on its own, e.g. after a read error
    pub fn join(&mut self) -> Result<()> {
        let handle = self
            .thread
            .take()
            .ok_or(Error::State("sensor is not running"))?;
        let worker = handle
            .join()
            .map_err(|_| Error::Failure("sensor thread panicked".to_string()))?;
        self.idle = Some(worker);
        Ok(())
    }

    /// Gives the camera back, closed if the sensor ran
    pub fn into_camera(mut self) -> Result<Camera<D>> {
        if self.thread.is_some() {
            self.stop()?;
        }
        self.idle
            .take()
            .map(|w| w.camera)
            .ok_or(Error::State("sensor has no camera"))
    }
}

impl<D: Device> Drop for Sensor<D> {
    fn drop(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.shared.lock().complete_request = true;
            let _ = handle.join();
        }
    }
}

impl<D: Device> Worker<D> {
    fn run(&mut self, shared: &Shared) {
        if let Err(e) = self.camera.start() {
            error!("cannot start capture: {}", e);
            self.callbacks.emit(Event::SetupError, Payload::None);
            return;
        }

        let mut frame = Frame::new();
        self.callbacks.emit(Event::SetupStart, Payload::None);
        match self.setup(&mut frame) {
            Ok(background) => {
                self.background = Some(background);
                self.callbacks.emit(Event::SetupStop, Payload::None);
            }
            Err(e) => {
                error!("background setup failed: {}", e);
                self.callbacks.emit(Event::SetupError, Payload::None);
                self.shutdown(&mut frame);
                return;
            }
        }

        self.callbacks.emit(Event::Enter, Payload::None);
        loop {
            {
                let mut control = shared.lock();
                control.state = SensorState::Started;
                if control.complete_request {
                    debug!("stop requested");
                    break;
                }
            }

            if let Err(e) = self.camera.read(&mut frame) {
                error!("frame read failed: {}", e);
                break;
            }
            let decoded = self.camera.decompress(&frame);
            if let Err(e) = self.camera.discard_frame(&mut frame) {
                error!("cannot hand frame back: {}", e);
                break;
            }

            match decoded {
                Ok(img) => {
                    self.callbacks.emit(Event::Image, Payload::Image(&img));
                    if let Err(e) = self.track(&img) {
                        warn!("tracking failed: {}", e);
                    }
                }
                Err(e) => warn!("dropping undecodable frame: {}", e),
            }
        }
        self.callbacks.emit(Event::Exit, Payload::None);
        self.shutdown(&mut frame);
    }

    fn shutdown(&mut self, frame: &mut Frame) {
        if frame.state() != FrameState::Invalid {
            if let Err(e) = self.camera.free_frame(frame) {
                warn!("free frame: {}", e);
            }
        }
        if self.camera.state() != CameraState::Closed {
            if let Err(e) = self.camera.close() {
                warn!("close camera: {}", e);
            }
        }
        info!("sensor stopped");
    }

    /// Averages the configured number of grayscale frames
    fn setup(&mut self, frame: &mut Frame) -> Result<Image> {
        let mut avg: Option<gray::Averager> = None;

        for _ in 0..self.options.background_frames.max(1) {
            self.camera.read(frame)?;
            let decoded = self.camera.decompress(frame);
            self.camera.discard_frame(frame)?;

            let gray = rgb::to_grayscale(&decoded?)?;
            avg.get_or_insert_with(|| gray::Averager::new(gray.width(), gray.height()))
                .add(&gray)?;
        }

        let background = avg
            .ok_or(Error::State("no background frames"))?
            .finish()?;
        info!(
            "background averaged over {} frames",
            self.options.background_frames.max(1)
        );
        Ok(background)
    }

    /// Runs the detection pipeline on one decoded frame
    fn track(&mut self, img: &Image) -> Result<()> {
        let opts = &self.options;

        let mut motion = rgb::to_grayscale(img)?;
        if let Some(background) = &self.background {
            gray::difference(&mut motion, background)?;
        }
        self.callbacks.emit(Event::ImageGray, Payload::Image(&motion));
        gray::threshold(&mut motion, opts.motion_threshold)?;

        let colours = hsv::to_hsv(img, opts.hsv_method)?;
        let mut mask = hsv::filter(&colours, &opts.hsv_bottom, &opts.hsv_top)?;
        for (m, &v) in mask.as_bytes_mut().iter_mut().zip(motion.as_bytes()) {
            *m &= v;
        }

        // every filter below shrinks the image, track the offset back to frame coordinates
        let mut offset = 0;
        if opts.noise_reduction {
            mask = gray::median(&mask)?;
            offset += 2;
            self.callbacks.emit(Event::ImageSmooth, Payload::Image(&mask));
        }

        let mut edges = edge::detect_edges(&mask)?;
        offset += 1;
        gray::threshold(&mut edges, opts.edge_threshold)?;
        self.callbacks.emit(Event::ImageEdge, Payload::Image(&edges));

        let acc = self.detector.detect(&edges)?;
        self.callbacks
            .emit(Event::ImageAccumulator, Payload::Image(&acc));

        let centre = circle::acc_max(&acc)?;
        if centre.votes >= self.options.min_votes {
            self.callbacks.emit(
                Event::Position,
                Payload::Position {
                    row: centre.row + offset,
                    col: centre.col + offset,
                    votes: centre.votes,
                },
            );
        }
        Ok(())
    }
}
