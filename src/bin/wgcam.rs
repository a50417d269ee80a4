//! wgcam command line entrypoint

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use wgcam::config::Config;
use wgcam::sensor::{Event, Payload};
use wgcam::{logging, Camera, Error, Frame, FrameState, Image, ImageType, OpenFlags, Result, Sensor};

#[derive(Parser, Debug)]
#[command(
    name = "wgcam",
    version,
    about = "Webcam capture and ball tracking on video4linux"
)]
struct Cli {
    /// Optional configuration file. Defaults to wgcam.toml in cwd or the XDG config dir.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Override the device node (takes precedence over config file)
    #[arg(long, value_name = "PATH", global = true)]
    device: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print device capabilities and capture formats
    Info,

    /// Capture frames and store the last one as binary PPM
    Capture {
        /// Number of frames to capture
        #[arg(long, default_value_t = 1)]
        frames: u32,

        #[arg(long, short, value_name = "FILE", default_value = "frame.ppm")]
        output: PathBuf,
    },

    /// Run the tracking pipeline and print every reported position
    Track {
        /// Stop after this many seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("wgcam: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(device) = cli.device {
        config.camera.device = device;
    }
    logging::init(&config.logging)?;

    let mut camera = open_camera(&config)?;
    match cli.command {
        Command::Info => info_cmd(&camera),
        Command::Capture { frames, output } => capture_cmd(&mut camera, frames, &output),
        Command::Track { seconds } => track_cmd(camera, &config, Duration::from_secs(seconds)),
    }
}

/// Opens and configures the camera named in `config`
fn open_camera(config: &Config) -> Result<Camera> {
    let options = &config.camera;
    let pixelformat = options.pixelformat()?;

    // an explicit pixelformat replaces the table driven negotiation
    let flags = if options.decompressor && pixelformat.is_none() {
        OpenFlags::ENABLE_DECOMPRESSOR
    } else {
        OpenFlags::empty()
    };

    let mut camera = Camera::init(&options.device)?;
    camera.open(options.capture_mode()?, flags)?;

    if let Some(fourcc) = pixelformat {
        let decompressor = camera.select_user_decompressor(fourcc)?;
        info!("using {} decompressor", decompressor.name());
    }
    if let Some((width, height)) = options.resolution() {
        camera.set_resolution(width, height)?;
    }
    Ok(camera)
}

fn info_cmd(camera: &Camera) -> Result<()> {
    let caps = camera.capabilities()?;
    println!("Device: {}", camera.path().display());
    println!("{}", caps);

    println!("Capture mode: {}", camera.mode());
    println!("Active format:\n{}", camera.format()?);

    println!("Formats:");
    for desc in camera.formats()? {
        println!("{}", desc);
    }
    Ok(())
}

fn capture_cmd(camera: &mut Camera, frames: u32, output: &Path) -> Result<()> {
    camera.start()?;

    let mut frame = Frame::new();
    let mut last = None;
    let started = Instant::now();
    for _ in 0..frames.max(1) {
        match camera.read(&mut frame) {
            Ok(()) => {}
            Err(Error::Io(e)) => {
                warn!("retrying after I/O error: {}", e);
                continue;
            }
            Err(e) => return Err(e),
        }
        info!(
            "frame {}: {} bytes, timestamp {}",
            frame.sequence(),
            frame.len(),
            frame.timestamp()
        );
        let decoded = camera.decompress(&frame);
        camera.discard_frame(&mut frame)?;
        match decoded {
            Ok(img) => last = Some(img),
            Err(e) => warn!("cannot decode frame: {}", e),
        }
    }
    let elapsed = started.elapsed().as_secs_f64();
    info!("{:.1} fps", frames.max(1) as f64 / elapsed.max(f64::EPSILON));

    if frame.state() != FrameState::Invalid {
        camera.free_frame(&mut frame)?;
    }
    camera.stop()?;

    let img = last.ok_or_else(|| Error::Decode("no frame could be decoded".to_string()))?;
    write_ppm(&img, output)?;
    println!(
        "wrote {}x{} frame to {}",
        img.width(),
        img.height(),
        output.display()
    );
    Ok(())
}

fn write_ppm(img: &Image, path: &Path) -> Result<()> {
    img.expect_type(ImageType::Rgb)?;

    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{} {}\n255\n", img.width(), img.height())?;
    out.write_all(img.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn track_cmd(camera: Camera, config: &Config, duration: Duration) -> Result<()> {
    let mut sensor = Sensor::new(camera, config.sensor.clone());

    let (tx, rx) = mpsc::channel();
    sensor.set_callback(Event::Position, move |payload| {
        if let Payload::Position { row, col, votes } = payload {
            // the receiver only goes away once we are shutting down
            let _ = tx.send((row, col, votes));
        }
    })?;
    sensor.set_callback(Event::SetupStart, |_| info!("learning background"))?;
    sensor.set_callback(Event::SetupStop, |_| info!("background ready, tracking"))?;
    sensor.set_callback(Event::SetupError, |_| warn!("background setup failed"))?;

    sensor.start()?;
    let deadline = Instant::now() + duration;
    let stdout = io::stdout();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match rx.recv_timeout(remaining) {
            Ok((row, col, votes)) => {
                let mut out = stdout.lock();
                writeln!(out, "{} {} {}", row, col, votes)?;
            }
            Err(_) => break,
        }
    }

    match sensor.stop() {
        Ok(()) | Err(Error::State(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
