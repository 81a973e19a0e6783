//! Arcap demo recorder
//!
//! Records a synthetic camera feed through the full pipeline: NV12 frames are
//! delivered at irregular intervals, converted, paced, encoded to `.mov` and
//! remuxed to `.mp4`.
//!
//! Usage:
//!   arcap [--seconds <n>] [--width <w>] [--height <h>] [--fps <fps>] [--portrait] [--verbose]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arcap_lib::container::GstWriterFactory;
use arcap_lib::transcode::{GstRemuxTranscoder, NoopTranscoder, Transcoder};
use arcap_lib::{
    gstreamer_init, DeviceClass, IngestOutcome, LatestFrameSource, Orientation, PixelFormat,
    RawFrame, RecorderSettings, RecordingSession, StartOptions,
};

const DEFAULT_SECONDS: u64 = 5;
/// Camera sensor size of the synthetic feed
const SENSOR_WIDTH: u32 = 1280;
const SENSOR_HEIGHT: u32 = 720;
/// Camera delivery intervals in ms, cycled to mimic an uneven ~30fps AR feed
const DELIVERY_JITTER_MS: [u64; 7] = [33, 30, 41, 28, 36, 50, 25];

fn arg_value<T: std::str::FromStr>(args: &[String], name: &str) -> Option<T> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse::<T>().ok())
}

/// Moving diagonal gradient with a bright bar sweeping across
fn test_pattern(frame_index: u64, capture_time: Duration) -> RawFrame {
    let (w, h) = (SENSOR_WIDTH as usize, SENSOR_HEIGHT as usize);
    let mut data = vec![0u8; PixelFormat::Nv12FullRange.buffer_size(SENSOR_WIDTH, SENSOR_HEIGHT)];
    let bar = (frame_index as usize * 8) % w;

    let (luma, chroma) = data.split_at_mut(w * h);
    for (y, row) in luma.chunks_exact_mut(w).enumerate() {
        for (x, px) in row.iter_mut().enumerate() {
            *px = if x.abs_diff(bar) < 12 {
                235
            } else {
                ((x + y + frame_index as usize) % 200) as u8 + 16
            };
        }
    }
    for (i, pair) in chroma.chunks_exact_mut(2).enumerate() {
        let x = i % (w / 2);
        pair[0] = (96 + x % 64) as u8;
        pair[1] = (160 - (frame_index as usize % 64)) as u8;
    }

    RawFrame::new(data, PixelFormat::Nv12FullRange, SENSOR_WIDTH, SENSOR_HEIGHT, capture_time)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let verbose = args.iter().any(|a| a == "--verbose");
    let seconds = arg_value(&args, "--seconds").unwrap_or(DEFAULT_SECONDS);
    let options = StartOptions {
        width: arg_value(&args, "--width"),
        height: arg_value(&args, "--height"),
        fps: arg_value(&args, "--fps"),
    };
    let orientation = if args.iter().any(|a| a == "--portrait") {
        Orientation::Portrait
    } else {
        Orientation::LandscapeRight
    };

    arcap_lib::init_logging(if verbose { "debug" } else { "info" });

    // On Windows, attach to parent console for output
    #[cfg(windows)]
    unsafe {
        use windows_sys::Win32::System::Console::{AttachConsole, ATTACH_PARENT_PROCESS};
        AttachConsole(ATTACH_PARENT_PROCESS);
    }

    gstreamer_init::init_gstreamer_env();
    if !gstreamer_init::is_gstreamer_available() {
        anyhow::bail!("GStreamer is not available");
    }

    let settings = RecorderSettings::load_or_default();
    println!("\n=== Arcap Demo Recorder ===\n");
    println!("  Sensor:   {}x{} ({:?})", SENSOR_WIDTH, SENSOR_HEIGHT, orientation);
    println!("  Duration: {}s", seconds);
    println!("  Output:   {}", settings.resolved_output_dir().display());

    let source = Arc::new(LatestFrameSource::new(settings.frame_queue_depth, DeviceClass::Phone));
    source.set_orientation(orientation);

    let factory = GstWriterFactory::new();
    match factory.encoder() {
        Some(hw) => println!("  Encoder:  {} ({})\n", hw.display_name(), hw.element_name()),
        None => anyhow::bail!("No H.264 encoder found. Check the GStreamer installation."),
    }

    let transcoder: Arc<dyn Transcoder> = if settings.transcode_to_mp4 {
        Arc::new(GstRemuxTranscoder::new())
    } else {
        Arc::new(NoopTranscoder)
    };

    let session = Arc::new(RecordingSession::new(
        source.clone(),
        Arc::new(factory),
        transcoder,
        settings,
    ));

    // Camera delivery thread: push each frame, then ingest it like a frame callback would
    let running = Arc::new(AtomicBool::new(true));
    let camera = {
        let running = running.clone();
        let source = source.clone();
        let session = session.clone();
        std::thread::Builder::new().name("camera".into()).spawn(move || {
            let epoch = Instant::now();
            let mut index = 0u64;
            let mut outcomes = [0u64; 3];
            while running.load(Ordering::Relaxed) {
                source.push(test_pattern(index, epoch.elapsed()));
                match session.ingest() {
                    IngestOutcome::Appended(_) => outcomes[0] += 1,
                    IngestOutcome::NotReady | IngestOutcome::Busy => outcomes[1] += 1,
                    IngestOutcome::Dropped => outcomes[2] += 1,
                    IngestOutcome::Inactive | IngestOutcome::NoFrame => {}
                }
                let jitter = DELIVERY_JITTER_MS[index as usize % DELIVERY_JITTER_MS.len()];
                std::thread::sleep(Duration::from_millis(jitter));
                index += 1;
            }
            (index, outcomes)
        })?
    };

    // Let the first frame arrive before starting
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.start(options)?;

    tokio::time::sleep(Duration::from_secs(seconds)).await;
    let result = session.stop().await;

    running.store(false, Ordering::Relaxed);
    let (delivered, [appended, skipped, dropped]) = camera
        .join()
        .map_err(|_| anyhow::anyhow!("camera thread panicked"))?;

    println!(
        "\n  Delivered {} frames: {} appended, {} skipped, {} dropped",
        delivered, appended, skipped, dropped
    );
    match result {
        Some(path) => println!("  Saved: {}\n", path.display()),
        None => println!("  No recording produced\n"),
    }

    Ok(())
}
