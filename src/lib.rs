// Arcap - AR camera-frame recorder
// Main library entry point

pub mod config;
pub mod container;
pub mod encoding;
pub mod frame;
pub mod recording;
pub mod source;
pub mod storage;
pub mod transcode;

#[cfg(feature = "gst")]
pub mod gstreamer_init;

pub use config::{DeviceClass, Orientation, RecorderSettings, RecordingConfig, StartOptions};
pub use frame::{EncodableFrame, MediaTime, PixelFormat, RawFrame};
pub use recording::{
    IngestOutcome, RecordingError, RecordingSession, RecordingState, RecordingStats,
};
pub use source::{FrameSource, LatestFrameSource};

/// Initialize logging with `env_logger`. `RUST_LOG` overrides `default_level`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(default_level: &str) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level)
    ).try_init();
}
