//! GStreamer initialization
//!
//! Initializes GStreamer exactly once per process and remembers whether it
//! worked, so writers and transcoders can fail fast instead of panicking on
//! element creation.

use std::sync::OnceLock;

static GSTREAMER_READY: OnceLock<bool> = OnceLock::new();

/// Initialize GStreamer (idempotent)
pub fn init_gstreamer_env() {
    GSTREAMER_READY.get_or_init(|| match gstreamer::init() {
        Ok(_) => {
            log::info!("GStreamer initialized successfully");
            log_gstreamer_version();
            true
        }
        Err(e) => {
            log::error!("Failed to initialize GStreamer: {}", e);
            log::error!("Recording and transcoding will not be available");
            false
        }
    });
}

/// Check if GStreamer is available and properly initialized
pub fn is_gstreamer_available() -> bool {
    init_gstreamer_env();
    GSTREAMER_READY.get().copied().unwrap_or(false)
}

fn log_gstreamer_version() {
    let (major, minor, micro, nano) = gstreamer::version();
    let nano_str = match nano {
        0 => String::new(),
        1 => " (CVS)".to_string(),
        2 => " (prerelease)".to_string(),
        _ => format!(" (nano: {})", nano),
    };
    log::info!("GStreamer version: {}.{}.{}{}", major, minor, micro, nano_str);
}
