// Video codec and container format support
//
// Recordings use a single codec family (H.264). The intermediate file is a
// QuickTime movie; the delivery file is MP4 with the same stream remuxed.

#[cfg(feature = "gst")]
pub mod encoder;

#[cfg(feature = "gst")]
pub use encoder::{create_encoder, detect_best_encoder, HardwareEncoderType};

use serde::{Deserialize, Serialize};

/// Lower bound of the automatic bitrate range (bits per second)
pub const MIN_AUTO_BITRATE: u32 = 1_000_000;
/// Upper bound of the automatic bitrate range (bits per second)
pub const MAX_AUTO_BITRATE: u32 = 4_000_000;

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// QuickTime (.mov) - written while recording
    Mov,
    /// MP4 (.mp4) - delivery format after stop
    Mp4,
}

impl ContainerFormat {
    pub const ALL: [ContainerFormat; 2] = [ContainerFormat::Mov, ContainerFormat::Mp4];

    /// Get the file extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mov => "mov",
            ContainerFormat::Mp4 => "mp4",
        }
    }

    /// Get the GStreamer muxer element name
    pub fn gst_muxer(&self) -> &'static str {
        match self {
            ContainerFormat::Mov => "qtmux",
            ContainerFormat::Mp4 => "mp4mux",
        }
    }

    /// Get the GStreamer demuxer element name (both use the QuickTime demuxer)
    pub fn gst_demuxer(&self) -> &'static str {
        "qtdemux"
    }
}

/// Detect container from file extension
pub fn container_from_extension(ext: &str) -> Option<ContainerFormat> {
    match ext.to_lowercase().as_str() {
        "mov" | "qt" => Some(ContainerFormat::Mov),
        "mp4" | "m4v" => Some(ContainerFormat::Mp4),
        _ => None,
    }
}

/// H.264 profile written to the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum H264Profile {
    /// Constrained baseline - decodes everywhere, no B-frames
    Baseline,
    Main,
    High,
}

impl H264Profile {
    /// Value for the `profile` field of `video/x-h264` caps
    pub fn caps_name(&self) -> &'static str {
        match self {
            H264Profile::Baseline => "constrained-baseline",
            H264Profile::Main => "main",
            H264Profile::High => "high",
        }
    }
}

/// Encoder parameters for one recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecSettings {
    /// Average bitrate in bits per second
    pub bitrate: u32,
    /// Maximum distance between keyframes, in frames
    pub keyframe_interval: u32,
    pub profile: H264Profile,
    /// B-frames reorder output; disabled for real-time capture
    pub allow_frame_reordering: bool,
}

impl CodecSettings {
    /// Settings for the given encoded geometry. `bitrate` overrides the automatic choice.
    pub fn for_geometry(
        width: u32,
        height: u32,
        fps: u32,
        bitrate: Option<u32>,
        keyframe_interval: u32,
    ) -> Self {
        Self {
            bitrate: bitrate.unwrap_or_else(|| auto_bitrate(width, height, fps)),
            keyframe_interval: keyframe_interval.max(1),
            profile: H264Profile::Baseline,
            allow_frame_reordering: false,
        }
    }
}

/// Roughly 0.1 bits per pixel per frame, clamped to 1-4 Mbps
pub fn auto_bitrate(width: u32, height: u32, fps: u32) -> u32 {
    let bits = width as u64 * height as u64 * fps as u64 / 10;
    bits.clamp(MIN_AUTO_BITRATE as u64, MAX_AUTO_BITRATE as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_bitrate_stays_in_range() {
        assert_eq!(auto_bitrate(320, 240, 15), MIN_AUTO_BITRATE);
        assert_eq!(auto_bitrate(1280, 720, 24), 2_211_840);
        assert_eq!(auto_bitrate(1920, 1440, 60), MAX_AUTO_BITRATE);
    }

    #[test]
    fn settings_default_to_baseline_without_reordering() {
        let settings = CodecSettings::for_geometry(1280, 720, 30, None, 30);
        assert_eq!(settings.profile, H264Profile::Baseline);
        assert!(!settings.allow_frame_reordering);
        assert_eq!(settings.keyframe_interval, 30);

        let fixed = CodecSettings::for_geometry(1280, 720, 30, Some(3_500_000), 0);
        assert_eq!(fixed.bitrate, 3_500_000);
        assert_eq!(fixed.keyframe_interval, 1);
    }

    #[test]
    fn container_extensions() {
        assert_eq!(container_from_extension("MOV"), Some(ContainerFormat::Mov));
        assert_eq!(container_from_extension("m4v"), Some(ContainerFormat::Mp4));
        assert_eq!(container_from_extension("mkv"), None);
        assert_eq!(ContainerFormat::Mp4.extension(), "mp4");
    }
}
