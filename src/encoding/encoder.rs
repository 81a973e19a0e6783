//! H.264 encoder selection and configuration
//!
//! Picks the best available GStreamer H.264 encoder and applies
//! [`CodecSettings`] to it. Every backend is configured for real-time capture:
//! no B-frames, bounded keyframe distance, average bitrate in kbps (or bps for
//! openh264).
//!
//! ## Adding an encoder
//! 1. Add a variant to [`HardwareEncoderType`] and its element name.
//! 2. Add it to the preference list in [`detect_best_encoder`].
//! 3. Add a match arm in [`create_encoder`] setting the element's properties.

use gstreamer as gst;
use gstreamer::prelude::*;

use super::CodecSettings;

/// Type of H.264 encoder available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareEncoderType {
    /// Apple VideoToolbox
    VideoToolbox,
    /// NVIDIA NVENC
    Nvenc,
    /// x264 software encoder
    X264,
    /// Cisco openh264 software encoder
    OpenH264,
}

impl HardwareEncoderType {
    /// Preference order used by [`detect_best_encoder`]
    pub const ALL: &'static [HardwareEncoderType] = &[
        HardwareEncoderType::VideoToolbox,
        HardwareEncoderType::Nvenc,
        HardwareEncoderType::X264,
        HardwareEncoderType::OpenH264,
    ];

    /// Get the GStreamer element name
    pub fn element_name(&self) -> &'static str {
        match self {
            HardwareEncoderType::VideoToolbox => "vtenc_h264",
            HardwareEncoderType::Nvenc => "nvh264enc",
            HardwareEncoderType::X264 => "x264enc",
            HardwareEncoderType::OpenH264 => "openh264enc",
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            HardwareEncoderType::VideoToolbox => "Apple VideoToolbox",
            HardwareEncoderType::Nvenc => "NVIDIA NVENC",
            HardwareEncoderType::X264 => "Software (x264)",
            HardwareEncoderType::OpenH264 => "Software (openh264)",
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, HardwareEncoderType::VideoToolbox | HardwareEncoderType::Nvenc)
    }
}

/// Detect the best available H.264 encoder, or `None` if GStreamer has none
pub fn detect_best_encoder() -> Option<HardwareEncoderType> {
    HardwareEncoderType::ALL
        .iter()
        .copied()
        .find(|hw| gst::ElementFactory::find(hw.element_name()).is_some())
}

/// Create the encoder element and apply the codec settings
pub fn create_encoder(
    hw_type: HardwareEncoderType,
    settings: &CodecSettings,
) -> Result<gst::Element, String> {
    let name = hw_type.element_name();
    let encoder = gst::ElementFactory::make(name)
        .build()
        .map_err(|e| format!("Failed to create {}: {}", name, e))?;

    let kbps = (settings.bitrate / 1000).max(1);

    match hw_type {
        HardwareEncoderType::VideoToolbox => {
            encoder.set_property("bitrate", kbps);
            encoder.set_property("max-keyframe-interval", settings.keyframe_interval as i32);
            encoder.set_property("allow-frame-reordering", settings.allow_frame_reordering);
            encoder.set_property("realtime", true);
        }
        HardwareEncoderType::Nvenc => {
            encoder.set_property("bitrate", kbps);
            // GOP size - must be i32, not u32
            encoder.set_property("gop-size", settings.keyframe_interval as i32);
            if !settings.allow_frame_reordering {
                encoder.set_property("bframes", 0u32);
            }
        }
        HardwareEncoderType::X264 => {
            encoder.set_property("bitrate", kbps);
            encoder.set_property("key-int-max", settings.keyframe_interval);
            if !settings.allow_frame_reordering {
                encoder.set_property("bframes", 0u32);
            }
            encoder.set_property_from_str("tune", "zerolatency");
            encoder.set_property_from_str("speed-preset", "veryfast");
        }
        HardwareEncoderType::OpenH264 => {
            // openh264 takes bits per second
            encoder.set_property("bitrate", settings.bitrate);
            encoder.set_property("gop-size", settings.keyframe_interval);
        }
    }

    log::info!(
        "[Encoder] Using {} ({} kbps, keyframe every {} frames)",
        hw_type.display_name(),
        kbps,
        settings.keyframe_interval
    );

    Ok(encoder)
}
