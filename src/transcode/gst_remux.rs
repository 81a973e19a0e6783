//! QuickTime to MP4 remux through GStreamer
//!
//! The H.264 track is copied, not re-encoded:
//! `filesrc ! qtdemux ! h264parse ! mp4mux(faststart) ! filesink`.
//! The result is probed with the discoverer before it is reported as done.

use std::path::Path;

use anyhow::anyhow;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_pbutils as gst_pbutils;
use gst_pbutils::prelude::*;

use super::{Result, TranscodeError, Transcoder};
use crate::encoding::ContainerFormat;
use crate::gstreamer_init;

/// How long a remux may run before it is abandoned
const REMUX_TIMEOUT_SECS: u64 = 300;
const PROBE_TIMEOUT_SECS: u64 = 10;

/// Why a remux did not produce a file
enum RemuxFailure {
    TimedOut,
    Error(anyhow::Error),
}

impl From<anyhow::Error> for RemuxFailure {
    fn from(e: anyhow::Error) -> Self {
        RemuxFailure::Error(e)
    }
}

/// Remuxes `.mov` recordings into faststart `.mp4`
#[derive(Debug, Clone, Copy)]
pub struct GstRemuxTranscoder {
    probe_output: bool,
}

impl GstRemuxTranscoder {
    pub fn new() -> Self {
        gstreamer_init::init_gstreamer_env();
        Self { probe_output: true }
    }

    /// Skip the discoverer check on the finished file
    pub fn without_probe(mut self) -> Self {
        self.probe_output = false;
        self
    }
}

impl Default for GstRemuxTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for GstRemuxTranscoder {
    fn target_format(&self) -> ContainerFormat {
        ContainerFormat::Mp4
    }

    fn transcode(&self, source: &Path, destination: &Path) -> Result<()> {
        if !gstreamer_init::is_gstreamer_available() {
            return Err(TranscodeError::Cancelled);
        }

        log::info!("[Transcode] Remuxing {} -> {}", source.display(), destination.display());

        match remux(source, destination) {
            Ok(()) => {}
            Err(RemuxFailure::TimedOut) => {
                log::warn!("[Transcode] Remux did not finish within {}s", REMUX_TIMEOUT_SECS);
                return Err(TranscodeError::Cancelled);
            }
            Err(RemuxFailure::Error(e)) => return Err(TranscodeError::Failed(e.to_string())),
        }

        if self.probe_output {
            let duration =
                probe_video(destination).map_err(|e| TranscodeError::Failed(e.to_string()))?;
            log::debug!("[Transcode] Output duration {:.2}s", duration);
        }
        Ok(())
    }
}

fn remux(source: &Path, destination: &Path) -> std::result::Result<(), RemuxFailure> {
    let pipeline = gst::Pipeline::new();

    let filesrc = gst::ElementFactory::make("filesrc")
        .property("location", source.to_string_lossy().to_string())
        .build()
        .map_err(|e| anyhow!("Failed to create filesrc: {}", e))?;

    let demux = gst::ElementFactory::make(ContainerFormat::Mov.gst_demuxer())
        .name("demux")
        .build()
        .map_err(|e| anyhow!("Failed to create demuxer: {}", e))?;

    let parser = gst::ElementFactory::make("h264parse")
        .build()
        .map_err(|e| anyhow!("Failed to create h264parse: {}", e))?;

    let mux = gst::ElementFactory::make(ContainerFormat::Mp4.gst_muxer())
        .property("faststart", true)
        .build()
        .map_err(|e| anyhow!("Failed to create mp4mux: {}", e))?;

    let filesink = gst::ElementFactory::make("filesink")
        .property("location", destination.to_string_lossy().to_string())
        .build()
        .map_err(|e| anyhow!("Failed to create filesink: {}", e))?;

    pipeline
        .add_many([&filesrc, &demux, &parser, &mux, &filesink])
        .map_err(|e| anyhow!("Failed to add elements: {}", e))?;

    filesrc
        .link(&demux)
        .map_err(|e| anyhow!("Failed to link filesrc -> demux: {}", e))?;
    gst::Element::link_many([&parser, &mux, &filesink])
        .map_err(|e| anyhow!("Failed to link parser -> mux -> filesink: {}", e))?;

    // qtdemux exposes its track pads only once the header is parsed
    let parser_weak = parser.downgrade();
    demux.connect_pad_added(move |_demux, src_pad| {
        let pad_name = src_pad.name();
        if !pad_name.starts_with("video") {
            log::debug!("[Transcode] Ignoring demux pad {}", pad_name);
            return;
        }
        let Some(parser) = parser_weak.upgrade() else { return };
        let Some(sink_pad) = parser.static_pad("sink") else { return };
        if sink_pad.is_linked() {
            return;
        }
        if let Err(e) = src_pad.link(&sink_pad) {
            log::warn!("[Transcode] Failed to link demux pad {}: {:?}", pad_name, e);
        }
    });

    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| anyhow!("Failed to start remux pipeline: {:?}", e))?;

    let bus = match pipeline.bus() {
        Some(bus) => bus,
        None => {
            pipeline.set_state(gst::State::Null).ok();
            return Err(anyhow!("No pipeline bus for remux").into());
        }
    };

    let mut finished = false;
    for msg in bus.iter_timed(gst::ClockTime::from_seconds(REMUX_TIMEOUT_SECS)) {
        match msg.view() {
            gst::MessageView::Eos(..) => {
                finished = true;
                break;
            }
            gst::MessageView::Error(err) => {
                pipeline.set_state(gst::State::Null).ok();
                return Err(anyhow!(
                    "Remux error: {} ({})",
                    err.error(),
                    err.debug().unwrap_or_default()
                )
                .into());
            }
            _ => {}
        }
    }

    pipeline.set_state(gst::State::Null).ok();

    if finished {
        Ok(())
    } else {
        Err(RemuxFailure::TimedOut)
    }
}

/// Confirm the file has a video stream, returning its duration in seconds
fn probe_video(path: &Path) -> anyhow::Result<f64> {
    let uri = gst::glib::filename_to_uri(path, None)
        .map_err(|e| anyhow!("Invalid output path: {}", e))?;
    let discoverer = gst_pbutils::Discoverer::new(gst::ClockTime::from_seconds(PROBE_TIMEOUT_SECS))
        .map_err(|e| anyhow!("Failed to create discoverer: {}", e))?;
    let info = discoverer
        .discover_uri(&uri)
        .map_err(|e| anyhow!("Output is not readable: {}", e))?;

    let video_streams = info.video_streams();
    let stream = video_streams.first().ok_or_else(|| anyhow!("Output has no video stream"))?;
    let caps = stream.caps().ok_or_else(|| anyhow!("No caps on output video stream"))?;
    let caps_name = caps.structure(0).map(|s| s.name().as_str().to_string()).unwrap_or_default();
    if caps_name != "video/x-h264" {
        return Err(anyhow!("Output video stream is {}, expected H.264", caps_name));
    }

    Ok(info
        .duration()
        .map(|d| d.nseconds() as f64 / 1_000_000_000.0)
        .unwrap_or(0.0))
}
