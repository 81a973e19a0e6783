//! GStreamer-backed QuickTime writer
//!
//! Pipeline: `appsrc (BGRA) ! queue ! videoconvert ! <h264 encoder> !
//! capsfilter(profile) ! h264parse ! [taginject] ! qtmux ! filesink`
//!
//! The appsrc never blocks. Its `need-data` / `enough-data` callbacks drive the
//! readiness flag that [`ContainerWriter::is_ready`] reports, so a slow encoder
//! shows up as backpressure and the frame is dropped at the source instead of
//! stalling the capture thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;

use super::{ContainerError, ContainerWriter, ContainerWriterFactory, Result, TrackSpec};
use crate::encoding::{create_encoder, detect_best_encoder, ContainerFormat, HardwareEncoderType};
use crate::frame::{EncodableFrame, Rotation};
use crate::gstreamer_init;

/// Raw frames the appsrc may hold before it reports `enough-data`
const APPSRC_QUEUE_FRAMES: u64 = 4;
/// How long finalize waits for the muxer to drain after EOS
const FINALIZE_TIMEOUT_SECS: u64 = 30;

/// Creates [`GstContainerWriter`]s using the best H.264 encoder on this machine
pub struct GstWriterFactory {
    hw_type: Option<HardwareEncoderType>,
}

impl GstWriterFactory {
    pub fn new() -> Self {
        gstreamer_init::init_gstreamer_env();
        let hw_type = if gstreamer_init::is_gstreamer_available() {
            detect_best_encoder()
        } else {
            None
        };
        if hw_type.is_none() {
            log::warn!("[Writer] No H.264 encoder available; recordings will fail to start");
        }
        Self { hw_type }
    }

    /// Use a specific encoder instead of the detected one
    pub fn with_encoder(hw_type: HardwareEncoderType) -> Self {
        gstreamer_init::init_gstreamer_env();
        Self { hw_type: Some(hw_type) }
    }

    pub fn encoder(&self) -> Option<HardwareEncoderType> {
        self.hw_type
    }
}

impl Default for GstWriterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerWriterFactory for GstWriterFactory {
    fn configure(&self, spec: &TrackSpec) -> Result<Box<dyn ContainerWriter>> {
        let hw_type = self
            .hw_type
            .ok_or_else(|| ContainerError::Configure("no H.264 encoder available".into()))?;
        Ok(Box::new(GstContainerWriter::new(spec, hw_type)?))
    }
}

/// Single-track QuickTime writer fed through an appsrc
pub struct GstContainerWriter {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    output_path: PathBuf,
    frame_size: usize,
    ready: Arc<AtomicBool>,
    started: bool,
    failed: bool,
    frames_appended: u64,
}

impl GstContainerWriter {
    pub fn new(spec: &TrackSpec, hw_type: HardwareEncoderType) -> Result<Self> {
        let pipeline = gst::Pipeline::new();

        let format = gst_video::VideoFormat::Bgra;
        let caps = gst_video::VideoInfo::builder(format, spec.width, spec.height)
            .fps(gst::Fraction::new(spec.fps as i32, 1))
            .build()
            .and_then(|info| info.to_caps())
            .map_err(|e| ContainerError::Configure(format!("Invalid raw caps: {}", e)))?;

        let frame_size = spec.width as usize * spec.height as usize * 4;

        let appsrc = gst_app::AppSrc::builder()
            .name("src")
            .caps(&caps)
            .format(gst::Format::Time)
            .is_live(true)
            .block(false)
            .max_bytes(frame_size as u64 * APPSRC_QUEUE_FRAMES)
            .stream_type(gst_app::AppStreamType::Stream)
            .build();

        let ready = Arc::new(AtomicBool::new(true));
        let need = ready.clone();
        let enough = ready.clone();
        appsrc.set_callbacks(
            gst_app::AppSrcCallbacks::builder()
                .need_data(move |_, _| need.store(true, Ordering::Release))
                .enough_data(move |_| enough.store(false, Ordering::Release))
                .build(),
        );

        let queue = make("queue")?;
        queue.set_property("max-size-buffers", 30u32);
        queue.set_property("max-size-time", 0u64); // No time limit
        queue.set_property("max-size-bytes", 0u32); // No byte limit

        let videoconvert = make("videoconvert")?;
        let encoder = create_encoder(hw_type, &spec.codec).map_err(ContainerError::Configure)?;

        let capsfilter = make("capsfilter")?;
        capsfilter.set_property(
            "caps",
            gst::Caps::builder("video/x-h264")
                .field("profile", spec.codec.profile.caps_name())
                .build(),
        );

        let parser = make("h264parse")?;
        let muxer = make(ContainerFormat::Mov.gst_muxer())?;

        let filesink = make("filesink")?;
        filesink.set_property("location", spec.output_path.to_string_lossy().to_string());
        filesink.set_property("async", false);
        filesink.set_property("sync", false);

        let mut chain: Vec<gst::Element> = vec![
            appsrc.clone().upcast(),
            queue,
            videoconvert,
            encoder,
            capsfilter,
            parser,
        ];
        if let Some(tagger) = rotation_tagger(spec.rotation) {
            chain.push(tagger);
        }
        chain.push(muxer);
        chain.push(filesink);

        pipeline
            .add_many(chain.iter())
            .map_err(|e| ContainerError::Configure(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many(chain.iter())
            .map_err(|e| ContainerError::Configure(format!("Failed to link elements: {}", e)))?;

        pipeline
            .set_state(gst::State::Ready)
            .map_err(|e| ContainerError::Configure(format!("Pipeline refused READY: {:?}", e)))?;

        log::info!(
            "[Writer] Configured {}x{} @ {}fps -> {} (rotation {}°)",
            spec.width,
            spec.height,
            spec.fps,
            spec.output_path.display(),
            spec.rotation.degrees()
        );

        Ok(Self {
            pipeline,
            appsrc,
            output_path: spec.output_path.clone(),
            frame_size,
            ready,
            started: false,
            failed: false,
            frames_appended: 0,
        })
    }

    /// Drain pending error messages without blocking
    fn check_bus_errors(&mut self) {
        let Some(bus) = self.pipeline.bus() else { return };
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(err) = msg.view() {
                log::error!("[Writer] Pipeline error: {} ({:?})", err.error(), err.debug());
            }
            self.failed = true;
        }
    }

    /// Block until the muxer has written the moov atom, an error, or the timeout
    fn wait_for_eos(&self) {
        let Some(bus) = self.pipeline.bus() else { return };
        for msg in bus.iter_timed(gst::ClockTime::from_seconds(FINALIZE_TIMEOUT_SECS)) {
            match msg.view() {
                gst::MessageView::Eos(..) => {
                    log::debug!("[Writer] EOS received");
                    return;
                }
                gst::MessageView::Error(err) => {
                    // Keep whatever made it to disk
                    log::error!(
                        "[Writer] Error during finalization: {} ({:?})",
                        err.error(),
                        err.debug()
                    );
                    return;
                }
                _ => {}
            }
        }
        log::warn!("[Writer] No EOS within {}s, closing anyway", FINALIZE_TIMEOUT_SECS);
    }
}

impl ContainerWriter for GstContainerWriter {
    fn start_session(&mut self) -> Result<()> {
        if self.started {
            return Err(ContainerError::AlreadyStarted);
        }

        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| ContainerError::Start(format!("Failed to start pipeline: {:?}", e)))?;

        self.started = true;
        log::info!("[Writer] Session started");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.started && !self.failed && self.ready.load(Ordering::Acquire)
    }

    fn append(&mut self, frame: EncodableFrame) -> bool {
        self.check_bus_errors();
        if !self.is_ready() {
            return false;
        }
        if frame.data.len() != self.frame_size {
            log::warn!(
                "[Writer] Frame size {} does not match track ({} bytes), dropping",
                frame.data.len(),
                self.frame_size
            );
            return false;
        }

        let mut buffer = gst::Buffer::from_mut_slice(frame.data);
        if let Some(buffer_ref) = buffer.get_mut() {
            buffer_ref.set_pts(gst::ClockTime::from_nseconds(frame.pts.as_nanos()));
            buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame.duration.as_nanos()));
        }

        match self.appsrc.push_buffer(buffer) {
            Ok(_) => {
                self.frames_appended += 1;
                if self.frames_appended % 100 == 0 {
                    log::debug!("[Writer] Appended {} frames", self.frames_appended);
                }
                true
            }
            Err(e) => {
                log::warn!("[Writer] Failed to push frame: {:?}", e);
                if e != gst::FlowError::Flushing {
                    self.failed = true;
                }
                false
            }
        }
    }

    fn frames_appended(&self) -> u64 {
        self.frames_appended
    }

    fn finalize(mut self: Box<Self>) -> Option<PathBuf> {
        if !self.started {
            let _ = self.pipeline.set_state(gst::State::Null);
            let _ = std::fs::remove_file(&self.output_path);
            return None;
        }

        // An errored pipeline never posts EOS
        self.check_bus_errors();
        if self.failed {
            log::warn!(
                "[Writer] Pipeline failed, keeping what reached {}",
                self.output_path.display()
            );
        } else {
            log::info!("[Writer] Finishing after {} frames...", self.frames_appended);
            if let Err(e) = self.appsrc.end_of_stream() {
                log::warn!("[Writer] EOS send failed: {:?}", e);
            }
            self.wait_for_eos();
        }

        let _ = self.pipeline.set_state(gst::State::Null);

        let size = std::fs::metadata(&self.output_path).map(|m| m.len()).unwrap_or(0);
        if self.frames_appended == 0 || size == 0 {
            log::warn!("[Writer] No frames written, discarding {}", self.output_path.display());
            let _ = std::fs::remove_file(&self.output_path);
            return None;
        }

        log::info!("[Writer] Finished: {} ({} bytes)", self.output_path.display(), size);
        Some(self.output_path.clone())
    }
}

impl Drop for GstContainerWriter {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

fn make(factory: &str) -> Result<gst::Element> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|e| ContainerError::Configure(format!("Failed to create {}: {}", factory, e)))
}

/// Element that tags the stream with its display rotation, if one is needed
fn rotation_tagger(rotation: Rotation) -> Option<gst::Element> {
    if rotation == Rotation::Identity {
        return None;
    }
    match gst::ElementFactory::make("taginject")
        .property("tags", format!("image-orientation={}", rotation.image_orientation_tag()))
        .build()
    {
        Ok(element) => Some(element),
        Err(e) => {
            log::warn!("[Writer] taginject unavailable ({}), track will not carry rotation", e);
            None
        }
    }
}
