//! Recording session state machine
//!
//! `Idle -> Recording -> Finalizing -> Idle`. The per-recording resources live
//! in a [`SessionHandle`] that exists only while the state is `Recording`;
//! `stop` takes it out of the slot before any slow work begins, so the frame
//! path can never reach a writer that is being finalized.
//!
//! Frame delivery and control run on different threads. `ingest` only ever
//! `try_lock`s the slot and reports [`IngestOutcome::Busy`] instead of waiting.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::pacing::PaceClock;
use super::{IngestOutcome, RecordingError, RecordingState, RecordingStats};
use crate::config::{RecorderSettings, RecordingConfig, StartOptions};
use crate::container::{ContainerWriter, ContainerWriterFactory, TrackSpec};
use crate::encoding::{CodecSettings, ContainerFormat};
use crate::frame::{resolve_transform, EncodableFrame, FrameTransformer, PixelConverter, RawFrame};
use crate::source::FrameSource;
use crate::storage;
use crate::transcode::{transcode_with_fallback, Transcoder};

/// Resources owned by one active recording
struct SessionHandle {
    output_path: PathBuf,
    config: RecordingConfig,
    writer: Box<dyn ContainerWriter>,
    converter: PixelConverter,
    transformer: FrameTransformer,
    clock: PaceClock,
}

enum Slot {
    Idle,
    Recording(SessionHandle),
    Finalizing,
}

impl Slot {
    fn state(&self) -> RecordingState {
        match self {
            Slot::Idle => RecordingState::Idle,
            Slot::Recording(_) => RecordingState::Recording,
            Slot::Finalizing => RecordingState::Finalizing,
        }
    }
}

#[derive(Default)]
struct Counters {
    appended: AtomicU64,
    dropped: AtomicU64,
    not_ready: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        self.appended.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.not_ready.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RecordingStats {
        RecordingStats {
            frames_appended: self.appended.load(Ordering::Relaxed),
            frames_dropped: self.dropped.load(Ordering::Relaxed),
            frames_skipped_not_ready: self.not_ready.load(Ordering::Relaxed),
        }
    }
}

/// Returns the slot to `Idle` when the finalize task ends, even if it panics
struct FinalizingGuard(Arc<Mutex<Slot>>);

impl Drop for FinalizingGuard {
    fn drop(&mut self) {
        *self.0.lock() = Slot::Idle;
    }
}

/// Records camera frames from a [`FrameSource`] into a single-track movie
pub struct RecordingSession {
    source: Arc<dyn FrameSource>,
    writer_factory: Arc<dyn ContainerWriterFactory>,
    transcoder: Arc<dyn Transcoder>,
    settings: RecorderSettings,
    slot: Arc<Mutex<Slot>>,
    counters: Arc<Counters>,
}

impl RecordingSession {
    pub fn new(
        source: Arc<dyn FrameSource>,
        writer_factory: Arc<dyn ContainerWriterFactory>,
        transcoder: Arc<dyn Transcoder>,
        settings: RecorderSettings,
    ) -> Self {
        Self {
            source,
            writer_factory,
            transcoder,
            settings,
            slot: Arc::new(Mutex::new(Slot::Idle)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.slot.lock().state()
    }

    pub fn stats(&self) -> RecordingStats {
        self.counters.snapshot()
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Intermediate file of the active recording
    pub fn current_output(&self) -> Option<PathBuf> {
        match &*self.slot.lock() {
            Slot::Recording(handle) => Some(handle.output_path.clone()),
            _ => None,
        }
    }

    /// Configuration of the active recording
    pub fn current_config(&self) -> Option<RecordingConfig> {
        match &*self.slot.lock() {
            Slot::Recording(handle) => Some(handle.config),
            _ => None,
        }
    }

    /// Begin recording.
    ///
    /// Succeeds without side effects if a recording is already running.
    /// Fails with [`RecordingError::Busy`] while the previous one is finalizing.
    pub fn start(&self, options: StartOptions) -> Result<(), RecordingError> {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Recording(handle) => {
                log::info!("[Recorder] Already recording to {}", handle.output_path.display());
                return Ok(());
            }
            Slot::Finalizing => {
                log::warn!("[Recorder] Cannot start: previous recording is still finalizing");
                return Err(RecordingError::Busy);
            }
            Slot::Idle => {}
        }

        match self.open_session(options) {
            Ok(handle) => {
                log::info!(
                    "[Recorder] Recording {}x{} @ {}fps ({:?}) to {}",
                    handle.config.target_width,
                    handle.config.target_height,
                    handle.config.target_fps,
                    handle.config.orientation,
                    handle.output_path.display()
                );
                self.counters.reset();
                *slot = Slot::Recording(handle);
                Ok(())
            }
            Err(e) => {
                log::error!("[Recorder] Failed to start recording: {}", e);
                Err(e)
            }
        }
    }

    fn open_session(&self, options: StartOptions) -> Result<SessionHandle, RecordingError> {
        let frame = self.source.current_frame().ok_or(RecordingError::NoFrameAvailable)?;
        let orientation = self.source.orientation();
        let device_class = self.source.device_class();

        // Default size is the camera frame as the user sees it
        let (default_width, default_height) = if orientation.is_portrait() {
            (frame.height, frame.width)
        } else {
            (frame.width, frame.height)
        };

        let config = RecordingConfig::new(
            options.width.unwrap_or(default_width),
            options.height.unwrap_or(default_height),
            options.fps.unwrap_or(self.settings.default_fps),
            orientation,
            device_class,
        )
        .map_err(RecordingError::InvalidConfig)?;

        let resolved = resolve_transform(
            config.orientation,
            config.device_class,
            config.target_width,
            config.target_height,
        );

        let output_path = storage::allocate_output(
            &self.settings.resolved_output_dir(),
            &self.settings.file_prefix,
            ContainerFormat::Mov,
        )?;

        let spec = TrackSpec {
            output_path: output_path.clone(),
            width: resolved.encoded_width,
            height: resolved.encoded_height,
            fps: config.target_fps,
            codec: CodecSettings::for_geometry(
                resolved.encoded_width,
                resolved.encoded_height,
                config.target_fps,
                self.settings.bitrate,
                self.settings.keyframe_interval,
            ),
            rotation: resolved.rotation,
        };

        let mut writer = self
            .writer_factory
            .configure(&spec)
            .map_err(|e| RecordingError::WriterInitFailed(e.to_string()))?;

        if let Err(e) = writer.start_session() {
            drop(writer);
            storage::remove_stale(&output_path);
            return Err(RecordingError::WriterStartFailed(e.to_string()));
        }

        Ok(SessionHandle {
            output_path,
            config,
            writer,
            converter: PixelConverter::new(),
            transformer: FrameTransformer::new(resolved.encoded_width, resolved.encoded_height),
            clock: PaceClock::new(config.target_fps, self.settings.timescale),
        })
    }

    /// Poll the frame source once and record its current frame
    pub fn ingest(&self) -> IngestOutcome {
        let Some(mut slot) = self.slot.try_lock() else {
            return IngestOutcome::Busy;
        };
        let Slot::Recording(handle) = &mut *slot else {
            return IngestOutcome::Inactive;
        };
        match self.source.current_frame() {
            Some(frame) => self.record_frame(handle, &frame),
            None => IngestOutcome::NoFrame,
        }
    }

    /// Record an explicitly delivered frame
    pub fn ingest_frame(&self, frame: &RawFrame) -> IngestOutcome {
        let Some(mut slot) = self.slot.try_lock() else {
            return IngestOutcome::Busy;
        };
        match &mut *slot {
            Slot::Recording(handle) => self.record_frame(handle, frame),
            _ => IngestOutcome::Inactive,
        }
    }

    fn record_frame(&self, handle: &mut SessionHandle, frame: &RawFrame) -> IngestOutcome {
        if !handle.writer.is_ready() {
            self.counters.not_ready.fetch_add(1, Ordering::Relaxed);
            log::trace!("[Recorder] Encoder not ready, skipping frame");
            return IngestOutcome::NotReady;
        }

        let bgra = match handle.converter.convert(frame) {
            Ok(bgra) => bgra,
            Err(e) => {
                log::debug!("[Recorder] Dropping frame: {}", e);
                return self.dropped();
            }
        };

        let data = match handle.transformer.transform(&bgra, frame.width, frame.height) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("[Recorder] Dropping frame: {}", e);
                return self.dropped();
            }
        };

        let (width, height) = handle.transformer.target_size();
        let pts = handle.clock.peek();
        let encodable = EncodableFrame {
            data,
            width,
            height,
            pts,
            duration: handle.clock.frame_duration(),
        };

        if handle.writer.append(encodable) {
            handle.clock.commit();
            self.counters.appended.fetch_add(1, Ordering::Relaxed);
            IngestOutcome::Appended(pts)
        } else {
            log::debug!("[Recorder] Writer rejected frame at {}/{}", pts.value, pts.timescale);
            self.dropped()
        }
    }

    fn dropped(&self) -> IngestOutcome {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        IngestOutcome::Dropped
    }

    /// Stop recording and deliver the file.
    ///
    /// Returns `None` when idle, when another stop is already finalizing, or
    /// when the recording produced no file. The returned path is the transcoded
    /// file when transcoding succeeded, otherwise the intermediate one.
    ///
    /// Finalization runs on its own task. Dropping this future does not cancel
    /// it, and the session stays `Finalizing` until the file is delivered.
    pub async fn stop(&self) -> Option<PathBuf> {
        let handle = {
            let mut slot = self.slot.lock();
            match std::mem::replace(&mut *slot, Slot::Finalizing) {
                Slot::Recording(handle) => handle,
                other => {
                    log::debug!("[Recorder] Stop requested while {:?}", other.state());
                    *slot = other;
                    return None;
                }
            }
        };

        let finalizing = FinalizingGuard(self.slot.clone());
        let transcoder = self.settings.transcode_to_mp4.then(|| self.transcoder.clone());
        let counters = self.counters.clone();

        let task = tokio::spawn(async move {
            let delivered = finish_recording(handle, transcoder).await;
            log_stats(&counters.snapshot());
            drop(finalizing);
            delivered
        });

        match task.await {
            Ok(delivered) => delivered,
            Err(e) => {
                log::error!("[Recorder] Finalize task failed: {}", e);
                None
            }
        }
    }
}

/// Finalize the container, then transcode it when a transcoder is given
async fn finish_recording(
    handle: SessionHandle,
    transcoder: Option<Arc<dyn Transcoder>>,
) -> Option<PathBuf> {
    let SessionHandle {
        output_path,
        writer,
        clock,
        ..
    } = handle;

    log::info!(
        "[Recorder] Stopping after {} frames ({:.2}s)",
        writer.frames_appended(),
        clock.elapsed().as_secs_f64()
    );

    let finalized = match tokio::task::spawn_blocking(move || writer.finalize()).await {
        Ok(path) => path,
        Err(e) => {
            log::error!("[Recorder] Finalize failed: {}", e);
            None
        }
    };

    let Some(intermediate) = finalized else {
        log::warn!("[Recorder] No file produced for {}", output_path.display());
        return None;
    };

    let delivered = match transcoder {
        Some(transcoder) => {
            let source = intermediate.clone();
            let transcoded = tokio::task::spawn_blocking(move || {
                transcode_with_fallback(transcoder.as_ref(), &source)
            })
            .await;
            match transcoded {
                Ok(path) => path,
                Err(e) => {
                    log::error!("[Recorder] Transcode task failed: {}", e);
                    intermediate
                }
            }
        }
        None => intermediate,
    };

    log::info!("[Recorder] Recording saved: {}", delivered.display());
    Some(delivered)
}

fn log_stats(stats: &RecordingStats) {
    log::info!(
        "[Recorder] {} frames appended, {} dropped, {} skipped (encoder busy)",
        stats.frames_appended,
        stats.frames_dropped,
        stats.frames_skipped_not_ready
    );
}
