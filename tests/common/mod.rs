// Shared fakes for the recording scenario tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arcap_lib::container::{
    ContainerError, ContainerWriter, ContainerWriterFactory, Result, TrackSpec,
};
use arcap_lib::encoding::ContainerFormat;
use arcap_lib::transcode::{TranscodeError, Transcoder};
use arcap_lib::{EncodableFrame, MediaTime, PixelFormat, RawFrame, RecorderSettings};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;

/// Everything the fake writers observed
#[derive(Default)]
pub struct WriterLog {
    pub specs: Mutex<Vec<TrackSpec>>,
    pub timestamps: Mutex<Vec<MediaTime>>,
    pub first_frame: Mutex<Option<EncodableFrame>>,
    pub not_ready: AtomicBool,
}

impl WriterLog {
    pub fn configure_count(&self) -> usize {
        self.specs.lock().len()
    }

    pub fn spec(&self, index: usize) -> TrackSpec {
        self.specs.lock()[index].clone()
    }

    pub fn timestamps(&self) -> Vec<MediaTime> {
        self.timestamps.lock().clone()
    }
}

/// Writer factory whose writers keep frames in memory and write a small
/// placeholder file on finalize
#[derive(Default)]
pub struct MemoryWriterFactory {
    pub log: Arc<WriterLog>,
    /// When set, finalize waits for a message before completing
    pub finalize_gate: Option<Receiver<()>>,
}

impl MemoryWriterFactory {
    pub fn new() -> (Arc<Self>, Arc<WriterLog>) {
        let factory = Self::default();
        let log = factory.log.clone();
        (Arc::new(factory), log)
    }

    pub fn gated(gate: Receiver<()>) -> (Arc<Self>, Arc<WriterLog>) {
        let factory = Self {
            finalize_gate: Some(gate),
            ..Self::default()
        };
        let log = factory.log.clone();
        (Arc::new(factory), log)
    }
}

impl ContainerWriterFactory for MemoryWriterFactory {
    fn configure(&self, spec: &TrackSpec) -> Result<Box<dyn ContainerWriter>> {
        self.log.specs.lock().push(spec.clone());
        Ok(Box::new(MemoryWriter {
            spec: spec.clone(),
            log: self.log.clone(),
            gate: self.finalize_gate.clone(),
            started: false,
            appended: 0,
        }))
    }
}

struct MemoryWriter {
    spec: TrackSpec,
    log: Arc<WriterLog>,
    gate: Option<Receiver<()>>,
    started: bool,
    appended: u64,
}

impl ContainerWriter for MemoryWriter {
    fn start_session(&mut self) -> Result<()> {
        if self.started {
            return Err(ContainerError::AlreadyStarted);
        }
        self.started = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.started && !self.log.not_ready.load(Ordering::SeqCst)
    }

    fn append(&mut self, frame: EncodableFrame) -> bool {
        if !self.is_ready() {
            return false;
        }
        assert_eq!(frame.data.len(), self.spec.width as usize * self.spec.height as usize * 4);
        self.log.timestamps.lock().push(frame.pts);
        let mut first = self.log.first_frame.lock();
        if first.is_none() {
            *first = Some(frame);
        }
        self.appended += 1;
        true
    }

    fn frames_appended(&self) -> u64 {
        self.appended
    }

    fn finalize(self: Box<Self>) -> Option<PathBuf> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if self.appended == 0 {
            return None;
        }
        std::fs::write(&self.spec.output_path, format!("{} frames", self.appended)).ok()?;
        Some(self.spec.output_path.clone())
    }
}

/// Transcoder that copies the source bytes to the destination
pub struct CopyTranscoder;

impl Transcoder for CopyTranscoder {
    fn target_format(&self) -> ContainerFormat {
        ContainerFormat::Mp4
    }

    fn transcode(
        &self,
        source: &Path,
        destination: &Path,
    ) -> std::result::Result<(), TranscodeError> {
        std::fs::copy(source, destination)
            .map(|_| ())
            .map_err(|e| TranscodeError::Failed(e.to_string()))
    }
}

/// Transcoder that leaves a partial file behind and then fails
pub struct BrokenTranscoder;

impl Transcoder for BrokenTranscoder {
    fn target_format(&self) -> ContainerFormat {
        ContainerFormat::Mp4
    }

    fn transcode(
        &self,
        _source: &Path,
        destination: &Path,
    ) -> std::result::Result<(), TranscodeError> {
        let _ = std::fs::write(destination, b"ftyp");
        Err(TranscodeError::Failed("export session failed".into()))
    }
}

pub fn settings_in(dir: &Path) -> RecorderSettings {
    arcap_lib::init_logging("warn");
    RecorderSettings {
        output_dir: Some(dir.to_path_buf()),
        ..RecorderSettings::default()
    }
}

/// Uniform full-range NV12 frame
pub fn gray_nv12(width: u32, height: u32, luma: u8, capture_ms: u64) -> RawFrame {
    let luma_len = (width * height) as usize;
    let mut data = vec![128u8; PixelFormat::Nv12FullRange.buffer_size(width, height)];
    data[..luma_len].fill(luma);
    let capture_time = Duration::from_millis(capture_ms);
    RawFrame::new(data, PixelFormat::Nv12FullRange, width, height, capture_time)
}

/// Full-range NV12 frame, black in the top and bottom `band` rows and white elsewhere
pub fn banded_nv12(width: u32, height: u32, band: u32) -> RawFrame {
    let mut data = vec![128u8; PixelFormat::Nv12FullRange.buffer_size(width, height)];
    for y in 0..height {
        let luma = if y < band || y >= height - band { 0 } else { 255 };
        let row = (y * width) as usize;
        data[row..row + width as usize].fill(luma);
    }
    RawFrame::new(data, PixelFormat::Nv12FullRange, width, height, Duration::ZERO)
}

/// Blue channel of a BGRA pixel
pub fn blue_at(frame: &EncodableFrame, x: u32, y: u32) -> u8 {
    frame.data[((y * frame.width + x) * 4) as usize]
}
