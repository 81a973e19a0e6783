// Container writer abstraction
//
// The recording session only talks to these traits. The GStreamer backend lives
// in `gst_writer` behind the `gst` feature; tests drive the session with
// in-memory writers.

#[cfg(feature = "gst")]
pub mod gst_writer;

#[cfg(feature = "gst")]
pub use gst_writer::{GstContainerWriter, GstWriterFactory};

use std::path::PathBuf;

use crate::encoding::CodecSettings;
use crate::frame::{EncodableFrame, Rotation};

/// Error type for container operations
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Writer configuration failed: {0}")]
    Configure(String),

    #[error("Writer session failed to start: {0}")]
    Start(String),

    #[error("Session already started")]
    AlreadyStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ContainerError>;

/// Everything a writer needs to set up its single video track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSpec {
    pub output_path: PathBuf,
    /// Sensor-aligned encoded width
    pub width: u32,
    /// Sensor-aligned encoded height
    pub height: u32,
    pub fps: u32,
    pub codec: CodecSettings,
    /// Display rotation stored in the track metadata
    pub rotation: Rotation,
}

/// Builds a configured writer for one recording
pub trait ContainerWriterFactory: Send + Sync {
    /// Set up the track. Nothing is accepted until [`ContainerWriter::start_session`].
    fn configure(&self, spec: &TrackSpec) -> Result<Box<dyn ContainerWriter>>;
}

/// One open container file with a single video track
pub trait ContainerWriter: Send {
    /// Start the writing session with timestamp origin 0. Must be called exactly once.
    fn start_session(&mut self) -> Result<()>;

    /// Whether the encoder can take another frame right now
    fn is_ready(&self) -> bool;

    /// Submit a frame without blocking.
    ///
    /// Returns `false` and drops the frame when the encoder is not ready, the
    /// session has not started, or the writer has failed.
    fn append(&mut self, frame: EncodableFrame) -> bool;

    /// Frames accepted so far
    fn frames_appended(&self) -> u64;

    /// Flush and close the container, blocking until it is durable on storage.
    ///
    /// Returns the output path, or `None` if no usable file was produced.
    fn finalize(self: Box<Self>) -> Option<PathBuf>;
}
