// Recording modules

pub mod pacing;
pub mod session;

pub use pacing::PaceClock;
pub use session::RecordingSession;

use serde::{Deserialize, Serialize};

use crate::frame::MediaTime;

/// Current recording state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Ready to record
    Idle,
    /// Accepting frames
    Recording,
    /// Closing the container and transcoding; no frames are accepted
    Finalizing,
}

impl RecordingState {
    pub fn is_recording(&self) -> bool {
        *self == RecordingState::Recording
    }
}

/// Error type for starting a recording
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("No camera frame available")]
    NoFrameAvailable,

    #[error("Failed to initialize writer: {0}")]
    WriterInitFailed(String),

    #[error("Failed to start writer session: {0}")]
    WriterStartFailed(String),

    #[error("Invalid recording configuration: {0}")]
    InvalidConfig(String),

    #[error("Previous recording is still finalizing")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What happened to one frame offered to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Not recording
    Inactive,
    /// The source had no frame
    NoFrame,
    /// A start or stop transition held the session
    Busy,
    /// The encoder asked for no more input
    NotReady,
    /// Conversion, transform or append failed
    Dropped,
    /// Accepted with this presentation time
    Appended(MediaTime),
}

impl IngestOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, IngestOutcome::Appended(_))
    }
}

/// Counters for the current (or last) recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingStats {
    pub frames_appended: u64,
    pub frames_dropped: u64,
    pub frames_skipped_not_ready: u64,
}
