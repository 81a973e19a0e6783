//! Post-recording transcode with fallback
//!
//! Transcoding is an optimisation, never a requirement: the caller always gets
//! a usable file. The intermediate recording is deleted only once the new file
//! has been confirmed complete; on any failure the intermediate path is
//! returned untouched.

#[cfg(feature = "gst")]
pub mod gst_remux;

#[cfg(feature = "gst")]
pub use gst_remux::GstRemuxTranscoder;

use std::path::{Path, PathBuf};

use crate::encoding::{container_from_extension, ContainerFormat};
use crate::storage;

/// Error type for transcode operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("Transcode failed: {0}")]
    Failed(String),

    #[error("Transcode cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TranscodeError>;

/// Converts a finished recording into another container format
pub trait Transcoder: Send + Sync {
    /// Format written to the destination
    fn target_format(&self) -> ContainerFormat;

    /// Write `destination` from `source`, blocking until done.
    /// Must not touch `source`.
    fn transcode(&self, source: &Path, destination: &Path) -> Result<()>;
}

/// Transcoder used when no media backend is compiled in: always declines,
/// so recordings are delivered in their intermediate format.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranscoder;

impl Transcoder for NoopTranscoder {
    fn target_format(&self) -> ContainerFormat {
        ContainerFormat::Mp4
    }

    fn transcode(&self, _source: &Path, _destination: &Path) -> Result<()> {
        Err(TranscodeError::Cancelled)
    }
}

/// Run `transcoder` on `source` and return the path the caller should use.
///
/// On confirmed success the source is deleted and the new path returned.
/// Otherwise any partial output is removed and `source` is returned.
pub fn transcode_with_fallback(transcoder: &dyn Transcoder, source: &Path) -> PathBuf {
    let target = transcoder.target_format();
    let source_format = source
        .extension()
        .and_then(|e| e.to_str())
        .and_then(container_from_extension);
    if source_format == Some(target) {
        log::debug!("[Transcode] {} is already {:?}", source.display(), target);
        return source.to_path_buf();
    }

    let destination = storage::with_container_extension(source, target);

    storage::remove_stale(&destination);

    match transcoder.transcode(source, &destination) {
        Ok(()) => {
            let size = storage::file_size(&destination);
            if size == 0 {
                log::warn!(
                    "[Transcode] {} reported success but is missing or empty; keeping {}",
                    destination.display(),
                    source.display()
                );
                storage::remove_stale(&destination);
                return source.to_path_buf();
            }

            if let Err(e) = std::fs::remove_file(source) {
                log::warn!("[Transcode] Failed to remove intermediate {}: {}", source.display(), e);
            }
            log::info!(
                "[Transcode] {} -> {} ({} bytes)",
                source.display(),
                destination.display(),
                size
            );
            destination
        }
        Err(e) => {
            log::warn!("[Transcode] {}; delivering {}", e, source.display());
            storage::remove_stale(&destination);
            source.to_path_buf()
        }
    }
}
