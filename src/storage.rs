// Output file allocation for recordings

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::encoding::ContainerFormat;

/// Collision suffixes tried before giving up on a timestamp
const MAX_SUFFIX: u32 = 1000;

/// Build `<dir>/<prefix>_<unix millis>.<ext>`
pub fn recording_path(
    dir: &Path,
    prefix: &str,
    at: DateTime<Utc>,
    format: ContainerFormat,
) -> PathBuf {
    dir.join(format!("{}_{}.{}", prefix, at.timestamp_millis(), format.extension()))
}

/// Choose the intermediate file path for a new recording.
///
/// The stem is never one an existing recording uses in any container format,
/// so a delivered file cannot be overwritten by a later recording or its
/// transcode. Recordings started in the same millisecond get `_1`, `_2`, ...
pub fn allocate_output(
    dir: &Path,
    prefix: &str,
    format: ContainerFormat,
) -> std::io::Result<PathBuf> {
    allocate_output_at(dir, prefix, Utc::now(), format)
}

fn allocate_output_at(
    dir: &Path,
    prefix: &str,
    at: DateTime<Utc>,
    format: ContainerFormat,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let base = recording_path(dir, prefix, at, format);
    if !stem_in_use(&base) {
        return Ok(base);
    }

    let stem = format!("{}_{}", prefix, at.timestamp_millis());
    for n in 1..=MAX_SUFFIX {
        let candidate = dir.join(format!("{}_{}.{}", stem, n, format.extension()));
        if !stem_in_use(&candidate) {
            log::debug!("{} is taken, using {}", base.display(), candidate.display());
            return Ok(candidate);
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free recording name for {}", stem),
    ))
}

/// Whether a file with this stem exists in any container format
fn stem_in_use(path: &Path) -> bool {
    ContainerFormat::ALL
        .iter()
        .any(|format| with_container_extension(path, *format).exists())
}

/// Remove a file if it exists. Failure is logged, not fatal: the writer will
/// overwrite the path anyway.
pub fn remove_stale(path: &Path) {
    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => log::debug!("Removed stale file {}", path.display()),
            Err(e) => log::warn!("Failed to clean up stale file {}: {}", path.display(), e),
        }
    }
}

/// Same path with the extension of another container format
pub fn with_container_extension(path: &Path, format: ContainerFormat) -> PathBuf {
    path.with_extension(format.extension())
}

/// Size of a file in bytes, 0 if it does not exist
pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
