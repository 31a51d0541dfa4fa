//! Zip archive helpers shared by the materializer steps.
//!
//! Extraction creates the destination (and parents) if absent, skips entry
//! names that would escape it, and overwrites existing files, so re-running
//! a materializer replaces rather than duplicates.

use std::io::Read;
use std::path::{Path, PathBuf};

use wheatdet_core::error::StepError;

fn archive_err(step: &str, path: &Path, e: impl std::fmt::Display) -> StepError {
    StepError::ArchiveFailed {
        step: step.to_string(),
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn open_archive(step: &str, path: &Path) -> Result<zip::ZipArchive<std::fs::File>, StepError> {
    if !path.exists() {
        return Err(StepError::MissingArtifact {
            step: step.to_string(),
            path: path.to_path_buf(),
        });
    }
    let file = std::fs::File::open(path).map_err(|e| archive_err(step, path, e))?;
    zip::ZipArchive::new(file).map_err(|e| archive_err(step, path, e))
}

/// Number of file entries (directories excluded) in the archive.
pub fn entry_count(step: &str, archive_path: &Path) -> Result<usize, StepError> {
    let mut archive = open_archive(step, archive_path)?;
    let mut files = 0;
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| archive_err(step, archive_path, e))?;
        if !entry.is_dir() {
            files += 1;
        }
    }
    Ok(files)
}

/// Entry names in the archive, in archive order.
pub fn list_entries(step: &str, archive_path: &Path) -> Result<Vec<String>, StepError> {
    let mut archive = open_archive(step, archive_path)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| archive_err(step, archive_path, e))?;
        names.push(entry.name().to_string());
    }
    Ok(names)
}

/// Extract `archive_path` into `dest`, returning the number of files written.
///
/// A missing archive is a `MissingArtifact` error, not a silent no-op.
pub fn extract_zip(step: &str, archive_path: &Path, dest: &Path) -> Result<usize, StepError> {
    let mut archive = open_archive(step, archive_path)?;
    std::fs::create_dir_all(dest).map_err(|e| archive_err(step, dest, e))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_err(step, archive_path, e))?;
        let name = entry.name().to_string();
        // Path traversal guard: drop entries that would escape dest.
        if name.contains("..") || Path::new(&name).is_absolute() {
            continue;
        }
        let out_path: PathBuf = dest.join(&name);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| archive_err(step, &out_path, e))?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| archive_err(step, parent, e))?;
            }
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| archive_err(step, archive_path, e))?;
            std::fs::write(&out_path, &buf).map_err(|e| archive_err(step, &out_path, e))?;
            extracted += 1;
        }
    }
    Ok(extracted)
}
