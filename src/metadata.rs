use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use tempfile::TempPath;

const EXIFTOOL: &str = "exiftool";
const SOFTWARE_TAG: &str = "photo-uploader";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("exiftool was not found in PATH")]
    NotInstalled,
    #[error("failed to prepare copy of {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("exiftool failed on {} (exit code {code}): {stderr}", path.display())]
    Tool { path: PathBuf, code: i32, stderr: String },
}

/// Writes a capture date into a copy of an image. The original is never
/// modified; the copy is deleted when the returned path is dropped.
pub trait DateRewriter: Send + Sync {
    fn rewrite_capture_date(&self, path: &Path, date: DateTime<Utc>) -> Result<TempPath, MetadataError>;
}

/// `DateTime`/`DateTimeOriginal` rewriting through the external `exiftool` binary.
pub struct ExifToolRewriter {
    program: PathBuf,
}

impl ExifToolRewriter {
    pub fn detect() -> Result<Self, MetadataError> {
        let program = which::which(EXIFTOOL).map_err(|_| MetadataError::NotInstalled)?;
        tracing::debug!("[metadata] using {}", program.display());
        Ok(Self { program })
    }

    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self { program: program.into() }
    }
}

/// EXIF timestamp layout.
pub fn exif_timestamp(date: DateTime<Utc>) -> String {
    date.format("%Y:%m:%d %H:%M:%S").to_string()
}

impl DateRewriter for ExifToolRewriter {
    fn rewrite_capture_date(&self, path: &Path, date: DateTime<Utc>) -> Result<TempPath, MetadataError> {
        let io_err = |source| MetadataError::Io { path: path.to_path_buf(), source };
        // keep the extension so exiftool picks the right writer
        let suffix = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let tmp = tempfile::Builder::new()
            .prefix("pu-")
            .suffix(&suffix)
            .tempfile()
            .map_err(io_err)?
            .into_temp_path();
        std::fs::copy(path, &tmp).map_err(io_err)?;

        let ts = exif_timestamp(date);
        let output = Command::new(&self.program)
            .arg("-q")
            .arg("-overwrite_original")
            .arg(format!("-DateTime={}", ts))
            .arg(format!("-DateTimeOriginal={}", ts))
            .arg(format!("-ProcessingSoftware={}", SOFTWARE_TAG))
            .arg(tmp.as_os_str())
            .output()
            .map_err(io_err)?;
        if !output.status.success() {
            return Err(MetadataError::Tool {
                path: path.to_path_buf(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::debug!("[metadata] {} -> {} date={}", path.display(), tmp.display(), ts);
        Ok(tmp)
    }
}
