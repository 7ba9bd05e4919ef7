use crate::error::{Error, OutputError, Result};
use image::{ImageFormat, RgbaImage};
use pathdiff::diff_paths;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// File name prefix of persisted diff images.
pub const DIFF_FILE_PREFIX: &str = "failed_diff_";

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
  let mut buffer = Vec::new();
  image
    .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
    .map_err(|e| {
      Error::Output(OutputError::EncodeFailed {
        format: "PNG".to_string(),
        reason: e.to_string(),
      })
    })?;
  Ok(buffer)
}

/// `failed_diff_<test file name>`, placed next to the test bitmap.
pub fn diff_path_for(test_bitmap: &Path) -> PathBuf {
  let file_name = test_bitmap
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| "bitmap.png".to_string());
  test_bitmap.with_file_name(format!("{DIFF_FILE_PREFIX}{file_name}"))
}

/// Produce a path relative to the report directory (falls back to `target`).
///
/// Separators are always forward slashes so reports are portable.
pub fn path_for_report(base: &Path, target: &Path) -> String {
  let path = diff_paths(target, base).unwrap_or_else(|| target.to_path_buf());
  let rendered = path.display().to_string();
  if cfg!(windows) {
    rendered.replace('\\', "/")
  } else {
    rendered
  }
}

/// Ensure the parent directory for a file exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent).map_err(|e| {
        Error::Output(OutputError::WriteFailed {
          path: parent.display().to_string(),
          reason: e.to_string(),
        })
      })?;
    }
  }
  Ok(())
}

/// Persists diff images and reports their location relative to the report.
#[derive(Debug, Clone)]
pub struct DiffArtifactWriter {
  report_dir: PathBuf,
}

impl DiffArtifactWriter {
  pub fn new(report_dir: impl Into<PathBuf>) -> Self {
    Self {
      report_dir: report_dir.into(),
    }
  }

  pub fn report_dir(&self) -> &Path {
    &self.report_dir
  }

  /// Writes `image` beside `test_bitmap` and returns its report-relative path.
  pub fn write(&self, test_bitmap: &Path, image: &RgbaImage) -> Result<String> {
    let path = diff_path_for(test_bitmap);
    let bytes = encode_png(image)?;
    ensure_parent_dir(&path)?;
    fs::write(&path, bytes).map_err(|e| {
      Error::Output(OutputError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
      })
    })?;
    Ok(path_for_report(&self.report_dir, &path))
  }
}
