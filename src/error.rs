//! Error types for shotdiff
//!
//! Errors are grouped by subsystem:
//! - Image errors (reading and decoding bitmaps)
//! - Config errors (thresholds, environment overrides, thread pools)
//! - Output errors (encoding and persisting diff artifacts)
//!
//! A dimension mismatch between two bitmaps is deliberately *not* an error; it
//! is a regular comparison outcome recorded on the result.
//!
//! All errors use the `thiserror` crate for minimal boilerplate and
//! proper error trait implementations.

use thiserror::Error;

/// Result type alias for shotdiff operations
///
/// # Examples
///
/// ```
/// use shotdiff::Result;
///
/// fn load() -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for shotdiff
///
/// Each variant wraps a more specific error type for that subsystem.
///
/// # Examples
///
/// ```
/// use shotdiff::Error;
/// use shotdiff::error::ConfigError;
///
/// fn validate() -> Result<(), Error> {
///     Err(Error::Config(ConfigError::InvalidThreshold { value: -1.0 }))
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
  /// Bitmap reading or decoding error
  #[error("Image error: {0}")]
  Image(#[from] ImageError),

  /// Invalid comparison or batch configuration
  #[error("Config error: {0}")]
  Config(#[from] ConfigError),

  /// Diff artifact encoding or writing error
  #[error("Output error: {0}")]
  Output(#[from] OutputError),

  /// I/O error
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Generic error for miscellaneous issues
  #[error("{0}")]
  Other(String),
}

impl Error {
  /// Returns true when the error originated from decoding a bitmap.
  pub fn is_decode(&self) -> bool {
    matches!(self, Error::Image(ImageError::DecodeFailed { .. }))
  }

  /// Returns true when the error is a rejected mismatch threshold.
  pub fn is_invalid_threshold(&self) -> bool {
    matches!(self, Error::Config(ConfigError::InvalidThreshold { .. }))
  }
}

/// Errors that occur while loading bitmaps
///
/// # Examples
///
/// ```
/// use shotdiff::error::ImageError;
///
/// let error = ImageError::DecodeFailed {
///     source_name: "bitmaps_reference/alert.png".to_string(),
///     reason: "invalid PNG signature".to_string(),
/// };
/// assert!(error.to_string().contains("alert.png"));
/// ```
#[derive(Error, Debug, Clone)]
pub enum ImageError {
  /// The bitmap could not be read from disk
  #[error("Failed to read image '{path}': {reason}")]
  ReadFailed { path: String, reason: String },

  /// The bytes could not be decoded into a raster buffer
  #[error("Failed to decode image '{source_name}': {reason}")]
  DecodeFailed { source_name: String, reason: String },
}

/// Errors in comparison configuration
///
/// These are expected to surface before any comparison runs.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
  /// Mismatch threshold is NaN or negative
  #[error("Invalid mismatch threshold {value}: must be a number >= 0")]
  InvalidThreshold { value: f64 },

  /// An environment override could not be parsed
  #[error("Invalid {key} '{value}': {reason}")]
  InvalidValue {
    key: String,
    value: String,
    reason: String,
  },

  /// The worker pool could not be created
  #[error("Failed to build worker pool with {threads} threads: {reason}")]
  ThreadPool { threads: usize, reason: String },
}

/// Errors that occur while producing diff artifacts
#[derive(Error, Debug, Clone)]
pub enum OutputError {
  /// Image encoding failed
  #[error("Failed to encode image as {format}: {reason}")]
  EncodeFailed { format: String, reason: String },

  /// Writing an artifact to disk failed
  #[error("Failed to write '{path}': {reason}")]
  WriteFailed { path: String, reason: String },
}
