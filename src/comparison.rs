//! Comparison data model
//!
//! Types shared by the comparator, the batch runner and the report assembler.
//! [`ComparisonResult`] serializes to exactly the `diff` object found in a
//! visual regression report, and [`TestOutcome`] to one entry of its `tests`
//! array.

use image::RgbaImage;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One reference/candidate comparison request.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonInput<'a> {
  /// The accepted baseline bitmap.
  pub reference: &'a RgbaImage,
  /// The newly captured bitmap under evaluation.
  pub candidate: &'a RgbaImage,
  /// Maximum tolerated mismatch percentage (strictly-greater fails).
  pub mismatch_threshold: f64,
  /// Whether a dimension difference alone fails the comparison.
  pub require_same_dimensions: bool,
}

impl<'a> ComparisonInput<'a> {
  /// Creates an input with a zero threshold and lenient dimension handling.
  pub fn new(reference: &'a RgbaImage, candidate: &'a RgbaImage) -> Self {
    Self {
      reference,
      candidate,
      mismatch_threshold: 0.0,
      require_same_dimensions: false,
    }
  }

  /// Sets the mismatch threshold.
  pub fn with_mismatch_threshold(mut self, threshold: f64) -> Self {
    self.mismatch_threshold = threshold;
    self
  }

  /// Sets whether dimensions must match.
  pub fn with_require_same_dimensions(mut self, require: bool) -> Self {
    self.require_same_dimensions = require;
    self
  }
}

/// Absolute per-axis size difference between two bitmaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDifference {
  pub width: u32,
  pub height: u32,
}

impl DimensionDifference {
  /// Difference between two `(width, height)` pairs.
  pub fn between(a: (u32, u32), b: (u32, u32)) -> Self {
    Self {
      width: a.0.abs_diff(b.0),
      height: a.1.abs_diff(b.1),
    }
  }

  pub fn is_zero(&self) -> bool {
    self.width == 0 && self.height == 0
  }
}

/// Counters gathered by a full per-pixel pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelStatistics {
  /// Pixels inside the overlapping region of both bitmaps.
  pub compared_pixels: u64,
  /// Pixels whose channel difference exceeded the tolerance.
  pub mismatched_pixels: u64,
  /// Pixels over tolerance that were forgiven as anti-aliasing edges.
  pub antialiased_pixels: u64,
  /// `mismatched_pixels / compared_pixels * 100`, unrounded.
  pub raw_mismatch_percentage: f64,
  /// Wall-clock duration of the pass, when timing was requested.
  pub analysis_time_ms: Option<u64>,
}

/// How a comparison arrived at its mismatch figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Analysis {
  /// Buffers were byte-identical; no per-pixel pass ran.
  Identical,
  /// A per-pixel pass ran over the overlapping region.
  Full(PixelStatistics),
}

impl Analysis {
  /// Mismatch percentage used for the verdict (zero for identical buffers).
  pub fn raw_mismatch_percentage(&self) -> f64 {
    match self {
      Analysis::Identical => 0.0,
      Analysis::Full(stats) => stats.raw_mismatch_percentage,
    }
  }

  /// Mismatch percentage as recorded in the report; absent on the fast path.
  pub fn reported_raw_mismatch_percentage(&self) -> Option<f64> {
    match self {
      Analysis::Identical => None,
      Analysis::Full(stats) => Some(stats.raw_mismatch_percentage),
    }
  }

  pub fn analysis_time_ms(&self) -> Option<u64> {
    match self {
      Analysis::Identical => None,
      Analysis::Full(stats) => stats.analysis_time_ms,
    }
  }

  pub fn statistics(&self) -> Option<&PixelStatistics> {
    match self {
      Analysis::Identical => None,
      Analysis::Full(stats) => Some(stats),
    }
  }
}

/// Outcome of a single pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Pass,
  Fail,
  /// The pair could not be compared at all (unreadable or undecodable input).
  Error,
}

impl Status {
  /// Pass/fail rule for a completed comparison.
  ///
  /// The threshold comparison is strict: a mismatch equal to the threshold passes.
  pub fn verdict(
    is_same_dimensions: bool,
    require_same_dimensions: bool,
    raw_mismatch_percentage: f64,
    mismatch_threshold: f64,
  ) -> Status {
    if require_same_dimensions && !is_same_dimensions {
      return Status::Fail;
    }
    if raw_mismatch_percentage > mismatch_threshold {
      return Status::Fail;
    }
    Status::Pass
  }

  pub fn is_failure(&self) -> bool {
    !matches!(self, Status::Pass)
  }

  pub fn label(&self) -> &'static str {
    match self {
      Status::Pass => "pass",
      Status::Fail => "fail",
      Status::Error => "error",
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Renders a mismatch percentage with exactly two decimals, rounding half-up.
///
/// ```
/// use shotdiff::comparison::format_mismatch_percentage;
///
/// assert_eq!(format_mismatch_percentage(1.0559529987397138), "1.06");
/// assert_eq!(format_mismatch_percentage(0.0), "0.00");
/// ```
pub fn format_mismatch_percentage(raw: f64) -> String {
  // f64::round is half-away-from-zero, which is half-up for non-negative input.
  let rounded = (raw * 100.0).round() / 100.0;
  format!("{rounded:.2}")
}

/// The report's `diff` object for one pair. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
  is_same_dimensions: bool,
  dimension_difference: DimensionDifference,
  analysis: Analysis,
  mismatch_percentage: String,
  diff_image: Option<String>,
  status: Status,
}

impl ComparisonResult {
  pub(crate) fn new(
    is_same_dimensions: bool,
    dimension_difference: DimensionDifference,
    analysis: Analysis,
    status: Status,
    diff_image: Option<String>,
  ) -> Self {
    Self {
      is_same_dimensions,
      dimension_difference,
      mismatch_percentage: format_mismatch_percentage(analysis.raw_mismatch_percentage()),
      analysis,
      diff_image,
      status,
    }
  }

  pub fn is_same_dimensions(&self) -> bool {
    self.is_same_dimensions
  }

  pub fn dimension_difference(&self) -> DimensionDifference {
    self.dimension_difference
  }

  pub fn analysis(&self) -> &Analysis {
    &self.analysis
  }

  /// Unrounded mismatch, absent when the identical fast path was taken.
  pub fn raw_mismatch_percentage(&self) -> Option<f64> {
    self.analysis.reported_raw_mismatch_percentage()
  }

  /// Two-decimal rendering of the mismatch, e.g. `"0.07"`.
  pub fn mismatch_percentage(&self) -> &str {
    &self.mismatch_percentage
  }

  pub fn analysis_time(&self) -> Option<u64> {
    self.analysis.analysis_time_ms()
  }

  /// Report-relative path of the diff artifact; set iff the comparison failed.
  pub fn diff_image(&self) -> Option<&str> {
    self.diff_image.as_deref()
  }

  pub fn status(&self) -> Status {
    self.status
  }
}

impl Serialize for ComparisonResult {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Wire<'a> {
      is_same_dimensions: bool,
      dimension_difference: DimensionDifference,
      #[serde(
        rename = "rawMisMatchPercentage",
        skip_serializing_if = "Option::is_none"
      )]
      raw_mismatch_percentage: Option<f64>,
      #[serde(rename = "misMatchPercentage")]
      mismatch_percentage: &'a str,
      #[serde(skip_serializing_if = "Option::is_none")]
      analysis_time: Option<u64>,
      #[serde(skip_serializing_if = "Option::is_none")]
      diff_image: Option<&'a str>,
    }

    Wire {
      is_same_dimensions: self.is_same_dimensions,
      dimension_difference: self.dimension_difference,
      raw_mismatch_percentage: self.raw_mismatch_percentage(),
      mismatch_percentage: &self.mismatch_percentage,
      analysis_time: self.analysis_time(),
      diff_image: self.diff_image(),
    }
    .serialize(serializer)
  }
}

/// Identifying metadata for a pair. Opaque to the comparator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPair {
  /// Reference bitmap path, relative to the report.
  pub reference: String,
  /// Candidate bitmap path, relative to the report.
  pub test: String,
  pub selector: String,
  pub file_name: String,
  pub label: String,
  pub require_same_dimensions: bool,
  #[serde(rename = "misMatchThreshold")]
  pub mismatch_threshold: f64,
  pub url: String,
  pub reference_url: String,
  pub expect: u32,
  pub viewport_label: String,
}

impl TestPair {
  /// Builds pair metadata from a bitmap file name.
  ///
  /// Names following `<label>_<selectorIndex>_<selector>_<viewportIndex>_<viewportLabel>.png`
  /// are split into their parts; anything else keeps the file stem as the label.
  pub fn from_file_name(file_name: &str) -> Self {
    let stem = file_name
      .strip_suffix(".png")
      .or_else(|| file_name.strip_suffix(".PNG"))
      .unwrap_or(file_name);

    let mut pair = TestPair {
      file_name: file_name.to_string(),
      label: stem.to_string(),
      ..TestPair::default()
    };

    let parts: Vec<&str> = stem.rsplitn(5, '_').collect();
    if let [viewport_label, viewport_index, selector, selector_index, label] = parts.as_slice() {
      let indices_ok =
        viewport_index.parse::<usize>().is_ok() && selector_index.parse::<usize>().is_ok();
      if indices_ok && !label.is_empty() {
        pair.label = label.to_string();
        pair.selector = selector.to_string();
        pair.viewport_label = viewport_label.to_string();
      }
    }

    pair
  }
}

/// One entry of the report's `tests` array.
///
/// The status is always derived: from the comparison result for compared pairs,
/// or [`Status::Error`] for pairs that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
  pair: TestPair,
  #[serde(skip_serializing_if = "Option::is_none")]
  diff: Option<ComparisonResult>,
  status: Status,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

impl TestOutcome {
  pub fn compared(pair: TestPair, diff: ComparisonResult) -> Self {
    let status = diff.status();
    Self {
      pair,
      diff: Some(diff),
      status,
      error: None,
    }
  }

  pub fn errored(pair: TestPair, error: impl fmt::Display) -> Self {
    Self {
      pair,
      diff: None,
      status: Status::Error,
      error: Some(error.to_string()),
    }
  }

  pub fn pair(&self) -> &TestPair {
    &self.pair
  }

  pub fn diff(&self) -> Option<&ComparisonResult> {
    self.diff.as_ref()
  }

  pub fn status(&self) -> Status {
    self.status
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }
}
