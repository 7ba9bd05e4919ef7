use crate::comparison::{
  format_mismatch_percentage, Analysis, ComparisonInput, ComparisonResult, DimensionDifference,
  PixelStatistics, Status,
};
use crate::config::validate_mismatch_threshold;
use crate::error::{Error, ImageError, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use log::debug;
use std::path::Path;
use std::time::Instant;

/// Default per-channel tolerance (0-255) below which differences are ignored.
pub const DEFAULT_CHANNEL_TOLERANCE: u8 = 16;

/// Luma difference (0-255) at which a neighbour counts as high contrast.
pub const ANTIALIAS_CONTRAST: f64 = 48.0;

/// Default highlight for mismatched pixels in the diff image (magenta).
pub const DEFAULT_HIGHLIGHT: [u8; 4] = [255, 0, 255, 255];

/// Diff image colour for pixels outside the overlap of both bitmaps (yellow).
pub const OUT_OF_BOUNDS: [u8; 4] = [255, 255, 0, 255];

/// Tolerance policy for comparing two bitmaps.
///
/// A pixel is mismatched when the absolute difference of any compared channel
/// exceeds `channel_tolerance`. With `ignore_antialiasing`, mismatched pixels that
/// sit on a high-contrast edge in either bitmap are forgiven.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareConfig {
  /// Maximum allowed difference per color channel (0-255).
  pub channel_tolerance: u8,
  /// Whether to compare the alpha channel. When false, alpha is ignored.
  pub compare_alpha: bool,
  /// Forgive mismatches on anti-aliased edges.
  pub ignore_antialiasing: bool,
  /// Record the duration of the pixel pass as `analysisTime`.
  pub record_timing: bool,
  /// RGBA used for mismatched pixels in the diff image.
  pub highlight_color: [u8; 4],
}

impl Default for CompareConfig {
  fn default() -> Self {
    Self {
      channel_tolerance: DEFAULT_CHANNEL_TOLERANCE,
      compare_alpha: true,
      ignore_antialiasing: false,
      record_timing: false,
      highlight_color: DEFAULT_HIGHLIGHT,
    }
  }
}

impl CompareConfig {
  /// Strict comparison: any channel difference is a mismatch.
  pub fn strict() -> Self {
    Self {
      channel_tolerance: 0,
      ..Self::default()
    }
  }

  /// Default tolerance plus anti-aliasing forgiveness.
  pub fn antialiasing_aware() -> Self {
    Self {
      ignore_antialiasing: true,
      ..Self::default()
    }
  }

  pub fn with_channel_tolerance(mut self, tolerance: u8) -> Self {
    self.channel_tolerance = tolerance;
    self
  }

  pub fn with_compare_alpha(mut self, compare: bool) -> Self {
    self.compare_alpha = compare;
    self
  }

  pub fn with_ignore_antialiasing(mut self, ignore: bool) -> Self {
    self.ignore_antialiasing = ignore;
    self
  }

  pub fn with_record_timing(mut self, record: bool) -> Self {
    self.record_timing = record;
    self
  }

  pub fn with_highlight_color(mut self, color: [u8; 4]) -> Self {
    self.highlight_color = color;
    self
  }
}

/// In-memory result of [`compare`], before the diff image is persisted.
#[derive(Debug, Clone)]
pub struct ImageComparison {
  is_same_dimensions: bool,
  dimension_difference: DimensionDifference,
  reference_dimensions: (u32, u32),
  candidate_dimensions: (u32, u32),
  analysis: Analysis,
  status: Status,
  diff_image: Option<RgbaImage>,
}

impl ImageComparison {
  pub fn status(&self) -> Status {
    self.status
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

  pub fn raw_mismatch_percentage(&self) -> f64 {
    self.analysis.raw_mismatch_percentage()
  }

  pub fn mismatch_percentage(&self) -> String {
    format_mismatch_percentage(self.raw_mismatch_percentage())
  }

  /// Rendered diff; present only for failed comparisons.
  pub fn diff_image(&self) -> Option<&RgbaImage> {
    self.diff_image.as_ref()
  }

  /// Returns a human-readable summary of the comparison result.
  pub fn summary(&self) -> String {
    let (rw, rh) = self.reference_dimensions;
    let (cw, ch) = self.candidate_dimensions;
    let dims = if self.is_same_dimensions {
      format!("{rw}x{rh}")
    } else {
      format!("reference {rw}x{rh}, candidate {cw}x{ch}")
    };
    match &self.analysis {
      Analysis::Identical => format!("{}: identical ({dims})", self.status),
      Analysis::Full(stats) => format!(
        "{}: {} of {} pixels differ ({}%), {} anti-aliased ({dims})",
        self.status,
        stats.mismatched_pixels,
        stats.compared_pixels,
        self.mismatch_percentage(),
        stats.antialiased_pixels,
      ),
    }
  }

  /// Converts into the report's `diff` object.
  ///
  /// `store` persists the diff image and returns its report path. It is only
  /// called for failed comparisons, so `diffImage` is set iff the status is fail.
  pub fn finish<F>(self, store: F) -> Result<ComparisonResult>
  where
    F: FnOnce(&RgbaImage) -> Result<String>,
  {
    let diff_image = match &self.diff_image {
      Some(image) => Some(store(image)?),
      None => None,
    };
    Ok(ComparisonResult::new(
      self.is_same_dimensions,
      self.dimension_difference,
      self.analysis,
      self.status,
      diff_image,
    ))
  }
}

/// Compare a reference and a candidate bitmap.
///
/// Differing dimensions are not an error: the overlapping region is compared and
/// the difference is reported on the result.
pub fn compare(input: &ComparisonInput<'_>, config: &CompareConfig) -> Result<ImageComparison> {
  let threshold = validate_mismatch_threshold(input.mismatch_threshold)?;
  let reference = input.reference;
  let candidate = input.candidate;

  let reference_dimensions = reference.dimensions();
  let candidate_dimensions = candidate.dimensions();
  let is_same_dimensions = reference_dimensions == candidate_dimensions;
  let dimension_difference =
    DimensionDifference::between(reference_dimensions, candidate_dimensions);

  let analysis = if is_same_dimensions && reference.as_raw() == candidate.as_raw() {
    Analysis::Identical
  } else {
    let started = config.record_timing.then(Instant::now);
    let mut stats = scan_overlap(reference, candidate, config);
    stats.analysis_time_ms = started.map(|s| s.elapsed().as_millis() as u64);
    Analysis::Full(stats)
  };

  let status = Status::verdict(
    is_same_dimensions,
    input.require_same_dimensions,
    analysis.raw_mismatch_percentage(),
    threshold,
  );

  let diff_image = match status {
    Status::Fail => Some(render_diff_image(reference, candidate, config)),
    _ => None,
  };

  let comparison = ImageComparison {
    is_same_dimensions,
    dimension_difference,
    reference_dimensions,
    candidate_dimensions,
    analysis,
    status,
    diff_image,
  };
  debug!("compared bitmaps: {}", comparison.summary());
  Ok(comparison)
}

/// Compare two PNG byte buffers.
pub fn compare_png(
  reference: &[u8],
  candidate: &[u8],
  mismatch_threshold: f64,
  require_same_dimensions: bool,
  config: &CompareConfig,
) -> Result<ImageComparison> {
  let reference = decode_png(reference, "reference")?;
  let candidate = decode_png(candidate, "candidate")?;
  let input = ComparisonInput::new(&reference, &candidate)
    .with_mismatch_threshold(mismatch_threshold)
    .with_require_same_dimensions(require_same_dimensions);
  compare(&input, config)
}

/// Decode PNG bytes into an RGBA image. `source_name` only labels errors.
pub fn decode_png(data: &[u8], source_name: &str) -> Result<RgbaImage> {
  image::load_from_memory_with_format(data, ImageFormat::Png)
    .map(|img| img.to_rgba8())
    .map_err(|e| {
      Error::Image(ImageError::DecodeFailed {
        source_name: source_name.to_string(),
        reason: e.to_string(),
      })
    })
}

/// Read and decode a PNG file.
pub fn load_png(path: &Path) -> Result<RgbaImage> {
  let data = std::fs::read(path).map_err(|e| {
    Error::Image(ImageError::ReadFailed {
      path: path.display().to_string(),
      reason: e.to_string(),
    })
  })?;
  decode_png(&data, &path.display().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelClass {
  Match,
  Mismatch,
  Antialiased,
}

fn overlap(reference: &RgbaImage, candidate: &RgbaImage) -> (u32, u32) {
  (
    reference.width().min(candidate.width()),
    reference.height().min(candidate.height()),
  )
}

fn scan_overlap(
  reference: &RgbaImage,
  candidate: &RgbaImage,
  config: &CompareConfig,
) -> PixelStatistics {
  let (width, height) = overlap(reference, candidate);
  let compared_pixels = (width as u64) * (height as u64);

  let mut mismatched_pixels = 0u64;
  let mut antialiased_pixels = 0u64;
  for y in 0..height {
    for x in 0..width {
      match classify_pixel(reference, candidate, x, y, config) {
        PixelClass::Match => {}
        PixelClass::Mismatch => mismatched_pixels += 1,
        PixelClass::Antialiased => antialiased_pixels += 1,
      }
    }
  }

  let raw_mismatch_percentage = if compared_pixels > 0 {
    (mismatched_pixels as f64 / compared_pixels as f64) * 100.0
  } else {
    0.0
  };

  PixelStatistics {
    compared_pixels,
    mismatched_pixels,
    antialiased_pixels,
    raw_mismatch_percentage,
    analysis_time_ms: None,
  }
}

fn classify_pixel(
  reference: &RgbaImage,
  candidate: &RgbaImage,
  x: u32,
  y: u32,
  config: &CompareConfig,
) -> PixelClass {
  let a = reference.get_pixel(x, y);
  let b = candidate.get_pixel(x, y);
  if !exceeds_tolerance(a, b, config) {
    return PixelClass::Match;
  }
  if config.ignore_antialiasing
    && (is_antialiased(reference, x, y) || is_antialiased(candidate, x, y))
  {
    return PixelClass::Antialiased;
  }
  PixelClass::Mismatch
}

fn exceeds_tolerance(a: &Rgba<u8>, b: &Rgba<u8>, config: &CompareConfig) -> bool {
  let channels = if config.compare_alpha { 4 } else { 3 };
  (0..channels).any(|c| a[c].abs_diff(b[c]) > config.channel_tolerance)
}

fn luma(px: &Rgba<u8>) -> f64 {
  0.2126 * px[0] as f64 + 0.7152 * px[1] as f64 + 0.0722 * px[2] as f64
}

/// A pixel sits on an anti-aliased edge when it is an intermediate value between
/// a clearly darker and a clearly brighter neighbour.
fn is_antialiased(image: &RgbaImage, x: u32, y: u32) -> bool {
  let center = luma(image.get_pixel(x, y));
  let (width, height) = (image.width() as i64, image.height() as i64);
  let mut has_darker = false;
  let mut has_brighter = false;
  for dy in -1i64..=1 {
    for dx in -1i64..=1 {
      if dx == 0 && dy == 0 {
        continue;
      }
      let nx = x as i64 + dx;
      let ny = y as i64 + dy;
      if nx < 0 || ny < 0 || nx >= width || ny >= height {
        continue;
      }
      let delta = luma(image.get_pixel(nx as u32, ny as u32)) - center;
      has_darker |= delta < -ANTIALIAS_CONTRAST;
      has_brighter |= delta > ANTIALIAS_CONTRAST;
      if has_darker && has_brighter {
        return true;
      }
    }
  }
  false
}

/// Unchanged pixels fade to a light grey of the reference.
fn faded(px: &Rgba<u8>) -> Rgba<u8> {
  let grey = (luma(px) * 0.3 + 255.0 * 0.7).round().clamp(0.0, 255.0) as u8;
  Rgba([grey, grey, grey, 255])
}

fn render_diff_image(
  reference: &RgbaImage,
  candidate: &RgbaImage,
  config: &CompareConfig,
) -> RgbaImage {
  let width = reference.width().max(candidate.width());
  let height = reference.height().max(candidate.height());
  let (overlap_width, overlap_height) = overlap(reference, candidate);
  let highlight = Rgba(config.highlight_color);

  RgbaImage::from_fn(width, height, |x, y| {
    if x >= overlap_width || y >= overlap_height {
      return Rgba(OUT_OF_BOUNDS);
    }
    match classify_pixel(reference, candidate, x, y, config) {
      PixelClass::Mismatch => highlight,
      PixelClass::Match | PixelClass::Antialiased => faded(reference.get_pixel(x, y)),
    }
  })
}
