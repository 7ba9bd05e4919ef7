//! Visual regression comparison engine.
//!
//! Compares a reference screenshot against a candidate screenshot and produces
//! the per-pair `diff` record of a visual regression report: dimension check,
//! mismatch statistics, pass/fail verdict and an optional diff image.
//!
//! ```
//! use image::{Rgba, RgbaImage};
//! use shotdiff::{compare, CompareConfig, ComparisonInput, Status};
//!
//! let reference = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
//! let candidate = reference.clone();
//! let input = ComparisonInput::new(&reference, &candidate).with_mismatch_threshold(0.1);
//! let comparison = compare(&input, &CompareConfig::default()).unwrap();
//! assert_eq!(comparison.status(), Status::Pass);
//! assert_eq!(comparison.mismatch_percentage(), "0.00");
//! ```

pub mod batch;
pub mod comparison;
pub mod config;
pub mod error;
pub mod image_compare;
pub mod image_output;
pub mod report;

pub use batch::{BatchOutcome, BatchRunner, CancelToken, PairJob, ReferenceCache};
pub use comparison::{
  Analysis, ComparisonInput, ComparisonResult, DimensionDifference, PixelStatistics, Status,
  TestOutcome, TestPair,
};
pub use error::{Error, Result};
pub use image_compare::{compare, compare_png, CompareConfig, ImageComparison};
pub use image_output::DiffArtifactWriter;
pub use report::{write_json_report, Report, ReportTotals};
