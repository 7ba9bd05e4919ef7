//! Parallel comparison of many reference/candidate pairs.
//!
//! Every pair is independent: a pair whose bitmaps cannot be read or decoded
//! becomes a [`Status::Error`] outcome without affecting the rest of the batch.
//! Reference bitmaps are decoded once and shared read-only between workers,
//! since the same reference is commonly compared across several viewports.

use crate::comparison::{ComparisonInput, ComparisonResult, Status, TestOutcome, TestPair};
use crate::config::validate_mismatch_threshold;
use crate::error::{ConfigError, Error, Result};
use crate::image_compare::{compare, load_png, CompareConfig};
use crate::image_output::DiffArtifactWriter;
use image::RgbaImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// One pair to compare, with the on-disk locations of its bitmaps.
#[derive(Debug, Clone)]
pub struct PairJob {
  pub pair: TestPair,
  pub reference_path: PathBuf,
  pub test_path: PathBuf,
}

/// Cooperative cancellation shared between the caller and workers.
///
/// Checked between pairs; a pair already in its pixel loop runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }
}

/// Decoded reference bitmaps keyed by path. Entries are never mutated after insertion.
#[derive(Debug, Default)]
pub struct ReferenceCache {
  entries: RwLock<HashMap<PathBuf, Arc<RgbaImage>>>,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl ReferenceCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the cached bitmap or decodes it.
  ///
  /// Two workers missing on the same path may both decode it; the first insert wins.
  pub fn get_or_load(&self, path: &Path) -> Result<Arc<RgbaImage>> {
    if let Some(image) = self.read_entries().get(path) {
      self.hits.fetch_add(1, Ordering::Relaxed);
      return Ok(Arc::clone(image));
    }
    self.misses.fetch_add(1, Ordering::Relaxed);
    let decoded = Arc::new(load_png(path)?);
    let mut entries = self
      .entries
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(Arc::clone(
      entries.entry(path.to_path_buf()).or_insert(decoded),
    ))
  }

  pub fn len(&self) -> usize {
    self.read_entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn hits(&self) -> u64 {
    self.hits.load(Ordering::Relaxed)
  }

  pub fn misses(&self) -> u64 {
    self.misses.load(Ordering::Relaxed)
  }

  fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, Arc<RgbaImage>>> {
    self
      .entries
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
  pub outcomes: Vec<TestOutcome>,
  /// Pairs skipped because the batch was cancelled.
  pub cancelled: usize,
}

impl BatchOutcome {
  pub fn count(&self, status: Status) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| o.status() == status)
      .count()
  }
}

/// Runs [`compare`] over many pairs on a rayon pool.
#[derive(Debug)]
pub struct BatchRunner {
  config: CompareConfig,
  writer: DiffArtifactWriter,
  threads: Option<usize>,
  cache: ReferenceCache,
}

impl BatchRunner {
  pub fn new(config: CompareConfig, writer: DiffArtifactWriter) -> Self {
    Self {
      config,
      writer,
      threads: None,
      cache: ReferenceCache::new(),
    }
  }

  /// Run on a dedicated pool with `threads` workers instead of the global pool.
  pub fn with_threads(mut self, threads: usize) -> Self {
    self.threads = Some(threads);
    self
  }

  pub fn config(&self) -> &CompareConfig {
    &self.config
  }

  pub fn cache(&self) -> &ReferenceCache {
    &self.cache
  }

  /// Compare every job.
  ///
  /// Thresholds are validated up front, so a malformed threshold fails the whole
  /// batch before any comparison runs. Per-pair I/O and decode failures never do.
  pub fn run(&self, jobs: &[PairJob], cancel: &CancelToken) -> Result<BatchOutcome> {
    for job in jobs {
      validate_mismatch_threshold(job.pair.mismatch_threshold)?;
    }

    let work = || -> Vec<Option<TestOutcome>> {
      jobs
        .par_iter()
        .map(|job| {
          if cancel.is_cancelled() {
            None
          } else {
            Some(self.run_pair(job))
          }
        })
        .collect()
    };

    let results = match self.threads {
      Some(threads) => {
        let pool = ThreadPoolBuilder::new()
          .num_threads(threads)
          .build()
          .map_err(|e| {
            Error::Config(ConfigError::ThreadPool {
              threads,
              reason: e.to_string(),
            })
          })?;
        pool.install(work)
      }
      None => work(),
    };

    let cancelled = results.iter().filter(|r| r.is_none()).count();
    let outcomes: Vec<TestOutcome> = results.into_iter().flatten().collect();
    let batch = BatchOutcome {
      outcomes,
      cancelled,
    };
    info!(
      "compared {} pairs: {} pass, {} fail, {} error, {} cancelled",
      batch.outcomes.len(),
      batch.count(Status::Pass),
      batch.count(Status::Fail),
      batch.count(Status::Error),
      batch.cancelled
    );
    Ok(batch)
  }

  /// Compare one pair, isolating any failure into an error outcome.
  pub fn run_pair(&self, job: &PairJob) -> TestOutcome {
    match self.try_run_pair(job) {
      Ok(result) => {
        debug!(
          "{}: {} ({}%)",
          job.pair.file_name,
          result.status(),
          result.mismatch_percentage()
        );
        TestOutcome::compared(job.pair.clone(), result)
      }
      Err(err) => {
        warn!("{}: {err}", job.pair.file_name);
        TestOutcome::errored(job.pair.clone(), err)
      }
    }
  }

  fn try_run_pair(&self, job: &PairJob) -> Result<ComparisonResult> {
    let reference = self.cache.get_or_load(&job.reference_path)?;
    let candidate = load_png(&job.test_path)?;
    let input = ComparisonInput::new(&reference, &candidate)
      .with_mismatch_threshold(job.pair.mismatch_threshold)
      .with_require_same_dimensions(job.pair.require_same_dimensions);
    compare(&input, &self.config)?.finish(|diff| self.writer.write(&job.test_path, diff))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::image_output::encode_png;
  use image::Rgba;
  use std::fs;

  fn write_png(path: &Path, image: &RgbaImage) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, encode_png(image).unwrap()).unwrap();
  }

  #[test]
  fn cache_decodes_each_reference_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ref.png");
    write_png(&path, &RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])));

    let cache = ReferenceCache::new();
    let first = cache.get_or_load(&path).unwrap();
    let second = cache.get_or_load(&path).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.misses(), 1);
    assert_eq!(cache.hits(), 1);
  }

  #[test]
  fn cache_reports_missing_files() {
    let cache = ReferenceCache::new();
    let err = cache
      .get_or_load(Path::new("/definitely/not/here.png"))
      .unwrap_err();
    assert!(err.to_string().contains("here.png"), "{err}");
    assert!(cache.is_empty());
  }

  #[test]
  fn invalid_threshold_rejects_batch_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let runner = BatchRunner::new(
      CompareConfig::default(),
      DiffArtifactWriter::new(dir.path()),
    );
    let job = PairJob {
      pair: TestPair {
        mismatch_threshold: f64::NAN,
        ..TestPair::default()
      },
      reference_path: dir.path().join("missing_ref.png"),
      test_path: dir.path().join("missing_test.png"),
    };
    let err = runner.run(&[job], &CancelToken::new()).unwrap_err();
    assert!(err.is_invalid_threshold());
  }

  #[test]
  fn cancelled_batch_skips_all_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let runner = BatchRunner::new(
      CompareConfig::default(),
      DiffArtifactWriter::new(dir.path()),
    );
    let jobs: Vec<PairJob> = (0..4)
      .map(|i| PairJob {
        pair: TestPair::from_file_name(&format!("p{i}.png")),
        reference_path: dir.path().join(format!("r{i}.png")),
        test_path: dir.path().join(format!("t{i}.png")),
      })
      .collect();
    let cancel = CancelToken::new();
    cancel.cancel();
    let batch = runner.run(&jobs, &cancel).unwrap();
    assert!(batch.outcomes.is_empty());
    assert_eq!(batch.cancelled, 4);
  }
}
