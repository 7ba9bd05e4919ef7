//! Configuration sourced from `SHOTDIFF_*` environment variables.
//!
//! Values are captured once (via [`EnvOverrides::from_env`]) and then applied on top of a base
//! [`CompareConfig`]. Command-line flags are expected to be applied after the overrides so they
//! take precedence. Callers can construct overrides from a map to avoid touching the process
//! environment.

use crate::error::{ConfigError, Error, Result};
use crate::image_compare::CompareConfig;
use std::collections::HashMap;

pub const TOLERANCE_ENV: &str = "SHOTDIFF_TOLERANCE";
pub const IGNORE_ALPHA_ENV: &str = "SHOTDIFF_IGNORE_ALPHA";
pub const IGNORE_ANTIALIASING_ENV: &str = "SHOTDIFF_IGNORE_ANTIALIASING";
pub const TIMING_ENV: &str = "SHOTDIFF_TIMING";
pub const THREADS_ENV: &str = "SHOTDIFF_THREADS";

const ENV_PREFIX: &str = "SHOTDIFF_";

/// Rejects thresholds that cannot take part in a strict `>` comparison.
///
/// Values above 100 are accepted (they make every comparison pass), as is `+inf`.
pub fn validate_mismatch_threshold(value: f64) -> Result<f64> {
  if value.is_nan() || value < 0.0 {
    return Err(Error::Config(ConfigError::InvalidThreshold { value }));
  }
  Ok(value)
}

/// Raw `SHOTDIFF_*` key/value pairs.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
  raw: HashMap<String, String>,
}

impl EnvOverrides {
  /// Collect all `SHOTDIFF_*` variables from the process environment.
  pub fn from_env() -> Self {
    let raw = std::env::vars()
      .filter(|(k, _)| k.starts_with(ENV_PREFIX))
      .collect::<HashMap<_, _>>();
    Self { raw }
  }

  pub fn from_map(raw: HashMap<String, String>) -> Self {
    Self { raw }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.raw.get(key).map(String::as_str)
  }

  /// Present and not `0`/`false`/`off`.
  pub fn truthy(&self, key: &str) -> bool {
    self
      .get(key)
      .map(|v| !matches_ignore_case(v.trim(), &["0", "false", "off"]))
      .unwrap_or(false)
  }

  /// Apply the overrides on top of `base`.
  pub fn apply(&self, base: CompareConfig) -> Result<CompareConfig> {
    let mut config = base;
    if let Some(raw) = self.get(TOLERANCE_ENV) {
      let tolerance = raw
        .trim()
        .parse::<u8>()
        .map_err(|e| invalid_value(TOLERANCE_ENV, raw, e))?;
      config = config.with_channel_tolerance(tolerance);
    }
    if self.truthy(IGNORE_ALPHA_ENV) {
      config = config.with_compare_alpha(false);
    }
    if self.truthy(IGNORE_ANTIALIASING_ENV) {
      config = config.with_ignore_antialiasing(true);
    }
    if self.truthy(TIMING_ENV) {
      config = config.with_record_timing(true);
    }
    Ok(config)
  }

  /// Worker thread count override. Zero is rejected.
  pub fn threads(&self) -> Result<Option<usize>> {
    let Some(raw) = self.get(THREADS_ENV) else {
      return Ok(None);
    };
    let threads = raw
      .trim()
      .parse::<usize>()
      .map_err(|e| invalid_value(THREADS_ENV, raw, e))?;
    if threads == 0 {
      return Err(invalid_value(THREADS_ENV, raw, "must be > 0"));
    }
    Ok(Some(threads))
  }
}

fn invalid_value(key: &str, value: &str, reason: impl ToString) -> Error {
  Error::Config(ConfigError::InvalidValue {
    key: key.to_string(),
    value: value.to_string(),
    reason: reason.to_string(),
  })
}

fn matches_ignore_case(value: &str, candidates: &[&str]) -> bool {
  candidates.iter().any(|c| value.eq_ignore_ascii_case(c))
}
