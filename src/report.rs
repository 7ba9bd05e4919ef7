//! Report assembly: the `{testSuite, tests, id}` JSON document.

use crate::comparison::{Status, TestOutcome};
use crate::error::{Error, OutputError, Result};
use crate::image_output::ensure_parent_dir;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_TEST_SUITE: &str = "shotdiff";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
  test_suite: String,
  tests: Vec<TestOutcome>,
  id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
  pub total: usize,
  pub passed: usize,
  pub failed: usize,
  pub errored: usize,
}

impl ReportTotals {
  pub fn all_passed(&self) -> bool {
    self.passed == self.total
  }
}

impl Report {
  pub fn new(test_suite: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      test_suite: test_suite.into(),
      tests: Vec::new(),
      id: id.into(),
    }
  }

  /// Appends outcomes; existing entries are never modified.
  pub fn with_outcomes(mut self, outcomes: impl IntoIterator<Item = TestOutcome>) -> Self {
    self.tests.extend(outcomes);
    self
  }

  pub fn test_suite(&self) -> &str {
    &self.test_suite
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn tests(&self) -> &[TestOutcome] {
    &self.tests
  }

  pub fn totals(&self) -> ReportTotals {
    let mut totals = ReportTotals {
      total: self.tests.len(),
      ..ReportTotals::default()
    };
    for outcome in &self.tests {
      match outcome.status() {
        Status::Pass => totals.passed += 1,
        Status::Fail => totals.failed += 1,
        Status::Error => totals.errored += 1,
      }
    }
    totals
  }

  pub fn to_json_pretty(&self) -> Result<String> {
    serde_json::to_string_pretty(self)
      .map_err(|e| Error::Other(format!("failed to serialize JSON report: {e}")))
  }
}

pub fn write_json_report(report: &Report, path: &Path) -> Result<()> {
  ensure_parent_dir(path)?;
  let json = report.to_json_pretty()?;
  fs::write(path, json).map_err(|e| {
    Error::Output(OutputError::WriteFailed {
      path: path.display().to_string(),
      reason: e.to_string(),
    })
  })
}
