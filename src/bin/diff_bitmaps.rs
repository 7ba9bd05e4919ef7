use clap::Parser;
use log::info;
use shotdiff::config::EnvOverrides;
use shotdiff::image_output::path_for_report;
use shotdiff::report::DEFAULT_TEST_SUITE;
use shotdiff::{
  write_json_report, BatchRunner, CancelToken, CompareConfig, DiffArtifactWriter, PairJob,
  Report, TestOutcome, TestPair,
};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
  name = "diff_bitmaps",
  about = "Compare reference bitmaps against test bitmaps and write a JSON report"
)]
struct Args {
  /// Directory of reference PNGs (searched recursively)
  #[arg(long)]
  reference: PathBuf,

  /// Directory of test PNGs (searched recursively)
  #[arg(long)]
  test: PathBuf,

  /// Path to write the JSON report
  #[arg(long, default_value = "json_report/jsonReport.json")]
  report: PathBuf,

  /// Maximum mismatch percentage before a pair fails
  #[arg(long, default_value_t = 0.1)]
  threshold: f64,

  /// Fail pairs whose bitmaps differ in size regardless of pixel content
  #[arg(long)]
  require_same_dimensions: bool,

  /// Per-channel tolerance (0-255). Defaults to SHOTDIFF_TOLERANCE or 16.
  #[arg(long)]
  tolerance: Option<u8>,

  /// Ignore the alpha channel
  #[arg(long)]
  ignore_alpha: bool,

  /// Forgive mismatches on anti-aliased edges
  #[arg(long)]
  ignore_antialiasing: bool,

  /// Record analysisTime for each pair
  #[arg(long)]
  timing: bool,

  /// Worker threads. Defaults to SHOTDIFF_THREADS or the global rayon pool.
  #[arg(long)]
  threads: Option<usize>,

  /// Value of the report's testSuite field
  #[arg(long, default_value = DEFAULT_TEST_SUITE)]
  test_suite: String,

  /// Value of the report's id field
  #[arg(long, default_value = "shotdiff")]
  id: String,
}

fn main() {
  env_logger::init();
  match run() {
    Ok(exit_code) => std::process::exit(exit_code),
    Err(err) => {
      eprintln!("error: {err}");
      std::process::exit(2);
    }
  }
}

fn run() -> Result<i32, String> {
  let args = Args::parse();
  let env = EnvOverrides::from_env();

  let config = resolve_config(&args, &env)?;
  let threads = match args.threads {
    Some(0) => return Err("--threads must be > 0".to_string()),
    Some(threads) => Some(threads),
    None => env.threads().map_err(|e| e.to_string())?,
  };
  shotdiff::config::validate_mismatch_threshold(args.threshold).map_err(|e| e.to_string())?;

  let reference_dir = normalize_dir(&args.reference)?;
  let test_dir = normalize_dir(&args.test)?;

  let report_dir_raw = args
    .report
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."));
  fs::create_dir_all(&report_dir_raw)
    .map_err(|e| format!("failed to create report directory {report_dir_raw:?}: {e}"))?;
  let report_dir = fs::canonicalize(&report_dir_raw)
    .map_err(|e| format!("failed to canonicalize report directory {report_dir_raw:?}: {e}"))?;

  let reference_pngs = collect_pngs(&reference_dir)?;
  let test_pngs = collect_pngs(&test_dir)?;

  let mut keys = BTreeSet::new();
  keys.extend(reference_pngs.keys().cloned());
  keys.extend(test_pngs.keys().cloned());

  let mut jobs = Vec::new();
  let mut missing = Vec::new();
  for key in &keys {
    let mut pair = TestPair::from_file_name(file_name_of(key));
    pair.mismatch_threshold = args.threshold;
    pair.require_same_dimensions = args.require_same_dimensions;
    match (reference_pngs.get(key), test_pngs.get(key)) {
      (Some(reference), Some(test)) => {
        pair.reference = path_for_report(&report_dir, reference);
        pair.test = path_for_report(&report_dir, test);
        jobs.push(PairJob {
          pair,
          reference_path: reference.clone(),
          test_path: test.clone(),
        });
      }
      (None, Some(test)) => {
        pair.test = path_for_report(&report_dir, test);
        missing.push(TestOutcome::errored(
          pair,
          format!("Missing reference bitmap for {key}"),
        ));
      }
      (Some(reference), None) => {
        pair.reference = path_for_report(&report_dir, reference);
        missing.push(TestOutcome::errored(
          pair,
          format!("Missing test bitmap for {key}"),
        ));
      }
      (None, None) => {}
    }
  }

  let mut runner = BatchRunner::new(config, DiffArtifactWriter::new(&report_dir));
  if let Some(threads) = threads {
    runner = runner.with_threads(threads);
  }
  let batch = runner
    .run(&jobs, &CancelToken::new())
    .map_err(|e| e.to_string())?;

  let mut outcomes = batch.outcomes;
  outcomes.extend(missing);
  outcomes.sort_by(|a, b| a.pair().file_name.cmp(&b.pair().file_name));

  let report = Report::new(args.test_suite, args.id).with_outcomes(outcomes);
  write_json_report(&report, &args.report).map_err(|e| e.to_string())?;

  let totals = report.totals();
  info!(
    "report written to {} ({} pairs)",
    args.report.display(),
    totals.total
  );
  if !totals.all_passed() {
    eprintln!(
      "{} failed, {} errored of {} pairs",
      totals.failed, totals.errored, totals.total
    );
    return Ok(1);
  }
  Ok(0)
}

/// Flags win over `SHOTDIFF_*` variables, which win over defaults.
fn resolve_config(args: &Args, env: &EnvOverrides) -> Result<CompareConfig, String> {
  let mut config = env
    .apply(CompareConfig::default())
    .map_err(|e| e.to_string())?;
  if let Some(tolerance) = args.tolerance {
    config = config.with_channel_tolerance(tolerance);
  }
  if args.ignore_alpha {
    config = config.with_compare_alpha(false);
  }
  if args.ignore_antialiasing {
    config = config.with_ignore_antialiasing(true);
  }
  if args.timing {
    config = config.with_record_timing(true);
  }
  Ok(config)
}

/// Relative PNG paths (forward slashes) mapped to absolute paths. Diff artifacts
/// from earlier runs are skipped.
fn collect_pngs(root: &Path) -> Result<HashMap<String, PathBuf>, String> {
  let mut map = HashMap::new();
  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|e| format!("failed to walk {}: {e}", root.display()))?;
    if !entry.file_type().is_file() {
      continue;
    }
    let path = entry.path();
    if path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| ext.eq_ignore_ascii_case("png"))
      != Some(true)
    {
      continue;
    }
    if path
      .file_name()
      .and_then(|n| n.to_str())
      .is_some_and(|n| n.starts_with(shotdiff::image_output::DIFF_FILE_PREFIX))
    {
      continue;
    }
    let rel = path
      .strip_prefix(root)
      .map_err(|e| format!("failed to strip prefix {}: {e}", root.display()))?;
    let key = rel
      .iter()
      .map(|c| c.to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    map.entry(key).or_insert_with(|| path.to_path_buf());
  }
  Ok(map)
}

fn file_name_of(key: &str) -> &str {
  key.rsplit('/').next().unwrap_or(key)
}

fn normalize_dir(path: &Path) -> Result<PathBuf, String> {
  let canonical = fs::canonicalize(path).map_err(|e| format!("{}: {e}", path.display()))?;
  if !canonical.is_dir() {
    return Err(format!("{} is not a directory", canonical.display()));
  }
  Ok(canonical)
}
