use image::RgbaImage;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;

fn write_color_png(path: &Path, color: [u8; 4]) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  let img = RgbaImage::from_pixel(4, 4, image::Rgba(color));
  img.save(path).expect("save png");
}

fn read_report(path: &Path) -> Value {
  serde_json::from_str(&fs::read_to_string(path).expect("report written")).expect("valid json")
}

#[test]
fn diff_bitmaps_reports_passes() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let reference = tmp.path().join("bitmaps_reference");
  let test = tmp.path().join("bitmaps_test").join("20230509-222036");

  let name = "iTwinUI_alert_Type_default_light_0_demo-alert_0_.png";
  write_color_png(&reference.join(name), [10, 20, 30, 255]);
  write_color_png(&test.join(name), [10, 20, 30, 255]);

  let status = Command::new(env!("CARGO_BIN_EXE_diff_bitmaps"))
    .current_dir(tmp.path())
    .args([
      "--reference",
      reference.to_str().unwrap(),
      "--test",
      test.to_str().unwrap(),
      "--report",
      "html_report/report.json",
      "--require-same-dimensions",
      "--id",
      "iTwinUI",
    ])
    .status()
    .expect("run diff_bitmaps");

  assert!(
    status.success(),
    "expected success, got {:?}",
    status.code()
  );

  let report = read_report(&tmp.path().join("html_report/report.json"));
  assert_eq!(report["id"], "iTwinUI");
  let entry = &report["tests"][0];
  assert_eq!(entry["status"], "pass");
  assert_eq!(entry["pair"]["label"], "iTwinUI_alert_Type_default_light");
  assert_eq!(entry["pair"]["selector"], "demo-alert");
  assert_eq!(
    entry["pair"]["reference"],
    format!("../bitmaps_reference/{name}")
  );
  assert_eq!(entry["diff"]["misMatchPercentage"], "0.00");
  assert!(entry["diff"].get("diffImage").is_none());
}

#[test]
fn diff_bitmaps_exits_non_zero_on_diff() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let reference = tmp.path().join("bitmaps_reference");
  let test = tmp.path().join("bitmaps_test").join("run");

  write_color_png(&reference.join("page.png"), [255, 0, 0, 255]);
  write_color_png(&test.join("page.png"), [0, 0, 255, 255]);

  let status = Command::new(env!("CARGO_BIN_EXE_diff_bitmaps"))
    .current_dir(tmp.path())
    .args([
      "--reference",
      reference.to_str().unwrap(),
      "--test",
      test.to_str().unwrap(),
      "--report",
      "html_report/report.json",
      "--threshold",
      "0.001",
    ])
    .status()
    .expect("run diff_bitmaps");

  assert_eq!(status.code(), Some(1));

  let report = read_report(&tmp.path().join("html_report/report.json"));
  let entry = &report["tests"][0];
  assert_eq!(entry["status"], "fail");
  assert_eq!(entry["diff"]["misMatchPercentage"], "100.00");
  let diff_path = entry["diff"]["diffImage"]
    .as_str()
    .expect("diff path missing");
  assert_eq!(diff_path, "../bitmaps_test/run/failed_diff_page.png");
  assert!(
    tmp.path().join("html_report").join(diff_path).exists(),
    "diff image missing at {diff_path}"
  );
}

#[test]
fn diff_bitmaps_reports_missing_and_env_tolerance() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let reference = tmp.path().join("reference");
  let test = tmp.path().join("test");

  write_color_png(&reference.join("a.png"), [10, 10, 10, 255]);
  write_color_png(&test.join("a.png"), [14, 14, 14, 255]);
  write_color_png(&reference.join("only_reference.png"), [0, 0, 0, 255]);

  let status = Command::new(env!("CARGO_BIN_EXE_diff_bitmaps"))
    .current_dir(tmp.path())
    .env("SHOTDIFF_TOLERANCE", "5")
    .args([
      "--reference",
      reference.to_str().unwrap(),
      "--test",
      test.to_str().unwrap(),
      "--report",
      "report.json",
      "--threshold",
      "0",
    ])
    .status()
    .expect("run diff_bitmaps");

  assert_eq!(status.code(), Some(1), "missing bitmap should fail the run");

  let report = read_report(&tmp.path().join("report.json"));
  let tests = report["tests"].as_array().unwrap();
  assert_eq!(tests.len(), 2);
  assert_eq!(tests[0]["pair"]["fileName"], "a.png");
  assert_eq!(tests[0]["status"], "pass");
  assert_eq!(tests[1]["pair"]["fileName"], "only_reference.png");
  assert_eq!(tests[1]["status"], "error");
  assert!(tests[1]["error"]
    .as_str()
    .unwrap()
    .contains("Missing test bitmap"));
}

#[test]
fn diff_bitmaps_rejects_negative_threshold() {
  let tmp = tempfile::TempDir::new().expect("tempdir");
  let dir = tmp.path().join("bitmaps");
  fs::create_dir_all(&dir).unwrap();

  let status = Command::new(env!("CARGO_BIN_EXE_diff_bitmaps"))
    .current_dir(tmp.path())
    .args([
      "--reference",
      dir.to_str().unwrap(),
      "--test",
      dir.to_str().unwrap(),
      "--threshold=-1",
    ])
    .status()
    .expect("run diff_bitmaps");

  assert_eq!(status.code(), Some(2));
  assert!(!tmp.path().join("json_report/jsonReport.json").exists());
}
