use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use shotdiff::{compare, CompareConfig, ComparisonInput};

fn screenshot(width: u32, height: u32, seed: u8) -> RgbaImage {
  RgbaImage::from_fn(width, height, |x, y| {
    let v = ((x / 8 + y / 8) as u8).wrapping_mul(17).wrapping_add(seed);
    Rgba([v, v.wrapping_add(40), v.wrapping_add(80), 255])
  })
}

fn bench_identical(c: &mut Criterion) {
  let reference = screenshot(1024, 768, 0);
  let candidate = reference.clone();
  let config = CompareConfig::default();
  c.bench_function("compare_identical_1024x768", |b| {
    b.iter(|| {
      let input = ComparisonInput::new(&reference, &candidate).with_mismatch_threshold(0.1);
      black_box(compare(&input, &config).unwrap())
    })
  });
}

fn bench_full_pass(c: &mut Criterion) {
  let reference = screenshot(1024, 768, 0);
  let mut candidate = reference.clone();
  for x in 0..200 {
    candidate.put_pixel(x, 100, Rgba([255, 0, 0, 255]));
  }
  let plain = CompareConfig::default();
  let antialiasing = CompareConfig::antialiasing_aware();

  c.bench_function("compare_full_1024x768", |b| {
    b.iter(|| {
      let input = ComparisonInput::new(&reference, &candidate).with_mismatch_threshold(50.0);
      black_box(compare(&input, &plain).unwrap())
    })
  });
  c.bench_function("compare_full_antialiasing_1024x768", |b| {
    b.iter(|| {
      let input = ComparisonInput::new(&reference, &candidate).with_mismatch_threshold(50.0);
      black_box(compare(&input, &antialiasing).unwrap())
    })
  });
}

fn bench_diff_render(c: &mut Criterion) {
  let reference = screenshot(800, 600, 0);
  let candidate = screenshot(800, 640, 3);
  let config = CompareConfig::default();
  c.bench_function("compare_fail_with_diff_800x640", |b| {
    b.iter(|| {
      let input = ComparisonInput::new(&reference, &candidate).with_mismatch_threshold(0.0);
      black_box(compare(&input, &config).unwrap())
    })
  });
}

criterion_group!(
  compare_benches,
  bench_identical,
  bench_full_pass,
  bench_diff_render
);
criterion_main!(compare_benches);
