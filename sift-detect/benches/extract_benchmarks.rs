use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sift_core::{ImageView, SiftConfig};
use sift_detect::{DetectorConfig, ImagePyramid, Plane, SiftDetector};

/// Benchmark image with smooth texture and a grid of blobs
fn create_benchmark_image(width: usize, height: usize) -> Vec<u8> {
    let mut img = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let (fx, fy) = (x as f32, y as f32);
            let noise = ((x * 7 + y * 13) % 17) as f32;
            let v = 128.0 + 60.0 * (fx * 0.13).sin() * (fy * 0.11).cos() + noise;
            img[y * width + x] = v.clamp(0.0, 255.0) as u8;
        }
    }
    for i in 0..20 {
        let cx = 8 + (i * 37) % (width - 16);
        let cy = 8 + (i * 53) % (height - 16);
        for y in cy - 3..cy + 3 {
            for x in cx - 3..cx + 3 {
                img[y * width + x] = if i % 2 == 0 { 240 } else { 20 };
            }
        }
    }
    img
}

fn create_test_config() -> SiftConfig {
    SiftConfig {
        n_threads: 1, // Single-threaded for consistent benchmarks
        ..SiftConfig::default()
    }
}

/// Benchmark full extraction for growing image sizes
fn bench_full_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_extraction");
    group.sample_size(10);

    for &(width, height) in &[(64, 64), (128, 128), (256, 256)] {
        let detector = SiftDetector::new(create_test_config()).unwrap();
        let img = create_benchmark_image(width, height);

        group.bench_with_input(
            BenchmarkId::new("detect_and_compute", format!("{}x{}", width, height)),
            &(detector, img),
            |b, (detector, img)| {
                b.iter(|| {
                    let view = ImageView::gray(width, height, img);
                    black_box(detector.detect_and_compute(black_box(&view)).unwrap())
                })
            },
        );
    }

    group.finish();
}

/// Benchmark the scale-space stages separately
fn bench_scale_space(c: &mut Criterion) {
    let (width, height) = (256, 256);
    let img = create_benchmark_image(width, height);
    let gray = Plane::from_vec(width, height, img.iter().map(|&v| v as f32).collect());

    let mut group = c.benchmark_group("scale_space");
    group.sample_size(10);

    group.bench_function("gaussian_blur_sigma_1_6", |b| {
        b.iter(|| black_box(ImagePyramid::gaussian_blur(black_box(&gray), 1.6)))
    });

    group.bench_function("build_pyramid", |b| {
        b.iter(|| {
            let base = ImagePyramid::base_image(&gray, 1.6);
            let n = ImagePyramid::number_of_octaves(base.width, base.height);
            black_box(ImagePyramid::build(base, n, 3, 1.6))
        })
    });

    group.finish();
}

/// Benchmark the presets used by the two workflows
fn bench_presets(c: &mut Criterion) {
    let (width, height) = (200, 200);
    let img = create_benchmark_image(width, height);
    let mut group = c.benchmark_group("presets");
    group.sample_size(10);

    let presets = [
        ("pair", DetectorConfig::pair_preset()),
        ("sequence", DetectorConfig::sequence_preset()),
    ];
    for (name, cfg) in presets {
        let detector = SiftDetector::new(cfg.core).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                let view = ImageView::gray(width, height, &img);
                black_box(detector.detect_and_compute(black_box(&view)).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_full_extraction, bench_scale_space, bench_presets);
criterion_main!(benches);
