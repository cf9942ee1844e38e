use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use portrait_bgswap::{
    pipeline::{
        classify_foreground, estimate_background, feather_mask, keep_largest_component,
        refine_mask, run_pipeline, PipelineContext,
    },
    FeatherConfig, RemovalConfig,
};

const SIZES: &[(u32, u32)] = &[(320, 240), (640, 480), (1280, 960)];

/// Synthetic portrait: noisy backdrop with an elliptical subject
fn synthetic_portrait(width: u32, height: u32) -> RgbaImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    RgbaImage::from_fn(width, height, |x, y| {
        let nx = (x as f32 - cx) / (width as f32 * 0.28);
        let ny = (y as f32 - cy) / (height as f32 * 0.42);
        let noise = ((x.wrapping_mul(31) ^ y.wrapping_mul(17)) % 9) as u8;
        if nx * nx + ny * ny < 1.0 {
            Rgba([170 + noise, 90 + noise, 60, 255])
        } else {
            Rgba([60 + noise, 120 + noise, 190, 255])
        }
    })
}

fn benchmark_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");
    group.sample_size(20);

    for &(width, height) in SIZES {
        let image = synthetic_portrait(width, height);
        for (label, parallel) in [("parallel", true), ("sequential", false)] {
            let config = RemovalConfig {
                parallel,
                ..RemovalConfig::default()
            };
            group.bench_with_input(
                BenchmarkId::new(label, format!("{width}x{height}")),
                &image,
                |b, image| {
                    b.iter(|| run_pipeline(black_box(image.clone()), &config));
                },
            );
        }
    }

    group.finish();
}

fn benchmark_stages(c: &mut Criterion) {
    let (width, height) = (640, 480);
    let image = synthetic_portrait(width, height);
    let config = RemovalConfig::default();

    let estimate = estimate_background(&image, config.classifier.sample_fraction);
    let context = PipelineContext::new(width, height, estimate);
    let mut scratch = image.clone();
    let classified = classify_foreground(&mut scratch, &context, &config.classifier, false);
    let (largest, _) = keep_largest_component(&classified, config.refinement.candidate_threshold);
    let refined = refine_mask(&largest, config.refinement.binarize_threshold, 1);

    let mut group = c.benchmark_group("stages_640x480");

    group.bench_function("estimate", |b| {
        b.iter(|| estimate_background(black_box(&image), 0.15));
    });

    group.bench_function("classify", |b| {
        b.iter(|| {
            let mut buffer = image.clone();
            classify_foreground(&mut buffer, &context, &config.classifier, false)
        });
    });

    group.bench_function("components", |b| {
        b.iter(|| keep_largest_component(black_box(&classified), 16));
    });

    group.bench_function("morphology", |b| {
        b.iter(|| refine_mask(black_box(&largest), 128, 1));
    });

    for passes in [1, 3] {
        let feather = FeatherConfig {
            passes,
            ..FeatherConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("feather", passes), &refined, |b, mask| {
            b.iter(|| feather_mask(black_box(mask), &feather, false));
        });
    }

    group.finish();
}

criterion_group!(pipeline_benches, benchmark_full_pipeline, benchmark_stages);
criterion_main!(pipeline_benches);
