use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nir_fusion_rs::image_pipeline::merging::{DetailFusionMerger, MergeConfig};
use nir_fusion_rs::image_pipeline::raster::{BilateralParams, Plane, RasterImage, bilateral_filter};
use nir_fusion_rs::image_pipeline::registration::{
    FeatureRegistrar, RegisteredPair, RegistrationConfig,
};
use nir_fusion_rs::image_pipeline::shadow::{ShadowConfig, ShadowDetector};

fn generate_scene(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let block = ((x / 16) * 37 + (y / 16) * 91) % 200;
            data.push((block + 30 + (x + y) % 7) as u8);
        }
    }
    data
}

fn generate_pair(size: usize) -> (RasterImage, RasterImage) {
    let gray = generate_scene(size, size);
    let rgb: Vec<u8> = gray.iter().flat_map(|&v| [v, v / 2 + 40, 255 - v]).collect();
    (
        RasterImage::from_u8(size, size, 3, &rgb).unwrap(),
        RasterImage::from_u8(size, size, 1, &gray).unwrap(),
    )
}

fn benchmark_bilateral_diameters(c: &mut Criterion) {
    let mut group = c.benchmark_group("bilateral_by_diameter");
    let size = 256;
    let plane = Plane::new(
        size,
        size,
        generate_scene(size, size).into_iter().map(f32::from).collect(),
    )
    .unwrap();

    for diameter in [5, 15, 30] {
        group.bench_with_input(BenchmarkId::from_parameter(diameter), &plane, |b, plane| {
            let params = BilateralParams {
                diameter,
                ..BilateralParams::default()
            };
            b.iter(|| bilateral_filter(black_box(plane), &params).unwrap());
        });
    }

    group.finish();
}

fn benchmark_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration_by_size");
    group.sample_size(10);

    for size in [128, 256] {
        let (rgb, nir) = generate_pair(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &(rgb, nir), |b, (rgb, nir)| {
            let registrar = FeatureRegistrar::new(RegistrationConfig::default()).unwrap();
            b.iter(|| {
                let _ = registrar.register(black_box(rgb), black_box(nir));
            });
        });
    }

    group.finish();
}

fn benchmark_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_registration_stages");
    let (rgb, nir) = generate_pair(256);
    let pair = RegisteredPair::new(rgb, nir).unwrap();

    group.bench_function("merge", |b| {
        let merger = DetailFusionMerger::new(MergeConfig::default()).unwrap();
        b.iter(|| merger.merge(black_box(&pair)).unwrap());
    });

    group.bench_function("shadow", |b| {
        let detector = ShadowDetector::new(ShadowConfig::default()).unwrap();
        b.iter(|| {
            let _ = detector.detect(black_box(&pair));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_bilateral_diameters,
    benchmark_registration,
    benchmark_stages
);
criterion_main!(benches);
