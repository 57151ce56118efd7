#![allow(dead_code)]

use nir_fusion_rs::image_pipeline::raster::{Plane, RasterImage, SampleType};
use nir_fusion_rs::image_pipeline::registration::Homography;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Dark background scattered with random bright rectangles.
pub fn rectangles(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pixels = vec![40u8; size * size];
    for _ in 0..14 {
        let x0 = rng.gen_range(4..size - 20);
        let y0 = rng.gen_range(4..size - 20);
        let w = rng.gen_range(8..18);
        let h = rng.gen_range(8..18);
        let v = rng.gen_range(80..250) as u8;
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                pixels[y * size + x] = v;
            }
        }
    }
    pixels
}

pub fn checkerboard(width: usize, height: usize, cell: usize) -> Vec<u8> {
    (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            if (x / cell + y / cell) % 2 == 0 { 60 } else { 200 }
        })
        .collect()
}

pub fn grey_rgb(width: usize, height: usize, pixels: &[u8]) -> RasterImage {
    let data: Vec<u8> = pixels.iter().flat_map(|&v| [v, v, v]).collect();
    RasterImage::from_u8(width, height, 3, &data).unwrap()
}

/// Renders `source` as seen through `homography` into a `width × height`
/// grid, sampling bilinearly. Pixels mapping outside the source are 0.
pub fn render_through(
    source: &Plane,
    homography: &Homography,
    width: usize,
    height: usize,
) -> RasterImage {
    let inverse = homography.inverse().unwrap();
    let max_x = (source.width() - 1) as f64;
    let max_y = (source.height() - 1) as f64;
    let data = (0..width * height)
        .map(|i| {
            let [sx, sy] = inverse.project((i % width) as f64, (i / width) as f64).unwrap();
            if (0.0..=max_x).contains(&sx) && (0.0..=max_y).contains(&sy) {
                source.sample_bilinear(sx as f32, sy as f32)
            } else {
                0.0
            }
        })
        .collect();
    RasterImage::new(width, height, 1, SampleType::U8, data).unwrap()
}

/// Bright scene with a dark rectangle in both bands. `rect` is
/// `(x0, y0, x1, y1)`, end-exclusive.
pub fn shaded_pair(
    width: usize,
    height: usize,
    rect: (usize, usize, usize, usize),
) -> (RasterImage, RasterImage) {
    let (x0, y0, x1, y1) = rect;
    let inside = |i: usize| {
        let (x, y) = (i % width, i / width);
        (x0..x1).contains(&x) && (y0..y1).contains(&y)
    };
    let rgb: Vec<u8> = (0..width * height)
        .flat_map(|i| if inside(i) { [20, 30, 25] } else { [210, 190, 170] })
        .collect();
    let nir: Vec<u8> = (0..width * height)
        .map(|i| if inside(i) { 10 } else { 180 })
        .collect();
    (
        RasterImage::from_u8(width, height, 3, &rgb).unwrap(),
        RasterImage::from_u8(width, height, 1, &nir).unwrap(),
    )
}
