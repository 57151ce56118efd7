//! Robust homography estimation.
//!
//! A normalized Direct Linear Transform solves each candidate model; RANSAC
//! draws minimal 4-point samples from a seeded generator so repeated runs on
//! the same correspondences return the same transform.

use nalgebra::{Matrix3, SMatrix, SymmetricEigen};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::registration::config::RegistrationConfig;
use crate::image_pipeline::registration::types::{Homography, PointCorrespondence};

const SAMPLE_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RansacParams {
    pub reproj_threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    pub min_inliers: usize,
    pub seed: u64,
    pub min_determinant: f64,
}

impl From<&RegistrationConfig> for RansacParams {
    fn from(config: &RegistrationConfig) -> Self {
        Self {
            reproj_threshold: config.ransac_reproj_threshold,
            max_iterations: config.ransac_max_iterations,
            confidence: config.ransac_confidence,
            min_inliers: config.ransac_min_inliers,
            seed: config.ransac_seed,
            min_determinant: config.min_determinant,
        }
    }
}

impl Default for RansacParams {
    fn default() -> Self {
        Self::from(&RegistrationConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    pub homography: Homography,
    pub inlier_mask: Vec<bool>,
    pub inlier_count: usize,
    /// Mean reprojection error over the inliers, in pixels
    pub mean_error: f64,
}

/// Translate the centroid to the origin and scale to a mean distance of √2.
fn normalizing_transform(points: impl Iterator<Item = [f64; 2]> + Clone) -> Matrix3<f64> {
    let n = points.clone().count() as f64;
    let (sx, sy) = points.clone().fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = points
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn apply(t: &Matrix3<f64>, p: [f64; 2]) -> [f64; 2] {
    [t[(0, 0)] * p[0] + t[(0, 2)], t[(1, 1)] * p[1] + t[(1, 2)]]
}

/// Least-squares homography through at least four correspondences.
///
/// Returns `None` when the system is underdetermined or numerically
/// degenerate. The result is scaled so `h[2][2] == 1` where possible.
pub fn estimate_dlt(correspondences: &[PointCorrespondence]) -> Option<Matrix3<f64>> {
    if correspondences.len() < SAMPLE_SIZE {
        return None;
    }
    let t_src = normalizing_transform(correspondences.iter().map(|c| c.source));
    let t_dst = normalizing_transform(correspondences.iter().map(|c| c.target));

    // Accumulate AᵀA directly; the solution is its smallest eigenvector.
    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for c in correspondences {
        let [sx, sy] = apply(&t_src, c.source);
        let [dx, dy] = apply(&t_dst, c.target);
        let rows = [
            [0.0, 0.0, 0.0, -sx, -sy, -1.0, dy * sx, dy * sy, dy],
            [sx, sy, 1.0, 0.0, 0.0, 0.0, -dx * sx, -dx * sy, -dx],
        ];
        for row in &rows {
            for i in 0..9 {
                for j in 0..9 {
                    ata[(i, j)] += row[i] * row[j];
                }
            }
        }
    }

    let eigen = SymmetricEigen::new(ata);
    let smallest = (0..9).min_by(|&a, &b| {
        eigen.eigenvalues[a]
            .abs()
            .total_cmp(&eigen.eigenvalues[b].abs())
    })?;
    let h = eigen.eigenvectors.column(smallest);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let h = t_dst.try_inverse()? * h_norm * t_src;
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    if h[(2, 2)].abs() > 1e-12 {
        Some(h / h[(2, 2)])
    } else {
        Some(h)
    }
}

/// Rejects samples where three of the four points are nearly collinear in
/// either image.
fn sample_is_degenerate(sample: &[PointCorrespondence]) -> bool {
    let collinear = |a: [f64; 2], b: [f64; 2], c: [f64; 2]| {
        let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
        cross.abs() < 1e-6
    };
    for i in 0..SAMPLE_SIZE {
        for j in i + 1..SAMPLE_SIZE {
            for k in j + 1..SAMPLE_SIZE {
                let (a, b, c) = (&sample[i], &sample[j], &sample[k]);
                if collinear(a.source, b.source, c.source)
                    || collinear(a.target, b.target, c.target)
                {
                    return true;
                }
            }
        }
    }
    false
}

/// Iterations needed to draw one all-inlier sample with `confidence`.
fn required_iterations(inlier_ratio: f64, confidence: f64, cap: usize) -> usize {
    let p_good = inlier_ratio.powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 {
        return 1;
    }
    if p_good <= 0.0 {
        return cap;
    }
    let n = ((1.0 - confidence).ln() / (1.0 - p_good).ln()).ceil();
    if n.is_finite() && n >= 0.0 {
        (n as usize).clamp(1, cap)
    } else {
        cap
    }
}

fn score(
    h: &Homography,
    correspondences: &[PointCorrespondence],
    threshold: f64,
) -> (Vec<bool>, usize, f64) {
    let mut mask = vec![false; correspondences.len()];
    let mut count = 0;
    let mut error_sum = 0.0;
    for (flag, c) in mask.iter_mut().zip(correspondences) {
        let e = h.reprojection_error(c);
        if e < threshold {
            *flag = true;
            count += 1;
            error_sum += e;
        }
    }
    let mean = if count > 0 { error_sum / count as f64 } else { f64::INFINITY };
    (mask, count, mean)
}

/// Fits a homography that maps `source` points onto `target` points while
/// ignoring outliers.
///
/// Fails with `InsufficientMatches` for fewer than four correspondences and
/// with `DegenerateHomography` when no sampled model reaches
/// `min_inliers` consensus or the refitted matrix is singular.
pub fn estimate_ransac(
    correspondences: &[PointCorrespondence],
    params: &RansacParams,
) -> Result<HomographyEstimate> {
    let n = correspondences.len();
    if n < SAMPLE_SIZE {
        return Err(FusionError::InsufficientMatches {
            found: n,
            required: SAMPLE_SIZE,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(Homography, usize)> = None;
    let mut budget = params.max_iterations;
    let mut iteration = 0;
    let mut sample = [PointCorrespondence::new([0.0; 2], [0.0; 2]); SAMPLE_SIZE];

    while iteration < budget {
        iteration += 1;
        for (slot, index) in sample
            .iter_mut()
            .zip(rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE))
        {
            *slot = correspondences[index];
        }
        if sample_is_degenerate(&sample) {
            continue;
        }
        let Some(h) = estimate_dlt(&sample)
            .and_then(|m| Homography::new(m, params.min_determinant).ok())
        else {
            continue;
        };

        let (_, count, _) = score(&h, correspondences, params.reproj_threshold);
        if best.as_ref().is_none_or(|(_, c)| count > *c) {
            best = Some((h, count));
            let inlier_ratio = count as f64 / n as f64;
            let needed =
                required_iterations(inlier_ratio, params.confidence, params.max_iterations);
            budget = budget.min(needed.max(iteration));
        }
    }

    let (model, consensus) = match best {
        Some(found) if found.1 >= params.min_inliers => found,
        found => {
            return Err(FusionError::DegenerateHomography(format!(
                "best consensus {} of {} correspondences is below the required {}",
                found.map_or(0, |(_, c)| c),
                n,
                params.min_inliers
            )));
        }
    };

    let (mask, _, _) = score(&model, correspondences, params.reproj_threshold);
    let inliers: Vec<PointCorrespondence> = correspondences
        .iter()
        .zip(&mask)
        .filter(|(_, keep)| **keep)
        .map(|(c, _)| *c)
        .collect();
    let refit = estimate_dlt(&inliers)
        .ok_or_else(|| FusionError::DegenerateHomography("inlier refit failed".to_string()))?;
    let homography = Homography::new(refit, params.min_determinant)?;

    let (inlier_mask, inlier_count, mean_error) =
        score(&homography, correspondences, params.reproj_threshold);
    debug!(
        iterations = iteration,
        sampled_consensus = consensus,
        inliers = inlier_count,
        mean_error,
        "RANSAC converged"
    );
    if inlier_count < params.min_inliers {
        return Err(FusionError::DegenerateHomography(format!(
            "refitted model keeps only {} inliers",
            inlier_count
        )));
    }

    Ok(HomographyEstimate {
        homography,
        inlier_mask,
        inlier_count,
        mean_error,
    })
}
