//! Brute-force descriptor matching with the nearest/second-nearest ratio
//! test and a mutual-nearest cross-check.
//!
//! The same corner is usually found on neighbouring scale levels, so the
//! second-nearest candidate is taken among targets that lie away from the
//! nearest one; otherwise a corner's own duplicates would fail it.

use rayon::prelude::*;

use crate::image_pipeline::registration::types::{Keypoint, Match};

/// Targets closer than this many keypoint scales to the nearest candidate
/// count as the same image location.
const DISTINCT_RADIUS: f32 = 4.0;

/// The two closest target descriptors for one source descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPair {
    pub index: usize,
    pub nearest: f32,
    pub second: f32,
}

fn distance(a: &Keypoint, b: &Keypoint) -> f32 {
    a.descriptor
        .iter()
        .zip(b.descriptor.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn same_location(a: &Keypoint, b: &Keypoint) -> bool {
    (a.x - b.x).hypot(a.y - b.y) <= DISTINCT_RADIUS * a.scale
}

/// Index and distance of the closest target, first index on ties.
fn closest(source: &Keypoint, targets: &[Keypoint]) -> Option<(usize, f32)> {
    targets
        .iter()
        .enumerate()
        .map(|(index, target)| (index, distance(source, target)))
        .fold(None, |best, (index, d)| match best {
            Some((_, nearest)) if d >= nearest => best,
            _ => Some((index, d)),
        })
}

/// Nearest target for every keypoint in `sources`, and the nearest among
/// targets at a different location. Without such a target the second
/// distance is infinite.
pub fn nearest_two(sources: &[Keypoint], targets: &[Keypoint]) -> Vec<Option<NearestPair>> {
    sources
        .par_iter()
        .map(|source| {
            let (index, nearest) = closest(source, targets)?;
            let anchor = &targets[index];
            let second = targets
                .iter()
                .filter(|target| !same_location(anchor, target))
                .map(|target| distance(source, target))
                .fold(f32::INFINITY, f32::min);
            Some(NearestPair {
                index,
                nearest,
                second,
            })
        })
        .collect()
}

/// Keeps a candidate only when `nearest < ratio · second`.
pub fn ratio_test(candidates: &[Option<NearestPair>], ratio: f32) -> Vec<Match> {
    candidates
        .iter()
        .enumerate()
        .filter_map(|(source, candidate)| {
            let pair = (*candidate)?;
            (pair.nearest < ratio * pair.second).then_some(Match {
                source,
                target: pair.index,
                distance: pair.nearest,
            })
        })
        .collect()
}

/// Drops matches whose target prefers a different source.
pub fn cross_check(matches: Vec<Match>, sources: &[Keypoint], targets: &[Keypoint]) -> Vec<Match> {
    matches
        .into_par_iter()
        .filter(|m| closest(&targets[m.target], sources).map(|(index, _)| index) == Some(m.source))
        .collect()
}

pub fn match_keypoints(sources: &[Keypoint], targets: &[Keypoint], ratio: f32) -> Vec<Match> {
    let candidates = ratio_test(&nearest_two(sources, targets), ratio);
    cross_check(candidates, sources, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::registration::types::DESCRIPTOR_LEN;

    fn keypoint(seed: usize) -> Keypoint {
        let mut descriptor = [0.0f32; DESCRIPTOR_LEN];
        for (i, d) in descriptor.iter_mut().enumerate() {
            *d = (((i + 1) * (seed + 3) * 7919) % 101) as f32 / 101.0 - 0.5;
        }
        let norm = descriptor.iter().map(|d| d * d).sum::<f32>().sqrt();
        descriptor.iter_mut().for_each(|d| *d /= norm);
        Keypoint {
            x: seed as f32 * 10.0,
            y: 0.0,
            scale: 1.0,
            orientation: 0.0,
            response: 1.0,
            descriptor,
        }
    }

    #[test]
    fn test_identical_sets_match_one_to_one() {
        let points: Vec<_> = (0..12).map(keypoint).collect();
        let matches = match_keypoints(&points, &points, 0.7);
        assert_eq!(matches.len(), 12);
        for m in &matches {
            assert_eq!(m.source, m.target);
            assert!(m.distance.abs() < 1e-6);
        }
    }

    #[test]
    fn test_ratio_test_is_monotonic() {
        let sources: Vec<_> = (0..20).map(keypoint).collect();
        let targets: Vec<_> = (7..30).map(keypoint).collect();
        let candidates = nearest_two(&sources, &targets);

        let mut previous = 0;
        for step in 1..=20 {
            let count = ratio_test(&candidates, step as f32 * 0.05).len();
            assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn test_no_targets_yields_no_matches() {
        let sources: Vec<_> = (0..3).map(keypoint).collect();
        assert!(match_keypoints(&sources, &[], 0.9).is_empty());
    }

    #[test]
    fn test_duplicate_at_same_location_is_not_a_rival() {
        let source = keypoint(4);
        let mut coarser = keypoint(4);
        coarser.scale = 1.26;
        coarser.x += 0.5;
        let targets = vec![keypoint(4), coarser, keypoint(9)];

        let candidates = nearest_two(&[source.clone()], &targets);
        let pair = candidates[0].unwrap();
        assert_eq!(pair.index, 0);
        let rival = distance(&source, &targets[2]);
        assert!((pair.second - rival).abs() < 1e-6);
        assert_eq!(match_keypoints(&[source], &targets, 0.7).len(), 1);
    }

    #[test]
    fn test_cross_check_keeps_one_of_many_identical_sources() {
        let sources: Vec<_> = (0..5)
            .map(|i| Keypoint {
                x: i as f32 * 30.0,
                ..keypoint(3)
            })
            .collect();
        let targets = vec![keypoint(3), keypoint(8)];

        let forward = ratio_test(&nearest_two(&sources, &targets), 0.7);
        assert_eq!(forward.len(), 5);
        let kept = cross_check(forward, &sources, &targets);
        assert_eq!(kept.len(), 1);
        assert_eq!((kept[0].source, kept[0].target), (0, 0));
    }

    #[test]
    fn test_single_target_always_passes_ratio() {
        let sources = vec![keypoint(1)];
        let targets = vec![keypoint(2)];
        let matches = match_keypoints(&sources, &targets, 0.7);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].distance >= 0.0);
    }
}
