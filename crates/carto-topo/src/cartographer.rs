//! The Cartographer: voids and gaps in an embedding space.

use crate::homology::{PersistenceDiagram, TopologicalFeature, rips_persistence};
use carto_core::math::{check_finite, common_dimension, euclidean_distance};
use carto_core::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Point clouds smaller than this have no reportable voids.
pub const MIN_VOID_POINTS: usize = 10;

/// Minimum persistence for a loop to count as a void.
pub const VOID_SIGNIFICANCE: f64 = 0.1;

/// Cartographer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartographerConfig {
    /// Truncate the Rips filtration at this scale.
    ///
    /// Loops still open at the cutoff never die and are not reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_radius: Option<f64>,

    /// Candidates drawn by gap sampling when the caller does not say.
    #[serde(default = "default_samples")]
    pub default_samples: usize,
}

fn default_samples() -> usize {
    100
}

impl Default for CartographerConfig {
    fn default() -> Self {
        Self {
            max_radius: None,
            default_samples: default_samples(),
        }
    }
}

impl CartographerConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if let Some(r) = self.max_radius
            && !(r.is_finite() && r > 0.0)
        {
            return Err(Error::config(format!(
                "cartographer.max_radius must be a positive number, got {r}"
            )));
        }
        Ok(())
    }
}

/// A sampled point in a sparsely covered region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapCandidate {
    /// The sampled coordinates.
    pub coordinates: Vec<f32>,
    /// Euclidean distance to the nearest input point.
    pub clearance: f32,
}

/// Topological analysis of point clouds.
#[derive(Debug, Clone, Default)]
pub struct Cartographer {
    config: CartographerConfig,
}

impl Cartographer {
    /// Create a cartographer.
    pub fn new(config: CartographerConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &CartographerConfig {
        &self.config
    }

    /// Full H0 and H1 diagram, infinite bars included.
    pub fn persistence_diagram<V: AsRef<[f32]>>(&self, points: &[V]) -> Result<PersistenceDiagram> {
        rips_persistence(points, self.config.max_radius)
    }

    /// Significant one-dimensional holes in `points`.
    ///
    /// Returns nothing for fewer than [`MIN_VOID_POINTS`] points. A loop is
    /// reported when its death is finite and its persistence exceeds
    /// [`VOID_SIGNIFICANCE`].
    pub fn detect_voids<V: AsRef<[f32]>>(&self, points: &[V]) -> Result<Vec<TopologicalFeature>> {
        if points.len() < MIN_VOID_POINTS {
            log::debug!(
                "Skipping void detection: {} points, need {MIN_VOID_POINTS}",
                points.len()
            );
            return Ok(Vec::new());
        }
        let voids = self
            .persistence_diagram(points)?
            .significant(1, VOID_SIGNIFICANCE);
        log::debug!("Detected {} voids among {} points", voids.len(), points.len());
        Ok(voids)
    }

    /// Maximin gap sampling.
    ///
    /// Draws `samples` uniform points inside the per-dimension bounding box
    /// of `points` and keeps the one furthest from its nearest input point.
    /// This is a stochastic approximation: quality grows with `samples` and
    /// the result depends on `rng`. Returns `None` for fewer than two
    /// points or zero samples.
    pub fn find_gap<V, R>(
        &self,
        points: &[V],
        samples: usize,
        rng: &mut R,
    ) -> Result<Option<GapCandidate>>
    where
        V: AsRef<[f32]>,
        R: Rng + ?Sized,
    {
        let Some(dim) = common_dimension(points)? else {
            return Ok(None);
        };
        if points.len() < 2 || samples == 0 {
            return Ok(None);
        }
        for p in points {
            check_finite(p.as_ref())?;
        }

        let mut lower = vec![f32::INFINITY; dim];
        let mut upper = vec![f32::NEG_INFINITY; dim];
        for p in points {
            for (d, &x) in p.as_ref().iter().enumerate() {
                lower[d] = lower[d].min(x);
                upper[d] = upper[d].max(x);
            }
        }

        let mut best: Option<GapCandidate> = None;
        for _ in 0..samples {
            let candidate: Vec<f32> = lower
                .iter()
                .zip(&upper)
                .map(|(&lo, &hi)| sample_between(lo, hi, rng))
                .collect();
            let clearance = points
                .iter()
                .map(|p| euclidean_distance(p.as_ref(), &candidate))
                .fold(f32::INFINITY, f32::min);

            if best.as_ref().is_none_or(|b| clearance > b.clearance) {
                best = Some(GapCandidate {
                    coordinates: candidate,
                    clearance,
                });
            }
        }
        Ok(best)
    }

    /// Maximin gap sampling returning at most one coordinate vector.
    pub fn find_gap_coordinates<V, R>(
        &self,
        points: &[V],
        samples: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f32>>>
    where
        V: AsRef<[f32]>,
        R: Rng + ?Sized,
    {
        Ok(self
            .find_gap(points, samples, rng)?
            .map(|gap| gap.coordinates)
            .into_iter()
            .collect())
    }
}

/// Uniform draw from `[lo, hi]`, computed in f64 so wide finite ranges
/// cannot overflow.
fn sample_between<R: Rng + ?Sized>(lo: f32, hi: f32, rng: &mut R) -> f32 {
    let (lo, hi) = (lo as f64, hi as f64);
    let u: f64 = rng.random();
    (lo + (hi - lo) * u).clamp(lo, hi) as f32
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::f32::consts::PI;

    fn circle(count: usize) -> Vec<Vec<f32>> {
        (0..count)
            .map(|k| {
                let t = 2.0 * PI * k as f32 / count as f32;
                vec![t.cos(), t.sin()]
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Voids
    // ------------------------------------------------------------------------

    #[test]
    fn test_voids_need_ten_points() {
        let carto = Cartographer::default();
        assert!(carto.detect_voids(&circle(9)).unwrap().is_empty());
        assert!(carto.detect_voids(&Vec::<Vec<f32>>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_ring_has_a_void() {
        let voids = Cartographer::default().detect_voids(&circle(20)).unwrap();

        assert!(!voids.is_empty());
        for v in &voids {
            assert_eq!(v.dimension, 1);
            assert!(v.is_finite());
            assert!(v.persistence() > VOID_SIGNIFICANCE);
        }
    }

    #[test]
    fn test_line_has_no_void() {
        let line: Vec<Vec<f32>> = (0..15).map(|i| vec![i as f32 * 0.1, 0.0, 0.0]).collect();
        assert!(Cartographer::default().detect_voids(&line).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_ring_reports_nothing() {
        let carto = Cartographer::new(CartographerConfig {
            max_radius: Some(0.5),
            ..Default::default()
        });
        assert!(carto.detect_voids(&circle(20)).unwrap().is_empty());

        let diagram = carto.persistence_diagram(&circle(20)).unwrap();
        assert_eq!(diagram.dimension(1).filter(|f| !f.is_finite()).count(), 1);
    }

    #[test]
    fn test_voids_reject_mixed_dimensions() {
        let mut points = circle(12);
        points.push(vec![0.0]);
        let err = Cartographer::default().detect_voids(&points).unwrap_err();
        assert!(err.is_usage_error());
    }

    // ------------------------------------------------------------------------
    // Gaps
    // ------------------------------------------------------------------------

    #[test]
    fn test_gap_needs_two_points() {
        let carto = Cartographer::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(carto.find_gap(&[vec![1.0, 2.0]], 100, &mut rng).unwrap().is_none());
        assert!(
            carto
                .find_gap_coordinates(&Vec::<Vec<f32>>::new(), 100, &mut rng)
                .unwrap()
                .is_empty()
        );
        assert!(
            carto
                .find_gap(&[vec![0.0], vec![1.0]], 0, &mut rng)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_gap_finds_empty_center() {
        let corners = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
        ];
        let mut rng = StdRng::seed_from_u64(42);
        let gap = Cartographer::default()
            .find_gap(&corners, 2000, &mut rng)
            .unwrap()
            .unwrap();

        assert!(gap.clearance > 0.5);
        let nearest = corners
            .iter()
            .map(|c| euclidean_distance(c, &gap.coordinates))
            .fold(f32::INFINITY, f32::min);
        assert!((nearest - gap.clearance).abs() < 1e-6);
    }

    #[test]
    fn test_gap_is_reproducible_with_seed() {
        let points = circle(12);
        let carto = Cartographer::default();

        let a = carto
            .find_gap_coordinates(&points, 50, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = carto
            .find_gap_coordinates(&points, 50, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_gap_with_flat_dimension() {
        let points = vec![vec![0.0, 5.0], vec![2.0, 5.0]];
        let gap = Cartographer::default()
            .find_gap(&points, 20, &mut StdRng::seed_from_u64(3))
            .unwrap()
            .unwrap();
        assert_eq!(gap.coordinates[1], 5.0);
    }

    #[test]
    fn test_gap_over_extreme_coordinates() {
        let points = vec![vec![-3e38, 0.0], vec![3e38, 1.0]];
        let gap = Cartographer::default()
            .find_gap(&points, 10, &mut StdRng::seed_from_u64(1))
            .unwrap()
            .unwrap();

        assert!(gap.coordinates.iter().all(|x| x.is_finite()));
        assert!(gap.coordinates[0] >= -3e38 && gap.coordinates[0] <= 3e38);
        assert!(gap.coordinates[1] >= 0.0 && gap.coordinates[1] <= 1.0);
    }

    #[test]
    fn test_sample_between_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let x = sample_between(f32::MIN, f32::MAX, &mut rng);
            assert!(x.is_finite());
        }
        assert_eq!(sample_between(2.5, 2.5, &mut rng), 2.5);
    }

    #[test]
    fn test_cartographer_config() {
        let config: CartographerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_samples, 100);
        assert!(config.max_radius.is_none());
        assert!(config.validate().is_ok());

        let bad = CartographerConfig {
            max_radius: Some(-1.0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_gap_inside_bounding_box(
            points in prop::collection::vec(prop::collection::vec(-5.0f32..5.0, 3), 2..20),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let gap = Cartographer::default()
                .find_gap(&points, 25, &mut rng)
                .unwrap()
                .unwrap();

            for (d, x) in gap.coordinates.iter().enumerate() {
                let lo = points.iter().map(|p| p[d]).fold(f32::INFINITY, f32::min);
                let hi = points.iter().map(|p| p[d]).fold(f32::NEG_INFINITY, f32::max);
                prop_assert!(*x >= lo && *x <= hi);
            }
        }
    }
}
