//! Vector math shared by the index, the navigator, and the cartographer.
//!
//! All functions operate on `f32` slices and accumulate in `f32`, matching
//! the precision the embeddings arrive in.

use crate::{Error, Result};

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean (L2) norm.
pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity in `[-1, 1]`.
///
/// A zero-norm vector has no direction; its similarity to anything is 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    (dot(a, b) / denom).clamp(-1.0, 1.0)
}

/// Cosine distance `1 - cosine_similarity`, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).max(0.0)
}

/// Euclidean distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Fail with [`Error::DimensionMismatch`] unless `v` has `expected` entries.
pub fn check_dimension(v: &[f32], expected: usize) -> Result<()> {
    if v.len() != expected {
        return Err(Error::dimension_mismatch(expected, v.len()));
    }
    Ok(())
}

/// Fail with [`Error::InvalidInput`] if `v` contains NaN or infinity.
pub fn check_finite(v: &[f32]) -> Result<()> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(Error::invalid_input("vector contains non-finite values"));
    }
    Ok(())
}

/// Validate a batch of vectors shares one dimensionality and return it.
///
/// Returns `Ok(None)` for an empty batch.
pub fn common_dimension<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Option<usize>> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let dim = first.as_ref().len();
    for v in vectors {
        check_dimension(v.as_ref(), dim)?;
    }
    Ok(Some(dim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dot_and_norm() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert!((norm(&[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [0.0, 0.0, 1.0, 0.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &[-1.0, 0.0, 0.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_euclidean_distance() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(euclidean_distance(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(&[1.0, 2.0], 2).is_ok());
        let err = check_dimension(&[1.0], 2).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_check_finite() {
        assert!(check_finite(&[0.0, 1.0]).is_ok());
        assert!(check_finite(&[f32::NAN]).is_err());
        assert!(check_finite(&[f32::INFINITY]).is_err());
    }

    #[test]
    fn test_common_dimension() {
        let empty: Vec<Vec<f32>> = vec![];
        assert_eq!(common_dimension(&empty).unwrap(), None);
        assert_eq!(
            common_dimension(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(),
            Some(2)
        );
        assert!(common_dimension(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    proptest! {
        #[test]
        fn prop_cosine_distance_in_range(
            a in prop::collection::vec(-10.0f32..10.0, 8),
            b in prop::collection::vec(-10.0f32..10.0, 8),
        ) {
            let d = cosine_distance(&a, &b);
            prop_assert!((0.0..=2.0).contains(&d));
        }
    }
}
