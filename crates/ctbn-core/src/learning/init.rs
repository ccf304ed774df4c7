//! Random seed assignment for the EM loop.

use crate::inference::ClassificationResult;
use rand::Rng;
use rand_distr::{Distribution, Exp1};

/// Draw a point uniformly from the probability simplex of dimension `n`.
///
/// Normalized unit-exponential draws are Dirichlet(1, ..., 1) distributed.
pub fn soft_sampling<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    let draws: Vec<f64> = (0..n).map(|_| Exp1.sample(rng)).collect();
    match ctbn_math::normalize_weights(&draws) {
        Some(weights) => weights,
        None => vec![1.0 / n as f64; n],
    }
}

/// A random soft assignment for `trajectories` trajectories over `classes`
/// class states.
pub fn random_assignment<R: Rng + ?Sized>(
    trajectories: usize,
    classes: usize,
    rng: &mut R,
) -> Vec<ClassificationResult> {
    (0..trajectories)
        .map(|_| ClassificationResult::from_posterior(soft_sampling(classes, rng), None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_lie_on_the_simplex() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 1..6 {
            let p = soft_sampling(n, &mut rng);
            assert_eq!(p.len(), n);
            assert!(ctbn_math::is_probability_vector(&p, 1e-9));
        }
        assert!(soft_sampling(0, &mut rng).is_empty());
    }

    #[test]
    fn seeded_assignment_is_reproducible() {
        let a = random_assignment(4, 3, &mut StdRng::seed_from_u64(11));
        let b = random_assignment(4, 3, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
        assert!(a.iter().all(|r| r.posterior.as_ref().is_some_and(|p| p.len() == 3)));
    }
}
