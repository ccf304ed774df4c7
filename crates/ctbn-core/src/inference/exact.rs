//! Exact posterior classification of fully observed trajectories.

use super::classifier::{ClassificationResult, Classifier};
use crate::learning::extract::extract_trajectory_statistics;
use crate::learning::SufficientStatistics;
use crate::model::{CtbnModel, NodeParameters, Trajectory};
use ctbn_common::{Error, Result};
use ctbn_math::{normalize_log_probs, xlny};

/// Scores every class state by the complete-data log-likelihood.
///
/// For class state `c` the trajectory is re-scanned with the class held at
/// `c` and scored as
/// `sum_static Px ln(theta) + sum_dynamic (Tx q_ss + sum_{s' != s} Mxx ln q_ss')`.
/// The scores are normalized in the log domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactClassifier;

impl ExactClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Unnormalized log score of each class state.
    pub fn class_log_scores(&self, model: &CtbnModel, trajectory: &Trajectory) -> Result<Vec<f64>> {
        let parameters = model.parameters().ok_or_else(|| {
            Error::Inference("model has no parameters installed".to_string())
        })?;
        (0..model.class_cardinality())
            .map(|class_state| {
                let stats = extract_trajectory_statistics(model, trajectory, class_state)?;
                Ok(stats
                    .iter()
                    .zip(parameters)
                    .map(|(s, p)| log_likelihood(s, p))
                    .sum())
            })
            .collect()
    }
}

impl Classifier for ExactClassifier {
    fn classify(&self, model: &CtbnModel, trajectory: &Trajectory) -> Result<ClassificationResult> {
        let scores = self.class_log_scores(model, trajectory)?;
        let normalized = normalize_log_probs(&scores).ok_or_else(|| {
            Error::DegenerateLikelihood(format!(
                "no class state explains the trajectory (scores {:?})",
                scores
            ))
        })?;
        Ok(ClassificationResult::from_posterior(
            normalized.probabilities,
            Some(normalized.log_normalizer),
        ))
    }

    fn supports_probabilities(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "exact"
    }
}

/// Labels only: wraps another classifier and drops its posterior.
#[derive(Debug, Clone, Default)]
pub struct MapClassifier<C = ExactClassifier> {
    inner: C,
}

impl<C: Classifier> MapClassifier<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Classifier> Classifier for MapClassifier<C> {
    fn classify(&self, model: &CtbnModel, trajectory: &Trajectory) -> Result<ClassificationResult> {
        let result = self.inner.classify(model, trajectory)?;
        Ok(ClassificationResult::hard(result.label))
    }

    fn supports_probabilities(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "map"
    }
}

fn log_likelihood(stats: &SufficientStatistics, params: &NodeParameters) -> f64 {
    match (stats, params) {
        (SufficientStatistics::Static(s), NodeParameters::Probabilities(tables)) => {
            let mut total = 0.0;
            for (cfg, table) in tables.iter().enumerate() {
                for (state, &p) in table.iter().enumerate() {
                    total += xlny(s.px(cfg, state), p);
                }
            }
            total
        }
        (SufficientStatistics::Dynamic(s), NodeParameters::Intensities(matrices)) => {
            let mut total = 0.0;
            for (cfg, cim) in matrices.iter().enumerate() {
                for from in 0..cim.size() {
                    total += s.tx(cfg, from) * cim.rate(from, from);
                    for to in (0..cim.size()).filter(|&to| to != from) {
                        total += xlny(s.mxx(cfg, from, to), cim.rate(from, to));
                    }
                }
            }
            total
        }
        _ => f64::NEG_INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Event, IntensityMatrix, Node, NodeKind};

    fn model() -> CtbnModel {
        let mut model = CtbnModel::new(
            vec![
                Node::with_cardinality("C", 2, NodeKind::Static),
                Node::with_cardinality("X", 2, NodeKind::Dynamic),
            ],
            0,
        )
        .unwrap()
        .with_structure(&[vec![false, true], vec![false, false]])
        .unwrap();
        // Class 0: X flips slowly. Class 1: X flips fast.
        model
            .set_parameters(vec![
                NodeParameters::Probabilities(vec![vec![0.5, 0.5]]),
                NodeParameters::Intensities(vec![
                    IntensityMatrix::from_rows(&[vec![-0.1, 0.1], vec![0.1, -0.1]]).unwrap(),
                    IntensityMatrix::from_rows(&[vec![-5.0, 5.0], vec![5.0, -5.0]]).unwrap(),
                ]),
            ])
            .unwrap();
        model
    }

    fn fast_trajectory() -> Trajectory {
        let events = (0..20)
            .map(|i| Event::new(i as f64 * 0.2, vec![0, i % 2]))
            .collect();
        Trajectory::new(events).unwrap()
    }

    #[test]
    fn fast_switching_is_class_one() {
        let result = ExactClassifier::new().classify(&model(), &fast_trajectory()).unwrap();
        assert_eq!(result.label, 1);
        let posterior = result.posterior.unwrap();
        assert!(posterior[1] > 0.99);
        assert!((posterior.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(result.log_likelihood.unwrap().is_finite());
    }

    #[test]
    fn quiet_trajectory_is_class_zero() {
        let t = Trajectory::new(vec![Event::new(0.0, vec![0, 0]), Event::new(10.0, vec![0, 0])])
            .unwrap();
        let result = ExactClassifier::new().classify(&model(), &t).unwrap();
        assert_eq!(result.label, 0);
    }

    #[test]
    fn requires_parameters() {
        let mut m = model();
        m.set_parents(1, &[0]).unwrap();
        let err = ExactClassifier::new().classify(&m, &fast_trajectory()).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn map_classifier_drops_posterior() {
        let map = MapClassifier::new(ExactClassifier::new());
        let result = map.classify(&model(), &fast_trajectory()).unwrap();
        assert_eq!(result.label, 1);
        assert!(result.posterior.is_none());
        assert!(!map.supports_probabilities());
    }

    #[test]
    fn zero_rate_transition_is_impossible_for_that_class() {
        let mut m = model();
        m.set_parameters(vec![
            NodeParameters::Probabilities(vec![vec![0.5, 0.5]]),
            NodeParameters::Intensities(vec![
                IntensityMatrix::zeros(2),
                IntensityMatrix::from_rows(&[vec![-1.0, 1.0], vec![1.0, -1.0]]).unwrap(),
            ]),
        ])
        .unwrap();
        let result = ExactClassifier::new().classify(&m, &fast_trajectory()).unwrap();
        assert_eq!(result.posterior.unwrap()[0], 0.0);
    }
}
