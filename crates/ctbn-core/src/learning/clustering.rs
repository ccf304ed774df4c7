//! The EM clustering driver.
//!
//! Runs the loop
//! `extract -> seed -> aggregate -> estimate -> (classify -> stop? -> aggregate -> estimate)*`
//! over a fixed structure. Per-trajectory statistics are extracted once and
//! reused by every aggregation; the model is updated only when the run
//! succeeds.

use super::aggregate::{aggregator_for, Aggregator, SoftAggregator, EXTRACTION_CLASS_STATE};
use super::estimate::install_parameters;
use super::extract::extract_all;
use super::init::random_assignment;
use super::statistics::SufficientStatistics;
use super::stop::{StandardStopCriterion, StopCriterion, StopReason};
use crate::inference::{ClassificationResult, Classifier};
use crate::log_event;
use crate::logging::{event_names, generate_run_id, LogContext, Stage};
use crate::model::{CtbnModel, Trajectory};
use ctbn_common::{Error, Result};
use ctbn_config::{validate, ClusteringConfig, LearningPriors, ValidationError};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Result of a successful learning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningOutcome {
    /// Final aggregated statistics, indexed by node.
    pub statistics: Vec<SufficientStatistics>,
    /// Final classification of each trajectory, in training-set order.
    pub classifications: Vec<ClassificationResult>,
    /// Value of the iteration counter when the run stopped.
    pub iterations: usize,
    pub converged_by: StopReason,
}

impl LearningOutcome {
    pub fn labels(&self) -> Vec<usize> {
        self.classifications.iter().map(|c| c.label).collect()
    }

    /// Number of trajectories per class label.
    pub fn cluster_sizes(&self, classes: usize) -> Vec<usize> {
        let mut sizes = vec![0; classes];
        for c in &self.classifications {
            if let Some(size) = sizes.get_mut(c.label) {
                *size += 1;
            }
        }
        sizes
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Initializing,
    Classifying,
    CheckingStop,
    Aggregating,
    Converged(StopReason),
}

/// Learns parameters and a partition of unlabeled trajectories.
pub struct ClusteringLearner {
    priors: LearningPriors,
    aggregator: Box<dyn Aggregator>,
    stop: Box<dyn StopCriterion>,
    classifier: Option<Arc<dyn Classifier>>,
    structure: Option<Vec<Vec<bool>>>,
}

impl Default for ClusteringLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClusteringLearner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusteringLearner")
            .field("priors", &self.priors)
            .field("aggregator", &self.aggregator.name())
            .field("classifier", &self.classifier.as_ref().map(|c| c.name().to_string()))
            .field("structure", &self.structure.is_some())
            .finish()
    }
}

impl ClusteringLearner {
    /// Default priors (soft clustering), the default stop criterion and no
    /// classifier.
    pub fn new() -> Self {
        let priors = LearningPriors::default();
        Self {
            aggregator: aggregator_for(&priors),
            priors,
            stop: Box::new(StandardStopCriterion::default()),
            classifier: None,
            structure: None,
        }
    }

    /// Build a learner from a validated configuration file.
    pub fn from_config(config: &ClusteringConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        validate::validate_config(config).map_err(from_validation_error)?;
        let mut learner = Self::new();
        learner.configure(config.priors)?;
        learner.set_stop_criterion(config.stop.max_iteration, config.stop.changed_bound)?;
        learner.set_classifier(classifier)?;
        Ok(learner)
    }

    /// Set the pseudo-counts and clustering mode.
    ///
    /// Fails on negative or non-finite priors, or when soft clustering is
    /// requested with a classifier that cannot produce posteriors.
    pub fn configure(&mut self, priors: LearningPriors) -> Result<()> {
        validate::validate_priors(&priors).map_err(from_validation_error)?;
        let aggregator = aggregator_for(&priors);
        check_capability(aggregator.as_ref(), self.classifier.as_deref())?;
        self.priors = priors;
        self.aggregator = aggregator;
        Ok(())
    }

    /// Structure to apply before learning; without it the model's own is used.
    pub fn set_structure(&mut self, adjacency: Vec<Vec<bool>>) {
        self.structure = Some(adjacency);
    }

    pub fn set_stop_criterion(&mut self, max_iteration: usize, changed_bound: f64) -> Result<()> {
        self.stop = Box::new(StandardStopCriterion::new(max_iteration, changed_bound)?);
        Ok(())
    }

    pub fn set_custom_stop_criterion(&mut self, stop: Box<dyn StopCriterion>) {
        self.stop = stop;
    }

    pub fn set_classifier(&mut self, classifier: Arc<dyn Classifier>) -> Result<()> {
        check_capability(self.aggregator.as_ref(), Some(classifier.as_ref()))?;
        self.classifier = Some(classifier);
        Ok(())
    }

    pub fn priors(&self) -> &LearningPriors {
        &self.priors
    }

    /// Learn with a seeded generator, or thread-local entropy without a seed.
    pub fn learn_seeded(
        &self,
        model: &mut CtbnModel,
        trajectories: &[Trajectory],
        seed: Option<u64>,
    ) -> Result<LearningOutcome> {
        let mut rng: Box<dyn RngCore> = match seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };
        self.learn_with_rng(model, trajectories, &mut *rng)
    }

    pub fn learn(&self, model: &mut CtbnModel, trajectories: &[Trajectory]) -> Result<LearningOutcome> {
        self.learn_with_rng(model, trajectories, &mut rand::rng())
    }

    /// Run EM with `rng` driving the initial random assignment.
    ///
    /// Every precondition is checked before any statistics are computed.
    /// On success the model holds the applied structure and the final
    /// parameters; on error it is left as it was.
    pub fn learn_with_rng<R: Rng + ?Sized>(
        &self,
        model: &mut CtbnModel,
        trajectories: &[Trajectory],
        rng: &mut R,
    ) -> Result<LearningOutcome> {
        let ctx = LogContext::new(generate_run_id());
        let span = tracing::info_span!(
            "learn",
            run_id = %ctx.run_id,
            mode = self.aggregator.name(),
            trajectories = trajectories.len()
        );
        let _guard = span.enter();

        let result = self.run(&ctx, model, trajectories, rng);
        if let Err(e) = &result {
            log_event!(
                ctx,
                WARN,
                event_names::LEARN_FAILED,
                Stage::Converge,
                format!("learning aborted: {}", e),
                code = e.code()
            );
        }
        result
    }

    fn run<R: Rng + ?Sized>(
        &self,
        ctx: &LogContext,
        model: &mut CtbnModel,
        trajectories: &[Trajectory],
        rng: &mut R,
    ) -> Result<LearningOutcome> {
        let started = Instant::now();
        let (classifier, mut working) = self.check_preconditions(model, trajectories)?;
        log_event!(
            ctx,
            INFO,
            event_names::LEARN_STARTED,
            Stage::Init,
            "learning started",
            classes = working.class_cardinality(),
            nodes = working.node_count()
        );

        let total = trajectories.len();
        let mut phase = Phase::Initializing;
        let mut iteration = 1;
        let mut cached: Vec<Vec<SufficientStatistics>> = Vec::new();
        let mut statistics: Vec<SufficientStatistics> = Vec::new();
        let mut classifications: Vec<ClassificationResult> = Vec::new();
        let mut changed_fraction = 1.0;

        let converged_by = loop {
            phase = match phase {
                Phase::Initializing => {
                    cached = extract_all(&working, trajectories, EXTRACTION_CLASS_STATE)?;
                    log_event!(
                        ctx,
                        INFO,
                        event_names::EXTRACT_FINISHED,
                        Stage::Extract,
                        "per-trajectory statistics extracted",
                        trajectories = total
                    );
                    classifications = random_assignment(total, working.class_cardinality(), rng);
                    log_event!(ctx, DEBUG, event_names::SEED_ASSIGNED, Stage::Init, "random soft assignment drawn");
                    statistics = SoftAggregator.aggregate(&working, &cached, &classifications, &self.priors, None)?;
                    install_parameters(&mut working, &statistics)?;
                    log_event!(ctx, DEBUG, event_names::ESTIMATE_FINISHED, Stage::Estimate, "seed parameters installed");
                    Phase::Classifying
                }
                Phase::Classifying => {
                    let next = classify_all(classifier.as_ref(), &working, trajectories)?;
                    let changed = next
                        .iter()
                        .zip(&classifications)
                        .filter(|(a, b)| a.label != b.label)
                        .count();
                    changed_fraction = changed as f64 / total as f64;
                    classifications = next;
                    log_event!(
                        ctx,
                        DEBUG,
                        event_names::CLASSIFY_FINISHED,
                        Stage::Classify,
                        "training set reclassified",
                        iteration = iteration,
                        changed = changed
                    );
                    Phase::CheckingStop
                }
                Phase::CheckingStop => match self.stop.check(iteration, changed_fraction) {
                    Some(reason) => Phase::Converged(reason),
                    None => Phase::Aggregating,
                },
                Phase::Aggregating => {
                    statistics = self.aggregator.aggregate(
                        &working,
                        &cached,
                        &classifications,
                        &self.priors,
                        Some(&statistics),
                    )?;
                    install_parameters(&mut working, &statistics)?;
                    log_event!(
                        ctx,
                        INFO,
                        event_names::ITERATION_FINISHED,
                        Stage::Aggregate,
                        "iteration finished",
                        iteration = iteration,
                        changed_fraction = changed_fraction
                    );
                    iteration += 1;
                    Phase::Classifying
                }
                Phase::Converged(reason) => break reason,
            };
        };

        *model = working;
        log_event!(
            ctx,
            INFO,
            event_names::LEARN_CONVERGED,
            Stage::Converge,
            format!("learning stopped ({})", converged_by),
            iterations = iteration,
            changed_fraction = changed_fraction,
            elapsed_ms = started.elapsed().as_millis() as u64
        );
        Ok(LearningOutcome {
            statistics,
            classifications,
            iterations: iteration,
            converged_by,
        })
    }

    /// Validate everything `learn` depends on and return the classifier
    /// and a working copy of the model with the structure applied.
    fn check_preconditions(
        &self,
        model: &CtbnModel,
        trajectories: &[Trajectory],
    ) -> Result<(Arc<dyn Classifier>, CtbnModel)> {
        if trajectories.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        let classifier = self
            .classifier
            .clone()
            .ok_or_else(|| Error::MissingCapability("no classifier has been set".to_string()))?;
        check_capability(self.aggregator.as_ref(), Some(classifier.as_ref()))?;

        model.check_structure()?;
        let mut working = model.clone();
        if let Some(adjacency) = &self.structure {
            working.set_structure(adjacency)?;
        }
        working.check_structure()?;
        working.validate_class_node()?;
        for (index, trajectory) in trajectories.iter().enumerate() {
            working
                .validate_trajectory(trajectory)
                .map_err(|e| e.in_trajectory(index))?;
        }
        Ok((classifier, working))
    }
}

fn check_capability(aggregator: &dyn Aggregator, classifier: Option<&dyn Classifier>) -> Result<()> {
    match classifier {
        Some(c) if aggregator.requires_probabilities() && !c.supports_probabilities() => {
            Err(Error::MissingCapability(format!(
                "{} clustering needs posteriors but classifier '{}' only produces labels",
                aggregator.name(),
                c.name()
            )))
        }
        _ => Ok(()),
    }
}

fn classify_all(
    classifier: &dyn Classifier,
    model: &CtbnModel,
    trajectories: &[Trajectory],
) -> Result<Vec<ClassificationResult>> {
    trajectories
        .par_iter()
        .enumerate()
        .map(|(index, t)| classifier.classify(model, t).map_err(|e| e.in_trajectory(index)))
        .collect()
}

/// Map a configuration validation failure onto the engine's error taxonomy.
pub fn from_validation_error(err: ValidationError) -> Error {
    let message = err.to_string();
    match err.field() {
        Some(field) if field.starts_with("priors") => Error::InvalidPriors(message),
        Some(field) if field.starts_with("stop") => Error::InvalidStopCriterion(message),
        _ => Error::Config(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::two_class_benchmark;
    use crate::inference::{ExactClassifier, MapClassifier};
    use crate::sampling::TrajectorySampler;

    fn dataset(n: usize, seed: u64) -> (CtbnModel, Vec<Trajectory>) {
        let truth = two_class_benchmark().unwrap();
        let sampler = TrajectorySampler::new(&truth, 5.0).unwrap();
        let data = sampler
            .sample_many(n, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        (truth, data)
    }

    fn learner(hard: bool) -> ClusteringLearner {
        let mut learner = ClusteringLearner::new();
        let priors = LearningPriors::default();
        learner
            .configure(if hard { priors.hard() } else { priors })
            .unwrap();
        learner.set_classifier(Arc::new(ExactClassifier::new())).unwrap();
        learner
    }

    #[test]
    fn soft_run_preserves_order_and_length() {
        let (truth, data) = dataset(60, 1);
        let mut model = truth.clone();
        let outcome = learner(false)
            .learn_with_rng(&mut model, &data, &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!(outcome.classifications.len(), data.len());
        assert!(outcome.iterations <= 101);
        assert!(outcome.classifications.iter().all(|c| c.posterior.is_some()));
        assert!(model.parameters().is_some());
        assert_eq!(outcome.cluster_sizes(2).iter().sum::<usize>(), 60);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let (truth, data) = dataset(40, 3);
        let learner = learner(true);
        let a = learner.learn_seeded(&mut truth.clone(), &data, Some(9)).unwrap();
        let b = learner.learn_seeded(&mut truth.clone(), &data, Some(9)).unwrap();
        assert_eq!(a.labels(), b.labels());
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let (truth, _) = dataset(1, 0);
        let err = learner(false).learn(&mut truth.clone(), &[]).unwrap_err();
        assert!(matches!(err, Error::EmptyTrainingSet));
    }

    #[test]
    fn soft_clustering_needs_posteriors() {
        let mut learner = ClusteringLearner::new();
        let err = learner
            .set_classifier(Arc::new(MapClassifier::new(ExactClassifier::new())))
            .unwrap_err();
        assert!(matches!(err, Error::MissingCapability(_)));

        learner.configure(LearningPriors::default().hard()).unwrap();
        learner
            .set_classifier(Arc::new(MapClassifier::new(ExactClassifier::new())))
            .unwrap();
        assert!(learner.configure(LearningPriors::default()).is_err());
    }

    #[test]
    fn failed_run_leaves_model_untouched() {
        let (truth, data) = dataset(5, 4);
        let mut model = truth.clone();
        let mut learner = learner(false);
        let n = model.node_count();
        let mut adjacency = vec![vec![false; n]; n];
        adjacency[1][0] = true;
        learner.set_structure(adjacency);
        let err = learner.learn(&mut model, &data).unwrap_err();
        assert!(matches!(err, Error::ClassNodeHasParents { .. }));
        assert_eq!(model.adjacency_matrix(), truth.adjacency_matrix());
        assert!(model.parameters().is_some());
    }

    #[test]
    fn validation_errors_map_to_taxonomy() {
        let err = from_validation_error(ValidationError::OutOfRange {
            field: "priors.tx_prior",
            value: "-1".to_string(),
            requirement: "must not be negative",
        });
        assert!(matches!(err, Error::InvalidPriors(_)));
        let err = from_validation_error(ValidationError::Malformed("bad".to_string()));
        assert!(matches!(err, Error::Config(_)));
    }
}
