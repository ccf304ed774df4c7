//! Aggregation of cached per-trajectory statistics into model statistics.
//!
//! Per-trajectory statistics were extracted with the class held at an
//! assumed state, so for a node whose parents include the class every
//! target parent configuration is read from the matching "as extracted"
//! configuration (see [`reindex_for_assumed_class`]) and scaled by the
//! trajectory's weight for the class state the target configuration
//! implies. Hard and soft aggregation differ only in those weights.

use super::statistics::SufficientStatistics;
use crate::inference::ClassificationResult;
use crate::model::{CtbnModel, Node};
use ctbn_common::{Error, Result};
use ctbn_config::LearningPriors;

/// Class state every cached statistic was extracted under.
pub const EXTRACTION_CLASS_STATE: usize = 0;

/// How far a posterior may stray from the probability simplex.
pub const SIMPLEX_TOLERANCE: f64 = 1e-6;

/// Combines cached statistics under a class assignment.
pub trait Aggregator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the assignment must carry posteriors.
    fn requires_probabilities(&self) -> bool;

    /// Weight of each class state for one trajectory.
    fn class_weights(&self, result: &ClassificationResult, classes: usize) -> Result<Vec<f64>>;

    /// Build fresh model statistics, seeded with `priors`.
    ///
    /// `cached[t][n]` are the statistics of node `n` in trajectory `t`,
    /// extracted under [`EXTRACTION_CLASS_STATE`]. Nodes that do not depend
    /// on the class reuse `previous` when it is given.
    fn aggregate(
        &self,
        model: &CtbnModel,
        cached: &[Vec<SufficientStatistics>],
        assignment: &[ClassificationResult],
        priors: &LearningPriors,
        previous: Option<&[SufficientStatistics]>,
    ) -> Result<Vec<SufficientStatistics>> {
        if cached.len() != assignment.len() {
            return Err(Error::Inference(format!(
                "{} cached trajectories but {} class assignments",
                cached.len(),
                assignment.len()
            )));
        }
        let classes = model.class_cardinality();
        let weights = assignment
            .iter()
            .enumerate()
            .map(|(t, r)| self.class_weights(r, classes).map_err(|e| e.in_trajectory(t)))
            .collect::<Result<Vec<_>>>()?;
        aggregate_weighted(model, cached, &weights, priors, previous)
    }
}

/// Only trajectories labelled with the implied class state contribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardAggregator;

impl Aggregator for HardAggregator {
    fn name(&self) -> &'static str {
        "hard"
    }

    fn requires_probabilities(&self) -> bool {
        false
    }

    fn class_weights(&self, result: &ClassificationResult, classes: usize) -> Result<Vec<f64>> {
        if result.label >= classes {
            return Err(Error::Inference(format!(
                "label {} out of range for {} classes",
                result.label, classes
            )));
        }
        let mut weights = vec![0.0; classes];
        weights[result.label] = 1.0;
        Ok(weights)
    }
}

/// Every trajectory contributes, scaled by its posterior.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftAggregator;

impl Aggregator for SoftAggregator {
    fn name(&self) -> &'static str {
        "soft"
    }

    fn requires_probabilities(&self) -> bool {
        true
    }

    fn class_weights(&self, result: &ClassificationResult, classes: usize) -> Result<Vec<f64>> {
        let posterior = result.posterior.as_ref().ok_or_else(|| {
            Error::MissingCapability("soft aggregation needs a posterior for every trajectory".to_string())
        })?;
        if posterior.len() != classes {
            return Err(Error::Inference(format!(
                "posterior has {} entries, expected {}",
                posterior.len(),
                classes
            )));
        }
        if posterior.iter().any(|p| *p < 0.0)
            || !ctbn_math::is_probability_vector(posterior, SIMPLEX_TOLERANCE)
        {
            return Err(Error::Inference(format!(
                "posterior {:?} is not a probability distribution",
                posterior
            )));
        }
        Ok(posterior.clone())
    }
}

/// The aggregator selected by the clustering mode.
pub fn aggregator_for(priors: &LearningPriors) -> Box<dyn Aggregator> {
    if priors.hard_clustering {
        Box::new(HardAggregator)
    } else {
        Box::new(SoftAggregator)
    }
}

/// Map a target parent configuration of `node` to the configuration its
/// statistics were extracted under.
///
/// Returns `(source_configuration, class_state)`: the class digit of
/// `target_configuration` replaced by `assumed_state`, and the class state
/// that digit held. `None` when the class is not a parent of `node`.
pub fn reindex_for_assumed_class(
    node: &Node,
    class_index: usize,
    target_configuration: usize,
    assumed_state: usize,
) -> Option<(usize, usize)> {
    let position = node.parent_position(class_index)?;
    let mut states = node.parent_states(target_configuration);
    let class_state = states[position];
    states[position] = assumed_state;
    Some((node.encode_parent_states(&states), class_state))
}

/// Shared body of both aggregators; `weights[t][k]` is trajectory `t`'s
/// weight for class state `k`.
pub(crate) fn aggregate_weighted(
    model: &CtbnModel,
    cached: &[Vec<SufficientStatistics>],
    weights: &[Vec<f64>],
    priors: &LearningPriors,
    previous: Option<&[SufficientStatistics]>,
) -> Result<Vec<SufficientStatistics>> {
    model.validate_class_node()?;
    let node_count = model.node_count();
    if let Some(t) = cached.iter().position(|stats| stats.len() != node_count) {
        return Err(Error::InvalidStructure(format!(
            "cached statistics of trajectory {} cover {} nodes, model has {}",
            t,
            cached[t].len(),
            node_count
        )));
    }
    if let Some(prev) = previous {
        if prev.len() != node_count {
            return Err(Error::InvalidStructure(format!(
                "previous statistics cover {} nodes, model has {}",
                prev.len(),
                node_count
            )));
        }
    }

    let class_index = model.class_index();
    let mut result = Vec::with_capacity(node_count);
    for (index, node) in model.nodes().iter().enumerate() {
        let stats = if index == class_index {
            aggregate_class(node, weights, priors)?
        } else if node.has_parent(class_index) {
            aggregate_class_child(node, index, class_index, cached, weights, priors)?
        } else if let Some(prev) = previous {
            prev[index].clone()
        } else {
            let mut stats = SufficientStatistics::for_node(node, priors);
            for trajectory in cached {
                stats.absorb_all(&trajectory[index], 1.0)?;
            }
            stats
        };
        result.push(stats);
    }
    Ok(result)
}

fn aggregate_class(
    node: &Node,
    weights: &[Vec<f64>],
    priors: &LearningPriors,
) -> Result<SufficientStatistics> {
    let mut stats = SufficientStatistics::for_node(node, priors);
    let SufficientStatistics::Static(occurrences) = &mut stats else {
        return Err(Error::InvalidStructure(format!(
            "class node '{}' must be static",
            node.name()
        )));
    };
    for w in weights {
        for (class_state, &weight) in w.iter().enumerate() {
            if weight != 0.0 {
                occurrences.add_occurrence(0, class_state, weight);
            }
        }
    }
    Ok(stats)
}

fn aggregate_class_child(
    node: &Node,
    index: usize,
    class_index: usize,
    cached: &[Vec<SufficientStatistics>],
    weights: &[Vec<f64>],
    priors: &LearningPriors,
) -> Result<SufficientStatistics> {
    let mut stats = SufficientStatistics::for_node(node, priors);
    for target in 0..node.parent_configuration_count() {
        let Some((source, class_state)) =
            reindex_for_assumed_class(node, class_index, target, EXTRACTION_CLASS_STATE)
        else {
            continue;
        };
        for (trajectory, w) in cached.iter().zip(weights) {
            let weight = w[class_state];
            if weight != 0.0 {
                stats.absorb(target, &trajectory[index], source, weight)?;
            }
        }
    }
    Ok(stats)
}
