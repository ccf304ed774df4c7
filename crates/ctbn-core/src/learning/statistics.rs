//! Sufficient statistics accumulators.
//!
//! Dynamic nodes accumulate, per parent configuration and source state,
//! transition counts (`Mxx`), their totals (`Mx`) and holding times (`Tx`).
//! Static nodes accumulate occurrence counts (`Px`) and their totals
//! (`counts`). Pseudo-counts from [`LearningPriors`] are added uniformly at
//! construction; self-transitions are never recorded, so the diagonal of
//! `Mxx` stays zero and `Mx` equals the off-diagonal row sum.

use crate::model::{Node, NodeKind};
use ctbn_common::{Error, Result};
use ctbn_config::LearningPriors;
use serde::{Deserialize, Serialize};

/// Transition statistics of a dynamic node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionStatistics {
    states: usize,
    /// `[configuration][from][to]` transition counts.
    mxx: Vec<Vec<Vec<f64>>>,
    /// `[configuration][from]` total outgoing transitions.
    mx: Vec<Vec<f64>>,
    /// `[configuration][from]` total time spent in `from`.
    tx: Vec<Vec<f64>>,
}

impl TransitionStatistics {
    pub fn new(configurations: usize, states: usize, mxx_prior: f64, tx_prior: f64) -> Self {
        let mut row = vec![vec![mxx_prior; states]; states];
        for (s, r) in row.iter_mut().enumerate() {
            r[s] = 0.0;
        }
        let exits = mxx_prior * states.saturating_sub(1) as f64;
        Self {
            states,
            mxx: vec![row; configurations],
            mx: vec![vec![exits; states]; configurations],
            tx: vec![vec![tx_prior; states]; configurations],
        }
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn configuration_count(&self) -> usize {
        self.tx.len()
    }

    pub fn mxx(&self, cfg: usize, from: usize, to: usize) -> f64 {
        self.mxx[cfg][from][to]
    }

    pub fn mx(&self, cfg: usize, from: usize) -> f64 {
        self.mx[cfg][from]
    }

    pub fn tx(&self, cfg: usize, from: usize) -> f64 {
        self.tx[cfg][from]
    }

    pub fn add_holding_time(&mut self, cfg: usize, state: usize, duration: f64) {
        self.tx[cfg][state] += duration;
    }

    /// Record one `from -> to` jump. Self-transitions are ignored.
    pub fn add_transition(&mut self, cfg: usize, from: usize, to: usize) {
        if from == to {
            return;
        }
        self.mxx[cfg][from][to] += 1.0;
        self.mx[cfg][from] += 1.0;
    }

    fn absorb(&mut self, target: usize, other: &Self, source: usize, weight: f64) {
        for from in 0..self.states {
            for to in 0..self.states {
                self.mxx[target][from][to] += weight * other.mxx[source][from][to];
            }
            self.mx[target][from] += weight * other.mx[source][from];
            self.tx[target][from] += weight * other.tx[source][from];
        }
    }

    /// `Mx[c][s] == sum_{s' != s} Mxx[c][s][s']` and a zero diagonal.
    pub fn is_consistent(&self, tol: f64) -> bool {
        self.mxx.iter().zip(self.mx.iter()).all(|(rows, totals)| {
            rows.iter().enumerate().all(|(from, row)| {
                let off: f64 = row
                    .iter()
                    .enumerate()
                    .filter(|(to, _)| *to != from)
                    .map(|(_, v)| v)
                    .sum();
                row[from] == 0.0 && (off - totals[from]).abs() <= tol * off.abs().max(1.0)
            })
        })
    }
}

/// Occurrence statistics of a static node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceStatistics {
    /// `[configuration][state]` occurrence counts.
    px: Vec<Vec<f64>>,
    /// `[configuration]` total occurrences.
    counts: Vec<f64>,
}

impl OccurrenceStatistics {
    pub fn new(configurations: usize, states: usize, px_prior: f64) -> Self {
        Self {
            px: vec![vec![px_prior; states]; configurations],
            counts: vec![px_prior * states as f64; configurations],
        }
    }

    pub fn states(&self) -> usize {
        self.px.first().map_or(0, Vec::len)
    }

    pub fn configuration_count(&self) -> usize {
        self.counts.len()
    }

    pub fn px(&self, cfg: usize, state: usize) -> f64 {
        self.px[cfg][state]
    }

    pub fn count(&self, cfg: usize) -> f64 {
        self.counts[cfg]
    }

    /// Add `weight` occurrences of `state` (fractional for soft assignment).
    pub fn add_occurrence(&mut self, cfg: usize, state: usize, weight: f64) {
        self.px[cfg][state] += weight;
        self.counts[cfg] += weight;
    }

    fn absorb(&mut self, target: usize, other: &Self, source: usize, weight: f64) {
        for (dst, src) in self.px[target].iter_mut().zip(other.px[source].iter()) {
            *dst += weight * src;
        }
        self.counts[target] += weight * other.counts[source];
    }

    /// `sum(Px[c][:]) == counts[c]` for every configuration.
    pub fn is_consistent(&self, tol: f64) -> bool {
        self.px.iter().zip(self.counts.iter()).all(|(row, &count)| {
            let sum: f64 = row.iter().sum();
            (sum - count).abs() <= tol * count.abs().max(1.0)
        })
    }
}

/// Statistics of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SufficientStatistics {
    Dynamic(TransitionStatistics),
    Static(OccurrenceStatistics),
}

impl SufficientStatistics {
    /// Fresh statistics for `node` seeded with the priors' pseudo-counts.
    pub fn for_node(node: &Node, priors: &LearningPriors) -> Self {
        let configs = node.parent_configuration_count();
        let states = node.cardinality();
        match node.kind() {
            NodeKind::Dynamic => SufficientStatistics::Dynamic(TransitionStatistics::new(
                configs,
                states,
                priors.mxx_prior,
                priors.tx_prior,
            )),
            NodeKind::Static => SufficientStatistics::Static(OccurrenceStatistics::new(
                configs,
                states,
                priors.px_prior,
            )),
        }
    }

    /// Prior-free statistics for `node`.
    pub fn empty_for(node: &Node) -> Self {
        Self::for_node(node, &LearningPriors::zero())
    }

    pub fn configuration_count(&self) -> usize {
        match self {
            SufficientStatistics::Dynamic(s) => s.configuration_count(),
            SufficientStatistics::Static(s) => s.configuration_count(),
        }
    }

    pub fn as_dynamic(&self) -> Option<&TransitionStatistics> {
        match self {
            SufficientStatistics::Dynamic(s) => Some(s),
            SufficientStatistics::Static(_) => None,
        }
    }

    pub fn as_static(&self) -> Option<&OccurrenceStatistics> {
        match self {
            SufficientStatistics::Static(s) => Some(s),
            SufficientStatistics::Dynamic(_) => None,
        }
    }

    /// Add `weight` times `other`'s configuration `source` into this
    /// statistics' configuration `target`.
    pub fn absorb(&mut self, target: usize, other: &Self, source: usize, weight: f64) -> Result<()> {
        if target >= self.configuration_count() || source >= other.configuration_count() {
            return Err(Error::InvalidStructure(format!(
                "configuration {} -> {} out of range ({} / {})",
                source,
                target,
                other.configuration_count(),
                self.configuration_count()
            )));
        }
        match (self, other) {
            (SufficientStatistics::Dynamic(dst), SufficientStatistics::Dynamic(src))
                if dst.states == src.states =>
            {
                dst.absorb(target, src, source, weight);
                Ok(())
            }
            (SufficientStatistics::Static(dst), SufficientStatistics::Static(src))
                if dst.states() == src.states() =>
            {
                dst.absorb(target, src, source, weight);
                Ok(())
            }
            _ => Err(Error::InvalidStructure(
                "cannot combine statistics of different node shapes".to_string(),
            )),
        }
    }

    /// Add `weight` times every configuration of `other` into the same
    /// configuration of this statistics.
    pub fn absorb_all(&mut self, other: &Self, weight: f64) -> Result<()> {
        if other.configuration_count() != self.configuration_count() {
            return Err(Error::InvalidStructure(format!(
                "statistics cover {} configurations, expected {}",
                other.configuration_count(),
                self.configuration_count()
            )));
        }
        for cfg in 0..self.configuration_count() {
            self.absorb(cfg, other, cfg, weight)?;
        }
        Ok(())
    }

    /// Whether the bookkeeping invariants hold within relative tolerance `tol`.
    pub fn is_consistent(&self, tol: f64) -> bool {
        match self {
            SufficientStatistics::Dynamic(s) => s.is_consistent(tol),
            SufficientStatistics::Static(s) => s.is_consistent(tol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic_node(states: usize) -> Node {
        Node::with_cardinality("X", states, NodeKind::Dynamic)
    }

    #[test]
    fn priors_seed_every_cell() {
        let priors = LearningPriors::new(1.0, 0.005, 2.0, false);
        let stats = SufficientStatistics::for_node(&dynamic_node(3), &priors);
        let dynamic = stats.as_dynamic().unwrap();
        assert_eq!(dynamic.mxx(0, 0, 1), 1.0);
        assert_eq!(dynamic.mxx(0, 1, 1), 0.0);
        assert_eq!(dynamic.mx(0, 2), 2.0);
        assert_eq!(dynamic.tx(0, 0), 0.005);
        assert!(stats.is_consistent(1e-12));

        let static_node = Node::with_cardinality("S", 4, NodeKind::Static);
        let stats = SufficientStatistics::for_node(&static_node, &priors);
        let occurrences = stats.as_static().unwrap();
        assert_eq!(occurrences.px(0, 3), 2.0);
        assert_eq!(occurrences.count(0), 8.0);
        assert!(stats.is_consistent(1e-12));
    }

    #[test]
    fn self_transitions_are_not_recorded() {
        let mut stats = TransitionStatistics::new(1, 2, 0.0, 0.0);
        stats.add_transition(0, 1, 1);
        stats.add_transition(0, 0, 1);
        assert_eq!(stats.mx(0, 1), 0.0);
        assert_eq!(stats.mx(0, 0), 1.0);
        assert!(stats.is_consistent(1e-12));
    }

    #[test]
    fn absorb_scales_and_moves_configurations() {
        let mut src = TransitionStatistics::new(2, 2, 0.0, 0.0);
        src.add_transition(0, 0, 1);
        src.add_holding_time(0, 0, 2.0);
        let src = SufficientStatistics::Dynamic(src);

        let mut dst = SufficientStatistics::Dynamic(TransitionStatistics::new(2, 2, 0.0, 0.0));
        dst.absorb(1, &src, 0, 0.25).unwrap();
        let d = dst.as_dynamic().unwrap();
        assert_eq!(d.mxx(1, 0, 1), 0.25);
        assert_eq!(d.mx(1, 0), 0.25);
        assert_eq!(d.tx(1, 0), 0.5);
        assert_eq!(d.tx(0, 0), 0.0);
    }

    #[test]
    fn absorb_rejects_mismatched_kinds() {
        let mut dynamic = SufficientStatistics::empty_for(&dynamic_node(2));
        let stat = SufficientStatistics::empty_for(&Node::with_cardinality("S", 2, NodeKind::Static));
        assert!(dynamic.absorb(0, &stat, 0, 1.0).is_err());
        assert!(dynamic.absorb(3, &dynamic.clone(), 0, 1.0).is_err());
    }

    #[test]
    fn occurrences_keep_totals() {
        let mut stats = OccurrenceStatistics::new(1, 3, 0.5);
        stats.add_occurrence(0, 2, 0.7);
        stats.add_occurrence(0, 0, 0.3);
        assert!((stats.count(0) - 2.5).abs() < 1e-12);
        assert!(stats.is_consistent(1e-12));
    }
}
