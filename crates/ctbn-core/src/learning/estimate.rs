//! Parameter estimation from aggregated statistics.

use super::statistics::{OccurrenceStatistics, SufficientStatistics, TransitionStatistics};
use crate::model::{CtbnModel, IntensityMatrix, Node, NodeParameters};
use ctbn_common::{Error, Result};

/// Turn aggregated statistics into parameter tables, one per node.
///
/// Static node, configuration `c`: `P(s) = Px[c][s] / counts[c]`.
/// Dynamic node: `q[c][s][s] = -Mx[c][s] / Tx[c][s]` and
/// `q[c][s][s'] = Mxx[c][s][s'] / Tx[c][s]`. A configuration with no
/// occurrences or no holding time fails with
/// [`Error::DegenerateParameters`] naming the node and configuration, and
/// every produced table is validated before it is returned.
pub fn estimate_parameters(
    model: &CtbnModel,
    statistics: &[SufficientStatistics],
) -> Result<Vec<NodeParameters>> {
    if statistics.len() != model.node_count() {
        return Err(Error::InvalidStructure(format!(
            "statistics cover {} nodes, model has {}",
            statistics.len(),
            model.node_count()
        )));
    }
    model
        .nodes()
        .iter()
        .zip(statistics)
        .map(|(node, stats)| {
            if stats.configuration_count() != node.parent_configuration_count() {
                return Err(Error::InvalidStructure(format!(
                    "statistics of '{}' cover {} configurations, expected {}",
                    node.name(),
                    stats.configuration_count(),
                    node.parent_configuration_count()
                )));
            }
            let params = match stats {
                SufficientStatistics::Static(s) => estimate_probabilities(node, s)?,
                SufficientStatistics::Dynamic(s) => estimate_intensities(node, s)?,
            };
            params.validate(node.name())?;
            Ok(params)
        })
        .collect()
}

/// Estimate and install parameters; the model is untouched on error.
pub fn install_parameters(model: &mut CtbnModel, statistics: &[SufficientStatistics]) -> Result<()> {
    let parameters = estimate_parameters(model, statistics)?;
    model.set_parameters(parameters)
}

fn degenerate(node: &Node, cfg: usize, reason: String) -> Error {
    Error::DegenerateParameters {
        node: node.name().to_string(),
        parent_configuration: cfg,
        reason,
    }
}

fn estimate_probabilities(node: &Node, stats: &OccurrenceStatistics) -> Result<NodeParameters> {
    let mut tables = Vec::with_capacity(stats.configuration_count());
    for cfg in 0..stats.configuration_count() {
        let count = stats.count(cfg);
        if !(count.is_finite() && count > 0.0) {
            return Err(degenerate(node, cfg, format!("occurrence count is {}", count)));
        }
        tables.push((0..stats.states()).map(|s| stats.px(cfg, s) / count).collect());
    }
    Ok(NodeParameters::Probabilities(tables))
}

fn estimate_intensities(node: &Node, stats: &TransitionStatistics) -> Result<NodeParameters> {
    let states = stats.states();
    let mut matrices = Vec::with_capacity(stats.configuration_count());
    for cfg in 0..stats.configuration_count() {
        let mut cim = IntensityMatrix::zeros(states);
        for from in 0..states {
            let tx = stats.tx(cfg, from);
            if !(tx.is_finite() && tx > 0.0) {
                return Err(degenerate(
                    node,
                    cfg,
                    format!("holding time in state {} is {}", from, tx),
                ));
            }
            for to in 0..states {
                let rate = if to == from {
                    -stats.mx(cfg, from) / tx
                } else {
                    stats.mxx(cfg, from, to) / tx
                };
                cim.set_rate(from, to, rate);
            }
        }
        matrices.push(cim);
    }
    Ok(NodeParameters::Intensities(matrices))
}
