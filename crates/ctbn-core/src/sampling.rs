//! Forward sampling of labelled trajectories from a parameterized model.
//!
//! Static nodes (the class included) are drawn once from their probability
//! tables; dynamic nodes start uniformly at random and then evolve by
//! Gillespie simulation until the end time, which is recorded as a final
//! censoring event.

use crate::model::{CtbnModel, Event, NodeParameters, Trajectory};
use ctbn_common::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Exp1};

/// Draws trajectories from a model with installed parameters.
#[derive(Debug, Clone)]
pub struct TrajectorySampler<'a> {
    model: &'a CtbnModel,
    parameters: &'a [NodeParameters],
    end_time: f64,
    static_order: Vec<usize>,
}

impl<'a> TrajectorySampler<'a> {
    /// Fails without parameters, with a non-positive or non-finite end time,
    /// or when static nodes depend on each other cyclically.
    pub fn new(model: &'a CtbnModel, end_time: f64) -> Result<Self> {
        let parameters = model.parameters().ok_or_else(|| {
            Error::Inference("cannot sample from a model without parameters".to_string())
        })?;
        if !(end_time.is_finite() && end_time > 0.0) {
            return Err(Error::Config(format!(
                "end time must be positive and finite, got {}",
                end_time
            )));
        }
        let static_order = static_topological_order(model)?;
        Ok(Self {
            model,
            parameters,
            end_time,
            static_order,
        })
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Draw one trajectory labelled with its class value.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<Trajectory> {
        let nodes = self.model.nodes();
        let mut assignment: Vec<usize> = nodes
            .iter()
            .map(|n| if n.is_static() { 0 } else { rng.random_range(0..n.cardinality()) })
            .collect();

        for &index in &self.static_order {
            let node = &nodes[index];
            let NodeParameters::Probabilities(tables) = &self.parameters[index] else {
                return Err(kind_mismatch(node.name()));
            };
            let cfg = node.parent_configuration_index(&assignment);
            assignment[index] = categorical(&tables[cfg], rng);
        }

        let mut events = vec![Event::new(0.0, assignment.clone())];
        let mut time = 0.0;
        let mut rates = vec![0.0; nodes.len()];
        loop {
            for (index, node) in nodes.iter().enumerate() {
                rates[index] = match &self.parameters[index] {
                    NodeParameters::Intensities(matrices) => {
                        let cfg = node.parent_configuration_index(&assignment);
                        matrices[cfg].exit_rate(assignment[index])
                    }
                    NodeParameters::Probabilities(_) => 0.0,
                };
            }
            let total: f64 = rates.iter().sum();
            if total <= 0.0 {
                break;
            }
            let wait: f64 = Exp1.sample(rng);
            time += wait / total;
            if time >= self.end_time {
                break;
            }

            let index = categorical(&rates, rng);
            let NodeParameters::Intensities(matrices) = &self.parameters[index] else {
                return Err(kind_mismatch(nodes[index].name()));
            };
            let cfg = nodes[index].parent_configuration_index(&assignment);
            let from = assignment[index];
            let targets: Vec<f64> = matrices[cfg]
                .row(from)
                .iter()
                .enumerate()
                .map(|(to, &q)| if to == from { 0.0 } else { q })
                .collect();
            assignment[index] = categorical(&targets, rng);
            events.push(Event::new(time, assignment.clone()));
        }
        events.push(Event::new(self.end_time, assignment.clone()));

        let label = assignment[self.model.class_index()];
        Ok(Trajectory::new(events)?.with_label(label))
    }

    pub fn sample_many<R: Rng>(&self, count: usize, rng: &mut R) -> Result<Vec<Trajectory>> {
        (0..count).map(|_| self.sample(rng)).collect()
    }
}

fn kind_mismatch(node: &str) -> Error {
    Error::InvalidStructure(format!("parameters of node '{}' do not match its kind", node))
}

/// Index drawn proportionally to non-negative `weights`.
fn categorical<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    let mut u = rng.random::<f64>() * total;
    let mut last = 0;
    for (index, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        if u < w {
            return index;
        }
        u -= w;
        last = index;
    }
    last
}

/// Static nodes ordered so every static parent precedes its children.
fn static_topological_order(model: &CtbnModel) -> Result<Vec<usize>> {
    let nodes = model.nodes();
    let mut order = Vec::new();
    let mut placed = vec![false; nodes.len()];
    for (index, node) in nodes.iter().enumerate() {
        if !node.is_static() {
            placed[index] = true;
        }
    }
    while order.len() < nodes.iter().filter(|n| n.is_static()).count() {
        let ready = (0..nodes.len())
            .find(|&i| !placed[i] && nodes[i].parents().iter().all(|&p| placed[p]))
            .ok_or_else(|| {
                Error::InvalidStructure("static nodes form a dependency cycle".to_string())
            })?;
        placed[ready] = true;
        order.push(ready);
    }
    Ok(order)
}
