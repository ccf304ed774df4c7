//! Per-trajectory sufficient statistics extraction.
//!
//! Each trajectory is scanned once with the class node forced to an
//! explicitly assumed state. Statistics are prior-free so the cache can be
//! reused by every aggregation of a learning run.

use super::statistics::SufficientStatistics;
use crate::model::{CtbnModel, NodeKind, Trajectory};
use ctbn_common::{Error, Result};
use rayon::prelude::*;

/// Extract one prior-free [`SufficientStatistics`] per node from a trajectory.
///
/// The class value observed in the trajectory is ignored; the class node is
/// held at `assumed_class_state` for every parent-configuration lookup.
/// Static nodes record one occurrence from the first event and must not
/// change afterwards. Between consecutive events every dynamic node accrues
/// the interval as holding time, and nodes whose value differs at the next
/// event record a transition. All lookups for one event use the pre-event
/// assignment.
pub fn extract_trajectory_statistics(
    model: &CtbnModel,
    trajectory: &Trajectory,
    assumed_class_state: usize,
) -> Result<Vec<SufficientStatistics>> {
    model.validate_trajectory(trajectory)?;
    let class_index = model.class_index();
    if assumed_class_state >= model.class_cardinality() {
        return Err(Error::Inference(format!(
            "assumed class state {} out of range for {} classes",
            assumed_class_state,
            model.class_cardinality()
        )));
    }

    let nodes = model.nodes();
    let mut stats: Vec<SufficientStatistics> =
        nodes.iter().map(SufficientStatistics::empty_for).collect();

    let events = trajectory.events();
    let mut assignment = events[0].values.clone();
    assignment[class_index] = assumed_class_state;

    for (index, (node, node_stats)) in nodes.iter().zip(stats.iter_mut()).enumerate() {
        if let SufficientStatistics::Static(occurrences) = node_stats {
            let cfg = node.parent_configuration_index(&assignment);
            occurrences.add_occurrence(cfg, assignment[index], 1.0);
        }
    }

    let mut configurations = vec![0usize; nodes.len()];
    for (step, pair) in events.windows(2).enumerate() {
        let delta = pair[1].time - pair[0].time;
        let next = &pair[1].values;

        for (index, node) in nodes.iter().enumerate() {
            configurations[index] = node.parent_configuration_index(&assignment);
        }

        for (index, node) in nodes.iter().enumerate() {
            if index == class_index {
                continue;
            }
            let from = assignment[index];
            let to = next[index];
            match (node.kind(), &mut stats[index]) {
                (NodeKind::Dynamic, SufficientStatistics::Dynamic(transitions)) => {
                    transitions.add_holding_time(configurations[index], from, delta);
                    if from != to {
                        transitions.add_transition(configurations[index], from, to);
                    }
                }
                _ => {
                    if from != to {
                        return Err(Error::StaticNodeChanged {
                            node: node.name().to_string(),
                            event: step + 1,
                        });
                    }
                }
            }
        }

        for (index, value) in assignment.iter_mut().enumerate() {
            if index != class_index {
                *value = next[index];
            }
        }
    }

    Ok(stats)
}

/// Extract statistics for every trajectory in parallel.
///
/// Each worker reads the model immutably and keeps its own assignment, so
/// no lookup state is shared between scans. Errors name the trajectory.
pub fn extract_all(
    model: &CtbnModel,
    trajectories: &[Trajectory],
    assumed_class_state: usize,
) -> Result<Vec<Vec<SufficientStatistics>>> {
    trajectories
        .par_iter()
        .enumerate()
        .map(|(index, trajectory)| {
            extract_trajectory_statistics(model, trajectory, assumed_class_state)
                .map_err(|e| e.in_trajectory(index))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Event, Node};

    /// C (class, 2 states) -> X (dynamic, 2) ; S (static, 2) -> X.
    fn model() -> CtbnModel {
        CtbnModel::new(
            vec![
                Node::with_cardinality("C", 2, NodeKind::Static),
                Node::with_cardinality("X", 2, NodeKind::Dynamic),
                Node::with_cardinality("S", 2, NodeKind::Static),
            ],
            0,
        )
        .unwrap()
        .with_structure(&[
            vec![false, true, false],
            vec![false, false, false],
            vec![false, true, false],
        ])
        .unwrap()
    }

    fn trajectory(events: &[(f64, [usize; 3])]) -> Trajectory {
        Trajectory::new(
            events
                .iter()
                .map(|(t, v)| Event::new(*t, v.to_vec()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn holding_times_and_transitions() {
        let model = model();
        // Class column says 1; extraction must ignore it.
        let t = trajectory(&[(0.0, [1, 0, 1]), (1.5, [1, 1, 1]), (2.0, [1, 0, 1])]);
        let stats = extract_trajectory_statistics(&model, &t, 0).unwrap();

        // X's configuration: C least significant, then S. C=0, S=1 -> 2.
        let x = stats[1].as_dynamic().unwrap();
        assert_eq!(x.tx(2, 0), 1.5);
        assert_eq!(x.tx(2, 1), 0.5);
        assert_eq!(x.mxx(2, 0, 1), 1.0);
        assert_eq!(x.mxx(2, 1, 0), 1.0);
        assert_eq!(x.tx(3, 0), 0.0);

        let c = stats[0].as_static().unwrap();
        assert_eq!(c.px(0, 0), 1.0);
        assert_eq!(c.count(0), 1.0);
        let s = stats[2].as_static().unwrap();
        assert_eq!(s.px(0, 1), 1.0);
    }

    #[test]
    fn assumed_class_state_selects_configuration() {
        let model = model();
        let t = trajectory(&[(0.0, [0, 0, 0]), (1.0, [0, 1, 0])]);
        let stats = extract_trajectory_statistics(&model, &t, 1).unwrap();
        let x = stats[1].as_dynamic().unwrap();
        assert_eq!(x.tx(1, 0), 1.0);
        assert_eq!(x.tx(0, 0), 0.0);
        assert!(extract_trajectory_statistics(&model, &t, 2).is_err());
    }

    #[test]
    fn static_change_is_fatal() {
        let model = model();
        let t = trajectory(&[(0.0, [0, 0, 0]), (1.0, [0, 1, 0]), (2.0, [0, 1, 1])]);
        match extract_trajectory_statistics(&model, &t, 0) {
            Err(Error::StaticNodeChanged { node, event }) => {
                assert_eq!(node, "S");
                assert_eq!(event, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn pre_event_assignment_is_used_for_parents() {
        // Y depends on X; both change at the same instant.
        let model = CtbnModel::new(
            vec![
                Node::with_cardinality("C", 2, NodeKind::Static),
                Node::with_cardinality("X", 2, NodeKind::Dynamic),
                Node::with_cardinality("Y", 2, NodeKind::Dynamic),
            ],
            0,
        )
        .unwrap()
        .with_structure(&[
            vec![false, false, false],
            vec![false, false, true],
            vec![false, false, false],
        ])
        .unwrap();
        let t = Trajectory::new(vec![
            Event::new(0.0, vec![0, 0, 0]),
            Event::new(1.0, vec![0, 1, 1]),
        ])
        .unwrap();
        let stats = extract_trajectory_statistics(&model, &t, 0).unwrap();
        let y = stats[2].as_dynamic().unwrap();
        assert_eq!(y.mxx(0, 0, 1), 1.0);
        assert_eq!(y.mxx(1, 0, 1), 0.0);
    }

    #[test]
    fn extract_all_reports_trajectory_index() {
        let model = model();
        let good = trajectory(&[(0.0, [0, 0, 0]), (1.0, [0, 1, 0])]);
        let bad = trajectory(&[(0.0, [0, 0, 0]), (1.0, [0, 0, 1])]);
        let err = extract_all(&model, &[good.clone(), bad], 0).unwrap_err();
        assert!(matches!(err, Error::InTrajectory { index: 1, .. }));
        assert_eq!(extract_all(&model, &[good], 0).unwrap().len(), 1);
    }
}
