//! The continuous-time Bayesian network classifier model.

use super::node::{Node, NodeKind};
use super::parameters::NodeParameters;
use super::trajectory::Trajectory;
use ctbn_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ordered nodes, one of which is the class, plus the current parameters.
///
/// Structure is fixed while learning runs; parameters are replaced
/// wholesale by [`CtbnModel::set_parameters`]. Deserialized models pass
/// through the same checks as [`CtbnModel::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawCtbnModel")]
pub struct CtbnModel {
    nodes: Vec<Node>,
    class_index: usize,
    #[serde(default)]
    parameters: Option<Vec<NodeParameters>>,
}

#[derive(Deserialize)]
struct RawCtbnModel {
    nodes: Vec<Node>,
    class_index: usize,
    #[serde(default)]
    parameters: Option<Vec<NodeParameters>>,
}

impl TryFrom<RawCtbnModel> for CtbnModel {
    type Error = Error;

    fn try_from(raw: RawCtbnModel) -> Result<Self> {
        let mut model = CtbnModel::new(raw.nodes, raw.class_index)?;
        if let Some(parameters) = raw.parameters {
            model.set_parameters(parameters)?;
        }
        Ok(model)
    }
}

impl CtbnModel {
    /// Create a model without edges or parameters.
    ///
    /// The class node must exist, be static, and every node needs at least
    /// one state.
    pub fn new(nodes: Vec<Node>, class_index: usize) -> Result<Self> {
        if class_index >= nodes.len() {
            return Err(Error::ClassIndexOutOfRange {
                index: class_index,
                node_count: nodes.len(),
            });
        }
        if let Some(empty) = nodes.iter().find(|n| n.cardinality() == 0) {
            return Err(Error::InvalidStructure(format!(
                "node '{}' has no states",
                empty.name()
            )));
        }
        if nodes[class_index].kind() != NodeKind::Static {
            return Err(Error::InvalidStructure(format!(
                "class node '{}' must be static",
                nodes[class_index].name()
            )));
        }
        let mut model = Self {
            nodes,
            class_index,
            parameters: None,
        };
        // Nodes may arrive with parents already set; re-derive cardinalities.
        let parents: Vec<Vec<usize>> = model.nodes.iter().map(|n| n.parents().to_vec()).collect();
        for (index, parents) in parents.into_iter().enumerate() {
            model.set_parents(index, &parents)?;
        }
        Ok(model)
    }

    /// Builder form of [`CtbnModel::set_structure`].
    pub fn with_structure(mut self, adjacency: &[Vec<bool>]) -> Result<Self> {
        self.set_structure(adjacency)?;
        Ok(self)
    }

    /// Replace every parent set from an adjacency matrix.
    ///
    /// `adjacency[i][j]` is an edge `i -> j` (i is a parent of j). The whole
    /// matrix is validated before anything changes; installed parameters
    /// are dropped because their shapes depend on the structure.
    pub fn set_structure(&mut self, adjacency: &[Vec<bool>]) -> Result<()> {
        let n = self.nodes.len();
        if adjacency.len() != n || adjacency.iter().any(|row| row.len() != n) {
            return Err(Error::InvalidStructure(format!(
                "adjacency matrix must be {}x{}",
                n, n
            )));
        }
        for (i, row) in adjacency.iter().enumerate() {
            if row[i] {
                return Err(Error::InvalidStructure(format!(
                    "node '{}' cannot be its own parent",
                    self.nodes[i].name()
                )));
            }
        }
        let class_parents = adjacency.iter().filter(|row| row[self.class_index]).count();
        if class_parents > 0 {
            return Err(Error::ClassNodeHasParents {
                node: self.class_node().name().to_string(),
                parents: class_parents,
            });
        }

        for child in 0..n {
            let parents: Vec<usize> = (0..n).filter(|&p| adjacency[p][child]).collect();
            self.set_parents(child, &parents)?;
        }
        self.parameters = None;
        Ok(())
    }

    /// Replace the parent set of one node.
    pub fn set_parents(&mut self, node: usize, parents: &[usize]) -> Result<()> {
        let n = self.nodes.len();
        if node >= n {
            return Err(Error::InvalidStructure(format!("node index {} out of range", node)));
        }
        if node == self.class_index && !parents.is_empty() {
            return Err(Error::ClassNodeHasParents {
                node: self.nodes[node].name().to_string(),
                parents: parents.len(),
            });
        }
        for (i, &p) in parents.iter().enumerate() {
            if p >= n || p == node || parents[..i].contains(&p) {
                return Err(Error::InvalidStructure(format!(
                    "invalid parent {} for node '{}'",
                    p,
                    self.nodes[node].name()
                )));
            }
        }
        let cardinalities = parents.iter().map(|&p| self.nodes[p].cardinality()).collect();
        self.nodes[node].set_parents(parents.to_vec(), cardinalities);
        self.parameters = None;
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn class_index(&self) -> usize {
        self.class_index
    }

    pub fn class_node(&self) -> &Node {
        &self.nodes[self.class_index]
    }

    /// Number of class states (clusters).
    pub fn class_cardinality(&self) -> usize {
        self.class_node().cardinality()
    }

    /// Check the indices every lookup relies on: the class index, each
    /// parent index and the recorded parent cardinalities.
    pub fn check_structure(&self) -> Result<()> {
        let n = self.nodes.len();
        if self.class_index >= n {
            return Err(Error::ClassIndexOutOfRange {
                index: self.class_index,
                node_count: n,
            });
        }
        for node in &self.nodes {
            let parents = node.parents();
            let cardinalities = node.parent_cardinalities();
            if parents.len() != cardinalities.len() {
                return Err(Error::InvalidStructure(format!(
                    "node '{}' lists {} parents but {} parent cardinalities",
                    node.name(),
                    parents.len(),
                    cardinalities.len()
                )));
            }
            for (&p, &cardinality) in parents.iter().zip(cardinalities) {
                if p >= n || self.nodes[p].cardinality() != cardinality {
                    return Err(Error::InvalidStructure(format!(
                        "invalid parent {} for node '{}'",
                        p,
                        node.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fail unless the class node is parentless.
    pub fn validate_class_node(&self) -> Result<()> {
        let class = self.class_node();
        if !class.parents().is_empty() || class.parent_configuration_count() != 1 {
            return Err(Error::ClassNodeHasParents {
                node: class.name().to_string(),
                parents: class.parents().len(),
            });
        }
        Ok(())
    }

    /// Current adjacency matrix (`[parent][child]`).
    pub fn adjacency_matrix(&self) -> Vec<Vec<bool>> {
        let n = self.nodes.len();
        let mut adjacency = vec![vec![false; n]; n];
        for (child, node) in self.nodes.iter().enumerate() {
            for &parent in node.parents() {
                adjacency[parent][child] = true;
            }
        }
        adjacency
    }

    pub fn parameters(&self) -> Option<&[NodeParameters]> {
        self.parameters.as_deref()
    }

    /// Install a full set of parameters.
    ///
    /// Every table is checked against the node's kind, state count and
    /// configuration count and validated numerically first; on error the
    /// previously installed parameters stay untouched.
    pub fn set_parameters(&mut self, parameters: Vec<NodeParameters>) -> Result<()> {
        if parameters.len() != self.nodes.len() {
            return Err(Error::InvalidStructure(format!(
                "expected parameters for {} nodes, got {}",
                self.nodes.len(),
                parameters.len()
            )));
        }
        for (node, params) in self.nodes.iter().zip(parameters.iter()) {
            check_shape(node, params)?;
            params.validate(node.name())?;
        }
        self.parameters = Some(parameters);
        Ok(())
    }

    /// Check that a trajectory assigns a valid state to every node.
    pub fn validate_trajectory(&self, trajectory: &Trajectory) -> Result<()> {
        trajectory.check()?;
        if trajectory.width() != self.nodes.len() {
            return Err(Error::MalformedTrajectory(format!(
                "events assign {} nodes, model has {}",
                trajectory.width(),
                self.nodes.len()
            )));
        }
        for (i, event) in trajectory.events().iter().enumerate() {
            for (node, &value) in self.nodes.iter().zip(event.values.iter()) {
                if value >= node.cardinality() {
                    return Err(Error::MalformedTrajectory(format!(
                        "event {} assigns state {} to node '{}' with {} states",
                        i,
                        value,
                        node.name(),
                        node.cardinality()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_shape(node: &Node, params: &NodeParameters) -> Result<()> {
    let configs = node.parent_configuration_count();
    let states = node.cardinality();
    let ok = match (node.kind(), params) {
        (NodeKind::Static, NodeParameters::Probabilities(tables)) => {
            tables.len() == configs && tables.iter().all(|t| t.len() == states)
        }
        (NodeKind::Dynamic, NodeParameters::Intensities(matrices)) => {
            matrices.len() == configs && matrices.iter().all(|m| m.size() == states)
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidStructure(format!(
            "parameters of {} node '{}' must cover {} configurations of {} states",
            node.kind(),
            node.name(),
            configs,
            states
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Event, IntensityMatrix};

    fn three_nodes() -> CtbnModel {
        CtbnModel::new(
            vec![
                Node::with_cardinality("C", 2, NodeKind::Static),
                Node::with_cardinality("X", 2, NodeKind::Dynamic),
                Node::with_cardinality("Y", 3, NodeKind::Dynamic),
            ],
            0,
        )
        .unwrap()
    }

    #[test]
    fn structure_from_adjacency() {
        let mut model = three_nodes();
        model
            .set_structure(&[
                vec![false, true, true],
                vec![false, false, true],
                vec![false, false, false],
            ])
            .unwrap();
        assert_eq!(model.node(1).parents(), &[0]);
        assert_eq!(model.node(2).parents(), &[0, 1]);
        assert_eq!(model.node(2).parent_configuration_count(), 4);
        assert!(model.adjacency_matrix()[1][2]);
        model.validate_class_node().unwrap();
    }

    #[test]
    fn class_with_parents_is_rejected_without_mutation() {
        let mut model = three_nodes();
        model.set_parents(1, &[0]).unwrap();
        let err = model
            .set_structure(&[
                vec![false, false, false],
                vec![true, false, false],
                vec![false, false, false],
            ])
            .unwrap_err();
        assert!(matches!(err, Error::ClassNodeHasParents { .. }));
        assert_eq!(model.node(1).parents(), &[0]);
    }

    #[test]
    fn class_index_must_exist_and_be_static() {
        let nodes = vec![Node::with_cardinality("X", 2, NodeKind::Dynamic)];
        assert!(matches!(
            CtbnModel::new(nodes.clone(), 3),
            Err(Error::ClassIndexOutOfRange { .. })
        ));
        assert!(CtbnModel::new(nodes, 0).is_err());
    }

    #[test]
    fn deserialization_reruns_construction_checks() {
        let mut model = three_nodes();
        model.set_parents(2, &[1, 0]).unwrap();
        let json = serde_json::to_value(&model).unwrap();

        let back: CtbnModel = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back.adjacency_matrix(), model.adjacency_matrix());
        assert_eq!(back.node(2).parent_configuration_count(), 4);
        back.check_structure().unwrap();

        let mut bad_class = json.clone();
        bad_class["class_index"] = serde_json::json!(7);
        let err = serde_json::from_value::<CtbnModel>(bad_class).unwrap_err();
        assert!(err.to_string().contains("class index 7"), "{}", err);

        let mut bad_parent = json.clone();
        bad_parent["nodes"][2]["parents"] = serde_json::json!([9]);
        bad_parent["nodes"][2]["parent_cardinalities"] = serde_json::json!([2]);
        assert!(serde_json::from_value::<CtbnModel>(bad_parent).is_err());

        // Stale cardinalities are re-derived from the parents' state counts.
        let mut stale = json;
        stale["nodes"][2]["parent_cardinalities"] = serde_json::json!([5, 5]);
        let fixed: CtbnModel = serde_json::from_value(stale).unwrap();
        assert_eq!(fixed.node(2).parent_configuration_count(), 4);
    }

    #[test]
    fn deserialized_parameters_are_shape_checked() {
        let mut model = three_nodes();
        model
            .set_parameters(vec![
                NodeParameters::Probabilities(vec![vec![0.5, 0.5]]),
                NodeParameters::Intensities(vec![IntensityMatrix::zeros(2)]),
                NodeParameters::Intensities(vec![IntensityMatrix::zeros(3)]),
            ])
            .unwrap();
        let mut json = serde_json::to_value(&model).unwrap();
        let back: CtbnModel = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back.parameters(), model.parameters());

        json["parameters"].as_array_mut().unwrap().pop();
        assert!(serde_json::from_value::<CtbnModel>(json).is_err());
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut model = three_nodes();
        let mut adjacency = vec![vec![false; 3]; 3];
        adjacency[1][1] = true;
        assert!(model.set_structure(&adjacency).is_err());
    }

    #[test]
    fn parameters_are_shape_checked() {
        let mut model = three_nodes();
        let bad = vec![
            NodeParameters::Probabilities(vec![vec![0.5, 0.5]]),
            NodeParameters::Probabilities(vec![vec![0.5, 0.5]]),
            NodeParameters::Intensities(vec![IntensityMatrix::zeros(3)]),
        ];
        assert!(model.set_parameters(bad).is_err());
        assert!(model.parameters().is_none());

        let good = vec![
            NodeParameters::Probabilities(vec![vec![0.5, 0.5]]),
            NodeParameters::Intensities(vec![IntensityMatrix::zeros(2)]),
            NodeParameters::Intensities(vec![IntensityMatrix::zeros(3)]),
        ];
        model.set_parameters(good).unwrap();
        assert!(model.parameters().is_some());
    }

    #[test]
    fn trajectory_values_are_range_checked() {
        let model = three_nodes();
        let ok = Trajectory::new(vec![Event::new(0.0, vec![0, 1, 2])]).unwrap();
        model.validate_trajectory(&ok).unwrap();
        let bad = Trajectory::new(vec![Event::new(0.0, vec![0, 1, 3])]).unwrap();
        assert!(model.validate_trajectory(&bad).is_err());
        let narrow = Trajectory::new(vec![Event::new(0.0, vec![0, 1])]).unwrap();
        assert!(model.validate_trajectory(&narrow).is_err());
    }
}
