//! A small ground-truth model for demos, tests and benchmarks.

use crate::model::{CtbnModel, IntensityMatrix, Node, NodeKind, NodeParameters};
use ctbn_common::Result;

/// Class `C` (static, 2 states) with dynamic children `X` and `Y`;
/// `Y` also depends on `X`. Class 1 switches markedly faster than class 0.
///
/// Node order is `[C, X, Y]` with the class at index 0.
pub fn two_class_benchmark() -> Result<CtbnModel> {
    let mut model = CtbnModel::new(
        vec![
            Node::new("C", vec!["slow".into(), "fast".into()], NodeKind::Static),
            Node::new("X", vec!["off".into(), "on".into()], NodeKind::Dynamic),
            Node::new("Y", vec!["low".into(), "high".into()], NodeKind::Dynamic),
        ],
        0,
    )?
    .with_structure(&[
        vec![false, true, true],
        vec![false, false, true],
        vec![false, false, false],
    ])?;

    let cim = |a: f64, b: f64| IntensityMatrix::from_rows(&[vec![-a, a], vec![b, -b]]);
    model.set_parameters(vec![
        NodeParameters::Probabilities(vec![vec![0.4, 0.6]]),
        // X | C
        NodeParameters::Intensities(vec![cim(0.5, 1.0)?, cim(3.0, 0.5)?]),
        // Y | C, X (C least significant)
        NodeParameters::Intensities(vec![
            cim(0.2, 2.0)?,
            cim(2.0, 0.3)?,
            cim(1.0, 0.5)?,
            cim(4.0, 1.0)?,
        ]),
    ])?;
    Ok(model)
}
