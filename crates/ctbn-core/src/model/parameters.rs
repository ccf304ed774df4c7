//! Per-node parameter tables.
//!
//! Static nodes carry one probability vector per parent configuration;
//! dynamic nodes carry one conditional intensity matrix (CIM) per parent
//! configuration.

use ctbn_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Absolute tolerance for row sums and probability totals.
pub const TABLE_TOLERANCE: f64 = 1e-9;

/// Square matrix of transition intensities, stored row-major.
///
/// Off-diagonal entries are non-negative rates; each diagonal entry is the
/// negated exit rate of its state, so rows sum to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIntensityMatrix")]
pub struct IntensityMatrix {
    size: usize,
    rates: Vec<f64>,
}

#[derive(Deserialize)]
struct RawIntensityMatrix {
    size: usize,
    rates: Vec<f64>,
}

impl TryFrom<RawIntensityMatrix> for IntensityMatrix {
    type Error = Error;

    fn try_from(raw: RawIntensityMatrix) -> Result<Self> {
        if raw.size.checked_mul(raw.size) != Some(raw.rates.len()) {
            return Err(Error::InvalidStructure(format!(
                "intensity matrix of size {} needs {} rates, got {}",
                raw.size,
                raw.size.saturating_mul(raw.size),
                raw.rates.len()
            )));
        }
        Ok(Self {
            size: raw.size,
            rates: raw.rates,
        })
    }
}

impl IntensityMatrix {
    /// All-zero matrix.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            rates: vec![0.0; size * size],
        }
    }

    /// Build from rows; fails unless the rows form a square matrix.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return Err(Error::InvalidStructure(format!(
                "intensity matrix rows must all have length {}",
                size
            )));
        }
        Ok(Self {
            size,
            rates: rows.concat(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn rate(&self, from: usize, to: usize) -> f64 {
        self.rates[from * self.size + to]
    }

    pub fn set_rate(&mut self, from: usize, to: usize, rate: f64) {
        self.rates[from * self.size + to] = rate;
    }

    /// Total rate of leaving `from` (the negated diagonal).
    pub fn exit_rate(&self, from: usize) -> f64 {
        -self.rate(from, from)
    }

    pub fn row(&self, from: usize) -> &[f64] {
        &self.rates[from * self.size..(from + 1) * self.size]
    }

    /// Check finiteness, sign and zero row sums; returns the first violation.
    pub fn check(&self) -> std::result::Result<(), String> {
        for from in 0..self.size {
            let row = self.row(from);
            let mut off_diagonal = 0.0;
            for (to, &rate) in row.iter().enumerate() {
                if !rate.is_finite() {
                    return Err(format!("rate {}->{} is not finite ({})", from, to, rate));
                }
                if to != from {
                    if rate < 0.0 {
                        return Err(format!("rate {}->{} is negative ({})", from, to, rate));
                    }
                    off_diagonal += rate;
                }
            }
            let diagonal = row[from];
            if diagonal > 0.0 {
                return Err(format!("diagonal entry of state {} is positive ({})", from, diagonal));
            }
            let scale = off_diagonal.max(1.0);
            if (off_diagonal + diagonal).abs() > TABLE_TOLERANCE * scale {
                return Err(format!(
                    "row {} sums to {} instead of 0",
                    from,
                    off_diagonal + diagonal
                ));
            }
        }
        Ok(())
    }
}

/// Parameters of one node, indexed by parent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeParameters {
    /// `[configuration][state]` probabilities of a static node.
    Probabilities(Vec<Vec<f64>>),
    /// One CIM per configuration of a dynamic node.
    Intensities(Vec<IntensityMatrix>),
}

impl NodeParameters {
    pub fn configuration_count(&self) -> usize {
        match self {
            NodeParameters::Probabilities(tables) => tables.len(),
            NodeParameters::Intensities(matrices) => matrices.len(),
        }
    }

    /// Validate every table, naming the node and configuration at fault.
    pub fn validate(&self, node: &str) -> Result<()> {
        match self {
            NodeParameters::Probabilities(tables) => {
                for (cfg, table) in tables.iter().enumerate() {
                    check_probabilities(table).map_err(|reason| Error::DegenerateParameters {
                        node: node.to_string(),
                        parent_configuration: cfg,
                        reason,
                    })?;
                }
            }
            NodeParameters::Intensities(matrices) => {
                for (cfg, matrix) in matrices.iter().enumerate() {
                    matrix.check().map_err(|reason| Error::DegenerateParameters {
                        node: node.to_string(),
                        parent_configuration: cfg,
                        reason,
                    })?;
                }
            }
        }
        Ok(())
    }
}

fn check_probabilities(table: &[f64]) -> std::result::Result<(), String> {
    if table.is_empty() {
        return Err("empty probability table".to_string());
    }
    for (state, &p) in table.iter().enumerate() {
        if !p.is_finite() || !(0.0..=1.0 + TABLE_TOLERANCE).contains(&p) {
            return Err(format!("probability of state {} is {}", state, p));
        }
    }
    let total: f64 = table.iter().sum();
    if (total - 1.0).abs() > TABLE_TOLERANCE {
        return Err(format!("probabilities sum to {}", total));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_cim_passes() {
        let m = IntensityMatrix::from_rows(&[vec![-2.0, 2.0], vec![0.5, -0.5]]).unwrap();
        assert!(m.check().is_ok());
        assert_eq!(m.exit_rate(0), 2.0);
        assert_eq!(m.row(1), &[0.5, -0.5]);
    }

    #[test]
    fn non_finite_diagonal_is_rejected() {
        let mut m = IntensityMatrix::zeros(2);
        m.set_rate(0, 0, f64::NEG_INFINITY);
        assert!(m.check().unwrap_err().contains("not finite"));
    }

    #[test]
    fn unbalanced_row_is_rejected() {
        let m = IntensityMatrix::from_rows(&[vec![-1.0, 2.0], vec![0.0, 0.0]]).unwrap();
        assert!(m.check().unwrap_err().contains("row 0"));
    }

    #[test]
    fn deserialized_rates_must_fill_the_matrix() {
        let m: IntensityMatrix =
            serde_json::from_str(r#"{"size":2,"rates":[-1.0,1.0,0.5,-0.5]}"#).unwrap();
        assert_eq!(m.exit_rate(1), 0.5);
        let err = serde_json::from_str::<IntensityMatrix>(r#"{"size":3,"rates":[0.0]}"#).unwrap_err();
        assert!(err.to_string().contains("needs 9 rates"), "{}", err);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(IntensityMatrix::from_rows(&[vec![0.0, 0.0], vec![0.0]]).is_err());
    }

    #[test]
    fn validation_names_configuration() {
        let params = NodeParameters::Probabilities(vec![vec![0.5, 0.5], vec![f64::NAN, 1.0]]);
        match params.validate("S") {
            Err(Error::DegenerateParameters {
                node,
                parent_configuration,
                ..
            }) => {
                assert_eq!(node, "S");
                assert_eq!(parent_configuration, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn probabilities_must_sum_to_one() {
        let params = NodeParameters::Probabilities(vec![vec![0.3, 0.3]]);
        assert!(params.validate("S").is_err());
        let ok = NodeParameters::Probabilities(vec![vec![0.3, 0.7]]);
        assert!(ok.validate("S").is_ok());
        assert_eq!(ok.configuration_count(), 1);
    }
}
