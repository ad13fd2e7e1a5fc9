//! Ligand-target regulatory prior

use std::collections::HashMap;

use ndarray::Array2;

use crate::error::{PipelineError, Result};

/// Regulatory potential scores, target genes x ligands
#[derive(Debug, Clone)]
pub struct LigandTargetMatrix {
    targets: Vec<String>,
    ligands: Vec<String>,
    scores: Array2<f64>,
    target_index: HashMap<String, usize>,
}

impl LigandTargetMatrix {
    pub fn new(targets: Vec<String>, ligands: Vec<String>, scores: Array2<f64>) -> Result<Self> {
        if scores.dim() != (targets.len(), ligands.len()) {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("({}, {})", targets.len(), ligands.len()),
                got: format!("{:?}", scores.dim()),
            });
        }
        if scores.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidInput {
                reason: "ligand-target matrix contains non-finite scores".to_string(),
            });
        }
        let mut target_index = HashMap::with_capacity(targets.len());
        for (i, t) in targets.iter().enumerate() {
            if target_index.insert(t.clone(), i).is_some() {
                return Err(PipelineError::InvalidInput {
                    reason: format!("duplicate target gene '{}' in ligand-target matrix", t),
                });
            }
        }
        Ok(Self {
            targets,
            ligands,
            scores,
            target_index,
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn ligands(&self) -> &[String] {
        &self.ligands
    }

    pub fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    pub fn target_index(&self, gene: &str) -> Option<usize> {
        self.target_index.get(gene).copied()
    }

    pub fn ligand_index(&self, ligand: &str) -> Option<usize> {
        self.ligands.iter().position(|l| l == ligand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_shape_checked() {
        let err = LigandTargetMatrix::new(
            vec!["A".into(), "B".into()],
            vec!["L1".into()],
            array![[0.1, 0.2]],
        );
        assert!(matches!(err, Err(PipelineError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let err = LigandTargetMatrix::new(
            vec!["A".into(), "A".into()],
            vec!["L1".into()],
            array![[0.1], [0.2]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_lookup() {
        let m = LigandTargetMatrix::new(
            vec!["A".into(), "B".into()],
            vec!["L1".into(), "L2".into()],
            array![[0.1, 0.2], [0.3, 0.4]],
        )
        .unwrap();
        assert_eq!(m.target_index("B"), Some(1));
        assert_eq!(m.ligand_index("L2"), Some(1));
        assert_eq!(m.scores()[[1, 1]], 0.4);
    }
}
