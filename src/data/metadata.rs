//! Per-cell metadata: condition labels, QC metrics and joined annotations

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Experimental arm of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Drug,
    Control,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Drug => write!(f, "Drug"),
            Condition::Control => write!(f, "Control"),
        }
    }
}

/// Cell metadata
/// Numeric columns hold QC metrics and covariates; categorical columns hold
/// annotations joined from an external table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellMetadata {
    cell_ids: Vec<String>,
    conditions: Vec<Option<Condition>>,
    numeric: HashMap<String, Vec<f64>>,
    categorical: HashMap<String, Vec<String>>,
}

impl CellMetadata {
    /// Create new metadata with every cell unlabelled
    pub fn new(cell_ids: Vec<String>) -> Self {
        {
            let mut seen = std::collections::HashSet::new();
            for id in &cell_ids {
                if !seen.insert(id) {
                    log::warn!("Duplicate cell ID detected: '{}'. Cell IDs should be unique.", id);
                }
            }
        }
        let n = cell_ids.len();
        Self {
            cell_ids,
            conditions: vec![None; n],
            numeric: HashMap::new(),
            categorical: HashMap::new(),
        }
    }

    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    pub fn n_cells(&self) -> usize {
        self.cell_ids.len()
    }

    /// Replace all condition labels
    pub fn set_conditions(&mut self, conditions: Vec<Option<Condition>>) -> Result<()> {
        if conditions.len() != self.cell_ids.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} condition labels", self.cell_ids.len()),
                got: format!("{} condition labels", conditions.len()),
            });
        }
        self.conditions = conditions;
        Ok(())
    }

    pub fn conditions(&self) -> &[Option<Condition>] {
        &self.conditions
    }

    pub fn condition(&self, cell_idx: usize) -> Option<Condition> {
        self.conditions.get(cell_idx).copied().flatten()
    }

    /// Indices of cells carrying the given label
    pub fn cells_with_condition(&self, condition: Condition) -> Vec<usize> {
        self.conditions
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Some(condition))
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of cells without a resolved condition
    pub fn n_unlabelled(&self) -> usize {
        self.conditions.iter().filter(|c| c.is_none()).count()
    }

    /// Add (or replace) a numeric column
    pub fn add_numeric(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.cell_ids.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} values", self.cell_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        self.numeric.insert(name.to_string(), values);
        Ok(())
    }

    /// Add (or replace) a categorical column
    pub fn add_categorical(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.cell_ids.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} values", self.cell_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        self.categorical.insert(name.to_string(), values);
        Ok(())
    }

    pub fn numeric(&self, name: &str) -> Option<&Vec<f64>> {
        self.numeric.get(name)
    }

    pub fn categorical(&self, name: &str) -> Option<&Vec<String>> {
        self.categorical.get(name)
    }

    pub fn has_numeric(&self, name: &str) -> bool {
        self.numeric.contains_key(name)
    }

    /// Numeric column names, sorted for stable output
    pub fn numeric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.numeric.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Categorical column names, sorted for stable output
    pub fn categorical_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.categorical.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get a numeric column or fail with a descriptive error
    pub fn require_numeric(&self, name: &str) -> Result<&Vec<f64>> {
        self.numeric.get(name).ok_or_else(|| PipelineError::InvalidMetadata {
            reason: format!("numeric column '{}' not found in cell metadata", name),
        })
    }

    /// Subset metadata to specific cells
    pub fn subset(&self, cell_indices: &[usize]) -> Result<Self> {
        let new_ids: Vec<String> = cell_indices
            .iter()
            .map(|&i| self.cell_ids[i].clone())
            .collect();

        let mut new_meta = CellMetadata::new(new_ids);
        new_meta.set_conditions(cell_indices.iter().map(|&i| self.conditions[i]).collect())?;

        for (name, values) in &self.numeric {
            new_meta.add_numeric(name, cell_indices.iter().map(|&i| values[i]).collect())?;
        }
        for (name, values) in &self.categorical {
            new_meta.add_categorical(
                name,
                cell_indices.iter().map(|&i| values[i].clone()).collect(),
            )?;
        }

        Ok(new_meta)
    }
}
