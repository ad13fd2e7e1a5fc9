//! DrugSeqDataSet - the annotated matrix threaded through every pipeline stage

use ndarray::Array2;

use super::{CellMetadata, Condition, CountMatrix};
use crate::error::{PipelineError, Result};

/// Output of the variance-stabilizing normalization
#[derive(Debug, Clone)]
pub struct NormalizedAssay {
    /// Log-normalized corrected counts, ln(1 + x'), genes x cells (all genes)
    pub data: Array2<f64>,
    /// Covariate-regressed Pearson residuals for the variable features
    pub scale_data: Array2<f64>,
    /// Row indices (into the count matrix) of the variable features, in rank order
    pub variable_features: Vec<usize>,
    /// Residual variance for every gene
    pub residual_variance: Vec<f64>,
    /// Covariates regressed out of the residuals
    pub regressed: Vec<String>,
}

/// Count matrix plus per-cell annotations
/// Mutated in place by QC, filtering and normalization.
#[derive(Debug, Clone)]
pub struct DrugSeqDataSet {
    counts: CountMatrix,
    cell_metadata: CellMetadata,
    normalized: Option<NormalizedAssay>,
}

impl DrugSeqDataSet {
    /// Create a new dataset with unlabelled cells
    pub fn new(counts: CountMatrix) -> Self {
        let cell_metadata = CellMetadata::new(counts.cell_ids().to_vec());
        Self {
            counts,
            cell_metadata,
            normalized: None,
        }
    }

    /// Create a dataset from counts and prepared metadata
    pub fn with_metadata(counts: CountMatrix, cell_metadata: CellMetadata) -> Result<Self> {
        if counts.cell_ids() != cell_metadata.cell_ids() {
            return Err(PipelineError::InvalidMetadata {
                reason: "Cell IDs in counts and metadata do not match".to_string(),
            });
        }
        Ok(Self {
            counts,
            cell_metadata,
            normalized: None,
        })
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn cell_metadata(&self) -> &CellMetadata {
        &self.cell_metadata
    }

    pub fn cell_metadata_mut(&mut self) -> &mut CellMetadata {
        &mut self.cell_metadata
    }

    pub fn n_genes(&self) -> usize {
        self.counts.n_genes()
    }

    pub fn n_cells(&self) -> usize {
        self.counts.n_cells()
    }

    pub fn normalized(&self) -> Option<&NormalizedAssay> {
        self.normalized.as_ref()
    }

    pub fn has_normalized(&self) -> bool {
        self.normalized.is_some()
    }

    /// Attach a normalized assay, checking its shape against the counts
    pub fn set_normalized(&mut self, assay: NormalizedAssay) -> Result<()> {
        let expected = (self.n_genes(), self.n_cells());
        if assay.data.dim() != expected {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{:?} normalized data", expected),
                got: format!("{:?}", assay.data.dim()),
            });
        }
        if assay.scale_data.dim() != (assay.variable_features.len(), self.n_cells()) {
            return Err(PipelineError::DimensionMismatch {
                expected: format!(
                    "({}, {}) scaled data",
                    assay.variable_features.len(),
                    self.n_cells()
                ),
                got: format!("{:?}", assay.scale_data.dim()),
            });
        }
        self.normalized = Some(assay);
        Ok(())
    }

    /// Cells of the Drug and Control arms, in that order
    pub fn condition_groups(&self) -> (Vec<usize>, Vec<usize>) {
        (
            self.cell_metadata.cells_with_condition(Condition::Drug),
            self.cell_metadata.cells_with_condition(Condition::Control),
        )
    }

    /// Restrict the dataset to the given genes and cells
    ///
    /// Any normalized assay is dropped since it no longer matches the counts.
    pub fn subset(&mut self, gene_indices: &[usize], cell_indices: &[usize]) -> Result<()> {
        if gene_indices.is_empty() || cell_indices.is_empty() {
            return Err(PipelineError::EmptyData {
                reason: format!(
                    "subset would leave {} genes and {} cells",
                    gene_indices.len(),
                    cell_indices.len()
                ),
            });
        }
        self.counts = self.counts.subset(gene_indices, cell_indices)?;
        self.cell_metadata = self.cell_metadata.subset(cell_indices)?;
        if self.normalized.take().is_some() {
            log::debug!("Dropping normalized assay after subsetting");
        }
        Ok(())
    }
}
