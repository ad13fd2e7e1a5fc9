//! Threshold-based cell and gene filtering

use serde::{Deserialize, Serialize};

use super::metrics::QcColumns;
use crate::data::DrugSeqDataSet;
use crate::error::{PipelineError, Result};

/// Fixed QC thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QcThresholds {
    pub min_counts: f64,
    pub min_features: f64,
    pub max_features: Option<f64>,
    /// Maximum mitochondrial percentage (0-100)
    pub max_percent_mt: f64,
    pub min_log10_genes_per_umi: f64,
    /// Genes must be detected in at least this many retained cells
    pub min_cells_per_gene: usize,
}

impl Default for QcThresholds {
    fn default() -> Self {
        Self {
            min_counts: 500.0,
            min_features: 250.0,
            max_features: None,
            max_percent_mt: 20.0,
            min_log10_genes_per_umi: 0.80,
            min_cells_per_gene: 10,
        }
    }
}

/// Outcome of QC filtering
#[derive(Debug, Clone, Default, Serialize)]
pub struct QcReport {
    pub cells_before: usize,
    pub cells_after: usize,
    pub genes_before: usize,
    pub genes_after: usize,
    pub failed_min_counts: usize,
    pub failed_min_features: usize,
    pub failed_max_features: usize,
    pub failed_percent_mt: usize,
    pub failed_complexity: usize,
}

impl std::fmt::Display for QcReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "QC: {} -> {} cells, {} -> {} genes",
            self.cells_before, self.cells_after, self.genes_before, self.genes_after)?;
        write!(
            f,
            "  failed: min_counts {}, min_features {}, max_features {}, percent_mt {}, complexity {}",
            self.failed_min_counts,
            self.failed_min_features,
            self.failed_max_features,
            self.failed_percent_mt,
            self.failed_complexity
        )
    }
}

/// Per-cell pass/fail mask; NaN metrics fail
pub fn cell_pass_mask(qc: &QcColumns<'_>, thresholds: &QcThresholds, report: &mut QcReport) -> Vec<bool> {
    (0..qc.n_counts.len())
        .map(|j| {
            let mut pass = true;
            if !(qc.n_counts[j] >= thresholds.min_counts) {
                report.failed_min_counts += 1;
                pass = false;
            }
            if !(qc.n_features[j] >= thresholds.min_features) {
                report.failed_min_features += 1;
                pass = false;
            }
            if let Some(max) = thresholds.max_features {
                if !(qc.n_features[j] <= max) {
                    report.failed_max_features += 1;
                    pass = false;
                }
            }
            if !(qc.percent_mt[j] < thresholds.max_percent_mt) {
                report.failed_percent_mt += 1;
                pass = false;
            }
            if !(qc.log10_genes_per_umi[j] > thresholds.min_log10_genes_per_umi) {
                report.failed_complexity += 1;
                pass = false;
            }
            pass
        })
        .collect()
}

/// Keep cells passing every threshold, tallying failures into `report`
pub fn filter_cells(
    dataset: &mut DrugSeqDataSet,
    thresholds: &QcThresholds,
    report: &mut QcReport,
) -> Result<()> {
    let mask = {
        let qc = QcColumns::from_dataset(dataset)?;
        cell_pass_mask(&qc, thresholds, report)
    };
    let keep_cells: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, &pass)| pass)
        .map(|(j, _)| j)
        .collect();

    if keep_cells.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("No cells passed QC ({})", report),
        });
    }
    if keep_cells.len() < dataset.n_cells() {
        let all_genes: Vec<usize> = (0..dataset.n_genes()).collect();
        dataset.subset(&all_genes, &keep_cells)?;
    }
    Ok(())
}

/// Keep genes detected in at least `min_cells` cells
pub fn filter_genes(dataset: &mut DrugSeqDataSet, min_cells: usize) -> Result<()> {
    let keep_genes: Vec<usize> = dataset
        .counts()
        .gene_detected()
        .iter()
        .enumerate()
        .filter(|(_, &n)| n >= min_cells)
        .map(|(i, _)| i)
        .collect();

    if keep_genes.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("No genes detected in at least {} cells", min_cells),
        });
    }
    if keep_genes.len() < dataset.n_genes() {
        let all_cells: Vec<usize> = (0..dataset.n_cells()).collect();
        dataset.subset(&keep_genes, &all_cells)?;
    }
    Ok(())
}

/// Filter cells, then genes, in place
///
/// Cells must pass every threshold; genes must then be detected in at
/// least `min_cells_per_gene` of the retained cells.
pub fn filter_dataset(dataset: &mut DrugSeqDataSet, thresholds: &QcThresholds) -> Result<QcReport> {
    let mut report = QcReport {
        cells_before: dataset.n_cells(),
        genes_before: dataset.n_genes(),
        ..Default::default()
    };

    filter_cells(dataset, thresholds, &mut report)?;
    filter_genes(dataset, thresholds.min_cells_per_gene)?;

    report.cells_after = dataset.n_cells();
    report.genes_after = dataset.n_genes();
    Ok(report)
}
