//! Quality control: per-cell metrics and threshold filtering

mod filter;
mod metrics;

pub use filter::{cell_pass_mask, filter_cells, filter_dataset, filter_genes, QcReport, QcThresholds};
pub use metrics::{
    compute_qc_metrics, log10_genes_per_umi, QcColumns, QcMetricsRow, LOG10_GENES_PER_UMI,
    N_COUNTS, N_FEATURES, PERCENT_MT,
};

use crate::data::DrugSeqDataSet;
use crate::error::Result;

/// Tabulate QC metrics for every cell, flagging which would pass `thresholds`
pub fn qc_table(dataset: &DrugSeqDataSet, thresholds: &QcThresholds) -> Result<Vec<QcMetricsRow>> {
    let qc = QcColumns::from_dataset(dataset)?;
    let mut scratch = QcReport::default();
    let mask = cell_pass_mask(&qc, thresholds, &mut scratch);
    let meta = dataset.cell_metadata();

    Ok((0..dataset.n_cells())
        .map(|j| QcMetricsRow {
            cell: meta.cell_ids()[j].clone(),
            condition: meta
                .condition(j)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "NA".to_string()),
            n_counts: qc.n_counts[j],
            n_features: qc.n_features[j],
            percent_mt: qc.percent_mt[j],
            log10_genes_per_umi: qc.log10_genes_per_umi[j],
            passed: mask[j],
        })
        .collect())
}
