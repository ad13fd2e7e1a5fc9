//! Per-cell quality-control metrics

use serde::Serialize;

use crate::data::DrugSeqDataSet;
use crate::error::{PipelineError, Result};
use crate::io::TableRow;

pub const N_COUNTS: &str = "n_counts";
pub const N_FEATURES: &str = "n_features";
pub const PERCENT_MT: &str = "percent_mt";
pub const LOG10_GENES_PER_UMI: &str = "log10_genes_per_umi";

/// Genes-per-UMI complexity score, NaN when it is undefined
pub fn log10_genes_per_umi(n_features: f64, n_counts: f64) -> f64 {
    if n_counts <= 1.0 || n_features <= 0.0 {
        return f64::NAN;
    }
    n_features.log10() / n_counts.log10()
}

/// Compute QC metrics and store them as numeric metadata columns
///
/// Mitochondrial genes are those whose symbol starts with `mito_prefix`,
/// compared case-insensitively.
pub fn compute_qc_metrics(dataset: &mut DrugSeqDataSet, mito_prefix: &str) -> Result<()> {
    let counts = dataset.counts();
    let prefix = mito_prefix.to_ascii_lowercase();
    let is_mito: Vec<bool> = counts
        .gene_symbols()
        .iter()
        .map(|s| !prefix.is_empty() && s.to_ascii_lowercase().starts_with(&prefix))
        .collect();
    let n_mito = is_mito.iter().filter(|&&m| m).count();
    if n_mito == 0 {
        log::warn!("No genes match mitochondrial prefix '{}'; percent_mt will be 0", mito_prefix);
    } else {
        log::debug!("{} mitochondrial genes (prefix '{}')", n_mito, mito_prefix);
    }

    let n_cells = counts.n_cells();
    let mut totals = vec![0.0; n_cells];
    let mut detected = vec![0.0; n_cells];
    let mut mito = vec![0.0; n_cells];
    for (i, row) in counts.counts().outer_iterator().enumerate() {
        for (j, &v) in row.iter() {
            if v > 0.0 {
                totals[j] += v;
                detected[j] += 1.0;
                if is_mito[i] {
                    mito[j] += v;
                }
            }
        }
    }

    let percent_mt: Vec<f64> = totals
        .iter()
        .zip(&mito)
        .map(|(&t, &m)| if t > 0.0 { 100.0 * m / t } else { 0.0 })
        .collect();
    let complexity: Vec<f64> = detected
        .iter()
        .zip(&totals)
        .map(|(&f, &t)| log10_genes_per_umi(f, t))
        .collect();

    let metadata = dataset.cell_metadata_mut();
    metadata.add_numeric(N_COUNTS, totals)?;
    metadata.add_numeric(N_FEATURES, detected)?;
    metadata.add_numeric(PERCENT_MT, percent_mt)?;
    metadata.add_numeric(LOG10_GENES_PER_UMI, complexity)?;
    Ok(())
}

/// Borrowed view of the four QC columns
pub struct QcColumns<'a> {
    pub n_counts: &'a [f64],
    pub n_features: &'a [f64],
    pub percent_mt: &'a [f64],
    pub log10_genes_per_umi: &'a [f64],
}

impl<'a> QcColumns<'a> {
    pub fn from_dataset(dataset: &'a DrugSeqDataSet) -> Result<Self> {
        let meta = dataset.cell_metadata();
        let missing = || PipelineError::InvalidMetadata {
            reason: "QC metrics have not been computed".to_string(),
        };
        Ok(Self {
            n_counts: meta.numeric(N_COUNTS).ok_or_else(missing)?,
            n_features: meta.numeric(N_FEATURES).ok_or_else(missing)?,
            percent_mt: meta.numeric(PERCENT_MT).ok_or_else(missing)?,
            log10_genes_per_umi: meta.numeric(LOG10_GENES_PER_UMI).ok_or_else(missing)?,
        })
    }
}

/// One row of the QC metrics table
#[derive(Debug, Clone, Serialize)]
pub struct QcMetricsRow {
    pub cell: String,
    pub condition: String,
    pub n_counts: f64,
    pub n_features: f64,
    pub percent_mt: f64,
    pub log10_genes_per_umi: f64,
    pub passed: bool,
}

impl TableRow for QcMetricsRow {
    const COLUMNS: &'static [&'static str] = &[
        "cell",
        "condition",
        "n_counts",
        "n_features",
        "percent_mt",
        "log10_genes_per_umi",
        "passed",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CountMatrix;
    use ndarray::array;

    #[test]
    fn test_compute_qc_metrics() {
        let dense = array![[90.0, 0.0], [10.0, 0.0], [0.0, 1.0]];
        let counts = CountMatrix::from_dense(
            &dense,
            vec!["E1".into(), "E2".into(), "E3".into()],
            vec!["GAPDH".into(), "mt-Co1".into(), "ACTB".into()],
            vec!["c1".into(), "c2".into()],
        )
        .unwrap();
        let mut ds = DrugSeqDataSet::new(counts);
        compute_qc_metrics(&mut ds, "MT-").unwrap();

        let qc = QcColumns::from_dataset(&ds).unwrap();
        assert_eq!(qc.n_counts, &[100.0, 1.0]);
        assert_eq!(qc.n_features, &[2.0, 1.0]);
        assert!((qc.percent_mt[0] - 10.0).abs() < 1e-12);
        assert_eq!(qc.percent_mt[1], 0.0);
        assert!((qc.log10_genes_per_umi[0] - 2f64.log10() / 2.0).abs() < 1e-12);
        assert!(qc.log10_genes_per_umi[1].is_nan());
    }

    #[test]
    fn test_missing_metrics_is_error() {
        let dense = array![[1.0]];
        let counts =
            CountMatrix::from_dense(&dense, vec!["E".into()], vec!["G".into()], vec!["c".into()])
                .unwrap();
        let ds = DrugSeqDataSet::new(counts);
        assert!(QcColumns::from_dataset(&ds).is_err());
    }
}
