//! Statistical testing for differential expression, Drug vs Control

mod count_model;
mod fdr;
mod pvalue;
mod wilcoxon;

pub use count_model::{count_model_genes, moments_dispersion, nb_wald};
pub use fdr::{benjamini_hochberg, bonferroni, p_adjust, PAdjustMethod};
pub use pvalue::calculate_pvalue;
pub use wilcoxon::{log_mean_fold_change, rank_sum_test, wilcoxon_genes, RankSumTest};

use crate::config::DeConfig;
use crate::data::DrugSeqDataSet;
use crate::error::{PipelineError, Result};
use crate::io::{DeMethod, DeResults};
use crate::normalization::estimate_size_factors;

/// Per-gene test outcome before multiple-testing adjustment
#[derive(Debug, Clone, Copy)]
pub struct GeneTest {
    pub base_mean: f64,
    pub log2_fold_change: f64,
    pub stat: f64,
    pub pvalue: f64,
    pub pct_drug: f64,
    pub pct_control: f64,
}

/// Minimum number of cells required in each group
pub const MIN_CELLS_PER_GROUP: usize = 2;

/// Test every gene for differential expression between Drug and Control
///
/// Unlabelled cells take no part. The Wilcoxon method needs the normalized
/// assay; the count model works on raw counts.
pub fn differential_expression(dataset: &DrugSeqDataSet, config: &DeConfig) -> Result<DeResults> {
    let (drug, control) = dataset.condition_groups();
    if drug.len() < MIN_CELLS_PER_GROUP || control.len() < MIN_CELLS_PER_GROUP {
        return Err(PipelineError::InvalidDesign {
            reason: format!(
                "Need at least {} cells per condition, got {} Drug and {} Control",
                MIN_CELLS_PER_GROUP,
                drug.len(),
                control.len()
            ),
        });
    }

    log::info!(
        "Testing {} genes ({}): {} Drug vs {} Control cells",
        dataset.n_genes(),
        config.method,
        drug.len(),
        control.len()
    );

    let tests = match config.method {
        DeMethod::Wilcoxon => {
            let assay = dataset.normalized().ok_or_else(|| PipelineError::InvalidInput {
                reason: "Wilcoxon test requires normalized data".to_string(),
            })?;
            wilcoxon_genes(&assay.data, &drug, &control, config.min_pct)
        }
        DeMethod::CountModel => {
            log::debug!("Size factors: {:?}", config.size_factors);
            let size_factors = estimate_size_factors(dataset.counts(), config.size_factors)?;
            count_model_genes(dataset.counts(), &size_factors, &drug, &control, config.min_pct)
        }
    };

    let pvalues: Vec<f64> = tests.iter().map(|t| t.pvalue).collect();
    let padj = p_adjust(&pvalues, config.padj_method);
    let n_tested = pvalues.iter().filter(|p| p.is_finite()).count();
    log::info!(
        "{} of {} genes passed the min_pct {} prefilter",
        n_tested,
        tests.len(),
        config.min_pct
    );

    let counts = dataset.counts();
    Ok(DeResults {
        gene_ids: counts.gene_ids().to_vec(),
        gene_symbols: counts.gene_symbols().to_vec(),
        base_means: tests.iter().map(|t| t.base_mean).collect(),
        log2_fold_changes: tests.iter().map(|t| t.log2_fold_change).collect(),
        stat: tests.iter().map(|t| t.stat).collect(),
        pvalues,
        padj,
        pct_drug: tests.iter().map(|t| t.pct_drug).collect(),
        pct_control: tests.iter().map(|t| t.pct_control).collect(),
        method: config.method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{label_by_pattern, CountMatrix};
    use crate::normalization::{sctransform, SctParams, SizeFactorMethod};
    use ndarray::Array2;

    /// 20 genes x 20 cells; gene 0 is strongly induced in Drug cells
    fn dataset() -> DrugSeqDataSet {
        let mut dense = Array2::<f64>::zeros((20, 20));
        for c in 0..20 {
            for g in 0..20 {
                dense[[g, c]] = 10.0 + ((g * 7 + c * 3) % 5) as f64;
            }
            dense[[0, c]] = if c < 10 { 60.0 + c as f64 } else { 2.0 + (c % 2) as f64 };
        }
        let cell_ids: Vec<String> = (0..20)
            .map(|c| if c < 10 { format!("drug_{}", c) } else { format!("control_{}", c) })
            .collect();
        let counts = CountMatrix::from_dense(
            &dense,
            (0..20).map(|i| format!("E{}", i)).collect(),
            (0..20).map(|i| format!("G{}", i)).collect(),
            cell_ids.clone(),
        )
        .unwrap();
        let mut ds = DrugSeqDataSet::new(counts);
        let labels = label_by_pattern(&cell_ids, "drug", "control").unwrap();
        ds.cell_metadata_mut().set_conditions(labels).unwrap();
        ds
    }

    #[test]
    fn test_wilcoxon_detects_induced_gene() {
        let mut ds = dataset();
        let params = SctParams {
            vars_to_regress: vec![],
            ..Default::default()
        };
        sctransform(&mut ds, &params).unwrap();
        let res = differential_expression(&ds, &DeConfig::default()).unwrap();

        assert_eq!(res.n_genes(), 20);
        assert!(res.log2_fold_changes[0] > 2.0);
        assert!(res.padj[0] < 0.05);
        let sig = res.significant(0.05, 0.5);
        assert!(sig.gene_symbols.contains(&"G0".to_string()));
        for i in 0..sig.n_genes() {
            assert!(sig.padj[i] < 0.05 && sig.log2_fold_changes[i].abs() > 0.5);
        }
    }

    #[test]
    fn test_count_model_detects_induced_gene() {
        let ds = dataset();
        let config = DeConfig {
            method: DeMethod::CountModel,
            ..Default::default()
        };
        let res = differential_expression(&ds, &config).unwrap();
        assert_eq!(res.method, DeMethod::CountModel);
        assert!(res.log2_fold_changes[0] > 2.0);
        assert!(res.padj[0] < 0.05);
        for (p, q) in res.pvalues.iter().zip(&res.padj) {
            if p.is_finite() {
                assert!(q >= p && *q <= 1.0);
            }
        }
    }

    #[test]
    fn test_count_model_with_ratio_size_factors() {
        let ds = dataset();
        let config = DeConfig {
            method: DeMethod::CountModel,
            size_factors: SizeFactorMethod::Ratio,
            ..Default::default()
        };
        let res = differential_expression(&ds, &config).unwrap();
        assert!(res.log2_fold_changes[0] > 2.0);
        assert!(res.padj[0] < 0.05);
    }

    #[test]
    fn test_count_model_ratio_rejects_sparse_genes() {
        let mut dense = Array2::<f64>::from_elem((3, 4), 5.0);
        for g in 0..3 {
            dense[[g, g]] = 0.0;
        }
        let cells: Vec<String> = ["drug_a", "drug_b", "control_a", "control_b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let counts = CountMatrix::from_dense(
            &dense,
            vec!["E0".into(), "E1".into(), "E2".into()],
            vec!["G0".into(), "G1".into(), "G2".into()],
            cells.clone(),
        )
        .unwrap();
        let mut ds = DrugSeqDataSet::new(counts);
        let labels = label_by_pattern(&cells, "drug", "control").unwrap();
        ds.cell_metadata_mut().set_conditions(labels).unwrap();

        let ratio = DeConfig {
            method: DeMethod::CountModel,
            size_factors: SizeFactorMethod::Ratio,
            ..Default::default()
        };
        assert!(matches!(
            differential_expression(&ds, &ratio),
            Err(PipelineError::SizeFactorFailed { .. })
        ));
        let poscounts = DeConfig {
            method: DeMethod::CountModel,
            ..Default::default()
        };
        assert!(differential_expression(&ds, &poscounts).is_ok());
    }

    #[test]
    fn test_wilcoxon_without_normalization_is_error() {
        let ds = dataset();
        assert!(matches!(
            differential_expression(&ds, &DeConfig::default()),
            Err(PipelineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_single_cell_group_is_error() {
        let mut ds = dataset();
        let ids = ds.cell_metadata().cell_ids().to_vec();
        let labels = label_by_pattern(&ids, "drug_0$", "control").unwrap();
        ds.cell_metadata_mut().set_conditions(labels).unwrap();
        assert!(matches!(
            differential_expression(&ds, &DeConfig::default()),
            Err(PipelineError::InvalidDesign { .. })
        ));
    }
}
