//! P-value adjustment methods for multiple testing correction
//!
//! NaN p-values (untested genes) are left as NaN and do not count towards
//! the number of tests.

use serde::{Deserialize, Serialize};

/// Multiple testing correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PAdjustMethod {
    /// False discovery rate (Benjamini-Hochberg)
    #[serde(alias = "bh", alias = "BH")]
    BenjaminiHochberg,
    /// Family-wise error rate
    Bonferroni,
}

/// Indices of the finite p-values, ascending by p-value
fn tested_by_pvalue(pvalues: &[f64]) -> Vec<usize> {
    let mut tested: Vec<usize> = (0..pvalues.len()).filter(|&i| pvalues[i].is_finite()).collect();
    tested.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));
    tested
}

/// Adjust `pvalues` with the given method
///
/// Both methods scale by the number of tested genes `m`. Benjamini-Hochberg
/// then walks the ranks from the largest p-value down, keeping the running
/// minimum of `p * m / rank` so adjusted values stay monotone in p.
pub fn p_adjust(pvalues: &[f64], method: PAdjustMethod) -> Vec<f64> {
    let tested = tested_by_pvalue(pvalues);
    let m = tested.len() as f64;
    let mut padj = vec![f64::NAN; pvalues.len()];

    match method {
        PAdjustMethod::Bonferroni => {
            for &i in &tested {
                padj[i] = (pvalues[i] * m).min(1.0);
            }
        }
        PAdjustMethod::BenjaminiHochberg => {
            let mut running = 1.0_f64;
            for (rank, &i) in tested.iter().enumerate().rev() {
                running = running.min(pvalues[i] * m / (rank + 1) as f64);
                padj[i] = running;
            }
        }
    }
    padj
}

/// Benjamini-Hochberg false discovery rate
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    p_adjust(pvalues, PAdjustMethod::BenjaminiHochberg)
}

/// Bonferroni family-wise error rate
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    p_adjust(pvalues, PAdjustMethod::Bonferroni)
}
