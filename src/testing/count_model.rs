//! Negative binomial Wald test on size-factor normalized counts

use rayon::prelude::*;

use super::pvalue::calculate_pvalue;
use super::GeneTest;
use crate::data::CountMatrix;
use crate::stats::{mean, variance};

/// Pseudocount added to group means before taking the fold change
pub const PSEUDOCOUNT: f64 = 0.5;

/// Method-of-moments dispersion, `(var - mean) / mean^2`, kept positive
pub fn moments_dispersion(normalized: &[f64]) -> f64 {
    let m = mean(normalized);
    if !(m > 0.0) {
        return 1e-8;
    }
    ((variance(normalized) - m) / (m * m)).clamp(1e-8, 1e8)
}

/// Wald test of the log2 ratio of group means under a negative binomial
/// variance `mu + alpha * mu^2`, standard error by the delta method
pub fn nb_wald(drug: &[f64], control: &[f64], alpha: f64) -> (f64, f64, f64) {
    let mu_d = mean(drug);
    let mu_c = mean(control);
    let lfc = ((mu_d + PSEUDOCOUNT) / (mu_c + PSEUDOCOUNT)).log2();

    let se_d = ((mu_d + alpha * mu_d * mu_d) / drug.len() as f64).sqrt();
    let se_c = ((mu_c + alpha * mu_c * mu_c) / control.len() as f64).sqrt();
    let se = ((se_d / (mu_d + PSEUDOCOUNT)).powi(2) + (se_c / (mu_c + PSEUDOCOUNT)).powi(2)).sqrt()
        / std::f64::consts::LN_2;

    if se > 1e-15 {
        let z = lfc / se;
        (lfc, z, calculate_pvalue(z))
    } else {
        (lfc, 0.0, 1.0)
    }
}

/// Run the Wald test for every gene of `counts`
///
/// Genes detected in fewer than `min_pct` of the cells of both groups, or
/// with no counts at all, are reported with NaN statistic and p-value.
pub fn count_model_genes(
    counts: &CountMatrix,
    size_factors: &[f64],
    drug: &[usize],
    control: &[usize],
    min_pct: f64,
) -> Vec<GeneTest> {
    (0..counts.n_genes())
        .into_par_iter()
        .map(|i| {
            let raw = counts.gene_counts(i);
            let d: Vec<f64> = drug.iter().map(|&c| raw[c] / size_factors[c]).collect();
            let k: Vec<f64> = control.iter().map(|&c| raw[c] / size_factors[c]).collect();
            let pct_drug = d.iter().filter(|&&x| x > 0.0).count() as f64 / d.len() as f64;
            let pct_control = k.iter().filter(|&&x| x > 0.0).count() as f64 / k.len() as f64;

            let pooled: Vec<f64> = d.iter().chain(&k).copied().collect();
            let base_mean = mean(&pooled);
            if base_mean == 0.0 || pct_drug.max(pct_control) < min_pct {
                let (lfc, _, _) = nb_wald(&d, &k, 1e-8);
                return GeneTest {
                    base_mean,
                    log2_fold_change: lfc,
                    stat: f64::NAN,
                    pvalue: f64::NAN,
                    pct_drug,
                    pct_control,
                };
            }

            let alpha = moments_dispersion(&pooled);
            let (log2_fold_change, stat, pvalue) = nb_wald(&d, &k, alpha);
            GeneTest {
                base_mean,
                log2_fold_change,
                stat,
                pvalue,
                pct_drug,
                pct_control,
            }
        })
        .collect()
}
