//! Over-representation analysis with the hypergeometric test

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use statrs::function::factorial::ln_binomial;

use super::GeneSet;
use crate::config::EnrichmentConfig;
use crate::io::TableRow;
use crate::testing::benjamini_hochberg;

/// One enriched term
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResult {
    pub id: String,
    pub description: String,
    /// `k/n`: significant genes in the term over significant genes in the universe
    pub gene_ratio: String,
    /// `K/N`: term size over universe size
    pub bg_ratio: String,
    pub pvalue: f64,
    pub padj: f64,
    /// Significant member genes, `/`-separated
    pub genes: String,
    pub count: usize,
}

impl TableRow for EnrichmentResult {
    const COLUMNS: &'static [&'static str] =
        &["id", "description", "gene_ratio", "bg_ratio", "pvalue", "padj", "genes", "count"];
}

/// Upper tail `P(X >= k)` of Hypergeometric(N, K, n), summed in log space
///
/// `big_n` is the population, `big_k` its successes, `n` the draws.
pub fn hypergeometric_upper_tail(k: usize, n: usize, big_k: usize, big_n: usize) -> f64 {
    if k == 0 {
        return 1.0;
    }
    let max_i = n.min(big_k);
    if k > max_i {
        return 0.0;
    }
    let log_denom = ln_binomial(big_n as u64, n as u64);
    let mut sum = 0.0_f64;
    for i in k..=max_i {
        // pmf is zero unless n - i <= N - K
        if big_n - big_k < n - i {
            continue;
        }
        let log_p = ln_binomial(big_k as u64, i as u64)
            + ln_binomial((big_n - big_k) as u64, (n - i) as u64)
            - log_denom;
        sum += log_p.exp();
    }
    sum.min(1.0)
}

/// Test each gene set for over-representation of `genes` within `universe`
///
/// Gene sets are restricted to the universe, terms outside the size bounds
/// or without any significant member are dropped, and the remainder are BH
/// adjusted. Only terms passing both cutoffs are returned, by ascending
/// p-value. `labels` optionally renders identifiers for the `genes` column.
pub fn over_representation(
    genes: &[String],
    universe: &[String],
    gene_sets: &[GeneSet],
    config: &EnrichmentConfig,
    labels: Option<&HashMap<String, String>>,
) -> Vec<EnrichmentResult> {
    let universe: HashSet<&str> = universe.iter().map(|s| s.as_str()).collect();
    let selected: HashSet<&str> = genes
        .iter()
        .map(|s| s.as_str())
        .filter(|g| universe.contains(g))
        .collect();
    let big_n = universe.len();
    let n = selected.len();
    if n == 0 || big_n == 0 {
        return Vec::new();
    }

    let mut terms = Vec::new();
    for gs in gene_sets {
        let members: Vec<&str> = gs
            .genes
            .iter()
            .map(|g| g.as_str())
            .filter(|g| universe.contains(g))
            .collect();
        let big_k = members.len();
        if big_k < config.min_gs_size || big_k > config.max_gs_size {
            continue;
        }
        let hits: Vec<&str> = members.iter().copied().filter(|g| selected.contains(g)).collect();
        if hits.is_empty() {
            continue;
        }
        let k = hits.len();
        let rendered: Vec<&str> = hits
            .iter()
            .map(|&g| labels.and_then(|l| l.get(g)).map(|s| s.as_str()).unwrap_or(g))
            .collect();
        terms.push(EnrichmentResult {
            id: gs.id.clone(),
            description: gs.description.clone(),
            gene_ratio: format!("{}/{}", k, n),
            bg_ratio: format!("{}/{}", big_k, big_n),
            pvalue: hypergeometric_upper_tail(k, n, big_k, big_n),
            padj: f64::NAN,
            genes: rendered.join("/"),
            count: k,
        });
    }

    let pvalues: Vec<f64> = terms.iter().map(|t| t.pvalue).collect();
    for (term, padj) in terms.iter_mut().zip(benjamini_hochberg(&pvalues)) {
        term.padj = padj;
    }

    let mut kept: Vec<EnrichmentResult> = terms
        .into_iter()
        .filter(|t| t.pvalue <= config.pvalue_cutoff && t.padj <= config.padj_cutoff)
        .collect();
    kept.sort_by(|a, b| a.pvalue.total_cmp(&b.pvalue));
    kept
}
