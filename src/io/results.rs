//! Differential expression results table

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TableRow;
use crate::error::Result;

/// Statistical method used to produce a results table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeMethod {
    /// Wilcoxon rank-sum test on log-normalized expression
    Wilcoxon,
    /// Negative binomial Wald test on size-factor normalized counts
    CountModel,
}

impl std::fmt::Display for DeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeMethod::Wilcoxon => write!(f, "wilcoxon"),
            DeMethod::CountModel => write!(f, "count-model"),
        }
    }
}

/// Per-gene differential expression results, Drug vs Control
///
/// Columns are parallel vectors, one entry per tested gene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeResults {
    pub gene_ids: Vec<String>,
    pub gene_symbols: Vec<String>,
    /// Mean expression across all cells of both groups
    pub base_means: Vec<f64>,
    /// log2 fold change, Drug over Control
    pub log2_fold_changes: Vec<f64>,
    /// Test statistic (rank-sum z or Wald z)
    pub stat: Vec<f64>,
    pub pvalues: Vec<f64>,
    pub padj: Vec<f64>,
    /// Fraction of Drug cells with non-zero expression
    pub pct_drug: Vec<f64>,
    /// Fraction of Control cells with non-zero expression
    pub pct_control: Vec<f64>,
    pub method: DeMethod,
}

#[derive(Serialize)]
struct DeRow<'a> {
    gene_id: &'a str,
    gene: &'a str,
    base_mean: f64,
    log2_fold_change: f64,
    stat: f64,
    pvalue: f64,
    padj: f64,
    pct_drug: f64,
    pct_control: f64,
}

impl TableRow for DeRow<'_> {
    const COLUMNS: &'static [&'static str] = &[
        "gene_id",
        "gene",
        "base_mean",
        "log2_fold_change",
        "stat",
        "pvalue",
        "padj",
        "pct_drug",
        "pct_control",
    ];
}

impl DeResults {
    /// Create an empty table for the given method
    pub fn empty(method: DeMethod) -> Self {
        Self {
            gene_ids: Vec::new(),
            gene_symbols: Vec::new(),
            base_means: Vec::new(),
            log2_fold_changes: Vec::new(),
            stat: Vec::new(),
            pvalues: Vec::new(),
            padj: Vec::new(),
            pct_drug: Vec::new(),
            pct_control: Vec::new(),
            method,
        }
    }

    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gene_ids.is_empty()
    }

    /// Whether row `i` passes `padj < padj_cutoff` and `|log2FC| > lfc_cutoff`
    pub fn is_significant(&self, i: usize, padj_cutoff: f64, lfc_cutoff: f64) -> bool {
        let padj = self.padj[i];
        let lfc = self.log2_fold_changes[i];
        padj.is_finite() && padj < padj_cutoff && lfc.is_finite() && lfc.abs() > lfc_cutoff
    }

    /// Row indices of significant genes, in table order
    pub fn significant_indices(&self, padj_cutoff: f64, lfc_cutoff: f64) -> Vec<usize> {
        (0..self.n_genes())
            .filter(|&i| self.is_significant(i, padj_cutoff, lfc_cutoff))
            .collect()
    }

    /// Sub-table of significant genes
    pub fn significant(&self, padj_cutoff: f64, lfc_cutoff: f64) -> DeResults {
        self.select(&self.significant_indices(padj_cutoff, lfc_cutoff))
    }

    /// Sub-table of the given rows, in the given order
    pub fn select(&self, rows: &[usize]) -> DeResults {
        fn pick<T: Clone>(v: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().map(|&i| v[i].clone()).collect()
        }
        DeResults {
            gene_ids: pick(&self.gene_ids, rows),
            gene_symbols: pick(&self.gene_symbols, rows),
            base_means: pick(&self.base_means, rows),
            log2_fold_changes: pick(&self.log2_fold_changes, rows),
            stat: pick(&self.stat, rows),
            pvalues: pick(&self.pvalues, rows),
            padj: pick(&self.padj, rows),
            pct_drug: pick(&self.pct_drug, rows),
            pct_control: pick(&self.pct_control, rows),
            method: self.method,
        }
    }

    /// Row indices ordered by ascending adjusted p-value (NaN last), ties by |log2FC| descending
    pub fn order_by_padj(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.n_genes()).collect();
        order.sort_by(|&a, &b| {
            let pa = if self.padj[a].is_nan() { f64::INFINITY } else { self.padj[a] };
            let pb = if self.padj[b].is_nan() { f64::INFINITY } else { self.padj[b] };
            pa.total_cmp(&pb).then_with(|| {
                self.log2_fold_changes[b]
                    .abs()
                    .total_cmp(&self.log2_fold_changes[a].abs())
            })
        });
        order
    }

    /// Summary statistics
    pub fn summary(&self, padj_cutoff: f64, lfc_cutoff: f64) -> ResultsSummary {
        let significant = self.significant_indices(padj_cutoff, lfc_cutoff);
        let upregulated = significant
            .iter()
            .filter(|&&i| self.log2_fold_changes[i] > 0.0)
            .count();
        ResultsSummary {
            total_genes: self.n_genes(),
            genes_tested: self.pvalues.iter().filter(|p| p.is_finite()).count(),
            significant: significant.len(),
            upregulated,
            downregulated: significant.len() - upregulated,
            padj_cutoff,
            lfc_cutoff,
            method: self.method,
        }
    }

    /// Write the table as CSV
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(DeRow::COLUMNS)?;
        for i in 0..self.n_genes() {
            writer.serialize(DeRow {
                gene_id: &self.gene_ids[i],
                gene: &self.gene_symbols[i],
                base_mean: self.base_means[i],
                log2_fold_change: self.log2_fold_changes[i],
                stat: self.stat[i],
                pvalue: self.pvalues[i],
                padj: self.padj[i],
                pct_drug: self.pct_drug[i],
                pct_control: self.pct_control[i],
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Summary of a results table
#[derive(Debug, Clone, Serialize)]
pub struct ResultsSummary {
    pub total_genes: usize,
    pub genes_tested: usize,
    pub significant: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub padj_cutoff: f64,
    pub lfc_cutoff: f64,
    pub method: DeMethod,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Differential Expression Summary (Drug vs Control, {})", self.method)?;
        writeln!(f, "=================================")?;
        writeln!(f, "Total genes: {}", self.total_genes)?;
        writeln!(f, "Genes tested: {}", self.genes_tested)?;
        writeln!(
            f,
            "Significant (padj < {}, |log2FC| > {}): {}",
            self.padj_cutoff, self.lfc_cutoff, self.significant
        )?;
        writeln!(f, "  Up-regulated: {}", self.upregulated)?;
        writeln!(f, "  Down-regulated: {}", self.downregulated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DeResults {
        DeResults {
            gene_ids: vec!["E1".into(), "E2".into(), "E3".into(), "E4".into(), "E5".into()],
            gene_symbols: vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()],
            base_means: vec![1.0; 5],
            log2_fold_changes: vec![1.2, -0.8, 0.5, 2.0, f64::NAN],
            stat: vec![0.0; 5],
            pvalues: vec![0.001, 0.002, 0.0001, 0.2, 0.01],
            padj: vec![0.01, 0.04, 0.001, 0.3, f64::NAN],
            pct_drug: vec![0.5; 5],
            pct_control: vec![0.5; 5],
            method: DeMethod::Wilcoxon,
        }
    }

    #[test]
    fn test_significant_thresholds_are_strict() {
        let res = table();
        // C has |lfc| == 0.5 exactly, D fails padj, E is NaN
        assert_eq!(res.significant_indices(0.05, 0.5), vec![0, 1]);
        let sig = res.significant(0.05, 0.5);
        assert_eq!(sig.gene_symbols, vec!["A", "B"]);
        for i in 0..sig.n_genes() {
            assert!(sig.padj[i] < 0.05 && sig.log2_fold_changes[i].abs() > 0.5);
            assert!(res.gene_ids.contains(&sig.gene_ids[i]));
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = table().summary(0.05, 0.5);
        assert_eq!(summary.total_genes, 5);
        assert_eq!(summary.genes_tested, 5);
        assert_eq!(summary.significant, 2);
        assert_eq!(summary.upregulated, 1);
        assert_eq!(summary.downregulated, 1);
    }

    #[test]
    fn test_order_by_padj_puts_nan_last() {
        let order = table().order_by_padj();
        assert_eq!(order, vec![2, 0, 1, 3, 4]);
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("de.csv");
        table().write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "gene_id,gene,base_mean,log2_fold_change,stat,pvalue,padj,pct_drug,pct_control"
        );
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn test_write_csv_without_significant_genes_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("significant.csv");
        let none = table().significant(0.05, 10.0);
        assert!(none.is_empty());
        none.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("gene_id,gene,"));
    }
}
