//! Sparse count matrix representation for DRUG-seq data

use std::collections::HashMap;

use ndarray::Array2;
use sprs::{CsMat, TriMat};

use crate::error::{PipelineError, Result};

/// Deduplicate names by appending _1, _2, etc. to duplicates
fn deduplicate_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *seen.entry(name.clone()).or_insert(0) += 1;
    }
    if !seen.values().any(|&c| c > 1) {
        return names;
    }
    seen.clear();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            result.push(name);
        } else {
            let new_name = format!("{}_{}", name, *count - 1);
            log::warn!("Duplicate gene symbol '{}' renamed to '{}'", name, new_name);
            result.push(new_name);
        }
    }
    result
}

/// A genes x cells matrix of UMI counts
///
/// Stored in CSR layout so that each gene is a contiguous sparse row.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    counts: CsMat<f64>,
    /// Stable feature identifiers (e.g. Ensembl IDs)
    gene_ids: Vec<String>,
    /// Gene symbols, unique within the matrix
    gene_symbols: Vec<String>,
    /// Cell barcodes / well identifiers
    cell_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new count matrix from a sparse matrix
    pub fn new(
        counts: CsMat<f64>,
        gene_ids: Vec<String>,
        gene_symbols: Vec<String>,
        cell_ids: Vec<String>,
    ) -> Result<Self> {
        let counts = if counts.is_csr() { counts } else { counts.to_csr() };
        let (n_genes, n_cells) = (counts.rows(), counts.cols());

        if gene_ids.len() != n_genes {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }
        if gene_symbols.len() != n_genes {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} gene symbols", n_genes),
                got: format!("{} gene symbols", gene_symbols.len()),
            });
        }
        if cell_ids.len() != n_cells {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} cell IDs", n_cells),
                got: format!("{} cell IDs", cell_ids.len()),
            });
        }

        if counts.data().iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(PipelineError::InvalidCountMatrix {
                reason: "Counts must be non-negative finite values".to_string(),
            });
        }

        if counts.data().iter().any(|&x| x != x.round()) {
            log::warn!(
                "Some count values are not integers. UMI counts are expected to be integers."
            );
        }

        let gene_symbols = deduplicate_names(gene_symbols);

        Ok(Self {
            counts,
            gene_ids,
            gene_symbols,
            cell_ids,
        })
    }

    /// Create from a dense genes x cells array, dropping explicit zeros
    pub fn from_dense(
        dense: &Array2<f64>,
        gene_ids: Vec<String>,
        gene_symbols: Vec<String>,
        cell_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_genes, n_cells) = dense.dim();
        let mut tri = TriMat::new((n_genes, n_cells));
        for ((i, j), &value) in dense.indexed_iter() {
            if value != 0.0 {
                tri.add_triplet(i, j, value);
            }
        }
        Self::new(tri.to_csr(), gene_ids, gene_symbols, cell_ids)
    }

    pub fn n_genes(&self) -> usize {
        self.counts.rows()
    }

    pub fn n_cells(&self) -> usize {
        self.counts.cols()
    }

    /// Number of stored non-zero entries
    pub fn nnz(&self) -> usize {
        self.counts.nnz()
    }

    pub fn counts(&self) -> &CsMat<f64> {
        &self.counts
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn gene_symbols(&self) -> &[String] {
        &self.gene_symbols
    }

    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    /// Get gene index by symbol
    pub fn gene_index(&self, symbol: &str) -> Option<usize> {
        self.gene_symbols.iter().position(|s| s == symbol)
    }

    /// Get cell index by ID
    pub fn cell_index(&self, cell_id: &str) -> Option<usize> {
        self.cell_ids.iter().position(|id| id == cell_id)
    }

    /// Total counts per cell (library size)
    pub fn cell_totals(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_cells()];
        for row in self.counts.outer_iterator() {
            for (j, &v) in row.iter() {
                totals[j] += v;
            }
        }
        totals
    }

    /// Number of detected (non-zero) genes per cell
    pub fn cell_detected(&self) -> Vec<usize> {
        let mut detected = vec![0usize; self.n_cells()];
        for row in self.counts.outer_iterator() {
            for (j, &v) in row.iter() {
                if v > 0.0 {
                    detected[j] += 1;
                }
            }
        }
        detected
    }

    /// Total counts per gene
    pub fn gene_totals(&self) -> Vec<f64> {
        self.counts
            .outer_iterator()
            .map(|row| row.iter().map(|(_, &v)| v).sum())
            .collect()
    }

    /// Number of cells in which each gene is detected
    pub fn gene_detected(&self) -> Vec<usize> {
        self.counts
            .outer_iterator()
            .map(|row| row.iter().filter(|(_, &v)| v > 0.0).count())
            .collect()
    }

    /// Dense counts for one gene across all cells
    pub fn gene_counts(&self, gene_idx: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_cells()];
        if let Some(row) = self.counts.outer_view(gene_idx) {
            for (j, &v) in row.iter() {
                dense[j] = v;
            }
        }
        dense
    }

    /// Materialize the full matrix as a dense genes x cells array
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n_genes(), self.n_cells()));
        for (i, row) in self.counts.outer_iterator().enumerate() {
            for (j, &v) in row.iter() {
                dense[[i, j]] = v;
            }
        }
        dense
    }

    /// Subset to the given genes and cells, preserving the given order
    pub fn subset(&self, gene_indices: &[usize], cell_indices: &[usize]) -> Result<Self> {
        let mut cell_map: Vec<Option<usize>> = vec![None; self.n_cells()];
        for (new_j, &j) in cell_indices.iter().enumerate() {
            if j >= self.n_cells() {
                return Err(PipelineError::InvalidInput {
                    reason: format!("cell index {} out of bounds ({} cells)", j, self.n_cells()),
                });
            }
            cell_map[j] = Some(new_j);
        }

        let mut tri = TriMat::new((gene_indices.len(), cell_indices.len()));
        for (new_i, &i) in gene_indices.iter().enumerate() {
            let row = self
                .counts
                .outer_view(i)
                .ok_or_else(|| PipelineError::InvalidInput {
                    reason: format!("gene index {} out of bounds ({} genes)", i, self.n_genes()),
                })?;
            for (j, &v) in row.iter() {
                if let Some(new_j) = cell_map[j] {
                    tri.add_triplet(new_i, new_j, v);
                }
            }
        }

        Self::new(
            tri.to_csr(),
            gene_indices.iter().map(|&i| self.gene_ids[i].clone()).collect(),
            gene_indices.iter().map(|&i| self.gene_symbols[i].clone()).collect(),
            cell_indices.iter().map(|&j| self.cell_ids[j].clone()).collect(),
        )
    }

    /// Subset to specific cells, keeping all genes
    pub fn subset_cells(&self, cell_indices: &[usize]) -> Result<Self> {
        let genes: Vec<usize> = (0..self.n_genes()).collect();
        self.subset(&genes, cell_indices)
    }

    /// Subset to specific genes, keeping all cells
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let cells: Vec<usize> = (0..self.n_cells()).collect();
        self.subset(gene_indices, &cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    fn small_matrix() -> CountMatrix {
        let dense = array![[10.0, 0.0, 30.0], [0.0, 0.0, 5.0], [1.0, 2.0, 0.0]];
        CountMatrix::from_dense(&dense, ids("ENSG", 3), ids("G", 3), ids("c", 3)).unwrap()
    }

    #[test]
    fn test_count_matrix_creation() {
        let matrix = small_matrix();
        assert_eq!(matrix.n_genes(), 3);
        assert_eq!(matrix.n_cells(), 3);
        assert_eq!(matrix.nnz(), 5);
    }

    #[test]
    fn test_negative_counts_rejected() {
        let dense = array![[10.0, -5.0], [5.0, 15.0]];
        let result = CountMatrix::from_dense(&dense, ids("ENSG", 2), ids("G", 2), ids("c", 2));
        assert!(result.is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dense = array![[1.0, 2.0], [3.0, 4.0]];
        let result = CountMatrix::from_dense(&dense, ids("ENSG", 2), ids("G", 2), ids("c", 3));
        assert!(matches!(result, Err(PipelineError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_cell_and_gene_summaries() {
        let matrix = small_matrix();
        assert_eq!(matrix.cell_totals(), vec![11.0, 2.0, 35.0]);
        assert_eq!(matrix.cell_detected(), vec![2, 1, 2]);
        assert_eq!(matrix.gene_totals(), vec![40.0, 5.0, 3.0]);
        assert_eq!(matrix.gene_detected(), vec![2, 1, 2]);
        assert_eq!(matrix.gene_counts(1), vec![0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_duplicate_symbols_renamed() {
        let dense = array![[1.0], [2.0], [3.0]];
        let symbols = vec!["A".to_string(), "A".to_string(), "B".to_string()];
        let matrix = CountMatrix::from_dense(&dense, ids("ENSG", 3), symbols, ids("c", 1)).unwrap();
        assert_eq!(matrix.gene_symbols(), &["A", "A_1", "B"]);
    }

    #[test]
    fn test_subset_preserves_values() {
        let matrix = small_matrix();
        let sub = matrix.subset(&[2, 0], &[2, 0]).unwrap();
        assert_eq!(sub.n_genes(), 2);
        assert_eq!(sub.n_cells(), 2);
        assert_eq!(sub.gene_symbols(), &["G2", "G0"]);
        assert_eq!(sub.cell_ids(), &["c2", "c0"]);
        let dense = sub.to_dense();
        assert_eq!(dense, array![[0.0, 1.0], [30.0, 10.0]]);
    }
}
