//! Size factor estimation using the median of ratios method

use serde::{Deserialize, Serialize};

use crate::data::CountMatrix;
use crate::error::{PipelineError, Result};
use crate::stats::median;

/// Method for size factor estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeFactorMethod {
    /// Standard median of ratios; only genes with no zero counts contribute
    Ratio,
    /// Geometric means over positive counts only, suited to sparse data
    #[default]
    PosCounts,
}

/// Estimate per-cell size factors from a sparse count matrix
///
/// Size factors are re-centred to a geometric mean of 1.
pub fn estimate_size_factors(counts: &CountMatrix, method: SizeFactorMethod) -> Result<Vec<f64>> {
    let n_cells = counts.n_cells();
    if counts.n_genes() == 0 || n_cells == 0 {
        return Err(PipelineError::EmptyData {
            reason: "Count matrix is empty".to_string(),
        });
    }

    // log geometric mean per gene; None when the gene cannot contribute
    let log_geo_means: Vec<Option<f64>> = counts
        .counts()
        .outer_iterator()
        .map(|row| {
            let positives: Vec<f64> = row.iter().map(|(_, &v)| v).filter(|&v| v > 0.0).collect();
            match method {
                SizeFactorMethod::Ratio if positives.len() < n_cells => None,
                _ if positives.is_empty() => None,
                // divide by total cells, not positive cells
                _ => Some(positives.iter().map(|v| v.ln()).sum::<f64>() / n_cells as f64),
            }
        })
        .collect();

    if log_geo_means.iter().all(|g| g.is_none()) {
        return Err(PipelineError::SizeFactorFailed {
            reason: match method {
                SizeFactorMethod::Ratio => "No genes with all non-zero counts found; use poscounts".to_string(),
                SizeFactorMethod::PosCounts => "No genes with positive counts found".to_string(),
            },
        });
    }

    let mut ratios: Vec<Vec<f64>> = vec![Vec::new(); n_cells];
    for (row, log_gm) in counts.counts().outer_iterator().zip(&log_geo_means) {
        let Some(log_gm) = log_gm else { continue };
        for (j, &v) in row.iter() {
            if v > 0.0 {
                ratios[j].push((v.ln() - log_gm).exp());
            }
        }
    }

    let mut size_factors: Vec<f64> = Vec::with_capacity(n_cells);
    for (j, r) in ratios.iter().enumerate() {
        if r.is_empty() {
            if method == SizeFactorMethod::Ratio {
                return Err(PipelineError::SizeFactorFailed {
                    reason: format!("No valid ratios for cell {}", j),
                });
            }
            size_factors.push(1.0);
        } else {
            size_factors.push(median(r));
        }
    }

    if size_factors.iter().any(|&x| x <= 0.0 || !x.is_finite()) {
        return Err(PipelineError::SizeFactorFailed {
            reason: "Invalid size factors computed".to_string(),
        });
    }

    let log_mean = size_factors.iter().map(|x| x.ln()).sum::<f64>() / n_cells as f64;
    let center = log_mean.exp();
    for sf in size_factors.iter_mut() {
        *sf /= center;
    }

    Ok(size_factors)
}
