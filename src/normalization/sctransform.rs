//! Variance-stabilizing transform based on analytic Pearson residuals
//!
//! Each gene is modelled as negative binomial with mean `mu_gc = n_c * p_g`
//! (cell depth times the gene's share of all counts) and a fixed
//! overdispersion `theta`. Pearson residuals rank the variable features,
//! optionally have per-cell covariates regressed out, and are used to
//! rebuild "corrected" counts at the median sequencing depth.
//!
//! Covariate regression only touches the scaled assay (`scale_data`); the
//! corrected counts behind `data` come from the unregressed residuals.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{DrugSeqDataSet, NormalizedAssay};
use crate::error::{PipelineError, Result};
use crate::stats::{median, solve_linear, variance};

/// Parameters of the transform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SctParams {
    /// Negative binomial overdispersion shared by all genes
    pub theta: f64,
    /// Number of genes kept in the scaled assay
    pub n_variable_features: usize,
    /// Numeric cell metadata columns regressed out of the residuals
    pub vars_to_regress: Vec<String>,
    /// Residual clip; defaults to sqrt(n_cells)
    pub clip: Option<f64>,
}

impl Default for SctParams {
    fn default() -> Self {
        Self {
            theta: 100.0,
            n_variable_features: 3000,
            vars_to_regress: vec!["percent_mt".to_string()],
            clip: None,
        }
    }
}

/// Pearson residual of one observation; zero where the expected count is zero
#[inline]
pub fn pearson_residual(x: f64, mu: f64, theta: f64) -> f64 {
    if mu <= 0.0 {
        return 0.0;
    }
    (x - mu) / (mu + mu * mu / theta).sqrt()
}

/// Per-gene result of the first pass
struct GeneFit {
    data: Vec<f64>,
    residual_variance: f64,
}

/// Normalize the dataset in place, attaching a [`NormalizedAssay`]
pub fn sctransform(dataset: &mut DrugSeqDataSet, params: &SctParams) -> Result<()> {
    let n_genes = dataset.n_genes();
    let n_cells = dataset.n_cells();
    if n_genes == 0 || n_cells == 0 {
        return Err(PipelineError::EmptyData {
            reason: "Cannot normalize an empty count matrix".to_string(),
        });
    }
    if !(params.theta > 0.0) {
        return Err(PipelineError::InvalidConfig {
            reason: format!("theta must be > 0, got {}", params.theta),
        });
    }

    let counts = dataset.counts();
    let depth = counts.cell_totals();
    let total: f64 = depth.iter().sum();
    if total <= 0.0 {
        return Err(PipelineError::EmptyData {
            reason: "Count matrix has no counts".to_string(),
        });
    }
    let gene_share: Vec<f64> = counts.gene_totals().iter().map(|&g| g / total).collect();
    let median_depth = median(&depth);
    let clip = params.clip.unwrap_or((n_cells as f64).sqrt());
    let theta = params.theta;

    log::info!(
        "Normalizing {} genes x {} cells (theta = {}, median depth = {})",
        n_genes,
        n_cells,
        theta,
        median_depth
    );

    // first pass: corrected counts and residual variance for every gene
    let fits: Vec<GeneFit> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let x = counts.gene_counts(i);
            let p = gene_share[i];
            let mu_corrected = median_depth * p;
            let sd_corrected = (mu_corrected + mu_corrected * mu_corrected / theta).sqrt();

            let mut clipped = Vec::with_capacity(n_cells);
            let mut data = Vec::with_capacity(n_cells);
            for (c, &v) in x.iter().enumerate() {
                let r = pearson_residual(v, depth[c] * p, theta);
                clipped.push(r.clamp(-clip, clip));
                let corrected = (mu_corrected + r * sd_corrected).round().max(0.0);
                data.push(corrected.ln_1p());
            }
            GeneFit {
                data,
                residual_variance: variance(&clipped),
            }
        })
        .collect();

    let residual_variance: Vec<f64> = fits.iter().map(|f| f.residual_variance).collect();
    let mut order: Vec<usize> = (0..n_genes).collect();
    order.sort_by(|&a, &b| residual_variance[b].total_cmp(&residual_variance[a]));
    let n_var = params.n_variable_features.min(n_genes);
    let variable_features: Vec<usize> = order.into_iter().take(n_var).collect();
    log::info!("Selected {} variable features", n_var);

    let mut data = Array2::<f64>::zeros((n_genes, n_cells));
    for (i, fit) in fits.into_iter().enumerate() {
        for (c, v) in fit.data.into_iter().enumerate() {
            data[[i, c]] = v;
        }
    }

    let (covariates, regressed) = collect_covariates(dataset, &params.vars_to_regress)?;
    let counts = dataset.counts();

    // second pass: clipped residuals of the variable features, covariates removed
    let rows: Vec<Vec<f64>> = variable_features
        .par_iter()
        .map(|&i| {
            let p = gene_share[i];
            let residuals: Vec<f64> = counts
                .gene_counts(i)
                .iter()
                .enumerate()
                .map(|(c, &v)| pearson_residual(v, depth[c] * p, theta).clamp(-clip, clip))
                .collect();
            match &covariates {
                Some(design) => design.residualize(&residuals, clip),
                None => Ok(residuals),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let mut scale_data = Array2::<f64>::zeros((n_var, n_cells));
    for (k, row) in rows.into_iter().enumerate() {
        for (c, v) in row.into_iter().enumerate() {
            scale_data[[k, c]] = v;
        }
    }

    dataset.set_normalized(NormalizedAssay {
        data,
        scale_data,
        variable_features,
        residual_variance,
        regressed,
    })
}

/// Ordinary least-squares design `[1, covariate...]` shared by every gene
struct CovariateDesign {
    columns: Vec<Vec<f64>>,
    xtx: Vec<Vec<f64>>,
}

impl CovariateDesign {
    fn new(covariates: Vec<Vec<f64>>, n_cells: usize) -> Self {
        let mut columns = vec![vec![1.0; n_cells]];
        columns.extend(covariates);
        let p = columns.len();
        let mut xtx = vec![vec![0.0; p]; p];
        for a in 0..p {
            for b in 0..p {
                xtx[a][b] = columns[a].iter().zip(&columns[b]).map(|(u, v)| u * v).sum();
            }
        }
        Self { columns, xtx }
    }

    /// Residuals of `y` after projecting out the design, re-clipped
    fn residualize(&self, y: &[f64], clip: f64) -> Result<Vec<f64>> {
        let xty: Vec<f64> = self
            .columns
            .iter()
            .map(|col| col.iter().zip(y).map(|(u, v)| u * v).sum())
            .collect();
        let beta = solve_linear(self.xtx.clone(), xty).ok_or_else(|| {
            PipelineError::NumericalInstability {
                operation: "covariate regression".to_string(),
                details: "design matrix is singular".to_string(),
            }
        })?;
        Ok(y
            .iter()
            .enumerate()
            .map(|(c, &v)| {
                let fitted: f64 = self.columns.iter().zip(&beta).map(|(col, b)| col[c] * b).sum();
                (v - fitted).clamp(-clip, clip)
            })
            .collect())
    }
}

/// Look up the covariates to regress, dropping constant ones
fn collect_covariates(
    dataset: &DrugSeqDataSet,
    names: &[String],
) -> Result<(Option<CovariateDesign>, Vec<String>)> {
    let meta = dataset.cell_metadata();
    let mut columns = Vec::new();
    let mut used = Vec::new();
    for name in names {
        let values = meta.require_numeric(name)?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidMetadata {
                reason: format!("Covariate '{}' has non-finite values", name),
            });
        }
        if variance(values) <= 0.0 {
            log::warn!("Covariate '{}' is constant across cells; not regressed", name);
            continue;
        }
        columns.push(values.clone());
        used.push(name.clone());
    }
    if columns.is_empty() {
        return Ok((None, used));
    }
    log::info!("Regressing out: {}", used.join(", "));
    Ok((Some(CovariateDesign::new(columns, dataset.n_cells())), used))
}
