//! SVG figures: QC distributions, volcano plot and expression heatmap

mod heatmap;
mod qc;
mod volcano;

pub use heatmap::{heatmap_top_genes, HeatmapData};
pub use qc::plot_qc;
pub use volcano::plot_volcano;

use crate::error::PipelineError;

type DrawResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn plot_failed(path: &std::path::Path, err: Box<dyn std::error::Error>) -> PipelineError {
    PipelineError::PlotFailed {
        reason: format!("{}: {}", path.display(), err),
    }
}

/// Finite (min, max) of `values`, widened when degenerate
fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() {
        return None;
    }
    if hi - lo < 1e-12 {
        return Some((lo - 0.5, hi + 0.5));
    }
    Some((lo, hi))
}

/// Equal-width histogram of the finite values: (bin start, bin width, counts)
fn histogram(values: &[f64], n_bins: usize) -> Option<(f64, f64, Vec<usize>)> {
    let (lo, hi) = finite_range(values)?;
    let width = (hi - lo) / n_bins as f64;
    let mut counts = vec![0usize; n_bins];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let bin = (((v - lo) / width) as usize).min(n_bins - 1);
        counts[bin] += 1;
    }
    Some((lo, width, counts))
}
