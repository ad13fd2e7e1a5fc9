//! Volcano plot of a differential expression table

use std::path::Path;

use plotters::prelude::*;

use super::{plot_failed, DrawResult};
use crate::error::Result;
use crate::io::DeResults;

const UP: RGBColor = RGBColor(215, 48, 39);
const DOWN: RGBColor = RGBColor(69, 117, 180);
const NOT_SIG: RGBColor = RGBColor(170, 170, 170);

/// Cap for -log10(padj) when the adjusted p-value underflows to zero
const MAX_NEG_LOG10: f64 = 300.0;

/// log2 fold change against -log10(padj) with cutoff guides
///
/// Returns `false` without writing anything when no gene is significant.
pub fn plot_volcano(
    results: &DeResults,
    padj_cutoff: f64,
    lfc_cutoff: f64,
    path: &Path,
    size: (u32, u32),
) -> Result<bool> {
    if results.significant_indices(padj_cutoff, lfc_cutoff).is_empty() {
        log::info!("No significant genes; skipping volcano plot");
        return Ok(false);
    }
    draw_volcano(results, padj_cutoff, lfc_cutoff, path, size).map_err(|e| plot_failed(path, e))?;
    log::info!("Wrote {}", path.display());
    Ok(true)
}

fn draw_volcano(
    results: &DeResults,
    padj_cutoff: f64,
    lfc_cutoff: f64,
    path: &Path,
    size: (u32, u32),
) -> DrawResult<()> {
    // layer 0: not significant, 1: down, 2: up
    let points: Vec<(f64, f64, usize)> = (0..results.n_genes())
        .filter(|&i| results.padj[i].is_finite() && results.log2_fold_changes[i].is_finite())
        .map(|i| {
            let lfc = results.log2_fold_changes[i];
            let y = (-results.padj[i].log10()).min(MAX_NEG_LOG10);
            let layer = if !results.is_significant(i, padj_cutoff, lfc_cutoff) {
                0
            } else if lfc > 0.0 {
                2
            } else {
                1
            };
            (lfc, y, layer)
        })
        .collect();

    let x_max = points
        .iter()
        .map(|p| p.0.abs())
        .fold(lfc_cutoff, f64::max)
        * 1.1;
    let y_guide = -padj_cutoff.log10();
    let y_max = points.iter().map(|p| p.1).fold(y_guide, f64::max) * 1.05 + 0.1;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Volcano plot: Drug vs Control", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-x_max..x_max, 0f64..y_max)?;
    chart
        .configure_mesh()
        .x_desc("log2 fold change")
        .y_desc("-log10 adjusted p-value")
        .draw()?;

    // grey first so significant genes are drawn on top
    for (layer, color) in [NOT_SIG, DOWN, UP].into_iter().enumerate() {
        chart.draw_series(
            points
                .iter()
                .filter(|p| p.2 == layer)
                .map(|&(x, y, _)| Circle::new((x, y), 3, color.filled())),
        )?;
    }

    let guide = BLACK.mix(0.5);
    for x in [-lfc_cutoff, lfc_cutoff] {
        chart.draw_series(LineSeries::new(vec![(x, 0.0), (x, y_max)], guide.stroke_width(1)))?;
    }
    chart.draw_series(LineSeries::new(vec![(-x_max, y_guide), (x_max, y_guide)], guide.stroke_width(1)))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::DeMethod;

    fn results(significant: bool) -> DeResults {
        let mut res = DeResults::empty(DeMethod::Wilcoxon);
        for i in 0..10 {
            res.gene_ids.push(format!("E{}", i));
            res.gene_symbols.push(format!("G{}", i));
            res.base_means.push(5.0);
            res.log2_fold_changes.push(i as f64 / 2.0 - 2.5);
            res.stat.push(0.0);
            res.pvalues.push(0.01);
            res.padj.push(if significant && i == 0 { 0.0 } else { 0.2 });
            res.pct_drug.push(0.5);
            res.pct_control.push(0.5);
        }
        res
    }

    #[test]
    fn test_volcano_written_when_significant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volcano.svg");
        assert!(plot_volcano(&results(true), 0.05, 0.5, &path, (800, 600)).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
    }

    #[test]
    fn test_volcano_skipped_without_significant_genes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volcano.svg");
        assert!(!plot_volcano(&results(false), 0.05, 0.5, &path, (800, 600)).unwrap());
        assert!(!path.exists());
    }
}
