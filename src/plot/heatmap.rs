//! Heatmap of the top differentially expressed genes

use std::path::Path;

use plotters::prelude::*;

use super::{plot_failed, DrawResult};
use crate::data::{Condition, DrugSeqDataSet};
use crate::error::{PipelineError, Result};
use crate::io::DeResults;
use crate::stats::zscore_rows;

/// z-score color scale saturates at this magnitude
const Z_LIMIT: f64 = 2.5;

/// Row-scaled expression of the top genes, cells ordered Control then Drug
#[derive(Debug, Clone)]
pub struct HeatmapData {
    pub genes: Vec<String>,
    pub cells: Vec<String>,
    pub conditions: Vec<Condition>,
    /// genes x cells, each row z-scored
    pub values: Vec<Vec<f64>>,
}

impl HeatmapData {
    /// Select up to `top_n` significant genes by adjusted p-value
    ///
    /// Returns `None` when no gene is significant.
    pub fn from_results(
        dataset: &DrugSeqDataSet,
        results: &DeResults,
        padj_cutoff: f64,
        lfc_cutoff: f64,
        top_n: usize,
    ) -> Result<Option<Self>> {
        let assay = dataset.normalized().ok_or_else(|| PipelineError::InvalidInput {
            reason: "heatmap requires normalized data".to_string(),
        })?;

        let genes: Vec<(String, usize)> = results
            .order_by_padj()
            .into_iter()
            .filter(|&i| results.is_significant(i, padj_cutoff, lfc_cutoff))
            .filter_map(|i| {
                let symbol = &results.gene_symbols[i];
                dataset.counts().gene_index(symbol).map(|row| (symbol.clone(), row))
            })
            .take(top_n)
            .collect();
        if genes.is_empty() {
            return Ok(None);
        }

        let (drug, control) = dataset.condition_groups();
        let columns: Vec<(usize, Condition)> = control
            .iter()
            .map(|&c| (c, Condition::Control))
            .chain(drug.iter().map(|&c| (c, Condition::Drug)))
            .collect();

        let mut values: Vec<Vec<f64>> = genes
            .iter()
            .map(|&(_, row)| columns.iter().map(|&(c, _)| assay.data[[row, c]]).collect())
            .collect();
        zscore_rows(&mut values);

        let cell_ids = dataset.cell_metadata().cell_ids();
        Ok(Some(Self {
            genes: genes.into_iter().map(|(g, _)| g).collect(),
            cells: columns.iter().map(|&(c, _)| cell_ids[c].clone()).collect(),
            conditions: columns.iter().map(|&(_, k)| k).collect(),
            values,
        }))
    }
}

/// Blue-white-red diverging scale over [-Z_LIMIT, Z_LIMIT]
fn diverging(z: f64) -> RGBColor {
    let t = (z / Z_LIMIT).clamp(-1.0, 1.0);
    let fade = |full: u8, t: f64| (255.0 + (full as f64 - 255.0) * t).round() as u8;
    if t >= 0.0 {
        RGBColor(fade(178, t), fade(24, t), fade(43, t))
    } else {
        RGBColor(fade(33, -t), fade(102, -t), fade(172, -t))
    }
}

fn condition_color(condition: Condition) -> RGBColor {
    match condition {
        Condition::Control => RGBColor(120, 120, 120),
        Condition::Drug => RGBColor(230, 145, 30),
    }
}

/// Build and draw the top-gene heatmap
///
/// Returns `false` without writing anything when no gene is significant.
pub fn heatmap_top_genes(
    dataset: &DrugSeqDataSet,
    results: &DeResults,
    padj_cutoff: f64,
    lfc_cutoff: f64,
    top_n: usize,
    path: &Path,
    size: (u32, u32),
) -> Result<bool> {
    let Some(data) = HeatmapData::from_results(dataset, results, padj_cutoff, lfc_cutoff, top_n)? else {
        log::info!("No significant genes; skipping heatmap");
        return Ok(false);
    };
    draw_heatmap(&data, path, size).map_err(|e| plot_failed(path, e))?;
    log::info!("Wrote {} ({} genes x {} cells)", path.display(), data.genes.len(), data.cells.len());
    Ok(true)
}

fn draw_heatmap(data: &HeatmapData, path: &Path, size: (u32, u32)) -> DrawResult<()> {
    let n_genes = data.genes.len();
    let n_cells = data.cells.len();

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    // the top row holds the condition annotation
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Top {} genes: Drug vs Control", n_genes), ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(110)
        .build_cartesian_2d(0f64..n_cells as f64, 0f64..(n_genes + 1) as f64)?;

    let genes = &data.genes;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("cells (Control | Drug)")
        .x_labels(0)
        .y_labels(n_genes + 2)
        .y_label_formatter(&|y| {
            let row = y.floor() as usize;
            if row == n_genes {
                "condition".to_string()
            } else if row < n_genes && (y - y.floor()).abs() < 1e-9 {
                genes[n_genes - 1 - row].clone()
            } else {
                String::new()
            }
        })
        .draw()?;

    // first gene at the top, just below the annotation row
    chart.draw_series(data.values.iter().enumerate().flat_map(|(g, row)| {
        let y0 = (n_genes - 1 - g) as f64;
        row.iter().enumerate().map(move |(c, &z)| {
            Rectangle::new([(c as f64, y0), (c as f64 + 1.0, y0 + 1.0)], diverging(z).filled())
        })
    }))?;
    chart.draw_series(data.conditions.iter().enumerate().map(|(c, &k)| {
        Rectangle::new(
            [(c as f64, n_genes as f64), (c as f64 + 1.0, n_genes as f64 + 1.0)],
            condition_color(k).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{label_by_pattern, CountMatrix, NormalizedAssay};
    use crate::io::DeMethod;
    use ndarray::Array2;

    fn dataset() -> DrugSeqDataSet {
        let cells: Vec<String> = vec!["drug_a".into(), "ctrl_a".into(), "drug_b".into(), "ctrl_b".into()];
        let dense = Array2::from_shape_vec(
            (3, 4),
            vec![5.0, 1.0, 6.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 4.0, 1.0, 5.0],
        )
        .unwrap();
        let counts = CountMatrix::from_dense(
            &dense,
            vec!["E0".into(), "E1".into(), "E2".into()],
            vec!["UP".into(), "FLAT".into(), "DOWN".into()],
            cells.clone(),
        )
        .unwrap();
        let mut ds = DrugSeqDataSet::new(counts);
        let labels = label_by_pattern(&cells, "drug", "ctrl").unwrap();
        ds.cell_metadata_mut().set_conditions(labels).unwrap();
        ds.set_normalized(NormalizedAssay {
            data: dense.mapv(f64::ln_1p),
            scale_data: Array2::zeros((0, 4)),
            variable_features: vec![],
            residual_variance: vec![0.0; 3],
            regressed: vec![],
        })
        .unwrap();
        ds
    }

    fn results() -> DeResults {
        let mut res = DeResults::empty(DeMethod::Wilcoxon);
        for (i, (sym, lfc, padj)) in [("UP", 2.0, 0.01), ("FLAT", 0.0, 0.9), ("DOWN", -2.0, 0.001)]
            .into_iter()
            .enumerate()
        {
            res.gene_ids.push(format!("E{}", i));
            res.gene_symbols.push(sym.to_string());
            res.base_means.push(1.0);
            res.log2_fold_changes.push(lfc);
            res.stat.push(0.0);
            res.pvalues.push(padj);
            res.padj.push(padj);
            res.pct_drug.push(1.0);
            res.pct_control.push(1.0);
        }
        res
    }

    #[test]
    fn test_heatmap_data_orders_genes_and_cells() {
        let data = HeatmapData::from_results(&dataset(), &results(), 0.05, 0.5, 30)
            .unwrap()
            .unwrap();
        assert_eq!(data.genes, vec!["DOWN".to_string(), "UP".to_string()]);
        assert_eq!(data.cells, vec!["ctrl_a", "ctrl_b", "drug_a", "drug_b"]);
        assert_eq!(
            data.conditions,
            vec![Condition::Control, Condition::Control, Condition::Drug, Condition::Drug]
        );
        // UP is higher in the Drug columns after scaling
        assert!(data.values[1][2] > 0.0 && data.values[1][0] < 0.0);
        let row_mean: f64 = data.values[0].iter().sum::<f64>() / 4.0;
        assert!(row_mean.abs() < 1e-12);
    }

    #[test]
    fn test_heatmap_top_n_limits_rows() {
        let data = HeatmapData::from_results(&dataset(), &results(), 0.05, 0.5, 1)
            .unwrap()
            .unwrap();
        assert_eq!(data.genes, vec!["DOWN".to_string()]);
    }

    #[test]
    fn test_heatmap_written_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.svg");
        assert!(heatmap_top_genes(&dataset(), &results(), 0.05, 0.5, 30, &path, (800, 600)).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));

        let skipped = dir.path().join("none.svg");
        assert!(!heatmap_top_genes(&dataset(), &results(), 1e-9, 0.5, 30, &skipped, (800, 600)).unwrap());
        assert!(!skipped.exists());
    }

    #[test]
    fn test_diverging_scale() {
        let rgb = |c: RGBColor| (c.0, c.1, c.2);
        assert_eq!(rgb(diverging(0.0)), (255, 255, 255));
        assert_eq!(rgb(diverging(10.0)), (178, 24, 43));
        assert_eq!(rgb(diverging(-10.0)), (33, 102, 172));
    }
}
