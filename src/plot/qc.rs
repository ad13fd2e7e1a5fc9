//! QC metric distributions

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{finite_range, histogram, plot_failed, DrawResult};
use crate::error::Result;
use crate::qc::QcColumns;

const N_BINS: usize = 40;

/// Histograms of the four QC metrics and a depth vs detected-genes scatter
pub fn plot_qc(qc: &QcColumns<'_>, title: &str, path: &Path, size: (u32, u32)) -> Result<()> {
    draw_qc(qc, title, path, size).map_err(|e| plot_failed(path, e))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn draw_qc(qc: &QcColumns<'_>, title: &str, path: &Path, size: (u32, u32)) -> DrawResult<()> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;
    let panels = root.split_evenly((2, 3));

    let metrics: [(&str, &[f64]); 4] = [
        ("n_counts", qc.n_counts),
        ("n_features", qc.n_features),
        ("percent_mt", qc.percent_mt),
        ("log10_genes_per_umi", qc.log10_genes_per_umi),
    ];
    for ((name, values), area) in metrics.iter().zip(panels.iter()) {
        draw_histogram(area, name, values)?;
    }
    draw_scatter(&panels[4], qc.n_counts, qc.n_features)?;

    root.present()?;
    Ok(())
}

fn draw_histogram(area: &DrawingArea<SVGBackend<'_>, Shift>, name: &str, values: &[f64]) -> DrawResult<()> {
    let Some((lo, width, counts)) = histogram(values, N_BINS) else {
        return Ok(());
    };
    let max_count = counts.iter().copied().max().unwrap_or(1).max(1) as f64;
    let mut chart = ChartBuilder::on(area)
        .caption(name, ("sans-serif", 16))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(lo..lo + width * N_BINS as f64, 0f64..max_count * 1.05)?;
    chart.configure_mesh().disable_x_mesh().y_desc("cells").draw()?;
    chart.draw_series(counts.iter().enumerate().map(|(b, &c)| {
        let x0 = lo + b as f64 * width;
        Rectangle::new([(x0, 0.0), (x0 + width, c as f64)], RGBColor(70, 130, 180).filled())
    }))?;
    Ok(())
}

fn draw_scatter(area: &DrawingArea<SVGBackend<'_>, Shift>, x: &[f64], y: &[f64]) -> DrawResult<()> {
    let (Some((x0, x1)), Some((y0, y1))) = (finite_range(x), finite_range(y)) else {
        return Ok(());
    };
    let mut chart = ChartBuilder::on(area)
        .caption("n_counts vs n_features", ("sans-serif", 16))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart.configure_mesh().x_desc("n_counts").y_desc("n_features").draw()?;
    chart.draw_series(
        x.iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(&a, &b)| Circle::new((a, b), 2, RGBColor(70, 70, 70).filled())),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_qc_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qc.svg");
        let n_counts = [1200.0, 900.0, 3000.0, 1500.0];
        let n_features = [400.0, 350.0, 900.0, 500.0];
        let percent_mt = [2.0, 5.0, 1.5, 30.0];
        let complexity = [0.84, 0.86, 0.85, f64::NAN];
        let qc = QcColumns {
            n_counts: &n_counts,
            n_features: &n_features,
            percent_mt: &percent_mt,
            log10_genes_per_umi: &complexity,
        };
        plot_qc(&qc, "QC before filtering", &path, (900, 600)).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }
}
