//! Ligand activity prediction
//!
//! Each candidate ligand's regulatory potential over the background genes is
//! scored as a classifier of membership in the significant gene set.

mod prior;

pub use prior::LigandTargetMatrix;

use std::collections::HashSet;

use rayon::prelude::*;
use serde::Serialize;

use crate::io::TableRow;
use crate::stats::{average_ranks, pearson};

/// Activity metrics of one ligand
#[derive(Debug, Clone, Serialize)]
pub struct LigandActivity {
    pub test_ligand: String,
    pub auroc: f64,
    pub aupr: f64,
    /// AUPR minus the fraction of positives, 0 for a random predictor
    pub aupr_corrected: f64,
    pub pearson: f64,
    pub rank: usize,
}

impl TableRow for LigandActivity {
    const COLUMNS: &'static [&'static str] =
        &["test_ligand", "auroc", "aupr", "aupr_corrected", "pearson", "rank"];
}

/// Area under the ROC curve via the rank-sum identity; ties count one half
pub fn auroc(scores: &[f64], labels: &[bool]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return f64::NAN;
    }
    let (ranks, _) = average_ranks(scores);
    let rank_sum: f64 = ranks.iter().zip(labels).filter(|(_, &l)| l).map(|(r, _)| r).sum();
    let n_pos = n_pos as f64;
    (rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64)
}

/// Area under the precision-recall curve, as average precision
///
/// Tied scores enter the curve together as one step.
pub fn aupr(scores: &[f64], labels: &[bool]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    if n_pos == 0 {
        return f64::NAN;
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut area = 0.0;
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        let mut group_tp = 0usize;
        while j < order.len() && scores[order[j]] == scores[order[i]] {
            if labels[order[j]] {
                group_tp += 1;
            }
            j += 1;
        }
        tp += group_tp;
        seen += j - i;
        if group_tp > 0 {
            area += (group_tp as f64 / n_pos as f64) * (tp as f64 / seen as f64);
        }
        i = j;
    }
    area
}

/// Score candidate ligands by how well their prior predicts `significant`
///
/// `background` is every tested gene; only genes present in the prior take
/// part. Ligands missing from the prior are skipped. The result is ordered
/// by corrected AUPR, ties broken by Pearson correlation, and is empty when
/// no significant gene overlaps the prior.
pub fn predict_ligand_activities(
    prior: &LigandTargetMatrix,
    significant: &[String],
    background: &[String],
    ligands: &[String],
) -> Vec<LigandActivity> {
    let positives: HashSet<&str> = significant.iter().map(|s| s.as_str()).collect();
    let mut seen = HashSet::new();
    let rows: Vec<(usize, bool)> = background
        .iter()
        .filter(|g| seen.insert(g.as_str()))
        .filter_map(|g| prior.target_index(g).map(|i| (i, positives.contains(g.as_str()))))
        .collect();
    let labels: Vec<bool> = rows.iter().map(|&(_, l)| l).collect();
    let n_pos = labels.iter().filter(|&&l| l).count();
    if n_pos == 0 {
        log::info!("No significant genes in the ligand-target prior; skipping ligand activity");
        return Vec::new();
    }
    log::info!(
        "Ligand activity: {} background genes in prior, {} of them significant",
        rows.len(),
        n_pos
    );

    let columns: Vec<(usize, &String)> = ligands
        .iter()
        .filter_map(|l| match prior.ligand_index(l) {
            Some(idx) => Some((idx, l)),
            None => {
                log::warn!("Ligand '{}' not in the ligand-target prior; skipped", l);
                None
            }
        })
        .collect();

    let response: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
    let positive_fraction = n_pos as f64 / labels.len() as f64;
    let scores = prior.scores();

    let mut activities: Vec<LigandActivity> = columns
        .par_iter()
        .map(|&(col, name)| {
            let predictions: Vec<f64> = rows.iter().map(|&(row, _)| scores[[row, col]]).collect();
            let aupr = aupr(&predictions, &labels);
            LigandActivity {
                test_ligand: name.clone(),
                auroc: auroc(&predictions, &labels),
                aupr,
                aupr_corrected: aupr - positive_fraction,
                pearson: pearson(&predictions, &response),
                rank: 0,
            }
        })
        .collect();

    let key = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v };
    activities.sort_by(|a, b| {
        key(b.aupr_corrected)
            .total_cmp(&key(a.aupr_corrected))
            .then_with(|| key(b.pearson).total_cmp(&key(a.pearson)))
    });
    for (i, activity) in activities.iter_mut().enumerate() {
        activity.rank = i + 1;
    }
    activities
}
