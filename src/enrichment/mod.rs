//! Pathway over-representation analysis of the significant genes

mod gene_sets;
mod ora;

pub use gene_sets::{GeneSet, IdMap};
pub use ora::{hypergeometric_upper_tail, over_representation, EnrichmentResult};

use std::collections::{HashMap, HashSet};

use crate::config::EnrichmentConfig;
use crate::io::DeResults;

/// Run over-representation analysis for the significant rows of `results`
///
/// The universe is every tested gene (finite p-value) that is annotated in
/// `gene_sets`. Symbols are translated through `id_map` when one is given;
/// otherwise gene sets must use symbols.
pub fn enrich_de_results(
    results: &DeResults,
    significant: &[usize],
    gene_sets: &[GeneSet],
    id_map: Option<&IdMap>,
    config: &EnrichmentConfig,
) -> Vec<EnrichmentResult> {
    if significant.is_empty() {
        log::info!("No significant genes; skipping enrichment");
        return Vec::new();
    }

    let tested: Vec<&str> = (0..results.n_genes())
        .filter(|&i| results.pvalues[i].is_finite())
        .map(|i| results.gene_symbols[i].as_str())
        .collect();
    let selected: Vec<&str> = significant
        .iter()
        .map(|&i| results.gene_symbols[i].as_str())
        .collect();

    let (universe_ids, selected_ids, labels) = match id_map {
        Some(map) => {
            let universe = map.translate(&tested);
            let chosen = map.translate(&selected);
            let labels: HashMap<String, String> = chosen
                .iter()
                .map(|(id, symbol)| (id.clone(), symbol.to_string()))
                .collect();
            (
                universe.into_iter().map(|(id, _)| id).collect::<Vec<_>>(),
                chosen.into_iter().map(|(id, _)| id).collect::<Vec<_>>(),
                Some(labels),
            )
        }
        None => (
            tested.iter().map(|s| s.to_string()).collect(),
            selected.iter().map(|s| s.to_string()).collect(),
            None,
        ),
    };

    let annotated: HashSet<&str> = gene_sets
        .iter()
        .flat_map(|gs| gs.genes.iter().map(|g| g.as_str()))
        .collect();
    let universe: Vec<String> = universe_ids
        .into_iter()
        .filter(|g| annotated.contains(g.as_str()))
        .collect();
    log::debug!(
        "Enrichment universe: {} annotated genes, {} selected",
        universe.len(),
        selected_ids.len()
    );

    over_representation(&selected_ids, &universe, gene_sets, config, labels.as_ref())
}
