//! End-to-end DRUG-seq analysis
//!
//! Stages run in order: load and label, QC, normalization, differential
//! expression, enrichment, ligand activity, figures. Optional inputs that
//! are not configured skip their stage; an empty significant-gene set turns
//! every downstream stage into a no-op.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::data::{assign_conditions, DrugSeqDataSet};
use crate::enrichment::{enrich_de_results, IdMap};
use crate::error::Result;
use crate::io::{
    read_counts, read_gmt, read_id_map, read_ligand_target_matrix, read_name_list, write_table,
    DeResults, ResultsSummary,
};
use crate::ligand::predict_ligand_activities;
use crate::normalization::sctransform;
use crate::plot::{heatmap_top_genes, plot_qc, plot_volcano};
use crate::qc::{compute_qc_metrics, filter_dataset, qc_table, QcColumns, QcReport};
use crate::testing::differential_expression;

pub const QC_METRICS_CSV: &str = "qc_metrics.csv";
pub const QC_BEFORE_SVG: &str = "qc_before.svg";
pub const QC_AFTER_SVG: &str = "qc_after.svg";
pub const DE_RESULTS_CSV: &str = "de_results.csv";
pub const SIGNIFICANT_GENES_CSV: &str = "significant_genes.csv";
pub const ENRICHMENT_GO_CSV: &str = "enrichment_go.csv";
pub const ENRICHMENT_KEGG_CSV: &str = "enrichment_kegg.csv";
pub const LIGAND_ACTIVITY_CSV: &str = "ligand_activity.csv";
pub const VOLCANO_SVG: &str = "volcano_plot.svg";
pub const HEATMAP_SVG: &str = "heatmap_top_genes.svg";

/// What a pipeline run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub qc: QcReport,
    pub de_summary: ResultsSummary,
    /// Terms reported per database; `None` when the stage did not run
    pub go_terms: Option<usize>,
    pub kegg_terms: Option<usize>,
    pub ligands_scored: Option<usize>,
    pub written: Vec<PathBuf>,
}

/// Load counts, label cells and compute QC metrics
fn load_dataset(config: &PipelineConfig) -> Result<DrugSeqDataSet> {
    log::info!("Reading counts from: {}", config.input.display());
    let counts = read_counts(&config.input)?;
    log::info!("  {} genes x {} cells ({} non-zero)", counts.n_genes(), counts.n_cells(), counts.nnz());

    let mut dataset = DrugSeqDataSet::new(counts);
    assign_conditions(&mut dataset, &config.conditions)?;
    compute_qc_metrics(&mut dataset, &config.mito_prefix)?;
    Ok(dataset)
}

fn prepare_output_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn plot_size(config: &PipelineConfig) -> (u32, u32) {
    (config.plots.width, config.plots.height)
}

/// QC stage: metrics table, before/after figures, filtering
fn quality_control(
    dataset: &mut DrugSeqDataSet,
    config: &PipelineConfig,
    written: &mut Vec<PathBuf>,
) -> Result<QcReport> {
    let out = &config.output_dir;

    let table_path = out.join(QC_METRICS_CSV);
    write_table(&table_path, &qc_table(dataset, &config.qc)?)?;
    written.push(table_path);

    let before = out.join(QC_BEFORE_SVG);
    plot_qc(&QcColumns::from_dataset(dataset)?, "QC metrics before filtering", &before, plot_size(config))?;
    written.push(before);

    let report = filter_dataset(dataset, &config.qc)?;
    log::info!("{}", report);

    let after = out.join(QC_AFTER_SVG);
    plot_qc(&QcColumns::from_dataset(dataset)?, "QC metrics after filtering", &after, plot_size(config))?;
    written.push(after);
    Ok(report)
}

/// Run QC only, writing the metrics table and figures
pub fn run_qc(config: &PipelineConfig) -> Result<QcReport> {
    prepare_output_dir(&config.output_dir)?;
    let mut dataset = load_dataset(config)?;
    let mut written = Vec::new();
    quality_control(&mut dataset, config, &mut written)
}

/// Run the full analysis
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutcome> {
    config.validate()?;
    prepare_output_dir(&config.output_dir)?;
    let out = &config.output_dir;
    let mut written = Vec::new();

    log::info!("Step 1: Loading data");
    let mut dataset = load_dataset(config)?;

    log::info!("Step 2: Quality control");
    let qc = quality_control(&mut dataset, config, &mut written)?;

    log::info!("Step 3: Normalization");
    sctransform(&mut dataset, &config.normalization)?;

    log::info!("Step 4: Differential expression");
    let de = &config.de;
    let results = differential_expression(&dataset, de)?;
    let ordered = results.select(&results.order_by_padj());
    let de_path = out.join(DE_RESULTS_CSV);
    ordered.write_csv(&de_path)?;
    written.push(de_path);

    let significant = ordered.significant_indices(de.padj_cutoff, de.lfc_cutoff);
    let sig_path = out.join(SIGNIFICANT_GENES_CSV);
    ordered.select(&significant).write_csv(&sig_path)?;
    written.push(sig_path);

    let de_summary = ordered.summary(de.padj_cutoff, de.lfc_cutoff);
    println!("{}", de_summary);

    log::info!("Step 5: Pathway enrichment");
    let (go_terms, kegg_terms) = if significant.is_empty() {
        log::info!("No significant genes; skipping enrichment");
        (None, None)
    } else {
        run_enrichment(&ordered, &significant, config, &mut written)?
    };

    log::info!("Step 6: Ligand activity");
    let ligands_scored = if significant.is_empty() {
        log::info!("No significant genes; skipping ligand activity");
        None
    } else {
        run_ligand_activity(&ordered, &significant, config, &mut written)?
    };

    log::info!("Step 7: Figures");
    let size = plot_size(config);
    let volcano = out.join(VOLCANO_SVG);
    if plot_volcano(&ordered, de.padj_cutoff, de.lfc_cutoff, &volcano, size)? {
        written.push(volcano);
    }
    let heatmap = out.join(HEATMAP_SVG);
    if heatmap_top_genes(
        &dataset,
        &ordered,
        de.padj_cutoff,
        de.lfc_cutoff,
        config.plots.heatmap_top_n,
        &heatmap,
        size,
    )? {
        written.push(heatmap);
    }

    log::info!("Analysis complete: {} files written to {}", written.len(), out.display());
    Ok(PipelineOutcome {
        qc,
        de_summary,
        go_terms,
        kegg_terms,
        ligands_scored,
        written,
    })
}

fn run_enrichment(
    results: &DeResults,
    significant: &[usize],
    config: &PipelineConfig,
    written: &mut Vec<PathBuf>,
) -> Result<(Option<usize>, Option<usize>)> {
    let settings = &config.enrichment;
    let id_map: Option<IdMap> = match &settings.id_map {
        Some(path) => {
            log::info!("Reading identifier map from: {}", path.display());
            Some(read_id_map(path)?)
        }
        None => None,
    };

    let mut run = |gmt: &Option<PathBuf>, label: &str, file: &str| -> Result<Option<usize>> {
        let Some(gmt) = gmt else {
            log::info!("No {} gene sets configured; skipping {} enrichment", label, label);
            return Ok(None);
        };
        let gene_sets = read_gmt(gmt)?;
        log::info!("{}: {} gene sets from {}", label, gene_sets.len(), gmt.display());
        let terms = enrich_de_results(results, significant, &gene_sets, id_map.as_ref(), settings);
        log::info!("{}: {} enriched terms", label, terms.len());
        let path = config.output_dir.join(file);
        write_table(&path, &terms)?;
        written.push(path);
        Ok(Some(terms.len()))
    };

    let go = run(&settings.go_gmt, "GO", ENRICHMENT_GO_CSV)?;
    let kegg = run(&settings.kegg_gmt, "KEGG", ENRICHMENT_KEGG_CSV)?;
    Ok((go, kegg))
}

fn run_ligand_activity(
    results: &DeResults,
    significant: &[usize],
    config: &PipelineConfig,
    written: &mut Vec<PathBuf>,
) -> Result<Option<usize>> {
    let Some(prior_path) = &config.ligand.ligand_target_matrix else {
        log::info!("No ligand-target matrix configured; skipping ligand activity");
        return Ok(None);
    };
    let prior = read_ligand_target_matrix(prior_path)?;
    let ligands = match &config.ligand.ligands {
        Some(path) => read_name_list(path)?,
        None => prior.ligands().to_vec(),
    };

    let significant_genes: Vec<String> = significant
        .iter()
        .map(|&i| results.gene_symbols[i].clone())
        .collect();
    let background: Vec<String> = (0..results.n_genes())
        .filter(|&i| results.pvalues[i].is_finite())
        .map(|i| results.gene_symbols[i].clone())
        .collect();

    let activities = predict_ligand_activities(&prior, &significant_genes, &background, &ligands);
    if let Some(top) = activities.first() {
        log::info!("Top ligand: {} (corrected AUPR {:.4})", top.test_ligand, top.aupr_corrected);
    }
    let path = config.output_dir.join(LIGAND_ACTIVITY_CSV);
    write_table(&path, &activities)?;
    written.push(path);
    Ok(Some(activities.len()))
}
