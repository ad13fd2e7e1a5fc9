//! drugseq: DRUG-seq transcriptomic analysis in Rust
//!
//! Takes a gene x cell count matrix from a DRUG-seq screen through quality
//! control, variance-stabilizing normalization, differential expression of
//! Drug against Control cells, pathway over-representation and ligand
//! activity prediction, and writes tables and SVG figures.
//!
//! # Example
//!
//! ```ignore
//! use drugseq::prelude::*;
//!
//! let config = PipelineConfig {
//!     input: "filtered_feature_bc_matrix".into(),
//!     output_dir: "results".into(),
//!     ..Default::default()
//! };
//! let outcome = run_pipeline(&config)?;
//! println!("{}", outcome.de_summary);
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod enrichment;
pub mod error;
pub mod io;
pub mod ligand;
pub mod normalization;
pub mod pipeline;
pub mod plot;
pub mod qc;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DeConfig, EnrichmentConfig, LigandConfig, PipelineConfig, PlotConfig};
    pub use crate::data::{assign_conditions, Condition, ConditionSource, CountMatrix, DrugSeqDataSet};
    pub use crate::enrichment::{enrich_de_results, over_representation, EnrichmentResult, GeneSet, IdMap};
    pub use crate::error::{PipelineError, Result};
    pub use crate::io::{read_10x_dir, read_count_table, read_counts, read_gmt, DeMethod, DeResults};
    pub use crate::ligand::{predict_ligand_activities, LigandActivity, LigandTargetMatrix};
    pub use crate::normalization::{sctransform, SctParams};
    pub use crate::pipeline::{
        run_pipeline, run_qc, PipelineOutcome, DE_RESULTS_CSV, ENRICHMENT_GO_CSV, ENRICHMENT_KEGG_CSV,
        HEATMAP_SVG, LIGAND_ACTIVITY_CSV, QC_AFTER_SVG, QC_BEFORE_SVG, QC_METRICS_CSV, SIGNIFICANT_GENES_CSV,
        VOLCANO_SVG,
    };
    pub use crate::qc::{compute_qc_metrics, filter_dataset, QcReport, QcThresholds};
    pub use crate::testing::{differential_expression, PAdjustMethod};
}
