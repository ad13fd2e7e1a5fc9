//! Pipeline configuration
//!
//! Every threshold the pipeline applies lives here. Defaults reproduce the
//! fixed constants of a standard DRUG-seq analysis; a JSON file can override
//! any subset of fields.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::ConditionSource;
use crate::error::{PipelineError, Result};
use crate::io::DeMethod;
use crate::normalization::{SctParams, SizeFactorMethod};
use crate::qc::QcThresholds;
use crate::testing::PAdjustMethod;

/// Differential expression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeConfig {
    pub method: DeMethod,
    pub padj_method: PAdjustMethod,
    /// Adjusted p-value cutoff for the significant-gene set (strict)
    pub padj_cutoff: f64,
    /// Absolute log2 fold-change cutoff for the significant-gene set (strict)
    pub lfc_cutoff: f64,
    /// Minimum detection fraction in either group for a gene to be tested
    pub min_pct: f64,
    /// Size factors of the count-model method
    pub size_factors: SizeFactorMethod,
}

impl Default for DeConfig {
    fn default() -> Self {
        Self {
            method: DeMethod::Wilcoxon,
            padj_method: PAdjustMethod::BenjaminiHochberg,
            padj_cutoff: 0.05,
            lfc_cutoff: 0.5,
            min_pct: 0.1,
            size_factors: SizeFactorMethod::PosCounts,
        }
    }
}

/// Over-representation analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// GO gene sets in GMT format
    pub go_gmt: Option<PathBuf>,
    /// KEGG gene sets in GMT format
    pub kegg_gmt: Option<PathBuf>,
    /// Symbol -> database identifier table (e.g. Entrez IDs)
    pub id_map: Option<PathBuf>,
    pub min_gs_size: usize,
    pub max_gs_size: usize,
    pub pvalue_cutoff: f64,
    pub padj_cutoff: f64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            go_gmt: None,
            kegg_gmt: None,
            id_map: None,
            min_gs_size: 10,
            max_gs_size: 500,
            pvalue_cutoff: 0.05,
            padj_cutoff: 0.05,
        }
    }
}

/// Ligand activity settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LigandConfig {
    /// Prior ligand-target matrix; the stage is skipped without it
    pub ligand_target_matrix: Option<PathBuf>,
    /// Candidate ligands, one per line; defaults to every ligand in the prior
    pub ligands: Option<PathBuf>,
}

/// Plot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Number of top significant genes shown in the heatmap
    pub heatmap_top_n: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            heatmap_top_n: 30,
            width: 1000,
            height: 800,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 10x-style directory or dense count table
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub conditions: ConditionSource,
    /// Prefix of mitochondrial gene symbols (case-insensitive)
    pub mito_prefix: String,
    pub qc: QcThresholds,
    pub normalization: SctParams,
    pub de: DeConfig,
    pub enrichment: EnrichmentConfig,
    pub ligand: LigandConfig,
    pub plots: PlotConfig,
    /// Worker threads for per-gene computations (0 = automatic)
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data"),
            output_dir: PathBuf::from("."),
            conditions: ConditionSource::default(),
            mito_prefix: "MT-".to_string(),
            qc: QcThresholds::default(),
            normalization: SctParams::default(),
            de: DeConfig::default(),
            enrichment: EnrichmentConfig::default(),
            ligand: LigandConfig::default(),
            plots: PlotConfig::default(),
            threads: 0,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject thresholds that cannot be meaningful
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(PipelineError::InvalidConfig { reason });

        if !(0.0..=1.0).contains(&self.de.padj_cutoff) {
            return invalid(format!("de.padj_cutoff must be in [0, 1], got {}", self.de.padj_cutoff));
        }
        if self.de.lfc_cutoff < 0.0 || !self.de.lfc_cutoff.is_finite() {
            return invalid(format!("de.lfc_cutoff must be >= 0, got {}", self.de.lfc_cutoff));
        }
        if !(0.0..=1.0).contains(&self.de.min_pct) {
            return invalid(format!("de.min_pct must be in [0, 1], got {}", self.de.min_pct));
        }
        if !(0.0..=100.0).contains(&self.qc.max_percent_mt) {
            return invalid(format!(
                "qc.max_percent_mt must be in [0, 100], got {}",
                self.qc.max_percent_mt
            ));
        }
        if let Some(max) = self.qc.max_features {
            if max < self.qc.min_features {
                return invalid(format!(
                    "qc.max_features ({}) is below qc.min_features ({})",
                    max, self.qc.min_features
                ));
            }
        }
        if self.normalization.theta <= 0.0 {
            return invalid(format!("normalization.theta must be > 0, got {}", self.normalization.theta));
        }
        if self.enrichment.min_gs_size > self.enrichment.max_gs_size {
            return invalid(format!(
                "enrichment.min_gs_size ({}) exceeds enrichment.max_gs_size ({})",
                self.enrichment.min_gs_size, self.enrichment.max_gs_size
            ));
        }
        Ok(())
    }
}
