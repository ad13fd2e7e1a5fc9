//! Command-line interface for drugseq

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "drugseq")]
#[command(version)]
#[command(about = "DRUG-seq analysis: QC, normalization, differential expression and enrichment")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options shared by `run` and `qc`
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// 10x-style directory or dense count table
    #[arg(short, long,
        long_help = "Count matrix input.\n\
            A directory is read as 10x output: matrix.mtx[.gz], features.tsv[.gz]\n\
            (or genes.tsv[.gz]) and barcodes.tsv[.gz].\n\
            A file is read as a dense table: first column = gene symbols,\n\
            header row = cell IDs, comma or tab delimited (auto-detected).")]
    pub input: Option<String>,

    /// JSON configuration file
    #[arg(long,
        long_help = "JSON configuration file. Missing fields take their defaults;\n\
            command-line flags override values from the file.\n\
            Print the defaults with `drugseq config`.")]
    pub config: Option<String>,

    /// Per-cell metadata table carrying the condition labels
    #[arg(short, long,
        long_help = "Per-cell metadata table (CSV/TSV).\n\
            Cells are joined on --id-column; --condition-column holds the labels.\n\
            Without this, cells are labelled by matching --drug-pattern and\n\
            --control-pattern against the cell identifiers.")]
    pub metadata: Option<String>,

    /// Metadata column with cell IDs [default: cell]
    #[arg(long, default_value = "cell")]
    pub id_column: String,

    /// Metadata column with condition labels [default: condition]
    #[arg(long, default_value = "condition")]
    pub condition_column: String,

    /// Label of drug-treated cells in the metadata [default: Drug]
    #[arg(long, default_value = "Drug")]
    pub drug_value: String,

    /// Label of control cells in the metadata [default: Control]
    #[arg(long, default_value = "Control")]
    pub control_value: String,

    /// Regex matching drug-treated cell IDs
    #[arg(long)]
    pub drug_pattern: Option<String>,

    /// Regex matching control cell IDs
    #[arg(long)]
    pub control_pattern: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Number of threads (0 = auto)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full analysis
    #[command(
        long_about = "Run the full DRUG-seq analysis\n\n\
            QC filtering, SCTransform-style normalization regressing out the\n\
            mitochondrial fraction, Drug vs Control differential expression,\n\
            GO/KEGG over-representation, optional ligand activity prediction,\n\
            volcano plot and heatmap.\n\n\
            Significant genes: adjusted p-value < 0.05 and |log2FC| > 0.5.",
        after_long_help = "\
Examples:
  # Labels from cell IDs
  drugseq run -i filtered_feature_bc_matrix/ -o results/

  # Labels from a metadata table, with enrichment
  drugseq run -i counts/ -m cells.csv --go-gmt go_bp.gmt --kegg-gmt kegg.gmt \\
    --id-map symbol2entrez.tsv -o results/

  # Ligand activity against a prior matrix
  drugseq run -i counts/ --ligand-target ligand_target.csv --ligands ligands.txt"
    )]
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// GO gene sets (GMT)
        #[arg(long)]
        go_gmt: Option<String>,

        /// KEGG gene sets (GMT)
        #[arg(long)]
        kegg_gmt: Option<String>,

        /// Symbol to database identifier table
        #[arg(long,
            long_help = "Two-column table mapping gene symbols to the identifiers used\n\
                in the GMT files (e.g. Entrez IDs). Without it, GMT files must\n\
                list gene symbols.")]
        id_map: Option<String>,

        /// Ligand-target prior matrix (rows targets, columns ligands)
        #[arg(long)]
        ligand_target: Option<String>,

        /// Candidate ligands, one per line
        #[arg(long)]
        ligands: Option<String>,

        /// Differential expression method
        #[arg(long,
            long_help = "Differential expression method.\n\
                wilcoxon:    rank-sum test on log-normalized data (default)\n\
                count-model: negative binomial Wald test on raw counts")]
        de_method: Option<String>,
    },

    /// Compute QC metrics and figures only
    #[command(
        long_about = "Compute per-cell QC metrics, write qc_metrics.csv and the\n\
            before/after filtering figures, and report what filtering removes.",
        after_long_help = "\
Examples:
  drugseq qc -i filtered_feature_bc_matrix/ -o qc/"
    )]
    Qc {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print the default configuration as JSON
    Config,
}
