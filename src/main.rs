//! drugseq command-line interface

use std::path::PathBuf;

use clap::Parser;
use log::{info, LevelFilter};

use drugseq::cli::{Cli, Commands, InputArgs};
use drugseq::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["run", "qc", "config", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("drugseq {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            input,
            go_gmt,
            kegg_gmt,
            id_map,
            ligand_target,
            ligands,
            de_method,
        }) => run_analysis(
            &input,
            go_gmt,
            kegg_gmt,
            id_map,
            ligand_target,
            ligands,
            de_method.as_deref(),
        ),
        Some(Commands::Qc { input }) => run_qc_only(&input),
        Some(Commands::Config) => print_default_config(),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_no_args() {
    println!("drugseq v{}", VERSION);
    println!("Run `drugseq -h` for usage or `drugseq --help` for detailed information.");
}

fn print_short_help() {
    println!("drugseq v{}", VERSION);
    println!();
    println!("Usage: drugseq <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run     Run the full DRUG-seq analysis");
    println!("  qc      Compute QC metrics and figures only");
    println!("  config  Print the default configuration as JSON");
    println!();
    println!("Run `drugseq <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("drugseq v{}", VERSION);
    println!("DRUG-seq transcriptomic analysis: Drug vs Control");
    println!();
    println!("Usage: drugseq <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run     Run the full DRUG-seq analysis");
    println!("            - QC filtering (UMIs, genes, mitochondrial %, complexity)");
    println!("            - Pearson-residual normalization regressing out percent_mt");
    println!("            - Wilcoxon or negative binomial differential expression");
    println!("            - GO/KEGG over-representation analysis");
    println!("            - Ligand activity prediction from a prior matrix");
    println!("            - Volcano plot and top-gene heatmap");
    println!("  qc      Compute QC metrics and figures only");
    println!("  config  Print the default configuration as JSON");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  drugseq run -i filtered_feature_bc_matrix/ -o results/");
    println!();
    println!("  drugseq run -i counts/ -m cells.csv --go-gmt go_bp.gmt --kegg-gmt kegg.gmt \\");
    println!("    --id-map symbol2entrez.tsv -o results/");
    println!();
    println!("  drugseq config > drugseq.json");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

/// Load the configuration file (or defaults) and apply the shared flags
fn build_config(args: &InputArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    if let Some(input) = &args.input {
        config.input = PathBuf::from(input);
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = PathBuf::from(dir);
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    if let Some(path) = &args.metadata {
        config.conditions = ConditionSource::Metadata {
            path: path.clone(),
            id_column: args.id_column.clone(),
            condition_column: args.condition_column.clone(),
            drug_value: args.drug_value.clone(),
            control_value: args.control_value.clone(),
        };
    } else if args.drug_pattern.is_some() || args.control_pattern.is_some() {
        // keep whichever pattern the configuration already sets
        let (drug, control) = match &config.conditions {
            ConditionSource::Pattern { drug, control } => (drug.clone(), control.clone()),
            ConditionSource::Metadata { .. } => ("drug".to_string(), "control".to_string()),
        };
        config.conditions = ConditionSource::Pattern {
            drug: args.drug_pattern.clone().unwrap_or(drug),
            control: args.control_pattern.clone().unwrap_or(control),
        };
    }

    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .ok();
    }

    Ok(config)
}

fn run_analysis(
    args: &InputArgs,
    go_gmt: Option<String>,
    kegg_gmt: Option<String>,
    id_map: Option<String>,
    ligand_target: Option<String>,
    ligands: Option<String>,
    de_method: Option<&str>,
) -> Result<()> {
    let mut config = build_config(args)?;

    if let Some(path) = go_gmt {
        config.enrichment.go_gmt = Some(PathBuf::from(path));
    }
    if let Some(path) = kegg_gmt {
        config.enrichment.kegg_gmt = Some(PathBuf::from(path));
    }
    if let Some(path) = id_map {
        config.enrichment.id_map = Some(PathBuf::from(path));
    }
    if let Some(path) = ligand_target {
        config.ligand.ligand_target_matrix = Some(PathBuf::from(path));
    }
    if let Some(path) = ligands {
        config.ligand.ligands = Some(PathBuf::from(path));
    }
    if let Some(method) = de_method {
        config.de.method = match method {
            "wilcoxon" => DeMethod::Wilcoxon,
            "count-model" => DeMethod::CountModel,
            other => {
                return Err(PipelineError::InvalidInput {
                    reason: format!("Unknown DE method '{}'. Use 'wilcoxon' or 'count-model'.", other),
                })
            }
        };
    }

    let outcome = run_pipeline(&config)?;
    for path in &outcome.written {
        info!("  {}", path.display());
    }
    Ok(())
}

fn run_qc_only(args: &InputArgs) -> Result<()> {
    let config = build_config(args)?;
    let report = run_qc(&config)?;
    println!("{}", report);
    Ok(())
}

fn print_default_config() -> Result<()> {
    println!("{}", PipelineConfig::default().to_json()?);
    Ok(())
}
