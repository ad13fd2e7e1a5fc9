//! End-to-end runs over a synthetic DRUG-seq experiment

use std::fmt::Write as _;
use std::path::Path;

use drugseq::prelude::*;

const N_GENES: usize = 200;
const N_CELLS: usize = 20;

/// Deterministic small counts in 0..=4
fn noise(gene: usize, cell: usize) -> f64 {
    let h = (gene as u64 * 2_654_435_761 + cell as u64 * 40_503 + 17) % 97;
    (h % 5) as f64
}

fn symbol(gene: usize) -> String {
    match gene {
        0 => "MT-CO1".to_string(),
        1 => "MT-ND1".to_string(),
        g => format!("G{}", g),
    }
}

/// Counts for the healthy cells: genes 2..22 induced and 22..42 repressed in Drug
fn count(gene: usize, cell: usize, drug: bool) -> f64 {
    let base = 2.0 + noise(gene, cell);
    match gene {
        0 | 1 => 8.0 + noise(gene, cell),
        2..=21 if drug => base * 6.0,
        22..=41 if !drug => base * 6.0,
        _ => base,
    }
}

/// 10x directory with N_CELLS drug and N_CELLS control wells plus two failing wells
fn write_tenx(dir: &Path) {
    let mut barcodes = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    for c in 0..N_CELLS {
        barcodes.push(format!("drug_{}", c));
        columns.push((0..N_GENES).map(|g| count(g, c, true)).collect());
    }
    for c in 0..N_CELLS {
        barcodes.push(format!("control_{}", c));
        columns.push((0..N_GENES).map(|g| count(g, c + 100, false)).collect());
    }
    // mitochondria-dominated well
    barcodes.push("drug_mito".to_string());
    let mut mito: Vec<f64> = (0..N_GENES).map(|g| count(g, 7, true)).collect();
    mito[0] = 2000.0;
    columns.push(mito);
    // nearly empty well
    barcodes.push("control_empty".to_string());
    columns.push((0..N_GENES).map(|g| if g % 20 == 2 { 1.0 } else { 0.0 }).collect());

    let mut entries = String::new();
    let mut nnz = 0;
    for (j, column) in columns.iter().enumerate() {
        for (i, &v) in column.iter().enumerate() {
            if v > 0.0 {
                writeln!(entries, "{} {} {}", i + 1, j + 1, v as u64).unwrap();
                nnz += 1;
            }
        }
    }
    let header = format!(
        "%%MatrixMarket matrix coordinate integer general\n%\n{} {} {}\n",
        N_GENES,
        columns.len(),
        nnz
    );
    std::fs::write(dir.join("matrix.mtx"), header + &entries).unwrap();

    let features: String = (0..N_GENES)
        .map(|g| format!("ENSG{:05}\t{}\tGene Expression\n", g, symbol(g)))
        .collect();
    std::fs::write(dir.join("features.tsv"), features).unwrap();
    std::fs::write(dir.join("barcodes.tsv"), barcodes.join("\n") + "\n").unwrap();
}

fn gene_list(range: std::ops::Range<usize>) -> String {
    range.map(symbol).collect::<Vec<_>>().join("\t")
}

fn write_inputs(dir: &Path) {
    let go = format!(
        "GO:0000001\tinduced response\t{}\t{}\nGO:0000002\tunrelated process\t{}\n",
        gene_list(2..17),
        gene_list(100..105),
        gene_list(120..160)
    );
    std::fs::write(dir.join("go.gmt"), go).unwrap();

    let kegg = format!(
        "hsa00001\trepressed pathway\t{}\nhsa00002\tbackground pathway\t{}\n",
        gene_list(22..40),
        gene_list(160..190)
    );
    std::fs::write(dir.join("kegg.gmt"), kegg).unwrap();

    // L_up targets the induced genes, L_off targets unchanged ones
    let mut prior = String::from("target,L_up,L_off\n");
    for g in 2..120 {
        let up = if (2..22).contains(&g) { 0.9 } else { 0.01 };
        let off = if (80..100).contains(&g) { 0.9 } else { 0.01 };
        writeln!(prior, "{},{},{}", symbol(g), up, off).unwrap();
    }
    std::fs::write(dir.join("ligand_target.csv"), prior).unwrap();
}

fn config(input: &Path, output: &Path) -> PipelineConfig {
    PipelineConfig {
        input: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        qc: QcThresholds {
            min_counts: 200.0,
            min_features: 100.0,
            max_features: None,
            max_percent_mt: 20.0,
            min_log10_genes_per_umi: 0.5,
            min_cells_per_gene: 5,
        },
        ..Default::default()
    }
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let header = rdr.headers().unwrap().iter().map(|s| s.to_string()).collect();
    let rows = rdr
        .records()
        .map(|r| r.unwrap().iter().map(|s| s.to_string()).collect())
        .collect();
    (header, rows)
}

#[test]
fn test_full_pipeline() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_tenx(input.path());
    write_inputs(input.path());

    let mut config = config(input.path(), output.path());
    config.enrichment.go_gmt = Some(input.path().join("go.gmt"));
    config.enrichment.kegg_gmt = Some(input.path().join("kegg.gmt"));
    config.ligand.ligand_target_matrix = Some(input.path().join("ligand_target.csv"));

    let outcome = run_pipeline(&config).unwrap();

    assert_eq!(outcome.qc.cells_before, 2 * N_CELLS + 2);
    assert_eq!(outcome.qc.cells_after, 2 * N_CELLS);
    assert!(outcome.qc.genes_after <= outcome.qc.genes_before);
    assert_eq!(outcome.qc.failed_percent_mt, 1);
    assert_eq!(outcome.qc.failed_min_counts, 1);
    assert_eq!(outcome.de_summary.genes_tested, N_GENES);
    // genes 2..22 induced, 22..42 repressed, nothing else moves
    assert_eq!(outcome.de_summary.upregulated, 20);
    assert_eq!(outcome.de_summary.downregulated, 20);
    assert_eq!(outcome.go_terms, Some(1));
    assert_eq!(outcome.kegg_terms, Some(1));

    for file in [
        QC_METRICS_CSV,
        QC_BEFORE_SVG,
        QC_AFTER_SVG,
        DE_RESULTS_CSV,
        SIGNIFICANT_GENES_CSV,
        ENRICHMENT_GO_CSV,
        ENRICHMENT_KEGG_CSV,
        LIGAND_ACTIVITY_CSV,
        VOLCANO_SVG,
        HEATMAP_SVG,
    ] {
        let path = output.path().join(file);
        assert!(path.exists(), "missing {}", file);
        assert!(outcome.written.contains(&path));
    }

    // every significant row passes both cutoffs
    let (header, rows) = read_rows(&output.path().join(SIGNIFICANT_GENES_CSV));
    let gene = header.iter().position(|h| h == "gene").unwrap();
    let lfc = header.iter().position(|h| h == "log2_fold_change").unwrap();
    let padj = header.iter().position(|h| h == "padj").unwrap();
    assert_eq!(rows.len(), outcome.de_summary.significant);
    for row in &rows {
        assert!(row[padj].parse::<f64>().unwrap() < 0.05);
        assert!(row[lfc].parse::<f64>().unwrap().abs() > 0.5);
    }
    let genes: Vec<&str> = rows.iter().map(|r| r[gene].as_str()).collect();
    assert!(genes.contains(&"G2"));
    assert!(genes.contains(&"G30"));

    let (_, de_rows) = read_rows(&output.path().join(DE_RESULTS_CSV));
    assert_eq!(de_rows.len(), N_GENES);
    let top: Vec<&str> = de_rows[..rows.len()].iter().map(|r| r[gene].as_str()).collect();
    assert_eq!(top, genes);

    let (header, rows) = read_rows(&output.path().join(ENRICHMENT_GO_CSV));
    let id = header.iter().position(|h| h == "id").unwrap();
    assert_eq!(rows[0][id], "GO:0000001");
    assert!(rows.iter().all(|r| r[id] != "GO:0000002"));
    let (_, rows) = read_rows(&output.path().join(ENRICHMENT_KEGG_CSV));
    assert_eq!(rows[0][id], "hsa00001");

    let (header, rows) = read_rows(&output.path().join(LIGAND_ACTIVITY_CSV));
    let ligand = header.iter().position(|h| h == "test_ligand").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][ligand], "L_up");
    assert_eq!(outcome.ligands_scored, Some(2));
}

#[test]
fn test_empty_significant_set_skips_downstream() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_tenx(input.path());
    write_inputs(input.path());

    let mut config = config(input.path(), output.path());
    config.de.lfc_cutoff = 50.0;
    config.enrichment.go_gmt = Some(input.path().join("go.gmt"));
    config.ligand.ligand_target_matrix = Some(input.path().join("ligand_target.csv"));

    let outcome = run_pipeline(&config).unwrap();
    assert_eq!(outcome.de_summary.significant, 0);
    assert_eq!(outcome.go_terms, None);
    assert_eq!(outcome.ligands_scored, None);

    assert!(output.path().join(DE_RESULTS_CSV).exists());
    let (header, rows) = read_rows(&output.path().join(SIGNIFICANT_GENES_CSV));
    assert!(header.iter().any(|h| h == "padj"));
    assert!(rows.is_empty());
    for file in [ENRICHMENT_GO_CSV, LIGAND_ACTIVITY_CSV, VOLCANO_SVG, HEATMAP_SVG] {
        assert!(!output.path().join(file).exists(), "unexpected {}", file);
    }
}

#[test]
fn test_qc_only() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_tenx(input.path());

    let report = run_qc(&config(input.path(), output.path())).unwrap();
    assert_eq!(report.cells_after, 2 * N_CELLS);
    assert!(report.failed_min_counts >= 1);
    assert!(output.path().join(QC_METRICS_CSV).exists());
    assert!(output.path().join(QC_AFTER_SVG).exists());
    assert!(!output.path().join(DE_RESULTS_CSV).exists());
}

#[test]
fn test_missing_condition_group_is_error() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_tenx(input.path());

    let mut config = config(input.path(), output.path());
    config.conditions = ConditionSource::Pattern {
        drug: "drug".to_string(),
        control: "vehicle".to_string(),
    };
    assert!(matches!(
        run_pipeline(&config),
        Err(PipelineError::InvalidDesign { .. })
    ));
}

/// Cell metadata for the synthetic experiment
///
/// control_15..control_19 and control_empty are left out of the table, and
/// conditions use the table's own vocabulary.
fn write_cell_metadata(dir: &Path) -> std::path::PathBuf {
    let mut text = String::from("barcode,treatment,plate\n");
    for c in 0..N_CELLS {
        writeln!(text, "drug_{},compound,P{}", c, c % 2).unwrap();
    }
    for c in 0..15 {
        writeln!(text, "control_{},DMSO,P{}", c, c % 2).unwrap();
    }
    writeln!(text, "drug_mito,compound,P0").unwrap();
    let path = dir.join("cells.csv");
    std::fs::write(&path, text).unwrap();
    path
}

fn metadata_source(path: &Path) -> ConditionSource {
    ConditionSource::Metadata {
        path: path.display().to_string(),
        id_column: "barcode".to_string(),
        condition_column: "treatment".to_string(),
        drug_value: "compound".to_string(),
        control_value: "dmso".to_string(),
    }
}

#[test]
fn test_metadata_join_labels_cells() {
    let input = tempfile::tempdir().unwrap();
    write_tenx(input.path());
    let table = write_cell_metadata(input.path());

    let mut dataset = DrugSeqDataSet::new(read_counts(input.path()).unwrap());
    assign_conditions(&mut dataset, &metadata_source(&table)).unwrap();

    let (drug, control) = dataset.condition_groups();
    assert_eq!(drug.len(), N_CELLS + 1);
    assert_eq!(control.len(), 15);
    let meta = dataset.cell_metadata();
    assert_eq!(meta.n_unlabelled(), 6);

    let index = |id: &str| meta.cell_ids().iter().position(|c| c == id).unwrap();
    assert_eq!(meta.condition(index("control_3")), Some(Condition::Control));
    assert_eq!(meta.condition(index("control_17")), None);
    let plate = meta.categorical("plate").unwrap();
    assert_eq!(plate[index("drug_3")], "P1");
    assert_eq!(plate[index("control_empty")], "");
}

#[test]
fn test_pipeline_with_metadata_labels() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_tenx(input.path());
    let table = write_cell_metadata(input.path());

    let mut config = config(input.path(), output.path());
    config.conditions = metadata_source(&table);
    let outcome = run_pipeline(&config).unwrap();

    // unlabelled cells pass QC but take no part in testing
    assert_eq!(outcome.qc.cells_after, 2 * N_CELLS);
    assert_eq!(outcome.de_summary.upregulated, 20);
    assert_eq!(outcome.de_summary.downregulated, 20);

    let (header, rows) = read_rows(&output.path().join(QC_METRICS_CSV));
    let cell = header.iter().position(|h| h == "cell").unwrap();
    let condition = header.iter().position(|h| h == "condition").unwrap();
    let label = |id: &str| rows.iter().find(|r| r[cell] == id).unwrap()[condition].clone();
    assert_eq!(label("drug_0"), "Drug");
    assert_eq!(label("control_0"), "Control");
    assert_eq!(label("control_19"), "NA");
}
