//! Delimited-text readers and writers (CSV or TSV, auto-detected)

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use ndarray::Array2;
use serde::Serialize;

use super::tenx::open_maybe_gz;
use crate::data::CountMatrix;
use crate::enrichment::IdMap;
use crate::error::{PipelineError, Result};
use crate::ligand::LigandTargetMatrix;

/// Detect the delimiter from the first non-empty line: tab wins over comma
fn detect_delimiter(path: &Path) -> Result<u8> {
    let reader = open_maybe_gz(path)?;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        return Ok(if line.contains('\t') { b'\t' } else { b',' });
    }
    Err(PipelineError::EmptyData {
        reason: format!("{} is empty", path.display()),
    })
}

fn delimited_reader(path: &Path, has_headers: bool) -> Result<csv::Reader<Box<dyn BufRead>>> {
    let delimiter = detect_delimiter(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .trim(csv::Trim::All)
        .from_reader(open_maybe_gz(path)?))
}

/// A generic string table with a header row
#[derive(Debug, Clone)]
pub struct MetadataTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MetadataTable {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                return Err(PipelineError::InvalidMetadata {
                    reason: format!(
                        "Row {} has {} columns, expected {}",
                        i + 1,
                        row.len(),
                        header.len()
                    ),
                });
            }
        }
        Ok(Self { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

/// Read a per-cell metadata table (one row per cell, header required)
///
/// `id_column` must be present in the header.
pub fn read_cell_metadata<P: AsRef<Path>>(path: P, id_column: &str) -> Result<MetadataTable> {
    let path = path.as_ref();
    let mut rdr = delimited_reader(path, true)?;
    let header: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
    if !header.iter().any(|h| h == id_column) {
        return Err(PipelineError::InvalidMetadata {
            reason: format!("{}: id column '{}' not found", path.display(), id_column),
        });
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    if rows.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("No rows found in metadata table {}", path.display()),
        });
    }

    MetadataTable::new(header, rows)
}

/// Read a dense count table
/// Expected format: first column is gene symbols, first row is cell IDs
pub fn read_count_table<P: AsRef<Path>>(path: P) -> Result<CountMatrix> {
    let path = path.as_ref();
    let mut rdr = delimited_reader(path, true)?;
    let header = rdr.headers()?.clone();
    if header.len() < 2 {
        return Err(PipelineError::InvalidCountMatrix {
            reason: "Not enough columns in header".to_string(),
        });
    }
    let cell_ids: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();
    let n_cells = cell_ids.len();

    let mut genes: Vec<String> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.len() != n_cells + 1 {
            return Err(PipelineError::InvalidCountMatrix {
                reason: format!("Row has {} columns, expected {}", record.len(), n_cells + 1),
            });
        }
        genes.push(record[0].to_string());
        for field in record.iter().skip(1) {
            let value = field.parse::<f64>().map_err(|_| PipelineError::InvalidCountMatrix {
                reason: format!("Invalid count value: {}", field),
            })?;
            values.push(value);
        }
    }

    if genes.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: "No genes found in count table".to_string(),
        });
    }

    let dense = Array2::from_shape_vec((genes.len(), n_cells), values).map_err(|e| {
        PipelineError::InvalidCountMatrix {
            reason: e.to_string(),
        }
    })?;
    CountMatrix::from_dense(&dense, genes.clone(), genes, cell_ids)
}

/// Read a symbol -> identifier mapping (header row, first two columns used)
pub fn read_id_map<P: AsRef<Path>>(path: P) -> Result<IdMap> {
    let path = path.as_ref();
    let mut rdr = delimited_reader(path, true)?;
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for record in rdr.records() {
        let record = record?;
        let (Some(symbol), Some(id)) = (record.get(0), record.get(1)) else {
            return Err(PipelineError::InvalidInput {
                reason: format!("{}: identifier map rows need two columns", path.display()),
            });
        };
        if symbol.is_empty() || id.is_empty() || id == "NA" {
            continue;
        }
        let ids = map.entry(symbol.to_string()).or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    if map.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("No mappings found in {}", path.display()),
        });
    }
    Ok(IdMap::new(map))
}

/// Read a ligand-target prior: rows are target genes, columns are ligands
pub fn read_ligand_target_matrix<P: AsRef<Path>>(path: P) -> Result<LigandTargetMatrix> {
    let path = path.as_ref();
    let mut rdr = delimited_reader(path, true)?;
    let header = rdr.headers()?.clone();
    let ligands: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();
    if ligands.is_empty() {
        return Err(PipelineError::InvalidInput {
            reason: format!("{}: ligand-target matrix has no ligand columns", path.display()),
        });
    }

    let mut targets = Vec::new();
    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.len() != ligands.len() + 1 {
            return Err(PipelineError::InvalidInput {
                reason: format!(
                    "{}: row has {} columns, expected {}",
                    path.display(),
                    record.len(),
                    ligands.len() + 1
                ),
            });
        }
        targets.push(record[0].to_string());
        for field in record.iter().skip(1) {
            values.push(field.parse::<f64>().map_err(|_| PipelineError::InvalidInput {
                reason: format!("{}: invalid score '{}'", path.display(), field),
            })?);
        }
    }

    let scores = Array2::from_shape_vec((targets.len(), ligands.len()), values).map_err(|e| {
        PipelineError::InvalidInput {
            reason: e.to_string(),
        }
    })?;
    LigandTargetMatrix::new(targets, ligands, scores)
}

/// Read a newline-separated list, ignoring blank lines and `#` comments
pub fn read_name_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = open_maybe_gz(path)?;
    let mut names = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        names.push(name.to_string());
    }
    Ok(names)
}

/// A row type written by [`write_table`]
///
/// `COLUMNS` lists the serialized field names in order.
pub trait TableRow: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// Write rows as CSV; the header is written even when `rows` is empty
pub fn write_table<P: AsRef<Path>, T: TableRow>(path: P, rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_count_table_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene\tw1\tw2\tw3").unwrap();
        writeln!(file, "GAPDH\t100\t0\t150").unwrap();
        writeln!(file, "ACTB\t50\t75\t0").unwrap();

        let matrix = read_count_table(file.path()).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_cells(), 3);
        assert_eq!(matrix.nnz(), 4);
    }

    #[test]
    fn test_read_count_table_bad_value() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene,w1").unwrap();
        writeln!(file, "GAPDH,abc").unwrap();
        assert!(read_count_table(file.path()).is_err());
    }

    #[test]
    fn test_read_cell_metadata_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cell,condition").unwrap();
        writeln!(file, "w1,Drug").unwrap();
        writeln!(file, "\"w2\",Control").unwrap();

        let table = read_cell_metadata(file.path(), "cell").unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column_index("condition"), Some(1));
        assert_eq!(table.rows()[1][0], "w2");

        assert!(matches!(
            read_cell_metadata(file.path(), "barcode"),
            Err(PipelineError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn test_read_id_map_skips_na() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SYMBOL\tENTREZID").unwrap();
        writeln!(file, "TP53\t7157").unwrap();
        writeln!(file, "FAKE\tNA").unwrap();
        writeln!(file, "TP53\t7157").unwrap();

        let map = read_id_map(file.path()).unwrap();
        assert_eq!(map.lookup("TP53"), Some(&["7157".to_string()][..]));
        assert_eq!(map.lookup("FAKE"), None);
    }

    #[test]
    fn test_read_ligand_target_matrix() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "target,TNF,IL6").unwrap();
        writeln!(file, "NFKBIA,0.9,0.1").unwrap();
        writeln!(file, "SOCS3,0.2,0.8").unwrap();

        let prior = read_ligand_target_matrix(file.path()).unwrap();
        assert_eq!(prior.ligands(), &["TNF", "IL6"]);
        assert_eq!(prior.targets(), &["NFKBIA", "SOCS3"]);
    }

    #[test]
    fn test_read_name_list() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# ligands").unwrap();
        writeln!(file, "TNF").unwrap();
        writeln!(file).unwrap();
        writeln!(file, " IL6 ").unwrap();
        assert_eq!(read_name_list(file.path()).unwrap(), vec!["TNF", "IL6"]);
    }

    /// Header serde derives for one row, as the default csv writer emits it
    fn derived_header<T: TableRow>(row: &T) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let bytes = writer.into_inner().unwrap();
        String::from_utf8(bytes).unwrap().lines().next().unwrap().to_string()
    }

    #[test]
    fn test_table_columns_match_serialized_fields() {
        use crate::enrichment::EnrichmentResult;
        use crate::ligand::LigandActivity;
        use crate::qc::QcMetricsRow;

        let term = EnrichmentResult {
            id: "GO:1".into(),
            description: "d".into(),
            gene_ratio: "1/2".into(),
            bg_ratio: "3/4".into(),
            pvalue: 0.01,
            padj: 0.02,
            genes: "A".into(),
            count: 1,
        };
        assert_eq!(derived_header(&term), EnrichmentResult::COLUMNS.join(","));

        let ligand = LigandActivity {
            test_ligand: "TNF".into(),
            auroc: 0.5,
            aupr: 0.1,
            aupr_corrected: 0.0,
            pearson: 0.0,
            rank: 1,
        };
        assert_eq!(derived_header(&ligand), LigandActivity::COLUMNS.join(","));

        let qc = QcMetricsRow {
            cell: "w1".into(),
            condition: "Drug".into(),
            n_counts: 10.0,
            n_features: 5.0,
            percent_mt: 1.0,
            log10_genes_per_umi: 0.7,
            passed: true,
        };
        assert_eq!(derived_header(&qc), QcMetricsRow::COLUMNS.join(","));
    }

    #[test]
    fn test_write_table_without_rows_keeps_header() {
        use crate::ligand::LigandActivity;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ligand_activity.csv");
        write_table::<_, LigandActivity>(&path, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "test_ligand,auroc,aupr,aupr_corrected,pearson,rank\n");
        let mut rdr = csv::Reader::from_path(&path).unwrap();
        assert_eq!(rdr.headers().unwrap().len(), 6);
        assert_eq!(rdr.records().count(), 0);
    }
}
