//! Reading 10x-style feature-barcode matrix directories
//!
//! A directory holds `matrix.mtx`, `features.tsv` (or the older `genes.tsv`)
//! and `barcodes.tsv`, each optionally gzip-compressed.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use sprs::TriMat;

use crate::data::CountMatrix;
use crate::error::{PipelineError, Result};

/// Open a file, transparently decompressing `.gz`
pub(crate) fn open_maybe_gz<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let is_gz = path.extension().map_or(false, |ext| ext == "gz");
    if is_gz {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Find the first existing file among `names` (plain or gzipped) inside `dir`
fn find_member(dir: &Path, names: &[&str]) -> Result<PathBuf> {
    for name in names {
        for candidate in [dir.join(name), dir.join(format!("{}.gz", name))] {
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(PipelineError::InvalidCountMatrix {
        reason: format!("none of {:?} found in {}", names, dir.display()),
    })
}

/// Read feature IDs and symbols; a missing symbol column falls back to the ID
fn read_features(path: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(open_maybe_gz(path)?);

    let mut ids = Vec::new();
    let mut symbols = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let id = record.get(0).unwrap_or("").trim().to_string();
        if id.is_empty() {
            continue;
        }
        let symbol = record
            .get(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(id.as_str())
            .to_string();
        ids.push(id);
        symbols.push(symbol);
    }
    Ok((ids, symbols))
}

fn read_barcodes(path: &Path) -> Result<Vec<String>> {
    let reader = open_maybe_gz(path)?;
    let mut barcodes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let barcode = line.split('\t').next().unwrap_or("").trim();
        if !barcode.is_empty() {
            barcodes.push(barcode.to_string());
        }
    }
    Ok(barcodes)
}

/// Field type from the `%%MatrixMarket matrix coordinate <field> <symmetry>` banner
fn matrix_market_field(path: &Path) -> Result<String> {
    let mut banner = String::new();
    open_maybe_gz(path)?.read_line(&mut banner)?;
    let mut tokens = banner.split_whitespace();
    if !tokens.next().map_or(false, |t| t.eq_ignore_ascii_case("%%MatrixMarket")) {
        return Err(PipelineError::InvalidCountMatrix {
            reason: format!("{}: missing %%MatrixMarket banner", path.display()),
        });
    }
    tokens
        .nth(2)
        .map(|field| field.to_ascii_lowercase())
        .ok_or_else(|| PipelineError::InvalidCountMatrix {
            reason: format!("{}: incomplete %%MatrixMarket banner", path.display()),
        })
}

/// Read a coordinate MatrixMarket file as `f64` triplets
///
/// sprs only loads `integer` files into integer matrices, so those are read
/// as `i64` and widened.
fn read_matrix_market(path: &Path) -> Result<TriMat<f64>> {
    let invalid = |e: sprs::io::IoError| PipelineError::InvalidCountMatrix {
        reason: format!("{}: {}", path.display(), e),
    };
    let mut reader = open_maybe_gz(path)?;
    if matrix_market_field(path)? != "integer" {
        return sprs::io::read_matrix_market_from_bufread(&mut reader).map_err(invalid);
    }

    let ints: TriMat<i64> = sprs::io::read_matrix_market_from_bufread(&mut reader).map_err(invalid)?;
    let mut tri = TriMat::with_capacity((ints.rows(), ints.cols()), ints.nnz());
    for ((&row, &col), &value) in ints.row_inds().iter().zip(ints.col_inds()).zip(ints.data()) {
        tri.add_triplet(row, col, value as f64);
    }
    Ok(tri)
}

/// Read a 10x-style directory into a genes x cells count matrix
pub fn read_10x_dir<P: AsRef<Path>>(dir: P) -> Result<CountMatrix> {
    let dir = dir.as_ref();
    let matrix_path = find_member(dir, &["matrix.mtx"])?;
    let features_path = find_member(dir, &["features.tsv", "genes.tsv"])?;
    let barcodes_path = find_member(dir, &["barcodes.tsv"])?;

    log::debug!("Reading features from {}", features_path.display());
    let (gene_ids, gene_symbols) = read_features(&features_path)?;
    log::debug!("Reading barcodes from {}", barcodes_path.display());
    let cell_ids = read_barcodes(&barcodes_path)?;

    log::debug!("Reading MatrixMarket counts from {}", matrix_path.display());
    let tri = read_matrix_market(&matrix_path)?;

    if tri.rows() != gene_ids.len() || tri.cols() != cell_ids.len() {
        return Err(PipelineError::DimensionMismatch {
            expected: format!("{} x {} (features x barcodes)", gene_ids.len(), cell_ids.len()),
            got: format!("{} x {} in matrix.mtx", tri.rows(), tri.cols()),
        });
    }

    if gene_ids.is_empty() || cell_ids.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("{} contains no features or no barcodes", dir.display()),
        });
    }

    CountMatrix::new(tri.to_csr(), gene_ids, gene_symbols, cell_ids)
}
