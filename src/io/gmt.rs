//! GMT gene-set files: `name <TAB> description <TAB> gene <TAB> gene ...`

use std::io::BufRead;
use std::path::Path;

use super::tenx::open_maybe_gz;
use crate::enrichment::GeneSet;
use crate::error::{PipelineError, Result};

/// Read all gene sets from a GMT file
pub fn read_gmt<P: AsRef<Path>>(path: P) -> Result<Vec<GeneSet>> {
    let path = path.as_ref();
    let reader = open_maybe_gz(path)?;
    let mut sets = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let name = fields.next().unwrap_or("").trim();
        let description = fields.next().ok_or_else(|| PipelineError::InvalidGeneSets {
            reason: format!("{}:{}: expected at least two tab-separated fields", path.display(), line_no + 1),
        })?;
        if name.is_empty() {
            return Err(PipelineError::InvalidGeneSets {
                reason: format!("{}:{}: empty gene set name", path.display(), line_no + 1),
            });
        }
        let genes: Vec<String> = fields
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(|g| g.to_string())
            .collect();
        sets.push(GeneSet::new(name, description.trim(), genes));
    }

    if sets.is_empty() {
        return Err(PipelineError::InvalidGeneSets {
            reason: format!("{} contains no gene sets", path.display()),
        });
    }
    log::debug!("Read {} gene sets from {}", sets.len(), path.display());
    Ok(sets)
}
