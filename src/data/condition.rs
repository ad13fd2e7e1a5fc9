//! Attaching Drug / Control labels to cells

use std::collections::HashMap;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use super::{Condition, DrugSeqDataSet};
use crate::error::{PipelineError, Result};
use crate::io::MetadataTable;

/// Where condition labels come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ConditionSource {
    /// Case-insensitive regex match on the cell identifier
    Pattern { drug: String, control: String },
    /// Join an external per-cell table on the cell identifier
    Metadata {
        path: String,
        id_column: String,
        condition_column: String,
        drug_value: String,
        control_value: String,
    },
}

impl Default for ConditionSource {
    fn default() -> Self {
        ConditionSource::Pattern {
            drug: "drug".to_string(),
            control: "control".to_string(),
        }
    }
}

/// Label cells by matching their identifiers
///
/// The drug pattern wins when both patterns match.
pub fn label_by_pattern(cell_ids: &[String], drug: &str, control: &str) -> Result<Vec<Option<Condition>>> {
    let drug_re = RegexBuilder::new(drug).case_insensitive(true).build()?;
    let control_re = RegexBuilder::new(control).case_insensitive(true).build()?;

    Ok(cell_ids
        .iter()
        .map(|id| {
            if drug_re.is_match(id) {
                Some(Condition::Drug)
            } else if control_re.is_match(id) {
                Some(Condition::Control)
            } else {
                None
            }
        })
        .collect())
}

/// Label cells from a metadata table and carry its remaining columns along
///
/// Cells missing from the table stay unlabelled; their joined columns are
/// filled with empty strings.
pub fn label_from_table(
    dataset: &mut DrugSeqDataSet,
    table: &MetadataTable,
    id_column: &str,
    condition_column: &str,
    drug_value: &str,
    control_value: &str,
) -> Result<()> {
    let id_idx = table.column_index(id_column).ok_or_else(|| PipelineError::InvalidMetadata {
        reason: format!("id column '{}' not found in metadata table", id_column),
    })?;
    let cond_idx = table
        .column_index(condition_column)
        .ok_or_else(|| PipelineError::InvalidMetadata {
            reason: format!("condition column '{}' not found in metadata table", condition_column),
        })?;

    let mut row_of: HashMap<&str, usize> = HashMap::with_capacity(table.n_rows());
    for (r, row) in table.rows().iter().enumerate() {
        if row_of.insert(row[id_idx].as_str(), r).is_some() {
            log::warn!("Duplicate cell '{}' in metadata table; using the last row", row[id_idx]);
        }
    }

    let cell_ids = dataset.cell_metadata().cell_ids().to_vec();
    let mut conditions = Vec::with_capacity(cell_ids.len());
    let mut missing = 0usize;
    let mut unknown_values: HashMap<String, usize> = HashMap::new();

    for id in &cell_ids {
        match row_of.get(id.as_str()) {
            Some(&r) => {
                let value = table.rows()[r][cond_idx].as_str();
                if value.eq_ignore_ascii_case(drug_value) {
                    conditions.push(Some(Condition::Drug));
                } else if value.eq_ignore_ascii_case(control_value) {
                    conditions.push(Some(Condition::Control));
                } else {
                    *unknown_values.entry(value.to_string()).or_insert(0) += 1;
                    conditions.push(None);
                }
            }
            None => {
                missing += 1;
                conditions.push(None);
            }
        }
    }

    if missing == cell_ids.len() {
        return Err(PipelineError::InvalidMetadata {
            reason: "no cell in the count matrix appears in the metadata table".to_string(),
        });
    }
    if missing > 0 {
        log::warn!("{} cells not found in metadata table", missing);
    }
    for (value, n) in &unknown_values {
        log::warn!("{} cells have unrecognised condition value '{}'", n, value);
    }

    let metadata = dataset.cell_metadata_mut();
    metadata.set_conditions(conditions)?;

    for (c, name) in table.header().iter().enumerate() {
        if c == id_idx || c == cond_idx {
            continue;
        }
        let values: Vec<String> = cell_ids
            .iter()
            .map(|id| {
                row_of
                    .get(id.as_str())
                    .map(|&r| table.rows()[r][c].clone())
                    .unwrap_or_default()
            })
            .collect();
        metadata.add_categorical(name, values)?;
    }

    Ok(())
}

/// Attach condition labels according to the configured source
pub fn assign_conditions(dataset: &mut DrugSeqDataSet, source: &ConditionSource) -> Result<()> {
    match source {
        ConditionSource::Pattern { drug, control } => {
            log::info!("Labelling cells by identifier pattern (drug: /{}/, control: /{}/)", drug, control);
            let labels = label_by_pattern(dataset.cell_metadata().cell_ids(), drug, control)?;
            dataset.cell_metadata_mut().set_conditions(labels)?;
        }
        ConditionSource::Metadata {
            path,
            id_column,
            condition_column,
            drug_value,
            control_value,
        } => {
            log::info!("Joining cell metadata from: {}", path);
            let table = crate::io::read_cell_metadata(path, id_column)?;
            label_from_table(dataset, &table, id_column, condition_column, drug_value, control_value)?;
        }
    }

    let (drug, control) = dataset.condition_groups();
    log::info!(
        "  {} Drug cells, {} Control cells, {} unlabelled",
        drug.len(),
        control.len(),
        dataset.cell_metadata().n_unlabelled()
    );
    Ok(())
}
