//! Data structures for DRUG-seq analysis

mod condition;
mod count_matrix;
mod dataset;
mod metadata;

pub use condition::{assign_conditions, label_by_pattern, label_from_table, ConditionSource};
pub use count_matrix::CountMatrix;
pub use dataset::{DrugSeqDataSet, NormalizedAssay};
pub use metadata::{CellMetadata, Condition};
