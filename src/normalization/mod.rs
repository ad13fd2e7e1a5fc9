//! Normalization of single-cell count data

mod sctransform;
mod size_factors;

pub use sctransform::{pearson_residual, sctransform, SctParams};
pub use size_factors::{estimate_size_factors, SizeFactorMethod};
