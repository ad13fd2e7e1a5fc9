//! Input/Output operations

mod csv;
mod gmt;
mod results;
mod tenx;

use std::path::Path;

use crate::data::CountMatrix;
use crate::error::Result;

pub use self::csv::{
    read_cell_metadata, read_count_table, read_id_map, read_ligand_target_matrix, read_name_list,
    write_table, MetadataTable, TableRow,
};
pub use gmt::read_gmt;
pub use results::{DeMethod, DeResults, ResultsSummary};
pub use tenx::read_10x_dir;

/// Load counts from a 10x-style directory or a dense table file
pub fn read_counts<P: AsRef<Path>>(path: P) -> Result<CountMatrix> {
    let path = path.as_ref();
    if path.is_dir() {
        read_10x_dir(path)
    } else {
        read_count_table(path)
    }
}
