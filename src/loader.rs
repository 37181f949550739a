//! Table loader for benchmark datasets.

use std::io::Read;

use tracing::info;

use crate::catalog::DatasetReader;
use crate::config::{CompositeIndex, TableName};
use crate::engine::Engine;
use crate::error::Result;

/// Default number of rows sent per insert statement.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Rebuilds `table` from `reader` and creates both composite indexes.
///
/// The table is dropped and recreated, rows are inserted in batches of
/// `batch_size`, then the path-value index is built before the value-path
/// index. Returns the number of imported rows.
pub fn prepare_table<R: Read>(
    engine: &mut dyn Engine,
    table: &TableName,
    reader: &mut DatasetReader<R>,
    batch_size: usize,
) -> Result<u64> {
    let batch_size = batch_size.max(1);
    info!(engine = engine.name(), table = %table, "creating table");
    engine.recreate_table(table)?;

    info!(table = %table, batch_size, "importing data");
    let mut batch = Vec::with_capacity(batch_size);
    let mut imported = 0u64;
    while reader.next_batch(&mut batch, batch_size)? > 0 {
        imported += engine.insert_records(table, &batch)?;
    }
    info!(table = %table, imported, "import finished");

    for index in CompositeIndex::ALL {
        info!(index = %index.index_name(table), columns = index.columns(), "creating B+ tree");
        engine.create_index(table, index)?;
    }
    info!(table = %table, "table ready");
    Ok(imported)
}
