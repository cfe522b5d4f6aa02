//! Row cell storage in the `data/table_data` subspace.
//!
//! Every cell is written twice in the same transaction: once under the
//! row layout `(table, "r", row_id, column)` and once under the column
//! layout `(table, "c", column, row_id)`, with identical value bytes.
//! Whichever element comes first in the key tuple is the one a range
//! scan groups by, so the row layout reads whole rows cheaply and the
//! column layout reads whole columns cheaply.

use tracing::{debug, info};
use tupledb_kv::Database;
use uuid::Uuid;

use crate::ast::Literal;
use crate::catalog::TableDef;
use crate::error::{EngineError, EngineResult};
use crate::keys;
use crate::value::CellValue;

/// One cell from a row-layout scan, in `(row_id, column)` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCell {
    /// Synthetic row id.
    pub row_id: String,
    /// Column name.
    pub column: String,
    /// Stored value bytes.
    pub value: Vec<u8>,
}

/// One cell from a column-layout scan, in `(column, row_id)` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCell {
    /// Column name.
    pub column: String,
    /// Synthetic row id.
    pub row_id: String,
    /// Stored value bytes.
    pub value: Vec<u8>,
}

/// Row store: inserts, layout scans, and whole-table deletion.
#[derive(Debug, Clone)]
pub struct RowStore {
    db: Database,
}

impl RowStore {
    /// Creates a row store over the given store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts value tuples into a table, one transaction for all rows.
    ///
    /// Each tuple gets a fresh UUID row id. Values map to columns by
    /// position in the table's (scan-ordered) column list; a tuple with
    /// more values than the table has columns is rejected. Inserting
    /// into a table whose existence marker is missing is a logged no-op.
    ///
    /// Returns the number of rows written.
    pub fn insert(&self, table: &TableDef, rows: &[Vec<Literal>]) -> EngineResult<usize> {
        self.db.transact(|tx| {
            if tx.get(&keys::table_marker(&table.name)).is_none() {
                info!(table = %table.name, "table does not exist, skipping insert");
                return Ok(0);
            }

            for row in rows {
                if row.len() > table.column_count() {
                    return Err(EngineError::UnsupportedValue(format!(
                        "{} values for table {} with {} columns",
                        row.len(),
                        table.name,
                        table.column_count(),
                    )));
                }

                let row_id = Uuid::new_v4().to_string();
                for (index, literal) in row.iter().enumerate() {
                    let column = &table.column_names[index];
                    let bytes = CellValue::from_literal(literal)?.storage_bytes();

                    tx.set(
                        keys::column_cell(&table.name, column, &row_id),
                        bytes.clone(),
                    );
                    debug!(table = %table.name, %column, %row_id, "inserted column-layout cell");

                    tx.set(keys::row_cell(&table.name, &row_id, column), bytes);
                    debug!(table = %table.name, %column, %row_id, "inserted row-layout cell");
                }
            }

            Ok(rows.len())
        })
    }

    /// Scans the row layout: cells grouped by row id, each row's cells in
    /// column-name order.
    pub fn scan_row_layout(&self, table: &str) -> EngineResult<Vec<RowCell>> {
        let (begin, end) = keys::layout_range(table, keys::ROW_LAYOUT);
        let subspace = keys::table_data();

        self.db.read_transact(|tx| {
            tx.get_range(&begin, &end)
                .into_iter()
                .map(|(key, value)| {
                    let tuple = unpack_cell_key(&subspace, table, &key)?;
                    Ok(RowCell {
                        row_id: tuple.0,
                        column: tuple.1,
                        value,
                    })
                })
                .collect()
        })
    }

    /// Scans the column layout: cells grouped by column, each column's
    /// cells in row-id order.
    pub fn scan_column_layout(&self, table: &str) -> EngineResult<Vec<ColumnCell>> {
        let (begin, end) = keys::layout_range(table, keys::COLUMN_LAYOUT);
        let subspace = keys::table_data();

        self.db.read_transact(|tx| {
            tx.get_range(&begin, &end)
                .into_iter()
                .map(|(key, value)| {
                    let tuple = unpack_cell_key(&subspace, table, &key)?;
                    Ok(ColumnCell {
                        column: tuple.0,
                        row_id: tuple.1,
                        value,
                    })
                })
                .collect()
        })
    }

    /// Deletes every cell of a table, both layouts, in one transaction.
    ///
    /// The clear range is restricted to the table's own data prefix.
    /// Truncating a table whose existence marker is missing is a logged
    /// no-op.
    pub fn truncate(&self, table: &str) -> EngineResult<()> {
        self.db.transact(|tx| {
            if tx.get(&keys::table_marker(table)).is_none() {
                info!(%table, "table does not exist, skipping delete");
                return Ok(());
            }

            let (begin, end) = keys::table_data_range(table);
            tx.clear_range(begin, end);
            Ok(())
        })
    }
}

/// Decodes a data key into its third and fourth tuple elements, which
/// are `(row_id, column)` for the row layout and `(column, row_id)` for
/// the column layout.
fn unpack_cell_key(
    subspace: &tupledb_kv::Subspace,
    table: &str,
    key: &[u8],
) -> EngineResult<(String, String)> {
    let corrupt = |source| EngineError::Corrupt {
        table: table.to_string(),
        source,
    };
    let tuple = subspace.unpack(key).map_err(corrupt)?;
    let third = tuple.get_str(2).map_err(corrupt)?.to_string();
    let fourth = tuple.get_str(3).map_err(corrupt)?.to_string();
    Ok((third, fourth))
}
