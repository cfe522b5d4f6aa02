//! Key construction for the two persisted namespaces.
//!
//! Catalog keys live under the `("catalog", "table")` subspace:
//!
//! - `(table)` with an empty value marks that the table exists.
//! - `(table, column)` holds the column's type token.
//!
//! Data keys live under the `("data", "table_data")` subspace, written
//! once per layout:
//!
//! - `(table, "r", row_id, column)` for the row layout (whole-row scans).
//! - `(table, "c", column, row_id)` for the column layout (whole-column
//!   scans).

use tupledb_kv::{Subspace, Tuple};

/// Key tuple element selecting the row layout.
pub(crate) const ROW_LAYOUT: &str = "r";
/// Key tuple element selecting the column layout.
pub(crate) const COLUMN_LAYOUT: &str = "c";

/// The `catalog/table` subspace.
pub(crate) fn catalog_tables() -> Subspace {
    Subspace::new(Tuple::new().push("catalog").push("table"))
}

/// The `data/table_data` subspace.
pub(crate) fn table_data() -> Subspace {
    Subspace::new(Tuple::new().push("data").push("table_data"))
}

/// Existence marker key for a table.
pub(crate) fn table_marker(table: &str) -> Vec<u8> {
    catalog_tables().pack(&Tuple::new().push(table))
}

/// Column definition key for one column of a table.
pub(crate) fn column_def(table: &str, column: &str) -> Vec<u8> {
    catalog_tables().pack(&Tuple::new().push(table).push(column))
}

/// Row-layout cell key.
pub(crate) fn row_cell(table: &str, row_id: &str, column: &str) -> Vec<u8> {
    table_data().pack(&Tuple::new().push(table).push(ROW_LAYOUT).push(row_id).push(column))
}

/// Column-layout cell key.
pub(crate) fn column_cell(table: &str, column: &str, row_id: &str) -> Vec<u8> {
    table_data().pack(&Tuple::new().push(table).push(COLUMN_LAYOUT).push(column).push(row_id))
}

/// Range covering a table's catalog entries (marker plus columns).
pub(crate) fn catalog_range(table: &str) -> (Vec<u8>, Vec<u8>) {
    catalog_tables().range_of(&Tuple::new().push(table))
}

/// Range covering every data cell of a table, both layouts.
pub(crate) fn table_data_range(table: &str) -> (Vec<u8>, Vec<u8>) {
    table_data().range_of(&Tuple::new().push(table))
}

/// Range covering one layout of a table.
pub(crate) fn layout_range(table: &str, layout: &str) -> (Vec<u8>, Vec<u8>) {
    table_data().range_of(&Tuple::new().push(table).push(layout))
}
