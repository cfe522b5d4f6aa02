//! Table catalog stored in the `catalog/table` subspace.
//!
//! A table is persisted as an existence marker key `(table)` with an
//! empty value, plus one `(table, column)` key per column whose value is
//! the column's type token. Reading a definition back is a single range
//! scan over the table's catalog prefix; because keys are sorted, the
//! scan returns columns in column-name order, not declaration order.

use tracing::info;
use tupledb_kv::Database;

use crate::ast::CreateTableStatement;
use crate::error::{EngineError, EngineResult};
use crate::keys;

/// A table definition read back from the catalog.
///
/// `column_names` and `column_types` are parallel lists in catalog scan
/// order (lexicographic by column name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Column names.
    pub column_names: Vec<String>,
    /// Column type tokens, parallel to `column_names`.
    pub column_types: Vec<String>,
}

impl TableDef {
    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    /// Index of a column by name.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == column)
    }

    /// Type token of a column by name.
    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_index(column)
            .map(|i| self.column_types[i].as_str())
    }
}

/// Catalog manager: creates and resolves table definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    /// Creates a catalog over the given store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates a table: the existence marker plus one column definition
    /// key per column, in declaration order, in one transaction.
    ///
    /// Creating a table that already exists is a logged no-op.
    pub fn create_table(&self, stmt: &CreateTableStatement) -> EngineResult<()> {
        self.db.transact(|tx| {
            if tx.get(&keys::table_marker(&stmt.table)).is_some() {
                info!(table = %stmt.table, "table already exists");
                return Ok(());
            }

            tx.set(keys::table_marker(&stmt.table), Vec::new());
            for column in &stmt.columns {
                tx.set(
                    keys::column_def(&stmt.table, &column.name),
                    column.type_token.clone().into_bytes(),
                );
            }
            Ok(())
        })
    }

    /// Reads a table definition with one range scan over the table's
    /// catalog prefix.
    ///
    /// The existence marker (the one-element key) is excluded from the
    /// column list. Fails with [`EngineError::TableUnknown`] when the
    /// scan yields no column entries.
    pub fn get_table(&self, table: &str) -> EngineResult<TableDef> {
        let (begin, end) = keys::catalog_range(table);
        let subspace = keys::catalog_tables();

        self.db.read_transact(|tx| {
            let mut def = TableDef {
                name: table.to_string(),
                column_names: Vec::new(),
                column_types: Vec::new(),
            };

            for (key, value) in tx.get_range(&begin, &end) {
                let tuple = subspace.unpack(&key).map_err(|source| EngineError::Corrupt {
                    table: table.to_string(),
                    source,
                })?;
                // One element means the existence marker, not a column.
                if tuple.len() < 2 {
                    continue;
                }
                let column = tuple.get_str(1).map_err(|source| EngineError::Corrupt {
                    table: table.to_string(),
                    source,
                })?;
                def.column_names.push(column.to_string());
                def.column_types
                    .push(String::from_utf8_lossy(&value).into_owned());
            }

            if def.column_names.is_empty() {
                return Err(EngineError::TableUnknown(table.to_string()));
            }
            Ok(def)
        })
    }
}
