//! Statement execution.
//!
//! The engine dispatches one parsed statement at a time: CREATE goes to
//! the catalog, INSERT and DELETE to the row store, and SELECT runs a
//! layout scan and reassembles rows from the returned cells. Each
//! dispatch uses at most one KV transaction per component call; no
//! transaction outlives the call.

use tupledb_kv::Database;

use crate::ast::{SelectStatement, Statement};
use crate::catalog::{Catalog, TableDef};
use crate::error::{EngineError, EngineResult};
use crate::row_store::RowStore;
use crate::value::{CellValue, TEXT_TOKEN};

/// Which data layout SELECT scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanLayout {
    /// Scan `(table, "r", row_id, column)` keys; rows arrive whole.
    #[default]
    Row,
    /// Scan `(table, "c", column, row_id)` keys; columns arrive whole.
    Column,
}

/// An assembled SELECT result ready for wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// Emitted field names.
    pub field_names: Vec<String>,
    /// Type tokens parallel to `field_names`.
    pub field_types: Vec<String>,
    /// Result rows. Every row has exactly one cell per field; `None`
    /// marks a cell the row never stored (sent as SQL NULL).
    pub rows: Vec<Vec<Option<CellValue>>>,
}

impl QueryResult {
    /// Number of result rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Outcome of executing one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    /// CREATE TABLE completed.
    Created,
    /// INSERT completed with this many rows written.
    Inserted(usize),
    /// DELETE completed.
    Deleted,
    /// SELECT produced a result set.
    Rows(QueryResult),
}

/// Query executor over a shared store handle.
#[derive(Debug, Clone)]
pub struct Engine {
    catalog: Catalog,
    rows: RowStore,
    layout: ScanLayout,
}

impl Engine {
    /// Creates an engine that scans the given layout for SELECT.
    pub fn new(db: Database, layout: ScanLayout) -> Self {
        Self {
            catalog: Catalog::new(db.clone()),
            rows: RowStore::new(db),
            layout,
        }
    }

    /// Executes one statement.
    pub fn execute(&self, statement: &Statement) -> EngineResult<StatementOutcome> {
        match statement {
            Statement::CreateTable(create) => {
                self.catalog.create_table(create)?;
                Ok(StatementOutcome::Created)
            }
            Statement::Insert(insert) => {
                let table = self.catalog.get_table(&insert.table)?;
                let count = self.rows.insert(&table, &insert.rows)?;
                Ok(StatementOutcome::Inserted(count))
            }
            Statement::Delete(delete) => {
                self.rows.truncate(&delete.table)?;
                Ok(StatementOutcome::Deleted)
            }
            Statement::Select(select) => Ok(StatementOutcome::Rows(self.select(select)?)),
        }
    }

    fn select(&self, stmt: &SelectStatement) -> EngineResult<QueryResult> {
        let table = self.catalog.get_table(&stmt.table)?;

        for target in &stmt.targets {
            if table.column_index(target).is_none() {
                return Err(EngineError::ColumnUnknown(target.clone()));
            }
        }

        match self.layout {
            ScanLayout::Row => self.select_row_layout(&table, stmt),
            ScanLayout::Column => self.select_column_layout(&table, stmt),
        }
    }

    /// Row-layout SELECT: one scan yields cells grouped by row id, each
    /// row's cells in column-name order. A new result row starts when
    /// the row id element changes.
    ///
    /// Each row is assembled against the table's full column list, with
    /// cells placed by column index and missing cells left as NULL, so a
    /// partial row can neither bleed into its neighbor nor come out
    /// narrower than the row description.
    fn select_row_layout(
        &self,
        table: &TableDef,
        stmt: &SelectStatement,
    ) -> EngineResult<QueryResult> {
        let cells = self.rows.scan_row_layout(&table.name)?;
        let width = table.column_count();

        let mut rows: Vec<Vec<Option<CellValue>>> = Vec::new();
        let mut current: Option<(String, Vec<Option<CellValue>>)> = None;

        for cell in cells {
            let starts_new_row = current
                .as_ref()
                .map_or(true, |(id, _)| id != &cell.row_id);
            if starts_new_row {
                if let Some((_, row)) = current.take() {
                    rows.push(row);
                }
                current = Some((cell.row_id.clone(), vec![None; width]));
            }

            if let (Some(index), Some((_, row))) =
                (table.column_index(&cell.column), current.as_mut())
            {
                row[index] = Some(decode_cell(table, &cell.column, &cell.value));
            }
        }
        if let Some((_, row)) = current {
            rows.push(row);
        }

        Ok(assemble(table, stmt, rows))
    }

    /// Column-layout SELECT: one scan yields cells grouped by column,
    /// each column's cells in row-id order. Cells are placed into their
    /// row by column index as each column group streams past; rows come
    /// out in row-id order, padded to the full column width like the
    /// row-layout path. Rows with no cells are never materialized.
    fn select_column_layout(
        &self,
        table: &TableDef,
        stmt: &SelectStatement,
    ) -> EngineResult<QueryResult> {
        use std::collections::BTreeMap;

        let cells = self.rows.scan_column_layout(&table.name)?;
        let width = table.column_count();

        let mut rows_by_id: BTreeMap<String, Vec<Option<CellValue>>> = BTreeMap::new();

        for cell in cells {
            if let Some(index) = table.column_index(&cell.column) {
                rows_by_id
                    .entry(cell.row_id.clone())
                    .or_insert_with(|| vec![None; width])[index] =
                    Some(decode_cell(table, &cell.column, &cell.value));
            }
        }

        let rows: Vec<_> = rows_by_id.into_values().collect();
        Ok(assemble(table, stmt, rows))
    }
}

fn decode_cell(table: &TableDef, column: &str, bytes: &[u8]) -> CellValue {
    let type_token = table.column_type(column).unwrap_or(TEXT_TOKEN);
    CellValue::from_storage(type_token, bytes)
}

/// Builds the final result. With rows present, the emitted fields are
/// the table's full column list in scan order, which every assembled
/// row is already padded to. With nothing scanned, the description
/// falls back to the client's target list.
fn assemble(
    table: &TableDef,
    stmt: &SelectStatement,
    rows: Vec<Vec<Option<CellValue>>>,
) -> QueryResult {
    if rows.is_empty() {
        let field_types = stmt
            .targets
            .iter()
            .map(|name| {
                table
                    .column_type(name)
                    .unwrap_or(TEXT_TOKEN)
                    .to_string()
            })
            .collect();
        return QueryResult {
            field_names: stmt.targets.clone(),
            field_types,
            rows,
        };
    }

    QueryResult {
        field_names: table.column_names.clone(),
        field_types: table.column_types.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Parser;
    use crate::value::{INT4_TOKEN, TEXT_TOKEN};

    fn engine(layout: ScanLayout) -> Engine {
        Engine::new(Database::new(), layout)
    }

    fn run(engine: &Engine, sql: &str) -> EngineResult<StatementOutcome> {
        engine.execute(&Parser::parse_one(sql).unwrap())
    }

    fn seed_customer(engine: &Engine) {
        run(engine, "create table customer (age int, name text)").unwrap();
        run(
            engine,
            "insert into customer values (14, 'garry'), (20, 'ted')",
        )
        .unwrap();
    }

    fn rows_of(outcome: StatementOutcome) -> QueryResult {
        match outcome {
            StatementOutcome::Rows(result) => result,
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_select_row_layout() {
        let engine = engine(ScanLayout::Row);
        seed_customer(&engine);

        let result = rows_of(run(&engine, "select name, age from customer").unwrap());

        // Field names follow the table's column list (scan order), with
        // the matching types.
        assert_eq!(result.field_names, vec!["age", "name"]);
        assert_eq!(result.field_types, vec![INT4_TOKEN, TEXT_TOKEN]);

        let mut rows = result.rows;
        rows.sort_by_key(|r| match r[0] {
            Some(CellValue::Int(n)) => n,
            _ => 0,
        });
        assert_eq!(
            rows,
            vec![
                vec![
                    Some(CellValue::Int(14)),
                    Some(CellValue::Text("garry".to_string())),
                ],
                vec![
                    Some(CellValue::Int(20)),
                    Some(CellValue::Text("ted".to_string())),
                ],
            ]
        );
    }

    #[test]
    fn test_select_column_layout() {
        let engine = engine(ScanLayout::Column);
        seed_customer(&engine);

        let result = rows_of(run(&engine, "select name, age from customer").unwrap());

        assert_eq!(result.field_names, vec!["age", "name"]);
        assert_eq!(result.row_count(), 2);
        for row in &result.rows {
            assert_eq!(row.len(), 2);
            assert!(matches!(row[0], Some(CellValue::Int(_))));
            assert!(matches!(row[1], Some(CellValue::Text(_))));
        }
    }

    #[test]
    fn test_select_unknown_table() {
        let engine = engine(ScanLayout::Row);
        assert!(matches!(
            run(&engine, "select x from nosuch"),
            Err(EngineError::TableUnknown(_))
        ));
    }

    #[test]
    fn test_select_unknown_column() {
        let engine = engine(ScanLayout::Row);
        seed_customer(&engine);
        assert!(matches!(
            run(&engine, "select missing from customer"),
            Err(EngineError::ColumnUnknown(_))
        ));
    }

    #[test]
    fn test_insert_unknown_table() {
        let engine = engine(ScanLayout::Row);
        assert!(matches!(
            run(&engine, "insert into nosuch values (1)"),
            Err(EngineError::TableUnknown(_))
        ));
    }

    #[test]
    fn test_select_after_delete_is_empty() {
        for layout in [ScanLayout::Row, ScanLayout::Column] {
            let engine = engine(layout);
            seed_customer(&engine);

            assert_eq!(
                run(&engine, "delete from customer").unwrap(),
                StatementOutcome::Deleted
            );

            let result = rows_of(run(&engine, "select name from customer").unwrap());
            assert_eq!(result.row_count(), 0);
            // With nothing scanned, field names stay aligned with the
            // target list.
            assert_eq!(result.field_names, vec!["name"]);
            assert_eq!(result.field_types, vec![TEXT_TOKEN]);
        }
    }

    #[test]
    fn test_select_count_matches_insert_count() {
        let engine = engine(ScanLayout::Row);
        run(&engine, "create table t (a int)").unwrap();
        assert_eq!(
            run(&engine, "insert into t values (1), (2), (3)").unwrap(),
            StatementOutcome::Inserted(3)
        );

        let result = rows_of(run(&engine, "select a from t").unwrap());
        assert_eq!(result.row_count(), 3);
    }

    #[test]
    fn test_partial_rows_pad_to_full_width() {
        // A partial row must neither smear into its neighbor nor come
        // out narrower than the emitted field list, in either layout.
        for layout in [ScanLayout::Row, ScanLayout::Column] {
            let engine = engine(layout);
            run(&engine, "create table customer (age int, name text)").unwrap();
            run(&engine, "insert into customer values (99)").unwrap();
            run(&engine, "insert into customer values (14, 'garry')").unwrap();

            let result = rows_of(run(&engine, "select age from customer").unwrap());
            assert_eq!(result.field_names, vec!["age", "name"]);
            assert_eq!(result.row_count(), 2);
            for row in &result.rows {
                assert_eq!(row.len(), result.field_names.len());
            }

            let mut rows = result.rows;
            rows.sort_by_key(|r| match r[0] {
                Some(CellValue::Int(n)) => n,
                _ => 0,
            });
            assert_eq!(
                rows,
                vec![
                    vec![
                        Some(CellValue::Int(14)),
                        Some(CellValue::Text("garry".to_string())),
                    ],
                    vec![Some(CellValue::Int(99)), None],
                ]
            );
        }
    }

    #[test]
    fn test_create_twice_then_select_still_works() {
        let engine = engine(ScanLayout::Row);
        seed_customer(&engine);
        assert_eq!(
            run(&engine, "create table customer (other text)").unwrap(),
            StatementOutcome::Created
        );

        let result = rows_of(run(&engine, "select age from customer").unwrap());
        assert_eq!(result.row_count(), 2);
    }
}
