//! Normalization shared by the relational engines.

use futures::{Stream, StreamExt};
use serde_json::Value;
use sqlx::{Column, Database, Either, Row};

use crate::error::DbError;
use crate::models::{QueryOutput, Record};

/// Accumulates a native result stream into `{data, columns, rowCount}`.
#[derive(Debug, Default)]
pub struct RowSet {
    columns: Vec<String>,
    data: Vec<Record>,
    rows_affected: u64,
}

impl RowSet {
    /// Starts from the column names the prepared statement describes, so an
    /// empty result still carries its header.
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn push_row(&mut self, names: &[String], values: Vec<Value>) {
        if self.columns.is_empty() {
            self.columns = names.to_vec();
        }
        let record: Record = names.iter().cloned().zip(values).collect();
        self.data.push(record);
    }

    pub fn add_affected(&mut self, rows: u64) {
        self.rows_affected += rows;
    }

    /// Rows returned win; writes report the affected count; anything else is 0.
    pub fn finish(self) -> QueryOutput {
        let row_count = if self.data.is_empty() {
            self.rows_affected
        } else {
            self.data.len() as u64
        };
        QueryOutput {
            data: self.data,
            columns: self.columns,
            row_count,
        }
    }
}

pub fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Drains a `fetch_many` stream. `columns` comes from the statement metadata
/// (empty for statements that return nothing); `rows_affected` and `decode`
/// supply the driver specific bits.
pub async fn collect<DB, S>(
    mut stream: S,
    columns: Vec<String>,
    rows_affected: fn(&DB::QueryResult) -> u64,
    decode: fn(&DB::Row, usize) -> Value,
) -> Result<QueryOutput, DbError>
where
    DB: Database,
    S: Stream<Item = Result<Either<DB::QueryResult, DB::Row>, sqlx::Error>> + Unpin,
{
    let mut set = RowSet::with_columns(columns);
    let mut names: Vec<String> = Vec::new();

    while let Some(item) = stream.next().await {
        match item? {
            Either::Left(done) => set.add_affected(rows_affected(&done)),
            Either::Right(row) => {
                if names.is_empty() {
                    names = column_names(row.columns());
                }
                let values = (0..row.len()).map(|i| decode(&row, i)).collect();
                set.push_row(&names, values);
            }
        }
    }

    Ok(set.finish())
}
