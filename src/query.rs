use crate::audit::ProcessLog;
use crate::error::Result;
use crate::structs::{Dataset, Value};
use rusqlite::Connection;
use rusqlite::types::ValueRef;

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Executes a statement verbatim and collects its result set into a [`Dataset`].
///
/// The statement text is not validated. Appends `Query run: <query>` to the audit log
/// once the result set has been read.
///
/// # Errors
/// Returns `PipelineError::Sqlite` for malformed SQL or unknown tables and columns.
pub fn run_query(query: &str, conn: &Connection, log: &ProcessLog) -> Result<Dataset> {
    let mut stmt = conn.prepare(query)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let values = (0..width)
            .map(|i| row.get_ref(i).map(from_sql_value))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.push(values);
    }

    log.record(&format!("Query run: {}", query))?;
    Ok(Dataset::new(columns, rows))
}
