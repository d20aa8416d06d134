use crate::audit::ProcessLog;
use crate::error::Result;
use crate::structs::{ColumnType, Dataset, Value};
use arrow_array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{Field, Schema};
use csv::Writer;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};
use std::{fs::File, path::Path, sync::Arc};

/// Writes a dataset to a CSV file: header row plus one record per row, no index column.
///
/// Any existing file at `output_path` is overwritten.
///
/// # Errors
/// Returns error if the file cannot be created or written to.
pub fn write_csv(dataset: &Dataset, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(&dataset.columns)?;
    for row in &dataset.rows {
        writer.write_record(row.iter().map(Value::to_field))?;
    }

    writer.flush()?;
    Ok(())
}

/// CSV branch of the loader. Appends `Data loaded to CSV at <path>` to the audit log.
pub fn load_to_csv(dataset: &Dataset, output_path: &Path, log: &ProcessLog) -> Result<()> {
    write_csv(dataset, output_path)?;
    log.record(&format!("Data loaded to CSV at {}", output_path.display()))
}

/// Writes a dataset as a pretty-formatted JSON array of row objects.
///
/// # Errors
/// Returns error if the file cannot be created or serialization fails.
pub fn write_json(dataset: &Dataset, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, dataset)?;
    Ok(())
}

pub fn export_json(dataset: &Dataset, output_path: &Path, log: &ProcessLog) -> Result<()> {
    write_json(dataset, output_path)?;
    log.record(&format!("Data exported to JSON at {}", output_path.display()))
}

/// Writes a dataset to a single-batch Parquet file.
///
/// The schema follows each column's inferred type: `Int64`, `Float64` or `Utf8`,
/// all nullable. Values that do not fit their column type are stored as null.
///
/// # Errors
/// Returns error if the file cannot be created or Arrow/Parquet operations fail.
pub fn write_parquet(dataset: &Dataset, output_path: &Path) -> Result<()> {
    let types: Vec<ColumnType> = (0..dataset.columns.len())
        .map(|i| dataset.column_type(i))
        .collect();

    let schema = Arc::new(Schema::new(
        dataset
            .columns
            .iter()
            .zip(&types)
            .map(|(name, ty)| Field::new(name, ty.arrow_type(), true))
            .collect::<Vec<_>>(),
    ));

    let arrays: Vec<ArrayRef> = types
        .iter()
        .enumerate()
        .map(|(i, ty)| column_array(dataset, i, *ty))
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

fn column_array(dataset: &Dataset, index: usize, ty: ColumnType) -> ArrayRef {
    let cells = dataset.rows.iter().map(move |row| row.get(index));
    match ty {
        ColumnType::Integer => Arc::new(
            cells
                .map(|v| match v {
                    Some(Value::Integer(i)) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnType::Real => Arc::new(
            cells
                .map(|v| v.and_then(Value::as_f64))
                .collect::<Float64Array>(),
        ),
        ColumnType::Text => Arc::new(
            cells
                .map(|v| match v {
                    Some(Value::Null) | None => None,
                    Some(other) => Some(other.to_field()),
                })
                .collect::<StringArray>(),
        ),
    }
}

pub fn export_parquet(dataset: &Dataset, output_path: &Path, log: &ProcessLog) -> Result<()> {
    write_parquet(dataset, output_path)?;
    log.record(&format!(
        "Data exported to Parquet at {}",
        output_path.display()
    ))
}

/// Quotes an SQL identifier, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

/// Replaces `table_name` with the dataset: drop if exists, create, insert every row.
///
/// The three steps run in one transaction, so a failure leaves the previous
/// table in place. Column declared types follow [`Dataset::column_type`].
///
/// # Errors
/// Returns `PipelineError::Sqlite` if any statement fails.
pub fn replace_table(conn: &mut Connection, dataset: &Dataset, table_name: &str) -> Result<()> {
    let table = quote_ident(table_name);
    let column_defs: Vec<String> = dataset
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{} {}", quote_ident(name), dataset.column_type(i).sql_type()))
        .collect();
    let placeholders = vec!["?"; dataset.columns.len()].join(", ");

    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
    tx.execute(
        &format!("CREATE TABLE {} ({})", table, column_defs.join(", ")),
        [],
    )?;
    {
        let mut insert =
            tx.prepare(&format!("INSERT INTO {} VALUES ({})", table, placeholders))?;
        for row in &dataset.rows {
            insert.execute(params_from_iter(row.iter().map(to_sql_value)))?;
        }
    }
    tx.commit()?;

    debug!("Inserted {} rows into {}", dataset.len(), table_name);
    Ok(())
}

/// Database branch of the loader. Appends `Data loaded to database table <table>` to the audit log.
pub fn load_to_db(
    dataset: &Dataset,
    conn: &mut Connection,
    table_name: &str,
    log: &ProcessLog,
) -> Result<()> {
    replace_table(conn, dataset, table_name)?;
    log.record(&format!("Data loaded to database table {}", table_name))
}
