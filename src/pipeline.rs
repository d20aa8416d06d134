use crate::audit::ProcessLog;
use crate::error::Result;
use crate::extract::{extract, fetch_exchange_rates, http_client};
use crate::load::{export_json, export_parquet, load_to_csv, load_to_db};
use crate::query::run_query;
use crate::structs::{Dataset, PipelineConfig};
use crate::transform::transform;
use log::debug;
use rusqlite::Connection;
use std::time::Instant;

/// Runs extract, transform, load and query in order and returns the query result.
///
/// Every stage blocks until it completes and the first failure aborts the run.
/// The database connection is opened once, shared by the load and query stages,
/// and closed before returning.
///
/// # Errors
///
/// Returns the first `PipelineError` raised by any stage.
pub fn run_pipeline(config: &PipelineConfig) -> Result<Dataset> {
    let log = ProcessLog::new(&config.log_file);
    let client = http_client()?;

    println!("Starting extraction...");
    let extract_start = Instant::now();
    let (dataset, _document) = extract(&client, &config.dataset_url, config.html_url.as_deref())?;
    let rates = fetch_exchange_rates(&client, &config.rates_url)?;
    println!(
        "Extraction completed in {:.2?} | {} rows",
        extract_start.elapsed(),
        dataset.len()
    );

    let transform_start = Instant::now();
    let dataset = transform(dataset, &rates, &log)?;
    println!(
        "Transform completed in {:.2?} | {} rows retained",
        transform_start.elapsed(),
        dataset.len()
    );

    let load_start = Instant::now();
    load_to_csv(&dataset, &config.csv_output, &log)?;
    debug!("  - {}", config.csv_output.display());
    if let Some(path) = &config.json_output {
        export_json(&dataset, path, &log)?;
        debug!("  - {}", path.display());
    }
    if let Some(path) = &config.parquet_output {
        export_parquet(&dataset, path, &log)?;
        debug!("  - {}", path.display());
    }

    let mut conn = Connection::open(&config.db_path)?;
    load_to_db(&dataset, &mut conn, &config.table_name, &log)?;
    println!("Load completed in {:.2?}", load_start.elapsed());
    debug!(
        "  - {} (table {})",
        config.db_path.display(),
        config.table_name
    );

    let result = run_query(&config.query, &conn, &log)?;
    conn.close().map_err(|(_, err)| err)?;

    Ok(result)
}
