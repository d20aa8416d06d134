pub mod audit;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod query;
pub mod structs;
pub mod transform;

// Re-export public API
pub use audit::ProcessLog;
pub use error::{PipelineError, Result};
pub use extract::{extract, fetch_exchange_rates, http_client, parse_dataset, rates_from_dataset};
pub use load::{
    export_json, export_parquet, load_to_csv, load_to_db, replace_table, write_csv, write_json,
    write_parquet,
};
pub use pipeline::run_pipeline;
pub use query::run_query;
pub use structs::{
    ColumnType, Currency, Dataset, PipelineConfig, RateTable, SimpleLogger, Value,
};
pub use transform::transform;
