use clap::Parser;
use lib::structs::{DB_PATH, HTML_LINK, LOG_FILE, QUERY, RESOURCE_LINK, TABLE_NAME, TARGET_FILE};
use lib::{PipelineConfig, PipelineError, SimpleLogger, run_pipeline};
use log::debug;
use std::path::PathBuf;
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV resource (URL or local path) holding the market capitalization dataset
    #[arg(long, default_value = RESOURCE_LINK)]
    dataset_url: String,

    /// CSV resource (URL or local path) with Currency and Rate columns
    #[arg(long, default_value = RESOURCE_LINK)]
    rates_url: String,

    /// HTML resource parsed and printed for inspection only
    #[arg(long, default_value = HTML_LINK)]
    html_url: String,

    /// Skip fetching the HTML resource
    #[arg(long, default_value_t = false)]
    no_html: bool,

    /// Output CSV file
    #[arg(long, default_value = TARGET_FILE)]
    csv_output: PathBuf,

    /// Also export the transformed dataset as JSON
    #[arg(long)]
    json_output: Option<PathBuf>,

    /// Also export the transformed dataset as Parquet
    #[arg(long)]
    parquet_output: Option<PathBuf>,

    /// Append-only process log
    #[arg(long, default_value = LOG_FILE)]
    log_file: PathBuf,

    /// SQLite database file
    #[arg(long, default_value = DB_PATH)]
    db_path: PathBuf,

    /// Table replaced on every run
    #[arg(long, default_value = TABLE_NAME)]
    table_name: String,

    /// Statement run against the database after loading
    #[arg(long, default_value = QUERY)]
    query: String,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,
}

impl From<Args> for PipelineConfig {
    fn from(args: Args) -> Self {
        Self {
            dataset_url: args.dataset_url,
            rates_url: args.rates_url,
            html_url: (!args.no_html).then_some(args.html_url),
            csv_output: args.csv_output,
            json_output: args.json_output,
            parquet_output: args.parquet_output,
            log_file: args.log_file,
            db_path: args.db_path,
            table_name: args.table_name,
            query: args.query,
        }
    }
}

fn main() -> Result<(), PipelineError> {
    // Initialize timer and logger
    let total_start = Instant::now();
    log::set_logger(&LOGGER).map_err(|e| PipelineError::Data(e.to_string()))?;

    // Acquire CLI args
    let args = Args::parse();
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }

    // UI
    println!("Banks ETL! Market capitalization pipeline");

    // Constants become the run's config unless overridden
    let config = PipelineConfig::from(args);
    debug!(
        "Dataset: {} | Rates: {} | HTML: {:?}",
        config.dataset_url, config.rates_url, config.html_url
    );
    debug!(
        "Outputs: {} | {} (table {}) | log {}",
        config.csv_output.display(),
        config.db_path.display(),
        config.table_name,
        config.log_file.display()
    );

    // Extract, transform, load, query
    let result = run_pipeline(&config)?;

    // Show query result
    println!("\nQuery: {}", config.query);
    println!("{}", result);
    println!(
        "\nPipeline completed successfully in {:.2?}",
        total_start.elapsed()
    );
    Ok(())
}
