use arrow_schema::DataType;
use log::{Log, Metadata, Record as LogRecord};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Console logger for stage diagnostics
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &LogRecord) {
        if self.enabled(record.metadata()) {
            println!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Markers treated as a missing cell when reading CSV input.
const NA_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A single cell of a tabular dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Infers a typed cell from a raw CSV field.
    ///
    /// Empty fields, NA markers and anything parsing to NaN become `Null`, whole numbers become
    /// `Integer`, other numbers `Real`, and everything else is kept as `Text`.
    pub fn parse(field: &str) -> Value {
        let trimmed = field.trim();
        if trimmed.is_empty() || NA_MARKERS.contains(&trimmed) {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return if f.is_nan() { Value::Null } else { Value::Real(f) };
        }
        Value::Text(field.to_string())
    }

    /// A NaN real counts as missing.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Real(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the cell, parsing text when it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Field text as written to CSV output. Missing cells are written empty.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => format!("{:?}", f),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NaN"),
            other => write!(f, "{}", other.to_field()),
        }
    }
}

/// Storage type inferred for a whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// Infers the narrowest type holding every non-null cell.
    /// Columns with no values at all fall back to `Text`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> ColumnType {
        let mut inferred: Option<ColumnType> = None;
        for value in values {
            let cell = match value {
                Value::Null => continue,
                Value::Integer(_) => ColumnType::Integer,
                Value::Real(_) => ColumnType::Real,
                Value::Text(_) => return ColumnType::Text,
            };
            inferred = Some(match (inferred, cell) {
                (Some(ColumnType::Real), _) | (_, ColumnType::Real) => ColumnType::Real,
                _ => ColumnType::Integer,
            });
        }
        inferred.unwrap_or(ColumnType::Text)
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    pub fn arrow_type(&self) -> DataType {
        match self {
            ColumnType::Integer => DataType::Int64,
            ColumnType::Real => DataType::Float64,
            ColumnType::Text => DataType::Utf8,
        }
    }
}

/// Ordered rows sharing one header. Row order follows the source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_type(&self, index: usize) -> ColumnType {
        ColumnType::infer(self.rows.iter().filter_map(|row| row.get(index)))
    }

    /// Cell lookup by row position and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// First `n` rows as a new dataset.
    pub fn head(&self, n: usize) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();

        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|c| c.len())
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:index_width$}", "")?;
        for (name, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>width$}", name)?;
        }
        writeln!(f)?;

        for (i, row) in cells.iter().enumerate() {
            write!(f, "{:<index_width$}", i)?;
            for (cell, width) in row.iter().zip(&widths) {
                write!(f, "  {:>width$}", cell)?;
            }
            writeln!(f)?;
        }
        write!(f, "[{} rows x {} columns]", self.rows.len(), self.columns.len())
    }
}

/// Serializes as an array of objects whose keys keep column order.
impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct RowRef<'a> {
            columns: &'a [String],
            values: &'a [Value],
        }

        impl Serialize for RowRef<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.columns.len()))?;
                for (column, value) in self.columns.iter().zip(self.values) {
                    map.serialize_entry(column, value)?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowRef {
                columns: &self.columns,
                values: row,
            })?;
        }
        seq.end()
    }
}

/// Currencies the market capitalization is converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Gbp,
    Eur,
    Inr,
}

impl Currency {
    /// Fixed conversion order of the derived columns.
    pub const ALL: [Currency; 3] = [Currency::Gbp, Currency::Eur, Currency::Inr];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
            Currency::Inr => "INR",
        }
    }

    pub fn column_name(&self) -> &'static str {
        match self {
            Currency::Gbp => "MC_GBP_Billion",
            Currency::Eur => "MC_EUR_Billion",
            Currency::Inr => "MC_INR_Billion",
        }
    }
}

/// Exchange multipliers from the base currency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateTable {
    pub gbp: f64,
    pub eur: f64,
    pub inr: f64,
}

impl RateTable {
    pub fn new(gbp: f64, eur: f64, inr: f64) -> Self {
        Self { gbp, eur, inr }
    }

    pub fn get(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Gbp => self.gbp,
            Currency::Eur => self.eur,
            Currency::Inr => self.inr,
        }
    }
}

pub const RESOURCE_LINK: &str = "https://cf-courses-data.s3.us.cloud-object-storage.appdomain.cloud/IBMSkillsNetwork-PY0221EN-Coursera/labs/v2/exchange_rate.csv";
pub const HTML_LINK: &str = "https://example.com/page-with-table";
pub const TARGET_FILE: &str = "largest_banks_data.csv";
pub const LOG_FILE: &str = "code_log.txt";
pub const DB_PATH: &str = "Banks.db";
pub const TABLE_NAME: &str = "largest_banks";
pub const QUERY: &str = "SELECT * FROM largest_banks";

/// Locations and names for one pipeline run.
///
/// Resource locations are either `http(s)://` URLs or local file paths.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dataset_url: String,
    pub rates_url: String,
    pub html_url: Option<String>,
    pub csv_output: PathBuf,
    pub json_output: Option<PathBuf>,
    pub parquet_output: Option<PathBuf>,
    pub log_file: PathBuf,
    pub db_path: PathBuf,
    pub table_name: String,
    pub query: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_url: RESOURCE_LINK.to_string(),
            rates_url: RESOURCE_LINK.to_string(),
            html_url: Some(HTML_LINK.to_string()),
            csv_output: PathBuf::from(TARGET_FILE),
            json_output: None,
            parquet_output: None,
            log_file: PathBuf::from(LOG_FILE),
            db_path: PathBuf::from(DB_PATH),
            table_name: TABLE_NAME.to_string(),
            query: QUERY.to_string(),
        }
    }
}
