use crate::audit::ProcessLog;
use crate::error::{PipelineError, Result};
use crate::structs::{Currency, Dataset, RateTable, Value};
use log::debug;
use rayon::prelude::*;

const RATE_COLUMN: &str = "Rate";

/// Converts the market capitalization of every complete row into GBP, EUR and INR.
///
/// Rows holding a missing value in any column are dropped, the `Rate` column is
/// coerced to floating point, and one column per currency is appended in the
/// fixed order GBP, EUR, INR. Each derived cell is `Rate * rates[currency]`.
/// Source row order is preserved.
///
/// # Arguments
///
/// * `dataset` - Extracted dataset, consumed
/// * `rates` - Exchange multipliers for each target currency
/// * `log` - Audit trail receiving `Data transformed` on success
///
/// # Returns
///
/// Returns the transformed dataset with three additional columns.
///
/// # Errors
///
/// Returns `PipelineError` if:
/// - The dataset has no `Rate` column (`MissingColumn`)
/// - A retained `Rate` cell is not numeric (`Data`)
/// - The audit line cannot be written (`Io`)
pub fn transform(dataset: Dataset, rates: &RateTable, log: &ProcessLog) -> Result<Dataset> {
    println!("Dataset columns: {:?}", dataset.columns);
    let rate_idx = dataset
        .column_index(RATE_COLUMN)
        .ok_or_else(|| PipelineError::MissingColumn(RATE_COLUMN.to_string()))?;

    let Dataset { mut columns, rows } = dataset;
    let total_rows = rows.len();

    let rows: Vec<Vec<Value>> = rows
        .into_par_iter()
        .filter(|row| !row.iter().any(Value::is_null))
        .map(|row| convert_row(row, rate_idx, rates))
        .collect::<Result<_>>()?;

    debug!(
        "Dropped {} incomplete rows, {} retained",
        total_rows - rows.len(),
        rows.len()
    );

    columns.extend(Currency::ALL.iter().map(|c| c.column_name().to_string()));

    log.record("Data transformed")?;
    Ok(Dataset::new(columns, rows))
}

/// Coerces the rate cell to `Real` and appends one converted value per currency.
fn convert_row(mut row: Vec<Value>, rate_idx: usize, rates: &RateTable) -> Result<Vec<Value>> {
    let cell = row.get_mut(rate_idx).ok_or_else(|| {
        PipelineError::Data(format!("Row has no value for column {}", RATE_COLUMN))
    })?;
    let base = cell.as_f64().ok_or_else(|| {
        PipelineError::Data(format!(
            "Column {} holds non-numeric value: {}",
            RATE_COLUMN, cell
        ))
    })?;
    *cell = Value::Real(base);
    row.extend(
        Currency::ALL
            .iter()
            .map(|&currency| Value::Real(base * rates.get(currency))),
    );
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_log() -> (TempDir, ProcessLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = ProcessLog::new(dir.path().join("code_log.txt"));
        (dir, log)
    }

    fn rates() -> RateTable {
        RateTable::new(0.8, 0.93, 82.5)
    }

    fn approx(value: Option<&Value>, expected: f64) -> bool {
        value
            .and_then(Value::as_f64)
            .is_some_and(|v| (v - expected).abs() < 1e-9)
    }

    #[test]
    fn converts_single_bank_row() {
        let (_dir, log) = scratch_log();
        let ds = Dataset::new(
            vec!["Bank".into(), "Rate".into()],
            vec![vec![Value::Text("X".into()), Value::Real(100.0)]],
        );

        let out = transform(ds, &rates(), &log).unwrap();
        assert_eq!(
            out.columns,
            vec!["Bank", "Rate", "MC_GBP_Billion", "MC_EUR_Billion", "MC_INR_Billion"]
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "Bank"), Some(&Value::Text("X".into())));
        assert_eq!(out.value(0, "Rate"), Some(&Value::Real(100.0)));
        assert!(approx(out.value(0, "MC_GBP_Billion"), 80.0));
        assert!(approx(out.value(0, "MC_EUR_Billion"), 93.0));
        assert!(approx(out.value(0, "MC_INR_Billion"), 8250.0));
    }

    #[test]
    fn drops_rows_with_any_missing_value() {
        let (_dir, log) = scratch_log();
        let ds = Dataset::new(
            vec!["Bank".into(), "Rate".into()],
            vec![
                vec![Value::Text("A".into()), Value::Integer(10)],
                vec![Value::Null, Value::Real(20.0)],
                vec![Value::Text("C".into()), Value::Null],
                vec![Value::Text("D".into()), Value::Real(40.0)],
            ],
        );

        let out = transform(ds, &rates(), &log).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.value(0, "Bank"), Some(&Value::Text("A".into())));
        assert_eq!(out.value(0, "Rate"), Some(&Value::Real(10.0)));
        assert_eq!(out.value(1, "Bank"), Some(&Value::Text("D".into())));
    }

    #[test]
    fn derived_columns_match_rate_products() {
        let (_dir, log) = scratch_log();
        let rows: Vec<Vec<Value>> = (0..200)
            .map(|i| vec![Value::Integer(i), Value::Real(i as f64 * 1.5)])
            .collect();
        let ds = Dataset::new(vec!["Id".into(), "Rate".into()], rows);

        let out = transform(ds, &rates(), &log).unwrap();
        assert_eq!(out.len(), 200);
        for (i, row) in out.rows.iter().enumerate() {
            assert_eq!(row[0], Value::Integer(i as i64));
            let base = row[1].as_f64().unwrap();
            for (offset, currency) in Currency::ALL.iter().enumerate() {
                let derived = row[2 + offset].as_f64().unwrap();
                assert!((derived - base * rates().get(*currency)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn missing_rate_column_names_rate() {
        let (dir, log) = scratch_log();
        let ds = Dataset::new(
            vec!["Name".into(), "Value".into()],
            vec![vec![Value::Text("X".into()), Value::Real(1.0)]],
        );

        let err = transform(ds, &rates(), &log).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(ref c) if c == "Rate"));
        assert!(err.to_string().contains("'Rate'"));
        assert!(!dir.path().join("code_log.txt").exists());
    }

    #[test]
    fn non_numeric_rate_is_data_error() {
        let (_dir, log) = scratch_log();
        let ds = Dataset::new(
            vec!["Rate".into()],
            vec![vec![Value::Text("lots".into())]],
        );
        let err = transform(ds, &rates(), &log).unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn drops_rows_marked_missing_in_source_csv() {
        let (_dir, log) = scratch_log();
        let csv = "Bank,Rate\nA,-nan\nB,NAN\nC,#N/A\nD,None\nE,5\n";
        let ds = crate::extract::parse_dataset(csv.as_bytes()).unwrap();

        let out = transform(ds, &rates(), &log).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "Bank"), Some(&Value::Text("E".into())));
        assert_eq!(out.value(0, "Rate"), Some(&Value::Real(5.0)));
    }

    #[test]
    fn short_row_is_data_error() {
        let (_dir, log) = scratch_log();
        let ds = Dataset::new(
            vec!["Bank".into(), "Rate".into()],
            vec![vec![Value::Text("X".into())]],
        );
        let err = transform(ds, &rates(), &log).unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn records_transform_in_log() {
        let (dir, log) = scratch_log();
        let ds = Dataset::new(vec!["Rate".into()], vec![vec![Value::Real(1.0)]]);
        transform(ds, &rates(), &log).unwrap();

        let content = std::fs::read_to_string(dir.path().join("code_log.txt")).unwrap();
        assert!(content.trim_end().ends_with(",Data transformed"));
    }
}
