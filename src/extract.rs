use crate::error::{PipelineError, Result};
use crate::structs::{Currency, Dataset, RateTable, Value};
use csv::ReaderBuilder;
use log::debug;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html};
use std::fmt::Write;
use std::fs;
use std::io::Read;

const PREVIEW_ROWS: usize = 5;

/// Builds the blocking HTTP client shared by every fetch in a run.
///
/// No timeout is configured: a stalled server stalls the run.
pub fn http_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!("banks-etl/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Reads a resource body from an `http(s)://` URL or a local file path.
///
/// # Errors
/// Returns `PipelineError::Http` on connection failure or a non-2xx status,
/// and `PipelineError::Io` if a local file cannot be read.
pub fn read_resource(client: &Client, location: &str) -> Result<String> {
    if is_remote(location) {
        debug!("GET {}", location);
        let body = client.get(location).send()?.error_for_status()?.text()?;
        Ok(body)
    } else {
        debug!("Reading local resource {}", location);
        Ok(fs::read_to_string(location)?)
    }
}

/// Parses CSV with a header row into a [`Dataset`], inferring the type of every cell.
///
/// # Errors
/// Returns `PipelineError::Csv` on malformed input, including rows whose field
/// count differs from the header.
pub fn parse_dataset<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Value::parse).collect());
    }

    Ok(Dataset::new(columns, rows))
}

/// Fetches and parses the primary dataset exactly as published.
pub fn extract_dataset(client: &Client, location: &str) -> Result<Dataset> {
    let body = read_resource(client, location)?;
    parse_dataset(body.as_bytes())
}

/// Fetches an HTML resource into a document tree. Non-2xx responses fail fast.
pub fn fetch_document(client: &Client, location: &str) -> Result<Html> {
    let body = read_resource(client, location)?;
    Ok(Html::parse_document(&body))
}

/// Renders a document as an indented tree of elements and their text, one node per line.
pub fn outline(document: &Html) -> String {
    let mut out = String::new();
    outline_element(document.root_element(), 0, &mut out);
    out
}

fn outline_element(element: ElementRef<'_>, depth: usize, out: &mut String) {
    let indent = " ".repeat(depth);
    let tag = element.value();
    let attrs: String = tag
        .attrs()
        .map(|(name, value)| format!(" {}=\"{}\"", name, value))
        .collect();
    let _ = writeln!(out, "{}<{}{}>", indent, tag.name(), attrs);

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            outline_element(child_element, depth + 1, out);
        } else if let Some(text) = child.value().as_text() {
            let text = text.trim();
            if !text.is_empty() {
                let _ = writeln!(out, "{} {}", indent, text);
            }
        }
    }

    let _ = writeln!(out, "{}</{}>", indent, tag.name());
}

/// Extracts the primary dataset and, when a location is given, the diagnostic document.
///
/// Both are printed for inspection. The document has no downstream consumer.
///
/// # Errors
/// Returns error if either fetch fails or the CSV cannot be parsed.
pub fn extract(
    client: &Client,
    csv_location: &str,
    html_location: Option<&str>,
) -> Result<(Dataset, Option<Html>)> {
    let dataset = extract_dataset(client, csv_location)?;
    println!("Extracted dataset:");
    println!("{}", dataset.head(PREVIEW_ROWS));

    let document = match html_location {
        Some(location) => {
            let document = fetch_document(client, location)?;
            println!("HTML content:");
            print!("{}", outline(&document));
            Some(document)
        }
        None => None,
    };

    Ok((dataset, document))
}

/// Reads the rate for each currency from a dataset with `Currency` and `Rate` columns.
///
/// The first row whose `Currency` equals the code wins.
///
/// # Errors
/// Returns `PipelineError::MissingColumn` if either column is absent,
/// `PipelineError::MissingCurrency` if a currency has no row, and
/// `PipelineError::Data` if the matching rate is not numeric.
pub fn rates_from_dataset(dataset: &Dataset) -> Result<RateTable> {
    let currency_idx = dataset
        .column_index("Currency")
        .ok_or_else(|| PipelineError::MissingColumn("Currency".to_string()))?;
    let rate_idx = dataset
        .column_index("Rate")
        .ok_or_else(|| PipelineError::MissingColumn("Rate".to_string()))?;

    let lookup = |currency: Currency| -> Result<f64> {
        let row = dataset
            .rows
            .iter()
            .find(|row| {
                matches!(row.get(currency_idx), Some(Value::Text(code)) if code.trim() == currency.code())
            })
            .ok_or_else(|| PipelineError::MissingCurrency(currency.code().to_string()))?;
        let rate = row.get(rate_idx).unwrap_or(&Value::Null);
        rate.as_f64().ok_or_else(|| {
            PipelineError::Data(format!(
                "Rate for {} is not numeric: {}",
                currency.code(),
                rate
            ))
        })
    };

    Ok(RateTable::new(
        lookup(Currency::Gbp)?,
        lookup(Currency::Eur)?,
        lookup(Currency::Inr)?,
    ))
}

/// Fetches the reference exchange-rate table.
pub fn fetch_exchange_rates(client: &Client, location: &str) -> Result<RateTable> {
    let dataset = extract_dataset(client, location)?;
    let rates = rates_from_dataset(&dataset)?;
    debug!(
        "Exchange rates | GBP={} EUR={} INR={}",
        rates.gbp, rates.eur, rates.inr
    );
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATES_CSV: &str = "Currency,Rate\nEUR,0.93\nGBP,0.8\nINR,82.95\nINR,99.0\n";

    #[test]
    fn parse_dataset_keeps_order_and_missing_cells() {
        let csv = "Bank,Rate\nA,10.5\nB,\nC,7\n";
        let ds = parse_dataset(csv.as_bytes()).unwrap();
        assert_eq!(ds.columns, vec!["Bank", "Rate"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.value(0, "Rate"), Some(&Value::Real(10.5)));
        assert_eq!(ds.value(1, "Rate"), Some(&Value::Null));
        assert_eq!(ds.value(2, "Rate"), Some(&Value::Integer(7)));
        assert_eq!(ds.value(2, "Bank"), Some(&Value::Text("C".into())));
    }

    #[test]
    fn parse_dataset_rejects_ragged_rows() {
        let csv = "Bank,Rate\nA,1,extra\n";
        let err = parse_dataset(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::Csv(_)));
    }

    #[test]
    fn rates_take_first_matching_row() {
        let ds = parse_dataset(RATES_CSV.as_bytes()).unwrap();
        let rates = rates_from_dataset(&ds).unwrap();
        assert_eq!(rates, RateTable::new(0.8, 0.93, 82.95));
    }

    #[test]
    fn missing_currency_is_an_error() {
        let ds = parse_dataset("Currency,Rate\nEUR,0.93\nGBP,0.8\n".as_bytes()).unwrap();
        let err = rates_from_dataset(&ds).unwrap_err();
        assert!(matches!(err, PipelineError::MissingCurrency(ref c) if c == "INR"));
    }

    #[test]
    fn rates_require_currency_column() {
        let ds = parse_dataset("Code,Rate\nEUR,0.93\n".as_bytes()).unwrap();
        let err = rates_from_dataset(&ds).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(ref c) if c == "Currency"));
    }

    #[test]
    fn local_resources_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        std::fs::write(&path, RATES_CSV).unwrap();

        let client = http_client().unwrap();
        let rates = fetch_exchange_rates(&client, path.to_str().unwrap()).unwrap();
        assert_eq!(rates.inr, 82.95);
    }

    #[test]
    fn missing_local_resource_is_io_error() {
        let client = http_client().unwrap();
        let err = read_resource(&client, "/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    /// Serves one canned HTTP response on a loopback port and returns its base URL.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            let mut stream = stream;
            write!(
                stream,
                "{}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            )
            .unwrap();
        });
        format!("http://{}", addr)
    }

    fn loopback_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn not_found_document_fails_fast() {
        let client = loopback_client();
        let url = serve_once("HTTP/1.1 404 Not Found", "missing");
        let err = fetch_document(&client, &format!("{}/page.html", url)).unwrap_err();
        assert!(matches!(err, PipelineError::Http(ref e) if e.status().map(|s| s.as_u16()) == Some(404)));
    }

    #[test]
    fn server_error_dataset_fails_fast() {
        let client = loopback_client();
        let url = serve_once("HTTP/1.1 500 Internal Server Error", "Bank,Rate\nX,1\n");
        let err = extract_dataset(&client, &format!("{}/banks.csv", url)).unwrap_err();
        assert!(matches!(err, PipelineError::Http(_)));
    }

    #[test]
    fn remote_dataset_is_parsed() {
        let client = loopback_client();
        let url = serve_once("HTTP/1.1 200 OK", "Bank,Rate\nX,100.0\n");
        let ds = extract_dataset(&client, &format!("{}/banks.csv", url)).unwrap();
        assert_eq!(ds.columns, vec!["Bank", "Rate"]);
        assert_eq!(ds.value(0, "Rate"), Some(&Value::Real(100.0)));
    }

    #[test]
    fn outline_lists_elements_and_text() {
        let html = Html::parse_document(
            r#"<html><body><table id="banks"><tr><td>JPMorgan</td></tr></table></body></html>"#,
        );
        let rendered = outline(&html);
        assert!(rendered.starts_with("<html>"));
        assert!(rendered.contains("<table id=\"banks\">"));
        assert!(rendered.contains("JPMorgan"));
        assert!(rendered.trim_end().ends_with("</html>"));
    }
}
