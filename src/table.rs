//! CSV input and output.

use crate::error::ConfigError;
use crate::models::{ListingRequest, OutputRow, EXTRACTED_COLUMNS};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::{Read, Write};
use tracing::warn;

/// Parsed input: header row plus one request per data row
#[derive(Debug, Clone)]
pub struct InputTable {
    pub headers: Vec<String>,
    pub requests: Vec<ListingRequest>,
    /// 1-based data rows that had more cells than the header; extras were dropped
    pub truncated_rows: Vec<usize>,
}

/// Read listing requests from CSV. The `url_column` header must be present;
/// every other column is carried through untouched.
pub fn read_requests<R: Read>(reader: R, url_column: &str) -> Result<InputTable> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let url_idx = headers
        .iter()
        .position(|h| h == url_column)
        .ok_or_else(|| ConfigError::MissingColumn(url_column.to_string()))?;

    let mut requests = Vec::new();
    let mut truncated_rows = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", index + 1))?;
        let mut columns: Vec<String> = record.iter().map(str::to_string).collect();
        if columns.len() > headers.len() {
            warn!(
                "Row {} has {} cells but the header has {}; dropping the extra cells",
                index + 1,
                columns.len(),
                headers.len()
            );
            truncated_rows.push(index + 1);
        }
        columns.resize(headers.len(), String::new());

        requests.push(ListingRequest {
            index,
            url: columns[url_idx].trim().to_string(),
            columns,
        });
    }

    Ok(InputTable {
        headers,
        requests,
        truncated_rows,
    })
}

/// Full output header: input columns, extracted fields, one per destination.
///
/// An extracted or destination column whose name is already taken gets a
/// `listing_` or `commute_` prefix so every header stays distinct.
pub fn output_headers(input_headers: &[String], destinations: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = input_headers.iter().cloned().collect();
    let mut headers = input_headers.to_vec();

    let extracted = EXTRACTED_COLUMNS.iter().map(|c| (c.to_string(), "listing_"));
    let commutes = destinations.iter().map(|d| (d.clone(), "commute_"));
    for (name, prefix) in extracted.chain(commutes) {
        let name = if taken.contains(&name) {
            let renamed = format!("{}{}", prefix, name);
            warn!("Output column {:?} already exists, writing it as {:?}", name, renamed);
            renamed
        } else {
            name
        };
        taken.insert(name.clone());
        headers.push(name);
    }
    headers
}

/// Write output rows as CSV
pub fn write_rows<W: Write>(
    writer: W,
    input_headers: &[String],
    destinations: &[String],
    rows: &[OutputRow],
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(output_headers(input_headers, destinations))?;
    for row in rows {
        wtr.write_record(row.cells())?;
    }
    wtr.flush()?;
    Ok(())
}
