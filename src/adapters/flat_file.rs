// Flat-file exports (marketplace portals that only offer a download)
// Column names, delimiter and header offset come from the source config.

use super::{RawPayload, SourceAdapter, SourceKind};
use crate::config::{SourceConfig, SourceSpec};
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::{coerce_number, SaleRecord};
use csv::ReaderBuilder;

pub struct FlatFileAdapter;

impl FlatFileAdapter {
    pub fn new() -> Self {
        FlatFileAdapter
    }
}

/// Column names plus the data rows below them
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    /// 1-based file line of the first data row, for error messages
    first_line: usize,
}

fn cell(row: &[String], i: usize) -> &str {
    row.get(i).map(String::as_str).unwrap_or("")
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

/// Drop the preamble before the column names. `header_row` counts
/// non-blank lines only; blank lines never shift the header.
fn skip_preamble<'a>(
    text: &'a str,
    header_row: usize,
    source: &str,
) -> Result<(&'a str, usize), SourceError> {
    let mut rest = text.trim_start_matches('\u{feff}');
    let mut line_num = 0;
    let mut skipped = 0;
    loop {
        let (line, tail) = match rest.split_once('\n') {
            Some((line, tail)) => (line, Some(tail)),
            None => (rest, None),
        };
        let blank = line.trim().is_empty();
        if !blank && skipped == header_row {
            return Ok((rest, line_num));
        }
        if !blank {
            skipped += 1;
        }
        line_num += 1;
        match tail {
            Some(tail) => rest = tail,
            None => {
                return Err(SourceError::parse(
                    source,
                    format!("no header row after {} non-blank preamble lines", header_row),
                ))
            }
        }
    }
}

fn delimited_table(
    text: &str,
    delimiter: char,
    header_row: usize,
    source: &str,
) -> Result<Table, SourceError> {
    let (body, header_line) = skip_preamble(text, header_row, source)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SourceError::parse(source, format!("unreadable header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let first_line = header_line + 2;
    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            SourceError::parse(source, format!("bad row {}: {}", first_line + index, e))
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table {
        headers,
        rows,
        first_line,
    })
}

/// Same header rule as delimited text: blank rows are never counted
fn sheet_table(sheet: &[Vec<String>], header_row: usize, source: &str) -> Result<Table, SourceError> {
    let header_idx = sheet
        .iter()
        .enumerate()
        .filter(|(_, row)| !is_blank(row))
        .nth(header_row)
        .map(|(i, _)| i)
        .ok_or_else(|| {
            SourceError::parse(
                source,
                format!("no header row after {} non-blank preamble rows", header_row),
            )
        })?;

    Ok(Table {
        headers: sheet[header_idx].clone(),
        rows: sheet[header_idx + 1..].to_vec(),
        first_line: header_idx + 2,
    })
}

impl SourceAdapter for FlatFileAdapter {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        _window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError> {
        let (delimiter, header_row, sku_column, qty_column, site_column) = match &source.spec {
            SourceSpec::FlatFile {
                delimiter,
                header_row,
                sku_column,
                qty_column,
                site_column,
                ..
            } => (*delimiter, *header_row, sku_column, qty_column, site_column),
            _ => return Err(SourceError::parse(&source.name, "source is not a flat file")),
        };

        let table = match payload {
            RawPayload::Delimited(text) => delimited_table(text, delimiter, header_row, &source.name)?,
            RawPayload::Rows(sheet) => sheet_table(sheet, header_row, &source.name)?,
            other => {
                return Err(SourceError::parse(
                    &source.name,
                    format!("expected delimited text or sheet rows, got {}", other.shape()),
                ))
            }
        };

        let column = |name: &str| -> Result<usize, SourceError> {
            table
                .headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| SourceError::parse(&source.name, format!("missing column '{}'", name)))
        };

        let sku_idx = column(sku_column)?;
        let qty_idx = column(qty_column)?;
        let site_idx = match site_column {
            Some(name) => Some(column(name)?),
            None => None,
        };

        let mut records = Vec::new();
        for row in &table.rows {
            let sku = cell(row, sku_idx);
            let qty_raw = cell(row, qty_idx);
            if sku.trim().is_empty() && qty_raw.trim().is_empty() {
                continue;
            }

            // Repeated header rows carry text in the qty column; they stay in as
            // NaN and are dropped by the normalizer as sentinels or invalid qty.
            let qty = coerce_number(qty_raw).unwrap_or(f64::NAN);
            let site = site_idx
                .map(|i| cell(row, i).trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(source.name.as_str());

            records.push(SaleRecord::new(sku, qty, site));
        }

        tracing::debug!(
            source = %source.name,
            rows = table.rows.len(),
            first_line = table.first_line,
            records = records.len(),
            "flat file read"
        );
        Ok(records)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FlatFile
    }
}
