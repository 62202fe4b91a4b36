// 📝 Report Writer - every CSV the run produces goes through here

use crate::records::{AggregatedSale, CanonicalSale, CsvColumns};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Write rows with a header, creating parent directories as needed.
/// No rows still writes the header line.
pub fn write_csv<T: Serialize + CsvColumns>(path: &Path, rows: &[T]) -> Result<usize> {
    ensure_parent(path)?;

    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    if rows.is_empty() {
        wtr.write_record(T::COLUMNS)
            .with_context(|| format!("Failed to write header to {}", path.display()))?;
    }
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    Ok(rows.len())
}

/// Write to a sibling temp file, then rename over the target
pub fn write_csv_atomic<T: Serialize + CsvColumns>(path: &Path, rows: &[T]) -> Result<usize> {
    let tmp = temp_sibling(path);
    let written = write_csv(&tmp, rows)?;
    std::fs::rename(&tmp, path).with_context(|| {
        format!("Failed to move {} into place at {}", tmp.display(), path.display())
    })?;
    Ok(written)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

// ============================================================================
// RUN OUTPUTS
// ============================================================================

/// `sku,qty` row of the retail and canonical totals files
#[derive(Debug, Serialize)]
struct TotalRow<'a> {
    sku: &'a str,
    qty: f64,
}

impl CsvColumns for TotalRow<'_> {
    const COLUMNS: &'static [&'static str] = &["sku", "qty"];
}

pub fn write_retail_totals(path: &Path, totals: &[AggregatedSale]) -> Result<usize> {
    let rows: Vec<TotalRow> = totals
        .iter()
        .map(|t| TotalRow { sku: &t.sku, qty: t.qty })
        .collect();
    write_csv(path, &rows)
}

pub fn write_canonical_totals(path: &Path, totals: &[CanonicalSale]) -> Result<usize> {
    let rows: Vec<TotalRow> = totals
        .iter()
        .map(|t| TotalRow { sku: &t.sku, qty: t.qty })
        .collect();
    write_csv(path, &rows)
}

/// `<dir>/<MM-DD-YYYY>.csv`
pub fn dated_path(dir: &Path, date_stamp: &str) -> PathBuf {
    dir.join(format!("{}.csv", date_stamp))
}

/// `<dir>/<MM-DD-YYYY>-<name>.csv`
pub fn dated_named_path(dir: &Path, date_stamp: &str, name: &str) -> PathBuf {
    dir.join(format!("{}-{}.csv", date_stamp, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::BrandSummaryRow;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/soldvalueretail.csv");

        let written = write_retail_totals(
            &path,
            &[AggregatedSale {
                sku: "rug-1".to_string(),
                qty: 3.0,
            }],
        )
        .unwrap();

        assert_eq!(written, 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "sku,qty\nrug-1,3.0\n");
    }

    #[test]
    fn test_atomic_write_replaces_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stock.csv");
        std::fs::write(&path, "old contents").unwrap();

        write_canonical_totals(&path, &[CanonicalSale::new("CANON_A", 10.0)]).unwrap();
        write_csv_atomic(&path, &[CanonicalSale::new("CANON_B", 2.5)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "sku,qty\nCANON_B,2.5\n");
        assert!(!dir.path().join("stock.csv.tmp").exists());
    }

    #[test]
    fn test_empty_report_keeps_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sold_itemswholesale.csv");

        let written = write_canonical_totals(&path, &[]).unwrap();

        assert_eq!(written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "sku,qty\n");

        let path = dir.path().join("03-27-2024-brand1.csv");
        write_csv::<BrandSummaryRow>(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "sku,cost,qty,total\n");
    }

    #[test]
    fn test_dated_paths() {
        let dir = Path::new("reports/brand1");
        assert_eq!(
            dated_path(dir, "03-27-2024"),
            PathBuf::from("reports/brand1/03-27-2024.csv")
        );
        assert_eq!(
            dated_named_path(dir, "03-27-2024", "brand1"),
            PathBuf::from("reports/brand1/03-27-2024-brand1.csv")
        );
    }
}
