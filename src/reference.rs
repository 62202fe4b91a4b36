// 📚 Reference Tables - static lookup data loaded once per run
// skus_map (retail → canonical), sales_map (sku → cost/brand),
// wholesale_sold_map (canonical → brand/cost)

use crate::error::PipelineError;
use crate::records::{SalesSkuEntry, SkuMapping, WholesaleMapEntry};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

/// All reference data of one run; read-only once loaded
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub sku_map: Vec<SkuMapping>,
    pub sales_map: Vec<SalesSkuEntry>,
    pub wholesale_map: Vec<WholesaleMapEntry>,
}

impl ReferenceTables {
    /// Load every table; any failure is fatal for the run
    pub fn load(
        sku_map: &Path,
        sales_map: &Path,
        wholesale_map: Option<&Path>,
    ) -> Result<ReferenceTables> {
        let sku_map = load_sku_map(sku_map).map_err(|e| reference_error("sku_map", e))?;
        let sales_map = load_sales_map(sales_map).map_err(|e| reference_error("sales_map", e))?;
        let wholesale_map = match wholesale_map {
            Some(path) => {
                load_wholesale_map(path).map_err(|e| reference_error("wholesale_map", e))?
            }
            None => Vec::new(),
        };

        tracing::info!(
            sku_map = sku_map.len(),
            sales_map = sales_map.len(),
            wholesale_map = wholesale_map.len(),
            "reference tables loaded"
        );

        Ok(ReferenceTables {
            sku_map,
            sales_map,
            wholesale_map,
        })
    }
}

fn reference_error(table: &str, err: anyhow::Error) -> anyhow::Error {
    PipelineError::Reference {
        table: table.to_string(),
        message: format!("{:#}", err),
    }
    .into()
}

fn read_rows<T: DeserializeOwned, R: Read>(reader: R, label: &str) -> Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line_num, result) in rdr.deserialize().enumerate() {
        let row: T = result.with_context(|| {
            format!("Failed to deserialize {} line {}", label, line_num + 2)
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))
}

/// Retail → canonical mapping. The join key (`sku_part`) gets the same
/// trim + lowercase treatment as normalized sale skus.
pub fn read_sku_map<R: Read>(reader: R) -> Result<Vec<SkuMapping>> {
    let rows: Vec<SkuMapping> = read_rows(reader, "sku map")?;
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            if !row.multiplier.is_finite() {
                anyhow::bail!("sku map line {}: multiplier is not a number", idx + 2);
            }
            Ok(SkuMapping {
                sku_part: row.sku_part.trim().to_lowercase(),
                sku_name: row.sku_name.trim().to_string(),
                multiplier: row.multiplier,
            })
        })
        .collect()
}

pub fn load_sku_map(path: &Path) -> Result<Vec<SkuMapping>> {
    read_sku_map(open(path)?)
}

pub fn read_sales_map<R: Read>(reader: R) -> Result<Vec<SalesSkuEntry>> {
    let rows: Vec<SalesSkuEntry> = read_rows(reader, "sales map")?;
    Ok(rows
        .into_iter()
        .map(|row| SalesSkuEntry {
            sku: row.sku.trim().to_string(),
            cost: row.cost,
            brand: row.brand.trim().to_string(),
        })
        .collect())
}

pub fn load_sales_map(path: &Path) -> Result<Vec<SalesSkuEntry>> {
    read_sales_map(open(path)?)
}

pub fn read_wholesale_map<R: Read>(reader: R) -> Result<Vec<WholesaleMapEntry>> {
    let rows: Vec<WholesaleMapEntry> = read_rows(reader, "wholesale map")?;
    Ok(rows
        .into_iter()
        .map(|row| WholesaleMapEntry {
            sku: row.sku.trim().to_string(),
            brand: row.brand.trim().to_string(),
            cost: row.cost,
        })
        .collect())
}

pub fn load_wholesale_map(path: &Path) -> Result<Vec<WholesaleMapEntry>> {
    read_wholesale_map(open(path)?)
}
