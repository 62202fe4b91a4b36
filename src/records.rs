// 📦 Records - the common schema every stage speaks
// Sources produce SaleRecords, reference tables produce mappings,
// the ledger produces/consumes StockEntries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder sku emitted for a flat-file source whose file is absent
pub const PLACEHOLDER_SKU: &str = "other";

// ============================================================================
// SALES
// ============================================================================

/// SaleRecord - one line item sold on one marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub sku: String,
    pub qty: f64,
    pub site: String,
}

impl SaleRecord {
    pub fn new(sku: impl Into<String>, qty: f64, site: impl Into<String>) -> Self {
        SaleRecord {
            sku: sku.into(),
            qty,
            site: site.into(),
        }
    }

    /// Zero-qty marker for a source that had nothing to read
    pub fn placeholder(site: impl Into<String>) -> Self {
        SaleRecord::new(PLACEHOLDER_SKU, 0.0, site)
    }
}

/// AggregatedSale - total qty per distinct (normalized) retail sku
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSale {
    pub sku: String,
    pub qty: f64,
}

/// CanonicalSale - sold qty expressed in canonical (wholesale) units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSale {
    pub sku: String,
    pub qty: f64,
}

impl CanonicalSale {
    pub fn new(sku: impl Into<String>, qty: f64) -> Self {
        CanonicalSale {
            sku: sku.into(),
            qty,
        }
    }
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

/// SkuMapping - retail sku part → canonical sku name, with unit multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuMapping {
    pub sku_part: String,
    pub sku_name: String,
    pub multiplier: f64,
}

impl SkuMapping {
    pub fn new(sku_part: impl Into<String>, sku_name: impl Into<String>, multiplier: f64) -> Self {
        SkuMapping {
            sku_part: sku_part.into(),
            sku_name: sku_name.into(),
            multiplier,
        }
    }
}

/// Row of the sales sku map. Cost is kept as raw text and coerced later,
/// so a malformed cost never fails the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSkuEntry {
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(default)]
    pub cost: String,
    #[serde(default)]
    pub brand: String,
}

/// Row of the wholesale sold map (canonical sku → brand/cost)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WholesaleMapEntry {
    pub sku: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub cost: String,
}

// ============================================================================
// LEDGER
// ============================================================================

/// StockEntry - on-hand quantity of one canonical sku
///
/// Column order matches the persisted ledger file:
/// `sku,qty,subcategory,color,brand`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub sku: String,
    pub qty: f64,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub brand: String,
}

impl StockEntry {
    pub fn new(sku: impl Into<String>, qty: f64) -> Self {
        StockEntry {
            sku: sku.into(),
            qty,
            subcategory: String::new(),
            color: String::new(),
            brand: String::new(),
        }
    }

    /// Builder pattern: attach catalogue metadata
    pub fn with_metadata(
        mut self,
        subcategory: impl Into<String>,
        color: impl Into<String>,
        brand: impl Into<String>,
    ) -> Self {
        self.subcategory = subcategory.into();
        self.color = color.into();
        self.brand = brand.into();
        self
    }
}

// ============================================================================
// REPORTING
// ============================================================================

/// SaleRecord joined with cost/brand and stamped with the run date.
/// Missing cost (or a cost that is not a number) leaves `total` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSaleRecord {
    pub sku: String,
    pub qty: f64,
    pub site: String,
    pub cost: Option<f64>,
    pub brand: Option<String>,
    pub date: NaiveDate,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: String,
    pub total: Option<f64>,
}

/// CanonicalSale joined with the wholesale sold map.
/// The date column is written `MM-DD-YYYY`, like the dated file names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WholesaleRecord {
    pub sku: String,
    pub qty: f64,
    pub brand: Option<String>,
    pub cost: Option<f64>,
    #[serde(with = "us_date")]
    pub date: NaiveDate,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: String,
}

/// Per-brand `(sku, cost)` rollup row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandSummaryRow {
    pub sku: String,
    pub cost: f64,
    pub qty: f64,
    pub total: f64,
}

/// Column names of a row type, in the order serde writes them.
/// Lets an empty report still carry its header line.
pub trait CsvColumns {
    const COLUMNS: &'static [&'static str];
}

impl CsvColumns for CanonicalSale {
    const COLUMNS: &'static [&'static str] = &["sku", "qty"];
}

impl CsvColumns for StockEntry {
    const COLUMNS: &'static [&'static str] = &["sku", "qty", "subcategory", "color", "brand"];
}

impl CsvColumns for EnrichedSaleRecord {
    const COLUMNS: &'static [&'static str] =
        &["sku", "qty", "site", "cost", "brand", "date", "Year", "Month", "total"];
}

impl CsvColumns for WholesaleRecord {
    const COLUMNS: &'static [&'static str] =
        &["sku", "qty", "brand", "cost", "date", "Year", "Month"];
}

impl CsvColumns for BrandSummaryRow {
    const COLUMNS: &'static [&'static str] = &["sku", "cost", "qty", "total"];
}

/// Anything that can be sorted into a brand group
pub trait Branded {
    fn brand(&self) -> Option<&str>;
}

impl Branded for EnrichedSaleRecord {
    fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }
}

impl Branded for WholesaleRecord {
    fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }
}

mod us_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%m-%d-%Y";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Lenient numeric coercion: blank or non-numeric text → None
pub fn coerce_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
