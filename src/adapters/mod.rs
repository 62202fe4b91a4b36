// 🏗️ Source Adapters
// Polymorphic adapter system: one adapter per marketplace family,
// every one of them emitting the same (sku, qty, site) SaleRecord.

use crate::config::SourceConfig;
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::SaleRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod dsco;
mod faire;
mod flat_file;
mod houzz;
mod mirakl;
mod walmart;
mod wayfair;
mod woocommerce;

pub use dsco::DscoAdapter;
pub use faire::FaireAdapter;
pub use flat_file::FlatFileAdapter;
pub use houzz::HouzzAdapter;
pub use mirakl::MiraklAdapter;
pub use walmart::WalmartAdapter;
pub use wayfair::WayfairAdapter;
pub use woocommerce::WooCommerceAdapter;

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceKind - which marketplace family a source belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Walmart,
    Houzz,
    Faire,
    WooCommerce,
    Dsco,
    Mirakl,
    Wayfair,
    FlatFile,
}

impl SourceKind {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceKind::Walmart => "Walmart",
            SourceKind::Houzz => "Houzz",
            SourceKind::Faire => "Faire",
            SourceKind::WooCommerce => "WooCommerce",
            SourceKind::Dsco => "DSCO",
            SourceKind::Mirakl => "Mirakl",
            SourceKind::Wayfair => "Wayfair",
            SourceKind::FlatFile => "Flat file",
        }
    }

    /// Same spelling as the `kind` tag in the config file
    pub fn code(&self) -> &str {
        match self {
            SourceKind::Walmart => "walmart",
            SourceKind::Houzz => "houzz",
            SourceKind::Faire => "faire",
            SourceKind::WooCommerce => "woo_commerce",
            SourceKind::Dsco => "dsco",
            SourceKind::Mirakl => "mirakl",
            SourceKind::Wayfair => "wayfair",
            SourceKind::FlatFile => "flat_file",
        }
    }
}

/// Raw payload as handed over by the fetch layer
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Json(Value),
    Xml(String),
    Delimited(String),
    /// First worksheet of a spreadsheet, one `Vec` of cell texts per row
    Rows(Vec<Vec<String>>),
}

impl RawPayload {
    pub fn shape(&self) -> &'static str {
        match self {
            RawPayload::Json(_) => "json",
            RawPayload::Xml(_) => "xml",
            RawPayload::Delimited(_) => "delimited",
            RawPayload::Rows(_) => "rows",
        }
    }
}

// ============================================================================
// ADAPTER TRAIT
// ============================================================================

/// SourceAdapter - turns one source's raw payload into SaleRecords
///
/// Adapters never touch the network or the filesystem. A payload that does
/// not have the expected shape is a `SourceError::Parse`; the collector turns
/// that into an empty result for this source only.
pub trait SourceAdapter: Send + Sync {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError>;

    fn kind(&self) -> SourceKind;

    /// Adapter version (for provenance in status lines)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Get the adapter for a source kind
pub fn get_adapter(kind: SourceKind) -> Box<dyn SourceAdapter> {
    match kind {
        SourceKind::Walmart => Box::new(WalmartAdapter::new()),
        SourceKind::Houzz => Box::new(HouzzAdapter::new()),
        SourceKind::Faire => Box::new(FaireAdapter::new()),
        SourceKind::WooCommerce => Box::new(WooCommerceAdapter::new()),
        SourceKind::Dsco => Box::new(DscoAdapter::new()),
        SourceKind::Mirakl => Box::new(MiraklAdapter::new()),
        SourceKind::Wayfair => Box::new(WayfairAdapter::new()),
        SourceKind::FlatFile => Box::new(FlatFileAdapter::new()),
    }
}

// ============================================================================
// SHARED PAYLOAD HELPERS
// ============================================================================

pub(crate) fn expect_json<'a>(payload: &'a RawPayload, source: &str) -> Result<&'a Value, SourceError> {
    match payload {
        RawPayload::Json(value) => Ok(value),
        other => Err(SourceError::parse(
            source,
            format!("expected a json payload, got {}", other.shape()),
        )),
    }
}

/// Follow `path` and return the list found there. A single object where a
/// list is expected is treated as a one-element list.
pub(crate) fn items_at<'a>(
    value: &'a Value,
    path: &[&str],
    source: &str,
) -> Result<Vec<&'a Value>, SourceError> {
    let mut current = value;
    for key in path {
        current = current
            .get(*key)
            .ok_or_else(|| SourceError::parse(source, format!("missing '{}' in {}", key, path.join("."))))?;
    }
    Ok(as_items(current))
}

/// Optional nested list: absent or null means no items
pub(crate) fn optional_items<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    value.get(key).map(as_items).unwrap_or_default()
}

fn as_items(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Sku as text; numbers are rendered, anything else becomes empty
/// (empty skus are dropped by the normalizer)
pub(crate) fn sku_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Quantity from a json number or a numeric string
pub(crate) fn qty_value(value: Option<&Value>, source: &str) -> Result<f64, SourceError> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| SourceError::parse(source, format!("quantity is not a number: {:?}", value)))
}

/// Order timestamp in any of the shapes marketplaces send.
/// Offsets are dropped: the wall-clock part is what gets compared.
pub(crate) fn parse_order_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.naive_local());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Whether an order's timestamp field falls inside the window;
/// missing or unparseable timestamps never do.
pub(crate) fn order_in_window(order: &Value, field: &str, window: &TimeWindow) -> bool {
    order
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(parse_order_time)
        .map(|t| window.contains(t))
        .unwrap_or(false)
}

// ============================================================================
// TESTS
// ============================================================================
