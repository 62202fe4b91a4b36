// Faire wholesale orders API
// Shape: orders[] → items[] → sku / quantity

use super::{expect_json, items_at, optional_items, qty_value, sku_text, RawPayload, SourceAdapter, SourceKind};
use crate::config::SourceConfig;
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::SaleRecord;

pub struct FaireAdapter;

impl FaireAdapter {
    pub fn new() -> Self {
        FaireAdapter
    }
}

impl SourceAdapter for FaireAdapter {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        _window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError> {
        // Window applied server side (created_at_min)
        let json = expect_json(payload, &source.name)?;

        let mut records = Vec::new();
        for order in items_at(json, &["orders"], &source.name)? {
            for item in optional_items(order, "items") {
                let qty = qty_value(item.get("quantity"), &source.name)?;
                records.push(SaleRecord::new(sku_text(item.get("sku")), qty, source.name.as_str()));
            }
        }

        Ok(records)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Faire
    }
}
