// Mirakl operator orders API (one configured source per operator)
// Shape: orders[] → order_lines[] → offer_sku / quantity
// Canceled orders are dropped whole, before their lines are exploded.

use super::{expect_json, items_at, optional_items, qty_value, sku_text, RawPayload, SourceAdapter, SourceKind};
use crate::config::SourceConfig;
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::SaleRecord;
use serde_json::Value;

const CANCELED_STATE: &str = "CANCELED";

pub struct MiraklAdapter;

impl MiraklAdapter {
    pub fn new() -> Self {
        MiraklAdapter
    }

    fn is_canceled(order: &Value) -> bool {
        order.get("order_state").and_then(|s| s.as_str()) == Some(CANCELED_STATE)
    }
}

impl SourceAdapter for MiraklAdapter {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        _window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError> {
        // Window applied server side (start_date / end_date)
        let json = expect_json(payload, &source.name)?;
        let orders = items_at(json, &["orders"], &source.name)?;

        let mut records = Vec::new();
        for order in orders.into_iter().filter(|o| !Self::is_canceled(o)) {
            for line in optional_items(order, "order_lines") {
                let qty = qty_value(line.get("quantity"), &source.name)?;
                records.push(SaleRecord::new(sku_text(line.get("offer_sku")), qty, source.name.as_str()));
            }
        }

        Ok(records)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mirakl
    }
}
