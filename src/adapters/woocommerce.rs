// WooCommerce REST orders endpoint (the brand's own storefront)
// Shape: [order] → line_items[] → sku / quantity
// The endpoint has no date filter, so the window is applied here on date_created.

use super::{expect_json, optional_items, order_in_window, qty_value, sku_text, RawPayload, SourceAdapter, SourceKind};
use crate::config::SourceConfig;
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::SaleRecord;

pub struct WooCommerceAdapter;

impl WooCommerceAdapter {
    pub fn new() -> Self {
        WooCommerceAdapter
    }
}

impl SourceAdapter for WooCommerceAdapter {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError> {
        let json = expect_json(payload, &source.name)?;
        let orders = json
            .as_array()
            .ok_or_else(|| SourceError::parse(&source.name, "expected a list of orders"))?;

        let mut records = Vec::new();
        for order in orders.iter().filter(|o| order_in_window(o, "date_created", window)) {
            for item in optional_items(order, "line_items") {
                let qty = qty_value(item.get("quantity"), &source.name)?;
                records.push(SaleRecord::new(sku_text(item.get("sku")), qty, source.name.as_str()));
            }
        }

        Ok(records)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::WooCommerce
    }
}
