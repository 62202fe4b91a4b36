// Wayfair supplier GraphQL API
// Shape: data.getDropshipPurchaseOrders[] → products[] → partNumber / quantity

use super::{expect_json, optional_items, qty_value, sku_text, RawPayload, SourceAdapter, SourceKind};
use crate::config::SourceConfig;
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::SaleRecord;
use serde_json::Value;

const ORDERS_FIELD: &str = "getDropshipPurchaseOrders";

pub struct WayfairAdapter;

impl WayfairAdapter {
    pub fn new() -> Self {
        WayfairAdapter
    }
}

impl SourceAdapter for WayfairAdapter {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        _window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError> {
        // Window applied server side (fromDate)
        let json = expect_json(payload, &source.name)?;
        let orders = json
            .get("data")
            .and_then(|d| d.as_object())
            .and_then(|d| d.get(ORDERS_FIELD))
            .ok_or_else(|| SourceError::parse(&source.name, "Expected keys not found in the response"))?;

        let orders: &[Value] = match orders {
            Value::Array(list) => list.as_slice(),
            Value::Null => &[],
            _ => return Err(SourceError::parse(&source.name, "purchase orders is not a list")),
        };

        let mut records = Vec::new();
        for order in orders {
            for product in optional_items(order, "products") {
                // Missing fields fall back to an empty part number and zero quantity
                let qty = match product.get("quantity") {
                    None | Some(Value::Null) => 0.0,
                    quantity => qty_value(quantity, &source.name)?,
                };
                records.push(SaleRecord::new(
                    sku_text(product.get("partNumber")),
                    qty,
                    source.name.as_str(),
                ));
            }
        }

        Ok(records)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Wayfair
    }
}
