// DSCO (Rithum) dropship orders API - one configured source per retailer token
// Shape: orders[] → lineItems[] → sku / quantity
// dscoCreateDate carries an offset; the wall time is compared against the window.

use super::{expect_json, items_at, optional_items, order_in_window, qty_value, sku_text, RawPayload, SourceAdapter, SourceKind};
use crate::config::SourceConfig;
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::SaleRecord;

pub struct DscoAdapter;

impl DscoAdapter {
    pub fn new() -> Self {
        DscoAdapter
    }
}

impl SourceAdapter for DscoAdapter {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError> {
        let json = expect_json(payload, &source.name)?;
        let orders = items_at(json, &["orders"], &source.name)?;

        let mut records = Vec::new();
        for order in orders.into_iter().filter(|o| order_in_window(o, "dscoCreateDate", window)) {
            if order.get("lineItems").is_none() {
                return Err(SourceError::parse(&source.name, "order without lineItems"));
            }
            for item in optional_items(order, "lineItems") {
                let qty = qty_value(item.get("quantity"), &source.name)?;
                records.push(SaleRecord::new(sku_text(item.get("sku")), qty, source.name.as_str()));
            }
        }

        Ok(records)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Dsco
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{source, window};
    use crate::config::SourceSpec;
    use serde_json::json;

    fn nordstrom() -> SourceConfig {
        source(
            "Nordstrom",
            SourceSpec::Dsco {
                base_url: "https://api.example.test/order/page".to_string(),
                token: "nrdtoken".to_string(),
            },
        )
    }

    #[test]
    fn test_dsco_uses_source_name_as_site() {
        let payload = RawPayload::Json(json!({
            "orders": [
                {"dscoCreateDate": "2024-03-22T10:00:00-05:00", "lineItems": [
                    {"sku": "RUG-1", "quantity": 1}
                ]},
                {"dscoCreateDate": "2024-03-10T10:00:00-05:00", "lineItems": [
                    {"sku": "RUG-1", "quantity": 4}
                ]}
            ]
        }));

        let records = DscoAdapter::new()
            .normalize(&nordstrom(), &payload, &window())
            .unwrap();

        assert_eq!(records, vec![SaleRecord::new("RUG-1", 1.0, "Nordstrom")]);
    }

    #[test]
    fn test_dsco_empty_orders() {
        let payload = RawPayload::Json(json!({"orders": []}));
        let records = DscoAdapter::new()
            .normalize(&nordstrom(), &payload, &window())
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_dsco_order_without_line_items_is_parse_error() {
        let payload = RawPayload::Json(json!({
            "orders": [{"dscoCreateDate": "2024-03-22T10:00:00Z"}]
        }));
        let err = DscoAdapter::new()
            .normalize(&nordstrom(), &payload, &window())
            .unwrap_err();
        assert_eq!(err.kind(), "parse");
    }
}
