// Walmart Marketplace orders API
// Shape: list.elements.order[] → orderLines.orderLine[] → item.sku / orderLineQuantity.amount

use super::{expect_json, items_at, qty_value, sku_text, RawPayload, SourceAdapter, SourceKind};
use crate::config::SourceConfig;
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::SaleRecord;

pub struct WalmartAdapter;

impl WalmartAdapter {
    pub fn new() -> Self {
        WalmartAdapter
    }
}

impl SourceAdapter for WalmartAdapter {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        _window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError> {
        // Window applied server side (createdStartDate)
        let json = expect_json(payload, &source.name)?;
        let orders = items_at(json, &["list", "elements", "order"], &source.name)?;

        let mut records = Vec::new();
        for order in orders {
            for line in items_at(order, &["orderLines", "orderLine"], &source.name)? {
                let sku = sku_text(line.pointer("/item/sku"));
                let qty = qty_value(line.pointer("/orderLineQuantity/amount"), &source.name)?;
                records.push(SaleRecord::new(sku, qty, source.name.as_str()));
            }
        }

        Ok(records)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Walmart
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{source, window};
    use crate::config::SourceSpec;
    use serde_json::json;

    fn walmart() -> SourceConfig {
        source(
            "walmart",
            SourceSpec::Walmart {
                token_url: "https://example.test/token".to_string(),
                orders_url: "https://example.test/orders".to_string(),
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                correlation_id: "corr".to_string(),
                service_name: "svc".to_string(),
            },
        )
    }

    #[test]
    fn test_walmart_explodes_order_lines() {
        let payload = RawPayload::Json(json!({
            "list": {"elements": {"order": [
                {"purchaseOrderId": "1", "orderLines": {"orderLine": [
                    {"item": {"sku": "RUG-1"}, "orderLineQuantity": {"amount": "2"}},
                    {"item": {"sku": "RUG-2"}, "orderLineQuantity": {"amount": "1"}}
                ]}},
                {"purchaseOrderId": "2", "orderLines": {"orderLine": [
                    {"item": {"sku": "RUG-1"}, "orderLineQuantity": {"amount": "3"}}
                ]}}
            ]}}
        }));

        let records = WalmartAdapter::new()
            .normalize(&walmart(), &payload, &window())
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], SaleRecord::new("RUG-1", 2.0, "walmart"));
        assert_eq!(records[2].qty, 3.0);
    }

    #[test]
    fn test_walmart_missing_order_list_is_parse_error() {
        let payload = RawPayload::Json(json!({"errors": [{"code": "UNAUTHORIZED"}]}));
        let err = WalmartAdapter::new()
            .normalize(&walmart(), &payload, &window())
            .unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_walmart_rejects_xml_payload() {
        let payload = RawPayload::Xml("<orders/>".to_string());
        assert!(WalmartAdapter::new()
            .normalize(&walmart(), &payload, &window())
            .is_err());
    }
}
