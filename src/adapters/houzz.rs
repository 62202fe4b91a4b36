// Houzz getOrders API (XML)
// Every <Order> → every <OrderItem> → <SKU> / <Quantity>

use super::{RawPayload, SourceAdapter, SourceKind};
use crate::config::SourceConfig;
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::records::SaleRecord;
use roxmltree::{Document, Node};

pub struct HouzzAdapter;

impl HouzzAdapter {
    pub fn new() -> Self {
        HouzzAdapter
    }
}

fn child_text<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
}

impl SourceAdapter for HouzzAdapter {
    fn normalize(
        &self,
        source: &SourceConfig,
        payload: &RawPayload,
        _window: &TimeWindow,
    ) -> Result<Vec<SaleRecord>, SourceError> {
        let xml = match payload {
            RawPayload::Xml(text) => text,
            other => {
                return Err(SourceError::parse(
                    &source.name,
                    format!("expected an xml payload, got {}", other.shape()),
                ))
            }
        };

        let doc = Document::parse(xml)
            .map_err(|e| SourceError::parse(&source.name, format!("invalid xml: {}", e)))?;

        let mut records = Vec::new();
        for order in doc.descendants().filter(|n| n.has_tag_name("Order")) {
            for item in order.descendants().filter(|n| n.has_tag_name("OrderItem")) {
                let sku = child_text(item, "SKU")
                    .ok_or_else(|| SourceError::parse(&source.name, "OrderItem without SKU"))?;
                let qty_raw = child_text(item, "Quantity")
                    .ok_or_else(|| SourceError::parse(&source.name, "OrderItem without Quantity"))?;
                let qty = qty_raw.trim().parse::<i64>().map_err(|_| {
                    SourceError::parse(&source.name, format!("quantity is not an integer: {}", qty_raw))
                })?;
                records.push(SaleRecord::new(sku, qty as f64, source.name.as_str()));
            }
        }

        Ok(records)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Houzz
    }
}
