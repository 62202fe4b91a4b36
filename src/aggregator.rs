//! Per-sku quantity totals across every source.

use crate::records::{AggregatedSale, SaleRecord};
use std::collections::BTreeMap;

/// Sum qty per exact sku, sorted by sku ascending
pub fn sum_by_sku(records: &[SaleRecord]) -> Vec<AggregatedSale> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        *totals.entry(record.sku.as_str()).or_insert(0.0) += record.qty;
    }

    totals
        .into_iter()
        .map(|(sku, qty)| AggregatedSale {
            sku: sku.to_string(),
            qty,
        })
        .collect()
}

pub fn total_qty(sales: &[AggregatedSale]) -> f64 {
    sales.iter().map(|s| s.qty).sum()
}
