// ⚖️ Stock Ledger - apply canonical sales to on-hand stock
//
//   new_qty = stock.qty - sold_qty   (sold_qty = 0 when the sku did not sell)
//
// Left join on current stock: every tracked row survives with its metadata,
// sales for skus the ledger does not track are dropped and reported.

use crate::records::{CanonicalSale, StockEntry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerUpdate {
    pub entries: Vec<StockEntry>,
    /// Non-zero sales for skus with no ledger row
    pub untracked: Vec<CanonicalSale>,
    /// Skus whose on-hand qty went below zero in this run
    pub oversold: Vec<String>,
}

impl LedgerUpdate {
    pub fn summary(&self) -> String {
        format!(
            "Updated {} stock rows; {} untracked skus sold; {} oversold",
            self.entries.len(),
            self.untracked.len(),
            self.oversold.len()
        )
    }
}

/// Contract form: new stock only
pub fn apply_sales(current_stock: &[StockEntry], canonical_sales: &[CanonicalSale]) -> Vec<StockEntry> {
    apply_with_report(current_stock, canonical_sales).entries
}

pub fn apply_with_report(current_stock: &[StockEntry], canonical_sales: &[CanonicalSale]) -> LedgerUpdate {
    let mut sold: HashMap<&str, f64> = HashMap::new();
    for sale in canonical_sales {
        *sold.entry(sale.sku.trim()).or_insert(0.0) += sale.qty;
    }

    let mut oversold = Vec::new();
    let entries: Vec<StockEntry> = current_stock
        .iter()
        .map(|stock| {
            let sold_qty = sold.get(stock.sku.trim()).copied().unwrap_or(0.0);
            let new_qty = stock.qty - sold_qty;
            if new_qty < 0.0 && stock.qty >= 0.0 {
                oversold.push(stock.sku.clone());
            }
            StockEntry {
                qty: new_qty,
                ..stock.clone()
            }
        })
        .collect();

    let tracked: HashSet<&str> = current_stock.iter().map(|s| s.sku.trim()).collect();
    let untracked = canonical_sales
        .iter()
        .filter(|s| s.qty != 0.0 && !tracked.contains(s.sku.trim()))
        .cloned()
        .collect();

    LedgerUpdate {
        entries,
        untracked,
        oversold,
    }
}
