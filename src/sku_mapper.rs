// 🔁 SKU Mapper - retail skus → canonical (wholesale) units
//
//   canonical_qty(name) = Σ over mapping rows with sku_name == name of
//                         sold_qty(sku_part) × multiplier
//
// Right join on the mapping table: every canonical sku shows up, unsold ones
// with qty 0. Retail skus without a mapping row are dropped and reported.

use crate::records::{AggregatedSale, CanonicalSale, SkuMapping};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingReport {
    pub sales: Vec<CanonicalSale>,
    /// Retail skus that sold but have no mapping row
    pub unmapped: Vec<AggregatedSale>,
}

impl MappingReport {
    pub fn unmapped_qty(&self) -> f64 {
        self.unmapped.iter().map(|s| s.qty).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "Mapped to {} canonical skus; {} retail skus unmapped ({} units)",
            self.sales.len(),
            self.unmapped.len(),
            self.unmapped_qty()
        )
    }
}

/// Contract form: canonical totals only
pub fn map_to_canonical(sold: &[AggregatedSale], mappings: &[SkuMapping]) -> Vec<CanonicalSale> {
    map_with_report(sold, mappings).sales
}

pub fn map_with_report(sold: &[AggregatedSale], mappings: &[SkuMapping]) -> MappingReport {
    let sold_by_sku: HashMap<&str, f64> = sold.iter().map(|s| (s.sku.as_str(), s.qty)).collect();

    // Multiply per mapping row first, then group
    let mut canonical: BTreeMap<&str, f64> = BTreeMap::new();
    for mapping in mappings {
        let qty = sold_by_sku.get(mapping.sku_part.as_str()).copied().unwrap_or(0.0);
        *canonical.entry(mapping.sku_name.as_str()).or_insert(0.0) += qty * mapping.multiplier;
    }

    let mapped_parts: HashSet<&str> =
        mappings.iter().map(|m| m.sku_part.as_str()).collect();
    let unmapped = sold
        .iter()
        .filter(|s| !mapped_parts.contains(s.sku.as_str()))
        .cloned()
        .collect();

    MappingReport {
        sales: canonical
            .into_iter()
            .map(|(sku, qty)| CanonicalSale::new(sku, qty))
            .collect(),
        unmapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sold(sku: &str, qty: f64) -> AggregatedSale {
        AggregatedSale {
            sku: sku.to_string(),
            qty,
        }
    }

    #[test]
    fn test_three_retail_skus_collapse_into_one() {
        let sales = vec![sold("r1", 5.0), sold("r2", 4.0), sold("r3", 2.0)];
        let mappings = vec![
            SkuMapping::new("r1", "CANON", 1.0),
            SkuMapping::new("r2", "CANON", 2.0),
            SkuMapping::new("r3", "CANON", 3.0),
        ];

        let out = map_to_canonical(&sales, &mappings);

        // 5×1 + 4×2 + 2×3
        assert_eq!(out, vec![CanonicalSale::new("CANON", 19.0)]);
    }

    #[test]
    fn test_multiplier_applied_before_grouping() {
        // Summing first (5 + 4) and multiplying by either multiplier would give 9 or 18
        let sales = vec![sold("r1", 5.0), sold("r2", 4.0)];
        let mappings = vec![
            SkuMapping::new("r1", "CANON", 1.0),
            SkuMapping::new("r2", "CANON", 2.0),
        ];

        assert_eq!(map_to_canonical(&sales, &mappings)[0].qty, 13.0);
    }

    #[test]
    fn test_unsold_canonical_skus_appear_with_zero() {
        let sales = vec![sold("r1", 2.0)];
        let mappings = vec![
            SkuMapping::new("r1", "CANON_A", 1.0),
            SkuMapping::new("r9", "CANON_B", 4.0),
        ];

        let out = map_to_canonical(&sales, &mappings);

        assert_eq!(
            out,
            vec![CanonicalSale::new("CANON_A", 2.0), CanonicalSale::new("CANON_B", 0.0)]
        );
    }

    #[test]
    fn test_unmapped_retail_skus_are_reported() {
        let sales = vec![sold("r1", 2.0), sold("stray", 3.0)];
        let mappings = vec![SkuMapping::new("r1", "CANON_A", 1.0)];

        let report = map_with_report(&sales, &mappings);

        assert_eq!(report.sales.len(), 1);
        assert_eq!(report.unmapped, vec![sold("stray", 3.0)]);
        assert_eq!(report.unmapped_qty(), 3.0);
    }

    #[test]
    fn test_one_retail_sku_feeding_two_canonicals() {
        let sales = vec![sold("set-2", 3.0)];
        let mappings = vec![
            SkuMapping::new("set-2", "CHAIR", 2.0),
            SkuMapping::new("set-2", "TABLE", 1.0),
        ];

        let out = map_to_canonical(&sales, &mappings);
        assert_eq!(
            out,
            vec![CanonicalSale::new("CHAIR", 6.0), CanonicalSale::new("TABLE", 3.0)]
        );
    }
}
