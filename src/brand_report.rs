// 🏷️ Brand Reports - cost/brand enrichment and per-brand segmentation
//
// Reporting only: nothing here feeds back into the ledger.
//
//   retail:    SaleRecord ⟕ sales_map      → EnrichedSaleRecord  → by brand
//   wholesale: CanonicalSale ⟕ wholesale_map → WholesaleRecord   → by brand

use crate::config::BrandReportConfig;
use crate::context::RunContext;
use crate::output::{dated_named_path, dated_path, write_csv};
use crate::records::{
    coerce_number, BrandSummaryRow, Branded, CanonicalSale, EnrichedSaleRecord, SaleRecord,
    SalesSkuEntry, WholesaleMapEntry, WholesaleRecord,
};
use anyhow::Result;
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Brand comparison key
fn brand_key(brand: &str) -> String {
    brand.trim().to_lowercase()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// ENRICHMENT
// ============================================================================

/// Left join on trimmed, case-insensitive sku. The first map row wins when
/// the map repeats a sku.
pub fn enrich(records: &[SaleRecord], sales_map: &[SalesSkuEntry], ctx: &RunContext) -> Vec<EnrichedSaleRecord> {
    let mut lookup: HashMap<String, &SalesSkuEntry> = HashMap::new();
    for entry in sales_map {
        lookup.entry(entry.sku.trim().to_lowercase()).or_insert(entry);
    }

    let date = ctx.report_date();
    let year = chrono::Datelike::year(&date);
    let month = ctx.month_name();

    records
        .iter()
        .map(|record| {
            let matched = lookup.get(&record.sku.trim().to_lowercase());
            let cost = matched.and_then(|m| coerce_number(&m.cost));
            let brand = matched.and_then(|m| non_empty(&m.brand));

            EnrichedSaleRecord {
                sku: record.sku.trim().to_string(),
                qty: record.qty,
                site: record.site.clone(),
                cost,
                brand,
                date,
                year,
                month: month.clone(),
                total: cost.map(|c| c * record.qty),
            }
        })
        .collect()
}

/// Canonical sales joined with the wholesale sold map on trimmed sku
pub fn enrich_wholesale(
    canonical: &[CanonicalSale],
    wholesale_map: &[WholesaleMapEntry],
    ctx: &RunContext,
) -> Vec<WholesaleRecord> {
    let mut lookup: HashMap<String, &WholesaleMapEntry> = HashMap::new();
    for entry in wholesale_map {
        lookup.entry(entry.sku.trim().to_lowercase()).or_insert(entry);
    }

    let date = ctx.report_date();
    let year = chrono::Datelike::year(&date);
    let month = ctx.month_name();

    canonical
        .iter()
        .map(|sale| {
            let matched = lookup.get(&sale.sku.trim().to_lowercase());
            WholesaleRecord {
                sku: sale.sku.trim().to_string(),
                qty: sale.qty,
                brand: matched.and_then(|m| non_empty(&m.brand)),
                cost: matched.and_then(|m| coerce_number(&m.cost)),
                date,
                year,
                month: month.clone(),
            }
        })
        .collect()
}

// ============================================================================
// SEGMENTATION
// ============================================================================

/// Partition records by brand-set membership. Every group appears in the
/// result, even when no record belongs to it.
pub fn segment_by_brand<T: Branded + Clone>(
    records: &[T],
    brand_groups: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, Vec<T>> {
    brand_groups
        .iter()
        .map(|(name, brands)| {
            let wanted: BTreeSet<String> = brands.iter().map(|b| brand_key(b)).collect();
            let members = records
                .iter()
                .filter(|r| r.brand().map(|b| wanted.contains(&brand_key(b))).unwrap_or(false))
                .cloned()
                .collect();
            (name.clone(), members)
        })
        .collect()
}

/// `(sku, cost)` rollup: qty summed, total recomputed.
/// Returns the rows and how many records were left out for lacking a cost.
pub fn summarize_by_sku_cost(records: &[EnrichedSaleRecord]) -> (Vec<BrandSummaryRow>, usize) {
    let mut groups: BTreeMap<(String, OrderedFloat<f64>), f64> = BTreeMap::new();
    let mut skipped = 0;

    for record in records {
        match record.cost {
            Some(cost) => {
                *groups
                    .entry((record.sku.clone(), OrderedFloat(cost)))
                    .or_insert(0.0) += record.qty;
            }
            None => skipped += 1,
        }
    }

    let rows = groups
        .into_iter()
        .map(|((sku, cost), qty)| BrandSummaryRow {
            sku,
            cost: cost.into_inner(),
            qty,
            total: cost.into_inner() * qty,
        })
        .collect();

    (rows, skipped)
}

// ============================================================================
// REPORT GENERATOR
// ============================================================================

/// Everything produced for one configured brand group
#[derive(Debug, Clone, PartialEq)]
pub struct BrandReport {
    pub name: String,
    pub sales: Vec<EnrichedSaleRecord>,
    pub wholesale: Vec<WholesaleRecord>,
    pub summary: Vec<BrandSummaryRow>,
    /// Sales rows left out of the summary for lacking a cost
    pub summary_skipped: usize,
}

impl BrandReport {
    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} sales rows, {} wholesale rows, {} summary rows ({} without cost)",
            self.name,
            self.sales.len(),
            self.wholesale.len(),
            self.summary.len(),
            self.summary_skipped
        )
    }
}

pub struct BrandReportGenerator {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl BrandReportGenerator {
    pub fn new(groups: BTreeMap<String, BTreeSet<String>>) -> Self {
        BrandReportGenerator { groups }
    }

    pub fn build(&self, enriched: &[EnrichedSaleRecord], wholesale: &[WholesaleRecord]) -> Vec<BrandReport> {
        let mut sales_by_group = segment_by_brand(enriched, &self.groups);
        let mut wholesale_by_group = segment_by_brand(wholesale, &self.groups);

        self.groups
            .keys()
            .map(|name| {
                let sales = sales_by_group.remove(name).unwrap_or_default();
                let wholesale = wholesale_by_group.remove(name).unwrap_or_default();
                let (summary, summary_skipped) = summarize_by_sku_cost(&sales);
                BrandReport {
                    name: name.clone(),
                    sales,
                    wholesale,
                    summary,
                    summary_skipped,
                }
            })
            .collect()
    }
}

/// Write the dated files of every report whose config names a directory.
/// Returns the number of files written.
pub fn write_brand_reports(
    reports: &[BrandReport],
    configs: &[BrandReportConfig],
    date_stamp: &str,
) -> Result<usize> {
    let mut files = 0;

    for report in reports {
        let Some(config) = configs.iter().find(|c| c.name == report.name) else {
            continue;
        };

        if let Some(dir) = &config.sales_dir {
            write_csv(&dated_path(dir, date_stamp), &report.sales)?;
            files += 1;
        }
        if let Some(dir) = &config.wholesale_dir {
            write_csv(&dated_path(dir, date_stamp), &report.wholesale)?;
            files += 1;
        }
        if let Some(dir) = &config.summary_dir {
            write_csv(&dated_named_path(dir, date_stamp, &report.name), &report.summary)?;
            files += 1;
        }

        tracing::info!(report = %report.name, "{}", report.summary_line());
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceTables;
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    fn ctx() -> RunContext {
        let now = NaiveDateTime::parse_from_str("2024-03-27 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        RunContext::new(now, 7, ReferenceTables::default())
    }

    fn sales_map() -> Vec<SalesSkuEntry> {
        vec![
            SalesSkuEntry {
                sku: " RUG-1 ".to_string(),
                cost: "12.5".to_string(),
                brand: "Brand1".to_string(),
            },
            SalesSkuEntry {
                sku: "pillow-2".to_string(),
                cost: "n/a".to_string(),
                brand: "brand2".to_string(),
            },
            SalesSkuEntry {
                sku: "lamp-3".to_string(),
                cost: "40".to_string(),
                brand: "brand3".to_string(),
            },
        ]
    }

    fn groups() -> BTreeMap<String, BTreeSet<String>> {
        let mut groups = BTreeMap::new();
        groups.insert("brand1".to_string(), BTreeSet::from(["Brand1".to_string()]));
        groups.insert(
            "brand2s".to_string(),
            BTreeSet::from(["brand2".to_string(), "brand3".to_string()]),
        );
        groups
    }

    #[test]
    fn test_enrich_adds_cost_brand_and_date() {
        let records = vec![SaleRecord::new("rug-1", 2.0, "Faire")];
        let out = enrich(&records, &sales_map(), &ctx());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cost, Some(12.5));
        assert_eq!(out[0].brand.as_deref(), Some("Brand1"));
        assert_eq!(out[0].total, Some(25.0));
        assert_eq!(out[0].year, 2024);
        assert_eq!(out[0].month, "March");
        assert_eq!(out[0].date.to_string(), "2024-03-27");
    }

    #[test]
    fn test_non_numeric_cost_leaves_total_missing() {
        let records = vec![
            SaleRecord::new("pillow-2", 1.0, "Wayfair"),
            SaleRecord::new("unknown", 1.0, "Wayfair"),
        ];
        let out = enrich(&records, &sales_map(), &ctx());

        assert_eq!(out[0].cost, None);
        assert_eq!(out[0].total, None);
        assert_eq!(out[0].brand.as_deref(), Some("brand2"));
        assert_eq!(out[1].brand, None);
    }

    #[test]
    fn test_segment_by_brand_groups_and_ignores_case() {
        let records = vec![
            SaleRecord::new("rug-1", 2.0, "Faire"),
            SaleRecord::new("lamp-3", 1.0, "Houzz"),
            SaleRecord::new("pillow-2", 4.0, "Houzz"),
            SaleRecord::new("unknown", 1.0, "Houzz"),
        ];
        let enriched = enrich(&records, &sales_map(), &ctx());

        let mut upper = groups();
        upper.insert("brand1".to_string(), BTreeSet::from([" BRAND1 ".to_string()]));
        let segmented = segment_by_brand(&enriched, &upper);

        assert_eq!(segmented["brand1"].len(), 1);
        assert_eq!(segmented["brand2s"].len(), 2);
    }

    #[test]
    fn test_every_group_present_even_when_empty() {
        let segmented = segment_by_brand::<EnrichedSaleRecord>(&[], &groups());
        assert_eq!(segmented.len(), 2);
        assert!(segmented.values().all(|v| v.is_empty()));
    }

    #[test]
    fn test_summary_groups_by_sku_and_cost() {
        let records = vec![
            SaleRecord::new("rug-1", 2.0, "Faire"),
            SaleRecord::new("rug-1", 3.0, "Houzz"),
            SaleRecord::new("pillow-2", 4.0, "Houzz"),
        ];
        let enriched = enrich(&records, &sales_map(), &ctx());

        let (rows, skipped) = summarize_by_sku_cost(&enriched);

        assert_eq!(
            rows,
            vec![BrandSummaryRow {
                sku: "rug-1".to_string(),
                cost: 12.5,
                qty: 5.0,
                total: 62.5,
            }]
        );
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_wholesale_uses_its_own_brand_column() {
        let canonical = vec![CanonicalSale::new("CANON_A", 10.0), CanonicalSale::new("CANON_B", 0.0)];
        let map = vec![
            WholesaleMapEntry {
                sku: "CANON_A ".to_string(),
                brand: "brand3".to_string(),
                cost: "7".to_string(),
            },
        ];

        let wholesale = enrich_wholesale(&canonical, &map, &ctx());
        let segmented = segment_by_brand(&wholesale, &groups());

        assert_eq!(wholesale[0].cost, Some(7.0));
        assert_eq!(wholesale[1].brand, None);
        assert_eq!(segmented["brand2s"].len(), 1);
        assert!(segmented["brand1"].is_empty());
    }

    #[test]
    fn test_generator_writes_dated_files() {
        let dir = TempDir::new().unwrap();
        let configs = vec![BrandReportConfig {
            name: "brand1".to_string(),
            brands: vec!["Brand1".to_string()],
            sales_dir: Some(dir.path().join("eh/data")),
            wholesale_dir: Some(dir.path().join("eh/data/wholesale")),
            summary_dir: Some(dir.path().join("gonder")),
        }];
        let mut only_brand1 = BTreeMap::new();
        only_brand1.insert("brand1".to_string(), BTreeSet::from(["Brand1".to_string()]));

        let context = ctx();
        let enriched = enrich(&[SaleRecord::new("rug-1", 2.0, "Faire")], &sales_map(), &context);
        let wholesale = enrich_wholesale(
            &[CanonicalSale::new("CANON_A", 2.0)],
            &[WholesaleMapEntry {
                sku: "CANON_A".to_string(),
                brand: "Brand1".to_string(),
                cost: "7".to_string(),
            }],
            &context,
        );

        let reports = BrandReportGenerator::new(only_brand1).build(&enriched, &wholesale);
        let files = write_brand_reports(&reports, &configs, &context.date_stamp()).unwrap();

        assert_eq!(files, 3);
        assert!(dir.path().join("eh/data/03-27-2024.csv").exists());
        assert!(dir.path().join("gonder/03-27-2024-brand1.csv").exists());

        let wholesale_text =
            std::fs::read_to_string(dir.path().join("eh/data/wholesale/03-27-2024.csv")).unwrap();
        assert!(wholesale_text.starts_with("sku,qty,brand,cost,date,Year,Month\n"));
        assert!(wholesale_text.contains("CANON_A,2.0,Brand1,7.0,03-27-2024,2024,March"));
    }
}
