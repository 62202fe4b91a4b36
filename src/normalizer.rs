// 🧹 Record Normalizer - clean adapter output before aggregation
// Drops sentinel rows (header leakage, "no file" placeholders), trims and
// case-folds the sku, and guarantees every surviving record has a sku.

use crate::records::SaleRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which fields get lower-cased
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFolding {
    /// Only the sku join key
    #[default]
    SkuOnly,
    /// sku and site, as the legacy job did
    AllFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub input: usize,
    pub kept: usize,
    pub dropped_sentinel: usize,
    pub dropped_empty_sku: usize,
    pub dropped_invalid_qty: usize,
}

impl NormalizeReport {
    pub fn dropped(&self) -> usize {
        self.dropped_sentinel + self.dropped_empty_sku + self.dropped_invalid_qty
    }

    pub fn summary(&self) -> String {
        format!(
            "Normalized {} records: kept {}, dropped {} (sentinel {}, empty sku {}, invalid qty {})",
            self.input,
            self.kept,
            self.dropped(),
            self.dropped_sentinel,
            self.dropped_empty_sku,
            self.dropped_invalid_qty
        )
    }
}

pub struct RecordNormalizer {
    /// Lower-cased, trimmed sentinel values
    sentinels: HashSet<String>,
    case_folding: CaseFolding,
}

impl RecordNormalizer {
    pub fn new<I, S>(sentinels: I, case_folding: CaseFolding) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RecordNormalizer {
            sentinels: sentinels
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
            case_folding,
        }
    }

    pub fn is_sentinel(&self, sku: &str) -> bool {
        self.sentinels.contains(&sku.trim().to_lowercase())
    }

    /// Contract form: cleaned records only
    pub fn clean(&self, records: Vec<SaleRecord>) -> Vec<SaleRecord> {
        self.clean_with_report(records).0
    }

    pub fn clean_with_report(&self, records: Vec<SaleRecord>) -> (Vec<SaleRecord>, NormalizeReport) {
        let mut report = NormalizeReport {
            input: records.len(),
            ..NormalizeReport::default()
        };

        let mut cleaned = Vec::with_capacity(records.len());
        for record in records {
            let sku = record.sku.trim().to_lowercase();

            if self.sentinels.contains(&sku) {
                report.dropped_sentinel += 1;
                continue;
            }
            if sku.is_empty() {
                report.dropped_empty_sku += 1;
                continue;
            }
            if !record.qty.is_finite() || record.qty < 0.0 {
                report.dropped_invalid_qty += 1;
                continue;
            }

            let site = match self.case_folding {
                CaseFolding::SkuOnly => record.site,
                CaseFolding::AllFields => record.site.to_lowercase(),
            };
            cleaned.push(SaleRecord::new(sku, record.qty, site));
        }

        report.kept = cleaned.len();
        (cleaned, report)
    }
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        RecordNormalizer::new(["sku", "item sku", "other"], CaseFolding::SkuOnly)
    }
}
