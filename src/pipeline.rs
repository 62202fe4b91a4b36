// 🚚 Pipeline - one scheduled run, start to finish
//
//   references → ledger snapshot → collect sources → reconcile
//              → reports → ledger (last)
//
// Any fatal error aborts before the ledger is written, so the ledger is
// never replaced with a partial computation.

use crate::aggregator::{sum_by_sku, total_qty};
use crate::brand_report::{enrich, enrich_wholesale, write_brand_reports, BrandReport, BrandReportGenerator};
use crate::collector::{Collection, SourceCollector, SourceStatus};
use crate::config::{Config, RunSettings};
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::ledger_store::{open_store, LedgerStore};
use crate::normalizer::{NormalizeReport, RecordNormalizer};
use crate::output::{write_canonical_totals, write_retail_totals};
use crate::records::{AggregatedSale, SaleRecord, StockEntry};
use crate::reference::ReferenceTables;
use crate::sku_mapper::{map_with_report, MappingReport};
use crate::stock_ledger::{apply_with_report, LedgerUpdate};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// RECONCILIATION (pure)
// ============================================================================

/// Everything computed from one run's records; nothing written yet
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub normalize: NormalizeReport,
    pub retail_totals: Vec<AggregatedSale>,
    pub mapping: MappingReport,
    pub ledger: LedgerUpdate,
    pub brand_reports: Vec<BrandReport>,
}

/// normalize → aggregate → map → apply, plus brand enrichment
pub fn reconcile(
    records: Vec<SaleRecord>,
    current_stock: &[StockEntry],
    ctx: &RunContext,
    settings: &RunSettings,
    brand_groups: BTreeMap<String, BTreeSet<String>>,
) -> Reconciliation {
    let normalizer = RecordNormalizer::new(&settings.sentinels, settings.case_folding);
    let (cleaned, normalize) = normalizer.clean_with_report(records);
    tracing::info!("{}", normalize.summary());

    let retail_totals = sum_by_sku(&cleaned);
    tracing::info!(
        skus = retail_totals.len(),
        units = total_qty(&retail_totals),
        "retail totals computed"
    );

    let mapping = map_with_report(&retail_totals, &ctx.references.sku_map);
    for unmapped in &mapping.unmapped {
        tracing::warn!(sku = %unmapped.sku, qty = unmapped.qty, "sold retail sku has no mapping");
    }
    tracing::info!("{}", mapping.summary());

    let ledger = apply_with_report(current_stock, &mapping.sales);
    for untracked in &ledger.untracked {
        tracing::warn!(sku = %untracked.sku, qty = untracked.qty, "sold canonical sku is not in the ledger");
    }
    for sku in &ledger.oversold {
        tracing::warn!(sku = %sku, "stock went negative");
    }
    tracing::info!("{}", ledger.summary());

    let enriched = enrich(&cleaned, &ctx.references.sales_map, ctx);
    let wholesale = enrich_wholesale(&mapping.sales, &ctx.references.wholesale_map, ctx);
    let brand_reports = BrandReportGenerator::new(brand_groups).build(&enriched, &wholesale);

    Reconciliation {
        normalize,
        retail_totals,
        mapping,
        ledger,
        brand_reports,
    }
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub sources: Vec<SourceStatus>,
    pub records_collected: usize,
    pub records_kept: usize,
    pub retail_skus: usize,
    pub canonical_skus: usize,
    pub unmapped_skus: usize,
    pub untracked_skus: usize,
    pub oversold_skus: usize,
    pub ledger_rows: usize,
    pub report_files: usize,
    pub mirror_failures: Vec<String>,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        let ok = self.sources.iter().filter(|s| s.is_ok()).count();
        format!(
            "Run {}{}: {}/{} sources ok, {} records ({} kept), {} retail → {} canonical skus, \
             {} unmapped, {} untracked, {} oversold, {} ledger rows, {} report files",
            self.run_id,
            if self.dry_run { " (dry run)" } else { "" },
            ok,
            self.sources.len(),
            self.records_collected,
            self.records_kept,
            self.retail_skus,
            self.canonical_skus,
            self.unmapped_skus,
            self.untracked_skus,
            self.oversold_skus,
            self.ledger_rows,
            self.report_files
        )
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    store: Box<dyn LedgerStore>,
}

impl Pipeline {
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>, store: Box<dyn LedgerStore>) -> Self {
        Pipeline {
            config,
            fetcher,
            store,
        }
    }

    /// HTTP fetcher and the configured ledger backend
    pub fn from_config(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch.timeout_secs))?;
        let store = open_store(&config.ledger);
        Ok(Pipeline::new(config, Arc::new(fetcher), store))
    }

    pub async fn run(&self, dry_run: bool) -> Result<RunSummary> {
        self.run_at(Local::now().naive_local(), dry_run).await
    }

    /// Run with an explicit clock
    pub async fn run_at(&self, now: NaiveDateTime, dry_run: bool) -> Result<RunSummary> {
        let reference = &self.config.reference;
        let references = ReferenceTables::load(
            &reference.sku_map,
            &reference.sales_map,
            reference.wholesale_map.as_deref(),
        )?;
        let ctx = RunContext::new(now, self.config.run.window_days, references);
        tracing::info!(
            run_id = %ctx.run_id,
            window_start = %ctx.window.start,
            window_end = %ctx.window.end,
            dry_run,
            "run started"
        );

        let snapshot = self
            .store
            .load()
            .with_context(|| format!("Failed to load stock ledger {}", self.store.describe()))?;
        tracing::info!(rows = snapshot.entries.len(), ledger = %self.store.describe(), "stock ledger loaded");

        let collection = self.collect(&ctx).await?;
        let records_collected = collection.records.len();

        let result = reconcile(
            collection.records,
            &snapshot.entries,
            &ctx,
            &self.config.run,
            self.config.brand_groups(),
        );

        let mut summary = RunSummary {
            run_id: ctx.run_id,
            dry_run,
            sources: collection.statuses,
            records_collected,
            records_kept: result.normalize.kept,
            retail_skus: result.retail_totals.len(),
            canonical_skus: result.mapping.sales.len(),
            unmapped_skus: result.mapping.unmapped.len(),
            untracked_skus: result.ledger.untracked.len(),
            oversold_skus: result.ledger.oversold.len(),
            ledger_rows: result.ledger.entries.len(),
            report_files: 0,
            mirror_failures: Vec::new(),
        };

        if dry_run {
            tracing::info!("dry run: no files written");
            return Ok(summary);
        }

        summary.report_files = self.write_reports(&result, &ctx)?;

        let outcome = self
            .store
            .save(&result.ledger.entries, &snapshot.fingerprint)
            .with_context(|| format!("Failed to save stock ledger {}", self.store.describe()))?;
        summary.ledger_rows = outcome.rows;
        summary.mirror_failures = outcome.mirror_failures;

        tracing::info!("{}", summary.summary());
        Ok(summary)
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Collection> {
        let sources = self.config.enabled_sources();
        let collector = SourceCollector::new(
            Arc::clone(&self.fetcher),
            self.config.fetch.max_concurrent,
            Duration::from_secs(self.config.fetch.timeout_secs),
        );
        let collection = collector.collect(&sources, ctx.window).await;

        for status in &collection.statuses {
            println!("{}", status.line());
        }

        if collection.succeeded() == 0 {
            return Err(PipelineError::NoSourceData.into());
        }
        Ok(collection)
    }

    fn write_reports(&self, result: &Reconciliation, ctx: &RunContext) -> Result<usize> {
        let output = &self.config.output;
        let mut files = 0;

        let path = output.dir.join(&output.retail_totals);
        write_retail_totals(&path, &result.retail_totals)?;
        tracing::info!(path = %path.display(), "retail totals written");
        files += 1;

        let path = output.dir.join(&output.canonical_totals);
        write_canonical_totals(&path, &result.mapping.sales)?;
        tracing::info!(path = %path.display(), "canonical totals written");
        files += 1;

        files += write_brand_reports(
            &result.brand_reports,
            &self.config.brand_reports,
            &ctx.date_stamp(),
        )?;
        Ok(files)
    }
}
