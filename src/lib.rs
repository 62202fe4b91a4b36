// Stock Sync - Core Library
// Marketplace sales → canonical units → stock ledger, plus brand reports.
// Exposes all modules for use in the CLI and tests.

pub mod adapters;
pub mod aggregator;
pub mod brand_report;
pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod ledger_store;
pub mod logging;
pub mod normalizer;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod reference;
pub mod sku_mapper;
pub mod stock_ledger;

// Re-export commonly used types
pub use adapters::{get_adapter, RawPayload, SourceAdapter, SourceKind};
pub use aggregator::sum_by_sku;
pub use brand_report::{
    enrich, enrich_wholesale, segment_by_brand, summarize_by_sku_cost,
    BrandReport, BrandReportGenerator,
};
pub use collector::{Collection, SourceCollector, SourceStatus};
pub use config::{load_config, Config, SourceConfig, SourceSpec, CONFIG_ENV, DEFAULT_CONFIG_PATH};
pub use context::{RunContext, TimeWindow};
pub use error::{PipelineError, SourceError};
pub use fetch::{Fetched, Fetcher, HttpFetcher};
pub use ledger_store::{
    fingerprint, open_store, CsvLedgerStore, LedgerSnapshot, LedgerStore, SqliteLedgerStore,
};
pub use normalizer::{CaseFolding, NormalizeReport, RecordNormalizer};
pub use pipeline::{reconcile, Pipeline, Reconciliation, RunSummary};
pub use records::{
    AggregatedSale, BrandSummaryRow, CanonicalSale, EnrichedSaleRecord, SaleRecord,
    SalesSkuEntry, SkuMapping, StockEntry, WholesaleMapEntry, WholesaleRecord,
};
pub use reference::ReferenceTables;
pub use sku_mapper::{map_to_canonical, map_with_report, MappingReport};
pub use stock_ledger::{apply_sales, apply_with_report, LedgerUpdate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
