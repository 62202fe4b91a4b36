//! Run configuration, loaded from a TOML file.
//!
//! Sources are an array of tables tagged by `kind`; adding a marketplace
//! account is a config change, not a code change.

use crate::adapters::SourceKind;
use crate::error::PipelineError;
use crate::normalizer::CaseFolding;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default config location
pub const CONFIG_ENV: &str = "STOCK_SYNC_CONFIG";

/// Used when neither `--config` nor the environment names a file
pub const DEFAULT_CONFIG_PATH: &str = "stock-sync.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    pub reference: ReferencePaths,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub brand_reports: Vec<BrandReportConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunSettings {
    /// Trailing order window, in days
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default)]
    pub case_folding: CaseFolding,
    /// Sku values that mark header leakage or placeholder rows
    #[serde(default = "default_sentinels")]
    pub sentinels: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            window_days: default_window_days(),
            case_folding: CaseFolding::default(),
            sentinels: default_sentinels(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchSettings {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            max_concurrent: default_max_concurrent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReferencePaths {
    /// `sku_part,sku_name,multiplier`
    pub sku_map: PathBuf,
    /// `SKU,cost,brand`
    pub sales_map: PathBuf,
    /// `sku,brand,cost` - wholesale reports are skipped without it
    #[serde(default)]
    pub wholesale_map: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    #[default]
    Csv,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,
    /// CSV ledger file, or SQLite database file
    pub path: PathBuf,
    /// CSV copies written after the ledger itself
    #[serde(default)]
    pub mirrors: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_retail_totals")]
    pub retail_totals: String,
    #[serde(default = "default_canonical_totals")]
    pub canonical_totals: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: default_output_dir(),
            retail_totals: default_retail_totals(),
            canonical_totals: default_canonical_totals(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            file: None,
        }
    }
}

/// One configured source instance (one marketplace account or one file)
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Site name stamped on every record of this source
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub spec: SourceSpec,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Walmart {
        token_url: String,
        orders_url: String,
        client_id: String,
        client_secret: String,
        correlation_id: String,
        service_name: String,
    },
    Houzz {
        base_url: String,
        token: String,
        user_name: String,
        app_name: String,
    },
    Faire {
        orders_url: String,
        access_token: String,
    },
    WooCommerce {
        url: String,
        user: String,
        password: String,
    },
    Dsco {
        base_url: String,
        token: String,
    },
    Mirakl {
        url: String,
        api_key: String,
        #[serde(default = "default_mirakl_max")]
        max: u32,
    },
    Wayfair {
        auth_url: String,
        api_url: String,
        client_id: String,
        client_secret: String,
        audience: String,
        #[serde(default = "default_wayfair_limit")]
        limit: u32,
    },
    FlatFile {
        path: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
        /// Zero-based index of the column-name row among non-blank rows;
        /// blank lines are never counted
        #[serde(default)]
        header_row: usize,
        sku_column: String,
        qty_column: String,
        /// Column carrying the site name; the source name is used without it
        #[serde(default)]
        site_column: Option<String>,
    },
}

impl SourceSpec {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSpec::Walmart { .. } => SourceKind::Walmart,
            SourceSpec::Houzz { .. } => SourceKind::Houzz,
            SourceSpec::Faire { .. } => SourceKind::Faire,
            SourceSpec::WooCommerce { .. } => SourceKind::WooCommerce,
            SourceSpec::Dsco { .. } => SourceKind::Dsco,
            SourceSpec::Mirakl { .. } => SourceKind::Mirakl,
            SourceSpec::Wayfair { .. } => SourceKind::Wayfair,
            SourceSpec::FlatFile { .. } => SourceKind::FlatFile,
        }
    }
}

/// One named brand group and where its dated reports go
#[derive(Debug, Deserialize, Clone)]
pub struct BrandReportConfig {
    pub name: String,
    pub brands: Vec<String>,
    #[serde(default)]
    pub sales_dir: Option<PathBuf>,
    #[serde(default)]
    pub wholesale_dir: Option<PathBuf>,
    #[serde(default)]
    pub summary_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_window_days() -> i64 {
    7
}

fn default_sentinels() -> Vec<String> {
    vec!["sku".to_string(), "item sku".to_string(), "other".to_string()]
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_retail_totals() -> String {
    "soldvalueretail.csv".to_string()
}

fn default_canonical_totals() -> String {
    "sold_itemswholesale.csv".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mirakl_max() -> u32 {
    100
}

fn default_wayfair_limit() -> u32 {
    1000
}

fn default_delimiter() -> char {
    ','
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.window_days <= 0 {
            return Err(PipelineError::Config("run.window_days must be positive".into()).into());
        }
        if self.fetch.max_concurrent == 0 {
            return Err(PipelineError::Config("fetch.max_concurrent must be at least 1".into()).into());
        }
        if self.fetch.timeout_secs == 0 {
            return Err(PipelineError::Config("fetch.timeout_secs must be at least 1".into()).into());
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(PipelineError::Config("source with empty name".into()).into());
            }
            if !seen.insert(source.name.as_str()) {
                return Err(
                    PipelineError::Config(format!("duplicate source name: {}", source.name)).into(),
                );
            }
            if let SourceSpec::FlatFile { delimiter, .. } = &source.spec {
                if !delimiter.is_ascii() {
                    return Err(PipelineError::Config(format!(
                        "delimiter of {} must be a single ASCII character",
                        source.name
                    ))
                    .into());
                }
            }
        }

        let mut report_names = HashSet::new();
        for report in &self.brand_reports {
            if report.brands.is_empty() {
                return Err(
                    PipelineError::Config(format!("brand report {} lists no brands", report.name))
                        .into(),
                );
            }
            if !report_names.insert(report.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "duplicate brand report name: {}",
                    report.name
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Sources that take part in this run, in configured order
    pub fn enabled_sources(&self) -> Vec<SourceConfig> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }

    /// report name → set of brand names
    pub fn brand_groups(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.brand_reports
            .iter()
            .map(|r| (r.name.clone(), r.brands.iter().cloned().collect()))
            .collect()
    }
}

/// Read the configuration file from disk
pub fn load_config(path: &Path) -> Result<Config> {
    tracing::info!("Loading config from: {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml(&contents)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[run]
window_days = 7
case_folding = "sku_only"

[reference]
sku_map = "skus/skus_map.csv"
sales_map = "skus/sales_map.csv"

[ledger]
path = "stock/newstock.csv"
mirrors = ["stock/data/newstock.csv"]

[[sources]]
name = "Faire"
kind = "faire"
orders_url = "https://example.test/orders"
access_token = "t"

[[sources]]
name = "Amazon"
kind = "flat_file"
path = "sales/amazon.txt"
delimiter = "\t"
sku_column = "sku"
qty_column = "quantity"

[[sources]]
name = "THE BAY"
kind = "mirakl"
url = "https://example.test/api/orders"
api_key = "k"
enabled = false

[[brand_reports]]
name = "brand1"
brands = ["Brand1"]
"#;

    #[test]
    fn test_sample_config_parses() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.fetch.max_concurrent, 4);
        assert_eq!(config.ledger.backend, LedgerBackend::Csv);
        assert_eq!(config.output.retail_totals, "soldvalueretail.csv");

        match &config.sources[1].spec {
            SourceSpec::FlatFile {
                delimiter,
                header_row,
                site_column,
                ..
            } => {
                assert_eq!(*delimiter, '\t');
                assert_eq!(*header_row, 0);
                assert!(site_column.is_none());
            }
            other => panic!("unexpected spec: {:?}", other),
        }

        match &config.sources[2].spec {
            SourceSpec::Mirakl { max, .. } => assert_eq!(*max, 100),
            other => panic!("unexpected spec: {:?}", other),
        }
    }

    #[test]
    fn test_enabled_sources_skip_disabled() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let names: Vec<String> = config.enabled_sources().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Faire".to_string(), "Amazon".to_string()]);
    }

    #[test]
    fn test_brand_groups() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let groups = config.brand_groups();
        assert!(groups["brand1"].contains("Brand1"));
    }

    #[test]
    fn test_duplicate_source_names_rejected() {
        let doubled = format!(
            "{}\n[[sources]]\nname = \"Faire\"\nkind = \"faire\"\norders_url = \"u\"\naccess_token = \"t\"\n",
            SAMPLE
        );
        let err = Config::from_toml(&doubled).unwrap_err();
        assert!(err.to_string().contains("duplicate source name"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let bad = SAMPLE.replace("window_days = 7", "window_days = 0");
        assert!(Config::from_toml(&bad).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let bad = format!("{}\n[fetch]\ntimeout_secs = 0\n", SAMPLE);
        let err = Config::from_toml(&bad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Config(msg)) if msg.contains("timeout_secs")
        ));

        let ok = format!("{}\n[fetch]\ntimeout_secs = 1\n", SAMPLE);
        assert_eq!(Config::from_toml(&ok).unwrap().fetch.timeout_secs, 1);
    }
}
