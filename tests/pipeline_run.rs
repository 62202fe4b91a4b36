use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use stock_sync::ledger_store::load_stock_csv;
use stock_sync::{
    Config, Fetched, Fetcher, LedgerStore, Pipeline, PipelineError, RawPayload, SourceConfig,
    SourceError, SqliteLedgerStore, TimeWindow,
};
use tempfile::TempDir;

/// Canned marketplace responses, keyed by source name
struct CannedMarketplaces {
    responses: HashMap<String, Result<Fetched, SourceError>>,
}

#[async_trait]
impl Fetcher for CannedMarketplaces {
    async fn fetch(&self, source: &SourceConfig, _window: &TimeWindow) -> Result<Fetched, SourceError> {
        self.responses.get(&source.name).cloned().unwrap_or_else(|| {
            Err(SourceError::Fetch {
                source_name: source.name.clone(),
                status: Some(503),
                message: "service unavailable".to_string(),
            })
        })
    }
}

fn now() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-03-27 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

fn json_ok(value: serde_json::Value) -> Result<Fetched, SourceError> {
    Ok(Fetched {
        payload: RawPayload::Json(value),
        status: Some(200),
    })
}

fn marketplaces() -> CannedMarketplaces {
    let mut responses = HashMap::new();
    responses.insert(
        "Faire".to_string(),
        json_ok(json!({"orders": [
            {"items": [{"sku": "RUG-1", "quantity": 2}, {"sku": "PILLOW-2", "quantity": "1"}]}
        ]})),
    );
    responses.insert(
        "THE BAY".to_string(),
        json_ok(json!({"orders": [
            {"order_state": "SHIPPED", "order_lines": [{"offer_sku": "rug-1", "quantity": 1}]},
            {"order_state": "CANCELED", "order_lines": [{"offer_sku": "rug-1", "quantity": 9}]}
        ]})),
    );
    responses.insert(
        "Wayfair".to_string(),
        json_ok(json!({"data": {"getDropshipPurchaseOrders": [
            {"poNumber": "CS1", "products": [{"partNumber": "Pillow-2", "quantity": 3}]}
        ]}})),
    );
    CannedMarketplaces { responses }
}

fn write_fixtures(dir: &Path) {
    let skus = dir.join("skus");
    std::fs::create_dir_all(&skus).unwrap();
    std::fs::write(
        skus.join("skus_map.csv"),
        "sku_part,sku_name,multiplier\nRUG-1,CANON_RUG,1\nPILLOW-2,CANON_PILLOW,2\nlamp-9,CANON_LAMP,1\n",
    )
    .unwrap();
    std::fs::write(
        skus.join("sales_map.csv"),
        "SKU,cost,brand\nrug-1,100,Brand1\npillow-2,15.5,brand2\n",
    )
    .unwrap();
    std::fs::write(
        skus.join("wholesale_sold_map.csv"),
        "sku,brand,cost,notes\nCANON_RUG,Brand1,60,x\nCANON_PILLOW,brand3,8,y\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("seed_stock.csv"),
        "sku,qty,subcategory,color,brand\n\
CANON_RUG,20,rugs,ivory,Brand1\n\
CANON_PILLOW,10,pillows,teal,brand2\n\
CANON_LAMP,4,lamps,gold,brand3\n",
    )
    .unwrap();
}

fn config(dir: &Path) -> Config {
    let toml = format!(
        r#"
[reference]
sku_map = '{d}/skus/skus_map.csv'
sales_map = '{d}/skus/sales_map.csv'
wholesale_map = '{d}/skus/wholesale_sold_map.csv'

[ledger]
backend = "sqlite"
path = '{d}/ledger.db'
mirrors = ['{d}/gonder/newstock.csv']

[output]
dir = '{d}/out'

[[sources]]
name = "Faire"
kind = "faire"
orders_url = "https://example.test/orders"
access_token = "t"

[[sources]]
name = "THE BAY"
kind = "mirakl"
url = "https://example.test/api/orders"
api_key = "k"

[[sources]]
name = "Wayfair"
kind = "wayfair"
auth_url = "https://example.test/token"
api_url = "https://example.test/graphql"
client_id = "id"
client_secret = "secret"
audience = "aud"

[[sources]]
name = "Nordstrom"
kind = "dsco"
base_url = "https://example.test/dsco"
token = "t"

[[brand_reports]]
name = "brand1"
brands = ["Brand1"]
sales_dir = '{d}/eh'
wholesale_dir = '{d}/eh/wholesale'
summary_dir = '{d}/gonder'

[[brand_reports]]
name = "brand2s"
brands = ["brand2", "brand3"]
sales_dir = '{d}/bb'
wholesale_dir = '{d}/bb/wholesale'
summary_dir = '{d}/gonder'
"#,
        d = dir.display()
    );
    Config::from_toml(&toml).unwrap()
}

fn sqlite_store(dir: &Path) -> SqliteLedgerStore {
    SqliteLedgerStore::new(dir.join("ledger.db"), vec![dir.join("gonder/newstock.csv")])
}

#[tokio::test]
async fn test_full_run_against_sqlite_ledger() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    sqlite_store(dir.path())
        .import_csv(&dir.path().join("seed_stock.csv"))
        .unwrap();

    let pipeline = Pipeline::new(
        config(dir.path()),
        Arc::new(marketplaces()),
        Box::new(sqlite_store(dir.path())),
    );
    let summary = pipeline.run_at(now(), false).await.unwrap();

    // rug-1: 2 (Faire) + 1 (THE BAY, cancelled order ignored) → ×1
    // pillow-2: 1 (Faire) + 3 (Wayfair) → ×2
    let ledger = sqlite_store(dir.path()).load().unwrap().entries;
    assert_eq!(ledger[0].sku, "CANON_RUG");
    assert_eq!(ledger[0].qty, 17.0);
    assert_eq!(ledger[1].qty, 2.0);
    assert_eq!(ledger[2].qty, 4.0);
    assert_eq!(ledger[1].color, "teal");

    let mirror = load_stock_csv(&dir.path().join("gonder/newstock.csv")).unwrap();
    assert_eq!(mirror, ledger);

    assert_eq!(summary.sources.len(), 4);
    assert_eq!(summary.sources[3].failure.as_deref(), Some("fetch"));
    assert_eq!(summary.sources[3].status, Some(503));
    assert_eq!(summary.canonical_skus, 3);
    assert_eq!(summary.unmapped_skus, 0);
    // 2 totals + 2 groups × (sales, wholesale, summary)
    assert_eq!(summary.report_files, 8);

    let summary_csv =
        std::fs::read_to_string(dir.path().join("gonder/03-27-2024-brand2s.csv")).unwrap();
    assert_eq!(summary_csv, "sku,cost,qty,total\npillow-2,15.5,4.0,62.0\n");

    let wholesale_csv =
        std::fs::read_to_string(dir.path().join("bb/wholesale/03-27-2024.csv")).unwrap();
    assert!(wholesale_csv.contains("CANON_PILLOW,8.0,brand3,8.0,03-27-2024,2024,March"));

    println!("✅ {}", summary.summary());
}

#[tokio::test]
async fn test_concurrent_ledger_edit_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    sqlite_store(dir.path())
        .import_csv(&dir.path().join("seed_stock.csv"))
        .unwrap();

    /// Store that lets someone else rewrite the ledger between load and save
    struct Interleaved {
        inner: SqliteLedgerStore,
        edit_from: std::path::PathBuf,
    }

    impl LedgerStore for Interleaved {
        fn describe(&self) -> String {
            self.inner.describe()
        }

        fn load(&self) -> anyhow::Result<stock_sync::LedgerSnapshot> {
            let snapshot = self.inner.load()?;
            self.inner.import_csv(&self.edit_from)?;
            Ok(snapshot)
        }

        fn save(
            &self,
            entries: &[stock_sync::StockEntry],
            expected_fingerprint: &str,
        ) -> anyhow::Result<stock_sync::ledger_store::SaveOutcome> {
            self.inner.save(entries, expected_fingerprint)
        }
    }

    let edited = dir.path().join("edited_stock.csv");
    std::fs::write(&edited, "sku,qty,subcategory,color,brand\nCANON_RUG,99,rugs,ivory,Brand1\n").unwrap();

    let pipeline = Pipeline::new(
        config(dir.path()),
        Arc::new(marketplaces()),
        Box::new(Interleaved {
            inner: sqlite_store(dir.path()),
            edit_from: edited,
        }),
    );
    let err = pipeline.run_at(now(), false).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::LedgerChanged(_))
    ));
    let ledger = sqlite_store(dir.path()).load().unwrap().entries;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].qty, 99.0);
}

#[test]
fn test_example_config_is_valid() {
    let config = Config::from_toml(include_str!("../stock-sync.example.toml")).unwrap();
    assert!(config.sources.len() >= 10);
    assert_eq!(config.brand_reports.len(), 2);
    assert!(config.enabled_sources().len() < config.sources.len());
}
