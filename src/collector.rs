// 📥 Source Collector - fetch every enabled source, then normalize
//
// Fetches fan out on the tokio runtime, at most `max_concurrent` at a time,
// each bounded by the per-source timeout. Adapters then run synchronously
// in configured order. A failing source contributes no records and one
// status line; it never fails the run on its own.

use crate::adapters::{get_adapter, SourceKind};
use crate::config::{SourceConfig, SourceSpec};
use crate::context::TimeWindow;
use crate::error::SourceError;
use crate::fetch::{Fetched, Fetcher};
use crate::records::SaleRecord;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One status line per configured source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source: String,
    pub kind: SourceKind,
    /// HTTP status of the last call made, when there was one
    pub status: Option<u16>,
    pub detail: String,
    /// Line items read from the payload
    pub total_orders: usize,
    /// `SourceError::kind()` of the failure, if any
    pub failure: Option<String>,
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    pub fn line(&self) -> String {
        let status = self
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} [{}] status {} total orders {}: {}",
            self.source,
            self.kind.code(),
            status,
            self.total_orders,
            self.detail
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Records of every source, in configured source order
    pub records: Vec<SaleRecord>,
    pub statuses: Vec<SourceStatus>,
}

impl Collection {
    pub fn succeeded(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.statuses.len() - self.succeeded()
    }
}

pub struct SourceCollector {
    fetcher: Arc<dyn Fetcher>,
    max_concurrent: usize,
    timeout: Duration,
}

impl SourceCollector {
    pub fn new(fetcher: Arc<dyn Fetcher>, max_concurrent: usize, timeout: Duration) -> Self {
        SourceCollector {
            fetcher,
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    pub async fn collect(&self, sources: &[SourceConfig], window: TimeWindow) -> Collection {
        let fetched = self.fetch_all(sources, window).await;

        let mut collection = Collection::default();
        for (source, result) in sources.iter().zip(fetched) {
            let (records, status) = normalize_source(source, result, &window);
            tracing::info!(
                source = %status.source,
                status = ?status.status,
                total_orders = status.total_orders,
                failure = ?status.failure,
                "{}",
                status.detail
            );
            collection.records.extend(records);
            collection.statuses.push(status);
        }

        tracing::info!(
            sources = collection.statuses.len(),
            succeeded = collection.succeeded(),
            failed = collection.failed(),
            records = collection.records.len(),
            "collection finished"
        );
        collection
    }

    /// One result per source, in source order
    async fn fetch_all(
        &self,
        sources: &[SourceConfig],
        window: TimeWindow,
    ) -> Vec<Result<Fetched, SourceError>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (index, source) in sources.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let source = source.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return (
                            index,
                            Err(SourceError::Fetch {
                                source_name: source.name.clone(),
                                status: None,
                                message: e.to_string(),
                            }),
                        )
                    }
                };

                let result = match tokio::time::timeout(timeout, fetcher.fetch(&source, &window)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout {
                        source_name: source.name.clone(),
                        secs: timeout.as_secs(),
                    }),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<Fetched, SourceError>>> = vec![None; sources.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "fetch task did not complete"),
            }
        }

        results
            .into_iter()
            .zip(sources)
            .map(|(result, source)| {
                result.unwrap_or_else(|| {
                    Err(SourceError::Fetch {
                        source_name: source.name.clone(),
                        status: None,
                        message: "fetch task did not complete".to_string(),
                    })
                })
            })
            .collect()
    }
}

/// Feed one fetch result through its adapter
pub fn normalize_source(
    source: &SourceConfig,
    fetched: Result<Fetched, SourceError>,
    window: &TimeWindow,
) -> (Vec<SaleRecord>, SourceStatus) {
    let kind = source.spec.kind();
    let mut status = SourceStatus {
        source: source.name.clone(),
        kind,
        status: None,
        detail: String::new(),
        total_orders: 0,
        failure: None,
    };

    let fetched = match fetched {
        Ok(fetched) => fetched,
        Err(err) => {
            status.status = err.status();
            status.failure = Some(err.kind().to_string());
            status.detail = err.to_string();

            // A flat-file source without its file still leaves a trace in the record set
            let records = match (&err, &source.spec) {
                (SourceError::MissingFile { .. }, SourceSpec::FlatFile { .. }) => {
                    tracing::warn!(source = %source.name, "{}", err);
                    vec![SaleRecord::placeholder(source.name.as_str())]
                }
                _ => {
                    tracing::error!(source = %source.name, kind = err.kind(), "{}", err);
                    Vec::new()
                }
            };
            return (records, status);
        }
    };

    status.status = fetched.status;
    let adapter = get_adapter(kind);
    match adapter.normalize(source, &fetched.payload, window) {
        Ok(records) => {
            status.total_orders = records.len();
            status.detail = format!("ok ({} adapter v{})", adapter.kind().name(), adapter.version());
            (records, status)
        }
        Err(err) => {
            tracing::error!(source = %source.name, kind = err.kind(), "{}", err);
            status.failure = Some(err.kind().to_string());
            status.detail = err.to_string();
            (Vec::new(), status)
        }
    }
}
