//! The enrichment run: fetch and extract every listing, resolve commutes
//! once for all addresses, then merge everything back in input order.

use crate::commute::CommuteResolver;
use crate::error::{ExtractError, FetchError};
use crate::extract::extract_listing;
use crate::models::{CommuteDuration, CommuteResult, ListingRecord, ListingRequest, OutputRow};
use crate::scrapers::CachingFetcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Join one listing with its commute durations.
///
/// Every destination gets a cell; when the listing has no address or the
/// pair was not resolved, the cell is `Unavailable`.
pub fn merge(
    request: &ListingRequest,
    record: &ListingRecord,
    commute: &CommuteResult,
    destinations: &[String],
) -> OutputRow {
    let address = record.address.as_deref().map(str::trim);
    let commutes = destinations
        .iter()
        .map(|destination| {
            address
                .and_then(|a| commute.get(a, destination))
                .unwrap_or(CommuteDuration::Unavailable)
        })
        .collect();

    OutputRow {
        index: request.index,
        passthrough: request.columns.clone(),
        record: record.clone(),
        commutes,
    }
}

/// Run-time knobs for [`Pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub destinations: Vec<String>,
    /// Listing pages fetched at the same time
    pub concurrency: usize,
    /// Pause after each network fetch, per worker
    pub fetch_delay: Duration,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub distinct_urls: usize,
    pub cache_hits: usize,
    pub network_fetches: usize,
    pub fetch_failures: usize,
    pub extract_failures: usize,
    pub routing_batches: usize,
    pub failed_batches: usize,
}

enum PageOutcome {
    Extracted {
        record: ListingRecord,
        from_cache: bool,
    },
    FetchFailed(FetchError),
    ExtractFailed {
        error: ExtractError,
        from_cache: bool,
    },
}

pub struct Pipeline {
    fetcher: CachingFetcher,
    resolver: CommuteResolver,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        fetcher: CachingFetcher,
        resolver: CommuteResolver,
        options: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            options,
        }
    }

    /// Enrich `requests`. Always returns exactly one row per request, in
    /// input order; per-row and per-batch failures are logged, not returned.
    pub async fn run(&self, requests: &[ListingRequest]) -> (Vec<OutputRow>, RunSummary) {
        let mut summary = RunSummary {
            rows: requests.len(),
            ..Default::default()
        };

        let records = self.extract_all(requests, &mut summary).await;

        let addresses = requests
            .iter()
            .filter_map(|req| records.get(&req.url))
            .filter_map(|record| record.address.clone());
        let resolution = self
            .resolver
            .resolve_batches(addresses, &self.options.destinations)
            .await;
        summary.routing_batches = resolution.batches;
        summary.failed_batches = resolution.failed_batches;

        let mut rows: Vec<OutputRow> = requests
            .iter()
            .map(|req| {
                let record = records
                    .get(&req.url)
                    .cloned()
                    .unwrap_or_else(|| ListingRecord::empty(&req.url));
                merge(req, &record, &resolution.result, &self.options.destinations)
            })
            .collect();
        rows.sort_by_key(|row| row.index);

        info!(
            "Run finished: {} rows, {} distinct URLs, {} cache hits, {} fetched, {} fetch failures, {} extract failures, {}/{} routing batches failed",
            summary.rows,
            summary.distinct_urls,
            summary.cache_hits,
            summary.network_fetches,
            summary.fetch_failures,
            summary.extract_failures,
            summary.failed_batches,
            summary.routing_batches
        );

        (rows, summary)
    }

    /// Fetch and extract each distinct URL once, with bounded parallelism
    async fn extract_all(
        &self,
        requests: &[ListingRequest],
        summary: &mut RunSummary,
    ) -> HashMap<String, ListingRecord> {
        let mut rows_by_url: HashMap<String, Vec<usize>> = HashMap::new();
        let mut urls = Vec::new();
        for req in requests {
            let rows = rows_by_url.entry(req.url.clone()).or_default();
            if rows.is_empty() {
                urls.push(req.url.clone());
            }
            rows.push(req.index + 1);
        }
        summary.distinct_urls = urls.len();

        info!(
            "Processing {} listings ({} distinct URLs, {} workers)",
            requests.len(),
            urls.len(),
            self.options.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for url in urls {
            let sem = Arc::clone(&semaphore);
            let fetcher = self.fetcher.clone();
            let delay = self.options.fetch_delay;

            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                info!("Processing {}", url);

                let outcome = match fetcher.fetch(&url).await {
                    Ok(fetched) => {
                        let from_cache = fetched.from_cache;
                        match extract_listing(&url, &fetched.content) {
                            Ok(record) => PageOutcome::Extracted { record, from_cache },
                            Err(error) => PageOutcome::ExtractFailed { error, from_cache },
                        }
                    }
                    Err(e) => PageOutcome::FetchFailed(e),
                };

                // Only pause when the listing source was actually contacted
                let hit_network = !matches!(
                    outcome,
                    PageOutcome::Extracted { from_cache: true, .. }
                        | PageOutcome::ExtractFailed { from_cache: true, .. }
                        | PageOutcome::FetchFailed(FetchError::InvalidUrl(_))
                );
                if hit_network && !delay.is_zero() {
                    debug!("Sleeping {:?} before next fetch", delay);
                    sleep(delay).await;
                }

                (url, outcome)
            });
        }

        let mut records = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (url, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!("Listing worker failed: {}", e);
                    continue;
                }
            };
            let rows = rows_by_url.get(&url).cloned().unwrap_or_default();

            let record = match outcome {
                PageOutcome::Extracted { record, from_cache } => {
                    if from_cache {
                        summary.cache_hits += 1;
                    } else {
                        summary.network_fetches += 1;
                    }
                    if record.is_empty() {
                        warn!("No listing fields found for {} (rows {:?})", url, rows);
                    } else {
                        if record.address.is_none() {
                            warn!("No address found for {} (rows {:?})", url, rows);
                        }
                        if record.rent.is_none() {
                            warn!("No rent found for {} (rows {:?})", url, rows);
                        }
                    }
                    record
                }
                PageOutcome::FetchFailed(e) => {
                    summary.fetch_failures += 1;
                    warn!("Failed to fetch {} (rows {:?}): {}", url, rows, e);
                    ListingRecord::empty(&url)
                }
                PageOutcome::ExtractFailed { error, from_cache } => {
                    if from_cache {
                        summary.cache_hits += 1;
                    } else {
                        summary.network_fetches += 1;
                    }
                    summary.extract_failures += 1;
                    warn!("Failed to extract {} (rows {:?}): {}", url, rows, error);
                    ListingRecord::empty(&url)
                }
            };
            records.insert(url, record);
        }

        records
    }
}
