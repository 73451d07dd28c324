//! Pagination and aggregation across queries.
//!
//! Each query is walked page by page from offset 0, following the `start`
//! parameter embedded in the continuation URL of every page. A query stops
//! on the first failed page, on a missing or malformed continuation, when
//! the offset fails to advance, or at the optional page cap. Whatever was
//! collected before the stop is kept. The reason is recorded as a
//! [`StopReason`].
use crate::dedup::DedupReport;
use crate::record::{ResultRecord, ResultSet, SearchQuery};
use async_trait::async_trait;
use futures::StreamExt;
use placelens_runtime::{RateLimiter, sleep_or_cancel};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One page of results plus the continuation URL, if the API sent one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<ResultRecord>,
    pub next: Option<String>,
}

/// Single-page fetch against a paged search API.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, query: &SearchQuery, start: u64) -> anyhow::Result<Page>;
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for std::sync::Arc<T> {
    async fn fetch_page(&self, query: &SearchQuery, start: u64) -> anyhow::Result<Page> {
        (**self).fetch_page(query, start).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No continuation on the last page.
    LastPage,
    /// A page request failed; earlier pages are kept.
    FetchFailed(String),
    /// Continuation URL had no `start` parameter.
    MissingOffset,
    /// `start` was present but not an integer.
    MalformedOffset(String),
    /// Continuation pointed at or before the current offset.
    NonAdvancingOffset { current: u64, next: u64 },
    PageCap(u32),
    Cancelled,
}

impl StopReason {
    /// True for the normal end of results.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::LastPage | Self::MissingOffset)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastPage => write!(f, "last page"),
            Self::FetchFailed(e) => write!(f, "page fetch failed: {e}"),
            Self::MissingOffset => write!(f, "no start offset in continuation"),
            Self::MalformedOffset(raw) => write!(f, "unparseable start offset {raw:?}"),
            Self::NonAdvancingOffset { current, next } => {
                write!(f, "offset did not advance ({current} -> {next})")
            }
            Self::PageCap(n) => write!(f, "page cap of {n} reached"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Pause between queries; never applied after the last one.
    pub inter_query_delay: Duration,
    pub max_pages: Option<u32>,
    /// Queries in flight at once. `1` keeps the sequential behaviour.
    pub concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            inter_query_delay: Duration::from_secs(1),
            max_pages: None,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryReport {
    pub query: SearchQuery,
    pub records: ResultSet,
    pub pages: u32,
    pub stop: StopReason,
}

#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Per-query outcomes in submission order.
    pub queries: Vec<QueryReport>,
    /// Concatenated and deduplicated records.
    pub results: ResultSet,
    pub dedup: DedupReport,
    pub cancelled: bool,
}

impl AggregateReport {
    pub fn total_pages(&self) -> u32 {
        self.queries.iter().map(|q| q.pages).sum()
    }
}

pub struct Aggregator<S> {
    source: S,
    config: AggregatorConfig,
    cancel: CancellationToken,
}

#[derive(Debug, PartialEq, Eq)]
enum OffsetError {
    Missing,
    Malformed(String),
}

/// Pull the `start` query parameter out of a continuation URL.
fn next_offset(next: &str) -> Result<u64, OffsetError> {
    let parsed = Url::parse(next).or_else(|_| {
        // Relative continuations still carry their query string.
        Url::parse("http://continuation.invalid/").and_then(|base| base.join(next))
    });
    let Ok(url) = parsed else {
        return Err(OffsetError::Missing);
    };
    let Some((_, raw)) = url.query_pairs().find(|(k, _)| k == "start") else {
        return Err(OffsetError::Missing);
    };
    raw.trim()
        .parse::<u64>()
        .map_err(|_| OffsetError::Malformed(raw.into_owned()))
}

impl<S: PageSource> Aggregator<S> {
    pub fn new(source: S, config: AggregatorConfig) -> Self {
        Self {
            source,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `cancel` between pages, between queries and during delays.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// All records for one query, in page order. No dedup.
    pub async fn fetch_all(&self, query: &SearchQuery) -> ResultSet {
        self.fetch_query(query).await.records
    }

    /// Walk every page of `query` and report why pagination stopped.
    pub async fn fetch_query(&self, query: &SearchQuery) -> QueryReport {
        let mut records = ResultSet::new();
        let mut offset = 0u64;
        let mut pages = 0u32;

        tracing::info!(query=%query, "maps.query.start");

        let stop = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if let Some(cap) = self.config.max_pages {
                if pages >= cap {
                    tracing::warn!(query=%query, cap, "maps.query.page_cap");
                    break StopReason::PageCap(cap);
                }
            }

            let page = match self.source.fetch_page(query, offset).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(
                        query=%query,
                        start=offset,
                        error=%format!("{err:#}"),
                        "maps.page.failed: stopping pagination for this query"
                    );
                    break StopReason::FetchFailed(format!("{err:#}"));
                }
            };
            pages += 1;

            let count = page.records.len();
            records.extend(page.records);
            tracing::info!(query=%query, start=offset, records=count, "maps.page.fetched");

            let Some(next) = page.next else {
                tracing::info!(query=%query, "maps.query.last_page");
                break StopReason::LastPage;
            };

            match next_offset(&next) {
                Ok(n) if n <= offset => {
                    tracing::warn!(query=%query, current=offset, next=n, "maps.query.offset_not_advancing");
                    break StopReason::NonAdvancingOffset {
                        current: offset,
                        next: n,
                    };
                }
                Ok(n) => offset = n,
                Err(OffsetError::Missing) => {
                    tracing::info!(query=%query, next=%next, "maps.query.no_start_param: assuming end of results");
                    break StopReason::MissingOffset;
                }
                Err(OffsetError::Malformed(raw)) => {
                    tracing::error!(query=%query, next=%next, "maps.query.bad_start_param: stopping pagination");
                    break StopReason::MalformedOffset(raw);
                }
            }
        };

        tracing::info!(query=%query, pages, records=records.len(), stop=%stop, "maps.query.done");
        QueryReport {
            query: query.clone(),
            records,
            pages,
            stop,
        }
    }

    /// Fetch every query, concatenate in submission order, dedup once.
    pub async fn aggregate(&self, queries: &[SearchQuery]) -> AggregateReport {
        let reports = if self.config.concurrency <= 1 {
            self.run_sequential(queries).await
        } else {
            self.run_concurrent(queries).await
        };

        let mut all = ResultSet::new();
        for report in &reports {
            all.append(report.records.clone());
        }
        let (results, dedup) = all.dedup();

        AggregateReport {
            queries: reports,
            results,
            dedup,
            cancelled: self.cancel.is_cancelled(),
        }
    }

    async fn run_sequential(&self, queries: &[SearchQuery]) -> Vec<QueryReport> {
        let mut reports = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            if i > 0 && !self.config.inter_query_delay.is_zero() {
                tracing::debug!(
                    delay_ms = self.config.inter_query_delay.as_millis() as u64,
                    "maps.query.delay"
                );
                if sleep_or_cancel(&self.cancel, self.config.inter_query_delay)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            if self.cancel.is_cancelled() {
                break;
            }
            reports.push(self.fetch_query(query).await);
        }
        reports
    }

    // Query starts stay spaced by the inter-query delay; results are
    // collected in submission order.
    async fn run_concurrent(&self, queries: &[SearchQuery]) -> Vec<QueryReport> {
        let delay = self.config.inter_query_delay;
        let pacer = (!delay.is_zero()).then(|| RateLimiter::new(1.0 / delay.as_secs_f64(), 1));
        let pacer = pacer.as_ref();

        let reports: Vec<Option<QueryReport>> = futures::stream::iter(queries)
            .map(|query| async move {
                if let Some(p) = pacer {
                    tokio::select! {
                        _ = p.acquire(1) => {}
                        _ = self.cancel.cancelled() => return None,
                    }
                }
                if self.cancel.is_cancelled() {
                    return None;
                }
                Some(self.fetch_query(query).await)
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;

        reports.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Pages keyed by (query keyword, start offset).
    #[derive(Default)]
    struct ScriptedSource {
        pages: HashMap<(String, u64), Result<Page, String>>,
        calls: Mutex<Vec<(String, u64)>>,
    }

    impl ScriptedSource {
        fn page(mut self, kw: &str, start: u64, ids: &[&str], next: Option<&str>) -> Self {
            let records = ids
                .iter()
                .map(|id| {
                    ResultRecord::from_value(json!({"place_id": id, "title": format!("{kw}-{id}")}))
                        .unwrap()
                })
                .collect();
            self.pages.insert(
                (kw.to_string(), start),
                Ok(Page {
                    records,
                    next: next.map(str::to_string),
                }),
            );
            self
        }

        fn fail(mut self, kw: &str, start: u64) -> Self {
            self.pages
                .insert((kw.to_string(), start), Err("HTTP 500".into()));
            self
        }

        fn calls(&self) -> Vec<(String, u64)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, query: &SearchQuery, start: u64) -> anyhow::Result<Page> {
            self.calls
                .lock()
                .unwrap()
                .push((query.keyword.clone(), start));
            match self.pages.get(&(query.keyword.clone(), start)) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(e)) => Err(anyhow::anyhow!(e.clone())),
                None => Err(anyhow::anyhow!("no scripted page at {start}")),
            }
        }
    }

    fn next(start: u64) -> String {
        format!("https://serpapi.com/search.json?engine=google_maps&q=x&start={start}")
    }

    fn no_delay() -> AggregatorConfig {
        AggregatorConfig {
            inter_query_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn q(kw: &str) -> SearchQuery {
        SearchQuery::new(kw, "Oslo")
    }

    fn ids(set: &ResultSet) -> Vec<String> {
        set.iter()
            .filter_map(|r| r.place_id().map(str::to_string))
            .collect()
    }

    #[test]
    fn offsets_come_from_the_start_param() {
        assert_eq!(next_offset(&next(20)), Ok(20));
        assert_eq!(next_offset("/search.json?start=40"), Ok(40));
        assert_eq!(
            next_offset("https://serpapi.com/search.json?q=x"),
            Err(OffsetError::Missing)
        );
        assert_eq!(
            next_offset("https://serpapi.com/search.json?start=abc"),
            Err(OffsetError::Malformed("abc".into()))
        );
    }

    #[tokio::test]
    async fn follows_continuations_until_last_page() {
        let source = ScriptedSource::default()
            .page("cafe", 0, &["a", "b"], Some(&next(20)))
            .page("cafe", 20, &["c"], Some(&next(40)))
            .page("cafe", 40, &["d"], None);
        let agg = Aggregator::new(source, no_delay());

        let report = agg.fetch_query(&q("cafe")).await;
        assert_eq!(ids(&report.records), ["a", "b", "c", "d"]);
        assert_eq!(report.pages, 3);
        assert_eq!(report.stop, StopReason::LastPage);
    }

    #[tokio::test]
    async fn failed_page_keeps_earlier_records() {
        let source = ScriptedSource::default()
            .page("cafe", 0, &["a"], Some(&next(20)))
            .page("cafe", 20, &["b"], Some(&next(40)))
            .fail("cafe", 40)
            .page("cafe", 60, &["d"], None);
        let agg = Aggregator::new(source, no_delay());

        let report = agg.fetch_query(&q("cafe")).await;
        assert_eq!(ids(&report.records), ["a", "b"]);
        assert!(matches!(report.stop, StopReason::FetchFailed(_)));
    }

    #[tokio::test]
    async fn malformed_offset_stops_with_records_intact() {
        let source = ScriptedSource::default().page(
            "cafe",
            0,
            &["a", "b"],
            Some("https://serpapi.com/search.json?start=twenty"),
        );
        let agg = Aggregator::new(source, no_delay());

        let report = agg.fetch_query(&q("cafe")).await;
        assert_eq!(ids(&report.records), ["a", "b"]);
        assert_eq!(report.stop, StopReason::MalformedOffset("twenty".into()));
    }

    #[tokio::test]
    async fn missing_offset_is_treated_as_end() {
        let source = ScriptedSource::default().page(
            "cafe",
            0,
            &["a"],
            Some("https://serpapi.com/search.json?next_page_token=zzz"),
        );
        let agg = Aggregator::new(source, no_delay());

        let report = agg.fetch_query(&q("cafe")).await;
        assert_eq!(report.stop, StopReason::MissingOffset);
        assert!(report.stop.is_clean());
    }

    #[tokio::test]
    async fn echoed_offset_does_not_loop() {
        let source = ScriptedSource::default()
            .page("cafe", 0, &["a"], Some(&next(20)))
            .page("cafe", 20, &["b"], Some(&next(20)));
        let agg = Aggregator::new(source, no_delay());

        let report = agg.fetch_query(&q("cafe")).await;
        assert_eq!(ids(&report.records), ["a", "b"]);
        assert_eq!(
            report.stop,
            StopReason::NonAdvancingOffset {
                current: 20,
                next: 20
            }
        );
    }

    #[tokio::test]
    async fn page_cap_bounds_the_walk() {
        let source = ScriptedSource::default()
            .page("cafe", 0, &["a"], Some(&next(20)))
            .page("cafe", 20, &["b"], Some(&next(40)))
            .page("cafe", 40, &["c"], None);
        let agg = Aggregator::new(
            source,
            AggregatorConfig {
                max_pages: Some(2),
                ..no_delay()
            },
        );

        let report = agg.fetch_query(&q("cafe")).await;
        assert_eq!(ids(&report.records), ["a", "b"]);
        assert_eq!(report.stop, StopReason::PageCap(2));
    }

    #[tokio::test]
    async fn empty_result_list_contributes_nothing() {
        let source = ScriptedSource::default()
            .page("cafe", 0, &[], Some(&next(20)))
            .page("cafe", 20, &["a"], None);
        let agg = Aggregator::new(source, no_delay());
        assert_eq!(ids(&agg.fetch_all(&q("cafe")).await), ["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn aggregate_dedups_across_queries_with_delay_between() {
        let source = Arc::new(
            ScriptedSource::default()
                .page("cafe", 0, &["1", "2"], None)
                .fail("bar", 0)
                .page("pub", 0, &["2", "3"], None),
        );
        let agg = Aggregator::new(source.clone(), AggregatorConfig::default());

        let started = tokio::time::Instant::now();
        let report = agg.aggregate(&[q("cafe"), q("bar"), q("pub")]).await;
        let elapsed = started.elapsed();

        assert_eq!(ids(&report.results), ["1", "2", "3"]);
        let titles: Vec<_> = report.results.iter().filter_map(|r| r.title()).collect();
        assert_eq!(titles, ["cafe-1", "cafe-2", "pub-3"]);
        assert_eq!(report.dedup.before, 4);
        assert_eq!(report.dedup.after, 3);
        assert_eq!(report.queries.len(), 3);
        assert!(!report.cancelled);
        // two gaps for three queries
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_aggregation_keeps_submission_order() {
        let source = ScriptedSource::default()
            .page("a", 0, &["1"], None)
            .page("b", 0, &["1", "2"], None)
            .page("c", 0, &["3"], None);
        let agg = Aggregator::new(
            source,
            AggregatorConfig {
                concurrency: 3,
                ..AggregatorConfig::default()
            },
        );

        let report = agg.aggregate(&[q("a"), q("b"), q("c")]).await;
        let titles: Vec<_> = report.results.iter().filter_map(|r| r.title()).collect();
        assert_eq!(titles, ["a-1", "b-2", "c-3"]);
        let order: Vec<_> = report.queries.iter().map(|r| r.query.keyword.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn cancellation_stops_between_queries() {
        let source = Arc::new(
            ScriptedSource::default()
                .page("cafe", 0, &["1"], None)
                .page("pub", 0, &["2"], None),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let agg = Aggregator::new(source.clone(), AggregatorConfig::default())
            .with_cancellation(cancel);

        let report = agg.aggregate(&[q("cafe"), q("pub")]).await;
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert!(source.calls().is_empty());
    }
}
