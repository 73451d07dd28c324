//! `placelens scrape`: queries CSV in, deduplicated results CSV out.
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use placelens_common::PlacelensError;
use placelens_maps::{AggregateReport, Aggregator, AggregatorConfig, PageSource, ResultSet, SearchQuery};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::table::{Table, read_table, write_table};

pub const QUERY_COLUMNS: [&str; 2] = ["keyword", "location"];

/// Read `keyword`/`location` pairs. Rows with a blank cell are skipped.
pub fn load_queries(path: &Path) -> Result<Vec<SearchQuery>, PlacelensError> {
    let table = read_table(path)?;
    table.require_columns(path, &QUERY_COLUMNS)?;

    let mut queries = Vec::with_capacity(table.len());
    for (i, row) in table.rows.iter().enumerate() {
        let keyword = table.cell(row, "keyword").unwrap_or("").trim();
        let location = table.cell(row, "location").unwrap_or("").trim();
        if keyword.is_empty() || location.is_empty() {
            tracing::warn!(row = i + 1, file=%path.display(), "scrape.query.skipped_blank");
            continue;
        }
        queries.push(SearchQuery::new(keyword, location));
    }
    Ok(queries)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => serde_json::to_string(nested).unwrap_or_default(),
    }
}

/// Flatten records into a table whose columns are the union of keys, first seen first.
pub fn records_to_table(results: &ResultSet) -> Table {
    let mut table = Table::default();
    for record in results.iter() {
        for key in record.fields().keys() {
            if table.column(key).is_none() {
                table.headers.push(key.clone());
            }
        }
    }
    for record in results.iter() {
        let row = table
            .headers
            .iter()
            .map(|h| record.get(h).map(cell_text).unwrap_or_default())
            .collect();
        table.rows.push(row);
    }
    table
}

#[derive(Debug, Clone)]
pub struct ScrapeSummary {
    pub queries: usize,
    pub pages: u32,
    pub failed_queries: usize,
    pub before_dedup: usize,
    pub after_dedup: usize,
    pub missing_place_id: usize,
    pub written: Option<PathBuf>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl ScrapeSummary {
    fn from_report(report: &AggregateReport, written: Option<PathBuf>, elapsed: Duration) -> Self {
        Self {
            queries: report.queries.len(),
            pages: report.total_pages(),
            failed_queries: report
                .queries
                .iter()
                .filter(|q| !q.stop.is_clean() && q.stop != placelens_maps::StopReason::Cancelled)
                .count(),
            before_dedup: report.dedup.before,
            after_dedup: report.dedup.after,
            missing_place_id: report.dedup.missing_place_id,
            written,
            cancelled: report.cancelled,
            elapsed,
        }
    }
}

impl fmt::Display for ScrapeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "queries:        {}", self.queries)?;
        writeln!(f, "pages fetched:  {}", self.pages)?;
        writeln!(f, "stopped early:  {}", self.failed_queries)?;
        writeln!(f, "records:        {} ({} after dedup)", self.before_dedup, self.after_dedup)?;
        if self.missing_place_id > 0 {
            writeln!(f, "no place_id:    {}", self.missing_place_id)?;
        }
        match &self.written {
            Some(p) => writeln!(f, "written:        {}", p.display())?,
            None => writeln!(f, "written:        nothing collected")?,
        }
        if self.cancelled {
            writeln!(f, "cancelled:      yes")?;
        }
        write!(f, "elapsed:        {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Aggregate every query through `source` and export the deduplicated rows.
pub async fn run_scrape<S: PageSource>(
    source: S,
    config: AggregatorConfig,
    queries: &[SearchQuery],
    output: &Path,
    cancel: CancellationToken,
) -> anyhow::Result<ScrapeSummary> {
    let started = Instant::now();
    tracing::info!(queries = queries.len(), output=%output.display(), "scrape.start");

    let aggregator = Aggregator::new(source, config).with_cancellation(cancel);
    let report = aggregator.aggregate(queries).await;

    for q in &report.queries {
        if q.stop.is_clean() {
            tracing::info!(query=%q.query, pages = q.pages, records = q.records.len(), stop=%q.stop, "scrape.query.done");
        } else {
            tracing::warn!(query=%q.query, pages = q.pages, records = q.records.len(), stop=%q.stop, "scrape.query.stopped");
        }
    }

    let written = if report.results.is_empty() {
        tracing::warn!("scrape.nothing_collected");
        None
    } else {
        let table = records_to_table(&report.results);
        write_table(output, &table).with_context(|| format!("write {}", output.display()))?;
        Some(output.to_path_buf())
    };

    let summary = ScrapeSummary::from_report(&report, written, started.elapsed());
    tracing::info!(
        queries = summary.queries,
        pages = summary.pages,
        before = summary.before_dedup,
        after = summary.after_dedup,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "scrape.done"
    );
    Ok(summary)
}
