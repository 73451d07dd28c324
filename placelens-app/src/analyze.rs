//! `placelens analyze`: screenshot every `website` in a results CSV and
//! classify it, appending the verdict columns.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures::StreamExt;
use placelens_common::PlacelensError;
use placelens_drivers::CaptureProvider;
use placelens_llm::aesthetic::{AestheticClassifier, ClassificationResult};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::table::{Table, read_table, write_table};

pub const NOT_PROCESSED: &str = "Not Processed";
pub const INVALID_URL: &str = "Invalid URL";
pub const INVALID_URL_EXPLANATION: &str = "URL was not valid for processing.";
pub const ERROR: &str = "Error";
pub const CAPTURE_FAILED: &str = "Screenshot capture failed.";

const CATEGORY_COL: &str = "aesthetic_category";
const EXPLANATION_COL: &str = "aesthetic_explanation";
const SCREENSHOT_COL: &str = "screenshot_path";
const MODEL_COL: &str = "model_used";
const MAX_FILE_STEM: usize = 100;

fn unsafe_chars() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w.\-]").ok()).as_ref()
}

/// Filesystem-safe stem for a business title or URL: scheme and `www.`
/// dropped, anything outside `[\w.-]` replaced by `_`, capped at 100 chars.
pub fn sanitize_filename(raw: &str) -> String {
    let stripped = raw
        .replace("http://", "")
        .replace("https://", "")
        .replace("www.", "");
    let cleaned = match unsafe_chars() {
        Some(re) => re.replace_all(&stripped, "_").into_owned(),
        None => stripped
            .chars()
            .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '.' | '-') { c } else { '_' })
            .collect(),
    };
    cleaned.chars().take(MAX_FILE_STEM).collect()
}

/// Absolute `http`/`https` URL with a host.
pub fn is_http_url(raw: &str) -> bool {
    Url::parse(raw.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    NotProcessed,
    InvalidUrl,
    CaptureFailed(PlacelensError),
    Classified {
        screenshot: PathBuf,
        result: ClassificationResult,
    },
}

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub screenshots_dir: PathBuf,
    /// Only the first N rows are processed.
    pub limit: Option<usize>,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzeSummary {
    pub rows: usize,
    pub by_category: BTreeMap<String, usize>,
    pub written: PathBuf,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl fmt::Display for AnalyzeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rows:     {}", self.rows)?;
        for (category, n) in &self.by_category {
            writeln!(f, "  {category:<16} {n}")?;
        }
        writeln!(f, "written:  {}", self.written.display())?;
        if self.cancelled {
            writeln!(f, "cancelled: yes")?;
        }
        write!(f, "elapsed:  {:.1}s", self.elapsed.as_secs_f64())
    }
}

pub struct SiteAnalyzer<'a, C> {
    capture: &'a C,
    classifier: &'a AestheticClassifier,
    opts: &'a AnalyzeOptions,
    cancel: CancellationToken,
}

impl<'a, C: CaptureProvider> SiteAnalyzer<'a, C> {
    pub fn new(
        capture: &'a C,
        classifier: &'a AestheticClassifier,
        opts: &'a AnalyzeOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            capture,
            classifier,
            opts,
            cancel,
        }
    }

    async fn process_row(&self, index: usize, website: &str, title: &str) -> RowOutcome {
        if self.cancel.is_cancelled() {
            tracing::debug!(row = index, website, kind = PlacelensError::Cancelled.kind(), "analyze.row.skipped");
            return RowOutcome::NotProcessed;
        }
        if !is_http_url(website) {
            tracing::warn!(row = index, website, "analyze.invalid_url");
            return RowOutcome::InvalidUrl;
        }

        let label = if title.trim().is_empty() { website } else { title };
        let dest = self
            .opts
            .screenshots_dir
            .join(format!("{index}_{}.png", sanitize_filename(label)));

        let screenshot = match self.capture.capture(website.trim(), &dest).await {
            Ok(path) => path,
            Err(e) => {
                let err = PlacelensError::Resource(format!("screenshot of {website}: {e:#}"));
                tracing::error!(row = index, website, kind = err.kind(), error=%err, "analyze.capture_failed");
                return RowOutcome::CaptureFailed(err);
            }
        };

        let result = self.classifier.classify(&screenshot).await;
        tracing::info!(
            row = index,
            website,
            category=%self.classifier.scheme().label(result.category),
            "analyze.row.done"
        );
        RowOutcome::Classified { screenshot, result }
    }

    /// Process the rows of `table` in order, `concurrency` at a time.
    pub async fn analyze_rows(&self, table: &Table) -> Vec<RowOutcome> {
        let limit = self.opts.limit.unwrap_or(usize::MAX);
        let jobs: Vec<(usize, String, String)> = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let website = table.cell(row, "website").unwrap_or("").to_string();
                let title = table.cell(row, "title").unwrap_or("").to_string();
                (i, website, title)
            })
            .collect();
        let total = jobs.len();

        futures::stream::iter(jobs)
            .map(|(i, website, title)| async move {
                if i >= limit {
                    return RowOutcome::NotProcessed;
                }
                tracing::info!(row = i + 1, total, %website, "analyze.row.start");
                self.process_row(i, &website, &title).await
            })
            .buffered(self.opts.concurrency.max(1))
            .collect()
            .await
    }

    /// Write outcomes into the four verdict columns.
    pub fn apply(&self, table: &mut Table, outcomes: &[RowOutcome]) -> BTreeMap<String, usize> {
        let cat = table.ensure_column(CATEGORY_COL);
        let expl = table.ensure_column(EXPLANATION_COL);
        let shot = table.ensure_column(SCREENSHOT_COL);
        let model = table.ensure_column(MODEL_COL);
        let scheme = self.classifier.scheme();
        let model_name = self.classifier.model_name().to_string();

        let mut counts = BTreeMap::new();
        for (row, outcome) in table.rows.iter_mut().zip(outcomes) {
            let (category, explanation, path) = match outcome {
                RowOutcome::NotProcessed => (NOT_PROCESSED.to_string(), NOT_PROCESSED.to_string(), String::new()),
                RowOutcome::InvalidUrl => (INVALID_URL.to_string(), INVALID_URL_EXPLANATION.to_string(), String::new()),
                RowOutcome::CaptureFailed(_) => (ERROR.to_string(), CAPTURE_FAILED.to_string(), String::new()),
                RowOutcome::Classified { screenshot, result } => (
                    scheme.label(result.category),
                    result.explanation.clone(),
                    screenshot.display().to_string(),
                ),
            };
            *counts.entry(category.clone()).or_insert(0) += 1;
            row[cat] = category;
            row[expl] = explanation;
            row[shot] = path;
            row[model] = model_name.clone();
        }
        counts
    }
}

/// Read `input`, analyze every row and write `output`.
pub async fn run_analyze<C: CaptureProvider>(
    input: &Path,
    output: &Path,
    analyzer: &SiteAnalyzer<'_, C>,
) -> anyhow::Result<AnalyzeSummary> {
    let started = Instant::now();
    let mut table = read_table(input).map_err(PlacelensError::from)?;
    table
        .require_columns(input, &["website"])
        .map_err(PlacelensError::from)?;
    tracing::info!(rows = table.len(), input=%input.display(), model=%analyzer.classifier.model_name(), "analyze.start");

    let outcomes = analyzer.analyze_rows(&table).await;
    let by_category = analyzer.apply(&mut table, &outcomes);
    write_table(output, &table).with_context(|| format!("write {}", output.display()))?;

    let summary = AnalyzeSummary {
        rows: table.len(),
        by_category,
        written: output.to_path_buf(),
        cancelled: analyzer.cancel.is_cancelled(),
        elapsed: started.elapsed(),
    };
    tracing::info!(
        rows = summary.rows,
        categories=?summary.by_category,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "analyze.done"
    );
    Ok(summary)
}
