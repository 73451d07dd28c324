//! `placelens sort-json`: rank the `items` of a JSON export by a numeric key.
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use placelens_common::PlacelensError;
use serde_json::Value;

pub const DEFAULT_LADDER: [usize; 5] = [10, 25, 50, 100, 250];

#[derive(Debug, Clone)]
pub struct RankOptions {
    pub key: String,
    pub ascending: bool,
    pub top: Option<usize>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            key: "playCount".to_string(),
            ascending: false,
            top: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankSummary {
    pub original: usize,
    pub kept: usize,
    pub highest: Option<Value>,
    pub lowest: Option<Value>,
    pub output: PathBuf,
}

impl fmt::Display for RankSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.output.display())?;
        writeln!(f, "  original items: {}", self.original)?;
        writeln!(f, "  final items:    {}", self.kept)?;
        if let (Some(hi), Some(lo)) = (&self.highest, &self.lowest) {
            writeln!(f, "  highest:        {hi}")?;
            write!(f, "  lowest:         {lo}")?;
        }
        if self.kept < self.original {
            write!(f, "\n  removed:        {}", self.original - self.kept)?;
        }
        Ok(())
    }
}

fn score(item: &Value, key: &str) -> f64 {
    item.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn key_value(item: &Value, key: &str) -> Value {
    item.get(key)
        .filter(|v| v.is_number())
        .cloned()
        .unwrap_or_else(|| Value::from(0))
}

fn items_mut<'a>(doc: &'a mut Value, source: &Path) -> Result<&'a mut Vec<Value>, PlacelensError> {
    doc.get_mut("items")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| {
            PlacelensError::Input(format!("{} does not contain an 'items' array", source.display()))
        })
}

/// Sort `items` in place (stable) and truncate to `top`. Returns (original, kept).
pub fn rank_items(
    doc: &mut Value,
    source: &Path,
    opts: &RankOptions,
) -> Result<(usize, usize), PlacelensError> {
    let items = items_mut(doc, source)?;
    let original = items.len();
    let key = opts.key.as_str();
    items.sort_by(|a, b| {
        let ord = score(a, key).total_cmp(&score(b, key));
        if opts.ascending { ord } else { ord.reverse() }
    });
    if let Some(n) = opts.top.filter(|n| *n > 0) {
        if n < items.len() {
            items.truncate(n);
        } else {
            tracing::info!(requested = n, available = items.len(), "rank.top.keeps_all");
        }
    }
    Ok((original, items.len()))
}

fn extremes(items: &[Value], key: &str) -> (Option<Value>, Option<Value>) {
    let by_score = |a: &&Value, b: &&Value| -> Ordering { score(a, key).total_cmp(&score(b, key)) };
    (
        items.iter().max_by(by_score).map(|v| key_value(v, key)),
        items.iter().min_by(by_score).map(|v| key_value(v, key)),
    )
}

pub fn read_document(path: &Path) -> Result<Value, PlacelensError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PlacelensError::Input(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| PlacelensError::Input(format!("{} is not valid JSON: {e}", path.display())))
}

pub fn write_document(path: &Path, doc: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}

/// Rank one document and write it to `output`.
pub fn rank_file(input: &Path, output: &Path, opts: &RankOptions) -> anyhow::Result<RankSummary> {
    let mut doc = read_document(input)?;
    let (original, kept) = rank_items(&mut doc, input, opts)?;
    let (highest, lowest) = extremes(items_mut(&mut doc, input)?, &opts.key);
    write_document(output, &doc)?;
    tracing::info!(input=%input.display(), output=%output.display(), original, kept, "rank.written");
    Ok(RankSummary {
        original,
        kept,
        highest,
        lowest,
        output: output.to_path_buf(),
    })
}

/// One file per rung, named `{prefix}{n}{suffix}`, always descending.
pub fn rank_ladder(
    input: &Path,
    rungs: &[usize],
    prefix: &str,
    suffix: &str,
    key: &str,
) -> anyhow::Result<Vec<RankSummary>> {
    let mut summaries = Vec::with_capacity(rungs.len());
    for &n in rungs {
        let output = PathBuf::from(format!("{prefix}{n}{suffix}"));
        let opts = RankOptions {
            key: key.to_string(),
            ascending: false,
            top: Some(n),
        };
        summaries.push(rank_file(input, &output, &opts)?);
    }
    Ok(summaries)
}

/// Parse `10,25,50` into rungs; zero and junk are rejected.
pub fn parse_ladder(raw: &str) -> Result<Vec<usize>, PlacelensError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(PlacelensError::Input(format!("invalid ladder rung {s:?}"))),
        })
        .collect()
}
