//! Ordered parser for `Category: ... / Explanation: ...` replies.
//!
//! Steps, first hit wins:
//! 1. a `Category:` field, validated against the scheme's three labels
//! 2. a case-insensitive substring scan for a label, best tier first
//! 3. `Uncategorized`
use super::{Category, LabelScheme};
use placelens_common::PlacelensError;
use regex::Regex;
use std::sync::OnceLock;

pub const EXPLANATION_MISSING: &str =
    "Explanation not found in expected format, but category assigned.";
const RAW_EXCERPT_CHARS: usize = 250;

/// Which parser step produced the category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// `Category:` held a valid label.
    Structured(Category),
    /// `Category:` held something outside the label set.
    InvalidLabel(String),
    /// No `Category:` field; a label was found in the free text.
    SubstringFallback(Category),
    Unmatched,
}

impl ParseOutcome {
    pub fn category(&self) -> Category {
        match self {
            Self::Structured(c) | Self::SubstringFallback(c) => *c,
            Self::InvalidLabel(_) => Category::InvalidCategory,
            Self::Unmatched => Category::Uncategorized,
        }
    }

    /// The format failure behind a non-structured outcome, if any.
    pub fn format_error(&self) -> Option<PlacelensError> {
        match self {
            Self::Structured(_) => None,
            Self::InvalidLabel(word) => {
                Some(PlacelensError::Format(format!("label {word:?} outside the scheme")))
            }
            Self::SubstringFallback(_) => {
                Some(PlacelensError::Format("no Category line".into()))
            }
            Self::Unmatched => Some(PlacelensError::Format("no label in reply".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub outcome: ParseOutcome,
    pub category: Category,
    pub explanation: String,
}

fn category_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        // A line of its own, tolerating markdown bold and a bracketed label:
        // "**Category:** [Modern]"
        Regex::new(r"(?im)^[ \t]*\**[ \t]*category[ \t]*\**[ \t]*:[ \t]*\**[ \t]*\[?[ \t]*([a-z][a-z\-]*)")
            .ok()
    })
    .as_ref()
}

fn explanation_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)explanation\s*\**\s*:\s*\**(.*)").ok())
        .as_ref()
}

fn excerpt(raw: &str) -> String {
    let head: String = raw.chars().take(RAW_EXCERPT_CHARS).collect();
    format!("Raw LLM Response (format error): {head}...")
}

/// Run the three category steps over `raw`.
pub fn parse_category(raw: &str, scheme: &LabelScheme) -> ParseOutcome {
    if let Some(caps) = category_re().and_then(|re| re.captures(raw)) {
        let word = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        return match scheme.tier_for(word) {
            Some(cat) => ParseOutcome::Structured(cat),
            None => ParseOutcome::InvalidLabel(word.to_string()),
        };
    }

    let lower = raw.to_lowercase();
    for cat in Category::TIERS {
        if lower.contains(&scheme.label(cat).to_lowercase()) {
            return ParseOutcome::SubstringFallback(cat);
        }
    }
    ParseOutcome::Unmatched
}

/// Parse a full reply into category and explanation.
///
/// ```
/// use placelens_llm::aesthetic::{parse::parse_reply, Category, LabelScheme};
///
/// let parsed = parse_reply(
///     "Category: modern\nExplanation: Generous white space and crisp type.",
///     &LabelScheme::MODERNITY,
/// );
/// assert_eq!(parsed.category, Category::Modern);
/// assert_eq!(parsed.explanation, "Generous white space and crisp type.");
/// ```
pub fn parse_reply(raw: &str, scheme: &LabelScheme) -> ParsedReply {
    let raw = raw.trim();
    let outcome = parse_category(raw, scheme);
    let category = outcome.category();

    if let Some(err) = outcome.format_error() {
        match &outcome {
            ParseOutcome::SubstringFallback(cat) => {
                tracing::warn!(kind = err.kind(), error=%err, fallback=%scheme.label(*cat), "aesthetic.parse.no_category_line");
            }
            _ => tracing::warn!(kind = err.kind(), error=%err, "aesthetic.parse.format"),
        }
    }

    let explanation = match explanation_re()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
    {
        Some(text) if !text.is_empty() => text.to_string(),
        _ if category.is_tier() => {
            tracing::warn!(category=%scheme.label(category), "aesthetic.parse.no_explanation");
            EXPLANATION_MISSING.to_string()
        }
        _ => excerpt(raw),
    };

    ParsedReply {
        outcome,
        category,
        explanation,
    }
}
