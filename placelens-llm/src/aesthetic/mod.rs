//! Screenshot aesthetic classification.
//!
//! [`AestheticClassifier::classify`] encodes a screenshot, sends it with a
//! fixed prompt to a [`VisionClient`], retries transient failures with
//! backoff, parses the reply with [`parse::parse_reply`] and finally applies
//! [`consistency::enforce_consistency`]. Every path ends in a
//! [`ClassificationResult`]; nothing here returns an error to the caller.
//!
//! ```no_run
//! use placelens_llm::aesthetic::{AestheticClassifier, LabelScheme, RetryPolicy};
//! use placelens_llm::openai::{OpenAiVisionClient, OPENROUTER_API_BASE, DEFAULT_VISION_MODEL};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), placelens_llm::traits::LlmError> {
//! let client = OpenAiVisionClient::new(
//!     OPENROUTER_API_BASE,
//!     std::env::var("OPENROUTER_API_KEY").unwrap_or_default(),
//!     DEFAULT_VISION_MODEL.into(),
//! )?;
//! let classifier = AestheticClassifier::new(Arc::new(client))
//!     .with_scheme(LabelScheme::MODERNITY)
//!     .with_policy(RetryPolicy::default());
//! let result = classifier.classify("screenshots/0_example.com.png".as_ref()).await;
//! println!("{}: {}", result.category, result.explanation);
//! # Ok(()) }
//! ```
pub mod consistency;
pub mod parse;
mod prompt;

use crate::image::encode_image;
use crate::traits::{LlmError, VisionClient};
use placelens_common::PlacelensError;
use placelens_runtime::{sleep_or_cancel, RateLimiter};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Modern,
    Acceptable,
    Outdated,
    Uncategorized,
    InvalidCategory,
    Error,
}

impl Category {
    /// The three verdict tiers, best first.
    pub const TIERS: [Category; 3] = [Category::Modern, Category::Acceptable, Category::Outdated];

    pub fn is_tier(self) -> bool {
        matches!(self, Self::Modern | Self::Acceptable | Self::Outdated)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Modern => "Modern",
            Self::Acceptable => "Acceptable",
            Self::Outdated => "Outdated",
            Self::Uncategorized => "Uncategorized",
            Self::InvalidCategory => "Invalid Category",
            Self::Error => "Error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub category: Category,
    pub explanation: String,
}

impl ClassificationResult {
    pub fn new(category: Category, explanation: impl Into<String>) -> Self {
        Self {
            category,
            explanation: explanation.into(),
        }
    }

    pub fn error(explanation: impl Into<String>) -> Self {
        Self::new(Category::Error, explanation)
    }
}

/// Three labels plus the prompt that asks for them, best tier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelScheme {
    pub name: &'static str,
    pub best: &'static str,
    pub middle: &'static str,
    pub worst: &'static str,
    pub prompt: &'static str,
}

impl LabelScheme {
    pub const MODERNITY: LabelScheme = LabelScheme {
        name: "modernity",
        best: "Modern",
        middle: "Acceptable",
        worst: "Outdated",
        prompt: prompt::MODERNITY_PROMPT,
    };

    pub const BEAUTY: LabelScheme = LabelScheme {
        name: "beauty",
        best: "Beautiful",
        middle: "Passable",
        worst: "Ugly",
        prompt: prompt::BEAUTY_PROMPT,
    };

    pub fn by_name(name: &str) -> Option<LabelScheme> {
        [Self::MODERNITY, Self::BEAUTY]
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Output label for a category under this scheme.
    pub fn label(&self, category: Category) -> String {
        match category {
            Category::Modern => self.best.to_string(),
            Category::Acceptable => self.middle.to_string(),
            Category::Outdated => self.worst.to_string(),
            other => other.to_string(),
        }
    }

    /// Case-insensitive lookup of a tier by label.
    pub fn tier_for(&self, word: &str) -> Option<Category> {
        let word = word.trim();
        Category::TIERS
            .into_iter()
            .find(|c| self.label(*c).eq_ignore_ascii_case(word))
    }
}

impl Default for LabelScheme {
    fn default() -> Self {
        Self::MODERNITY
    }
}

/// Attempt ceiling and backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-based): `base * 2^attempt + base/2 * attempt`.
    ///
    /// ```
    /// use placelens_llm::aesthetic::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let p = RetryPolicy::default();
    /// assert_eq!(p.delay_for(0), Duration::from_secs(5));
    /// assert_eq!(p.delay_for(1), Duration::from_millis(12_500));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.min(16) as i32);
        self.base_delay.mul_f64(exp + 0.5 * attempt as f64)
    }
}

pub const SCREENSHOT_MISSING: &str = "Screenshot not available for analysis.";
pub const ENCODE_FAILED: &str = "Failed to encode image.";
pub const CANCELLED: &str = "Analysis cancelled before completion.";

pub struct AestheticClassifier {
    client: Arc<dyn VisionClient>,
    scheme: LabelScheme,
    policy: RetryPolicy,
    max_tokens: u32,
    limiter: Option<Arc<RateLimiter>>,
    cancel: CancellationToken,
}

impl AestheticClassifier {
    pub fn new(client: Arc<dyn VisionClient>) -> Self {
        Self {
            client,
            scheme: LabelScheme::default(),
            policy: RetryPolicy::default(),
            max_tokens: 200,
            limiter: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_scheme(mut self, scheme: LabelScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = RetryPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Share a limiter across classifiers; every attempt takes one token.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn scheme(&self) -> &LabelScheme {
        &self.scheme
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Classify one screenshot. Never fails; errors become `Category::Error`.
    pub async fn classify(&self, image: &Path) -> ClassificationResult {
        let started = Instant::now();
        let result = self.classify_inner(image).await;
        tracing::info!(
            image=%image.display(),
            model=%self.model_name(),
            category=%self.scheme.label(result.category),
            elapsed_ms=started.elapsed().as_millis() as u64,
            "aesthetic.done"
        );
        result
    }

    fn failed(
        &self,
        image: &Path,
        err: PlacelensError,
        event: &str,
        explanation: impl Into<String>,
    ) -> ClassificationResult {
        tracing::error!(image=%image.display(), kind = err.kind(), error=%err, event, "aesthetic.failed");
        ClassificationResult::error(explanation)
    }

    fn cancelled(&self, image: &Path) -> ClassificationResult {
        self.failed(image, PlacelensError::Cancelled, "cancelled", CANCELLED)
    }

    async fn classify_inner(&self, image: &Path) -> ClassificationResult {
        if !image.is_file() {
            let err = PlacelensError::Resource(format!("{} is not a file", image.display()));
            return self.failed(image, err, "screenshot_missing", SCREENSHOT_MISSING);
        }
        let encoded = match encode_image(image).await {
            Ok(e) => e,
            Err(err) => {
                let err = PlacelensError::Resource(err.to_string());
                return self.failed(image, err, "encode_failed", ENCODE_FAILED);
            }
        };

        let max = self.policy.max_attempts;
        for attempt in 0..max {
            if self.cancel.is_cancelled() {
                return self.cancelled(image);
            }
            if let Some(limiter) = &self.limiter {
                tokio::select! {
                    _ = limiter.acquire(1) => {}
                    _ = self.cancel.cancelled() => return self.cancelled(image),
                }
            }

            tracing::info!(
                image=%image.display(),
                attempt=attempt + 1,
                max_attempts=max,
                bytes_b64=encoded.base64.len(),
                "aesthetic.attempt.start"
            );

            let err = match self
                .client
                .complete_with_image(self.scheme.prompt, &encoded, self.max_tokens)
                .await
            {
                Ok(resp) => {
                    tracing::debug!(image=%image.display(), reply=%resp.text.chars().take(300).collect::<String>(), "aesthetic.reply");
                    let parsed = parse::parse_reply(&resp.text, &self.scheme);
                    let mut result = ClassificationResult::new(parsed.category, parsed.explanation);
                    consistency::enforce_consistency(&mut result, &self.scheme);
                    return result;
                }
                Err(err) => err,
            };

            let message = err.to_string();
            let cause = PlacelensError::from(err.clone());
            match &err {
                e if e.is_transient() => {
                    tracing::warn!(image=%image.display(), attempt=attempt + 1, kind = cause.kind(), error=%e, "aesthetic.attempt.failed");
                    if attempt + 1 == max {
                        return self.failed(
                            image,
                            cause,
                            "retries_exhausted",
                            format!("Failed API call after {max} attempts: {message}"),
                        );
                    }
                    let delay = self.policy.delay_for(attempt);
                    tracing::info!(delay_ms = delay.as_millis() as u64, "aesthetic.retry.backoff");
                    if sleep_or_cancel(&self.cancel, delay).await.is_err() {
                        return self.cancelled(image);
                    }
                }
                LlmError::Api { .. } => {
                    return self.failed(image, cause, "api_error", format!("API error: {message}"));
                }
                _ => {
                    return self.failed(
                        image,
                        cause,
                        "unexpected_error",
                        format!("Unexpected analysis error: {message}"),
                    );
                }
            }
        }
        // max_attempts >= 1, so the loop always returns
        self.cancelled(image)
    }
}
