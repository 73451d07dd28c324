//! Vision-model integration for placelens.
//!
//! [`traits::VisionClient`] is the seam between the classifier and a
//! provider; [`openai::OpenAiVisionClient`] implements it for any
//! OpenAI-compatible `chat/completions` endpoint (OpenRouter by default).
//! [`aesthetic`] holds the classification pipeline built on top.
//!
//! # Examples
//! ```no_run
//! use placelens_llm::aesthetic::AestheticClassifier;
//! use placelens_llm::openai::{OpenAiVisionClient, DEFAULT_VISION_MODEL, OPENROUTER_API_BASE};
//! use std::sync::Arc;
//!
//! # fn demo() -> Result<(), placelens_llm::traits::LlmError> {
//! let client = OpenAiVisionClient::new(
//!     OPENROUTER_API_BASE,
//!     "sk-or-...".into(),
//!     DEFAULT_VISION_MODEL.into(),
//! )?
//! .with_app_headers(None, Some("placelens"))?;
//! let classifier = AestheticClassifier::new(Arc::new(client));
//! assert!(!classifier.model_name().is_empty());
//! # Ok(()) }
//! ```
pub mod aesthetic;
pub mod image;
pub mod openai;
pub mod traits;

pub use aesthetic::{AestheticClassifier, Category, ClassificationResult, LabelScheme, RetryPolicy};
pub use image::EncodedImage;
pub use traits::{LlmError, LlmResponse, VisionClient};
