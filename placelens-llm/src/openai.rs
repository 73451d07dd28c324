//! Client for OpenAI-compatible `chat/completions` endpoints (OpenRouter,
//! OpenAI, gateways) with image input.
use crate::image::EncodedImage;
use crate::traits::{LlmError, LlmResponse, VisionClient};
use async_trait::async_trait;
use placelens_http::{Auth, HttpClient, RequestOpts};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_VISION_MODEL: &str = "google/gemini-2.0-flash-lite-001";

pub struct OpenAiVisionClient {
    client: HttpClient,
    api_key: String,
    model: String,
    headers: HeaderMap,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    // OpenRouter reports some upstream failures in a 200 body.
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: String,
}

impl OpenAiVisionClient {
    /// Create a client for `base_url` (e.g. `https://openrouter.ai/api/v1`).
    ///
    /// Retries are left to the caller, so every failure surfaces with its kind.
    pub fn new(base_url: &str, api_key: String, model: String) -> Result<Self, LlmError> {
        let client = HttpClient::new(base_url)
            .map_err(|e| LlmError::Config(format!("HttpClient init failed: {e}")))?
            .with_retries(0);
        Ok(Self {
            client,
            api_key,
            model,
            headers: HeaderMap::new(),
            timeout: Duration::from_secs(60),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attribution headers OpenRouter uses for its app rankings.
    pub fn with_app_headers(
        mut self,
        referer: Option<&str>,
        title: Option<&str>,
    ) -> Result<Self, LlmError> {
        let pairs = [("http-referer", referer), ("x-title", title)];
        for (name, value) in pairs {
            let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| LlmError::Config(format!("invalid {name} header: {e}")))?;
            self.headers.insert(HeaderName::from_static(name), value);
        }
        Ok(self)
    }
}

fn content_text(content: Option<Value>) -> String {
    match content {
        Some(Value::String(s)) => s,
        // Some providers return content parts instead of a plain string.
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

#[async_trait]
impl VisionClient for OpenAiVisionClient {
    async fn complete_with_image(
        &self,
        prompt: &str,
        image: &EncodedImage,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError> {
        let req = ChatRequest {
            model: &self.model,
            max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
        };

        tracing::debug!(model=%self.model, image_b64_len=image.base64.len(), "llm.vision.request");

        let resp: ChatResponse = self
            .client
            .post_json_opts(
                "chat/completions",
                &req,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.api_key)),
                    headers: Some(self.headers.clone()),
                    timeout: Some(self.timeout),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;

        if let Some(err) = resp.error {
            let status = err
                .code
                .as_ref()
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(200);
            if status == 429 {
                return Err(LlmError::RateLimit(err.message));
            }
            return Err(LlmError::Api {
                status,
                message: err.message,
            });
        }

        let Some(choice) = resp.choices.into_iter().next() else {
            return Err(LlmError::Unexpected("completion had no choices".into()));
        };
        let text = content_text(choice.message.content).trim().to_string();

        tracing::debug!(
            model=%self.model,
            reply_len=text.len(),
            tokens=?resp.usage.as_ref().and_then(|u| u.total_tokens),
            "llm.vision.response"
        );

        Ok(LlmResponse {
            text,
            model: resp.model,
            tokens_used: resp.usage.and_then(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
