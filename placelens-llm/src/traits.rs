use crate::image::EncodedImage;
use async_trait::async_trait;
use placelens_common::PlacelensError;
use placelens_http::HttpError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// Failure kinds a completion call can end in. The classifier branches on these.
#[derive(thiserror::Error, Debug, Clone)]
pub enum LlmError {
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Unexpected(String),
}

impl LlmError {
    /// Rate limits, dropped connections and timeouts; worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimit(_) | Self::Connection(_) | Self::Timeout(_)
        )
    }
}

impl From<HttpError> for LlmError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Network(m) => Self::Connection(m),
            HttpError::Timeout(m) => Self::Timeout(m),
            HttpError::Api {
                status, message, ..
            } if status.as_u16() == 429 => Self::RateLimit(message),
            HttpError::Api {
                status, message, ..
            } => Self::Api {
                status: status.as_u16(),
                message,
            },
            other @ (HttpError::Url(_) | HttpError::Build(_) | HttpError::Decode(..)) => {
                Self::Unexpected(other.to_string())
            }
        }
    }
}

impl From<LlmError> for PlacelensError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::RateLimit(_) | LlmError::Connection(_) | LlmError::Timeout(_) => {
                PlacelensError::TransientRemote(e.to_string())
            }
            LlmError::Api { .. } => PlacelensError::FatalRemote(e.to_string()),
            LlmError::Config(m) => PlacelensError::Config(m),
            LlmError::Unexpected(m) => PlacelensError::Unexpected(m),
        }
    }
}

/// A chat-completion endpoint that accepts one prompt plus one image.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Send a single user turn holding `prompt` and `image`; return the reply text.
    async fn complete_with_image(
        &self,
        prompt: &str,
        image: &EncodedImage,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn api(status: StatusCode) -> HttpError {
        HttpError::Api {
            status,
            message: "m".into(),
            request_id: "-".into(),
        }
    }

    #[test]
    fn http_failures_map_onto_llm_kinds() {
        assert!(matches!(
            LlmError::from(api(StatusCode::TOO_MANY_REQUESTS)),
            LlmError::RateLimit(_)
        ));
        assert!(matches!(
            LlmError::from(api(StatusCode::BAD_GATEWAY)),
            LlmError::Api { status: 502, .. }
        ));
        assert!(matches!(
            LlmError::from(HttpError::Timeout("t".into())),
            LlmError::Timeout(_)
        ));
        assert!(matches!(
            LlmError::from(HttpError::Decode("eof".into(), String::new())),
            LlmError::Unexpected(_)
        ));
    }

    #[test]
    fn server_errors_are_not_transient() {
        assert!(!LlmError::from(api(StatusCode::INTERNAL_SERVER_ERROR)).is_transient());
        assert!(LlmError::Connection("reset".into()).is_transient());
    }

    #[test]
    fn converts_into_workspace_taxonomy() {
        let err: PlacelensError = LlmError::RateLimit("slow down".into()).into();
        assert!(err.is_transient());
        let err: PlacelensError = LlmError::Api {
            status: 401,
            message: "bad key".into(),
        }
        .into();
        assert!(matches!(err, PlacelensError::FatalRemote(_)));
        let err: PlacelensError = LlmError::Unexpected("boom".into()).into();
        assert_eq!(err.kind(), "unexpected");
    }
}
