//! Hugging Face Inference API backend.

use super::{ChatRequest, ChatResponse, LlmBackend, Role};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const INFERENCE_API_URL: &str = "https://router.huggingface.co/v1/chat/completions";

/// Default hosted model.
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-72B-Instruct";

/// Environment variable holding the API token.
pub const TOKEN_ENV_VAR: &str = "HUGGINGFACE_API_TOKEN";

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Builder for creating an inference backend.
#[derive(Debug, Clone)]
pub struct InferenceBackendBuilder {
    token: String,
    model: String,
    max_tokens: u32,
}

impl InferenceBackendBuilder {
    /// Create a new builder with an API token and model.
    pub fn new(token: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            model: model.into(),
            max_tokens: 4096,
        }
    }

    /// Set the maximum tokens for responses.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the backend.
    ///
    /// An absent credential fails here, as a configuration error, instead
    /// of surfacing later as a rejected remote call.
    pub fn build(self) -> Result<InferenceBackend> {
        if self.token.trim().is_empty() {
            return Err(Error::Config(format!(
                "inference API token is empty: set {TOKEN_ENV_VAR}"
            )));
        }

        Ok(InferenceBackend {
            http: reqwest::Client::new(),
            token: self.token,
            model: self.model,
            max_tokens: self.max_tokens,
        })
    }
}

/// Hugging Face Inference API backend.
#[derive(Debug)]
pub struct InferenceBackend {
    http: reqwest::Client,
    token: String,
    model: String,
    max_tokens: u32,
}

impl InferenceBackend {
    /// Create a builder for the inference backend.
    pub fn builder(
        token: impl Into<String>,
        model: impl Into<String>,
    ) -> InferenceBackendBuilder {
        InferenceBackendBuilder::new(token, model)
    }

    /// Create a backend from the `HUGGINGFACE_API_TOKEN` environment
    /// variable with the default model.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV_VAR)
            .map_err(|_| Error::Config(format!("{TOKEN_ENV_VAR} not set")))?;
        Self::builder(token, DEFAULT_MODEL).build()
    }

    fn role_to_api_str(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for InferenceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inference({})", self.model)
    }
}

impl LlmBackend for InferenceBackend {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
        let mut api_messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            api_messages.push(ApiMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        api_messages.extend(request.messages.iter().map(|m| ApiMessage {
            role: Self::role_to_api_str(m.role),
            content: m.content.clone(),
        }));

        let api_request = ApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: api_messages,
        };

        let response = self
            .http
            .post(INFERENCE_API_URL)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Api("response contained no choices".into()))?;

        Ok(ChatResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_fails_at_build() {
        let err = InferenceBackend::builder("", DEFAULT_MODEL).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");

        let err = InferenceBackend::builder("   ", DEFAULT_MODEL).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[test]
    fn valid_token_builds() {
        let backend = InferenceBackend::builder("hf_test", DEFAULT_MODEL)
            .max_tokens(512)
            .build()
            .unwrap();
        assert_eq!(backend.to_string(), format!("inference({DEFAULT_MODEL})"));
    }
}
