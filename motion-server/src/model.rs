//! Client for the external text-generation model.
//!
//! [`EditModel`] is the seam between the pipeline and whatever service turns
//! an instruction into an edited document. [`HttpEditModel`] speaks to Gemini
//! or an OpenAI-compatible API over HTTP; [`ModelClient`] wraps any model
//! with the instruction template and the per-call deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use motion_core::{AnimationDocument, FailureKind};
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::{EditorConfig, Provider};

/// Header carrying the per-call session identifier.
pub const SESSION_HEADER: &str = "x-session-id";

/// System instruction sent with every edit.
pub const SYSTEM_INSTRUCTION: &str = "\
You are an expert Lottie animation editor. You can modify Lottie JSON files based on natural language commands.

When given a Lottie animation JSON and a prompt, you should:
1. Analyze the Lottie structure to understand layers, shapes, colors, and text
2. Interpret the user's request (change colors, modify text, delete elements, etc.)
3. Return the modified Lottie JSON

Common modifications:
- Color changes: Modify 'c' values in shape fills/strokes
- Text changes: Modify 't' values in text layers
- Size changes: Modify transform properties
- Delete elements: Remove entire layers or shapes
- Replace numbers/years: Find and replace specific values

Always return valid JSON that maintains the Lottie structure.";

/// Errors that can occur when talking to the model service.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No credential was configured.
    #[error("no model API key configured")]
    MissingCredential,
    /// The endpoint could not be built.
    #[error("invalid model URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, TLS, body decoding).
    #[error("model HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("model service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The response envelope did not contain any text.
    #[error("unexpected model response: {0}")]
    UnexpectedResponse(String),
}

/// A service that completes an instruction with plain text.
#[async_trait]
pub trait EditModel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Send one system + user instruction pair and return the reply text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ModelError>;
}

/// Stand-in used when no credential is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredModel;

#[async_trait]
impl EditModel for UnconfiguredModel {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ModelError> {
        Err(ModelError::MissingCredential)
    }
}

/// HTTP-backed model.
#[derive(Debug, Clone)]
pub struct HttpEditModel {
    http: Client,
    provider: Provider,
    endpoint: Url,
    model: String,
    api_key: String,
}

impl HttpEditModel {
    /// Build a model client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingCredential`] without an API key,
    /// [`ModelError::InvalidUrl`] if the default endpoint cannot be parsed and
    /// [`ModelError::Http`] if the HTTP client fails to build.
    pub fn new(config: &EditorConfig) -> Result<Self, ModelError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ModelError::MissingCredential)?;
        let provider = Provider::for_api_key(&api_key);

        let endpoint = match &config.endpoint {
            Some(url) => url.clone(),
            None => Url::parse(provider.default_endpoint())
                .map_err(|e| ModelError::InvalidUrl(e.to_string()))?,
        };
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());

        let http = Client::builder()
            .user_agent(format!("motion-edit/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            provider,
            endpoint,
            model,
            api_key,
        })
    }

    /// Provider this client talks to.
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    fn url(&self, path: &str) -> Result<Url, ModelError> {
        let mut base = self.endpoint.clone();
        if !base.path().ends_with('/') {
            let path_with_slash = format!("{}/", base.path());
            base.set_path(&path_with_slash);
        }
        base.join(path)
            .map_err(|e| ModelError::InvalidUrl(e.to_string()))
    }

    async fn post(&self, url: Url, body: &Value, session_id: Uuid) -> Result<Value, ModelError> {
        let request = self
            .http
            .post(url)
            .header(SESSION_HEADER, session_id.to_string())
            .json(body);
        let request = match self.provider {
            Provider::Gemini => request.header("x-goog-api-key", &self.api_key),
            Provider::OpenAi => request.bearer_auth(&self.api_key),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl EditModel for HttpEditModel {
    fn name(&self) -> &str {
        self.provider.as_str()
    }

    #[tracing::instrument(
        name = "model_complete",
        skip_all,
        fields(
            provider = self.provider.as_str(),
            model = %self.model,
            session_id = tracing::field::Empty
        )
    )]
    async fn complete(&self, system: &str, user: &str) -> Result<String, ModelError> {
        let session_id = Uuid::new_v4();
        tracing::Span::current().record("session_id", tracing::field::display(session_id));

        match self.provider {
            Provider::OpenAi => {
                let body = json!({
                    "model": self.model,
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": user}
                    ]
                });
                let response = self.post(self.url("chat/completions")?, &body, session_id).await?;
                openai_text(&response)
            }
            Provider::Gemini => {
                let body = json!({
                    "systemInstruction": {"parts": [{"text": system}]},
                    "contents": [{"role": "user", "parts": [{"text": user}]}]
                });
                let path = format!("models/{}:generateContent", self.model);
                let response = self.post(self.url(&path)?, &body, session_id).await?;
                gemini_text(&response)
            }
        }
    }
}

fn openai_text(response: &Value) -> Result<String, ModelError> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModelError::UnexpectedResponse("missing choices[0].message.content".into()))
}

fn gemini_text(response: &Value) -> Result<String, ModelError> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ModelError::UnexpectedResponse("missing candidates[0].content.parts".into())
        })?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return Err(ModelError::UnexpectedResponse("empty candidate text".into()));
    }
    Ok(text)
}

/// The external edit client: one model call per request, under a deadline.
#[derive(Clone)]
pub struct ModelClient {
    model: Arc<dyn EditModel>,
    timeout: Duration,
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("model", &self.model.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ModelClient {
    /// Wrap `model` with a per-call `timeout`.
    #[must_use]
    pub fn new(model: Arc<dyn EditModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Build the HTTP model from configuration.
    ///
    /// A missing or unusable configuration is not fatal: the client is built
    /// around [`UnconfiguredModel`] and every edit takes the fallback path.
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        let model: Arc<dyn EditModel> = match HttpEditModel::new(config) {
            Ok(model) => {
                tracing::info!(provider = model.provider().as_str(), "model client configured");
                Arc::new(model)
            }
            Err(err) => {
                tracing::warn!(error = %err, "model client unavailable, edits will use heuristics");
                Arc::new(UnconfiguredModel)
            }
        };
        Self::new(model, config.timeout)
    }

    /// Whether a real model is behind this client.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.model.name() != UnconfiguredModel.name()
    }

    /// Ask the model to apply `prompt` to `document` and return its raw reply.
    ///
    /// Exactly one attempt is made. If the deadline passes, the in-flight
    /// call is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FailureKind::Timeout`] when the deadline passes and
    /// [`FailureKind::Unavailable`] for any configuration or transport error.
    pub async fn request(
        &self,
        document: &AnimationDocument,
        prompt: &str,
    ) -> Result<String, FailureKind> {
        let pretty = document.to_pretty_json().map_err(|err| {
            tracing::warn!(error = %err, "could not serialize document for the model");
            FailureKind::Unavailable
        })?;
        let user = user_instruction(prompt, &pretty);

        match tokio::time::timeout(self.timeout, self.model.complete(SYSTEM_INSTRUCTION, &user)).await
        {
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis(), "model call timed out");
                Err(FailureKind::Timeout)
            }
            Ok(Err(err)) => {
                tracing::warn!(model = self.model.name(), error = %err, "model call failed");
                Err(FailureKind::Unavailable)
            }
            Ok(Ok(text)) => {
                tracing::debug!(chars = text.len(), "model replied");
                Ok(text)
            }
        }
    }
}

/// User instruction embedding the prompt and the serialized document.
#[must_use]
pub fn user_instruction(prompt: &str, document_json: &str) -> String {
    format!(
        "Please modify this Lottie animation JSON based on the following request: \"{prompt}\"\n\n\
         Current Lottie JSON:\n{document_json}\n\n\
         Return only the modified JSON without any explanation."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_document() -> AnimationDocument {
        AnimationDocument::new(json!({"v": "5.5.7", "nm": "Sample", "layers": []}))
    }

    fn config_for(server: &MockServer, api_key: &str) -> EditorConfig {
        EditorConfig {
            api_key: Some(api_key.to_string()),
            ..EditorConfig::default()
        }
        .with_endpoint(&server.uri())
        .expect("endpoint")
    }

    fn client_for(config: &EditorConfig) -> ModelClient {
        let model = HttpEditModel::new(config).expect("model");
        ModelClient::new(Arc::new(model), config.timeout)
    }

    // =========================================================================
    // Unit tests that don't require network/wiremock

    #[test]
    fn test_user_instruction_embeds_prompt_and_document() {
        let text = user_instruction("delete BET", "{\"v\": \"5\"}");
        assert!(text.contains("\"delete BET\""));
        assert!(text.contains("{\"v\": \"5\"}"));
        assert!(text.ends_with("Return only the modified JSON without any explanation."));
    }

    #[test]
    fn test_missing_credential() {
        let err = HttpEditModel::new(&EditorConfig::default()).unwrap_err();
        assert!(matches!(err, ModelError::MissingCredential));
    }

    #[test]
    fn test_from_config_without_key_is_unconfigured() {
        let client = ModelClient::from_config(&EditorConfig::default());
        assert!(!client.is_configured());
    }

    #[test]
    fn test_envelope_parsing() {
        let openai = json!({"choices": [{"message": {"role": "assistant", "content": "{}"}}]});
        assert_eq!(openai_text(&openai).expect("text"), "{}");
        assert!(openai_text(&json!({"choices": []})).is_err());

        let gemini = json!({"candidates": [{"content": {"parts": [{"text": "{\"v\":"}, {"text": "\"5\"}"}]}}]});
        assert_eq!(gemini_text(&gemini).expect("text"), "{\"v\":\"5\"}");
        assert!(gemini_text(&json!({"candidates": [{"content": {"parts": []}}]})).is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_request_is_unavailable() {
        let client = ModelClient::new(Arc::new(UnconfiguredModel), Duration::from_secs(1));
        let result = client.request(&sample_document(), "make it bigger").await;
        assert_eq!(result.unwrap_err(), FailureKind::Unavailable);
    }

    // =========================================================================

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_openai_request_returns_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header_exists(SESSION_HEADER))
            .and(body_string_contains("make it bigger"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"v\":\"5.5.7\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&config_for(&server, "sk-test"));
        let text = client
            .request(&sample_document(), "make it bigger")
            .await
            .expect("reply");
        assert_eq!(text, "{\"v\":\"5.5.7\"}");
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_gemini_request_returns_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "AIzaTestKey"))
            .and(body_string_contains("expert Lottie animation editor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "```json\n{\"v\":\"5\"}\n```"}]}}]
            })))
            .mount(&server)
            .await;

        let config = config_for(&server, "AIzaTestKey");
        let model = HttpEditModel::new(&config).expect("model");
        assert_eq!(model.provider(), Provider::Gemini);

        let text = client_for(&config)
            .request(&sample_document(), "delete BET")
            .await
            .expect("reply");
        assert!(text.contains("{\"v\":\"5\"}"));
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_error_status_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let config = config_for(&server, "sk-test");
        let model = HttpEditModel::new(&config).expect("model");
        let err = model.complete("system", "user").await.unwrap_err();
        match err {
            ModelError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let result = client_for(&config).request(&sample_document(), "x").await;
        assert_eq!(result.unwrap_err(), FailureKind::Unavailable);
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_slow_model_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(json!({"choices": [{"message": {"content": "{}"}}]})),
            )
            .mount(&server)
            .await;

        let config = EditorConfig {
            timeout: Duration::from_millis(100),
            ..config_for(&server, "sk-test")
        };
        let result = client_for(&config).request(&sample_document(), "x").await;
        assert_eq!(result.unwrap_err(), FailureKind::Timeout);
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_missing_envelope_is_unexpected_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .mount(&server)
            .await;

        let model = HttpEditModel::new(&config_for(&server, "sk-test")).expect("model");
        let err = model.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, ModelError::UnexpectedResponse(_)));
    }
}
