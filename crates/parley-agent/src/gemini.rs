//! Google Gemini client (`generateContent` REST endpoint).

use std::time::Duration;

use async_trait::async_trait;
use parley_core::config::ModelConfig;
use parley_core::{ParleyError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::llm::{LanguageModel, ModelRequest, Role};

/// Gemini text generation over HTTPS.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiModel {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
        })
    }

    pub fn from_config(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::new(
            &config.base_url,
            api_key,
            config.model.clone(),
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn translate_request(&self, request: &ModelRequest) -> GeminiRequest {
        let system_instruction = request.system.as_ref().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: text.clone() }],
        });

        let contents = request
            .messages
            .iter()
            .filter(|m| !m.text.is_empty())
            .map(|m| GeminiContent {
                role: Some(
                    match m.role {
                        Role::User => "user",
                        Role::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: m.text.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                temperature: Some(request.temperature.unwrap_or(self.temperature)),
                stop_sequences: if request.stop.is_empty() {
                    None
                } else {
                    Some(request.stop.clone())
                },
            },
        }
    }

    fn extract_text(resp: GeminiResponse) -> std::result::Result<String, AgentError> {
        if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AgentError::invalid_request(format!(
                "Prompt blocked: {}",
                reason
            )));
        }

        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::malformed("No candidates in response"))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            return Err(AgentError::malformed(format!(
                "Empty candidate (finish reason: {})",
                reason
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(&self, request: &ModelRequest) -> std::result::Result<String, AgentError> {
        let body = self.translate_request(request);
        tracing::debug!(model = %self.model, messages = body.contents.len(), "Calling Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::timeout(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    AgentError::network(format!("Connection failed: {}", e))
                } else {
                    AgentError::network(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            let err = match status.as_u16() {
                400 => AgentError::invalid_request(format!("Invalid request: {}", message)),
                401 | 403 => AgentError::auth(format!("Authentication failed: {}", message)),
                429 => AgentError::rate_limit(format!("Rate limit exceeded: {}", message)),
                500..=599 => AgentError::server(format!("Server error: {}", message)),
                _ => AgentError::invalid_request(format!("HTTP {}: {}", status, message)),
            };
            return Err(match retry_after {
                Some(d) => err.with_retry_after(d),
                None => err,
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| AgentError::malformed(format!("Failed to parse response: {}", e)))?;

        Self::extract_text(parsed)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentErrorKind;
    use crate::llm::ModelMessage;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    const ROUTE: &str = "/models/test-model:generateContent";

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn model(base: &str) -> GeminiModel {
        GeminiModel::new(base, "secret", "test-model", 0.4, Duration::from_secs(5)).unwrap()
    }

    fn failing_router(status: StatusCode, message: &'static str) -> Router {
        Router::new().route(
            ROUTE,
            post(move || async move {
                (status, Json(json!({ "error": { "code": status.as_u16(), "message": message } })))
            }),
        )
    }

    #[test]
    fn test_translate_request() {
        let m = model("http://unused");
        let request = ModelRequest {
            system: Some("be brief".into()),
            messages: vec![
                ModelMessage::user("hello"),
                ModelMessage::model("hi"),
                ModelMessage::user("bye"),
            ],
            temperature: None,
            stop: vec!["\nObservation:".into()],
        };
        let value = serde_json::to_value(m.translate_request(&request)).unwrap();

        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"].as_array().unwrap().len(), 3);
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(value["contents"][2]["parts"][0]["text"], "bye");
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.4).abs() < 1e-6);
        assert_eq!(value["generationConfig"]["stopSequences"][0], "\nObservation:");
    }

    #[test]
    fn test_translate_request_overrides_and_omissions() {
        let m = model("http://unused");
        let request = ModelRequest::prompt("hi").with_temperature(0.9);
        let value = serde_json::to_value(m.translate_request(&request)).unwrap();

        assert!(value.get("systemInstruction").is_none());
        assert!(value["generationConfig"].get("stopSequences").is_none());
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_generate_success() {
        let router = Router::new().route(
            ROUTE,
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers.get("x-goog-api-key").unwrap(), "secret");
                let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap().to_string();
                Json(json!({
                    "candidates": [{
                        "content": { "role": "model", "parts": [
                            { "text": "echo: " }, { "text": prompt }
                        ]},
                        "finishReason": "STOP"
                    }],
                    "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 2 }
                }))
            }),
        );
        let base = serve(router).await;

        let text = model(&base)
            .generate(&ModelRequest::prompt("hello"))
            .await
            .unwrap();
        assert_eq!(text, "echo: hello");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (StatusCode::BAD_REQUEST, AgentErrorKind::InvalidRequest),
            (StatusCode::UNAUTHORIZED, AgentErrorKind::Auth),
            (StatusCode::FORBIDDEN, AgentErrorKind::Auth),
            (StatusCode::TOO_MANY_REQUESTS, AgentErrorKind::RateLimit),
            (StatusCode::SERVICE_UNAVAILABLE, AgentErrorKind::Server),
        ];
        for (status, kind) in cases {
            let base = serve(failing_router(status, "nope")).await;
            let err = model(&base)
                .generate(&ModelRequest::prompt("hi"))
                .await
                .unwrap_err();
            assert_eq!(err.kind, kind, "status {}", status);
            assert!(err.message.contains("nope"));
        }
    }

    #[tokio::test]
    async fn test_rate_limit_retry_after() {
        let router = Router::new().route(
            ROUTE,
            post(|| async {
                let mut headers = HeaderMap::new();
                headers.insert("retry-after", "7".parse().unwrap());
                (StatusCode::TOO_MANY_REQUESTS, headers, "quota exhausted").into_response()
            }),
        );
        let base = serve(router).await;

        let err = model(&base)
            .generate(&ModelRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::RateLimit);
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
        assert_eq!(err.message, "Rate limit exceeded: quota exhausted");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let router = Router::new().route(ROUTE, post(|| async { "not json" }));
        let base = serve(router).await;

        let err = model(&base)
            .generate(&ModelRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_empty_candidate_and_block() {
        let router = Router::new().route(
            ROUTE,
            post(|| async { Json(json!({ "candidates": [{ "finishReason": "SAFETY" }] })) }),
        );
        let base = serve(router).await;
        let err = model(&base)
            .generate(&ModelRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::MalformedResponse);
        assert!(err.message.contains("SAFETY"));

        let router = Router::new().route(
            ROUTE,
            post(|| async { Json(json!({ "promptFeedback": { "blockReason": "OTHER" } })) }),
        );
        let base = serve(router).await;
        let err = model(&base)
            .generate(&ModelRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = model(&format!("http://{}", addr))
            .generate(&ModelRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::Network);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_config() {
        let config = ModelConfig::default();
        let m = GeminiModel::from_config(&config, "k").unwrap();
        assert_eq!(m.model_id(), "gemini-1.5-flash");
        assert_eq!(
            m.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
