// src/provider/gemini.rs — Google Generative AI (Gemini) streaming provider

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};

use super::{ChatChunk, ChatRequest, ChatStream, ModelProvider, Role, TokenUsage};
use crate::infra::errors::MentorError;
use crate::util::truncate_str;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    api_key: Option<String>,
    /// Variable the key was expected in, for the missing-credential message.
    key_var: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, key_var: impl Into<String>) -> Self {
        Self {
            api_key,
            key_var: key_var.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the Gemini request body from a ChatRequest.
    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": m.content }],
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
        });

        if let Some(ref system) = request.system {
            body["system_instruction"] = serde_json::json!({
                "parts": [{ "text": system }],
            });
        }

        let mut gen_config = serde_json::json!({});
        if let Some(max_tokens) = request.max_tokens {
            gen_config["maxOutputTokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            gen_config["temperature"] = serde_json::json!(temp);
        }
        if gen_config != serde_json::json!({}) {
            body["generationConfig"] = gen_config;
        }

        body
    }
}

/// Turn one SSE `data:` payload into a chunk.
///
/// Returns `None` for keep-alives, `[DONE]`, payloads without text or usage,
/// and payloads that are not valid JSON (logged and skipped).
fn parse_sse_data(data: &str) -> Option<ChatChunk> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let parsed: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Skipping unparseable Gemini SSE payload: {}", e);
            return None;
        }
    };

    let delta: String = parsed["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default();

    let usage = if parsed["usageMetadata"].is_object() {
        let input = parsed["usageMetadata"]["promptTokenCount"]
            .as_u64()
            .unwrap_or(0) as u32;
        let output = parsed["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .unwrap_or(0) as u32;
        (input > 0 || output > 0).then_some(TokenUsage {
            input_tokens: input,
            output_tokens: output,
        })
    } else {
        None
    };

    if delta.is_empty() && usage.is_none() {
        return None;
    }
    Some(ChatChunk { delta, usage })
}

/// Map a non-2xx response to an error, keeping 429 and 5xx retriable.
fn status_error(status: StatusCode, retry_after_ms: u64, body: &str) -> MentorError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return MentorError::RateLimited {
            provider: "gemini".into(),
            retry_after_ms,
        };
    }

    let message = match status {
        StatusCode::BAD_REQUEST => "Invalid request. Please check your API key.".to_string(),
        StatusCode::FORBIDDEN => "API key does not have access. Please enable the Generative Language API in Google Cloud Console.".to_string(),
        _ => format!("API error ({}): {}", status.as_u16(), truncate_str(body, 200)),
    };

    MentorError::Provider {
        provider: "gemini".into(),
        message,
        retriable: status.is_server_error(),
    }
}

/// Convert a failure that happened before the first event into an error.
async fn open_error(err: reqwest_eventsource::Error) -> MentorError {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(0);
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "Gemini rejected request: {}", body);
            status_error(status, retry_after_ms, &body)
        }
        reqwest_eventsource::Error::Transport(e) => MentorError::Provider {
            provider: "gemini".into(),
            message: e.to_string(),
            retriable: e.is_timeout() || e.is_connect(),
        },
        other => MentorError::Provider {
            provider: "gemini".into(),
            message: format!("SSE stream error: {}", other),
            retriable: false,
        },
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn name(&self) -> &str {
        "Google Gemini"
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, MentorError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| MentorError::MissingCredential {
                var: self.key_var.clone(),
            })?;

        let body = self.build_request_body(&request);

        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, request.model, api_key,
        );

        let mut es: EventSource = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .eventsource()
            .map_err(|e| MentorError::Provider {
                provider: "gemini".into(),
                message: format!("Failed to open event stream: {}", e),
                retriable: false,
            })?;
        // Reconnects would replay the whole reply; retries live in RetryProvider.
        es.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        // Wait for the response head so HTTP failures surface here, where they can be retried.
        let first = match es.next().await {
            Some(Ok(Event::Open)) => None,
            Some(Ok(Event::Message(msg))) => Some(msg.data),
            Some(Err(e)) => {
                es.close();
                return Err(open_error(e).await);
            }
            None => {
                return Err(MentorError::Provider {
                    provider: "gemini".into(),
                    message: "Stream closed before opening".into(),
                    retriable: true,
                })
            }
        };

        let stream = async_stream::stream! {
            if let Some(chunk) = first.as_deref().and_then(parse_sse_data) {
                yield Ok(chunk);
            }

            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => {
                        if msg.data.trim() == "[DONE]" {
                            break;
                        }
                        if let Some(chunk) = parse_sse_data(&msg.data) {
                            yield Ok(chunk);
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        yield Err(MentorError::Provider {
                            provider: "gemini".into(),
                            message: format!("SSE stream error: {}", e),
                            retriable: false,
                        });
                        break;
                    }
                }
            }
            es.close();
        };

        Ok(Box::pin(stream))
    }
}
