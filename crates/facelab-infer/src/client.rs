//! HTTP client for an OpenAI-compatible multimodal chat-completions API.

use crate::config::InferenceConfig;
use crate::parse::parse_comparison;
use crate::prompts::{COMPARE_FAILED, COMPARE_PROMPT, DESCRIBE_EMPTY, DESCRIBE_FAILED, DESCRIBE_PROMPT};
use facelab_core::capture::split_data_uri;
use facelab_core::{ComparisonResult, InferenceBackend};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Mime assumed for images passed as bare base64.
const BARE_BASE64_MIME: &str = "image/jpeg";
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("endpoint returned an empty reply")]
    EmptyReply,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    ImageUrl { image_url: ImageUrl },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the describe and compare operations.
///
/// The [`InferenceBackend`] impl never fails: errors are logged and replaced
/// by fixed fallback values. Use [`try_describe`](Self::try_describe) and
/// [`try_compare`](Self::try_compare) to observe the underlying error.
pub struct InferenceClient {
    config: InferenceConfig,
    http: reqwest::Client,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let http = builder.build().map_err(InferenceError::Client)?;

        if config.api_key.is_none() {
            tracing::warn!("no API key configured; requests are sent without credentials");
        }
        tracing::info!(endpoint = %config.endpoint(), model = %config.model, "inference client ready");

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Describe one face image. Returns the reply text verbatim.
    pub async fn try_describe(&self, image: &str) -> Result<String, InferenceError> {
        self.chat(&[image], DESCRIBE_PROMPT).await
    }

    /// Compare two face images. Reply parsing never fails; only transport
    /// and envelope errors are returned.
    pub async fn try_compare(
        &self,
        reference: &str,
        candidate: &str,
    ) -> Result<ComparisonResult, InferenceError> {
        let reply = self.chat(&[reference, candidate], COMPARE_PROMPT).await?;
        Ok(parse_comparison(&reply))
    }

    /// Send one user message with `images` followed by `prompt` and return
    /// the text of the first choice.
    async fn chat(&self, images: &[&str], prompt: &str) -> Result<String, InferenceError> {
        let mut content: Vec<ContentPart<'_>> = images
            .iter()
            .map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl { url: as_data_uri(image) },
            })
            .collect();
        content.push(ContentPart::Text { text: prompt });

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage { role: "user", content }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let started = Instant::now();
        let mut request = self.http.post(self.config.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(InferenceError::Network)?;
        let status = response.status();
        tracing::debug!(
            status = status.as_u16(),
            images = images.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inference response received"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let raw = response.text().await.map_err(InferenceError::Network)?;
        let parsed: ChatResponse =
            serde_json::from_str(&raw).map_err(|e| InferenceError::Decode(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::Decode("response has no choices".into()))?;

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(InferenceError::EmptyReply),
        }
    }
}

impl InferenceBackend for InferenceClient {
    async fn describe(&self, image: &str) -> String {
        match self.try_describe(image).await {
            Ok(text) => text,
            Err(InferenceError::EmptyReply) => {
                tracing::warn!("describe: empty reply");
                DESCRIBE_EMPTY.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "describe failed");
                DESCRIBE_FAILED.to_string()
            }
        }
    }

    async fn compare(&self, reference: &str, candidate: &str) -> ComparisonResult {
        match self.try_compare(reference, candidate).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "compare failed");
                compare_failure()
            }
        }
    }
}

/// The fixed value compare yields when no usable reply was received.
pub fn compare_failure() -> ComparisonResult {
    ComparisonResult {
        matched: false,
        similarity: 0.0,
        explanation: COMPARE_FAILED.to_string(),
    }
}

/// Bare base64 payloads are wrapped as JPEG data-URIs.
fn as_data_uri(image: &str) -> String {
    match split_data_uri(image) {
        (Some(_), _) => image.to_string(),
        (None, payload) => format!("data:{BARE_BASE64_MIME};base64,{payload}"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: "data:image/png;base64,AA".into() },
                    },
                    ContentPart::Text { text: "hi" },
                ],
            }],
            temperature: 0.5,
            max_tokens: 10,
            stream: false,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["stream"], false);
        assert_eq!(v["messages"][0]["content"][0]["type"], "image_url");
        assert_eq!(v["messages"][0]["content"][0]["image_url"]["url"], "data:image/png;base64,AA");
        assert_eq!(v["messages"][0]["content"][1]["type"], "text");
        assert_eq!(v["messages"][0]["content"][1]["text"], "hi");
    }

    #[test]
    fn test_as_data_uri() {
        assert_eq!(as_data_uri("data:image/png;base64,AA"), "data:image/png;base64,AA");
        assert_eq!(as_data_uri("AA"), "data:image/jpeg;base64,AA");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("比对失败了", 2), "比对…");
    }
}
