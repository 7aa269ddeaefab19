//! Outbound calls to the image/chat generation API.

use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::ai::error::AiError;

pub const IMAGE_TIMEOUT: Duration = Duration::from_secs(120);
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

static IMAGE_URL: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s()<>\[\]"']+"#));

/// One image-generation call.
#[derive(Debug, Clone, Copy)]
pub struct ImageRequest<'a> {
    pub endpoint: &'a str,
    pub api_key: Option<&'a str>,
    pub model: &'a str,
    pub prompt: &'a str,
    pub aspect_ratio: Option<&'a str>,
}

/// One chat-completion call with a single user message.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub endpoint: &'a str,
    pub api_key: Option<&'a str>,
    pub model: &'a str,
    pub prompt: &'a str,
}

/// Thin single-attempt client; failures surface immediately.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: Client,
    image_timeout: Duration,
    chat_timeout: Duration,
}

impl GenerationClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            image_timeout: IMAGE_TIMEOUT,
            chat_timeout: CHAT_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, image: Duration, chat: Duration) -> Self {
        self.image_timeout = image;
        self.chat_timeout = chat;
        self
    }

    /// Generate one image through a dedicated endpoint and return its URL.
    ///
    /// A `b64_json`-only answer comes back as a `data:image/png;base64,` URL.
    pub async fn generate_image(&self, req: ImageRequest<'_>) -> Result<String, AiError> {
        let api_key = require_key(req.api_key)?;
        let size = size_for_aspect_ratio(req.aspect_ratio);
        let mut body = json!({
            "model": req.model,
            "prompt": req.prompt,
            "n": 1,
            "size": size,
        });
        if let Some(ratio) = req.aspect_ratio {
            body["aspect_ratio"] = Value::String(ratio.to_owned());
        }

        info!(model = req.model, size, "requesting image generation");
        let value = self
            .post_json(req.endpoint, api_key, &body, self.image_timeout)
            .await?;
        image_from_response(&value)
    }

    /// Run a chat completion and return the assistant's text.
    pub async fn generate_chat(&self, req: ChatRequest<'_>) -> Result<String, AiError> {
        let api_key = require_key(req.api_key)?;
        let body = json!({
            "model": req.model,
            "messages": [{ "role": "user", "content": req.prompt }],
        });

        info!(model = req.model, "requesting chat completion");
        let value = self
            .post_json(req.endpoint, api_key, &body, self.chat_timeout)
            .await?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| {
                AiError::GenerationFailed("chat response has no choices[0].message.content".into())
            })
    }

    /// Image through a chat endpoint: the first link in the reply is the result.
    pub async fn generate_image_via_chat(&self, req: ChatRequest<'_>) -> Result<String, AiError> {
        let content = self.generate_chat(req).await?;
        extract_first_url(&content).ok_or_else(|| {
            AiError::GenerationFailed("chat response did not contain an image URL".into())
        })
    }

    async fn post_json(
        &self,
        endpoint: &str,
        api_key: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, AiError> {
        let resp = self
            .http
            .post(endpoint)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        debug!(status = status.as_u16(), bytes = text.len(), "upstream responded");

        if !status.is_success() {
            return Err(AiError::GenerationFailed(upstream_error_message(status, &text)));
        }
        serde_json::from_str(&text)
            .map_err(|e| AiError::GenerationFailed(format!("malformed upstream response: {e}")))
    }
}

fn require_key(api_key: Option<&str>) -> Result<&str, AiError> {
    api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(AiError::MissingCredentials)
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> AiError {
    if e.is_timeout() {
        AiError::GenerationTimeout(timeout)
    } else {
        AiError::GenerationFailed(e.to_string())
    }
}

fn image_from_response(value: &Value) -> Result<String, AiError> {
    let first = &value["data"][0];
    if let Some(url) = first["url"].as_str().filter(|u| !u.is_empty()) {
        return Ok(url.to_owned());
    }
    if let Some(b64) = first["b64_json"].as_str().filter(|b| !b.is_empty()) {
        // Validate before handing the payload on.
        base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| AiError::GenerationFailed(format!("invalid b64_json payload: {e}")))?;
        return Ok(format!("data:image/png;base64,{b64}"));
    }
    Err(AiError::GenerationFailed(
        "image response has no data[0].url or data[0].b64_json".into(),
    ))
}

/// Map an aspect ratio to a supported output size.
pub fn size_for_aspect_ratio(aspect_ratio: Option<&str>) -> &'static str {
    match aspect_ratio.map(str::trim) {
        Some("16:9" | "3:2" | "4:3" | "21:9") => "1792x1024",
        Some("9:16" | "2:3" | "3:4") => "1024x1792",
        _ => "1024x1024",
    }
}

/// First http(s) link in `text`, bare or inside markdown image syntax.
pub fn extract_first_url(text: &str) -> Option<String> {
    let Ok(re) = &*IMAGE_URL else {
        return None;
    };
    re.find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']).to_owned())
}

/// Human-readable error text from an upstream error body.
///
/// Tries `error.message`, then `message`, then a string `error`, and finally
/// falls back to the status line plus the raw body.
pub fn upstream_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let structured = value["error"]["message"]
            .as_str()
            .or_else(|| value["message"].as_str())
            .or_else(|| value["error"].as_str())
            .filter(|m| !m.trim().is_empty());
        if let Some(message) = structured {
            return message.to_owned();
        }
    }
    format!("HTTP {}: {}", status.as_u16(), body.trim())
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::http::HeaderMap;
    use axum::routing::post;

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn image_req<'a>(endpoint: &'a str, api_key: Option<&'a str>) -> ImageRequest<'a> {
        ImageRequest {
            endpoint,
            api_key,
            model: "dall-e-3",
            prompt: "neon city",
            aspect_ratio: Some("16:9"),
        }
    }

    #[test]
    fn sizes_follow_orientation() {
        assert_eq!(size_for_aspect_ratio(Some("21:9")), "1792x1024");
        assert_eq!(size_for_aspect_ratio(Some("2:3")), "1024x1792");
        assert_eq!(size_for_aspect_ratio(Some("1:1")), "1024x1024");
        assert_eq!(size_for_aspect_ratio(None), "1024x1024");
    }

    #[test]
    fn finds_markdown_and_bare_links() {
        assert_eq!(
            extract_first_url("Here: ![img](https://cdn.example/a.png) and https://x.y/b.png").as_deref(),
            Some("https://cdn.example/a.png")
        );
        assert_eq!(
            extract_first_url("see http://h/p.jpg.").as_deref(),
            Some("http://h/p.jpg")
        );
        assert!(extract_first_url("no link here").is_none());
    }

    #[test]
    fn error_message_prefers_structured_fields() {
        let s = StatusCode::BAD_REQUEST;
        assert_eq!(upstream_error_message(s, r#"{"error":{"message":"bad prompt"}}"#), "bad prompt");
        assert_eq!(upstream_error_message(s, r#"{"message":"quota"}"#), "quota");
        assert_eq!(upstream_error_message(s, r#"{"error":"nope"}"#), "nope");
        assert_eq!(upstream_error_message(s, "oops"), "HTTP 400: oops");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let client = GenerationClient::new(Client::new());
        let err = client
            .generate_image(image_req("http://127.0.0.1:9/never", Some("  ")))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::MissingCredentials));
    }

    #[tokio::test]
    async fn image_endpoint_receives_size_and_bearer() {
        let router = Router::new().route(
            "/v1/images/generations",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["size"], "1792x1024");
                assert_eq!(body["n"], 1);
                Json(json!({ "data": [{ "url": "https://cdn.example/out.png" }] }))
            }),
        );
        let base = spawn_upstream(router).await;
        let endpoint = format!("{base}/v1/images/generations");

        let client = GenerationClient::new(Client::new());
        let url = client
            .generate_image(image_req(&endpoint, Some("sk-test")))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/out.png");
    }

    #[tokio::test]
    async fn upstream_error_text_is_surfaced() {
        let router = Router::new().route(
            "/img",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": { "message": "rate limited" } })),
                )
            }),
        );
        let base = spawn_upstream(router).await;
        let endpoint = format!("{base}/img");

        let client = GenerationClient::new(Client::new());
        let err = client
            .generate_image(image_req(&endpoint, Some("sk-test")))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::GenerationFailed(ref m) if m == "rate limited"));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let router = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        );
        let base = spawn_upstream(router).await;
        let endpoint = format!("{base}/slow");

        let client = GenerationClient::new(Client::new())
            .with_timeouts(Duration::from_millis(100), Duration::from_millis(100));
        let err = client
            .generate_image(image_req(&endpoint, Some("sk-test")))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::GenerationTimeout(_)));
    }

    #[tokio::test]
    async fn chat_mode_extracts_image_link() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["messages"][0]["role"], "user");
                Json(json!({
                    "choices": [{ "message": {
                        "role": "assistant",
                        "content": "Done! ![result](https://cdn.example/chat.png)"
                    }}]
                }))
            }),
        );
        let base = spawn_upstream(router).await;
        let endpoint = format!("{base}/v1/chat/completions");

        let client = GenerationClient::new(Client::new());
        let url = client
            .generate_image_via_chat(ChatRequest {
                endpoint: &endpoint,
                api_key: Some("sk-test"),
                model: "gpt-4o-mini",
                prompt: "neon city",
            })
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/chat.png");
    }
}
