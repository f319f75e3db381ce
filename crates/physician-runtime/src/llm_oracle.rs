//! [`LlmOracle`] – direct vision-model backend.
//!
//! Talks to any server exposing an OpenAI-compatible `/v1/chat/completions`
//! endpoint with image input, such as [Ollama](https://ollama.com) running a
//! vision model (`http://localhost:11434`, model `llava`).
//!
//! The frame travels inline as a base64 `data:` URL next to the request's
//! prompt text, and the verdict JSON Schema is attached as `response_format`
//! so that the model is constrained to emit a verdict document.
//!
//! # Example
//!
//! ```rust,no_run
//! use physician_runtime::llm_oracle::LlmOracle;
//!
//! let oracle = LlmOracle::new("http://localhost:11434", "llava");
//! // Requires a running model server – skipped in unit tests.
//! ```

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use physician_types::{OracleError, Verdict};
use schemars::schema_for;
use serde::{Deserialize, Serialize};

use crate::oracle::Oracle;
use crate::request::VerificationRequest;

// ─────────────────────────────────────────────────────────────────────────────
// Engine instruction
// ─────────────────────────────────────────────────────────────────────────────

/// System message sent ahead of every request.
pub const ENGINE_INSTRUCTION: &str = "\
You are the PHYSICIAN Infrastructure Engine, a cross-platform verification layer for Physical AI systems.
Your role: receive raw sensor data (image) and a proposed intent (text) from a physical agent.
Your task: perform a Chain-of-Causation analysis to verify whether the agent's intent aligns with physical reality.

Analysis guidelines:
1. GOVERNOR MINDSET: you are an enabler, not a blocker. If an action is standard (e.g. picking up objects, moving slowly) and physically feasible, PASS it.
2. THRESHOLD OF SAFETY: only issue a FAIL on a clear violation of physics (impossible weight, collision path) or high danger.
3. LOGIC GATE STATES:
   - PASS: safe to proceed. Set the gate to OPEN.
   - WARNING: risky but possible. Set the gate to OPEN (with adjustments).
   - FAIL: physically impossible or dangerous. Set the gate to CLOSED.
4. FORENSIC MODE: provide a forensic_report ONLY when status is FAIL.

Output strictly in JSON matching the schema provided.";

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
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

// ─────────────────────────────────────────────────────────────────────────────
// LlmOracle
// ─────────────────────────────────────────────────────────────────────────────

/// Vision chat-completions client.
pub struct LlmOracle {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LlmOracle {
    /// Create a backend pointing at `base_url` and using `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    /// Send `key` as a bearer token.  Empty keys are ignored.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn body<'a>(&'a self, request: &VerificationRequest) -> ChatRequest<'a> {
        let frame = &request.frame;
        let data_url = format!("data:{};base64,{}", frame.mime_type, STANDARD.encode(&frame.data));
        let schema = serde_json::to_value(schema_for!(Verdict)).unwrap_or(serde_json::Value::Null);

        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(ENGINE_INSTRUCTION.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: data_url },
                        },
                        ContentPart::Text {
                            text: request.prompt(),
                        },
                    ]),
                },
            ],
            stream: false,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: serde_json::json!({ "name": "verdict", "schema": schema }),
            },
        }
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    fn name(&self) -> &str {
        "llm"
    }

    async fn consult(&self, request: &VerificationRequest) -> Result<String, OracleError> {
        let mut post = self.client.post(self.completions_url()).json(&self.body(request));
        if let Some(key) = &self.api_key {
            post = post.bearer_auth(key);
        }

        let response = post
            .send()
            .await
            .map_err(|e| OracleError::Unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Protocol(format!("chat envelope: {e}")))?;

        envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| strip_code_fence(&content).to_string())
            .ok_or_else(|| OracleError::Protocol("empty choices array".into()))
    }
}

/// Models occasionally wrap JSON in a Markdown fence despite `response_format`.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
