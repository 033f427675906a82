use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use rise_core::config::LlmConfig;
use rise_core::domain::conversation::{ChatMessage, ToolCall};

/// Function schema advertised to the model for one tool.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

impl ModelRequest {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), tool_calls: Vec::new() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall { id: id.into(), name: name.into(), arguments }],
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
    #[error("client misconfigured: {0}")]
    Configuration(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Configuration(_) => false,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: &ModelRequest) -> Result<ModelReply, LlmError>;

    fn model_name(&self) -> &str;
}

/// Exponential backoff for transient model failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Sends `request`, sleeping between retryable failures until the budget runs out.
    pub async fn chat(
        &self,
        llm: &dyn LlmClient,
        request: &ModelRequest,
        correlation_id: &str,
    ) -> Result<ModelReply, RetryExhausted> {
        let mut attempt = 0u32;
        loop {
            match llm.chat(request).await {
                Ok(reply) => return Ok(reply),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        event_name = "agent.model.retry",
                        correlation_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => return Err(RetryExhausted { attempts: attempt + 1, source }),
            }
        }
    }
}

/// The last model error once retries are spent or the error was not retryable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub source: LlmError,
}

/// Client for any `/chat/completions` endpoint that speaks the OpenAI tools dialect
/// (OpenAI, Groq, Ollama).
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Configuration(error.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.endpoint_base()),
            api_key: config.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn request_body(&self, request: &ModelRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(json!({ "role": "system", "content": request.system }));
        messages.extend(request.messages.iter().map(wire_message));

        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect::<Vec<_>>();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::User { content } => json!({ "role": "user", "content": content }),
        ChatMessage::Assistant { content, tool_calls } if tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": content })
        }
        ChatMessage::Assistant { content, tool_calls } => {
            let calls = tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": wire_arguments(&call.arguments),
                        }
                    })
                })
                .collect::<Vec<_>>();
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        ChatMessage::Tool { call_id, content, .. } => {
            json!({ "role": "tool", "tool_call_id": call_id, "content": content })
        }
    }
}

/// Arguments that could not be parsed are kept as the raw string the model sent.
fn wire_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Providers send arguments as a JSON-encoded string; a few inline the object.
/// Unparseable strings are kept verbatim so validation can report them.
fn decode_arguments(raw: Value) -> Value {
    match raw {
        Value::String(text) if text.trim().is_empty() => json!({}),
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        Value::Null => json!({}),
        other => other,
    }
}

fn reply_from_response(response: CompletionResponse) -> Result<ModelReply, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Decode("response contained no choices".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: if call.id.is_empty() {
                format!("call_{}", Uuid::new_v4().simple())
            } else {
                call.id
            },
            name: call.function.name,
            arguments: decode_arguments(call.function.arguments),
        })
        .collect();

    let content = choice.message.content.filter(|text| !text.trim().is_empty());
    Ok(ModelReply { content, tool_calls })
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat(&self, request: &ModelRequest) -> Result<ModelReply, LlmError> {
        let mut builder = self.http.post(&self.endpoint).json(&self.request_body(request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|error| {
            if error.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Transport(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(512).collect();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let parsed = response
            .json::<CompletionResponse>()
            .await
            .map_err(|error| LlmError::Decode(error.to_string()))?;
        reply_from_response(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic client that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<ModelReply, LlmError>>>,
    repeat: Option<ModelReply>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self::with_results(replies.into_iter().map(Ok))
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<ModelReply, LlmError>>) -> Self {
        Self { script: Mutex::new(results.into_iter().collect()), ..Self::default() }
    }

    /// Answers every request with the same reply once the queue is drained.
    pub fn repeating(reply: ModelReply) -> Self {
        Self { repeat: Some(reply), ..Self::default() }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn chat(&self, request: &ModelRequest) -> Result<ModelReply, LlmError> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };

        match (next, &self.repeat) {
            (Some(result), _) => result,
            (None, Some(reply)) => Ok(reply.clone()),
            (None, None) => Err(LlmError::Decode("scripted replies exhausted".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
