//! Minimal Ollama chat API client.
//!
//! This crate provides a focused client for Ollama's `/api/chat` endpoint with:
//! - Non-streaming and streaming completions
//! - Incremental parsing of the newline-delimited JSON stream
//! - Timeouts that distinguish an unreachable server from a stalled one

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

/// Default endpoint for a locally running Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that can occur when using the Ollama client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not reach Ollama: {0}")]
    Connection(String),

    #[error("timed out waiting for Ollama to respond")]
    Timeout,

    #[error("Ollama API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl Error {
    /// Whether the caller may reasonably retry the same request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Timeout)
    }
}

/// Ollama API client.
#[derive(Clone)]
pub struct Ollama {
    client: reqwest::Client,
    base_url: String,
}

impl Ollama {
    /// Create a new client for the given base URL (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .read_timeout(READ_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a client for the default local endpoint.
    pub fn localhost() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }

    /// The base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a chat request and return the full response.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
        let response = self.post_chat(&request, false).await?;

        let chunk: ApiChatChunk = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        if let Some(message) = chunk.error {
            return Err(Error::Api {
                status: 200,
                message,
            });
        }

        let message = chunk
            .message
            .ok_or_else(|| Error::Parse("response carried no message".to_string()))?;

        Ok(ChatResponse {
            model: chunk.model,
            message,
            stats: ChatStats {
                total_duration: chunk.total_duration,
                prompt_eval_count: chunk.prompt_eval_count,
                eval_count: chunk.eval_count,
            },
        })
    }

    /// Send a chat request and stream the reply incrementally.
    ///
    /// The stream yields `Delta` events as content arrives and terminates
    /// with a single `Done` event. Dropping the stream cancels the request.
    pub async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, Error> {
        let response = self.post_chat(&request, true).await?;

        // Use scan to keep a buffer for incomplete JSON lines across chunks
        let stream = response
            .bytes_stream()
            .scan(String::new(), |buffer, result| {
                let events = match result {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        parse_chat_lines_buffered(buffer)
                    }
                    Err(e) => vec![Err(classify_transport_error(e))],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }

    async fn post_chat(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, Error> {
        let api_request = build_api_request(request, stream);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&api_request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: extract_api_error(&body),
            });
        }

        Ok(response)
    }
}

fn classify_transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Connection(e.to_string())
    }
}

/// Pull the `error` field out of an error body, falling back to the raw text.
fn extract_api_error(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) => body.to_string(),
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A chat request to send to Ollama.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub num_ctx: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Create a new request for the given model and message history.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            num_ctx: None,
            temperature: None,
        }
    }

    /// Set the context window size (`options.num_ctx`).
    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A complete chat response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub model: String,
    pub message: Message,
    pub stats: ChatStats,
}

impl ChatResponse {
    /// The reply text.
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

/// Generation statistics reported on the final chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatStats {
    /// Wall-clock time for the whole request, in nanoseconds.
    pub total_duration: Option<u64>,
    /// Tokens evaluated from the prompt.
    pub prompt_eval_count: Option<u64>,
    /// Tokens generated in the reply.
    pub eval_count: Option<u64>,
}

/// Events from a streaming chat response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A fragment of reply content.
    Delta { content: String },
    /// End of the reply.
    Done { stats: ChatStats },
}

/// A pinned stream of chat events.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ApiOptions>,
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

fn build_api_request(request: &ChatRequest, stream: bool) -> ApiRequest<'_> {
    let options = if request.num_ctx.is_some() || request.temperature.is_some() {
        Some(ApiOptions {
            num_ctx: request.num_ctx,
            temperature: request.temperature,
        })
    } else {
        None
    };

    ApiRequest {
        model: &request.model,
        messages: &request.messages,
        stream,
        options,
    }
}

/// One line of the chat wire format. The same shape serves the complete
/// response, the streamed deltas, and the final `done` chunk.
#[derive(Debug, Deserialize)]
struct ApiChatChunk {
    #[serde(default)]
    model: String,
    message: Option<Message>,
    #[serde(default)]
    done: bool,
    total_duration: Option<u64>,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
    error: Option<String>,
}

/// Parse complete JSON lines from a buffer, leaving any incomplete trailing
/// line for the next chunk.
///
/// Ollama streams one JSON object per line. A line is only parsed once its
/// terminating newline has arrived, so partial objects never reach serde.
fn parse_chat_lines_buffered(buffer: &mut String) -> Vec<Result<StreamEvent, Error>> {
    let mut events = Vec::new();

    loop {
        let Some(newline_pos) = buffer.find('\n') else {
            // No complete line yet, wait for more data
            break;
        };

        let line = buffer[..newline_pos].trim();
        if !line.is_empty() {
            match serde_json::from_str::<ApiChatChunk>(line) {
                Ok(chunk) => {
                    if let Some(event) = convert_chunk(chunk) {
                        events.push(event);
                    }
                }
                Err(e) => events.push(Err(Error::Parse(format!("stream parse error: {e}")))),
            }
        }

        // Consume the processed line (including the newline)
        buffer.drain(..=newline_pos);
    }

    events
}

fn convert_chunk(chunk: ApiChatChunk) -> Option<Result<StreamEvent, Error>> {
    if let Some(message) = chunk.error {
        // Error payloads can arrive mid-stream on an already-accepted request
        return Some(Err(Error::Api {
            status: 200,
            message,
        }));
    }

    if chunk.done {
        return Some(Ok(StreamEvent::Done {
            stats: ChatStats {
                total_duration: chunk.total_duration,
                prompt_eval_count: chunk.prompt_eval_count,
                eval_count: chunk.eval_count,
            },
        }));
    }

    match chunk.message {
        Some(m) if !m.content.is_empty() => Some(Ok(StreamEvent::Delta { content: m.content })),
        _ => None,
    }
}
