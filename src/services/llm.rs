//! Chat-completion client for ingredient extraction.
//!
//! Speaks the Ollama chat API with streaming enabled and accumulates the
//! chunk stream into one response string. Callers see a single
//! `complete(prompt) -> text` capability.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chat completion errors.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("chat API returned status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed chunk in completion stream: {0}")]
    Chunk(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            CompletionError::Status(status.as_u16())
        } else {
            CompletionError::Network(err.to_string())
        }
    }
}

/// Capability: run one chat completion and return the accumulated text.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// One NDJSON chunk of a streamed chat response.
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Ollama chat client.
pub struct OllamaChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaChatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatCompleter for OllamaChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CompletionError::Status(resp.status().as_u16()));
        }

        // Chunks arrive as newline-delimited JSON; content fields concatenate
        // into the full response. A chunk with done=true ends the stream.
        let mut accumulated = String::new();
        let mut pending = String::new();
        let mut stream = resp.bytes_stream();
        let mut done = false;

        'stream: while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| CompletionError::Network(e.to_string()))?;
            pending.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..=newline).collect();
                if append_chunk(line.trim(), &mut accumulated)? {
                    done = true;
                    break 'stream;
                }
            }
        }
        // Final chunk may arrive without a trailing newline.
        if !done {
            append_chunk(pending.trim(), &mut accumulated)?;
        }

        tracing::debug!(chars = accumulated.len(), model = %self.model, "chat completion finished");
        Ok(accumulated)
    }
}

/// Parse one stream line into the accumulator. Returns true when the chunk
/// signals end of stream.
fn append_chunk(line: &str, accumulated: &mut String) -> Result<bool, CompletionError> {
    if line.is_empty() {
        return Ok(false);
    }
    let chunk: ChatChunk =
        serde_json::from_str(line).map_err(|e| CompletionError::Chunk(e.to_string()))?;
    if let Some(message) = chunk.message {
        accumulated.push_str(&message.content);
    }
    Ok(chunk.done)
}
