//! Streaming backend for OpenAI-compatible `chat/completions` endpoints.
//!
//! Replies arrive as server-sent events. Each `data:` line carries a JSON
//! chunk whose `choices[0].delta.content` is the next fragment; `data: [DONE]`
//! ends the reply. The backend keeps the multi-turn history itself so the
//! session only ever hands it the newest user message.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use memchr::memchr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::backend::{BackendError, ChatBackend, FragmentStream};
use crate::core::message::Role;

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Fragment(String),
    Done,
    Error(String),
}

/// Incremental line splitter for an SSE byte stream.
///
/// Chunk boundaries from the transport are arbitrary, so partial lines are
/// buffered until their newline arrives.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns the events completed by them. Decoding
    /// stops at the first terminal event (`Done` or `Error`).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let event = match std::str::from_utf8(&self.buffer[..newline_pos]) {
                Ok(line) => parse_sse_line(line.trim()),
                Err(err) => {
                    debug!("skipping invalid UTF-8 in stream: {err}");
                    None
                }
            };
            self.buffer.drain(..=newline_pos);

            if let Some(event) = event {
                let terminal = !matches!(event, SseEvent::Fragment(_));
                events.push(event);
                if terminal {
                    self.buffer.clear();
                    break;
                }
            }
        }

        events
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let payload = extract_data_payload(line)?;
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }
    if payload.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(SseEvent::Fragment),
        Err(_) => Some(SseEvent::Error(format_api_error(payload))),
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(collapsed)
}

/// Turns a provider error body into a readable, markdown-fenced message.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty response body>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value) {
                Some(summary) if !summary.is_empty() => {
                    format!("API Error: {summary}\n```json\n{pretty_json}\n```")
                }
                _ => format!("API Error:\n```json\n{pretty_json}\n```"),
            };
        }
    }

    format!("API Error:\n```\n{trimmed}\n```")
}

pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

pub struct HttpChatBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
    history: Arc<Mutex<Vec<ChatMessage>>>,
}

impl HttpChatBackend {
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Completed turns, oldest first. The system instruction is not included.
    pub fn history(&self) -> Vec<ChatMessage> {
        lock_history(&self.history).clone()
    }

    fn build_request(&self, text: &str) -> ChatRequest {
        let mut messages = Vec::new();
        if let Some(instruction) = self
            .config
            .system_instruction
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            messages.push(ChatMessage::new("system", instruction));
        }
        messages.extend(lock_history(&self.history).iter().cloned());
        messages.push(ChatMessage::new(Role::User.to_api_role(), text));

        ChatRequest {
            model: self.config.model.clone(),
            messages,
            stream: true,
        }
    }
}

fn lock_history(
    history: &Mutex<Vec<ChatMessage>>,
) -> std::sync::MutexGuard<'_, Vec<ChatMessage>> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn stream_reply(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, BackendError> {
        let request = self.build_request(text);
        let chat_url = construct_api_url(&self.config.base_url, "chat/completions");

        let send = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send();

        let response = tokio::select! {
            response = send => response.map_err(|e| BackendError::Transport(e.to_string()))?,
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(BackendError::Api {
                status: Some(status.as_u16()),
                message: format_api_error(&body),
            });
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        let state = ReplyState {
            bytes,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
            cancel,
            turn: Some(PendingTurn {
                history: Arc::clone(&self.history),
                user_text: text.to_string(),
                reply: String::new(),
            }),
        };

        Ok(stream::unfold(state, next_fragment).boxed())
    }

    fn clear_history(&self) {
        lock_history(&self.history).clear();
    }
}

struct PendingTurn {
    history: Arc<Mutex<Vec<ChatMessage>>>,
    user_text: String,
    reply: String,
}

impl PendingTurn {
    fn commit(self) {
        let mut history = lock_history(&self.history);
        history.push(ChatMessage::new(Role::User.to_api_role(), self.user_text));
        history.push(ChatMessage::new(Role::Model.to_api_role(), self.reply));
    }
}

struct ReplyState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, BackendError>>,
    finished: bool,
    cancel: CancellationToken,
    turn: Option<PendingTurn>,
}

impl ReplyState {
    fn complete(&mut self) {
        self.finished = true;
        if let Some(turn) = self.turn.take() {
            turn.commit();
        }
    }

    fn fail(&mut self, err: BackendError) {
        self.finished = true;
        self.turn = None;
        self.pending.push_back(Err(err));
    }

    fn absorb(&mut self, bytes: &[u8]) {
        for event in self.decoder.push(bytes) {
            match event {
                SseEvent::Fragment(text) => {
                    if let Some(turn) = self.turn.as_mut() {
                        turn.reply.push_str(&text);
                    }
                    self.pending.push_back(Ok(text));
                }
                SseEvent::Done => self.complete(),
                SseEvent::Error(message) => self.fail(BackendError::Api {
                    status: None,
                    message,
                }),
            }
        }
    }
}

async fn next_fragment(
    mut state: ReplyState,
) -> Option<(Result<String, BackendError>, ReplyState)> {
    loop {
        if state.cancel.is_cancelled() {
            return None;
        }
        if let Some(item) = state.pending.pop_front() {
            return Some((item, state));
        }
        if state.finished {
            return None;
        }

        let chunk = tokio::select! {
            _ = state.cancel.cancelled() => return None,
            chunk = state.bytes.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => state.absorb(&bytes),
            Some(Err(err)) => state.fail(BackendError::Transport(err.to_string())),
            // Some providers close the connection without sending [DONE].
            None => state.complete(),
        }
    }
}
