//! Client-side chat session (`folio ask`).
//!
//! [`ChatSession`] owns the visible conversation and talks to the chat
//! endpoint. There is no global state: the conversation lives behind a
//! mutex inside the session, so a UI holding the session by reference (or
//! through an `Arc`) can read [`ChatSession::messages`] and
//! [`ChatSession::is_loading`] while a send is in flight. While a reply
//! streams in, the assistant placeholder grows one delta at a time:
//!
//! | Placeholder state | Meaning |
//! |-------------------|---------|
//! | empty, `is_error == false`, loading | waiting for the first delta |
//! | non-empty, `is_error == false` | streamed answer |
//! | `is_error == true` | failure text; [`ChatSession::retry`] is available |

use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use folio_chat_core::models::{ConversationTurn, Role};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use uuid::Uuid;

use crate::config::{ClientConfig, Config};

/// Shown when a request fails without a usable error message.
pub const GENERIC_FAILURE: &str = "Sorry, I couldn't process your request. Please try again.";
/// Shown when a request exceeds the client timeout.
pub const TIMEOUT_FAILURE: &str = "The request timed out. Please try again.";

/// One entry of the visible conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            is_error: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    message: &'a str,
    history: Vec<ConversationTurn>,
}

#[derive(Deserialize)]
struct ErrorReply {
    #[serde(default)]
    message: Option<String>,
}

/// Incremental UTF-8 decoder: multi-byte characters split across reads are
/// held back until complete.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left; an incomplete tail becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

enum Failure {
    Timeout,
    Message(String),
    Generic,
}

impl Failure {
    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Failure::Timeout
        } else {
            Failure::Generic
        }
    }

    fn text(self) -> String {
        match self {
            Failure::Timeout => TIMEOUT_FAILURE.to_string(),
            Failure::Message(m) => m,
            Failure::Generic => GENERIC_FAILURE.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    messages: Vec<SessionMessage>,
    loading: bool,
}

impl SessionState {
    fn can_retry(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant && m.is_error)
    }

    /// Apply `f` to the message with `id`, if it is still in the list.
    fn update(&mut self, id: Uuid, f: impl FnOnce(&mut SessionMessage)) {
        if let Some(message) = self.messages.iter_mut().rev().find(|m| m.id == id) {
            f(message);
        }
    }

    fn find(&self, id: Uuid) -> Option<SessionMessage> {
        self.messages.iter().rev().find(|m| m.id == id).cloned()
    }
}

struct LoadingGuard<'a>(&'a Mutex<SessionState>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).loading = false;
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ChatSession {
    http: reqwest::Client,
    endpoint: String,
    state: Mutex<SessionState>,
}

impl ChatSession {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            state: Mutex::new(SessionState::default()),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    /// Snapshot of the conversation, including a placeholder that is still
    /// streaming.
    pub fn messages(&self) -> Vec<SessionMessage> {
        self.state().messages.clone()
    }

    /// True from the moment a send starts until its reply has finished or
    /// failed.
    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn clear(&self) {
        self.state().messages.clear();
    }

    /// Whether the last assistant turn failed and can be retried.
    pub fn can_retry(&self) -> bool {
        self.state().can_retry()
    }

    /// Send `content` and stream the reply into a new assistant turn,
    /// calling `on_delta` with each piece of text as it arrives.
    ///
    /// Blank input is ignored, as is a send while another is in flight.
    /// Returns the finished assistant turn.
    pub async fn send<F>(&self, content: &str, on_delta: F) -> Option<SessionMessage>
    where
        F: FnMut(&str),
    {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let (history, placeholder_id) = {
            let mut state = self.state();
            if state.loading {
                return None;
            }
            let history: Vec<ConversationTurn> = state
                .messages
                .iter()
                .filter(|m| !m.is_error && !m.content.trim().is_empty())
                .map(|m| ConversationTurn {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect();

            let placeholder = SessionMessage::new(Role::Assistant, "");
            let placeholder_id = placeholder.id;
            state.messages.push(SessionMessage::new(Role::User, content));
            state.messages.push(placeholder);
            state.loading = true;
            (history, placeholder_id)
        };
        let guard = LoadingGuard(&self.state);

        let body = ChatBody {
            message: content,
            history,
        };
        if let Err(failure) = self.stream_reply(&body, placeholder_id, on_delta).await {
            let text = failure.text();
            self.state().update(placeholder_id, |m| {
                m.content = text;
                m.is_error = true;
            });
        }
        drop(guard);

        self.state().find(placeholder_id)
    }

    /// Resend the user message behind a failed assistant turn.
    ///
    /// Leaves the conversation untouched when there is nothing to retry.
    pub async fn retry<F>(&self, on_delta: F) -> Option<SessionMessage>
    where
        F: FnMut(&str),
    {
        let content = {
            let mut state = self.state();
            if state.loading || !state.can_retry() {
                return None;
            }
            let len = state.messages.len();
            let user = len.checked_sub(2).map(|i| &state.messages[i])?;
            if user.role != Role::User {
                return None;
            }
            let content = user.content.clone();
            state.messages.truncate(len - 2);
            content
        };
        self.send(&content, on_delta).await
    }

    async fn stream_reply<F>(
        &self,
        body: &ChatBody<'_>,
        placeholder_id: Uuid,
        mut on_delta: F,
    ) -> std::result::Result<(), Failure>
    where
        F: FnMut(&str),
    {
        let response = self
            .http
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| Failure::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let is_json = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("application/json"));
            debug!(%status, "chat endpoint returned an error");
            if is_json {
                if let Ok(reply) = response.json::<ErrorReply>().await {
                    if let Some(message) = reply.message.filter(|m| !m.trim().is_empty()) {
                        return Err(Failure::Message(message));
                    }
                }
            }
            return Err(Failure::Generic);
        }

        let mut decoder = Utf8Decoder::default();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| Failure::from_reqwest(&e))?;
            let text = decoder.push(&bytes);
            if !text.is_empty() {
                self.state()
                    .update(placeholder_id, |m| m.content.push_str(&text));
                on_delta(&text);
            }
        }
        let rest = decoder.finish();
        if !rest.is_empty() {
            self.state()
                .update(placeholder_id, |m| m.content.push_str(&rest));
            on_delta(&rest);
        }
        Ok(())
    }
}

fn print_delta(delta: &str) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(delta.as_bytes());
    let _ = out.flush();
}

fn finish_turn(turn: Option<&SessionMessage>) {
    if let Some(turn) = turn {
        if turn.is_error {
            println!("{}", turn.content);
            println!("(type /retry to try again)");
        } else {
            println!();
        }
    }
}

/// Entry point for `folio ask`.
///
/// With a message, asks once and exits. Without one, reads questions from
/// stdin until EOF or `/quit`.
pub async fn run_ask(config: &Config, message: Option<String>) -> Result<()> {
    let session = ChatSession::from_config(&config.client)?;

    if let Some(message) = message {
        let turn = session.send(&message, print_delta).await;
        finish_turn(turn.as_ref());
        return Ok(());
    }

    println!("Ask a question. Commands: /retry, /clear, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_delta("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
            }
            "/retry" => {
                if session.can_retry() {
                    let turn = session.retry(print_delta).await;
                    finish_turn(turn.as_ref());
                } else {
                    println!("Nothing to retry.");
                }
            }
            question => {
                let turn = session.send(question, print_delta).await;
                finish_turn(turn.as_ref());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_holds_split_multibyte_char() {
        let bytes = "café ☕".as_bytes();
        let cut = bytes.len() - 2;
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push(&bytes[..cut]), "café ");
        assert_eq!(decoder.push(&bytes[cut..]), "☕");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push(&[b'a', 0xff, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn test_decoder_flushes_truncated_tail() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push(&[0xe2, 0x98]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn test_blank_input_ignored() {
        let session = ChatSession::new("http://127.0.0.1:9/api/chat", Duration::from_secs(1)).unwrap();
        assert!(session.send("   ", |_| {}).await.is_none());
        assert!(session.messages().is_empty());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_connection_failure_becomes_error_turn() {
        let session = ChatSession::new("http://127.0.0.1:9/api/chat", Duration::from_secs(2)).unwrap();
        let turn = session.send("hello", |_| {}).await.unwrap();
        assert!(turn.is_error);
        assert_eq!(turn.content, GENERIC_FAILURE);
        assert_eq!(session.messages().len(), 2);
        assert!(session.can_retry());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_retry_without_user_turn_leaves_messages() {
        let session = ChatSession::new("http://127.0.0.1:9/api/chat", Duration::from_secs(1)).unwrap();
        let mut orphan = SessionMessage::new(Role::Assistant, GENERIC_FAILURE);
        orphan.is_error = true;
        session.state().messages.push(orphan.clone());

        assert!(session.can_retry());
        assert!(session.retry(|_| {}).await.is_none());
        assert_eq!(session.messages(), vec![orphan]);
    }
}
