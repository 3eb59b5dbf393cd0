//! The transcript state machine.
//!
//! One submission moves through `Idle -> Sending (busy) -> Streaming -> Idle`.
//! `busy` covers only the wait for the first fragment; once text starts
//! arriving it is accumulated into a single trailing model message tracked by
//! an [`InFlight`] handle. Every mutation is checked against the handle so a
//! reset or a newer submission turns late fragments into no-ops.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::backend::{BackendError, ChatBackend, StreamMessage, StreamTicket};
use crate::core::constants::{DEFAULT_APOLOGY, DEFAULT_GREETING};
use crate::core::dictation::{merge_transcript, DictationError, DictationPort};
use crate::core::events::{SessionEvent, Subscribers};
use crate::core::message::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    EmptySubmission,
    BusyRejection,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::EmptySubmission => write!(f, "nothing to send"),
            SubmitError::BusyRejection => write!(f, "still waiting for the previous reply"),
        }
    }
}

impl StdError for SubmitError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionError {
    InvalidIndex { index: usize, len: usize },
}

impl fmt::Display for ReactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactionError::InvalidIndex { index, len } => {
                write!(f, "no message at index {index} (transcript has {len})")
            }
        }
    }
}

impl StdError for ReactionError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub greeting: String,
    pub apology: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }
}

/// Stable handle to the model message currently receiving fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub stream_id: u64,
    pub index: usize,
}

pub struct StreamingTranscriptSession {
    backend: Arc<dyn ChatBackend>,
    dictation: Option<Arc<dyn DictationPort>>,
    settings: SessionSettings,
    messages: Vec<Message>,
    busy: bool,
    // Stream that set `busy`; only its events may clear it.
    busy_owner: Option<u64>,
    draft_input: String,
    recording: bool,
    stream_id: u64,
    in_flight: Option<InFlight>,
    cancel_token: Option<CancellationToken>,
    subscribers: Subscribers,
}

impl StreamingTranscriptSession {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: SessionSettings) -> Self {
        let messages = vec![Message::model(settings.greeting.clone())];
        Self {
            backend,
            dictation: None,
            settings,
            messages,
            busy: false,
            busy_owner: None,
            draft_input: String::new(),
            recording: false,
            stream_id: 0,
            in_flight: None,
            cancel_token: None,
            subscribers: Subscribers::new(),
        }
    }

    pub fn with_dictation(mut self, dictation: Arc<dyn DictationPort>) -> Self {
        self.dictation = Some(dictation);
        self
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        self.in_flight
    }

    pub fn current_stream_id(&self) -> u64 {
        self.stream_id
    }

    /// Token for the most recent submission, if one is still running.
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.cancel_token.clone()
    }

    pub fn draft_input(&self) -> &str {
        &self.draft_input
    }

    pub fn set_draft_input(&mut self, draft: impl Into<String>) {
        self.draft_input = draft.into();
        self.subscribers.notify(SessionEvent::DraftChanged);
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.subscribers.subscribe()
    }

    /// Sends `text` and consumes the whole reply before returning.
    ///
    /// Empty text and submissions while busy are rejected without touching
    /// any state. Backend failures are not returned: they end up in the
    /// transcript as the apology message.
    pub async fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        let ticket = self.begin_submit(text)?;
        self.consume(ticket).await;
        Ok(())
    }

    /// Submits the trimmed draft, clearing it once accepted.
    pub async fn submit_draft(&mut self) -> Result<(), SubmitError> {
        let ticket = self.begin_submit_draft()?;
        self.consume(ticket).await;
        Ok(())
    }

    async fn consume(&mut self, ticket: StreamTicket) {
        let StreamTicket {
            stream_id,
            text,
            cancel_token,
        } = ticket;

        let reply = self.backend.stream_reply(&text, cancel_token).await;
        let mut stream = match reply {
            Ok(stream) => stream,
            Err(err) => {
                self.apply_failed(stream_id, &err);
                return;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => self.apply_fragment(stream_id, &fragment),
                Err(err) => {
                    self.apply_failed(stream_id, &err);
                    return;
                }
            }
        }
        self.apply_completed(stream_id);
    }

    /// Synchronous half of a submission: records the user message, marks the
    /// session busy and issues a ticket for the reply stream.
    ///
    /// Any earlier stream is cancelled and its remaining fragments will be
    /// dropped, since they carry a stale stream id.
    pub fn begin_submit(&mut self, text: &str) -> Result<StreamTicket, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptySubmission);
        }
        if self.busy {
            return Err(SubmitError::BusyRejection);
        }

        self.messages.push(Message::user(text));
        self.subscribers.notify(SessionEvent::MessageAppended {
            index: self.messages.len() - 1,
        });

        let stream_id = self.start_stream();
        self.busy = true;
        self.busy_owner = Some(stream_id);
        self.subscribers.notify(SessionEvent::BusyChanged(true));

        debug!(stream_id, "submitted message");
        Ok(StreamTicket {
            stream_id,
            text: text.to_string(),
            cancel_token: self
                .cancel_token
                .clone()
                .unwrap_or_else(CancellationToken::new),
        })
    }

    pub fn begin_submit_draft(&mut self) -> Result<StreamTicket, SubmitError> {
        let text = self.draft_input.trim().to_string();
        let ticket = self.begin_submit(&text)?;
        self.draft_input.clear();
        self.subscribers.notify(SessionEvent::DraftChanged);
        Ok(ticket)
    }

    fn start_stream(&mut self) -> u64 {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.stream_id = self.stream_id.wrapping_add(1);
        self.in_flight = None;
        self.cancel_token = Some(CancellationToken::new());
        self.stream_id
    }

    /// Routes one message from [`crate::core::backend::spawn_reply_stream`].
    pub fn apply(&mut self, stream_id: u64, message: StreamMessage) {
        match message {
            StreamMessage::Fragment(fragment) => self.apply_fragment(stream_id, &fragment),
            StreamMessage::Failed(err) => self.apply_failed(stream_id, &err),
            StreamMessage::End => self.apply_completed(stream_id),
        }
    }

    pub fn apply_fragment(&mut self, stream_id: u64, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.release_busy(stream_id);

        if stream_id != self.stream_id {
            debug!(
                stream_id,
                current = self.stream_id,
                "dropping fragment from stale stream"
            );
            return;
        }

        let in_flight = self.in_flight;
        match in_flight {
            Some(handle) if handle.stream_id == stream_id => {
                if !self.is_tail_model(handle.index) {
                    debug!(
                        stream_id,
                        index = handle.index,
                        "in-flight message moved; dropping fragment"
                    );
                    return;
                }
                self.messages[handle.index].text.push_str(fragment);
                self.subscribers.notify(SessionEvent::MessageUpdated {
                    index: handle.index,
                });
            }
            _ => {
                self.messages.push(Message::model(fragment));
                let index = self.messages.len() - 1;
                self.in_flight = Some(InFlight { stream_id, index });
                self.subscribers
                    .notify(SessionEvent::MessageAppended { index });
            }
        }
    }

    pub fn apply_completed(&mut self, stream_id: u64) {
        self.release_busy(stream_id);
        if stream_id != self.stream_id {
            return;
        }
        self.in_flight = None;
        self.cancel_token = None;
        debug!(stream_id, "stream completed");
    }

    pub fn apply_failed(&mut self, stream_id: u64, err: &BackendError) {
        if matches!(err, BackendError::Cancelled) {
            self.apply_completed(stream_id);
            return;
        }

        self.release_busy(stream_id);
        if stream_id != self.stream_id {
            debug!(stream_id, error = %err, "ignoring failure from stale stream");
            return;
        }

        warn!(stream_id, error = %err, "reply stream failed");
        self.in_flight = None;
        self.cancel_token = None;
        self.messages.push(Message::model(self.settings.apology.clone()));
        self.subscribers.notify(SessionEvent::MessageAppended {
            index: self.messages.len() - 1,
        });
    }

    fn release_busy(&mut self, stream_id: u64) {
        if self.busy && self.busy_owner == Some(stream_id) {
            self.busy = false;
            self.busy_owner = None;
            self.subscribers.notify(SessionEvent::BusyChanged(false));
        }
    }

    fn is_tail_model(&self, index: usize) -> bool {
        index + 1 == self.messages.len() && self.messages[index].role == Role::Model
    }

    /// Replaces the transcript with the greeting.
    ///
    /// The running stream, if any, is cancelled and invalidated. `busy` is
    /// left alone: the stream that owns it still releases it when it ends.
    pub fn reset(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.stream_id = self.stream_id.wrapping_add(1);
        self.in_flight = None;
        self.backend.clear_history();
        self.messages = vec![Message::model(self.settings.greeting.clone())];
        self.subscribers.notify(SessionEvent::Reset);
    }

    pub fn react(&mut self, message_index: usize, emoji: &str) -> Result<(), ReactionError> {
        let len = self.messages.len();
        let message = self
            .messages
            .get_mut(message_index)
            .ok_or(ReactionError::InvalidIndex {
                index: message_index,
                len,
            })?;
        message.toggle_reaction(emoji);
        self.subscribers.notify(SessionEvent::ReactionsChanged {
            index: message_index,
        });
        Ok(())
    }

    pub fn dictation_supported(&self) -> bool {
        self.dictation
            .as_ref()
            .is_some_and(|port| port.is_supported())
    }

    /// Records one dictation and appends the transcript to the draft.
    pub async fn dictate(&mut self) -> Result<(), DictationError> {
        let port = match &self.dictation {
            Some(port) if port.is_supported() => Arc::clone(port),
            _ => return Err(DictationError::Unsupported),
        };

        self.set_recording(true);
        let result = port.listen().await;
        self.set_recording(false);

        match result {
            Ok(transcript) => {
                let merged = merge_transcript(&self.draft_input, &transcript);
                self.set_draft_input(merged);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "dictation failed");
                Err(err)
            }
        }
    }

    fn set_recording(&mut self, recording: bool) {
        if self.recording != recording {
            self.recording = recording;
            self.subscribers
                .notify(SessionEvent::RecordingChanged(recording));
        }
    }
}
