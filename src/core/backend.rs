//! The boundary between a transcript session and whatever produces reply text.
//!
//! A [`ChatBackend`] turns one user message into a lazy, ordered sequence of
//! text fragments. Sessions either consume that sequence inline
//! ([`crate::core::session::StreamingTranscriptSession::submit`]) or hand it to
//! [`spawn_reply_stream`], which forwards each item over a channel tagged with
//! the stream id so a front end can interleave other input with the reply.

use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The request never reached the provider, or the connection dropped.
    Transport(String),
    /// The provider answered with an error status or an error payload.
    Api {
        status: Option<u16>,
        message: String,
    },
    /// A payload arrived that could not be decoded.
    Decode(String),
    /// The request was abandoned through its cancellation token.
    Cancelled,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(msg) => write!(f, "transport error: {msg}"),
            BackendError::Api {
                status: Some(status),
                message,
            } => write!(f, "API error ({status}): {message}"),
            BackendError::Api {
                status: None,
                message,
            } => write!(f, "API error: {message}"),
            BackendError::Decode(msg) => write!(f, "decode error: {msg}"),
            BackendError::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl StdError for BackendError {}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Starts a reply to `text`.
    ///
    /// Implementations stop yielding once `cancel` fires. Failing before the
    /// first fragment is reported through the outer `Result`; failing
    /// mid-stream is reported as an `Err` item, after which the stream ends.
    async fn stream_reply(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, BackendError>;

    /// Forgets any conversation context kept between replies.
    fn clear_history(&self) {}
}

/// Everything a caller needs to drive one submission's reply.
#[derive(Debug, Clone)]
pub struct StreamTicket {
    pub stream_id: u64,
    pub text: String,
    pub cancel_token: CancellationToken,
}

#[derive(Debug)]
pub enum StreamMessage {
    Fragment(String),
    Failed(BackendError),
    End,
}

/// Runs the backend reply on a separate task and forwards it over `tx`.
///
/// Every stream terminates with exactly one `Failed` or `End`, including
/// streams abandoned through the ticket's token, so the receiving session can
/// always release its busy flag.
pub fn spawn_reply_stream(
    backend: Arc<dyn ChatBackend>,
    ticket: StreamTicket,
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let StreamTicket {
            stream_id,
            text,
            cancel_token,
        } = ticket;

        let forward = forward_reply(backend.as_ref(), &text, cancel_token.clone(), &tx, stream_id);
        let outcome = tokio::select! {
            outcome = forward => outcome,
            _ = cancel_token.cancelled() => Ok(()),
        };

        let terminal = match outcome {
            Ok(()) | Err(BackendError::Cancelled) => StreamMessage::End,
            Err(err) => StreamMessage::Failed(err),
        };
        let _ = tx.send((terminal, stream_id));
    })
}

async fn forward_reply(
    backend: &dyn ChatBackend,
    text: &str,
    cancel_token: CancellationToken,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) -> Result<(), BackendError> {
    let mut stream = backend.stream_reply(text, cancel_token).await?;
    while let Some(item) = stream.next().await {
        let fragment = item?;
        if tx
            .send((StreamMessage::Fragment(fragment), stream_id))
            .is_err()
        {
            // Receiver is gone; nobody is left to render the reply.
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{ScriptStep, ScriptedBackend};

    async fn collect(
        mut rx: mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    ) -> Vec<(StreamMessage, u64)> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn forwards_fragments_then_end() {
        let backend = Arc::new(ScriptedBackend::fragments(&["a", "b"]));
        let (tx, rx) = mpsc::unbounded_channel();
        let ticket = StreamTicket {
            stream_id: 7,
            text: "hi".into(),
            cancel_token: CancellationToken::new(),
        };

        spawn_reply_stream(backend, ticket, tx)
            .await
            .expect("task joins");
        let received = collect(rx).await;

        assert_eq!(received.len(), 3);
        assert!(received.iter().all(|(_, id)| *id == 7));
        assert!(matches!(&received[0].0, StreamMessage::Fragment(f) if f == "a"));
        assert!(matches!(&received[1].0, StreamMessage::Fragment(f) if f == "b"));
        assert!(matches!(received[2].0, StreamMessage::End));
    }

    #[tokio::test]
    async fn mid_stream_failure_is_terminal() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ScriptStep::Fragment("Hi".into()),
            ScriptStep::Fail("boom".into()),
            ScriptStep::Fragment("never".into()),
        ]));
        let (tx, rx) = mpsc::unbounded_channel();
        let ticket = StreamTicket {
            stream_id: 1,
            text: "hi".into(),
            cancel_token: CancellationToken::new(),
        };

        spawn_reply_stream(backend, ticket, tx)
            .await
            .expect("task joins");
        let received = collect(rx).await;

        assert_eq!(received.len(), 2);
        assert!(matches!(&received[0].0, StreamMessage::Fragment(f) if f == "Hi"));
        assert!(matches!(received[1].0, StreamMessage::Failed(_)));
    }

    #[tokio::test]
    async fn cancelled_stream_still_ends() {
        let backend = Arc::new(ScriptedBackend::pending());
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let ticket = StreamTicket {
            stream_id: 3,
            text: "hi".into(),
            cancel_token: cancel_token.clone(),
        };

        let handle = spawn_reply_stream(backend, ticket, tx);
        cancel_token.cancel();
        handle.await.expect("task joins");
        let received = collect(rx).await;

        assert_eq!(received.len(), 1);
        assert!(matches!(received[0], (StreamMessage::End, 3)));
    }

    #[test]
    fn errors_render_status_when_known() {
        let err = BackendError::Api {
            status: Some(429),
            message: "slow down".into(),
        };
        assert_eq!(err.to_string(), "API error (429): slow down");
        assert_eq!(
            BackendError::Transport("refused".into()).to_string(),
            "transport error: refused"
        );
    }
}
