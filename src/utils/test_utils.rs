use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::backend::{BackendError, ChatBackend, FragmentStream};
use crate::core::dictation::{DictationError, DictationPort};
use crate::core::session::{SessionSettings, StreamingTranscriptSession};

#[derive(Debug, Clone)]
pub enum ScriptStep {
    Fragment(String),
    Fail(String),
}

/// Backend that replays a fixed script for every request.
pub struct ScriptedBackend {
    steps: Vec<ScriptStep>,
    fail_on_request: Option<String>,
    never_finish: bool,
    requests: Mutex<Vec<String>>,
    history_clears: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            fail_on_request: None,
            never_finish: false,
            requests: Mutex::new(Vec::new()),
            history_clears: AtomicUsize::new(0),
        }
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        Self::new(
            fragments
                .iter()
                .map(|f| ScriptStep::Fragment(f.to_string()))
                .collect(),
        )
    }

    pub fn failing(message: &str) -> Self {
        let mut backend = Self::new(Vec::new());
        backend.fail_on_request = Some(message.to_string());
        backend
    }

    /// A reply that never yields and never ends.
    pub fn pending() -> Self {
        let mut backend = Self::new(Vec::new());
        backend.never_finish = true;
        backend
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn history_clears(&self) -> usize {
        self.history_clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn stream_reply(
        &self,
        text: &str,
        _cancel: CancellationToken,
    ) -> Result<FragmentStream, BackendError> {
        self.requests.lock().unwrap().push(text.to_string());

        if let Some(message) = &self.fail_on_request {
            return Err(BackendError::Transport(message.clone()));
        }
        if self.never_finish {
            return Ok(stream::pending::<Result<String, BackendError>>().boxed());
        }

        let mut items = Vec::new();
        for step in &self.steps {
            match step {
                ScriptStep::Fragment(text) => items.push(Ok(text.clone())),
                ScriptStep::Fail(message) => {
                    items.push(Err(BackendError::Api {
                        status: None,
                        message: message.clone(),
                    }));
                    break;
                }
            }
        }
        Ok(stream::iter(items).boxed())
    }

    fn clear_history(&self) {
        self.history_clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend whose single reply is fed by the test through a channel, so state
/// can be inspected between fragments.
pub struct ChannelBackend {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<String, BackendError>>>>,
}

impl ChannelBackend {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<String, BackendError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
        });
        (backend, tx)
    }
}

#[async_trait]
impl ChatBackend for ChannelBackend {
    async fn stream_reply(
        &self,
        _text: &str,
        _cancel: CancellationToken,
    ) -> Result<FragmentStream, BackendError> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BackendError::Transport("channel already used".into()))?;
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }
}

pub struct ScriptedDictation {
    pub outcome: Result<String, DictationError>,
}

#[async_trait]
impl DictationPort for ScriptedDictation {
    async fn listen(&self) -> Result<String, DictationError> {
        self.outcome.clone()
    }
}

pub fn create_test_session(backend: Arc<dyn ChatBackend>) -> StreamingTranscriptSession {
    StreamingTranscriptSession::new(backend, SessionSettings::default())
}
