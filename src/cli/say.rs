//! One-shot "say" command

use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cli::chat::{log_messages, reply_since_last_user};
use crate::cli::printer::TranscriptPrinter;
use crate::cli::RuntimeSettings;
use crate::core::backend::{spawn_reply_stream, ChatBackend, StreamMessage};
use crate::core::chat_stream::HttpChatBackend;
use crate::core::session::StreamingTranscriptSession;
use crate::utils::logging::LoggingState;

pub async fn run_say(prompt: Vec<String>, settings: RuntimeSettings) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: kongkow say <prompt>");
        std::process::exit(1);
    }

    let backend: Arc<dyn ChatBackend> = Arc::new(HttpChatBackend::new(settings.backend));
    let session = StreamingTranscriptSession::new(backend, settings.session);
    let logging = LoggingState::new(settings.log_file)?;
    let mut printer = TranscriptPrinter::new(std::io::stdout(), settings.markdown);

    let failed = say_with(session, &prompt, &mut printer, &logging).await?;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Streams one reply through `session` into `printer`. Returns whether the
/// reply ended in failure.
pub async fn say_with<W: std::io::Write>(
    mut session: StreamingTranscriptSession,
    prompt: &str,
    printer: &mut TranscriptPrinter<W>,
    logging: &LoggingState,
) -> Result<bool, Box<dyn Error>> {
    let mut events = session.subscribe();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let ticket = session.begin_submit(prompt)?;
    if let Some(message) = session.messages().last() {
        log_messages(logging, std::slice::from_ref(message));
    }
    let stream_id = ticket.stream_id;
    spawn_reply_stream(session.backend(), ticket, tx);

    let mut failed = false;
    while let Some((message, id)) = rx.recv().await {
        let terminal = !matches!(message, StreamMessage::Fragment(_));
        failed |= matches!(message, StreamMessage::Failed(_));
        session.apply(id, message);

        while let Ok(event) = events.try_recv() {
            printer.handle(session.messages(), &event)?;
        }
        if terminal && id == stream_id {
            break;
        }
    }

    printer.finish(session.messages())?;
    log_messages(logging, reply_since_last_user(session.messages()));
    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::DEFAULT_APOLOGY;
    use crate::utils::test_utils::{create_test_session, ScriptStep, ScriptedBackend};

    #[tokio::test]
    async fn prints_streamed_reply() {
        let session = create_test_session(Arc::new(ScriptedBackend::fragments(&["Ha", "lo"])));
        let logging = LoggingState::new(None).expect("logger");
        let mut printer = TranscriptPrinter::new(Vec::new(), false);

        let failed = say_with(session, "hi", &mut printer, &logging)
            .await
            .expect("say succeeds");

        assert!(!failed);
        let out = String::from_utf8(printer.into_inner()).expect("utf8");
        assert_eq!(out, "Halo\n\n");
    }

    #[tokio::test]
    async fn failure_prints_apology_and_reports_it() {
        let session = create_test_session(Arc::new(ScriptedBackend::new(vec![
            ScriptStep::Fragment("Ha".into()),
            ScriptStep::Fail("reset".into()),
        ])));
        let logging = LoggingState::new(None).expect("logger");
        let mut printer = TranscriptPrinter::new(Vec::new(), false);

        let failed = say_with(session, "hi", &mut printer, &logging)
            .await
            .expect("say succeeds");

        assert!(failed);
        let out = String::from_utf8(printer.into_inner()).expect("utf8");
        assert_eq!(out, format!("Ha\n\n{DEFAULT_APOLOGY}\n\n"));
    }
}
