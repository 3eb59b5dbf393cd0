//! Interactive line-mode chat loop.

use std::error::Error;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cli::printer::TranscriptPrinter;
use crate::cli::RuntimeSettings;
use crate::commands::{process_input, CommandContext, CommandResult};
use crate::core::backend::{spawn_reply_stream, ChatBackend, StreamMessage, StreamTicket};
use crate::core::chat_stream::HttpChatBackend;
use crate::core::events::SessionEvent;
use crate::core::message::Message;
use crate::core::session::{StreamingTranscriptSession, SubmitError};
use crate::utils::logging::LoggingState;

/// Messages that make up the reply to the most recent user message.
pub fn reply_since_last_user(messages: &[Message]) -> &[Message] {
    let start = messages
        .iter()
        .rposition(Message::is_user)
        .map(|index| index + 1)
        .unwrap_or(messages.len());
    &messages[start..]
}

/// Appends `messages` to the transcript log. Write failures are reported and
/// otherwise ignored so a bad log file never ends the conversation.
pub fn log_messages(logging: &LoggingState, messages: &[Message]) {
    for message in messages {
        if let Err(e) = logging.log_message(message) {
            warn!(error = %e, "failed to write transcript log");
            eprintln!("Failed to log message: {e}");
        }
    }
}

/// Submits the draft and logs the user message. A reply that is still
/// accumulating gets superseded by the new stream, so its partial text is
/// logged first.
fn submit_draft_logged(
    session: &mut StreamingTranscriptSession,
    logging: &LoggingState,
) -> Result<StreamTicket, SubmitError> {
    let superseded = match session.in_flight() {
        Some(_) => reply_since_last_user(session.messages()).to_vec(),
        None => Vec::new(),
    };

    let ticket = session.begin_submit_draft()?;
    log_messages(logging, &superseded);
    if let Some(message) = session.messages().last() {
        log_messages(logging, std::slice::from_ref(message));
    }
    Ok(ticket)
}

pub async fn run_chat(settings: RuntimeSettings) -> Result<(), Box<dyn Error>> {
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpChatBackend::new(settings.backend.clone()));
    let mut session = StreamingTranscriptSession::new(Arc::clone(&backend), settings.session);
    let mut events = session.subscribe();
    let mut logging = LoggingState::new(settings.log_file)?;
    let mut printer = TranscriptPrinter::new(std::io::stdout(), settings.markdown);
    let (tx, mut rx) = mpsc::unbounded_channel::<(StreamMessage, u64)>();

    eprintln!("🚀 Kongkow ({}) - type /help for commands", settings.backend.model);
    if let Some(greeting) = session.messages().first() {
        printer.print_message(greeting)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                let mut ctx = CommandContext::new(&mut session, &mut logging);
                let result = process_input(&mut ctx, &line);
                for status in std::mem::take(&mut ctx.output) {
                    eprintln!("{status}");
                }

                match result {
                    CommandResult::Continue => {}
                    CommandResult::Quit => break,
                    CommandResult::ProcessAsMessage(text) => {
                        session.set_draft_input(text);
                        match submit_draft_logged(&mut session, &logging) {
                            Ok(ticket) => {
                                spawn_reply_stream(Arc::clone(&backend), ticket, tx.clone());
                            }
                            Err(SubmitError::BusyRejection) => {
                                eprintln!("⏳ Still waiting for the reply, hang on.");
                            }
                            Err(SubmitError::EmptySubmission) => {}
                        }
                    }
                }
            }
            Some((message, stream_id)) = rx.recv() => {
                let terminal = !matches!(message, StreamMessage::Fragment(_));
                session.apply(stream_id, message);

                if terminal && stream_id == session.current_stream_id() {
                    flush_events(&mut events, &session, &mut printer)?;
                    printer.finish(session.messages())?;
                    log_messages(&logging, reply_since_last_user(session.messages()));
                } else if terminal {
                    debug!(stream_id, "stale stream finished");
                }
            }
        }

        flush_events(&mut events, &session, &mut printer)?;
    }

    if let Some(token) = session.cancel_token() {
        token.cancel();
    }
    Ok(())
}

fn flush_events<W: std::io::Write>(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    session: &StreamingTranscriptSession,
    printer: &mut TranscriptPrinter<W>,
) -> std::io::Result<()> {
    while let Ok(event) = events.try_recv() {
        printer.handle(session.messages(), &event)?;
    }
    Ok(())
}
