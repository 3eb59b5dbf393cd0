use std::io::{self, Write};

use crate::core::events::SessionEvent;
use crate::core::message::Message;
use crate::ui::markdown;

/// Writes a session's transcript to a line-oriented terminal as it changes.
///
/// Streamed replies are printed incrementally: only the text added since the
/// last update is written for the message being followed.
pub struct TranscriptPrinter<W: Write> {
    out: W,
    markdown: bool,
    following: Option<usize>,
    printed: usize,
}

impl<W: Write> TranscriptPrinter<W> {
    pub fn new(out: W, markdown: bool) -> Self {
        Self {
            out,
            markdown,
            following: None,
            printed: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn print_message(&mut self, message: &Message) -> io::Result<()> {
        if message.is_user() {
            writeln!(self.out, "You: {}", message.text)?;
        } else {
            writeln!(self.out, "{}", message.text)?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn handle(&mut self, messages: &[Message], event: &SessionEvent) -> io::Result<()> {
        match *event {
            SessionEvent::MessageAppended { index } => {
                let Some(message) = messages.get(index) else {
                    return Ok(());
                };
                if message.is_user() {
                    return Ok(());
                }
                self.finish_following()?;
                write!(self.out, "{}", message.text)?;
                self.following = Some(index);
                self.printed = message.text.len();
            }
            SessionEvent::MessageUpdated { index } if self.following == Some(index) => {
                if let Some(tail) = messages
                    .get(index)
                    .and_then(|message| message.text.get(self.printed..))
                {
                    write!(self.out, "{tail}")?;
                    self.printed += tail.len();
                }
            }
            SessionEvent::Reset => {
                self.following = None;
                writeln!(self.out, "\n--- chat cleared ---\n")?;
                if let Some(greeting) = messages.first() {
                    self.print_message(greeting)?;
                }
            }
            _ => {}
        }
        self.out.flush()
    }

    /// Ends the reply being followed, if any, and optionally prints its
    /// rendered form.
    pub fn finish(&mut self, messages: &[Message]) -> io::Result<()> {
        if let Some(index) = self.following {
            if self.markdown {
                if let Some(message) = messages.get(index) {
                    writeln!(self.out)?;
                    write!(self.out, "{}", markdown::render(&message.text))?;
                }
            }
        }
        self.finish_following()?;
        self.out.flush()
    }

    fn finish_following(&mut self) -> io::Result<()> {
        if self.following.take().is_some() {
            writeln!(self.out)?;
            writeln!(self.out)?;
        }
        self.printed = 0;
        Ok(())
    }
}
