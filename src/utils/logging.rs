use crate::core::message::Message;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

/// Plain-text transcript log. Messages are appended once they are final, so
/// a streamed reply lands in the file as a single entry.
pub struct LoggingState {
    file_path: Option<String>,
    is_active: bool,
}

impl LoggingState {
    pub fn new(log_file: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut logging = LoggingState {
            file_path: None,
            is_active: false,
        };

        if let Some(path) = log_file {
            logging.set_log_file(path)?;
        }

        Ok(logging)
    }

    pub fn set_log_file(&mut self, path: String) -> Result<String, Box<dyn std::error::Error>> {
        let header = format!("## Logging started {}", Local::now().format("%Y-%m-%d %H:%M"));
        append_lines(&path, &header)?;

        self.file_path = Some(path.clone());
        self.is_active = true;

        Ok(format!("Logging enabled to: {path}"))
    }

    pub fn toggle_logging(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        match &self.file_path {
            Some(path) => {
                self.is_active = !self.is_active;
                if self.is_active {
                    Ok(format!("Logging resumed to: {path}"))
                } else {
                    Ok(format!("Logging paused (file: {path})"))
                }
            }
            None => {
                Err("No log file specified. Use /log <filename> to enable logging first.".into())
            }
        }
    }

    pub fn log_message(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        if message.is_user() {
            self.log_text(&format!("You: {}", message.text))
        } else {
            self.log_text(&message.text)
        }
    }

    pub fn log_text(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        if !self.is_active || content.is_empty() {
            return Ok(());
        }
        match self.file_path.as_deref() {
            Some(path) => append_lines(path, content),
            None => Ok(()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

fn append_lines(path: &str, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);

    for line in content.lines() {
        writeln!(writer, "{line}")?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn inactive_logger_writes_nothing() {
        let logging = LoggingState::new(None).expect("logger");
        logging
            .log_message(&Message::user("hi"))
            .expect("no-op succeeds");
        assert!(!logging.is_active());
    }

    #[test]
    fn messages_are_appended_with_prefixes() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("chat.log");
        let logging =
            LoggingState::new(Some(path.to_string_lossy().into_owned())).expect("logger");

        logging.log_message(&Message::user("halo")).expect("log");
        logging
            .log_message(&Message::model("line one\nline two"))
            .expect("log");

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert!(contents.starts_with("## Logging started "));
        assert!(contents.ends_with("You: halo\n\nline one\nline two\n\n"));
        assert!(logging.is_active());
    }

    #[test]
    fn unwritable_path_leaves_logger_untouched() {
        let dir = TempDir::new().expect("temp dir");
        let bad = dir.path().join("missing").join("chat.log");
        let mut logging = LoggingState::new(None).expect("logger");

        assert!(logging.set_log_file(bad.to_string_lossy().into_owned()).is_err());
        assert!(!logging.is_active());
        assert!(logging.toggle_logging().is_err());
        logging
            .log_message(&Message::user("still fine"))
            .expect("inactive logger ignores writes");
    }

    #[test]
    fn toggling_pauses_and_resumes() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("chat.log");
        let mut logging = LoggingState::new(None).expect("logger");
        assert!(logging.toggle_logging().is_err());

        logging
            .set_log_file(path.to_string_lossy().into_owned())
            .expect("enable");
        logging.toggle_logging().expect("pause");
        assert!(!logging.is_active());
        logging.log_text("hidden").expect("paused write");

        logging.toggle_logging().expect("resume");
        logging.log_text("shown").expect("write");

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert!(!contents.contains("hidden"));
        assert!(contents.contains("shown"));
    }
}
