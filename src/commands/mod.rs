mod registry;

pub use registry::{all_commands, find_command, Command, CommandInvocation};

use crate::core::session::StreamingTranscriptSession;
use crate::utils::logging::LoggingState;

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    ProcessAsMessage(String),
    Quit,
}

/// What a command may touch. Status lines are collected rather than printed
/// so the front end decides where they go.
pub struct CommandContext<'a> {
    pub session: &'a mut StreamingTranscriptSession,
    pub logging: &'a mut LoggingState,
    pub output: Vec<String>,
}

impl<'a> CommandContext<'a> {
    pub fn new(session: &'a mut StreamingTranscriptSession, logging: &'a mut LoggingState) -> Self {
        Self {
            session,
            logging,
            output: Vec::new(),
        }
    }

    fn status(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }
}

pub fn process_input(ctx: &mut CommandContext<'_>, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, ' ');
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match find_command(command_name) {
        Some(command) => {
            let invocation = CommandInvocation {
                input: trimmed,
                args,
            };
            (command.handler)(ctx, invocation)
        }
        None => CommandResult::ProcessAsMessage(input.to_string()),
    }
}

pub(super) fn handle_help(
    ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    ctx.status("Commands:");
    for command in all_commands() {
        ctx.status(format!("  {:<20} {}", command.usage, command.help));
    }
    CommandResult::Continue
}

pub(super) fn handle_clear(
    ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    ctx.session.reset();
    if let Err(e) = ctx.logging.log_text("## Chat cleared") {
        ctx.status(format!("Log error: {e}"));
    }
    CommandResult::Continue
}

pub(super) fn handle_react(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let mut parts = invocation.args.split_whitespace();
    let (Some(index), Some(emoji), None) = (parts.next(), parts.next(), parts.next()) else {
        ctx.status("Usage: /react <n> <emoji>");
        return CommandResult::Continue;
    };

    let Ok(number) = index.parse::<usize>() else {
        ctx.status(format!("Not a message number: {index}"));
        return CommandResult::Continue;
    };

    // Numbers shown by /history start at 1.
    let outcome = number
        .checked_sub(1)
        .map(|index| ctx.session.react(index, emoji).map(|()| index));

    match outcome {
        Some(Ok(index)) => {
            let summary = match ctx.session.messages()[index].reaction(emoji) {
                Some(reaction) => format!("{} x{}", reaction.emoji, reaction.count),
                None => format!("{emoji} removed"),
            };
            ctx.status(summary);
        }
        Some(Err(_)) | None => ctx.status(format!(
            "No message #{number} (there are {})",
            ctx.session.messages().len()
        )),
    }
    CommandResult::Continue
}

pub(super) fn handle_history(
    ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    let lines: Vec<String> = ctx
        .session
        .messages()
        .iter()
        .enumerate()
        .map(|(i, message)| format!("#{} {}", i + 1, message))
        .collect();
    ctx.output.extend(lines);
    CommandResult::Continue
}

pub(super) fn handle_log(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let parts: Vec<&str> = invocation.input.split_whitespace().collect();

    let result = match parts.len() {
        1 => ctx.logging.toggle_logging(),
        2 => ctx.logging.set_log_file(parts[1].to_string()),
        _ => {
            ctx.status("Usage: /log [filename]");
            return CommandResult::Continue;
        }
    };

    match result {
        Ok(message) => ctx.status(message),
        Err(e) => ctx.status(format!("Log error: {e}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_quit(
    _ctx: &mut CommandContext<'_>,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    CommandResult::Quit
}
