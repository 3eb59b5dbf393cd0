use super::{CommandContext, CommandResult};

pub type CommandHandler = fn(&mut CommandContext<'_>, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "clear",
        usage: "/clear",
        help: "Start over with a fresh conversation.",
        handler: super::handle_clear,
    },
    Command {
        name: "react",
        usage: "/react <n> <emoji>",
        help: "Toggle your reaction on message n (see /history).",
        handler: super::handle_react,
    },
    Command {
        name: "history",
        usage: "/history",
        help: "List the conversation with message numbers and reactions.",
        handler: super::handle_history,
    },
    Command {
        name: "log",
        usage: "/log [filename]",
        help: "Toggle logging or set the log file path.",
        handler: super::handle_log,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the chat.",
        handler: super::handle_quit,
    },
];
