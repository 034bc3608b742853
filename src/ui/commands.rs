use std::str::FromStr;

use once_cell::sync::Lazy;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a fresh thread: new session id, cleared transcript
    New,
    /// Toggle (or set) contextual continuity for this session
    Context,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

pub static COMMAND_ENTRIES: Lazy<Vec<CommandEntry>> = Lazy::new(|| {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.keyword(),
            description: command.description(),
        })
        .collect()
});

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Explicit target for `/context on|off`; `None` means toggle.
    pub fn context_target(&self) -> Option<bool> {
        if self.command != SlashCommand::Context {
            return None;
        }
        match self.argument()?.trim().to_lowercase().as_str() {
            "on" | "true" | "enable" | "enabled" => Some(true),
            "off" | "false" | "disable" | "disabled" => Some(false),
            _ => None,
        }
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a fresh thread (new session id, cleared transcript)",
            SlashCommand::Context => "toggle contextual continuity, or /context on|off",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn keyword(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].split_whitespace();
    let head = parts.next()?;
    let rest: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "reset" | "clear" => Some(SlashCommand::New),
            "ctx" => Some(SlashCommand::Context),
            _ => None,
        })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Help text listing every command, shown by `/help`.
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for entry in COMMAND_ENTRIES.iter() {
        help.push_str(&format!("/{} - {}\n", entry.keyword, entry.description));
    }
    help.push_str("\nAliases: /q for /bye, /reset for /new, /ctx for /context.");
    help
}
