//! Slash commands of the chat loop.

use std::io::Write;

use console::style;

#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    Help,
    /// Clear the conversation and the screen.
    Clear,
    Exit,
    History,
    /// List the functions the model can call right now.
    Functions,
    /// Bind a remote endpoint from a JSON file.
    Bind(String),
    /// Drop every bound endpoint.
    Unbind,
    /// Unknown command or missing argument, with a message.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts
        .get(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/history" => Some(ChatCommand::History),
        "/functions" | "/fns" => Some(ChatCommand::Functions),
        "/bind" => match arg {
            Some(path) => Some(ChatCommand::Bind(path)),
            None => Some(ChatCommand::Unknown("/bind requires a file path".to_string())),
        },
        "/unbind" => Some(ChatCommand::Unbind),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

pub fn print_help(out: &mut impl Write) -> std::io::Result<()> {
    let rows = [
        ("/help", "Show this help message"),
        ("/clear", "Start over with an empty conversation"),
        ("/exit", "End the chat session"),
        ("/history", "Show the conversation so far"),
        ("/functions", "List the functions the model can call"),
        ("/bind <file>", "Bind a remote endpoint from a JSON file"),
        ("/unbind", "Drop all bound endpoints"),
    ];

    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    for (command, help) in rows {
        writeln!(out, "  {:<14} {help}", style(command).cyan())?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "  {}",
        style("Ctrl+C stops a streaming response, Ctrl+D exits").dim()
    )?;
    writeln!(out)
}
