//! Welcome banner printed when a chat session starts.

use std::io::Write;

use console::style;

pub fn print_welcome_banner(
    out: &mut impl Write,
    model: &str,
    language: &str,
    function_count: usize,
    session_id: &str,
) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {} {}", style("*").cyan(), style("Parley").cyan().bold())?;
    writeln!(out)?;
    writeln!(out, "  {}     {}", style("Model:").bold(), style(model).dim())?;
    writeln!(out, "  {}  {}", style("Language:").bold(), style(language).dim())?;
    writeln!(out, "  {} {}", style("Functions:").bold(), style(function_count).dim())?;
    writeln!(
        out,
        "  {}   {}",
        style("Session:").bold(),
        style(&session_id[..8.min(session_id.len())]).dim()
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "  {}",
        style("Type /help for commands, Ctrl+C to stop a response, Ctrl+D to exit").dim()
    )?;
    writeln!(out, "  {}", style("---").dim())?;
    writeln!(out)
}
