//! Terminal rendering of `UiEvent`s.
//!
//! Streamed tokens are written raw as they arrive. Function results are
//! printed as syntax-highlighted code blocks, and `/history` renders
//! assistant turns as markdown through termimad.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;
use termimad::MadSkin;
use tokio::sync::mpsc::UnboundedReceiver;

use parley_types::event::{Author, UiEvent};

/// Markdown renderer with syntect-highlighted code blocks.
pub struct ChatRenderer {
    skin: MadSkin,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl Default for ChatRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatRenderer {
    pub fn new() -> Self {
        let mut skin = MadSkin::default_dark();
        skin.bold.set_fg(termimad::crossterm::style::Color::Cyan);
        skin.inline_code
            .set_fg(termimad::crossterm::style::Color::Yellow);

        Self {
            skin,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Render markdown, highlighting fenced code blocks.
    pub fn render_markdown(&self, markdown: &str) -> String {
        let mut output = String::new();
        let mut in_code_block = false;
        let mut code_lang = String::new();
        let mut code_buf = String::new();

        for line in markdown.lines() {
            if line.starts_with("```") && !in_code_block {
                in_code_block = true;
                code_lang = line.trim_start_matches('`').trim().to_string();
                code_buf.clear();
            } else if line.starts_with("```") {
                in_code_block = false;
                output.push_str(&self.highlight_code(&code_buf, &code_lang));
            } else if in_code_block {
                code_buf.push_str(line);
                code_buf.push('\n');
            } else {
                output.push_str(&self.skin.term_text(line).to_string());
            }
        }

        if in_code_block && !code_buf.is_empty() {
            output.push_str(&self.highlight_code(&code_buf, &code_lang));
        }

        output
    }

    /// Highlight `code` as `lang`, one indented line per source line.
    pub fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let theme = &self.theme_set.themes["base16-ocean.dark"];
        let mut highlighter = HighlightLines::new(syntax, theme);

        let mut output = String::new();
        output.push_str(&format!("  {}\n", style(format!("--- {lang} ---")).dim()));
        for line in code.lines() {
            let ranges: Vec<(Style, &str)> = highlighter
                .highlight_line(line, &self.syntax_set)
                .unwrap_or_default();
            let escaped = as_24_bit_terminal_escaped(&ranges[..], false);
            output.push_str(&format!("  {escaped}\x1b[0m\n"));
        }
        output
    }
}

/// Pretty-print a function result if it is JSON, otherwise keep it as is.
pub fn format_function_result(content: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| content.to_string())
        }
        _ => content.to_string(),
    }
}

/// "thinking..." spinner shown while waiting for the model.
///
/// Shared between the input loop, which starts it, and the renderer task,
/// which clears it when output arrives.
#[derive(Clone, Default)]
pub struct Spinner {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl Spinner {
    pub fn start(&self) {
        let bar = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(spinner_style);
        }
        bar.set_message("thinking...");
        bar.enable_steady_tick(Duration::from_millis(80));
        let previous = self
            .bar
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(bar);
        if let Some(previous) = previous {
            previous.finish_and_clear();
        }
    }

    pub fn stop(&self) {
        let current = self.bar.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(bar) = current {
            bar.finish_and_clear();
        }
    }

    pub fn is_running(&self) -> bool {
        self.bar.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

/// Write `UiEvent`s to `out` until the channel closes.
pub async fn render_events<W: Write>(
    mut events: UnboundedReceiver<UiEvent>,
    mut out: W,
    renderer: Arc<ChatRenderer>,
    spinner: Spinner,
) {
    while let Some(event) = events.recv().await {
        if let Err(err) = render_event(&mut out, &renderer, &spinner, event) {
            tracing::debug!("failed to write UI event: {err}");
        }
    }
}

fn render_event(
    out: &mut impl Write,
    renderer: &ChatRenderer,
    spinner: &Spinner,
    event: UiEvent,
) -> std::io::Result<()> {
    match event {
        UiEvent::MessageStarted { author, .. } => {
            spinner.stop();
            match author {
                Author::Assistant => write!(out, "\n  {} ", style("Assistant >").cyan().bold())?,
                Author::Function(_) => write!(out, "\n  {} ", style("call >").magenta().bold())?,
            }
        }
        UiEvent::Token { text, .. } => write!(out, "{text}")?,
        UiEvent::MessageFinished { .. } => writeln!(out)?,
        UiEvent::FunctionResult {
            author,
            content,
            language,
        } => {
            writeln!(out, "\n  {} {}", style("result >").magenta().bold(), style(author).dim())?;
            let block = renderer.highlight_code(&format_function_result(&content), &language);
            write!(out, "{block}")?;
            // The model is asked again with the result.
            spinner.start();
        }
        UiEvent::Notice { message } => {
            spinner.stop();
            writeln!(out, "\n  {} {message}", style("!").yellow().bold())?;
        }
    }
    out.flush()
}
