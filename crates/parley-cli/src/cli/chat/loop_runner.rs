//! Main chat loop orchestration.
//!
//! Builds the session (plugins, client, gateway, conversation), prints the
//! banner, then reads input until Ctrl+D or `/exit`. While a turn runs the
//! input is still read so Ctrl+C can set the stop signal.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use console::style;
use tokio::sync::mpsc;
use tracing::{info, warn};

use parley_core::agent::context::SessionContext;
use parley_core::agent::conversation_loop::{ConversationLoop, TurnOutcome};
use parley_core::chat::conversation::{Conversation, default_system_prompt};
use parley_core::dispatch::dispatcher::FunctionDispatcher;
use parley_core::llm::token_budget::{TiktokenEncoder, TokenBudgeter};
use parley_infra::bindings::load_endpoint_binding;
use parley_infra::gateway::HttpGateway;
use parley_infra::llm::openai_compat::OpenAiCompatClient;
use parley_infra::plugins::discover_plugins;
use parley_types::config::{AppConfig, LoopSettings};
use parley_types::turn::{Role, Turn};

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::{ChatRenderer, Spinner, render_events};

type ChatLoop = ConversationLoop<OpenAiCompatClient, HttpGateway, TiktokenEncoder>;

/// What the input loop does after a command or turn.
enum Flow {
    Continue,
    Exit,
}

/// Run the interactive chat loop.
pub async fn run_chat_loop(config: &AppConfig) -> anyhow::Result<()> {
    let registry = discover_plugins(Path::new(&config.plugin_dir)).await?;
    let service = OpenAiCompatClient::from_config(config)?;
    let budgeter = TokenBudgeter::new(TiktokenEncoder::for_model(&config.model)?);
    let dispatcher = FunctionDispatcher::new(registry, HttpGateway::from_config(config));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let chat_loop: ChatLoop = ConversationLoop::new(
        service,
        dispatcher,
        budgeter,
        LoopSettings::from(config),
        events_tx,
    );

    let ctx = SessionContext::new();
    let mut conversation = Conversation::new(default_system_prompt(&config.language));
    info!(session_id = %ctx.session_id, model = %config.model, "chat session started");

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, mut out) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    print_welcome_banner(
        &mut out,
        &config.model,
        &config.language,
        chat_loop.dispatcher().local().len(),
        &ctx.session_id.to_string(),
    )?;

    let renderer = Arc::new(ChatRenderer::new());
    let spinner = Spinner::default();
    let render_task = tokio::spawn(render_events(
        events_rx,
        out.clone(),
        Arc::clone(&renderer),
        spinner.clone(),
    ));

    loop {
        let text = match chat_input.read_line().await {
            InputEvent::Eof => {
                writeln!(out, "\n  {}", style("Session ended.").dim())?;
                break;
            }
            InputEvent::Interrupted => {
                writeln!(out, "  {}", style("Press Ctrl+D to exit, or keep chatting.").dim())?;
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => text,
        };

        let flow = match commands::parse(&text) {
            Some(command) => {
                handle_command(
                    command,
                    &chat_loop,
                    &ctx,
                    &mut conversation,
                    &mut chat_input,
                    &mut out,
                    &renderer,
                )
                .await?
            }
            None => {
                run_turn(
                    &chat_loop,
                    &ctx,
                    &mut conversation,
                    &text,
                    &mut chat_input,
                    &mut out,
                    &spinner,
                )
                .await?
            }
        };
        if let Flow::Exit = flow {
            break;
        }
    }

    // Closing the event channel ends the renderer task.
    drop(chat_loop);
    let _ = render_task.await;
    chat_input.flush();
    Ok(())
}

/// Run one user turn, reading input alongside it for stop requests.
async fn run_turn(
    chat_loop: &ChatLoop,
    ctx: &SessionContext,
    conversation: &mut Conversation,
    text: &str,
    input: &mut ChatInput,
    out: &mut impl Write,
    spinner: &Spinner,
) -> anyhow::Result<Flow> {
    ctx.stop_signal().reset();
    spinner.start();
    let started = Instant::now();
    let mut flow = Flow::Continue;

    let turn = chat_loop.run_turn(ctx, conversation, text);
    tokio::pin!(turn);
    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            event = input.read_line() => match event {
                InputEvent::Interrupted => {
                    info!("stop requested");
                    ctx.stop_signal().stop();
                }
                InputEvent::Eof => {
                    ctx.stop_signal().stop();
                    flow = Flow::Exit;
                }
                InputEvent::Message(_) => {
                    writeln!(out, "  {}", style("(still answering, message ignored)").dim())?;
                }
            },
            _ = tokio::signal::ctrl_c() => ctx.stop_signal().stop(),
        }
    };
    spinner.stop();

    match result {
        Ok(report) => match report.outcome {
            TurnOutcome::Completed => {
                writeln!(
                    out,
                    "  {} {} {} {:.1}s",
                    style("|").dim(),
                    style(format!("{} iterations", report.iterations)).dim(),
                    style("\u{00b7}").dim(),
                    style(started.elapsed().as_secs_f64()).dim(),
                )?;
            }
            TurnOutcome::IterationLimit => {
                writeln!(
                    out,
                    "\n  {} Gave up after {} iterations without a final answer.",
                    style("!").yellow().bold(),
                    report.iterations
                )?;
            }
            // The loop already published a notice.
            TurnOutcome::Cancelled | TurnOutcome::Abandoned => {}
        },
        Err(err) => {
            warn!("turn failed: {err}");
            writeln!(out, "\n  {} {err}", style("!").red().bold())?;
        }
    }
    writeln!(out)?;
    Ok(flow)
}

async fn handle_command(
    command: ChatCommand,
    chat_loop: &ChatLoop,
    ctx: &SessionContext,
    conversation: &mut Conversation,
    input: &mut ChatInput,
    out: &mut impl Write,
    renderer: &ChatRenderer,
) -> anyhow::Result<Flow> {
    match command {
        ChatCommand::Help => commands::print_help(out)?,
        ChatCommand::Clear => {
            conversation.reset();
            input.clear();
            writeln!(out, "  {}", style("Conversation cleared.").dim())?;
        }
        ChatCommand::Exit => {
            writeln!(out, "\n  {}", style("Session ended.").dim())?;
            return Ok(Flow::Exit);
        }
        ChatCommand::History => {
            write!(out, "{}", format_history(conversation.turns(), renderer))?;
        }
        ChatCommand::Functions => {
            let descriptors = chat_loop.dispatcher().descriptors(ctx);
            writeln!(out)?;
            if descriptors.is_empty() {
                writeln!(out, "  {}", style("No functions available.").dim())?;
            }
            for descriptor in descriptors {
                writeln!(
                    out,
                    "  {}  {}",
                    style(&descriptor.name).cyan(),
                    style(&descriptor.description).dim()
                )?;
            }
            writeln!(out)?;
        }
        ChatCommand::Bind(path) => match load_endpoint_binding(Path::new(&path)).await {
            Ok(endpoint) => {
                let summary = format!("{} ({} functions)", endpoint.url, endpoint.api_info.len());
                ctx.bind(endpoint);
                writeln!(out, "  {} Bound {summary}", style("+").green().bold())?;
            }
            Err(err) => {
                writeln!(out, "  {} {err:#}", style("!").red().bold())?;
            }
        },
        ChatCommand::Unbind => {
            let count = ctx.binding_count();
            ctx.clear_bindings();
            writeln!(out, "  {}", style(format!("Dropped {count} bound endpoints.")).dim())?;
        }
        ChatCommand::Unknown(message) => {
            writeln!(
                out,
                "  {} Unknown command: {message}. Type /help for commands.",
                style("!").yellow().bold()
            )?;
        }
    }
    Ok(Flow::Continue)
}

/// Render every non-system turn for `/history`.
fn format_history(turns: &[Turn], renderer: &ChatRenderer) -> String {
    let mut output = String::from("\n");
    for turn in turns.iter().filter(|turn| turn.role != Role::System) {
        match turn.role {
            Role::User => {
                output.push_str(&format!("  {} {}\n", style("You >").green().bold(), turn.content));
            }
            Role::Assistant => match &turn.function_call {
                Some(call) => output.push_str(&format!(
                    "  {} {}({})\n",
                    style("call >").magenta().bold(),
                    call.name,
                    call.arguments
                )),
                None => {
                    output.push_str(&format!("  {}\n", style("Assistant >").cyan().bold()));
                    output.push_str(&renderer.render_markdown(&turn.content));
                }
            },
            Role::Function => {
                let name = turn.name.as_deref().unwrap_or("function");
                output.push_str(&format!("  {} {name}\n", style("result >").magenta().bold()));
                output.push_str(&renderer.highlight_code(&turn.content, "json"));
            }
            Role::System => {}
        }
    }
    output.push('\n');
    output
}
