//! CLI commands implementation

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use skillrun_core::{ChatBackend, CompatClient, Config};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{select_entry, AgentConfig, AgentEvent, AgentLoop, ApprovalRequest};
use crate::session::SessionStore;
use crate::skills::SkillCatalog;
use crate::tools::builtin::create_default_registry;
use crate::tools::{SuffixDelimiter, ToolContext, Verbatim};

// ANSI color codes
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Longest tool result echoed to the terminal
const RESULT_PREVIEW_LEN: usize = 400;

/// List discovered skills
pub fn list(config: &Config) -> Result<()> {
    let catalog = SkillCatalog::scan(&config.skill_dirs());

    if catalog.is_empty() {
        println!("No skills found. Scanned:");
        for dir in catalog.scanned_paths() {
            println!("  {}", dir.display());
        }
        return Ok(());
    }

    println!("{}Skills{}", BOLD, RESET);
    for skill in catalog.list() {
        println!("  {}{}{}  {}", CYAN, skill.name, RESET, skill.description);
        println!("    {}{}{}", DIM, skill.path.display(), RESET);
    }
    Ok(())
}

/// Run one request through the agent loop
pub async fn run(
    config: &Config,
    skill_name: Option<String>,
    model: Option<String>,
    allow: bool,
    input: &str,
) -> Result<()> {
    if input.trim().is_empty() {
        anyhow::bail!("No input given");
    }

    let base = CompatClient::from_config(&config.backend).context("Failed to create model client")?;
    let client = match model {
        Some(model) => base.with_model(model),
        None => match select_entry(&base, "agents", &config.models, input).await {
            Some(entry) => {
                println!("{}Auto-selected model:{} {}", DIM, RESET, entry.name);
                base.with_model(entry.name.as_str())
            }
            None => base,
        },
    };

    let catalog = SkillCatalog::scan(&config.skill_dirs());
    debug!(skills = catalog.len(), "Scanned skills");
    let skill = match skill_name {
        Some(name) => Some(
            catalog
                .get(&name)
                .cloned()
                .with_context(|| format!("Unknown skill: {}", name))?,
        ),
        None => {
            let skills = catalog.to_vec();
            let picked = select_entry(&client, "skills", &skills, input).await.cloned();
            if let Some(ref skill) = picked {
                println!("{}Auto-selected skill:{} {}", DIM, RESET, skill.name);
            }
            picked
        }
    };

    let working_dir = std::env::current_dir().context("Failed to get working directory")?;
    let tool_ctx =
        ToolContext::new(working_dir.clone()).with_allowed_dirs(config.paths.allowed_dirs.clone());
    let registry = create_default_registry(tool_ctx);
    let store = SessionStore::new(config.sessions_dir()?);
    let agent_config = AgentConfig::from_settings(&config.agent).with_working_dir(working_dir);

    info!(
        model = %client.model(),
        skill = ?skill.as_ref().map(|s| &s.name),
        allow,
        "Running request"
    );
    let agent = AgentLoop::new(Arc::new(client), Arc::new(registry), store, agent_config);
    let agent = match config.agent.tool_suffix_delimiter.as_str() {
        "" => agent.with_normalizer(Verbatim),
        delimiter => agent.with_normalizer(SuffixDelimiter::new(delimiter)),
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    let (tx, rx) = mpsc::channel(32);
    let renderer = tokio::spawn(render_events(rx, cancel.clone()));

    let result = agent.execute(&cancel, skill.as_ref(), input, &tx, allow).await;
    drop(tx);
    if let Err(e) = renderer.await {
        warn!(error = %e, "Event renderer failed");
    }

    result.context("Agent run failed")
}

/// Show or reset the current session
pub fn session(config: &Config, new: bool) -> Result<()> {
    let store = SessionStore::new(config.sessions_dir()?);

    if new {
        let id = store.start_new()?;
        println!("{}✓{} Started session {}", GREEN, RESET, id);
        println!("  {}", store.session_dir(&id).display());
        return Ok(());
    }

    match store.current_id() {
        Some(id) => {
            let history = store.load_history(&id);
            println!("{}Session{} {}", BOLD, RESET, id);
            println!("  Directory: {}", store.session_dir(&id).display());
            println!("  Messages:  {}", history.len());
            println!(
                "  Summary:   {}",
                if store.load_summary(&id).is_some() { "yes" } else { "no" }
            );
        }
        None => println!(
            "No current session. One is created on the next run under {}",
            store.root().display()
        ),
    }
    Ok(())
}

/// Print events as they arrive, prompting on confirmations
async fn render_events(mut rx: mpsc::Receiver<AgentEvent>, cancel: CancellationToken) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::Text(text) => {
                println!();
                println!("{}", text);
            }
            AgentEvent::ToolCall { name, args, .. } => {
                println!("{}[Tool: {}]{} {}{}{}", CYAN, name, RESET, DIM, args, RESET);
            }
            AgentEvent::ToolConfirm { name, args, reply, .. } => {
                confirm(&cancel, &name, &args, reply).await;
            }
            AgentEvent::ToolSkipped { name, .. } => {
                println!("{}Skipped {}{}", DIM, name, RESET);
            }
            AgentEvent::ToolResult { name, result, .. } => {
                debug!(tool = %name, result_len = result.len(), "Tool result");
                println!("{}{}{}", DIM, preview(&result), RESET);
            }
            AgentEvent::Done => println!("{}Done{}", GREEN, RESET),
        }
    }
}

/// Ask on the terminal; without a TTY every call is declined
async fn confirm(cancel: &CancellationToken, name: &str, args: &str, reply: ApprovalRequest) {
    if !io::stdin().is_terminal() {
        warn!(tool = %name, "Non-interactive mode: declining tool that requires confirmation");
        eprintln!(
            "{}[Warning]{} Non-interactive mode: tool '{}' requires confirmation but stdin is not a TTY.",
            YELLOW, RESET, name
        );
        eprintln!("Use --allow to approve tool calls in non-interactive mode.");
        reply.decline();
        return;
    }

    // Pretty print arguments
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(args) {
        if let Ok(pretty) = serde_json::to_string_pretty(&value) {
            for line in pretty.lines() {
                println!("  {}", line);
            }
        }
    }
    print!("{}Allow {}?{} [y/n] ", YELLOW, name, RESET);
    let _ = io::stdout().flush();

    if await_answer(cancel, read_line_on_thread()).await {
        reply.approve();
    } else {
        reply.decline();
    }
}

/// Blocking stdin reads cannot be interrupted, so the read gets its own
/// thread; a cancelled prompt leaves it parked until the process exits.
fn read_line_on_thread() -> oneshot::Receiver<io::Result<String>> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let read = io::stdin().read_line(&mut line).map(|_| line);
        let _ = tx.send(read);
    });
    rx
}

/// Wait for the typed answer; cancellation or a failed read declines
async fn await_answer(
    cancel: &CancellationToken,
    answer: oneshot::Receiver<io::Result<String>>,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            println!();
            debug!("Cancelled while waiting for confirmation");
            false
        }
        read = answer => match read {
            Ok(Ok(line)) => parse_answer(&line),
            Ok(Err(e)) => {
                debug!(error = %e, "Failed to read stdin, declining");
                false
            }
            Err(_) => false,
        },
    }
}

fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

fn preview(result: &str) -> String {
    if result.len() <= RESULT_PREVIEW_LEN {
        return result.to_string();
    }
    let mut end = RESULT_PREVIEW_LEN;
    while !result.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &result[..end])
}
