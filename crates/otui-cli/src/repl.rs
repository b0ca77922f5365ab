//! A line-oriented interactive loop: read a user message from stdin, run
//! one chat turn, print assistant text as it streams in, and prompt on
//! stdin for each tool-permission request the orchestrator raises. No TUI
//! widgets — this is the process's `main` loop, not its presentation layer.

use std::collections::HashSet;

use otui_chat::{ChatEvent, OrchestratorState, PermissionDecision};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{context::AppContext, error::{Error, Result}};

const EXIT_COMMANDS: &[&str] = &["exit", "quit", ":q"];

pub async fn run(ctx: &mut AppContext) -> Result<()> {
    if ctx.session().is_none() {
        open_default_session(ctx).await?;
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("otui ready. type a message, or 'exit' to quit.");
    loop {
        print!("> ");
        use std::io::Write as _;
        std::io::stdout().flush().ok();

        let Some(line) = stdin.next_line().await? else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&line) {
            break;
        }

        if let Err(e) = run_turn(ctx, line).await {
            error!(error = %e, "turn failed");
            println!("error: {e}");
        }
    }

    ctx.mcp.shutdown_all().await;
    Ok(())
}

/// Opens (creating if needed) a single ad-hoc session bound to the
/// configured default provider, for the common case of starting `otui`
/// with no prior session to resume.
async fn open_default_session(ctx: &mut AppContext) -> Result<()> {
    let provider_name = ctx
        .user_config
        .default_provider
        .clone()
        .or_else(|| ctx.providers.names().next().map(str::to_string))
        .ok_or_else(|| Error::Message("no provider is enabled and configured".to_string()))?;
    let model = ctx.providers.get(&provider_name)?.get_model().to_string();

    let session = otui_sessions::Session::new("default", provider_name, model);
    let guard = ctx.sessions.create(&session).await?;
    ctx.set_session(session, guard);
    Ok(())
}

async fn run_turn(ctx: &mut AppContext, user_msg: &str) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ChatEvent>();
    let cancel = CancellationToken::new();
    let orchestrator = ctx.orchestrator.clone();

    let drain = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ChatEvent::StateChanged(OrchestratorState::Error) => {
                    eprintln!("\n[orchestrator entered an error state]");
                },
                ChatEvent::StateChanged(_) => {},
                ChatEvent::TextDelta(delta) => {
                    use std::io::Write as _;
                    print!("{delta}");
                    std::io::stdout().flush().ok();
                },
                ChatEvent::ToolCallStart { name, .. } => {
                    println!("\n[running tool: {name}]");
                },
                ChatEvent::ToolCallEnd { name, success, error, .. } => {
                    if success {
                        println!("[tool {name} finished]");
                    } else {
                        println!("[tool {name} failed: {}]", error.unwrap_or_default());
                    }
                },
                ChatEvent::ToolPermissionRequest { request_id, tool_name, purpose, .. } => {
                    let decision = prompt_permission(&tool_name, &purpose).await;
                    if let Err(e) = orchestrator.resolve_permission(&request_id, decision).await {
                        error!(error = %e, "failed to resolve permission request");
                    }
                },
            }
        }
    });

    let empty_plugins = HashSet::new();
    let session_provider = ctx.session().map(|s| s.provider.clone());
    let provider_name = session_provider.as_deref().or(ctx.user_config.default_provider.as_deref()).ok_or_else(|| {
        crate::error::Error::Message("no provider configured; set default_provider or open a session".to_string())
    })?;
    let provider = ctx.providers.get(provider_name)?;

    let mut always_allow: HashSet<String> = HashSet::new();
    let mut messages = ctx.session().map(|s| s.messages.clone()).unwrap_or_default();

    let policy = ctx.policy(&empty_plugins);
    let on_event = move |event: ChatEvent| {
        let _ = tx.send(event);
    };

    let outcome = ctx
        .orchestrator
        .send(provider, &policy, &mut messages, user_msg, &mut always_allow, &cancel, &on_event)
        .await?;
    drop(on_event);
    drain.await.ok();

    println!();
    if outcome.max_reached {
        println!("[reached max iterations without a final answer]");
    }

    let updated_session = ctx.session_mut().map(|session| {
        session.messages = messages;
        session.clone()
    });
    if let Some(session) = updated_session {
        ctx.sessions.save(&session).await?;
    }

    Ok(())
}

async fn prompt_permission(tool_name: &str, purpose: &str) -> PermissionDecision {
    tokio::task::spawn_blocking({
        let tool_name = tool_name.to_string();
        let purpose = purpose.to_string();
        move || {
            use std::io::Write as _;
            print!("\nallow tool '{tool_name}' ({purpose})? [y/N/always] ");
            std::io::stdout().flush().ok();
            let mut answer = String::new();
            std::io::stdin().read_line(&mut answer).ok();
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => PermissionDecision { approved: true, always_allow: false },
                "always" | "a" => PermissionDecision { approved: true, always_allow: true },
                _ => PermissionDecision { approved: false, always_allow: false },
            }
        }
    })
    .await
    .unwrap_or(PermissionDecision { approved: false, always_allow: false })
}
