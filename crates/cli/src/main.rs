mod cli;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use acacia_conversation::{
    ConversationService, ConversationStore, Decrypter, EncryptionService, InMemoryStore,
    ReplyStream,
};
use acacia_core::config::{load_dotenv, Config};
use acacia_core::{CallerIdentity, RequestContext};
use acacia_llm::ProviderRegistry;
use acacia_tool_runtime::tools::{Issue, MemoryIssueDirectory, Project, StatusColumn};
use acacia_tool_runtime::{
    CalculateTool, GetIssueDetailsTool, GetProjectDetailsTool, GetUserProjectsTool,
    IssueDirectory, SearchIssuesTool, Tool, ToolRegistry,
};

use crate::cli::CliArgs;
use crate::terminal::{Input, Terminal};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let terminal = Terminal::new();

    let mut config = Config::from_env();
    if let Some(max_rounds) = args.max_rounds {
        config.orchestration.max_rounds = max_rounds.max(1);
    }
    config.log_summary();

    let crypto = Arc::new(encryption_service(&config)?);
    let tools = Arc::new(build_tools(&args).context("failed to build tool registry")?);
    let tool_names: Vec<String> = tools.list_tools().into_iter().map(|d| d.name).collect();
    let providers = ProviderRegistry::from_config(&config.llm, &config.orchestration, tools);

    if !providers.provider_names().contains(&args.provider.as_str()) {
        anyhow::bail!(
            "unknown provider '{}' (available: {})",
            args.provider,
            providers.provider_names().join(", ")
        );
    }

    let store = Arc::new(InMemoryStore::new());
    store.insert_credential(
        args.team_id,
        args.provider.as_str(),
        crypto.encrypt(&args.api_key).context("failed to encrypt API key")?,
    );

    let service = ConversationService::new(
        Arc::clone(&store) as Arc<dyn ConversationStore>,
        Arc::new(providers),
        crypto as Arc<dyn Decrypter>,
    )
    .with_buffer(config.orchestration.stream_buffer);

    let caller = CallerIdentity::new(args.user_id);
    terminal.print_banner(&args.provider, args.model(), &tool_names)?;

    let mut conversation_id = None;
    loop {
        let text = match terminal.read_input()? {
            Input::Exit => {
                terminal.print_info("Goodbye.")?;
                break;
            }
            Input::Empty => continue,
            Input::Message(text) => text,
        };

        let id = match conversation_id {
            Some(id) => id,
            None => {
                let conversation = service
                    .create_conversation(caller, args.team_id, &args.provider, args.model(), &text)
                    .await
                    .context("failed to start conversation")?;
                info!(conversation_id = conversation.id, title = %conversation.title, "conversation started");
                *conversation_id.insert(conversation.id)
            }
        };

        let cancel = CancellationToken::new();
        let context = RequestContext::new(caller).with_cancellation(cancel.clone());
        match service.reply_to_message(context, id, &text).await {
            Ok(reply) => render_reply(&terminal, reply, &cancel).await?,
            Err(e) => {
                error!(error = %e, "reply failed");
                terminal.print_error(&e.to_string())?;
            }
        }
    }

    Ok(())
}

/// Print chunks as they arrive; Ctrl+C cancels this reply only.
async fn render_reply(
    terminal: &Terminal,
    reply: ReplyStream,
    cancel: &CancellationToken,
) -> Result<()> {
    let ReplyStream {
        mut chunks,
        outcome,
    } = reply;

    loop {
        tokio::select! {
            chunk = chunks.recv() => match chunk {
                Some(chunk) => {
                    terminal.display_chunk(&chunk)?;
                    if chunk.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                info!("cancelling reply");
                cancel.cancel();
            }
        }
    }

    match outcome.await {
        Ok(outcome) => terminal.display_outcome(&outcome)?,
        Err(_) => warn!("reply finished without reporting an outcome"),
    }
    Ok(())
}

/// The configured key, or a throwaway one for this process only.
fn encryption_service(config: &Config) -> Result<EncryptionService> {
    if config.encryption.is_configured() {
        return EncryptionService::from_config(&config.encryption)
            .context("invalid ENCRYPTION_KEY");
    }
    warn!("no encryption key configured, using an ephemeral key");
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    Ok(EncryptionService::new(&key))
}

fn build_tools(args: &CliArgs) -> Result<ToolRegistry> {
    let mut tools: Vec<Arc<dyn Tool>> = vec![Arc::new(CalculateTool)];
    if args.issue_tools {
        let directory: Arc<dyn IssueDirectory> = Arc::new(demo_directory(args));
        tools.push(Arc::new(GetIssueDetailsTool::new(Arc::clone(&directory))));
        tools.push(Arc::new(SearchIssuesTool::new(Arc::clone(&directory))));
        tools.push(Arc::new(GetProjectDetailsTool::new(Arc::clone(&directory))));
        tools.push(Arc::new(GetUserProjectsTool::new(directory)));
    }
    Ok(ToolRegistry::from_tools(tools)?)
}

/// A small issue tracker the caller's team can see.
fn demo_directory(args: &CliArgs) -> MemoryIssueDirectory {
    let directory = MemoryIssueDirectory::new();
    directory.add_member(args.team_id, args.user_id);
    directory.add_project(Project {
        id: 1,
        team_id: args.team_id,
        name: "Apollo".into(),
    });
    for (id, name, position) in [(1, "Todo", 0), (2, "In progress", 1), (3, "Done", 2)] {
        directory.add_column(StatusColumn {
            id,
            project_id: 1,
            name: name.into(),
            position,
        });
    }
    let issues = [
        (1, "Login page times out", Some("Users on slow networks see a 504"), "open"),
        (2, "Export to CSV drops unicode", None, "in_progress"),
        (3, "Critical: payments double charge", Some("Retry path re-submits the charge"), "open"),
    ];
    for (id, name, description, status) in issues {
        directory.add_issue(Issue {
            id,
            project_id: 1,
            name: name.into(),
            description: description.map(String::from),
            status: status.into(),
        });
    }
    directory
}
