use super::utils::{self, GlobalOptions};
use crate::notify::CommandNotificationSink;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use gchat_core::config::keys;
use gchat_infrastructure::{ConversationStore, MemoryConfig};
use gchat_interaction::{ChatRequest, ChatSession, GeminiClient};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Prompt text (joined with spaces)
    #[arg(required_unless_present = "files")]
    pub prompt: Vec<String>,

    /// Attach a file (repeatable)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Send the active conversation along with this prompt
    #[arg(short = 'c', long = "continue")]
    pub continue_conversation: bool,

    /// Archive the active conversation and start a fresh one first
    #[arg(short = 'n', long, conflicts_with = "continue_conversation")]
    pub new: bool,

    /// Wait for the whole answer instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// JSON Schema file the answer must conform to
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(short, long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Shell command that receives the answer on stdin
    #[arg(long, value_name = "CMD")]
    pub notify: Option<String>,
}

impl AskArgs {
    fn overrides(&self) -> MemoryConfig {
        let mut overrides = MemoryConfig::new();
        if let Some(model) = &self.model {
            overrides = overrides.with(keys::MODEL, model.clone());
        }
        if let Some(temperature) = self.temperature {
            overrides = overrides.with(keys::TEMPERATURE, temperature.to_string());
        }
        if let Some(max_tokens) = self.max_tokens {
            overrides = overrides.with(keys::MAX_TOKENS, max_tokens.to_string());
        }
        overrides
    }

    fn request(&self) -> ChatRequest {
        ChatRequest {
            prompt: self.prompt.join(" "),
            attachments: self.files.clone(),
            continue_conversation: self.continue_conversation,
            streaming: !self.no_stream,
            schema_path: self.schema.clone(),
            skip_archive: self.new,
        }
    }
}

pub async fn run(args: AskArgs, options: &GlobalOptions) -> Result<()> {
    let config = utils::load_config(options, args.overrides())?;
    let workspace = utils::resolve_workspace(options)?;

    let client = GeminiClient::from_config(config.as_ref())?;
    let store = Arc::new(utils::open_store(&workspace, config.as_ref())?);
    if args.new && start_fresh(Arc::clone(&store)).await? {
        eprintln!("{}", "Archived the previous conversation.".dimmed());
    }

    let mut session = ChatSession::new(store, config, client);
    if let Some(command) = &args.notify {
        session = session.with_notifier(Arc::new(CommandNotificationSink::new(command.clone())));
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let result = session
        .run(&args.request(), &cancel, |fragment| {
            let _ = write!(stdout, "{fragment}");
            let _ = stdout.flush();
        })
        .await;
    println!();

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_cancelled() => {
            eprintln!("{}", "Cancelled; nothing was recorded.".yellow());
            Ok(())
        }
        Err(e) => Err(e).context("Chat turn failed"),
    }
}

/// Archives and resets the active conversation off the runtime threads,
/// since the store may wait on the workspace lock.
async fn start_fresh(store: Arc<ConversationStore>) -> Result<bool> {
    let archived = tokio::task::spawn_blocking(move || store.clear(true))
        .await
        .context("Archive task panicked")??;
    Ok(archived)
}
