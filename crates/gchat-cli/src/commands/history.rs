use super::utils::{self, GlobalOptions};
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use gchat_core::{Conversation, HistorySummary, Message, Role};
use gchat_infrastructure::MemoryConfig;

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List archived days, newest first
    List {
        /// Show at most this many days (0 for all)
        #[arg(short, long, default_value_t = 10)]
        days: usize,
        /// Include creation time, archive time and model
        #[arg(short = 'l', long)]
        detailed: bool,
    },
    /// Print the active conversation, or the archived one for DATE
    Show {
        /// YYYY-MM-DD
        date: Option<String>,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Archive the active conversation and resume the one from DATE
    Load {
        /// YYYY-MM-DD
        date: String,
    },
    /// Reset the active conversation
    Clear {
        /// Discard instead of archiving
        #[arg(long)]
        no_archive: bool,
    },
    /// Delete archived days older than the retention window
    Cleanup {
        /// Override HISTORY_RETENTION_DAYS
        #[arg(short, long)]
        days: Option<i64>,
    },
}

pub fn run(action: HistoryAction, options: &GlobalOptions) -> Result<()> {
    let config = utils::load_config(options, MemoryConfig::new())?;
    let workspace = utils::resolve_workspace(options)?;
    let store = utils::open_store(&workspace, config.as_ref())?;

    match action {
        HistoryAction::List { days, detailed } => {
            let mut any = false;
            for summary in store.list(days, detailed)? {
                any = true;
                println!("{}", format_summary(&summary));
            }
            if !any {
                println!("{}", "No history yet.".dimmed());
            }
        }
        HistoryAction::Show { date, json } => {
            let conversation = match &date {
                Some(date) => store.history_entry(date)?,
                None => store.active()?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&conversation)?);
            } else {
                print_conversation(&conversation);
            }
        }
        HistoryAction::Load { date } => {
            let loaded = store
                .load(&date)
                .with_context(|| format!("Failed to load history for {date}"))?;
            println!(
                "{} {} ({} messages)",
                "Loaded".green(),
                date,
                loaded.len()
            );
        }
        HistoryAction::Clear { no_archive } => {
            let archived = store.clear(!no_archive)?;
            if archived {
                println!("{}", "Archived and cleared the active conversation.".green());
            } else {
                println!("{}", "Cleared the active conversation.".green());
            }
        }
        HistoryAction::Cleanup { days } => {
            let days = days.unwrap_or(store.settings().retention_days);
            let removed = store.cleanup(days)?;
            println!("Removed {removed} history entries older than {days} days.");
        }
    }

    Ok(())
}

fn format_summary(summary: &HistorySummary) -> String {
    let mut line = format!(
        "{}  {:>4} messages",
        summary.date.to_string().bold(),
        summary.message_count
    );
    if let Some(created_at) = summary.created_at {
        line.push_str(&format!("  created {}", created_at.format("%Y-%m-%d %H:%M")));
    }
    if let Some(archived_at) = summary.archived_at {
        line.push_str(&format!("  archived {}", archived_at.format("%Y-%m-%d %H:%M")));
    }
    if let Some(model) = &summary.model {
        line.push_str(&format!("  [{model}]"));
    }
    line
}

fn print_conversation(conversation: &Conversation) {
    let mut header = format!("{} ({} messages)", conversation.date, conversation.len());
    if let Some(origin) = conversation.loaded_from {
        header.push_str(&format!(", loaded from {origin}"));
    }
    println!("{}", header.bold());

    if conversation.is_empty() {
        println!("{}", "(empty)".dimmed());
        return;
    }
    for message in &conversation.contents {
        println!();
        println!("{}", message_heading(message));
        println!("{}", message.content);
    }
}

fn message_heading(message: &Message) -> String {
    let stamp = message.timestamp.format("%H:%M:%S").to_string();
    let attachments = match message.attachment_count() {
        0 => String::new(),
        n => format!(" +{n} attachment(s)"),
    };
    let label = format!("[{}] {stamp}{attachments}", message.role);
    match message.role {
        Role::User => label.green().to_string(),
        Role::Model => label.cyan().to_string(),
        Role::System => label.yellow().to_string(),
    }
}
