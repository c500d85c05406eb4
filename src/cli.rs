use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::database::KeyValueStore;
use crate::models::{Idea, Status};
use crate::store::{IdeaStore, StoreError};
use crate::transfer::{self, DirectorySink, FileSource, ImportOutcome, TransferError};
use crate::utils::{get_current_date_string, local_now, parse_schedule};

#[derive(Parser)]
#[command(name = "ideas")]
#[command(about = "Personal idea board with password-protected export and import")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new idea
    Add {
        /// Idea title
        name: String,
        #[command(flatten)]
        fields: IdeaArgs,
    },
    /// Change fields of an existing idea
    Edit {
        /// Idea ID
        id: String,
        /// New title
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: IdeaArgs,
        /// Remove the scheduled date
        #[arg(long, conflicts_with = "date")]
        clear_date: bool,
        /// Remove the attached image
        #[arg(long, conflicts_with = "image")]
        clear_image: bool,
    },
    /// Delete an idea
    Delete {
        /// Idea ID
        id: String,
        /// Skip the confirmation question
        #[arg(short, long)]
        yes: bool,
    },
    /// List ideas, grouped by status (default if no subcommand)
    List {
        /// Only show this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Switch an idea between in progress and paused
    Toggle {
        /// Idea ID
        id: String,
    },
    /// Show scheduled ideas in date order
    Calendar {
        /// Only ideas with a reminder still to fire
        #[arg(long)]
        reminders: bool,
    },
    /// Write every idea to an export file
    Export {
        /// Directory to write into (defaults to the configured export directory)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Protect the file with a password
        #[arg(long)]
        encrypt: bool,
    },
    /// Merge ideas from an export file into the board
    Import {
        /// File to import (.lock or .json)
        file: PathBuf,
        /// Skip the confirmation question
        #[arg(short, long)]
        yes: bool,
    },
}

/// Optional idea fields shared by `add` and `edit`
#[derive(Args, Debug, Default)]
pub struct IdeaArgs {
    /// Longer description
    #[arg(long)]
    pub description: Option<String>,
    /// Category (one of the configured categories)
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    /// Scheduled date: YYYY-MM-DD, YYYY-MM-DDTHH:MM or RFC 3339
    #[arg(long)]
    pub date: Option<String>,
    /// Fire a reminder at the scheduled date
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub notify: Option<bool>,
    /// Image file to attach
    #[arg(long)]
    pub image: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Progress,
    Paused,
}

impl From<StatusArg> for Status {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Progress => Status::Progress,
            StatusArg::Paused => Status::Paused,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error(transparent)]
    TransferError(#[from] TransferError),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("No idea with ID {0}")]
    NotFound(String),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("An encrypted export needs a non-empty password")]
    EmptyPassword,
}

/// Handle the add command
pub fn handle_add<S: KeyValueStore>(
    name: String,
    fields: IdeaArgs,
    store: &mut IdeaStore<S>,
    config: &Config,
) -> Result<(), CliError> {
    let mut idea = Idea::new(name);
    idea.category = config.default_category.clone();
    apply_fields(&mut idea, fields, config)?;

    let saved = store.upsert(idea)?;
    println!("Idea created successfully (ID: {})", saved.id);
    Ok(())
}

/// Handle the edit command. Fields not given keep their current value.
pub fn handle_edit<S: KeyValueStore>(
    id: String,
    name: Option<String>,
    fields: IdeaArgs,
    clear_date: bool,
    clear_image: bool,
    store: &mut IdeaStore<S>,
    config: &Config,
) -> Result<(), CliError> {
    let mut idea = store.get(&id).cloned().ok_or(CliError::NotFound(id))?;

    if let Some(name) = name {
        idea.name = name;
    }
    apply_fields(&mut idea, fields, config)?;
    if clear_date {
        idea.date = None;
    }
    if clear_image {
        idea.image = None;
    }

    let saved = store.upsert(idea)?;
    println!("Idea updated (ID: {})", saved.id);
    Ok(())
}

/// Handle the delete command
pub fn handle_delete<S: KeyValueStore>(
    id: String,
    yes: bool,
    store: &mut IdeaStore<S>,
) -> Result<(), CliError> {
    let Some(idea) = store.get(&id) else {
        return Err(CliError::NotFound(id));
    };

    let question = format!("Delete \"{}\"?", idea.display_name());
    if !yes && !confirm(&question)? {
        println!("Nothing deleted");
        return Ok(());
    }

    store.remove(&id)?;
    println!("Idea deleted (ID: {})", id);
    Ok(())
}

/// Handle the list command
pub fn handle_list<S: KeyValueStore>(category: Option<String>, store: &IdeaStore<S>) {
    let ideas = store.list(category.as_deref());
    let counts = store.counts(category.as_deref());

    for (status, count, empty) in [
        (Status::Progress, counts.progress, "No ideas in progress"),
        (Status::Paused, counts.paused, "No paused ideas"),
    ] {
        let heading = match status {
            Status::Progress => "In progress",
            Status::Paused => "Paused",
        };
        println!("{} ({})", heading, count);

        if count == 0 {
            println!("  {}", empty);
        }
        for idea in ideas.iter().filter(|i| i.status == status) {
            print_idea(idea);
        }
        println!();
    }
}

/// Handle the toggle command
pub fn handle_toggle<S: KeyValueStore>(id: String, store: &mut IdeaStore<S>) -> Result<(), CliError> {
    let idea = store.toggle_status(&id)?.ok_or(CliError::NotFound(id))?;
    let message = match idea.status {
        Status::Progress => "resumed",
        Status::Paused => "paused",
    };
    println!("\"{}\" {}", idea.display_name(), message);
    Ok(())
}

/// Handle the calendar command
pub fn handle_calendar<S: KeyValueStore>(reminders: bool, store: &IdeaStore<S>) {
    let ideas = if reminders {
        store.pending_reminders(local_now())
    } else {
        store.scheduled()
    };

    if ideas.is_empty() {
        println!("No ideas with a scheduled date.");
        return;
    }

    for idea in ideas {
        let raw = idea.date.as_deref().unwrap_or_default();
        let when = parse_schedule(raw)
            .map(|dt| dt.format("%d %b %Y %H:%M").to_string())
            .unwrap_or_else(|| raw.to_string());
        let bell = if idea.notify { " (reminder)" } else { "" };
        println!("{}  {} [{}]{}", when, idea.display_name(), idea.display_category(), bell);
    }
}

/// Handle the export command
pub fn handle_export<S: KeyValueStore>(
    out: Option<PathBuf>,
    encrypt: bool,
    store: &IdeaStore<S>,
    config: &Config,
) -> Result<(), CliError> {
    let password = if encrypt {
        let p1 = rpassword::prompt_password("Choose a password for the export: ")?;
        let p2 = rpassword::prompt_password("Re-enter password: ")?;
        Some(confirmed_password(p1, p2)?)
    } else {
        None
    };

    let dir = out.unwrap_or_else(|| config.get_export_dir());
    let mut sink = DirectorySink::new(dir);
    let report = transfer::export_ideas(
        store,
        password.as_deref(),
        &mut sink,
        &get_current_date_string(),
    )?;

    let kind = if report.encrypted { "encrypted" } else { "plain" };
    println!(
        "Exported {} ideas ({}) to {}",
        report.count,
        kind,
        report.location.display()
    );
    Ok(())
}

/// Handle the import command
pub fn handle_import<S: KeyValueStore>(
    file: PathBuf,
    yes: bool,
    store: &mut IdeaStore<S>,
) -> Result<(), CliError> {
    let mut source = FileSource::new(&file);
    let mut prompt = || match rpassword::prompt_password("This file is encrypted. Password: ") {
        Ok(password) => Some(password),
        Err(e) => {
            tracing::warn!(error = %e, "could not read password");
            None
        }
    };
    let ask = |count: usize| {
        yes || confirm(&format!(
            "Import {} ideas? Your current ideas are kept.",
            count
        ))
        .unwrap_or(false)
    };

    match transfer::import_ideas(store, &mut source, &mut prompt, ask)? {
        ImportOutcome::Merged { offered, added } => {
            println!(
                "Imported {} new ideas ({} already on the board)",
                added,
                offered - added
            );
        }
        ImportOutcome::Cancelled | ImportOutcome::Declined => println!("Nothing imported"),
    }
    Ok(())
}

fn confirmed_password(first: String, second: String) -> Result<String, CliError> {
    if first != second {
        return Err(CliError::PasswordMismatch);
    }
    if first.is_empty() {
        return Err(CliError::EmptyPassword);
    }
    Ok(first)
}

fn apply_fields(idea: &mut Idea, fields: IdeaArgs, config: &Config) -> Result<(), CliError> {
    if let Some(description) = fields.description {
        idea.description = description;
    }
    if let Some(category) = fields.category {
        config.validate_category(&category)?;
        idea.category = category;
    }
    if let Some(status) = fields.status {
        idea.status = status.into();
    }
    if let Some(date) = fields.date {
        if parse_schedule(&date).is_none() {
            return Err(CliError::DateParseError(format!("Invalid date '{}'", date)));
        }
        idea.date = Some(date);
    }
    if let Some(notify) = fields.notify {
        idea.notify = notify;
    }
    if let Some(path) = fields.image {
        idea.image = Some(image_data_uri(&path)?);
    }
    Ok(())
}

/// Read an image file into a `data:` URI
fn image_data_uri(path: &Path) -> Result<String, CliError> {
    let bytes = std::fs::read(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    };
    Ok(format!("data:{};base64,{}", mime, B64.encode(bytes)))
}

fn print_idea(idea: &Idea) {
    let mut line = format!("  [{}] {} · {}", idea.id, idea.display_name(), idea.display_category());
    if let Some(date) = &idea.date {
        line.push_str(&format!(" · {}", date));
    }
    if idea.image.is_some() {
        line.push_str(" · image");
    }
    println!("{}", line);
    if !idea.description.is_empty() {
        println!("      {}", idea.description);
    }
}

fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
