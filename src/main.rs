use clap::Parser;
use color_eyre::Result;
use ideaboard::{
    Config, IdeaStore, Profile, SqliteStore,
    cli::{self, Cli, Commands},
};
use std::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = match &cli.config {
        Some(path) => Config::load_from(path, profile)?,
        None => Config::load_with_profile(profile)?,
    };

    let db_path = config.get_database_path();
    let db = SqliteStore::new(
        db_path
            .to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?,
    )?;
    let mut store = IdeaStore::open(db)?;

    match cli.command.unwrap_or(Commands::List { category: None }) {
        Commands::Add { name, fields } => {
            cli::handle_add(name, fields, &mut store, &config)?;
        }
        Commands::Edit {
            id,
            name,
            fields,
            clear_date,
            clear_image,
        } => {
            cli::handle_edit(id, name, fields, clear_date, clear_image, &mut store, &config)?;
        }
        Commands::Delete { id, yes } => {
            cli::handle_delete(id, yes, &mut store)?;
        }
        Commands::List { category } => {
            cli::handle_list(category, &store);
        }
        Commands::Toggle { id } => {
            cli::handle_toggle(id, &mut store)?;
        }
        Commands::Calendar { reminders } => {
            cli::handle_calendar(reminders, &store);
        }
        Commands::Export { out, encrypt } => {
            cli::handle_export(out, encrypt, &store, &config)?;
        }
        Commands::Import { file, yes } => {
            cli::handle_import(file, yes, &mut store)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("IDEAS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "ideaboard=debug,info"
        } else {
            "warn"
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}
